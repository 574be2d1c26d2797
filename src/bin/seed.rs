use std::sync::Arc;

use meter_sync::config::{self, DbConfig};
use meter_sync::store::PgStore;
use meter_sync::tenant::DefaultTenant;
use meter_sync::{app, seed};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    app::init_tracing();

    // Only the database is needed here, not the HTTP settings.
    let store = Arc::new(PgStore::connect(&DbConfig::from_env()?).await?);
    store.migrate().await?;
    let owners = DefaultTenant::new(store.clone(), config::default_user_email_from_env());

    let report = seed::seed(store.as_ref(), &owners).await?;

    tracing::info!(
        owner = %report.owner,
        readings = report.readings_inserted,
        bills = report.bills_inserted,
        "seed complete"
    );
    Ok(())
}
