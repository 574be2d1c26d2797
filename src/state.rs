use std::sync::Arc;

use crate::config::AppConfig;
use crate::store::{MemoryStore, PgStore, RecordStore};
use crate::tenant::{DefaultTenant, OwnerResolver};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub owners: Arc<dyn OwnerResolver>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Connects to PostgreSQL and applies pending migrations.
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let pg = PgStore::connect(&config.db).await?;
        pg.migrate().await?;

        Ok(Self::from_parts(Arc::new(pg), config))
    }

    pub fn from_parts(store: Arc<dyn RecordStore>, config: Arc<AppConfig>) -> Self {
        let owners = Arc::new(DefaultTenant::new(
            store.clone(),
            config.default_user_email.clone(),
        )) as Arc<dyn OwnerResolver>;
        Self {
            store,
            owners,
            config,
        }
    }

    /// State over an empty in-memory store with [`AppConfig::test_default`].
    pub fn in_memory() -> Self {
        Self::from_parts(
            Arc::new(MemoryStore::new()),
            Arc::new(AppConfig::test_default()),
        )
    }
}
