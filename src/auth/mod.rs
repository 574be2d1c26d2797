mod api_key;
mod extractors;

pub use api_key::{require_api_key, API_KEY_HEADER};
pub use extractors::Owner;
