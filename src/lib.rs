use std::sync::{Arc, RwLock};

use crate::helper::notification_helpers::ReceiptCache;
use crate::helper::storage_helpers::UrlSigner;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
pub type DbPool = Pool<SqliteConnectionManager>;

pub struct AppState {
    pub receipt_cache: Arc<RwLock<ReceiptCache>>,
    pub url_signer: UrlSigner,
}

impl AppState {
    pub fn new(config: &crate::config::Config) -> Self {
        AppState {
            receipt_cache: Arc::new(RwLock::new(ReceiptCache::new(chrono::Duration::seconds(
                config.portal.receipt_cache_ttl_secs,
            )))),
            url_signer: UrlSigner::new(&config.url_signing_key),
        }
    }
}

pub mod calendar;
pub mod config;
pub mod helper;
pub mod middleware;
pub mod models;
pub mod onboarding;
pub mod permissions;
pub mod routes;
pub mod setup;
