use std::sync::Arc;

use sqlx::PgPool;
use supabase_jwt::JwksCache;

use crate::config::Config;
use crate::integrations::email::NotificationSender;
use crate::integrations::sheets::SpreadsheetSyncClient;
use crate::integrations::slack::SlackClient;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub jwks_cache: Arc<JwksCache>,
    pub http: reqwest::Client,
    pub notifier: Arc<dyn NotificationSender>,
    pub sheets: Arc<dyn SpreadsheetSyncClient>,
    pub slack: SlackClient,
    pub config: Arc<Config>,
}
