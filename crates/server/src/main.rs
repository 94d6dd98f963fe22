use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use formcraft::{
    AppState,
    config::Config,
    integrations::{
        email::{DisabledSender, NotificationSender, SmtpSender},
        sheets::GoogleSheetsClient,
        slack::SlackClient,
    },
    router,
};
use sqlx::postgres::PgPoolOptions;
use supabase_jwt::JwksCache;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("formcraft=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;

    let db = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("connecting to the database")?;
    sqlx::migrate!().run(&db).await.context("running migrations")?;

    let notifier: Arc<dyn NotificationSender> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpSender::new(smtp).context("configuring SMTP")?),
        None => {
            tracing::warn!("SMTP_HOST/SMTP_USER not set, outgoing email is disabled");
            Arc::new(DisabledSender)
        }
    };

    let http = reqwest::Client::new();
    let state = AppState {
        db,
        jwks_cache: Arc::new(JwksCache::new(&config.jwks_url)),
        sheets: Arc::new(GoogleSheetsClient::new(http.clone(), config.google.clone())),
        slack: SlackClient::new(http.clone()),
        http,
        notifier,
        config: Arc::new(config.clone()),
    };

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    tracing::info!("Server running on http://{}", config.bind_addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
