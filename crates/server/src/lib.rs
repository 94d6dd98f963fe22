//! FormCraft backend: forms, public submissions, analytics, collaboration
//! and outbound integrations over a Postgres store.

pub mod access;
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod integrations;
pub mod models;
pub mod state;

use axum::{
    Router,
    routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use handlers::{
    analytics, comments, forms, profile, responses, shares, sheets, slack, templates, versions, webhooks,
};
pub use state::AppState;

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/me", get(profile::get_me).put(profile::put_me))
        // Forms
        .route("/forms", get(forms::list_forms).post(forms::create_form))
        .route(
            "/forms/:id",
            get(forms::get_form).put(forms::update_form).delete(forms::delete_form),
        )
        .route("/public/forms/:id", get(forms::get_public_form))
        .route("/public/forms/:id/responses", post(responses::submit_response))
        // Responses
        .route("/forms/:id/responses", get(responses::list_responses))
        .route("/forms/:id/responses/export", get(responses::export_responses))
        .route(
            "/forms/:id/responses/:response_id",
            axum::routing::delete(responses::delete_response),
        )
        // Analytics
        .route("/forms/:id/analytics/fields", get(analytics::field_analytics))
        .route("/forms/:id/analytics/timeline", get(analytics::response_timeline))
        .route("/forms/:id/analytics/stats", get(analytics::stats))
        // Sharing
        .route("/forms/:id/share", post(shares::share_form))
        .route("/forms/:id/shares", get(shares::list_shares))
        .route(
            "/forms/:id/shares/:share_id",
            put(shares::update_share).delete(shares::remove_share),
        )
        .route("/shared-with-me", get(shares::shared_with_me))
        // Comments
        .route(
            "/forms/:id/responses/:response_id/comments",
            get(comments::list_comments).post(comments::add_comment),
        )
        .route(
            "/comments/:id",
            put(comments::edit_comment).delete(comments::delete_comment),
        )
        .route("/comments/:id/like", post(comments::toggle_like))
        .route("/comments/:id/resolve", post(comments::toggle_resolved))
        // Templates
        .route(
            "/templates",
            get(templates::list_templates).post(templates::create_template),
        )
        .route(
            "/templates/:id",
            get(templates::get_template)
                .put(templates::update_template)
                .delete(templates::delete_template),
        )
        .route("/templates/:id/use", post(templates::use_template))
        // Versions
        .route(
            "/forms/:id/versions",
            get(versions::list_versions).post(versions::create_version),
        )
        .route("/forms/:id/versions/compare", get(versions::compare))
        .route("/forms/:id/versions/:number", get(versions::get_version))
        .route("/forms/:id/versions/:number/rollback", post(versions::rollback))
        // Webhooks
        .route("/webhooks", post(webhooks::create_webhook))
        .route("/webhooks/form/:form_id", get(webhooks::list_for_form))
        .route(
            "/webhooks/:id",
            get(webhooks::get_webhook)
                .put(webhooks::update_webhook)
                .delete(webhooks::delete_webhook),
        )
        .route("/webhooks/:id/test", post(webhooks::test_webhook))
        .route("/webhooks/:id/logs", get(webhooks::webhook_logs))
        // Slack
        .route("/slack", post(slack::upsert_slack))
        .route(
            "/slack/form/:form_id",
            get(slack::get_slack).put(slack::update_slack).delete(slack::delete_slack),
        )
        .route("/slack/form/:form_id/test", post(slack::test_slack))
        // Google Sheets
        .route("/google-sheets/auth-url", get(sheets::auth_url))
        .route("/google-sheets/callback", get(sheets::callback))
        .route("/google-sheets/setup", post(sheets::setup))
        .route(
            "/google-sheets/form/:form_id",
            get(sheets::get_integration).delete(sheets::disconnect),
        )
        .route("/google-sheets/form/:form_id/sync", post(sheets::sync_all))
        .route("/google-sheets/form/:form_id/toggle-sync", put(sheets::toggle_sync));

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .nest("/api", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
