use std::sync::{Arc, Mutex};

use axum::{Router, extract::Query, response::Html, routing::get};
use colored::*;
use serde::Deserialize;

pub const CALLBACK_PORT: u16 = 8080;

#[derive(Debug, Deserialize)]
struct CallbackParams {
    access_token: Option<String>,
    error: Option<String>,
}

type TokenStore = Arc<Mutex<Option<String>>>;

pub fn authorize_url(supabase_url: &str, provider: &str) -> String {
    format!(
        "{}/auth/v1/authorize?provider={}&redirect_to=http://localhost:{}/callback",
        supabase_url.trim_end_matches('/'),
        provider,
        CALLBACK_PORT
    )
}

/// Runs the Supabase OAuth browser flow and returns the access token.
///
/// Supabase hands the token back in the URL fragment, which only the
/// browser sees, so the callback page reads it and calls `/callback` again
/// with the token as a query parameter.
pub async fn authenticate(supabase_url: &str, provider: &str) -> anyhow::Result<String> {
    println!("Starting authentication...");
    println!();

    let token_store: TokenStore = Arc::new(Mutex::new(None));
    let store = token_store.clone();
    let app = Router::new().route(
        "/callback",
        get(move |query: Query<CallbackParams>| callback_handler(query, store.clone())),
    );

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{CALLBACK_PORT}")).await?;
    println!(
        "{}",
        format!("🔓 Local callback server started on port {CALLBACK_PORT}").cyan()
    );
    let server_handle = tokio::spawn(async move { axum::serve(listener, app).await });

    let auth_url = authorize_url(supabase_url, provider);
    println!();
    println!("{}", format!("Opening browser for {provider} login...").yellow());
    println!();

    if let Err(e) = webbrowser::open(&auth_url) {
        eprintln!("{} {}", "⚠️  Could not open browser automatically:".yellow(), e);
        println!();
        println!("{}", "Please open this URL manually:".bright_white().bold());
        println!("{}", auth_url.bright_blue().underline());
        println!();
    }

    let timeout = tokio::time::Duration::from_secs(120);
    let start = tokio::time::Instant::now();
    loop {
        tokio::time::sleep(tokio::time::Duration::from_millis(500)).await;

        let token = token_store
            .lock()
            .map_err(|_| anyhow::anyhow!("token store poisoned"))?
            .clone();
        if let Some(token) = token {
            server_handle.abort();
            return Ok(token);
        }

        if start.elapsed() > timeout {
            server_handle.abort();
            anyhow::bail!("Authentication timeout (2 minutes)");
        }
    }
}

async fn callback_handler(Query(params): Query<CallbackParams>, token_store: TokenStore) -> Html<String> {
    if let Some(error) = params.error {
        let error = escape_html(&error);
        return Html(page(
            "Authentication Failed",
            &format!(
                r#"<h1 class="error">❌ Authentication Failed</h1>
                <p>{error}</p>
                <p>You can close this window and try again.</p>"#
            ),
        ));
    }

    if let Some(token) = params.access_token {
        if let Ok(mut store) = token_store.lock() {
            *store = Some(token);
        }
        return Html(page(
            "Authentication Successful",
            r#"<h1 class="success">✅ Signed in to FormCraft</h1>
            <p>You can close this window and return to the terminal.</p>"#,
        ));
    }

    Html(page(
        "Authentication",
        r#"<h1 class="success">Finishing sign-in...</h1>
        <script>
            const params = new URLSearchParams(window.location.hash.substring(1));
            const token = params.get('access_token');
            if (token) {
                fetch('/callback?access_token=' + encodeURIComponent(token))
                    .then(() => setTimeout(() => window.close(), 1000));
            } else {
                document.body.innerHTML = '<h1 class="error">❌ No token found</h1>' +
                    '<p>Please try logging in again.</p>';
            }
        </script>"#,
    ))
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>{title}</title>
    <style>
        body {{ font-family: Arial, sans-serif; text-align: center; margin-top: 20vh; }}
        .error {{ color: #e53e3e; }}
        .success {{ color: #38a169; }}
    </style>
</head>
<body>
{body}
</body>
</html>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorize_url_points_back_to_local_callback() {
        assert_eq!(
            authorize_url("https://demo.supabase.co/", "github"),
            "https://demo.supabase.co/auth/v1/authorize?provider=github&redirect_to=http://localhost:8080/callback"
        );
    }

    #[tokio::test]
    async fn callback_stores_the_token() {
        let store: TokenStore = Arc::new(Mutex::new(None));
        let params = CallbackParams {
            access_token: Some("jwt".into()),
            error: None,
        };
        let Html(body) = callback_handler(Query(params), store.clone()).await;
        assert!(body.contains("Signed in"));
        assert_eq!(store.lock().unwrap().as_deref(), Some("jwt"));
    }

    #[tokio::test]
    async fn provider_errors_are_escaped() {
        let store: TokenStore = Arc::new(Mutex::new(None));
        let params = CallbackParams {
            access_token: None,
            error: Some("<script>alert('x')</script> & more".into()),
        };
        let Html(body) = callback_handler(Query(params), store.clone()).await;
        assert!(!body.contains("<script>alert"));
        assert!(body.contains("&lt;script&gt;alert('x')&lt;/script&gt; &amp; more"));
        assert!(store.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn fragment_page_is_served_without_a_token() {
        let store: TokenStore = Arc::new(Mutex::new(None));
        let params = CallbackParams {
            access_token: None,
            error: None,
        };
        let Html(body) = callback_handler(Query(params), store.clone()).await;
        assert!(body.contains("window.location.hash"));
        assert!(store.lock().unwrap().is_none());
    }
}
