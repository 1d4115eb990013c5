//! Cookie/session endpoints for browser clients plus the `/note` route guard.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Request, State};
use axum::http::header::SET_COOKIE;
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Json, Router};
use axum_extra::extract::CookieJar;
use serde_json::json;

use crate::error::ClientError;
use crate::session::{decode_user_id, ACCESS_TOKEN_COOKIE, JWT_COOKIE, SESSION_ID_COOKIE};

const GUARDED_PREFIX: &str = "/note";

#[derive(Clone, Default)]
pub struct ProxyState {
    secret: Option<Arc<[u8]>>,
}

impl ProxyState {
    pub fn new(secret: Option<Vec<u8>>) -> Self {
        Self {
            secret: secret.map(Arc::from),
        }
    }
}

pub fn router(state: ProxyState) -> Router {
    Router::new()
        .route("/", get(landing))
        .route("/api/getCookie", get(get_cookie))
        .route("/api/session", get(session))
        .route("/api/removeCookie", get(remove_cookie))
        .route("/note", get(workspace))
        .route("/note/{*rest}", get(workspace))
        .layer(middleware::from_fn(route_guard))
        .with_state(state)
}

/// Binds and serves until Ctrl-C.
pub async fn serve(addr: SocketAddr, state: ProxyState) -> Result<()> {
    if state.secret.is_none() {
        tracing::warn!("no JWT secret configured; every token will be rejected");
    }
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding proxy to {addr}"))?;
    tracing::info!(%addr, "session proxy listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(?err, "failed to listen for shutdown signal");
            }
        })
        .await
        .context("serving session proxy")
}

fn error_response(err: ClientError) -> Response {
    let status = match &err {
        ClientError::NotFound(_) => StatusCode::NOT_FOUND,
        ClientError::Auth(_) | ClientError::Validation(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": err.user_message() }))).into_response()
}

async fn get_cookie(State(state): State<ProxyState>, jar: CookieJar) -> Response {
    let Some(cookie) = jar.get(JWT_COOKIE) else {
        return error_response(ClientError::NotFound("Token not found"));
    };
    let Some(secret) = state.secret.as_deref() else {
        return error_response(ClientError::Auth("Invalid token".into()));
    };
    match decode_user_id(cookie.value(), Some(secret)) {
        Ok(user_id) => Json(json!({ "userId": user_id })).into_response(),
        Err(err) => {
            tracing::debug!(?err, "token verification failed");
            error_response(ClientError::Auth("Invalid token".into()))
        }
    }
}

async fn session(jar: CookieJar) -> Response {
    match jar.get(SESSION_ID_COOKIE) {
        Some(cookie) => Json(json!({ "session_id": cookie.value() })).into_response(),
        None => error_response(ClientError::NotFound("Session ID not found")),
    }
}

async fn remove_cookie() -> Response {
    let expired = |name: &str| format!("{name}=; Path=/; Max-Age=0; HttpOnly; Secure");
    (
        AppendHeaders([
            (SET_COOKIE, expired(JWT_COOKIE)),
            (SET_COOKIE, expired(ACCESS_TOKEN_COOKIE)),
        ]),
        Json(json!({ "message": "Cookies jwt and access_token have been deleted" })),
    )
        .into_response()
}

async fn landing() -> &'static str {
    "myNote session proxy\n"
}

async fn workspace() -> &'static str {
    "signed in\n"
}

fn is_guarded(path: &str) -> bool {
    path == GUARDED_PREFIX
        || path
            .strip_prefix(GUARDED_PREFIX)
            .is_some_and(|rest| rest.starts_with('/'))
}

async fn route_guard(jar: CookieJar, request: Request, next: Next) -> Response {
    if is_guarded(request.uri().path()) && jar.get(JWT_COOKIE).is_none() {
        tracing::debug!(path = request.uri().path(), "redirecting signed-out request");
        return Redirect::temporary("/").into_response();
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::token::sign_for_tests;
    use reqwest::header::{COOKIE, LOCATION};

    const SECRET: &[u8] = b"proxy-secret";

    async fn spawn(state: ProxyState) -> anyhow::Result<String> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, router(state)).await;
        });
        Ok(format!("http://{addr}"))
    }

    fn client() -> anyhow::Result<reqwest::Client> {
        Ok(reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?)
    }

    #[tokio::test]
    async fn get_cookie_reports_missing_invalid_and_valid_tokens() -> anyhow::Result<()> {
        let base = spawn(ProxyState::new(Some(SECRET.to_vec()))).await?;
        let http = client()?;

        let missing = http.get(format!("{base}/api/getCookie")).send().await?;
        assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);
        let body: serde_json::Value = missing.json().await?;
        assert_eq!(body["error"], "Token not found");

        let forged = sign_for_tests(&json!({"user_id": 3}), b"someone-else");
        let invalid = http
            .get(format!("{base}/api/getCookie"))
            .header(COOKIE, format!("jwt={forged}"))
            .send()
            .await?;
        assert_eq!(invalid.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: serde_json::Value = invalid.json().await?;
        assert_eq!(body["error"], "Invalid token");

        let token = sign_for_tests(&json!({"user_id": 3}), SECRET);
        let valid = http
            .get(format!("{base}/api/getCookie"))
            .header(COOKIE, format!("jwt={token}"))
            .send()
            .await?;
        assert_eq!(valid.status(), reqwest::StatusCode::OK);
        let body: serde_json::Value = valid.json().await?;
        assert_eq!(body["userId"], 3);
        Ok(())
    }

    #[tokio::test]
    async fn session_endpoint_echoes_cookie() -> anyhow::Result<()> {
        let base = spawn(ProxyState::default()).await?;
        let http = client()?;

        let found = http
            .get(format!("{base}/api/session"))
            .header(COOKIE, "session_id=abc123")
            .send()
            .await?;
        let body: serde_json::Value = found.json().await?;
        assert_eq!(body["session_id"], "abc123");

        let missing = http.get(format!("{base}/api/session")).send().await?;
        assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);
        let body: serde_json::Value = missing.json().await?;
        assert_eq!(body["error"], "Session ID not found");
        Ok(())
    }

    #[tokio::test]
    async fn remove_cookie_expires_both_cookies() -> anyhow::Result<()> {
        let base = spawn(ProxyState::default()).await?;
        let response = client()?
            .get(format!("{base}/api/removeCookie"))
            .send()
            .await?;
        let cookies: Vec<String> = response
            .headers()
            .get_all(SET_COOKIE.as_str())
            .iter()
            .filter_map(|value| value.to_str().ok().map(str::to_string))
            .collect();
        assert_eq!(cookies.len(), 2);
        assert!(cookies[0].starts_with("jwt=;"));
        assert!(cookies[1].starts_with("access_token=;"));
        assert!(cookies.iter().all(|cookie| cookie.contains("Max-Age=0")));
        Ok(())
    }

    #[tokio::test]
    async fn note_routes_redirect_without_jwt() -> anyhow::Result<()> {
        let base = spawn(ProxyState::default()).await?;
        let http = client()?;

        for path in ["/note", "/note/x"] {
            let response = http.get(format!("{base}{path}")).send().await?;
            assert!(response.status().is_redirection(), "{path}");
            assert_eq!(response.headers()[LOCATION], "/");
        }

        let allowed = http
            .get(format!("{base}/note/x"))
            .header(COOKIE, "jwt=anything")
            .send()
            .await?;
        assert_eq!(allowed.status(), reqwest::StatusCode::OK);

        let unguarded = http.get(format!("{base}/notebook")).send().await?;
        assert!(!unguarded.status().is_redirection());
        Ok(())
    }

    #[test]
    fn guard_matches_note_paths_only() {
        assert!(is_guarded("/note"));
        assert!(is_guarded("/note/42"));
        assert!(!is_guarded("/notes"));
        assert!(!is_guarded("/api/session"));
    }
}
