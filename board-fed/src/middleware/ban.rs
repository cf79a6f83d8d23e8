//! Ban-check middleware for the posting route.
//!
//! Looks up the caller's address in the `bans` table and short-circuits to 403
//! before the request reaches `storage::posts::save_post`. Grounded on the same
//! `storage::moderation::is_banned` check the ingest pipeline itself already
//! performs — this middleware exists so a banned caller gets a clean 403
//! instead of a silently-dropped post.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::error::{Error, Result};
use crate::state::AppState;
use crate::storage::moderation;

/// Reject the request with [`Error::Unauthorized`] if the connecting address is banned.
/// A no-op in private mode, where bans are never persisted.
pub async fn check_ban(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Result<Response> {
    let pool = state
        .pool()
        .await
        .ok_or_else(|| Error::Internal("storage pool not connected".into()))?;
    if moderation::is_banned(&pool, state.config(), &addr.ip().to_string()).await? {
        return Err(Error::Unauthorized("banned".to_string()));
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::Ban;
    use axum::body::Body;
    use axum::routing::get;
    use axum::Router;
    use chrono::{Duration, Utc};
    use sqlx::sqlite::SqlitePoolOptions;
    use tower::ServiceExt;

    async fn router_with_state(private: bool) -> (Router, AppState) {
        let pool = SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await.unwrap();
        crate::storage::schema::upgrade(&pool).await.unwrap();
        let mut cfg = Config::default();
        cfg.service.private = private;
        let state = AppState::builder().config(cfg).pool(pool).without_tracing().build().await.unwrap();

        let app = Router::new()
            .route("/ping", get(|| async { "pong" }))
            .layer(axum::middleware::from_fn_with_state(state.clone(), check_ban))
            .with_state(state.clone());
        (app, state)
    }

    #[tokio::test]
    async fn banned_address_is_rejected() {
        let (app, state) = router_with_state(false).await;
        let pool = state.pool().await.unwrap();
        moderation::place_ban(
            &pool,
            state.config(),
            &Ban { source: "203.0.113.9".into(), reason: "spam".into(), placed: Utc::now(), expires: Utc::now() + Duration::days(1) },
            "admin",
            "g",
            0,
        )
        .await
        .unwrap();

        let req = axum::http::Request::builder()
            .uri("/ping")
            .extension(ConnectInfo(SocketAddr::from(([203, 0, 113, 9], 0))))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn unbanned_address_passes_through() {
        let (app, _state) = router_with_state(false).await;
        let req = axum::http::Request::builder()
            .uri("/ping")
            .extension(ConnectInfo(SocketAddr::from(([203, 0, 113, 10], 0))))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }
}
