//! HTTP route assembly: the full external surface described in the interface table —
//! WebFinger, per-board actor/outbox/inbox/followers/following, post lookup, local
//! posting, and health/readiness.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Form, Path, Query, Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::ap::Object;
use crate::error::{Error, Result};
use crate::federation::{self, inbox};
use crate::ingest::local::{self, LocalPostForm};
use crate::state::AppState;
use crate::storage::{boards, follows, posts};
use crate::transform;
use crate::webfinger;

/// Matches the AP content-negotiation family peers use for `Accept`:
/// `application/(ld|json|activity)+(ld|json)`.
static AP_ACCEPT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"application/(ld|json|activity)\+(ld|json)").unwrap());

const AP_CONTENT_TYPE: &str = "application/ld+json";

fn wants_activity_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| AP_ACCEPT_RE.is_match(accept))
}

fn ap_json_response(object: impl serde::Serialize) -> Response {
    (StatusCode::OK, [(header::CONTENT_TYPE, AP_CONTENT_TYPE)], Json(object)).into_response()
}

/// Build the router: every handler only needs `AppState`, so the ban-check middleware
/// is scoped to `/post` alone rather than every route.
pub fn router(state: AppState) -> Router {
    let posting = Router::new()
        .route("/post", post(submit_post))
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), crate::middleware::check_ban));

    Router::new()
        .route("/.well-known/webfinger", get(webfinger_handler))
        .route("/health", get(crate::health::health))
        .route("/ready", get(crate::health::readiness))
        .route("/{board}", get(board_index))
        .route("/{board}/outbox", get(outbox_handler))
        .route("/{board}/inbox", post(inbox_handler))
        .route("/{board}/followers", get(followers_handler))
        .route("/{board}/following", get(following_handler))
        .route("/{board}/{post_or_apid}", get(post_lookup))
        .merge(posting)
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct WebfingerQuery {
    resource: String,
}

/// `GET /.well-known/webfinger?resource=acct:board@host`.
async fn webfinger_handler(State(state): State<AppState>, Query(q): Query<WebfingerQuery>) -> Result<Response> {
    let (board_id, host) =
        webfinger::parse_acct_resource(&q.resource).ok_or_else(|| Error::BadRequest("malformed resource".into()))?;
    if host != state.config().service.fqdn {
        return Err(Error::NotFound(format!("unknown host {host}")));
    }

    let pool = federation::pool_or_err(&state).await?;
    let board = boards::get_board(&pool, &board_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("board {board_id}")))?;

    let jrd = webfinger::jrd_for_board(state.config(), &board);
    Ok((StatusCode::OK, [(header::CONTENT_TYPE, "application/jrd+json")], Json(jrd)).into_response())
}

/// `GET /{board}`: actor document for AP peers, a plain-text summary for anyone else.
async fn board_index(State(state): State<AppState>, Path(board_id): Path<String>, headers: HeaderMap) -> Result<Response> {
    let pool = federation::pool_or_err(&state).await?;
    let board = boards::get_board(&pool, &board_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("board {board_id}")))?;

    if wants_activity_json(&headers) {
        Ok(ap_json_response(transform::board_to_actor(state.config(), &board)))
    } else {
        let ops = posts::list_thread_ops_by_bump(&pool, &board_id).await?;
        let body = format!(
            "{title} /{id}/ - {description}\n\n{count} threads\n",
            title = board.title,
            id = board.id,
            description = board.description,
            count = ops.len(),
        );
        Ok((StatusCode::OK, body).into_response())
    }
}

/// `GET /{board}/outbox`, honoring `If-Modified-Since`.
async fn outbox_handler(State(state): State<AppState>, Path(board_id): Path<String>, headers: HeaderMap) -> Result<Response> {
    let pool = federation::pool_or_err(&state).await?;
    let board = boards::get_board(&pool, &board_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("board {board_id}")))?;

    let if_modified_since: Option<DateTime<Utc>> = headers
        .get(header::IF_MODIFIED_SINCE)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| DateTime::parse_from_rfc2822(s).ok())
        .map(|d| d.with_timezone(&Utc));

    match federation::outbox::build(&pool, state.config(), &board, if_modified_since).await? {
        Some(collection) => Ok(ap_json_response(collection)),
        None => Ok(StatusCode::NOT_MODIFIED.into_response()),
    }
}

/// `POST /{board}/inbox`. The raw request facts needed for signature verification are
/// gathered here, before the body is parsed — `federation::inbox::handle` never sees
/// the request directly.
async fn inbox_handler(State(state): State<AppState>, Path(board_id): Path<String>, request: Request) -> Result<Response> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let headers = request.headers().clone();
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let date_header = headers
        .get(header::DATE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let signature_header = headers
        .get("signature")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let body = axum::body::to_bytes(request.into_body(), usize::MAX)
        .await
        .map_err(|e| Error::BadRequest(format!("failed to read body: {e}")))?;
    let activity: Object =
        serde_json::from_slice(&body).map_err(|e| Error::InvalidContent(format!("malformed activity: {e}")))?;

    let req = inbox::InboundRequest { method, path, host, date_header, signature_header };
    inbox::handle(&state, &board_id, req, activity).await?;
    Ok(StatusCode::OK.into_response())
}

async fn followers_handler(State(state): State<AppState>, Path(board_id): Path<String>) -> Result<Response> {
    let pool = federation::pool_or_err(&state).await?;
    boards::get_board(&pool, &board_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("board {board_id}")))?;
    let actors = follows::list_followers(&pool, &board_id).await?;
    Ok(ap_json_response(actor_collection(actors)))
}

async fn following_handler(State(state): State<AppState>, Path(board_id): Path<String>) -> Result<Response> {
    let pool = federation::pool_or_err(&state).await?;
    boards::get_board(&pool, &board_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("board {board_id}")))?;
    let actors = follows::list_following(&pool, &board_id).await?;
    Ok(ap_json_response(actor_collection(actors)))
}

fn actor_collection(actors: Vec<String>) -> serde_json::Value {
    serde_json::json!({
        "@context": crate::ap::AP_CONTEXT,
        "type": crate::ap::KIND_ORDERED_COLLECTION,
        "totalItems": actors.len(),
        "orderedItems": actors,
    })
}

/// `GET /{board}/{postOrApId}`: `postOrApId` is either a bare numeric local id or the
/// 8-character apid suffix (`{letter}{7 hex digits}`).
async fn post_lookup(
    State(state): State<AppState>,
    Path((board_id, ident)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response> {
    let pool = federation::pool_or_err(&state).await?;
    boards::get_board(&pool, &board_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("board {board_id}")))?;

    let post = match ident.parse::<i64>() {
        Ok(id) => posts::find_by_id(&pool, &board_id, id).await?,
        Err(_) => {
            let apid = format!("{}/{}", state.config().board_actor_url(&board_id), ident);
            posts::find_by_apid(&pool, &board_id, &apid).await?
        }
    }
    .ok_or_else(|| Error::NotFound(format!("post {ident}")))?;

    if wants_activity_json(&headers) {
        let note = transform::post_to_object(&pool, state.config(), &post, Vec::new(), false, true).await?;
        let wrapped = Object {
            context: Some(crate::ap::ap_context()),
            kind: crate::ap::KIND_ORDERED_COLLECTION.to_string(),
            total_items: Some(1),
            items: Some(vec![note]),
            ..Default::default()
        };
        Ok(ap_json_response(wrapped))
    } else {
        let body = format!(
            "#{id} {subject}\n\n{content}\n",
            id = post.id,
            subject = post.subject,
            content = post.content,
        );
        Ok((StatusCode::OK, body).into_response())
    }
}

/// `POST /post`: the local posting form. CAPTCHA is required unconditionally — the
/// moderator session layer that would let a logged-in moderator skip it is an external
/// collaborator this crate does not implement.
async fn submit_post(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Form(form): Form<LocalPostForm>,
) -> Result<Response> {
    let pool = federation::pool_or_err(&state).await?;
    let board = boards::get_board(&pool, &form.board_name)
        .await?
        .ok_or_else(|| Error::NotFound(format!("board {}", form.board_name)))?;

    let saved = local::submit(&state, &board, addr.ip().to_string(), form).await?;
    let location = format!("/{}/{}", board.id, saved.id);
    Ok((StatusCode::SEE_OTHER, [(header::LOCATION, location)]).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::{Board, CaptchaEntry};
    use crate::storage::{captcha, schema};
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use sqlx::sqlite::SqlitePoolOptions;
    use tower::ServiceExt;

    async fn seeded_state() -> AppState {
        let pool = SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await.unwrap();
        schema::upgrade(&pool).await.unwrap();
        let mut cfg = Config::default();
        cfg.service.fqdn = "example.com".to_string();
        cfg.service.transport = "https".to_string();
        boards::create_board(
            &pool,
            &Board {
                id: "g".into(),
                title: "Tech".into(),
                description: "technology".into(),
                public_key_pem: "pub".into(),
                private_key_pem: "priv".into(),
            },
        )
        .await
        .unwrap();
        AppState::builder().config(cfg).pool(pool).without_tracing().build().await.unwrap()
    }

    #[test]
    fn ap_accept_regex_matches_known_forms() {
        assert!(AP_ACCEPT_RE.is_match("application/ld+json"));
        assert!(AP_ACCEPT_RE.is_match("application/activity+json"));
        assert!(!AP_ACCEPT_RE.is_match("text/html"));
    }

    #[tokio::test]
    async fn webfinger_resolves_known_board() {
        let state = seeded_state().await;
        let app = router(state);
        let req = HttpRequest::builder()
            .uri("/.well-known/webfinger?resource=acct:g@example.com")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn webfinger_rejects_foreign_host() {
        let state = seeded_state().await;
        let app = router(state);
        let req = HttpRequest::builder()
            .uri("/.well-known/webfinger?resource=acct:g@other.example")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn board_index_returns_actor_for_ap_accept() {
        let state = seeded_state().await;
        let app = router(state);
        let req = HttpRequest::builder()
            .uri("/g")
            .header(header::ACCEPT, "application/activity+json")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            AP_CONTENT_TYPE
        );
    }

    #[tokio::test]
    async fn unknown_board_is_404() {
        let state = seeded_state().await;
        let app = router(state);
        let req = HttpRequest::builder().uri("/nope").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn submit_post_redirects_on_success() {
        let state = seeded_state().await;
        let pool = state.pool().await.unwrap();
        captcha::insert_batch(&pool, &[CaptchaEntry { id: "abc".into(), solution: "F00D1".into(), image: vec![] }])
            .await
            .unwrap();
        let app = router(state);

        let body = "boardName=g&comment=hello&captchaId=abc&captchaAnswer=f00d1";
        let req = HttpRequest::builder()
            .method("POST")
            .uri("/post")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .extension(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 0))))
            .body(Body::from(body))
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response.headers().get(header::LOCATION).unwrap().to_str().unwrap();
        assert_eq!(location, "/g/1");
    }
}
