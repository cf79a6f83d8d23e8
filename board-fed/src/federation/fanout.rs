//! Signed delivery to a single recipient inbox, and the outbox-import walk used when
//! an admin starts following a peer.

use std::time::Duration;

use sqlx::SqlitePool;

use crate::ap::Object;
use crate::config::Config;
use crate::crypto::keys;
use crate::crypto::signature::{sign_request, SignedRequestParts};
use crate::error::{Error, Result};
use crate::models::Board;
use crate::state::AppState;
use crate::storage::{posts, regexps};
use crate::transform;
use crate::transport;
use crate::webfinger;

const ACTIVITY_CONTENT_TYPE: &str = "application/ld+json";

/// Sign `activity` as `board` and POST it to `recipient_actor_url`'s inbox, discovered
/// via WebFinger.
pub async fn deliver(state: &AppState, board: &Board, activity: &Object, recipient_actor_url: &str) -> Result<()> {
    let cfg = state.config();
    let recipient = webfinger::finger(state, recipient_actor_url).await?;
    let inbox_url = recipient
        .inbox
        .clone()
        .ok_or_else(|| Error::NoActor(recipient_actor_url.to_string()))?;
    transport::guard_target(&inbox_url, &cfg.federation)?;

    let parsed = url::Url::parse(&inbox_url).map_err(|_| Error::BadFormat(inbox_url.clone()))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| Error::BadFormat(inbox_url.clone()))?
        .to_string();

    let private_key = keys::parse_private_key(&board.private_key_pem)?;
    let key_id = format!("{}#key", cfg.board_actor_url(&board.id));
    let parts = SignedRequestParts {
        method: "POST".to_string(),
        path: parsed.path().to_string(),
        host: host.clone(),
        date: chrono::Utc::now(),
    };
    let signature = sign_request(&parts, &key_id, &private_key)?;
    let date_header = parts.date.format("%a, %d %b %Y %H:%M:%S GMT").to_string();

    let response = state
        .http_client()
        .post(&inbox_url)
        .header("Host", host)
        .header("Date", date_header)
        .header("Signature", signature)
        .header("Content-Type", ACTIVITY_CONTENT_TYPE)
        .json(activity)
        .send()
        .await
        .map_err(|e| Error::Transport(e.to_string()))?;

    if !response.status().is_success() {
        return Err(Error::Transport(format!("inbox rejected delivery: {}", response.status())));
    }
    Ok(())
}

/// Deliver `activity` to every recipient concurrently, within `cfg.federation.fanout_timeout_secs`
/// per recipient. A slow or failing recipient never blocks the others; failures are logged only.
pub async fn fan_out(state: &AppState, board: &Board, activity: &Object, recipients: Vec<String>) {
    let deadline = Duration::from_secs(state.config().federation.fanout_timeout_secs);
    let deliveries = recipients.into_iter().map(|recipient| {
        let state = state.clone();
        let board = board.clone();
        let activity = activity.clone();
        async move {
            match tokio::time::timeout(deadline, deliver(&state, &board, &activity, &recipient)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(recipient = %recipient, error = %e, "fan-out delivery failed"),
                Err(_) => tracing::warn!(recipient = %recipient, "fan-out delivery timed out"),
            }
        }
    });
    futures::future::join_all(deliveries).await;
}

/// Recipients for a freshly created post: every follower of `board`, plus — for a
/// reply to a federated thread — the thread OP's remote source, deduplicated.
pub async fn recipients_for_post(pool: &SqlitePool, board: &str, post: &crate::models::Post) -> Result<Vec<String>> {
    let mut recipients = crate::storage::follows::list_followers(pool, board).await?;

    if post.thread != 0 {
        if let Some(op) = posts::find_by_id(pool, board, post.thread).await? {
            if op.is_federated() && !recipients.iter().any(|r| r == &op.source) {
                recipients.push(op.source);
            }
        }
    }
    Ok(recipients)
}

/// Walk a peer's outbox, importing every top-level Note as a new thread and each
/// Note's embedded `replies` as its children. Posts already known by apid are
/// skipped silently. Returns the number of posts imported.
pub async fn import_outbox(state: &AppState, cfg: &Config, board: &Board, peer_actor_url: &str) -> Result<usize> {
    let pool = super::pool_or_err(state).await?;
    let actor = webfinger::finger(state, peer_actor_url).await?;
    let outbox_url = actor.outbox.ok_or_else(|| Error::NoActor(peer_actor_url.to_string()))?;
    transport::guard_target(&outbox_url, &cfg.federation)?;

    let collection: Object = state
        .http_client()
        .get(&outbox_url)
        .header("Accept", ACTIVITY_CONTENT_TYPE)
        .send()
        .await
        .map_err(|e| Error::Transport(e.to_string()))?
        .json()
        .await
        .map_err(|e| Error::Transport(e.to_string()))?;

    let filters = regexps::compiled_filters(&pool).await?;
    let mut imported = 0usize;

    for note in collection.items.unwrap_or_default() {
        let Some(apid) = note.id.clone().filter(|s| !s.is_empty()) else {
            continue;
        };
        if posts::find_by_apid(&pool, &board.id, &apid).await?.is_some() {
            continue;
        }

        let mut op_post = match transform::object_to_post(&pool, &board.id, &note).await {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(apid = %apid, error = %e, "skipping unimportable outbox item");
                continue;
            }
        };
        op_post.thread = 0;

        let saved = match posts::save_post(&pool, cfg, &filters, &mut op_post).await {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(apid = %apid, error = %e, "failed to import outbox thread");
                continue;
            }
        };
        imported += 1;

        let Some(replies_collection) = note.replies else { continue };
        for reply_note in replies_collection.items.unwrap_or_default() {
            let Some(reply_apid) = reply_note.id.clone().filter(|s| !s.is_empty()) else {
                continue;
            };
            if posts::find_by_apid(&pool, &board.id, &reply_apid).await?.is_some() {
                continue;
            }
            let mut reply_post = match transform::object_to_post(&pool, &board.id, &reply_note).await {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(apid = %reply_apid, error = %e, "skipping unimportable outbox reply");
                    continue;
                }
            };
            reply_post.thread = saved.id;
            if let Err(e) = posts::save_post(&pool, cfg, &filters, &mut reply_post).await {
                tracing::warn!(apid = %reply_apid, error = %e, "failed to import outbox reply");
                continue;
            }
            imported += 1;
        }
    }

    Ok(imported)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ap::dual::LinkOrObject;
    use crate::storage::{boards, schema};
    use sqlx::sqlite::SqlitePoolOptions;

    fn sample_board() -> Board {
        Board {
            id: "g".into(),
            title: "Tech".into(),
            description: String::new(),
            public_key_pem: "pub".into(),
            private_key_pem: "priv".into(),
        }
    }

    #[tokio::test]
    async fn recipients_for_op_post_is_just_followers() {
        let pool = SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await.unwrap();
        schema::upgrade(&pool).await.unwrap();
        boards::create_board(&pool, &sample_board()).await.unwrap();
        crate::storage::follows::add_follower(&pool, "g", "https://peer.example/g").await.unwrap();

        let post = crate::models::Post {
            board: "g".into(),
            id: 1,
            thread: 0,
            apid: "https://example.com/g/A0000001".into(),
            name: "Anonymous".into(),
            tripcode: String::new(),
            subject: String::new(),
            source: "127.0.0.1".into(),
            raw: "hi".into(),
            content: "hi".into(),
            date: chrono::Utc::now(),
            bumpdate: chrono::Utc::now(),
            flags: 0,
        };
        let recipients = recipients_for_post(&pool, "g", &post).await.unwrap();
        assert_eq!(recipients, vec!["https://peer.example/g".to_string()]);
    }

    #[tokio::test]
    async fn recipients_for_reply_includes_federated_op_source() {
        let pool = SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await.unwrap();
        schema::upgrade(&pool).await.unwrap();
        boards::create_board(&pool, &sample_board()).await.unwrap();
        let cfg = Config::default();

        let mut op = crate::models::Post {
            board: "g".into(),
            id: 0,
            thread: 0,
            apid: "https://peer.example/g/A0000001".into(),
            name: "Anonymous".into(),
            tripcode: String::new(),
            subject: String::new(),
            source: "https://peer.example/g".into(),
            raw: "hi".into(),
            content: String::new(),
            date: chrono::Utc::now(),
            bumpdate: chrono::Utc::now(),
            flags: 0,
        };
        let op = posts::save_post(&pool, &cfg, &[], &mut op).await.unwrap();

        let reply = crate::models::Post {
            board: "g".into(),
            id: 2,
            thread: op.id,
            apid: "https://example.com/g/A0000002".into(),
            name: "Anonymous".into(),
            tripcode: String::new(),
            subject: String::new(),
            source: "127.0.0.1".into(),
            raw: "reply".into(),
            content: "reply".into(),
            date: chrono::Utc::now(),
            bumpdate: chrono::Utc::now(),
            flags: 0,
        };
        let recipients = recipients_for_post(&pool, "g", &reply).await.unwrap();
        assert_eq!(recipients, vec!["https://peer.example/g".to_string()]);
    }

    #[test]
    fn shallow_accept_object_carries_embedded_activity() {
        let follow = Object {
            kind: "Follow".into(),
            actor: Some(LinkOrObject::shallow("https://peer.example/g")),
            ..Default::default()
        };
        let accept = Object {
            kind: "Accept".into(),
            object: Some(Box::new(LinkOrObject::full(follow.clone()))),
            ..Default::default()
        };
        assert_eq!(accept.kind, "Accept");
        match accept.object.unwrap().as_ref() {
            LinkOrObject::Full(inner) => assert_eq!(inner.kind, "Follow"),
            LinkOrObject::Link(_) => panic!("expected embedded object"),
        }
    }
}
