//! Inbox dispatch: signature verification followed by a dispatch on activity `type`.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::ap::dual::LinkOrObject;
use crate::ap::{ap_context, Object};
use crate::error::{Error, Result};
use crate::federation::{fanout, host_of, pool_or_err};
use crate::hooks;
use crate::models::Board;
use crate::state::AppState;
use crate::storage::{boards, follows, posts};
use crate::transform;
use crate::webfinger;

/// The request facts needed to verify an inbound HTTP signature, gathered by the
/// route handler from the raw request before this module ever sees it.
pub struct InboundRequest {
    pub method: String,
    pub path: String,
    pub host: String,
    pub date_header: String,
    pub signature_header: String,
}

/// Verify and dispatch one inbound Activity. Always returns `Ok(())` on a successful
/// dispatch, even when the activity's own side effects (e.g. sending an Accept back)
/// fail — those failures are logged, not surfaced, per the "always 200 on success"
/// contract. Errors returned here are reserved for malformed input and authorization
/// failure.
pub async fn handle(state: &AppState, board_id: &str, req: InboundRequest, activity: Object) -> Result<()> {
    let pool = pool_or_err(state).await?;
    let board = boards::get_board(&pool, board_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("board {board_id}")))?;

    let actor_link = activity
        .actor
        .as_ref()
        .ok_or_else(|| Error::InvalidContent("activity missing actor".into()))?;
    let actor_id = actor_link
        .id()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::InvalidContent("activity actor has no id".into()))?
        .to_string();
    if activity.object.is_none() && activity.kind != crate::ap::KIND_FOLLOW && activity.kind != crate::ap::KIND_ACCEPT {
        return Err(Error::InvalidContent("activity missing object".into()));
    }

    let remote_actor = webfinger::finger(state, &actor_id).await?;
    let public_key_pem = remote_actor
        .public_key
        .as_ref()
        .map(|k| k.public_key_pem.clone())
        .ok_or_else(|| Error::NoActor(actor_id.clone()))?;
    let public_key = crate::crypto::keys::parse_public_key(&public_key_pem)?;

    let date: DateTime<Utc> = DateTime::parse_from_rfc2822(&req.date_header)
        .map_err(|_| Error::Unauthorized("bad date header".into()))?
        .with_timezone(&Utc);
    let parts = crate::crypto::signature::SignedRequestParts {
        method: req.method,
        path: req.path,
        host: req.host,
        date,
    };
    crate::crypto::signature::verify_signature(&req.signature_header, &parts, &public_key, Utc::now())?;

    if activity.kind == crate::ap::KIND_FOLLOW {
        handle_follow(state, &pool, &board, &actor_id, &activity).await
    } else if activity.kind == crate::ap::KIND_CREATE {
        handle_create(state, &pool, &board, &actor_id, &activity).await
    } else if activity.kind == crate::ap::KIND_DELETE {
        handle_delete(&pool, &board, &actor_id, &activity).await
    } else if activity.kind == crate::ap::KIND_ACCEPT {
        tracing::info!(actor = %actor_id, board = %board.id, "accept received");
        Ok(())
    } else {
        tracing::info!(kind = %activity.kind, actor = %actor_id, "ignoring unsupported activity type");
        Ok(())
    }
}

async fn handle_follow(state: &AppState, pool: &SqlitePool, board: &Board, actor_id: &str, activity: &Object) -> Result<()> {
    follows::add_follower(pool, &board.id, actor_id).await?;

    let accept = Object {
        context: Some(ap_context()),
        kind: crate::ap::KIND_ACCEPT.to_string(),
        actor: Some(LinkOrObject::shallow(state.config().board_actor_url(&board.id))),
        object: Some(Box::new(LinkOrObject::full(activity.clone()))),
        ..Default::default()
    };

    if let Err(e) = fanout::deliver(state, board, &accept, actor_id).await {
        tracing::warn!(actor = %actor_id, error = %e, "failed to send Accept for Follow");
    }
    Ok(())
}

async fn handle_create(state: &AppState, pool: &SqlitePool, board: &Board, actor_id: &str, activity: &Object) -> Result<()> {
    let inner_link = activity
        .object
        .as_ref()
        .ok_or_else(|| Error::InvalidContent("Create missing object".into()))?;
    let inner = match inner_link.as_ref() {
        LinkOrObject::Full(o) => (**o).clone(),
        LinkOrObject::Link(_) => return Err(Error::InvalidContent("Create object must be embedded".into())),
    };

    let activity_host = host_of(actor_id);
    if let Some(inner_actor) = inner.actor.as_ref().and_then(|a| a.id()) {
        if host_of(inner_actor) != activity_host {
            return Err(Error::Unauthorized("Create actor/object host mismatch".into()));
        }
    }

    let cfg = state.config();
    let this_board_actor = cfg.board_actor_url(&board.id);
    let addressed = activity
        .to
        .as_ref()
        .map(|t| t.as_slice().iter().any(|v| v == &this_board_actor))
        .unwrap_or(false)
        || activity
            .cc
            .as_ref()
            .map(|t| t.as_slice().iter().any(|v| v == &this_board_actor))
            .unwrap_or(false);
    if !addressed {
        tracing::info!(board = %board.id, actor = %actor_id, "Create not addressed to this board, ignoring");
        return Ok(());
    }

    match transform::object_to_post(pool, &board.id, &inner).await {
        Ok(mut post) => {
            post.source = actor_id.to_string();
            let filters = state.filters().await;
            match posts::save_post(pool, cfg, &filters, &mut post).await {
                Ok(saved) => {
                    state.hooks().dispatch(hooks::Payload::post_created(&board.id, &saved)).await;
                }
                Err(e) => tracing::warn!(error = %e, "failed to save federated post"),
            }
        }
        Err(Error::OrphanReply(id)) => tracing::info!(apid = %id, "dropping federated reply with no resolvable parent"),
        Err(e) => tracing::warn!(error = %e, "failed to convert federated object to post"),
    }
    Ok(())
}

async fn handle_delete(pool: &SqlitePool, board: &Board, actor_id: &str, activity: &Object) -> Result<()> {
    let target_link = activity
        .object
        .as_ref()
        .ok_or_else(|| Error::InvalidContent("Delete missing object".into()))?;
    let target_apid = target_link
        .id()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::InvalidContent("Delete object has no id".into()))?
        .to_string();

    if host_of(&target_apid) != host_of(actor_id) {
        return Err(Error::Unauthorized("deleting actor does not own this post".into()));
    }

    let Some(post) = posts::find_by_apid(pool, &board.id, &target_apid).await? else {
        tracing::info!(apid = %target_apid, "Delete for unknown post, ignoring");
        return Ok(());
    };

    if post.thread == 0 {
        posts::delete_thread(pool, &board.id, post.id, actor_id, "remote delete").await?;
    } else {
        posts::delete_post(pool, &board.id, post.id, actor_id, "remote delete").await?;
    }
    Ok(())
}
