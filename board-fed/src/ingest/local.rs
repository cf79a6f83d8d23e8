//! Local post submission: CAPTCHA check, tripcode hashing, thread resolution, and the
//! post-save fan-out/hook side effects shared with federated ingest.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::crypto::tripcode;
use crate::error::{Error, Result};
use crate::federation::{fanout, pool_or_err};
use crate::hooks;
use crate::models::{post_flags, Board, Post};
use crate::state::AppState;
use crate::storage::{captcha, posts};

/// Fields the `POST /post` form submits. `name` still carries the raw `#pass`/`##pass`
/// syntax; hashing happens here, not at the edge.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct LocalPostForm {
    #[serde(rename = "boardName")]
    pub board_name: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub subject: String,
    pub comment: String,
    #[serde(rename = "inReplyTo", default)]
    pub in_reply_to: Option<i64>,
    #[serde(default)]
    pub sage: bool,
    #[serde(rename = "captchaId")]
    pub captcha_id: String,
    #[serde(rename = "captchaAnswer")]
    pub captcha_answer: String,
}

/// `in_reply_to` pointing at an OP joins that thread; at a reply, joins its parent
/// thread; absent starts a new one.
async fn resolve_thread(pool: &SqlitePool, board: &str, in_reply_to: Option<i64>) -> Result<i64> {
    let Some(target) = in_reply_to else { return Ok(0) };
    let parent = posts::find_by_id(pool, board, target)
        .await?
        .ok_or_else(|| Error::NotFound(format!("post {target}")))?;
    Ok(if parent.thread == 0 { parent.id } else { parent.thread })
}

/// Accept a locally-submitted post. `source` is the caller's client IP. Fan-out and hook
/// dispatch run on a background task after the row is committed; neither blocks the
/// response.
pub async fn submit(state: &AppState, board: &Board, source: String, form: LocalPostForm) -> Result<Post> {
    let pool = pool_or_err(state).await?;

    if !captcha::solve(&pool, &form.captcha_id, &form.captcha_answer).await? {
        return Err(Error::Unauthorized("captcha mismatch".into()));
    }

    let cfg = state.config();
    let thread = resolve_thread(&pool, &board.id, form.in_reply_to).await?;
    let trip = tripcode::hash_tripcode(&form.name, &cfg.trip.secret);

    let mut flags = 0i64;
    if form.sage {
        flags |= post_flags::SAGE;
    }

    let mut post = Post {
        board: board.id.clone(),
        id: 0,
        thread,
        apid: String::new(),
        name: trip.name,
        tripcode: trip.trip,
        subject: form.subject,
        source,
        raw: form.comment,
        content: String::new(),
        date: DateTime::<Utc>::default(),
        bumpdate: Utc::now(),
        flags,
    };

    let filters = state.filters().await;
    let saved = posts::save_post(&pool, cfg, &filters, &mut post).await?;

    state.hooks().dispatch(hooks::Payload::post_created(&board.id, &saved)).await;
    spawn_fanout(state.clone(), board.clone(), saved.clone());

    Ok(saved)
}

/// Compute and deliver this post's fan-out recipients in the background. A brand new
/// thread has no recipients unless it happens to reply into a federated one.
fn spawn_fanout(state: AppState, board: Board, post: Post) {
    tokio::spawn(async move {
        let Some(pool) = state.pool().await else { return };

        let recipients = match fanout::recipients_for_post(&pool, &board.id, &post).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "failed to compute fan-out recipients");
                return;
            }
        };
        if recipients.is_empty() {
            return;
        }

        let note = match crate::transform::post_to_object(&pool, state.config(), &post, Vec::new(), false, true).await
        {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(error = %e, "failed to render post for fan-out");
                return;
            }
        };

        let create = crate::ap::Object {
            context: Some(crate::ap::ap_context()),
            kind: crate::ap::KIND_CREATE.to_string(),
            actor: Some(crate::ap::LinkOrObject::shallow(state.config().board_actor_url(&board.id))),
            object: Some(Box::new(crate::ap::LinkOrObject::full(note))),
            to: Some(crate::ap::StringOrList(recipients.clone())),
            ..Default::default()
        };
        fanout::fan_out(&state, &board, &create, recipients).await;
    });
}
