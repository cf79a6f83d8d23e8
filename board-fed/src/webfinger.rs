//! WebFinger discovery and the actor cache.

use serde::Deserialize;

use crate::ap::Actor;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::Board;
use crate::state::AppState;

/// A WebFinger JRD response: we only care about the `links` array.
#[derive(Debug, Deserialize)]
struct JrdDocument {
    #[serde(default)]
    links: Vec<JrdLink>,
}

#[derive(Debug, Deserialize)]
struct JrdLink {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    href: Option<String>,
}

const ACTIVITY_JSON: &str = "application/activity+json";

/// Resolve `actor_url` (an `http(s)://host/user`-shaped identifier) to its actor
/// document, consulting and populating the cache on the way.
pub async fn finger(state: &AppState, actor_url: &str) -> Result<Actor> {
    if let Some(actor) = state.actor_cache().get(actor_url) {
        return Ok(actor.clone());
    }

    let (scheme, host, user) = split_actor_url(actor_url)?;

    let webfinger_url = format!("{scheme}://{host}/.well-known/webfinger?resource=acct:{user}@{host}");
    let jrd: JrdDocument = state
        .http_client()
        .get(&webfinger_url)
        .send()
        .await
        .map_err(|e| Error::Transport(e.to_string()))?
        .json()
        .await
        .map_err(|e| Error::Transport(e.to_string()))?;

    let link = jrd
        .links
        .into_iter()
        .find(|l| l.kind.as_deref() == Some(ACTIVITY_JSON) && l.href.is_some())
        .ok_or_else(|| Error::NoActor(actor_url.to_string()))?;
    let href = link.href.expect("checked by find predicate");

    let actor: Actor = state
        .http_client()
        .get(&href)
        .header(
            "Accept",
            r#"application/ld+json; profile="https://www.w3.org/ns/activitystreams""#,
        )
        .send()
        .await
        .map_err(|e| Error::Transport(e.to_string()))?
        .json()
        .await
        .map_err(|e| Error::Transport(e.to_string()))?;

    state.actor_cache().insert(actor_url.to_string(), actor.clone());
    Ok(actor)
}

/// Build the JRD this server answers `GET /.well-known/webfinger` with, for a board
/// reachable as `acct:{board}@{fqdn}`.
pub fn jrd_for_board(cfg: &Config, board: &Board) -> serde_json::Value {
    serde_json::json!({
        "subject": format!("acct:{}@{}", board.id, cfg.service.fqdn),
        "links": [{
            "rel": "self",
            "type": ACTIVITY_JSON,
            "href": cfg.board_actor_url(&board.id),
        }]
    })
}

/// Parse a `?resource=acct:user@host` WebFinger query parameter into `(user, host)`.
pub fn parse_acct_resource(resource: &str) -> Option<(String, String)> {
    let rest = resource.strip_prefix("acct:")?;
    let (user, host) = rest.split_once('@')?;
    if user.is_empty() || host.is_empty() {
        return None;
    }
    Some((user.to_string(), host.to_string()))
}

/// Extract `(scheme, host, user)` from an actor URL of the form `scheme://host/user`.
fn split_actor_url(actor_url: &str) -> Result<(String, String, String)> {
    let parsed = url::Url::parse(actor_url).map_err(|_| Error::BadFormat(actor_url.to_string()))?;
    let scheme = parsed.scheme().to_string();
    let host = parsed
        .host_str()
        .ok_or_else(|| Error::BadFormat(actor_url.to_string()))?
        .to_string();
    let user = parsed
        .path_segments()
        .and_then(|mut segs| segs.next())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::BadFormat(actor_url.to_string()))?
        .to_string();

    if scheme != "http" && scheme != "https" {
        return Err(Error::BadFormat(actor_url.to_string()));
    }

    Ok((scheme, host, user))
}
