//! Converts between the native storage model and the wire AP object model.

use chrono::Utc;
use sqlx::SqlitePool;

use crate::ap::{Actor, Object, PublicKey};
use crate::ap::dual::LinkOrObject;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{Board, Post};
use crate::storage::{posts, replies};

/// `BoardToActor`: deterministic inbox/outbox/following/followers URLs, `type = "Group"`.
pub fn board_to_actor(cfg: &Config, board: &Board) -> Actor {
    let id = cfg.board_actor_url(&board.id);
    Actor {
        context: Some(crate::ap::ap_context()),
        id: Some(id.clone()),
        kind: crate::ap::KIND_GROUP.to_string(),
        name: Some(board.title.clone()),
        preferred_username: Some(board.id.clone()),
        summary: Some(board.description.clone()),
        inbox: Some(format!("{id}/inbox")),
        outbox: Some(format!("{id}/outbox")),
        followers: Some(format!("{id}/followers")),
        following: Some(format!("{id}/following")),
        public_key: Some(PublicKey {
            id: format!("{id}#key"),
            owner: id,
            public_key_pem: board.public_key_pem.clone(),
        }),
        ..Default::default()
    }
}

fn shallow_note_ref(cfg: &Config, post: &Post) -> LinkOrObject {
    let actor_url = if post.is_federated() {
        post.source.clone()
    } else {
        cfg.board_actor_url(&post.board)
    };
    LinkOrObject::full(Object {
        id: Some(post.apid.clone()),
        kind: crate::ap::KIND_NOTE.to_string(),
        actor: Some(LinkOrObject::shallow(actor_url)),
        ..Default::default()
    })
}

/// `PostToObject`: `content` carries raw text, never the rendered HTML.
///
/// `in_reply_to` seeds the list with an explicit immediate parent (as the caller sees
/// it, e.g. when composing an outbound reply before the edge table has settled); when
/// `with_in_reply_to` is set, the board's reply-edge table supplies every cite this post
/// records, merged in by apid so duplicates collapse. When `with_replies` is set, one
/// level of this thread's replies is embedded (never recursive).
pub async fn post_to_object(
    pool: &SqlitePool,
    cfg: &Config,
    post: &Post,
    mut in_reply_to: Vec<LinkOrObject>,
    with_replies: bool,
    with_in_reply_to: bool,
) -> Result<Object> {
    let actor_url = if post.is_federated() {
        post.source.clone()
    } else {
        cfg.board_actor_url(&post.board)
    };

    let attributed_to = if !post.name.is_empty() && post.name != "Anonymous" {
        Some(LinkOrObject::full(Object {
            name: Some(post.name.clone()),
            ..Default::default()
        }))
    } else {
        None
    };

    if with_in_reply_to {
        let known: Vec<&str> = in_reply_to.iter().filter_map(|l| l.id()).collect();
        let known: Vec<String> = known.into_iter().map(String::from).collect();
        for edge in replies::edges_from(pool, &post.board, post.id).await? {
            if let Some(target) = posts::find_by_id(pool, &post.board, edge.target).await? {
                if !known.iter().any(|id| id == &target.apid) {
                    in_reply_to.push(shallow_note_ref(cfg, &target));
                }
            }
        }
    }

    if in_reply_to.is_empty() {
        // Peer quirk: some implementations choke on a thread-starting Note with no
        // `inReplyTo` at all.
        in_reply_to = Object::empty_in_reply_to_placeholder();
    }

    let replies_field = if with_replies {
        let children = posts::list_thread_replies(pool, &post.board, post.id).await?;
        if children.is_empty() {
            None
        } else {
            let mut items = Vec::with_capacity(children.len());
            for child in &children {
                let mut item = Box::pin(post_to_object(pool, cfg, child, Vec::new(), false, false)).await?;
                item.in_reply_to = None;
                item.replies = None;
                item.updated = None;
                items.push(item);
            }
            Some(Box::new(Object {
                kind: crate::ap::KIND_ORDERED_COLLECTION.to_string(),
                total_items: Some(items.len() as u64),
                items: Some(items),
                ..Default::default()
            }))
        }
    } else {
        None
    };

    Ok(Object {
        id: Some(post.apid.clone()),
        kind: crate::ap::KIND_NOTE.to_string(),
        name: if post.subject.is_empty() { None } else { Some(post.subject.clone()) },
        attributed_to,
        actor: Some(LinkOrObject::shallow(actor_url)),
        content: Some(post.raw.clone()),
        published: Some(post.date),
        updated: Some(post.bumpdate),
        in_reply_to: Some(in_reply_to),
        replies: replies_field,
        ..Default::default()
    })
}

/// `ObjectToPost`: requires `type == "Note"` and a non-empty actor. Resolves `thread`
/// by walking `inReplyTo`; fails with [`Error::OrphanReply`] when every cited id is
/// known to be unresolvable, unless every entry is id-less (the empty-placeholder
/// peer quirk), in which case the object is treated as a new thread.
pub async fn object_to_post(pool: &SqlitePool, board: &str, object: &Object) -> Result<Post> {
    if object.kind != crate::ap::KIND_NOTE {
        return Err(Error::InvalidContent(format!("expected Note, got {}", object.kind)));
    }
    let actor = object
        .actor
        .as_ref()
        .and_then(|a| a.id())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::InvalidContent("Note has no actor".into()))?
        .to_string();
    let apid = object
        .id
        .clone()
        .ok_or_else(|| Error::InvalidContent("Note has no id".into()))?;

    let name = object
        .attributed_to
        .as_ref()
        .and_then(|a| match a {
            LinkOrObject::Link(s) => Some(s.clone()),
            LinkOrObject::Full(o) => o.name.clone(),
        })
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "Anonymous".to_string());

    let date = object.published.unwrap_or_else(Utc::now);
    let bumpdate = object.updated.unwrap_or(date);

    let mut thread = 0i64;
    let mut any_idful = false;
    if let Some(irt) = &object.in_reply_to {
        for entry in irt {
            let Some(id) = entry.id().filter(|s| !s.is_empty()) else { continue };
            any_idful = true;
            if let Some(found) = posts::find_by_apid(pool, board, id).await? {
                if found.thread == 0 {
                    thread = found.id;
                    break;
                }
            }
        }
        if thread == 0 && any_idful {
            return Err(Error::OrphanReply(apid));
        }
    }

    Ok(Post {
        board: board.to_string(),
        id: 0,
        thread,
        apid,
        name,
        tripcode: String::new(),
        subject: object.name.clone().unwrap_or_default(),
        source: actor,
        raw: object.content.clone().unwrap_or_default(),
        content: String::new(),
        date,
        bumpdate,
        flags: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{boards, schema};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn seeded_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        schema::upgrade(&pool).await.unwrap();
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
        pool
    }

    fn sample_post(id: i64, thread: i64, apid: &str) -> Post {
        Post {
            board: "g".into(),
            id,
            thread,
            apid: apid.into(),
            name: "Anonymous".into(),
            tripcode: String::new(),
            subject: String::new(),
            source: "127.0.0.1".into(),
            raw: "hello".into(),
            content: "hello".into(),
            date: Utc::now(),
            bumpdate: Utc::now(),
            flags: 0,
        }
    }

    #[test]
    fn board_to_actor_derives_standard_urls() {
        let cfg = Config::default();
        let board = Board {
            id: "g".into(),
            title: "Tech".into(),
            description: "".into(),
            public_key_pem: "pub".into(),
            private_key_pem: "priv".into(),
        };
        let actor = board_to_actor(&cfg, &board);
        assert_eq!(actor.kind, "Group");
        assert_eq!(actor.inbox.unwrap(), format!("{}/inbox", cfg.board_actor_url("g")));
    }

    #[tokio::test]
    async fn post_to_object_carries_raw_not_rendered_content() {
        let pool = seeded_pool().await;
        let cfg = Config::default();
        let post = sample_post(1, 0, "https://example.com/g/A0000001");
        let obj = post_to_object(&pool, &cfg, &post, Vec::new(), false, false).await.unwrap();
        assert_eq!(obj.content.as_deref(), Some("hello"));
        assert!(obj.attributed_to.is_none()); // Anonymous omits attribution
    }

    #[tokio::test]
    async fn object_to_post_requires_note_type() {
        let pool = seeded_pool().await;
        let obj = Object {
            kind: "Follow".into(),
            ..Default::default()
        };
        let err = object_to_post(&pool, "g", &obj).await.unwrap_err();
        assert!(matches!(err, Error::InvalidContent(_)));
    }

    #[tokio::test]
    async fn object_to_post_with_no_in_reply_to_is_a_new_thread() {
        let pool = seeded_pool().await;
        let obj = Object {
            kind: "Note".into(),
            id: Some("https://peer.example/g/B0000001".into()),
            actor: Some(LinkOrObject::shallow("https://peer.example/g")),
            content: Some("first post".into()),
            published: Some(Utc::now()),
            ..Default::default()
        };
        let post = object_to_post(&pool, "g", &obj).await.unwrap();
        assert_eq!(post.thread, 0);
        assert_eq!(post.name, "Anonymous");
    }

    #[tokio::test]
    async fn object_to_post_resolves_thread_from_known_op() {
        let pool = seeded_pool().await;
        let cfg = Config::default();
        let mut op = sample_post(0, 0, "");
        let op = posts::save_post(&pool, &cfg, &[], &mut op).await.unwrap();

        let obj = Object {
            kind: "Note".into(),
            id: Some("https://peer.example/g/B0000002".into()),
            actor: Some(LinkOrObject::shallow("https://peer.example/g")),
            content: Some("a reply".into()),
            published: Some(Utc::now()),
            in_reply_to: Some(vec![LinkOrObject::shallow(op.apid.clone())]),
            ..Default::default()
        };
        let post = object_to_post(&pool, "g", &obj).await.unwrap();
        assert_eq!(post.thread, op.id);
    }

    #[tokio::test]
    async fn object_to_post_fails_on_unresolvable_reply() {
        let pool = seeded_pool().await;
        let obj = Object {
            kind: "Note".into(),
            id: Some("https://peer.example/g/B0000003".into()),
            actor: Some(LinkOrObject::shallow("https://peer.example/g")),
            content: Some("orphan".into()),
            published: Some(Utc::now()),
            in_reply_to: Some(vec![LinkOrObject::shallow("https://example.com/g/F9999999")]),
            ..Default::default()
        };
        let err = object_to_post(&pool, "g", &obj).await.unwrap_err();
        assert!(matches!(err, Error::OrphanReply(_)));
    }
}
