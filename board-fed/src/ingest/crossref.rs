//! Cross-reference (cite) rewriting: resolves `>>N` and `>>apid` references, builds
//! reply edges, and renders the remaining markup (greentext, line breaks).

use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::SqlitePool;

use crate::error::Result;
use crate::models::Post;
use crate::storage::posts;

static CITE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r">>(https?://\S+|\d+)").unwrap());
static GREENTEXT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^&gt;[^\n]*").unwrap());

/// Everything [`process`] discovers while rewriting one post's raw text.
pub struct CrossrefResult {
    /// HTML-safe rendered content.
    pub content: String,
    /// `raw`, rewritten so resolved numeric cites become apid-form for federation.
    pub raw: String,
    /// Ids of posts on this board that this post cites and should gain a reply edge.
    pub reply_targets: Vec<i64>,
}

/// Process `raw` for a post whose board is `board` and whose own thread (0 if it will
/// become a new OP) is `current_thread`. `is_local_origin` gates whether numeric `>>N`
/// cites are recognized — federated posters must use the apid form.
pub async fn process(
    pool: &SqlitePool,
    board: &str,
    current_thread: i64,
    raw: &str,
    is_local_origin: bool,
) -> Result<CrossrefResult> {
    let mut reply_targets = Vec::new();
    let mut rewritten_raw = String::with_capacity(raw.len());
    let mut rendered = String::with_capacity(raw.len());
    let mut last_end = 0;

    for m in CITE_RE.find_iter(raw) {
        let matched = m.as_str();
        let target_str = &matched[2..]; // strip leading ">>"
        let is_numeric = target_str.chars().all(|c| c.is_ascii_digit());

        rewritten_raw.push_str(escape_html(&raw[last_end..m.start()]).as_str());
        rendered.push_str(escape_html(&raw[last_end..m.start()]).as_str());
        last_end = m.end();

        if is_numeric && !is_local_origin {
            // Federated posters must use the apid form; a bare numeric cite from a
            // federated post is just literal text.
            let escaped = escape_html(matched);
            rewritten_raw.push_str(&escaped);
            rendered.push_str(&escaped);
            continue;
        }

        let resolved = if is_numeric {
            let id: i64 = target_str.parse().unwrap_or(0);
            posts::find_by_id(pool, board, id).await?
        } else {
            posts::find_by_apid(pool, board, target_str).await?
        };

        match resolved {
            None => {
                rendered.push_str(&format!(
                    r#"<a href="#" class="cite invalid">{}</a>"#,
                    escape_html(matched)
                ));
                rewritten_raw.push_str(&escape_html(matched));
            }
            Some(target) => {
                let same_thread = current_thread != 0
                    && (target.thread == current_thread || (target.thread == 0 && target.id == current_thread));

                let class = if same_thread {
                    "cite"
                } else if target.thread == 0 {
                    "cite op"
                } else {
                    "cite crossthread"
                };

                rendered.push_str(&format!(
                    r#"<a href="#p{}" class="{}">&gt;&gt;{}</a>"#,
                    target.id, class, target.id
                ));

                // Federation always sees the apid form, regardless of how the cite
                // was originally written.
                rewritten_raw.push_str(&format!(">>{}", target.apid));

                if same_thread {
                    reply_targets.push(target.id);
                }
            }
        }
    }

    rewritten_raw.push_str(&escape_html(&raw[last_end..]));
    rendered.push_str(&escape_html(&raw[last_end..]));

    let rendered = render_greentext(&rendered);
    let rendered = rendered.replace('\n', "<br/>");

    Ok(CrossrefResult {
        content: rendered,
        raw: rewritten_raw,
        reply_targets,
    })
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn render_greentext(s: &str) -> String {
    GREENTEXT_RE
        .replace_all(s, |caps: &regex::Captures| format!(r#"<span class="quote">{}</span>"#, &caps[0]))
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{boards, posts, schema};
    use chrono::Utc;
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
            &crate::models::Board {
                id: "g".into(),
                title: "Tech".into(),
                description: String::new(),
                public_key_pem: "pub".into(),
                private_key_pem: "priv".into(),
            },
        )
        .await
        .unwrap();
        pool
    }

    fn op(board: &str, id: i64, apid: &str) -> Post {
        Post {
            board: board.into(),
            id,
            thread: 0,
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

    #[tokio::test]
    async fn greentext_and_newlines_are_rendered() {
        let pool = seeded_pool().await;
        let result = process(&pool, "g", 0, ">good post\nline two", true).await.unwrap();
        assert!(result.content.contains(r#"<span class="quote">&gt;good post</span>"#));
        assert!(result.content.contains("<br/>"));
    }

    #[tokio::test]
    async fn unresolved_numeric_cite_is_marked_invalid() {
        let pool = seeded_pool().await;
        let result = process(&pool, "g", 0, ">>999", true).await.unwrap();
        assert!(result.content.contains("cite invalid"));
        assert!(result.reply_targets.is_empty());
    }

    #[tokio::test]
    async fn same_thread_cite_creates_reply_target() {
        let pool = seeded_pool().await;
        let mut op_post = op("g", 1, "https://example.com/g/A0000001");
        posts::insert_raw(&pool, &op_post).await.unwrap();
        op_post.id = 1;

        let result = process(&pool, "g", 1, ">>1 hi", true).await.unwrap();
        assert_eq!(result.reply_targets, vec![1]);
        assert!(result.content.contains(r#"<a href="#p1" class="cite">&gt;&gt;1</a>"#));
    }

    #[tokio::test]
    async fn cross_thread_cite_to_an_op_is_marked_op() {
        let pool = seeded_pool().await;
        let op_post = op("g", 1, "https://example.com/g/A0000001");
        posts::insert_raw(&pool, &op_post).await.unwrap();

        // current_thread = 2 (a different thread); citing post 1, which is itself an OP.
        let result = process(&pool, "g", 2, ">>1", true).await.unwrap();
        assert!(result.content.contains(r#"class="cite op""#));
        assert!(result.reply_targets.is_empty());
    }

    #[tokio::test]
    async fn federated_post_ignores_numeric_cite() {
        let pool = seeded_pool().await;
        let result = process(&pool, "g", 0, ">>1", false).await.unwrap();
        assert!(result.reply_targets.is_empty());
        assert!(!result.content.contains("cite"));
    }
}
