//! Hook dispatch: a process-global ordered set of sinks notified of post create/delete
//! events. Grounded on `hook/hook.go` and `hook/web.go`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

const MAX_ATTEMPTS: u32 = 3;

/// Marshalled once per event and delivered to every sink unchanged.
#[derive(Debug, Clone, Serialize)]
pub struct Payload {
    pub id: &'static str,
    pub date: DateTime<Utc>,
    pub data: serde_json::Value,
}

pub const EVENT_POST_CREATED: &str = "post.created";
pub const EVENT_POST_DELETED: &str = "post.deleted";

impl Payload {
    pub fn post_created(board: &str, post: &crate::models::Post) -> Self {
        Self {
            id: EVENT_POST_CREATED,
            date: Utc::now(),
            data: serde_json::json!({ "board": board, "post": post }),
        }
    }

    pub fn post_deleted(board: &str, post_id: i64, actor: &str, reason: &str) -> Self {
        Self {
            id: EVENT_POST_DELETED,
            date: Utc::now(),
            data: serde_json::json!({ "board": board, "post": post_id, "actor": actor, "reason": reason }),
        }
    }
}

/// A single delivery destination. Sinks own their own retry accounting; the registry
/// only fans out concurrently and logs failures.
#[async_trait]
pub trait HookSink: Send + Sync {
    async fn call(&self, payload: &Payload);
}

/// Delivers a payload as an HTTP POST, retrying up to [`MAX_ATTEMPTS`] times with no
/// back-off — a transient failure on one attempt is expected to clear by the next.
pub struct WebhookSink {
    endpoint: String,
    client: reqwest::Client,
}

impl WebhookSink {
    pub fn new(endpoint: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            endpoint: endpoint.into(),
            client,
        }
    }
}

#[async_trait]
impl HookSink for WebhookSink {
    async fn call(&self, payload: &Payload) {
        for attempt in 1..=MAX_ATTEMPTS {
            match self.client.post(&self.endpoint).json(payload).send().await {
                Ok(resp) if resp.status().is_success() => return,
                Ok(resp) => tracing::warn!(endpoint = %self.endpoint, status = %resp.status(), attempt, "hook delivery rejected"),
                Err(e) => tracing::warn!(endpoint = %self.endpoint, error = %e, attempt, "hook delivery failed"),
            }
        }
    }
}

/// The process-global ordered sink registry.
pub struct HookRegistry {
    sinks: Vec<Box<dyn HookSink>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn register(&mut self, sink: Box<dyn HookSink>) {
        self.sinks.push(sink);
    }

    /// Deliver `payload` to every registered sink concurrently. A sink failing after
    /// its retries does not affect the others.
    pub async fn dispatch(&self, payload: Payload) {
        let deliveries = self.sinks.iter().map(|sink| sink.call(&payload));
        futures::future::join_all(deliveries).await;
    }
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingSink(Arc<AtomicUsize>);

    #[async_trait]
    impl HookSink for CountingSink {
        async fn call(&self, _payload: &Payload) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn dispatch_reaches_every_sink() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut registry = HookRegistry::new();
        registry.register(Box::new(CountingSink(counter.clone())));
        registry.register(Box::new(CountingSink(counter.clone())));

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
            date: Utc::now(),
            bumpdate: Utc::now(),
            flags: 0,
        };
        registry.dispatch(Payload::post_created("g", &post)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
