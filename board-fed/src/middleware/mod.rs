//! Ingress middleware: request-id tracking and the posting ban check.
//!
//! HTTP signature verification lives in `federation::inbox` (it needs the
//! target board and the parsed activity, not just the raw request); moderator
//! session/JWT issuance is an external collaborator this codebase does not
//! implement (see `storage::moderation` for the row-level primitives it does own).

pub mod ban;
pub mod request_tracking;

pub use ban::check_ban;
pub use request_tracking::{
    request_id_layer, request_id_propagation_layer, sensitive_headers_layer, RequestTrackingConfig,
    PROPAGATE_HEADERS, SENSITIVE_HEADERS,
};
