//! Post-ingest pipeline: cross-reference rewriting, reply-edge construction, content
//! filtering and SJIS detection, shared by local posts and federated ingest alike.

pub mod crossref;
pub mod local;
pub mod sjis;
