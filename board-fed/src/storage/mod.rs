//! The storage engine: per-board dynamic SQLite tables plus the global schema.

pub mod boards;
pub mod captcha;
pub mod follows;
pub mod moderation;
pub mod posts;
pub mod regexps;
pub mod replies;
pub mod schema;
