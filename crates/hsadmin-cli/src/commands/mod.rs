//! Command handlers grouped by admin API resource.

pub(crate) mod config;
pub(crate) mod history;
pub(crate) mod matrix;
pub(crate) mod media;
pub(crate) mod notice;
pub(crate) mod regtok;
pub(crate) mod room;
pub(crate) mod server;
pub(crate) mod user;
