#![forbid(unsafe_code)]
#![warn(
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! File-backed configuration for the hsadmin CLI.
//!
//! Layout: `model.rs` (typed configuration, defaults, validation),
//! `loader.rs` (path resolution, YAML load/save), `error.rs` (`ConfigError`).

pub mod error;
pub mod loader;
pub mod model;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    CONFIG_FILE_NAME, default_config_path, expand_home, load_from, load_or_default, save_to,
};
pub use model::{
    AUTO_RETRIEVAL, AdminConfig, ConfigPatch, DEFAULT_ADMIN_PATH, DEFAULT_BASE_URL,
    DEFAULT_MATRIX_PATH, DEFAULT_TIMEOUT_SECS, OutputFormat,
};
