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

//! Homeserver-agnostic administration primitives.
//!
//! Layout: `device.rs` (device records and inventories), `prune.rs`
//! (retention policy and the device prune selector), `pagination.rs`
//! (cursor-driven listing walks, blocking and async).

pub mod device;
pub mod pagination;
pub mod prune;

pub use device::{Device, DeviceInventory, NEVER_SEEN_TS};
pub use pagination::{
    MalformedPage, OnMalformed, Page, PageError, Paginator, paginate, paginate_stream,
};
pub use prune::{DevicePruneSelector, MILLIS_PER_DAY, RetentionPolicy, select_devices_to_prune};
