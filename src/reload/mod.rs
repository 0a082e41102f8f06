//! Live configuration and bus-driven reloads.
//!
//! # Data Flow
//! ```text
//! RemoteEnvLoader::load
//!     fetch_all(key) → merge over base env → materialize → LiveConfig
//!
//! bus message on <root>.<project>[.<field>]
//!     → parse_reload_subject → All | Field(f)
//!     → LiveConfig::reload_all / reload_field   (write lock held)
//!         fetch → patched copy of the map → materialize
//!         ok:  commit map, swap record, generation += 1
//!         err: keep both, report
//!     → reply "ok" | error text
//! ```
//!
//! # Design Decisions
//! - The record visible to readers is always the product of one complete
//!   successful materialization
//! - A subject suffix names a field key verbatim, dots included
//! - Nothing here is global; every live config is owned and shared by `Arc`

pub mod coordinator;
pub mod live;
pub mod loader;
pub mod subject;

pub use coordinator::{request_reload, ReloadCoordinator, ReloadHandle, DEFAULT_SUBJECT_ROOT};
pub use live::{LiveConfig, ReloadError};
pub use loader::{RemoteEnvLoader, DEFAULT_FETCH_TIMEOUT};
pub use subject::{parse_reload_subject, ReloadTarget};

/// Reply text for a reload that installed a new record.
pub const REPLY_OK: &str = "ok";
