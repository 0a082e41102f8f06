//! Process lifecycle.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Settings → connect Redis (PING) → connect NATS → Backends
//!     (commands that never touch the bus open only the store)
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → every subscriber's recv() resolves → reload handles dropped
//! ```
//!
//! # Design Decisions
//! - Ordered startup: settings first, then store, then bus
//! - Fail fast: any startup error is fatal
//! - Every connection attempt is bounded by the connect timeout

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{connect, connect_bus, connect_store, Backends};
