//! Resilience helpers.
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - No automatic retries: a failed reload is reported and left to the
//!   next push

pub mod timeouts;
