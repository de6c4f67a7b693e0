//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Transport failure on a backend:
//!     → retries.rs: retries < max_retries? wait, retry same backend
//!     → otherwise: mark backend dead, next attempt on another backend
//!     → attempts > max_attempts: reject with 503
//! ```
//!
//! # Design Decisions
//! - Fixed short delay between retries
//! - Failover budget is bounded per request
//! - A backend marked dead only comes back through a health probe

pub mod retries;

pub use retries::{AttemptState, FailureAction, RetryPolicy};
