//! Core infrastructure for callguard.
//!
//! This crate provides the pieces shared by the rate limiter and circuit breaker crates:
//! - Event system for observability
//! - The closed [`FailureKind`] classification of failed outbound calls
//! - [`FailureClassifier`], mapping call results to failure kinds
//! - [`GuardError`], the unified error surface raised to callers

pub mod classifier;
pub mod error;
pub mod events;
pub mod failure;

pub use classifier::{DefaultClassifier, FailureClassifier, FnClassifier};
pub use error::GuardError;
pub use events::{EventListener, EventListeners, FnListener, GuardEvent};
pub use failure::FailureKind;
