//! Common utilities shared across the Perimeter validation authority
//!
//! This crate provides the pieces every other crate leans on:
//!
//! - [`observability`]: tracing initialization and the [`ValidationLog`]
//!   buffer that validation components write notice/audit lines through.

pub mod observability;

pub use observability::{init_tracing, LogEntry, LogSeverity, ValidationLog};
