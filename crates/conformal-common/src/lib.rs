//! Shared source-position types for the Conformal type checker.

pub mod span;

pub use span::{LineIndex, Span};
