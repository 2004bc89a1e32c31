//! Error and issue types.
//!
//! The conformance engine itself never fails: unresolvable cases are
//! encoded as data (`ConformanceRef::Invalid`, missing builtins). What lives
//! here is what the layers around it report: structural match failures
//! from conformance discovery, and the issues a diagnostics pass collects
//! from a finished conformance.

use std::fmt;

use conformal_common::Span;

use crate::ty::{Ty, TyVar};

/// Failure to match a declared conforming type against a queried type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MatchError {
    /// The two types have different shapes.
    Mismatch { expected: Ty, found: Ty },
    /// A type variable would have to contain itself.
    InfiniteType { var: TyVar, ty: Ty },
}

impl fmt::Display for MatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchError::Mismatch { expected, found } => {
                write!(f, "type mismatch: expected `{}`, found `{}`", expected, found)
            }
            MatchError::InfiniteType { var, ty } => {
                write!(f, "infinite type: `?{}` occurs in `{}`", var.0, ty)
            }
        }
    }
}

impl std::error::Error for MatchError {}

/// Something wrong with a conformance that the engine carried through as
/// data and a later pass wants to report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConformanceIssue {
    /// Discovery found nothing and substituted a missing placeholder.
    Missing { ty: Ty, interface: String },
    /// The conformance is declared in an unavailable extension.
    Unavailable {
        ty: Ty,
        interface: String,
        span: Option<Span>,
    },
    /// The conformance is isolated to a global actor.
    Isolated {
        ty: Ty,
        interface: String,
        actor: String,
        span: Option<Span>,
    },
}

impl ConformanceIssue {
    /// Stable diagnostic code.
    pub fn code(&self) -> &'static str {
        match self {
            ConformanceIssue::Missing { .. } => "C0001",
            ConformanceIssue::Unavailable { .. } => "C0002",
            ConformanceIssue::Isolated { .. } => "C0003",
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            ConformanceIssue::Missing { .. } => None,
            ConformanceIssue::Unavailable { span, .. } | ConformanceIssue::Isolated { span, .. } => {
                *span
            }
        }
    }
}

impl fmt::Display for ConformanceIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConformanceIssue::Missing { ty, interface } => {
                write!(f, "type `{}` does not conform to `{}`", ty, interface)
            }
            ConformanceIssue::Unavailable { ty, interface, .. } => {
                write!(f, "conformance of `{}` to `{}` is unavailable", ty, interface)
            }
            ConformanceIssue::Isolated {
                ty, interface, actor, ..
            } => {
                write!(
                    f,
                    "conformance of `{}` to `{}` is isolated to global actor `{}`",
                    ty, interface, actor
                )
            }
        }
    }
}

impl std::error::Error for ConformanceIssue {}
