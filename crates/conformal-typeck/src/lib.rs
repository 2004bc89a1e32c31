//! Conformal type checker: protocol conformance references.
//!
//! This crate implements the part of a type checker that represents and
//! manipulates evidence that a type satisfies an interface. A
//! `ConformanceRef` is invalid, concrete (a payload in the arena), abstract
//! (`T: P` for a type parameter) or a pack; the engine substitutes such
//! references through generic substitutions, projects associated types and
//! conformances out of them, canonicalizes them and walks them for missing,
//! unavailable and isolated pieces.
//!
//! # Architecture
//!
//! - [`ty`]: Type representation (Ty, GenericParam, archetypes, packs)
//! - [`decl`]: Interfaces, generic signatures and environments
//! - [`context`]: The compilation context, engine config and `ConformanceCx`
//! - [`subst`]: Substitution maps and the `Substituter` interface
//! - [`arena`]: Owner of concrete and pack conformance payloads
//! - [`conformance`]: `ConformanceRef` and conformance substitution
//! - [`projection`]: Type witnesses and associated conformances
//! - [`canonical`]: Canonical forms
//! - [`traversal`]: Missing / unavailable / isolated walks
//! - [`lookup`]: Conformance discovery (`ConformanceLookup`, `ConformanceTable`)
//! - [`unify`]: Structural matching used by discovery
//! - [`error`]: Match errors and conformance issues
//! - [`diagnostics`]: Ariadne rendering of conformance issues

pub mod arena;
pub mod canonical;
pub mod conformance;
pub mod context;
pub mod decl;
pub mod diagnostics;
pub mod error;
pub mod lookup;
pub mod projection;
pub mod subst;
pub mod traversal;
pub mod ty;
pub mod unify;

pub use arena::{ConformanceArena, ConformanceId, NormalConformance, PackConformanceId};
pub use conformance::{AbstractConformance, ConformanceRef};
pub use context::{ConformanceCx, EngineConfig, TypeContext};
pub use decl::{DeclGraph, GenericSignature, InterfaceId, Requirement};
pub use lookup::{ConformanceLookup, ConformanceTable};
pub use subst::{SubstOptions, Substituter, SubstitutionMap};
pub use ty::{AssocTypeRef, GenericParam, InterfaceRef, Ty};
