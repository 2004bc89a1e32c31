//! Compilation-context state shared by every conformance operation.
//!
//! `TypeContext` owns the declaration graph, the conformance arena and the
//! engine configuration. `ConformanceCx` pairs a mutable borrow of it with
//! the injected discovery service, and is what every constructing operation
//! (substitution, projection, canonicalization through lookup) takes.

use serde::Deserialize;
use tracing::warn;

use crate::arena::ConformanceArena;
use crate::conformance::ConformanceRef;
use crate::decl::{DeclGraph, InterfaceId};
use crate::lookup::ConformanceLookup;
use crate::ty::Ty;

fn default_depth() -> usize {
    256
}

/// Tunables for the conformance engine.
///
/// Every field has a default, so an empty JSON object is a valid
/// configuration.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Maximum nesting of substitution / projection through concrete and
    /// pack payloads before degrading to an invalid conformance.
    pub max_substitution_depth: usize,
    /// Maximum depth of the missing / unavailable / isolated walks.
    pub max_traversal_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_substitution_depth: default_depth(),
            max_traversal_depth: default_depth(),
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// The compilation context: declarations, conformance payloads and config.
#[derive(Debug, Default)]
pub struct TypeContext {
    pub decls: DeclGraph,
    pub conformances: ConformanceArena,
    pub config: EngineConfig,
}

impl TypeContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        TypeContext { config, ..Self::default() }
    }
}

/// A mutable borrow of the `TypeContext` together with the discovery
/// service used at fallback points.
pub struct ConformanceCx<'a> {
    pub tcx: &'a mut TypeContext,
    discovery: &'a dyn ConformanceLookup,
    depth: usize,
}

impl<'a> ConformanceCx<'a> {
    pub fn new(tcx: &'a mut TypeContext, discovery: &'a dyn ConformanceLookup) -> Self {
        ConformanceCx { tcx, discovery, depth: 0 }
    }

    /// Current nesting of guarded operations.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Ask the discovery service for `ty: interface`.
    pub fn lookup_conformance(
        &mut self,
        ty: &Ty,
        interface: InterfaceId,
        allow_missing: bool,
    ) -> ConformanceRef {
        let discovery = self.discovery;
        discovery.lookup_conformance(self, ty, interface, allow_missing)
    }

    /// Run `f` one level deeper, or return `ConformanceRef::Invalid` when the
    /// configured depth bound has been reached.
    pub(crate) fn guarded(
        &mut self,
        what: &str,
        f: impl FnOnce(&mut Self) -> ConformanceRef,
    ) -> ConformanceRef {
        if self.depth >= self.tcx.config.max_substitution_depth {
            warn!(
                depth = self.depth,
                operation = what,
                "conformance recursion bound reached; degrading to invalid"
            );
            return ConformanceRef::Invalid;
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }
}
