//! Depth-first predicates over everything a conformance reaches.
//!
//! Every walk has the same shape: check the conformance's root property,
//! then recurse into the conformances of its substitution map, then (for
//! packs) into each element. Abstract and invalid conformances reach
//! nothing. Visitors return `true` to stop the walk, which makes the
//! predicate return `true`.

use tracing::warn;

use crate::arena::{BuiltinConformance, ConformanceData, ConformanceId, NormalConformance};
use crate::conformance::ConformanceRef;
use crate::context::TypeContext;
use crate::error::ConformanceIssue;

fn any_reachable<F>(tcx: &TypeContext, conformance: &ConformanceRef, depth: usize, visit: &mut F) -> bool
where
    F: FnMut(ConformanceId, &ConformanceRef) -> bool,
{
    if depth > tcx.config.max_traversal_depth {
        warn!(depth, "conformance traversal bound reached; stopping");
        return false;
    }
    match conformance {
        ConformanceRef::Invalid | ConformanceRef::Abstract(_) => false,
        ConformanceRef::Concrete(id) => {
            if visit(*id, conformance) {
                return true;
            }
            tcx.conformances
                .substitution_conformances(*id)
                .iter()
                .any(|nested| any_reachable(tcx, nested, depth + 1, visit))
        }
        ConformanceRef::Pack(id) => tcx
            .conformances
            .pack(*id)
            .patterns
            .iter()
            .any(|element| any_reachable(tcx, element, depth + 1, visit)),
    }
}

/// The root normal conformance behind `id`, if it has one.
fn root_normal(tcx: &TypeContext, id: ConformanceId) -> Option<&NormalConformance> {
    match tcx.conformances.get(tcx.conformances.root(id)) {
        ConformanceData::Normal(normal) => Some(normal),
        _ => None,
    }
}

impl ConformanceRef {
    pub fn has_unavailable_conformance(&self, tcx: &TypeContext) -> bool {
        self.for_each_unavailable_conformance(tcx, |_, _| true)
    }

    /// Visit every reachable conformance declared in an unavailable
    /// context.
    pub fn for_each_unavailable_conformance(
        &self,
        tcx: &TypeContext,
        mut visit: impl FnMut(ConformanceId, &NormalConformance) -> bool,
    ) -> bool {
        any_reachable(tcx, self, 0, &mut |id, _| match root_normal(tcx, id) {
            Some(normal) if normal.context.is_unavailable_extension() => visit(id, normal),
            _ => false,
        })
    }

    pub fn has_missing_conformance(&self, tcx: &TypeContext) -> bool {
        self.for_each_missing_conformance(tcx, |_, _| true)
    }

    /// Visit every reachable missing-conformance placeholder.
    pub fn for_each_missing_conformance(
        &self,
        tcx: &TypeContext,
        mut visit: impl FnMut(ConformanceId, &BuiltinConformance) -> bool,
    ) -> bool {
        any_reachable(tcx, self, 0, &mut |id, _| match tcx.conformances.get(id) {
            ConformanceData::Builtin(builtin) if builtin.missing => visit(id, builtin),
            _ => false,
        })
    }

    /// Visit every reachable conformance isolated to a global actor.
    pub fn for_each_isolated_conformance(
        &self,
        tcx: &TypeContext,
        mut visit: impl FnMut(&ConformanceRef) -> bool,
    ) -> bool {
        any_reachable(tcx, self, 0, &mut |id, conformance| match root_normal(tcx, id) {
            Some(normal) if normal.isolation.is_some() => visit(conformance),
            _ => false,
        })
    }

    /// Every missing, unavailable and isolated conformance reachable from
    /// this one, in walk order per kind.
    pub fn collect_issues(&self, tcx: &TypeContext) -> Vec<ConformanceIssue> {
        let mut issues = Vec::new();
        self.for_each_missing_conformance(tcx, |_, builtin| {
            issues.push(ConformanceIssue::Missing {
                ty: builtin.ty.clone(),
                interface: builtin.interface.name.clone(),
            });
            false
        });
        self.for_each_unavailable_conformance(tcx, |id, normal| {
            issues.push(ConformanceIssue::Unavailable {
                ty: tcx.conformances.ty(id),
                interface: normal.interface.name.clone(),
                span: normal.span,
            });
            false
        });
        self.for_each_isolated_conformance(tcx, |conformance| {
            if let ConformanceRef::Concrete(id) = conformance {
                if let Some(normal) = root_normal(tcx, *id) {
                    issues.push(ConformanceIssue::Isolated {
                        ty: tcx.conformances.ty(*id),
                        interface: normal.interface.name.clone(),
                        actor: normal.isolation.clone().unwrap_or_default(),
                        span: normal.span,
                    });
                }
            }
            false
        });
        issues
    }
}
