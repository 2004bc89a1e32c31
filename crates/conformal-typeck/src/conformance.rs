//! The `ConformanceRef` sum type and its substitution engine.
//!
//! A conformance reference is a small value: either nothing (`Invalid`), a
//! handle to a concrete or pack payload in the `ConformanceArena`, or an
//! abstract `(type, interface)` pair for a type parameter whose witnesses
//! are not yet known. Queries route on the variant; constructing
//! operations (substitution, out-of-context mapping) intern new payloads
//! and never touch existing ones.

use std::fmt;

use conformal_common::Span;
use tracing::debug;

use crate::arena::{
    BuiltinConformance, ConformanceData, ConformanceId, PackConformance, PackConformanceId,
    SpecializedConformance,
};
use crate::context::{ConformanceCx, TypeContext};
use crate::decl::Requirement;
use crate::subst::{expansion_substituters, FnSubstitution, MapOutOfContext, Substituter, SubstitutionMap};
use crate::ty::{InterfaceRef, Ty};

/// Conformance of a type parameter (or other not-yet-specialized type) to
/// an interface. Carries no witnesses.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AbstractConformance {
    pub ty: Ty,
    pub interface: InterfaceRef,
}

/// A reference to a conformance in one of four states.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ConformanceRef {
    /// No conformance exists. Produced by error recovery.
    #[default]
    Invalid,
    /// A concrete conformance payload for a single non-pack type.
    Concrete(ConformanceId),
    /// An unspecialized `T: P`.
    Abstract(AbstractConformance),
    /// Element-wise conformance of a type pack.
    Pack(PackConformanceId),
}

impl ConformanceRef {
    // ── Construction ────────────────────────────────────────────────────

    pub fn for_abstract(ty: Ty, interface: InterfaceRef) -> Self {
        ConformanceRef::Abstract(AbstractConformance { ty, interface })
    }

    pub fn for_invalid() -> Self {
        ConformanceRef::Invalid
    }

    /// Wrap per-element conformances of `ty` (a `Ty::Pack`) into a pack
    /// conformance. Any invalid element makes the whole pack invalid.
    pub fn for_pack(
        tcx: &mut TypeContext,
        ty: Ty,
        interface: InterfaceRef,
        patterns: Vec<ConformanceRef>,
    ) -> Self {
        if let Ty::Pack(elements) = &ty {
            debug_assert_eq!(
                elements.len(),
                patterns.len(),
                "pack conformance needs one element conformance per pack element"
            );
        }
        if patterns.iter().any(ConformanceRef::is_invalid) {
            return ConformanceRef::Invalid;
        }
        let id = tcx.conformances.intern_pack(PackConformance { ty, interface, patterns });
        ConformanceRef::Pack(id)
    }

    // ── Variant tests ───────────────────────────────────────────────────

    pub fn is_invalid(&self) -> bool {
        matches!(self, ConformanceRef::Invalid)
    }

    pub fn is_concrete(&self) -> bool {
        matches!(self, ConformanceRef::Concrete(_))
    }

    pub fn is_abstract(&self) -> bool {
        matches!(self, ConformanceRef::Abstract(_))
    }

    pub fn is_pack(&self) -> bool {
        matches!(self, ConformanceRef::Pack(_))
    }

    pub fn as_concrete(&self) -> Option<ConformanceId> {
        match self {
            ConformanceRef::Concrete(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_abstract(&self) -> Option<&AbstractConformance> {
        match self {
            ConformanceRef::Abstract(conformance) => Some(conformance),
            _ => None,
        }
    }

    pub fn as_pack(&self) -> Option<PackConformanceId> {
        match self {
            ConformanceRef::Pack(id) => Some(*id),
            _ => None,
        }
    }

    /// The concrete payload handle. Panics on any other variant.
    pub fn concrete(&self) -> ConformanceId {
        match self {
            ConformanceRef::Concrete(id) => *id,
            other => panic!("expected a concrete conformance, found {:?}", other),
        }
    }

    /// The abstract pair. Panics on any other variant.
    pub fn abstract_conformance(&self) -> &AbstractConformance {
        match self {
            ConformanceRef::Abstract(conformance) => conformance,
            other => panic!("expected an abstract conformance, found {:?}", other),
        }
    }

    /// The pack payload handle. Panics on any other variant.
    pub fn pack(&self) -> PackConformanceId {
        match self {
            ConformanceRef::Pack(id) => *id,
            other => panic!("expected a pack conformance, found {:?}", other),
        }
    }

    // ── Queries ─────────────────────────────────────────────────────────

    /// The conforming type; `None` for `Invalid`.
    pub fn ty(&self, tcx: &TypeContext) -> Option<Ty> {
        match self {
            ConformanceRef::Invalid => None,
            ConformanceRef::Concrete(id) => Some(tcx.conformances.ty(*id)),
            ConformanceRef::Abstract(conformance) => Some(conformance.ty.clone()),
            ConformanceRef::Pack(id) => Some(tcx.conformances.pack(*id).ty.clone()),
        }
    }

    /// The interface conformed to; `None` for `Invalid`.
    pub fn interface(&self, tcx: &TypeContext) -> Option<InterfaceRef> {
        match self {
            ConformanceRef::Invalid => None,
            ConformanceRef::Concrete(id) => Some(tcx.conformances.interface(*id).clone()),
            ConformanceRef::Abstract(conformance) => Some(conformance.interface.clone()),
            ConformanceRef::Pack(id) => Some(tcx.conformances.pack(*id).interface.clone()),
        }
    }

    /// Conditional requirements of a concrete conformance. Abstract
    /// conformances are unconditional.
    pub fn conditional_requirements<'t>(&self, tcx: &'t TypeContext) -> &'t [Requirement] {
        match self {
            ConformanceRef::Concrete(id) => tcx.conformances.conditional_requirements(*id),
            _ => &[],
        }
    }

    // ── Substitution ────────────────────────────────────────────────────

    /// Substitute this conformance of `orig` to obtain the conformance of
    /// `orig`'s image under `s`.
    pub fn subst(&self, orig: &Ty, s: &dyn Substituter, cx: &mut ConformanceCx<'_>) -> ConformanceRef {
        match self {
            ConformanceRef::Invalid => ConformanceRef::Invalid,
            ConformanceRef::Concrete(id) => {
                let id = *id;
                cx.guarded("subst concrete", |cx| subst_concrete(id, s, cx))
            }
            ConformanceRef::Pack(id) => {
                let id = *id;
                cx.guarded("subst pack", |cx| subst_pack(id, s, cx))
            }
            ConformanceRef::Abstract(conformance) => subst_abstract(conformance, orig, s, cx),
        }
    }

    pub fn subst_map(
        &self,
        orig: &Ty,
        map: &SubstitutionMap,
        cx: &mut ConformanceCx<'_>,
    ) -> ConformanceRef {
        self.subst(orig, map, cx)
    }

    /// Substitute with a closure over types, resolving conformances through
    /// global discovery.
    pub fn subst_fn(
        &self,
        orig: &Ty,
        replace: impl Fn(&Ty) -> Option<Ty>,
        cx: &mut ConformanceCx<'_>,
    ) -> ConformanceRef {
        self.subst(orig, &FnSubstitution::new(replace), cx)
    }

    /// Erase archetypes back to interface types so the reference can be
    /// kept outside the generic environment it was computed in.
    pub fn map_out_of_context(&self, cx: &mut ConformanceCx<'_>) -> ConformanceRef {
        match self {
            ConformanceRef::Invalid => ConformanceRef::Invalid,
            ConformanceRef::Abstract(conformance) if !conformance.ty.has_archetypes() => self.clone(),
            ConformanceRef::Abstract(conformance) => ConformanceRef::for_abstract(
                conformance.ty.map_out_of_context(),
                conformance.interface.clone(),
            ),
            ConformanceRef::Concrete(_) | ConformanceRef::Pack(_) => {
                let orig = self.ty(cx.tcx).unwrap_or(Ty::Error);
                self.subst(&orig, &MapOutOfContext, cx)
            }
        }
    }

    // ── Diagnostics support ─────────────────────────────────────────────

    pub fn display<'a>(&'a self, tcx: &'a TypeContext) -> DisplayConformance<'a> {
        DisplayConformance { conformance: self, tcx }
    }

    /// Best source location: the declaring conformance for concrete
    /// references, the interface declaration for abstract ones.
    pub fn nearest_source_span(&self, tcx: &TypeContext) -> Option<Span> {
        match self {
            ConformanceRef::Concrete(id) => match tcx.conformances.get(tcx.conformances.root(*id)) {
                ConformanceData::Normal(normal) => normal.span,
                _ => None,
            },
            ConformanceRef::Abstract(conformance) => {
                tcx.decls.interface(conformance.interface.id).span
            }
            ConformanceRef::Invalid | ConformanceRef::Pack(_) => None,
        }
    }
}

fn subst_abstract(
    conformance: &AbstractConformance,
    orig: &Ty,
    s: &dyn Substituter,
    cx: &mut ConformanceCx<'_>,
) -> ConformanceRef {
    let interface = &conformance.interface;

    // Opaque archetypes stay abstract unless the caller asks to see through
    // them.
    if orig.is_opaque_archetype() && !s.options().substitute_opaque_archetypes {
        return ConformanceRef::for_abstract(orig.subst(s, cx), interface.clone());
    }

    let substituted = orig.subst(s, cx);

    // An existential can only conform to an interface by self-conformance.
    if substituted.is_existential() {
        let found = cx.lookup_conformance(&substituted, interface.id, true);
        if found.is_invalid() {
            debug!(ty = %substituted, interface = %interface, "existential does not self-conform");
        }
        return found;
    }

    s.lookup_conformance(cx, &orig.canonical(), &substituted, interface.id, 0)
}

enum ConcreteSubst {
    Unchanged,
    Specialize(ConformanceId, SubstitutionMap),
    Builtin(BuiltinConformance),
}

fn subst_concrete(id: ConformanceId, s: &dyn Substituter, cx: &mut ConformanceCx<'_>) -> ConformanceRef {
    let plan = match cx.tcx.conformances.get(id) {
        ConformanceData::Normal(normal) => {
            if cx.tcx.decls.signature(normal.signature).params.is_empty() {
                ConcreteSubst::Unchanged
            } else {
                ConcreteSubst::Specialize(id, SubstitutionMap::identity(&cx.tcx.decls, normal.signature))
            }
        }
        ConformanceData::Specialized(specialized) => {
            ConcreteSubst::Specialize(specialized.generic, specialized.subs.clone())
        }
        ConformanceData::Builtin(builtin) => ConcreteSubst::Builtin(builtin.clone()),
        ConformanceData::SelfConforming(_) => ConcreteSubst::Unchanged,
    };

    match plan {
        ConcreteSubst::Unchanged => ConformanceRef::Concrete(id),
        ConcreteSubst::Specialize(generic, subs) => {
            let subs = subs.subst(s, cx);
            specialize(generic, subs, cx)
        }
        ConcreteSubst::Builtin(builtin) => {
            let ty = builtin.ty.subst(s, cx);
            if ty == builtin.ty {
                return ConformanceRef::Concrete(id);
            }
            let conditional_requirements = builtin
                .conditional_requirements
                .iter()
                .map(|req| req.map_types(|t| t.subst(s, cx)))
                .collect();
            ConformanceRef::Concrete(cx.tcx.conformances.intern_builtin(BuiltinConformance {
                ty,
                interface: builtin.interface,
                missing: builtin.missing,
                conditional_requirements,
            }))
        }
    }
}

/// Apply a generic normal conformance to `subs`. An identity map yields
/// the generic conformance itself.
pub(crate) fn specialize(
    generic: ConformanceId,
    subs: SubstitutionMap,
    cx: &mut ConformanceCx<'_>,
) -> ConformanceRef {
    let (declared, conditional) = match cx.tcx.conformances.get(generic) {
        ConformanceData::Normal(normal) => {
            (normal.ty.clone(), normal.conditional_requirements.clone())
        }
        _ => return ConformanceRef::Concrete(generic),
    };
    if subs.is_identity(&cx.tcx.decls) {
        return ConformanceRef::Concrete(generic);
    }
    let ty = declared.subst(&subs, cx);
    let conditional_requirements = conditional
        .iter()
        .map(|req| req.map_types(|t| t.subst(&subs, cx)))
        .collect();
    ConformanceRef::Concrete(cx.tcx.conformances.intern_specialized(SpecializedConformance {
        generic,
        subs,
        ty,
        conditional_requirements,
    }))
}

fn subst_pack(id: PackConformanceId, s: &dyn Substituter, cx: &mut ConformanceCx<'_>) -> ConformanceRef {
    let pack = cx.tcx.conformances.pack(id).clone();
    let elements = match &pack.ty {
        Ty::Pack(elements) => elements.clone(),
        other => vec![other.clone()],
    };

    let mut types = Vec::with_capacity(elements.len());
    let mut patterns = Vec::with_capacity(pack.patterns.len());
    for (element, conformance) in elements.iter().zip(&pack.patterns) {
        if let Ty::PackExpansion(pattern) = element {
            if let Some(per_element) = expansion_substituters(pattern, s, cx.tcx) {
                for es in &per_element {
                    let ty = pattern.subst(es, cx);
                    patterns.push(conformance.subst(pattern, es, cx));
                    types.push(es.wrap(ty));
                }
                continue;
            }
            types.push(element.subst(s, cx));
            patterns.push(conformance.subst(pattern, s, cx));
            continue;
        }
        types.push(element.subst(s, cx));
        patterns.push(conformance.subst(element, s, cx));
    }

    ConformanceRef::for_pack(cx.tcx, Ty::Pack(types), pack.interface, patterns)
}

/// `Display` adapter returned by `ConformanceRef::display`.
pub struct DisplayConformance<'a> {
    conformance: &'a ConformanceRef,
    tcx: &'a TypeContext,
}

impl fmt::Display for DisplayConformance<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arena = &self.tcx.conformances;
        match self.conformance {
            ConformanceRef::Invalid => write!(f, "invalid"),
            ConformanceRef::Abstract(conformance) => {
                write!(f, "abstract {}: {}", conformance.ty, conformance.interface)
            }
            ConformanceRef::Concrete(id) => {
                let prefix = match arena.get(*id) {
                    ConformanceData::Builtin(builtin) if builtin.missing => "missing ",
                    ConformanceData::Builtin(_) => "builtin ",
                    _ => "",
                };
                write!(f, "{}{}: {}", prefix, arena.ty(*id), arena.interface(*id))
            }
            ConformanceRef::Pack(id) => {
                let pack = arena.pack(*id);
                write!(f, "pack {}: {}", pack.ty, pack.interface)
            }
        }
    }
}
