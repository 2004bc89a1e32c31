//! Conformance discovery.
//!
//! `ConformanceLookup` is the capability the engine calls at its fallback
//! points (existential self-conformance, archetype-local lookup, concrete
//! replacements of abstract map entries). `ConformanceTable` is a
//! registry-backed implementation: it stores declared conformances per
//! interface and finds the one whose declared type structurally matches a
//! query, discharging the conformance's requirements recursively.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace};

use crate::arena::{BuiltinConformance, ConformanceData, ConformanceId, NormalConformance};
use crate::conformance::{specialize, ConformanceRef};
use crate::context::{ConformanceCx, TypeContext};
use crate::decl::{DeclGraph, GenericSignatureId, InterfaceId, Requirement};
use crate::subst::{FnSubstitution, SubstitutionMap};
use crate::ty::Ty;
use crate::unify::MatchCtx;

/// Global conformance discovery.
pub trait ConformanceLookup {
    /// Find the conformance of `ty` to `interface`.
    ///
    /// With `allow_missing`, a failed search yields a missing-conformance
    /// placeholder instead of `ConformanceRef::Invalid`.
    fn lookup_conformance(
        &self,
        cx: &mut ConformanceCx<'_>,
        ty: &Ty,
        interface: InterfaceId,
        allow_missing: bool,
    ) -> ConformanceRef;
}

/// Registry of declared conformances.
#[derive(Debug, Default)]
pub struct ConformanceTable {
    /// Normal conformances keyed by interface, in registration order.
    normals: FxHashMap<InterfaceId, Vec<ConformanceId>>,
    /// Builtin conformances keyed by `(canonical type, interface)`.
    builtins: FxHashMap<(Ty, InterfaceId), ConformanceId>,
    self_conforming: FxHashSet<InterfaceId>,
}

impl ConformanceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a declared conformance.
    pub fn register_normal(&mut self, tcx: &mut TypeContext, normal: NormalConformance) -> ConformanceId {
        let interface = normal.interface.id;
        let id = tcx.conformances.alloc_normal(normal);
        self.normals.entry(interface).or_default().push(id);
        id
    }

    /// Register a compiler-provided conformance of exactly `ty`.
    pub fn register_builtin(&mut self, tcx: &mut TypeContext, ty: Ty, interface: InterfaceId) -> ConformanceId {
        let id = tcx.conformances.intern_builtin(BuiltinConformance {
            ty: ty.canonical(),
            interface: tcx.decls.interface_ref(interface),
            missing: false,
            conditional_requirements: Vec::new(),
        });
        self.builtins.insert((ty.canonical(), interface), id);
        id
    }

    /// Let `any Interface` conform to `Interface`.
    pub fn mark_self_conforming(&mut self, interface: InterfaceId) {
        self.self_conforming.insert(interface);
    }

    /// Declared conformances to `interface`.
    pub fn conformances_to(&self, interface: InterfaceId) -> &[ConformanceId] {
        self.normals.get(&interface).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Find a declared conformance whose type matches `ty` and whose
    /// requirements hold.
    fn find_declared(&self, cx: &mut ConformanceCx<'_>, ty: &Ty, interface: InterfaceId) -> ConformanceRef {
        for &id in self.conformances_to(interface) {
            let (declared, signature) = match cx.tcx.conformances.get(id) {
                ConformanceData::Normal(normal) => (normal.ty.clone(), normal.signature),
                _ => continue,
            };

            let mut m = MatchCtx::new();
            let pattern = m.instantiate(&declared);
            let query = m.import(ty);
            if let Err(err) = m.unify(pattern, query) {
                trace!(candidate = %declared, query = %ty, error = %err, "declared conformance does not match");
                continue;
            }

            let params = cx.tcx.decls.signature(signature).params.clone();
            let Some(types) = params.iter().map(|p| m.binding(p)).collect::<Option<Vec<Ty>>>() else {
                trace!(candidate = %declared, "generic parameter left unbound by match");
                continue;
            };
            if types.is_empty() {
                return ConformanceRef::Concrete(id);
            }

            match self.discharge(cx, signature, &types) {
                Some(conformances) => {
                    let subs = SubstitutionMap::new(&cx.tcx.decls, signature, types, conformances);
                    return specialize(id, subs, cx);
                }
                None => {
                    trace!(candidate = %declared, query = %ty, "requirements of declared conformance not satisfied");
                }
            }
        }
        ConformanceRef::Invalid
    }

    /// Check a signature's requirements under `types`, producing the
    /// conformance for each conformance requirement.
    fn discharge(
        &self,
        cx: &mut ConformanceCx<'_>,
        signature: GenericSignatureId,
        types: &[Ty],
    ) -> Option<Vec<ConformanceRef>> {
        let sig = cx.tcx.decls.signature(signature).clone();
        let replace = |ty: &Ty| match ty {
            Ty::Param(param) => sig.param_index(param).map(|i| types[i].clone()),
            _ => None,
        };
        let s = FnSubstitution::new(replace);

        let mut conformances = Vec::new();
        for requirement in &sig.requirements {
            match requirement {
                Requirement::Conformance(subject, interface) => {
                    let subject = subject.subst(&s, cx);
                    let found = cx.lookup_conformance(&subject, interface.id, false);
                    if found.is_invalid() {
                        return None;
                    }
                    conformances.push(found);
                }
                Requirement::SameType(first, second) => {
                    let first = first.subst(&s, cx);
                    let second = second.subst(&s, cx);
                    if first.canonical() != second.canonical() {
                        return None;
                    }
                }
            }
        }
        Some(conformances)
    }
}

/// Whether the generic signature guarantees `ty: interface`, either
/// directly or through the requirement signature of the interface that
/// declares `ty`'s associated type.
fn signature_guarantees(decls: &DeclGraph, signature: GenericSignatureId, ty: &Ty, interface: InterfaceId) -> bool {
    if decls.requires_conformance(signature, ty, interface) {
        return true;
    }
    let Ty::DependentMember(base, assoc) = ty else {
        return false;
    };
    let subject = Ty::member(Ty::self_ty(), assoc);
    let declared = decls
        .interface(assoc.interface)
        .requirement_signature
        .iter()
        .any(|req| match req {
            Requirement::Conformance(s, required) => {
                *s == subject && (required.id == interface || decls.inherits(required.id, interface))
            }
            Requirement::SameType(..) => false,
        });
    declared && signature_guarantees(decls, signature, base, assoc.interface)
}

impl ConformanceLookup for ConformanceTable {
    fn lookup_conformance(
        &self,
        cx: &mut ConformanceCx<'_>,
        ty: &Ty,
        interface: InterfaceId,
        allow_missing: bool,
    ) -> ConformanceRef {
        let ty = ty.canonical();
        let interface_ref = cx.tcx.decls.interface_ref(interface);

        if ty.is_error() {
            return ConformanceRef::Invalid;
        }
        if ty.is_type_parameter()
            || ty.is_type_variable_or_member()
            || matches!(ty, Ty::Opaque(_) | Ty::Placeholder | Ty::Unresolved)
        {
            return ConformanceRef::for_abstract(ty, interface_ref);
        }

        let found = match &ty {
            Ty::Archetype(archetype) => {
                let signature = cx.tcx.decls.environment(archetype.env).signature;
                if signature_guarantees(&cx.tcx.decls, signature, &archetype.interface_ty, interface) {
                    ConformanceRef::for_abstract(ty.clone(), interface_ref.clone())
                } else {
                    ConformanceRef::Invalid
                }
            }
            Ty::Existential(members) => {
                if members.len() == 1
                    && members[0].id == interface
                    && self.self_conforming.contains(&interface)
                {
                    ConformanceRef::Concrete(cx.tcx.conformances.intern_self(interface_ref.clone()))
                } else {
                    ConformanceRef::Invalid
                }
            }
            Ty::Pack(elements) => {
                let mut patterns = Vec::with_capacity(elements.len());
                for element in elements {
                    let conforming = match element {
                        Ty::PackExpansion(pattern) => &**pattern,
                        other => other,
                    };
                    patterns.push(self.lookup_conformance(cx, conforming, interface, allow_missing));
                }
                ConformanceRef::for_pack(cx.tcx, ty.clone(), interface_ref.clone(), patterns)
            }
            Ty::Con(..) => {
                let declared = cx.guarded("lookup", |cx| self.find_declared(cx, &ty, interface));
                match self.builtins.get(&(ty.clone(), interface)) {
                    Some(&id) if declared.is_invalid() => ConformanceRef::Concrete(id),
                    _ => declared,
                }
            }
            _ => ConformanceRef::Invalid,
        };

        if !found.is_invalid() {
            return found;
        }
        if !allow_missing {
            debug!(ty = %ty, interface = %interface_ref, "no conformance found");
            return ConformanceRef::Invalid;
        }

        debug!(ty = %ty, interface = %interface_ref, "no conformance found; using missing placeholder");
        let id = cx.tcx.conformances.intern_builtin(BuiltinConformance {
            ty,
            interface: interface_ref,
            missing: true,
            conditional_requirements: Vec::new(),
        });
        ConformanceRef::Concrete(id)
    }
}
