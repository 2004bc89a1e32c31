//! Witness and associated-conformance projection.
//!
//! Given a conformance `T: P`, these queries answer "what is `T.Assoc`?"
//! and "how does `T.Assoc` conform to `Q`?". Concrete payloads answer from
//! their recorded witnesses, abstract conformances answer structurally,
//! and invalid conformances answer with error-shaped placeholders.

use tracing::debug;

use crate::arena::{ConformanceData, ConformanceId, PackConformance, ValueWitness};
use crate::conformance::ConformanceRef;
use crate::context::ConformanceCx;
use crate::decl::{InterfaceId, ValueRequirementId};
use crate::subst::SubstitutionMap;
use crate::ty::{AssocTypeRef, Ty};

/// The declaration a named witness query resolved to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WitnessDecl {
    /// The interface requirement itself; no witness table exists.
    Requirement(ValueRequirementId),
    /// The member a concrete conformance declared as the witness.
    Member(ValueWitness),
}

/// A witness declaration together with the substitutions to apply to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WitnessRef {
    pub decl: WitnessDecl,
    pub subs: SubstitutionMap,
}

fn error_member(assoc: &AssocTypeRef) -> Ty {
    Ty::member(Ty::Error, assoc)
}

fn pack_elements(ty: &Ty) -> Vec<Ty> {
    match ty {
        Ty::Pack(elements) => elements.clone(),
        other => vec![other.clone()],
    }
}

impl ConformanceRef {
    /// The type bound to `assoc` for `conforming`.
    ///
    /// Never fails: unresolvable witnesses come back as `<<error type>>.Assoc`.
    ///
    /// Panics when called on an abstract conformance whose conforming type is
    /// not a type parameter, archetype, inference variable, unresolved type
    /// or placeholder.
    pub fn type_witness(&self, conforming: &Ty, assoc: &AssocTypeRef, cx: &mut ConformanceCx<'_>) -> Ty {
        match self {
            ConformanceRef::Pack(id) => {
                let pack = cx.tcx.conformances.pack(*id).clone();
                assert_eq!(
                    conforming.canonical(),
                    pack.ty.canonical(),
                    "pack conformance queried with a different conforming type"
                );
                pack_type_witness(&pack, assoc, cx)
            }
            ConformanceRef::Invalid => error_member(assoc),
            ConformanceRef::Concrete(id) => match concrete_type_witness(*id, assoc, cx) {
                // An error witness is as unusable as a missing one.
                Some(witness) if !witness.is_error() => witness,
                _ => error_member(assoc),
            },
            ConformanceRef::Abstract(_) => {
                if let Some(archetype) = conforming.as_archetype() {
                    return cx.tcx.decls.nested_type(archetype, assoc);
                }
                assert!(
                    conforming.is_type_parameter()
                        || conforming.is_type_variable_or_member()
                        || matches!(conforming, Ty::Unresolved | Ty::Placeholder),
                    "type witness of abstract conformance requested for non-generic type `{}`",
                    conforming
                );
                Ty::member(conforming.clone(), assoc)
            }
        }
    }

    /// Substitute an associated-type expression over `Self` (e.g.
    /// `Self.Iterator.Element`) through this conformance. `Error` for an
    /// invalid conformance.
    pub fn associated_type(&self, conforming: &Ty, assoc_ty: &Ty, cx: &mut ConformanceCx<'_>) -> Ty {
        let Some(interface) = self.interface(cx.tcx) else {
            return Ty::Error;
        };
        let subs = SubstitutionMap::protocol_substitutions(
            &cx.tcx.decls,
            interface.id,
            conforming.clone(),
            self.clone(),
        );
        assoc_ty.subst(&subs, cx)
    }

    /// The conformance of `assoc_ty` (an expression over `Self`) to
    /// `target`, projected out of this conformance of `conforming`.
    pub fn associated_conformance(
        &self,
        conforming: &Ty,
        assoc_ty: &Ty,
        target: InterfaceId,
        cx: &mut ConformanceCx<'_>,
    ) -> ConformanceRef {
        match self {
            ConformanceRef::Invalid => ConformanceRef::Invalid,
            ConformanceRef::Pack(id) => {
                let pack = cx.tcx.conformances.pack(*id).clone();
                assert_eq!(
                    conforming.canonical(),
                    pack.ty.canonical(),
                    "pack conformance queried with a different conforming type"
                );
                cx.guarded("pack associated conformance", |cx| {
                    pack_associated_conformance(&pack, assoc_ty, target, cx)
                })
            }
            ConformanceRef::Concrete(id) => {
                let id = *id;
                assert_eq!(
                    conforming.canonical(),
                    cx.tcx.conformances.ty(id).canonical(),
                    "concrete conformance queried with a different conforming type"
                );
                cx.guarded("associated conformance", |cx| {
                    concrete_associated_conformance(id, conforming, assoc_ty, target, cx)
                })
            }
            ConformanceRef::Abstract(_) => {
                if let Some(archetype) = conforming.as_archetype() {
                    let interface_ty = (*archetype.interface_ty).clone();
                    let subject = replace_self(assoc_ty, &interface_ty);
                    let subject = cx.tcx.decls.map_type_into_context(archetype.env, &subject);
                    debug!(subject = %subject, "associated conformance of archetype via local lookup");
                    return cx.lookup_conformance(&subject, target, false);
                }
                let subject = replace_self(assoc_ty, conforming);
                ConformanceRef::for_abstract(subject, cx.tcx.decls.interface_ref(target))
            }
        }
    }

    /// Look up the value witness for the requirement called `name`.
    ///
    /// `None` when the interface has no single requirement by that name, or
    /// the concrete conformance records no witness for it.
    pub fn witness_by_name(&self, conforming: &Ty, name: &str, cx: &mut ConformanceCx<'_>) -> Option<WitnessRef> {
        let interface = self.interface(cx.tcx)?;
        let requirement = cx.tcx.decls.interface(interface.id).single_requirement(name)?;

        let ConformanceRef::Concrete(id) = self else {
            let subs = SubstitutionMap::protocol_substitutions(
                &cx.tcx.decls,
                interface.id,
                conforming.clone(),
                self.clone(),
            );
            return Some(WitnessRef { decl: WitnessDecl::Requirement(requirement), subs });
        };

        let arena = &cx.tcx.conformances;
        let witness = match arena.get(arena.root(*id)) {
            ConformanceData::Normal(normal) => normal.value_witnesses.get(name)?.clone(),
            _ => return None,
        };
        let subs = match arena.get(*id) {
            ConformanceData::Specialized(specialized) => specialized.subs.clone(),
            ConformanceData::Normal(normal) => SubstitutionMap::identity(&cx.tcx.decls, normal.signature),
            _ => SubstitutionMap::empty(),
        };
        Some(WitnessRef { decl: WitnessDecl::Member(witness), subs })
    }

    /// `type_witness` for the associated type called `name`. `Error` when
    /// the interface has no such associated type.
    pub fn type_witness_by_name(&self, conforming: &Ty, name: &str, cx: &mut ConformanceCx<'_>) -> Ty {
        let Some(interface) = self.interface(cx.tcx) else {
            return Ty::Error;
        };
        let Some(assoc) = cx.tcx.decls.interface(interface.id).associated_type(name) else {
            return Ty::Error;
        };
        self.type_witness(conforming, &assoc, cx)
    }
}

/// Rewrite the interface's `Self` parameter inside `assoc_ty`.
fn replace_self(assoc_ty: &Ty, replacement: &Ty) -> Ty {
    assoc_ty.transform(&mut |ty| match ty {
        Ty::Param(_) => Some(replacement.clone()),
        _ => None,
    })
}

fn concrete_type_witness(id: ConformanceId, assoc: &AssocTypeRef, cx: &mut ConformanceCx<'_>) -> Option<Ty> {
    match cx.tcx.conformances.get(id) {
        ConformanceData::Normal(normal) => normal.type_witnesses.get(assoc).cloned(),
        ConformanceData::Specialized(specialized) => {
            let generic = specialized.generic;
            let subs = specialized.subs.clone();
            let witness = concrete_type_witness(generic, assoc, cx)?;
            Some(witness.subst(&subs, cx))
        }
        ConformanceData::Builtin(_) | ConformanceData::SelfConforming(_) => None,
    }
}

fn pack_type_witness(pack: &PackConformance, assoc: &AssocTypeRef, cx: &mut ConformanceCx<'_>) -> Ty {
    let elements = pack_elements(&pack.ty);
    let mut witnesses = Vec::with_capacity(elements.len());
    for (element, conformance) in elements.iter().zip(&pack.patterns) {
        match element {
            Ty::PackExpansion(pattern) => {
                let witness = conformance.type_witness(pattern, assoc, cx);
                witnesses.push(Ty::PackExpansion(Box::new(witness)));
            }
            _ => witnesses.push(conformance.type_witness(element, assoc, cx)),
        }
    }
    Ty::Pack(witnesses)
}

fn pack_associated_conformance(
    pack: &PackConformance,
    assoc_ty: &Ty,
    target: InterfaceId,
    cx: &mut ConformanceCx<'_>,
) -> ConformanceRef {
    let elements = pack_elements(&pack.ty);
    let mut subjects = Vec::with_capacity(elements.len());
    let mut patterns = Vec::with_capacity(elements.len());
    for (element, conformance) in elements.iter().zip(&pack.patterns) {
        let (conforming, is_expansion) = match element {
            Ty::PackExpansion(pattern) => (&**pattern, true),
            other => (other, false),
        };
        let subject = conformance.associated_type(conforming, assoc_ty, cx);
        subjects.push(if is_expansion { Ty::PackExpansion(Box::new(subject)) } else { subject });
        patterns.push(conformance.associated_conformance(conforming, assoc_ty, target, cx));
    }
    let interface = cx.tcx.decls.interface_ref(target);
    ConformanceRef::for_pack(cx.tcx, Ty::Pack(subjects), interface, patterns)
}

fn concrete_associated_conformance(
    id: ConformanceId,
    conforming: &Ty,
    assoc_ty: &Ty,
    target: InterfaceId,
    cx: &mut ConformanceCx<'_>,
) -> ConformanceRef {
    match cx.tcx.conformances.get(id) {
        ConformanceData::Normal(normal) => {
            let key = (assoc_ty.canonical(), target);
            if let Some(recorded) = normal.associated_conformances.get(&key) {
                return recorded.clone();
            }
            let subject = ConformanceRef::Concrete(id).associated_type(conforming, assoc_ty, cx);
            if subject.is_error() {
                return ConformanceRef::Invalid;
            }
            cx.lookup_conformance(&subject, target, false)
        }
        ConformanceData::Specialized(specialized) => {
            let generic = specialized.generic;
            let subs = specialized.subs.clone();
            let generic_ty = cx.tcx.conformances.ty(generic);
            let found = concrete_associated_conformance(generic, &generic_ty, assoc_ty, target, cx);
            let orig = match &found {
                ConformanceRef::Concrete(_) | ConformanceRef::Pack(_) => {
                    found.ty(cx.tcx).unwrap_or(Ty::Error)
                }
                _ => ConformanceRef::Concrete(generic).associated_type(&generic_ty, assoc_ty, cx),
            };
            found.subst(&orig, &subs, cx)
        }
        ConformanceData::Builtin(_) => ConformanceRef::Invalid,
        ConformanceData::SelfConforming(_) => {
            if *assoc_ty == Ty::self_ty() {
                cx.lookup_conformance(conforming, target, true)
            } else {
                ConformanceRef::Invalid
            }
        }
    }
}
