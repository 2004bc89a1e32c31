//! Substitution maps and in-flight substitution.
//!
//! A `SubstitutionMap` records, for one generic signature, a replacement
//! type per generic parameter and a conformance per conformance
//! requirement. The `Substituter` trait is the thin interface the engine
//! substitutes through: it replaces type parameters (and, when asked,
//! archetypes) and answers "which conformance does this substituted type
//! have?". Maps, out-of-context mapping and closure-driven substitution all
//! implement it.

use tracing::trace;

use crate::conformance::ConformanceRef;
use crate::context::{ConformanceCx, TypeContext};
use crate::decl::{DeclGraph, GenericSignatureId, InterfaceId};
use crate::ty::{AssocTypeRef, GenericParam, OpaqueArchetype, Ty};

/// Flags that change how a substitution treats archetypes and packs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SubstOptions {
    /// Replace opaque result-type archetypes instead of leaving them (and
    /// their conformances) abstract.
    pub substitute_opaque_archetypes: bool,
    /// Offer primary archetypes to `Substituter::replace`.
    pub substitute_primary_archetypes: bool,
    /// Never splice a pack expansion into the enclosing pack.
    pub preserve_pack_expansion_level: bool,
}

impl SubstOptions {
    pub fn substituting_opaque_archetypes(mut self) -> Self {
        self.substitute_opaque_archetypes = true;
        self
    }

    pub fn substituting_primary_archetypes(mut self) -> Self {
        self.substitute_primary_archetypes = true;
        self
    }

    pub fn preserving_pack_expansion_level(mut self) -> Self {
        self.preserve_pack_expansion_level = true;
        self
    }
}

/// An in-flight substitution.
pub trait Substituter {
    fn options(&self) -> SubstOptions {
        SubstOptions::default()
    }

    /// The replacement for a generic parameter or archetype, if any.
    fn replace(&self, tcx: &TypeContext, ty: &Ty) -> Option<Ty>;

    /// The conformance of `substituted` (the image of `orig`) to
    /// `interface`. `level` is the pack-expansion nesting level of the
    /// query.
    fn lookup_conformance(
        &self,
        cx: &mut ConformanceCx<'_>,
        orig: &Ty,
        substituted: &Ty,
        interface: InterfaceId,
        level: u32,
    ) -> ConformanceRef;
}

/// Types whose conformances must be concrete (or a self-conformance)
/// rather than abstract.
fn needs_concrete_conformance(ty: &Ty) -> bool {
    match ty {
        Ty::Con(..) | Ty::Existential(_) | Ty::Pack(_) => true,
        Ty::Alias(_, underlying) => needs_concrete_conformance(underlying),
        _ => false,
    }
}

// ── SubstitutionMap ────────────────────────────────────────────────────

/// An immutable mapping from a signature's generic parameters to
/// replacement types, and from its conformance requirements to
/// conformances.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct SubstitutionMap {
    signature: Option<GenericSignatureId>,
    replacement_types: Vec<Ty>,
    conformances: Vec<ConformanceRef>,
}

impl SubstitutionMap {
    /// The map for the empty signature.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a map for `signature`.
    ///
    /// Panics when the number of replacement types or conformances does not
    /// match the signature.
    pub fn new(
        decls: &DeclGraph,
        signature: GenericSignatureId,
        replacement_types: Vec<Ty>,
        conformances: Vec<ConformanceRef>,
    ) -> Self {
        let sig = decls.signature(signature);
        assert_eq!(
            sig.params.len(),
            replacement_types.len(),
            "substitution map needs one replacement type per generic parameter"
        );
        assert_eq!(
            sig.conformance_requirements().count(),
            conformances.len(),
            "substitution map needs one conformance per conformance requirement"
        );
        if sig.is_empty() {
            return Self::empty();
        }
        SubstitutionMap {
            signature: Some(signature),
            replacement_types,
            conformances,
        }
    }

    /// Every parameter maps to itself and every requirement to its own
    /// abstract conformance.
    pub fn identity(decls: &DeclGraph, signature: GenericSignatureId) -> Self {
        let sig = decls.signature(signature);
        let types = sig.params.iter().cloned().map(Ty::Param).collect();
        let conformances = sig
            .conformance_requirements()
            .map(|(subject, interface)| {
                ConformanceRef::for_abstract(subject.clone(), interface.clone())
            })
            .collect();
        Self::new(decls, signature, types, conformances)
    }

    /// The map for an interface's own signature: `Self := ty` with
    /// `Self: Interface := conformance`.
    pub fn protocol_substitutions(
        decls: &DeclGraph,
        interface: InterfaceId,
        ty: Ty,
        conformance: ConformanceRef,
    ) -> Self {
        let signature = decls.interface(interface).signature;
        Self::new(decls, signature, vec![ty], vec![conformance])
    }

    pub fn signature(&self) -> Option<GenericSignatureId> {
        self.signature
    }

    pub fn replacement_types(&self) -> &[Ty] {
        &self.replacement_types
    }

    pub fn conformances(&self) -> &[ConformanceRef] {
        &self.conformances
    }

    pub fn is_empty(&self) -> bool {
        self.signature.is_none()
    }

    pub fn is_identity(&self, decls: &DeclGraph) -> bool {
        match self.signature {
            None => true,
            Some(signature) => *self == Self::identity(decls, signature),
        }
    }

    pub fn replacement_for(&self, decls: &DeclGraph, param: &GenericParam) -> Option<&Ty> {
        let sig = decls.signature(self.signature?);
        sig.param_index(param).map(|i| &self.replacement_types[i])
    }

    /// Rebuild the map from already-transformed parts.
    pub(crate) fn with_parts(&self, replacement_types: Vec<Ty>, conformances: Vec<ConformanceRef>) -> Self {
        SubstitutionMap {
            signature: self.signature,
            replacement_types,
            conformances,
        }
    }

    /// Apply `s` to every replacement type and conformance.
    ///
    /// Each conformance is substituted against the type its requirement's
    /// subject has under this map.
    pub fn subst(&self, s: &dyn Substituter, cx: &mut ConformanceCx<'_>) -> SubstitutionMap {
        let Some(signature) = self.signature else {
            return self.clone();
        };
        let replacement_types = self
            .replacement_types
            .iter()
            .map(|ty| ty.subst(s, cx))
            .collect();
        let subjects: Vec<Ty> = cx
            .tcx
            .decls
            .signature(signature)
            .conformance_requirements()
            .map(|(subject, _)| subject.clone())
            .collect();
        let mut conformances = Vec::with_capacity(self.conformances.len());
        for (subject, conformance) in subjects.iter().zip(&self.conformances) {
            let orig = subject.subst(self, cx);
            conformances.push(conformance.subst(&orig, s, cx));
        }
        self.with_parts(replacement_types, conformances)
    }

    /// Find the conformance of a type parameter by walking the
    /// signature's requirement paths: a direct requirement, a requirement
    /// on an inheriting interface, or an associated conformance of the
    /// parameter's base.
    pub fn conformance_for(
        &self,
        cx: &mut ConformanceCx<'_>,
        orig: &Ty,
        interface: InterfaceId,
    ) -> ConformanceRef {
        let Some(signature) = self.signature else {
            return ConformanceRef::Invalid;
        };
        if !orig.is_type_parameter() {
            return ConformanceRef::Invalid;
        }

        let decls = &cx.tcx.decls;
        let sig = decls.signature(signature);
        if let Some(index) = sig.conformance_index(orig, interface) {
            return self.conformances[index].clone();
        }

        let inherited = sig
            .conformance_requirements()
            .position(|(subject, required)| {
                subject == orig && decls.inherits(required.id, interface)
            });
        if let Some(index) = inherited {
            let conformance = self.conformances[index].clone();
            let ty = orig.subst(self, cx);
            return conformance.associated_conformance(&ty, &Ty::self_ty(), interface, cx);
        }

        if let Ty::DependentMember(base, assoc) = orig {
            let base_conformance = self.conformance_for(cx, base, assoc.interface);
            if !base_conformance.is_invalid() {
                let base_ty = base.subst(self, cx);
                let assoc_ty = Ty::member(Ty::self_ty(), assoc);
                return base_conformance.associated_conformance(&base_ty, &assoc_ty, interface, cx);
            }
        }

        ConformanceRef::Invalid
    }
}

impl Substituter for SubstitutionMap {
    fn replace(&self, tcx: &TypeContext, ty: &Ty) -> Option<Ty> {
        match ty {
            Ty::Param(param) => self.replacement_for(&tcx.decls, param).cloned(),
            _ => None,
        }
    }

    fn lookup_conformance(
        &self,
        cx: &mut ConformanceCx<'_>,
        orig: &Ty,
        substituted: &Ty,
        interface: InterfaceId,
        _level: u32,
    ) -> ConformanceRef {
        let found = self.conformance_for(cx, orig, interface);
        // The map's output signature is unknown here, so an abstract answer
        // for a concrete replacement has to be re-derived globally.
        if found.is_abstract() && needs_concrete_conformance(substituted) {
            trace!(ty = %substituted, "abstract conformance for concrete replacement; consulting discovery");
            return cx.lookup_conformance(substituted, interface, false);
        }
        // No requirement path in the map; discovery decides.
        if found.is_invalid() && !substituted.is_error() {
            trace!(ty = %substituted, "no requirement path in substitution map; consulting discovery");
            return cx.lookup_conformance(substituted, interface, false);
        }
        found
    }
}

// ── Other substituters ─────────────────────────────────────────────────

/// Maps archetypes back to the interface types they stand for, making
/// every conformance of a generic type abstract.
#[derive(Clone, Copy, Debug, Default)]
pub struct MapOutOfContext;

impl Substituter for MapOutOfContext {
    fn options(&self) -> SubstOptions {
        SubstOptions::default()
            .preserving_pack_expansion_level()
            .substituting_primary_archetypes()
    }

    fn replace(&self, _tcx: &TypeContext, ty: &Ty) -> Option<Ty> {
        match ty {
            Ty::Archetype(archetype) => Some(archetype.interface_ty.map_out_of_context()),
            _ => None,
        }
    }

    fn lookup_conformance(
        &self,
        cx: &mut ConformanceCx<'_>,
        _orig: &Ty,
        substituted: &Ty,
        interface: InterfaceId,
        _level: u32,
    ) -> ConformanceRef {
        ConformanceRef::for_abstract(substituted.clone(), cx.tcx.decls.interface_ref(interface))
    }
}

/// Substitution driven by a closure over types; conformances come from
/// global discovery.
pub struct FnSubstitution<F> {
    replace: F,
    options: SubstOptions,
}

impl<F: Fn(&Ty) -> Option<Ty>> FnSubstitution<F> {
    pub fn new(replace: F) -> Self {
        FnSubstitution { replace, options: SubstOptions::default() }
    }

    pub fn with_options(mut self, options: SubstOptions) -> Self {
        self.options = options;
        self
    }
}

impl<F: Fn(&Ty) -> Option<Ty>> Substituter for FnSubstitution<F> {
    fn options(&self) -> SubstOptions {
        self.options
    }

    fn replace(&self, _tcx: &TypeContext, ty: &Ty) -> Option<Ty> {
        (self.replace)(ty)
    }

    fn lookup_conformance(
        &self,
        cx: &mut ConformanceCx<'_>,
        _orig: &Ty,
        substituted: &Ty,
        interface: InterfaceId,
        _level: u32,
    ) -> ConformanceRef {
        cx.lookup_conformance(substituted, interface, false)
    }
}

/// Substitutes one element of a pack expansion: the pack parameter maps to
/// a single element of its replacement pack, and pack conformances for it
/// are projected to that element.
pub(crate) struct PackElementSubstituter<'s> {
    inner: &'s dyn Substituter,
    param: GenericParam,
    element: Ty,
    index: usize,
    is_expansion: bool,
}

impl PackElementSubstituter<'_> {
    /// Re-wrap a substituted pattern when the element was itself an
    /// expansion.
    pub(crate) fn wrap(&self, ty: Ty) -> Ty {
        if self.is_expansion {
            Ty::PackExpansion(Box::new(ty))
        } else {
            ty
        }
    }
}

impl Substituter for PackElementSubstituter<'_> {
    fn options(&self) -> SubstOptions {
        self.inner.options()
    }

    fn replace(&self, tcx: &TypeContext, ty: &Ty) -> Option<Ty> {
        match ty {
            Ty::Param(param) if *param == self.param => Some(self.element.clone()),
            _ => self.inner.replace(tcx, ty),
        }
    }

    fn lookup_conformance(
        &self,
        cx: &mut ConformanceCx<'_>,
        orig: &Ty,
        substituted: &Ty,
        interface: InterfaceId,
        level: u32,
    ) -> ConformanceRef {
        let found = self
            .inner
            .lookup_conformance(cx, orig, substituted, interface, level + 1);
        match found {
            ConformanceRef::Pack(id) if orig.root_generic_param() == Some(&self.param) => cx
                .tcx
                .conformances
                .pack(id)
                .patterns
                .get(self.index)
                .cloned()
                .unwrap_or(ConformanceRef::Invalid),
            other => other,
        }
    }
}

/// The pack parameter a pack-expansion pattern expands over.
fn pack_param_of(pattern: &Ty) -> Option<GenericParam> {
    let mut found = None;
    pattern.walk(&mut |ty| {
        if let Ty::Param(param) = ty {
            if param.is_pack && found.is_none() {
                found = Some(param.clone());
            }
        }
    });
    found
}

/// One substituter per element when `s` replaces the pattern's pack
/// parameter with a concrete pack; `None` when the expansion stays.
pub(crate) fn expansion_substituters<'s>(
    pattern: &Ty,
    s: &'s dyn Substituter,
    tcx: &TypeContext,
) -> Option<Vec<PackElementSubstituter<'s>>> {
    if s.options().preserve_pack_expansion_level {
        return None;
    }
    let param = pack_param_of(pattern)?;
    match s.replace(tcx, &Ty::Param(param.clone()))? {
        Ty::Pack(elements) => Some(
            elements
                .into_iter()
                .enumerate()
                .map(|(index, element)| {
                    let (element, is_expansion) = match element {
                        Ty::PackExpansion(inner) => (*inner, true),
                        other => (other, false),
                    };
                    PackElementSubstituter {
                        inner: s,
                        param: param.clone(),
                        element,
                        index,
                        is_expansion,
                    }
                })
                .collect(),
        ),
        _ => None,
    }
}

// ── Type substitution ──────────────────────────────────────────────────

impl Ty {
    /// Apply a substitution to this type.
    pub fn subst(&self, s: &dyn Substituter, cx: &mut ConformanceCx<'_>) -> Ty {
        let options = s.options();
        match self {
            Ty::Param(_) => s.replace(cx.tcx, self).unwrap_or_else(|| self.clone()),
            Ty::Archetype(_) if options.substitute_primary_archetypes => {
                s.replace(cx.tcx, self).unwrap_or_else(|| self.clone())
            }
            Ty::Opaque(_) if options.substitute_opaque_archetypes => {
                s.replace(cx.tcx, self).unwrap_or_else(|| self.clone())
            }
            Ty::Archetype(_) | Ty::Opaque(_) => self.clone(),
            Ty::DependentMember(base, assoc) => {
                let new_base = base.subst(s, cx);
                project_member(base, new_base, assoc, s, cx)
            }
            Ty::Con(con, args) => {
                Ty::Con(con.clone(), args.iter().map(|arg| arg.subst(s, cx)).collect())
            }
            Ty::Pack(elements) => {
                let mut out = Vec::with_capacity(elements.len());
                for element in elements {
                    match element {
                        Ty::PackExpansion(pattern) => {
                            match expansion_substituters(pattern, s, cx.tcx) {
                                Some(per_element) => {
                                    for es in &per_element {
                                        let ty = pattern.subst(es, cx);
                                        out.push(es.wrap(ty));
                                    }
                                }
                                None => out.push(element.subst(s, cx)),
                            }
                        }
                        other => out.push(other.subst(s, cx)),
                    }
                }
                Ty::Pack(out)
            }
            Ty::PackExpansion(pattern) => Ty::PackExpansion(Box::new(pattern.subst(s, cx))),
            Ty::Alias(name, underlying) => {
                Ty::Alias(name.clone(), Box::new(underlying.subst(s, cx)))
            }
            Ty::Existential(_) | Ty::Var(_) | Ty::Placeholder | Ty::Unresolved | Ty::Error => {
                self.clone()
            }
        }
    }
}

/// Resolve `orig_base.assoc` once its base has been substituted.
fn project_member(
    orig_base: &Ty,
    new_base: Ty,
    assoc: &AssocTypeRef,
    s: &dyn Substituter,
    cx: &mut ConformanceCx<'_>,
) -> Ty {
    if new_base.is_type_parameter()
        || new_base.is_type_variable_or_member()
        || matches!(new_base, Ty::Placeholder | Ty::Unresolved | Ty::Error)
    {
        return Ty::DependentMember(Box::new(new_base), assoc.clone());
    }
    match &new_base {
        Ty::Archetype(archetype) => cx.tcx.decls.nested_type(archetype, assoc),
        Ty::Opaque(opaque) => Ty::Opaque(OpaqueArchetype {
            decl: opaque.decl.clone(),
            interface_ty: Box::new(Ty::member((*opaque.interface_ty).clone(), assoc)),
        }),
        _ => {
            let conformance =
                s.lookup_conformance(cx, &orig_base.canonical(), &new_base, assoc.interface, 0);
            conformance.type_witness(&new_base, assoc, cx)
        }
    }
}
