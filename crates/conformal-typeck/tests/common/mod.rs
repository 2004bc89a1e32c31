//! Shared fixture for the conformance integration tests.
//!
//! Builds a small standard library of interfaces (Equatable, Hashable,
//! Sequence, Collection, P/Q with an associated conformance, Sendable, a
//! self-conforming Error) and registers a handful of conformances in a
//! `ConformanceTable`. `Counting` wraps the table and counts discovery
//! calls so tests can assert when the engine must not search.

#![allow(dead_code)]

use std::cell::Cell;

use conformal_common::Span;
use conformal_typeck::arena::{ConformanceId, NormalConformance};
use conformal_typeck::decl::{
    DeclContext, GenericSignature, GenericSignatureId, InterfaceId, RequirementKind,
    ValueRequirementId,
};
use conformal_typeck::{
    AssocTypeRef, ConformanceCx, ConformanceLookup, ConformanceRef, ConformanceTable,
    GenericParam, Requirement, SubstitutionMap, Ty, TypeContext,
};

// ── Discovery mock ─────────────────────────────────────────────────────

/// Delegates to a `ConformanceTable` and counts every call, including the
/// table's own recursive lookups.
pub struct Counting<'t> {
    table: &'t ConformanceTable,
    calls: Cell<usize>,
}

impl<'t> Counting<'t> {
    pub fn new(table: &'t ConformanceTable) -> Self {
        Counting { table, calls: Cell::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl ConformanceLookup for Counting<'_> {
    fn lookup_conformance(
        &self,
        cx: &mut ConformanceCx<'_>,
        ty: &Ty,
        interface: InterfaceId,
        allow_missing: bool,
    ) -> ConformanceRef {
        self.calls.set(self.calls.get() + 1);
        self.table.lookup_conformance(cx, ty, interface, allow_missing)
    }
}

// ── Fixture ────────────────────────────────────────────────────────────

pub struct Fixture {
    pub tcx: TypeContext,
    pub table: ConformanceTable,

    pub equatable: InterfaceId,
    pub hashable: InterfaceId,
    pub sendable: InterfaceId,
    pub error: InterfaceId,
    pub sequence: InterfaceId,
    pub collection: InterfaceId,
    pub p: InterfaceId,
    pub q: InterfaceId,

    pub seq_element: AssocTypeRef,
    pub coll_element: AssocTypeRef,
    pub assoc: AssocTypeRef,
    pub make_iterator: ValueRequirementId,

    /// `<T>`
    pub sig_t: GenericSignatureId,
    /// `<T where T: Equatable>`
    pub sig_t_eq: GenericSignatureId,
    /// `<T where T: Hashable>`
    pub sig_t_hashable: GenericSignatureId,
    /// `<T where T: P>`
    pub sig_t_p: GenericSignatureId,
    /// `<T where T: Q>`
    pub sig_t_q: GenericSignatureId,
    /// `<T where T: Sequence>`
    pub sig_t_sequence: GenericSignatureId,
    /// `<T where T: Sendable>`
    pub sig_t_sendable: GenericSignatureId,
    /// `<T where T: Error>`
    pub sig_t_error: GenericSignatureId,
    /// `<each T where T: Equatable>`
    pub sig_pack_eq: GenericSignatureId,

    pub int_equatable: ConformanceId,
    pub int_hashable: ConformanceId,
    pub string_equatable: ConformanceId,
    pub int_q: ConformanceId,
    pub string_q: ConformanceId,
    pub int_p: ConformanceId,
    pub string_p: ConformanceId,
    pub array_sequence: ConformanceId,
    pub array_collection: ConformanceId,
    pub array_equatable: ConformanceId,
    pub array_p: ConformanceId,
    pub array_sendable: ConformanceId,
    pub model_sendable: ConformanceId,
    pub legacy_equatable: ConformanceId,
}

pub fn t() -> Ty {
    Ty::param(0, 0, "T")
}

pub fn t_param() -> GenericParam {
    GenericParam::new(0, 0, "T")
}

pub fn pack_t() -> Ty {
    Ty::Param(GenericParam::pack(0, 0, "T"))
}

pub fn model() -> Ty {
    Ty::named("Model")
}

fn type_decl(name: &str) -> DeclContext {
    DeclContext::TypeDecl { name: name.to_string() }
}

fn extension(name: &str, unavailable: bool) -> DeclContext {
    DeclContext::Extension { extended: name.to_string(), unavailable }
}

pub fn fixture() -> Fixture {
    let mut tcx = TypeContext::new();
    let mut table = ConformanceTable::new();

    // Interfaces.
    let decls = &mut tcx.decls;
    let equatable = decls.declare_interface("Equatable", Some(Span::new(0, 9)));
    let hashable = decls.declare_interface("Hashable", None);
    let equatable_ref = decls.interface_ref(equatable);
    decls.add_requirement(hashable, Requirement::Conformance(Ty::self_ty(), equatable_ref.clone()));
    let sendable = decls.declare_interface("Sendable", None);
    let error = decls.declare_interface("Error", None);

    let sequence = decls.declare_interface("Sequence", None);
    let seq_element = decls.add_associated_type(sequence, "Element");
    let make_iterator = decls.add_value_requirement(sequence, "makeIterator", RequirementKind::Method);
    decls.add_value_requirement(sequence, "map", RequirementKind::Method);
    decls.add_value_requirement(sequence, "map", RequirementKind::Method);

    let collection = decls.declare_interface("Collection", None);
    let coll_element = decls.add_associated_type(collection, "Element");
    let sequence_ref = decls.interface_ref(sequence);
    decls.add_requirement(collection, Requirement::Conformance(Ty::self_ty(), sequence_ref));

    let p = decls.declare_interface("P", None);
    let q = decls.declare_interface("Q", None);
    let assoc = decls.add_associated_type(p, "Assoc");
    let q_ref = decls.interface_ref(q);
    decls.add_requirement(p, Requirement::Conformance(Ty::member(Ty::self_ty(), &assoc), q_ref));

    // Signatures.
    let single = |decls: &mut conformal_typeck::DeclGraph, iface: Option<InterfaceId>| {
        let requirements = match iface {
            Some(iface) => vec![Requirement::Conformance(t(), decls.interface_ref(iface))],
            None => Vec::new(),
        };
        decls.add_signature(GenericSignature::new(vec![t_param()], requirements))
    };
    let sig_t = single(decls, None);
    let sig_t_eq = single(decls, Some(equatable));
    let sig_t_hashable = single(decls, Some(hashable));
    let sig_t_p = single(decls, Some(p));
    let sig_t_q = single(decls, Some(q));
    let sig_t_sequence = single(decls, Some(sequence));
    let sig_t_sendable = single(decls, Some(sendable));
    let sig_t_error = single(decls, Some(error));
    let sig_pack_eq = decls.add_signature(GenericSignature::new(
        vec![GenericParam::pack(0, 0, "T")],
        vec![Requirement::Conformance(pack_t(), equatable_ref.clone())],
    ));

    // Conformances.
    let empty = tcx.decls.empty_signature();
    let iface = |tcx: &TypeContext, id: InterfaceId| tcx.decls.interface_ref(id);

    let normal = NormalConformance::new(Ty::int(), iface(&tcx, equatable), empty, type_decl("Int"))
        .with_span(Span::new(10, 20));
    let int_equatable = table.register_normal(&mut tcx, normal);
    let normal = NormalConformance::new(Ty::int(), iface(&tcx, hashable), empty, type_decl("Int"));
    let int_hashable = table.register_normal(&mut tcx, normal);
    let normal = NormalConformance::new(Ty::string(), iface(&tcx, equatable), empty, type_decl("String"));
    let string_equatable = table.register_normal(&mut tcx, normal);
    let normal = NormalConformance::new(Ty::int(), iface(&tcx, q), empty, type_decl("Int"));
    let int_q = table.register_normal(&mut tcx, normal);
    let normal = NormalConformance::new(Ty::string(), iface(&tcx, q), empty, type_decl("String"));
    let string_q = table.register_normal(&mut tcx, normal);

    let self_assoc = Ty::member(Ty::self_ty(), &assoc);
    let normal = NormalConformance::new(Ty::int(), iface(&tcx, p), empty, type_decl("Int"))
        .with_type_witness(&assoc, Ty::int())
        .with_associated_conformance(self_assoc.clone(), q, ConformanceRef::Concrete(int_q));
    let int_p = table.register_normal(&mut tcx, normal);
    let normal = NormalConformance::new(Ty::string(), iface(&tcx, p), empty, type_decl("String"))
        .with_type_witness(&assoc, Ty::string());
    let string_p = table.register_normal(&mut tcx, normal);

    let normal = NormalConformance::new(Ty::array(t()), iface(&tcx, sequence), sig_t, type_decl("Array"))
        .with_type_witness(&seq_element, t())
        .with_value_witness("makeIterator", "Array.makeIterator", Some(Span::new(30, 42)));
    let array_sequence = table.register_normal(&mut tcx, normal);
    let normal = NormalConformance::new(Ty::array(t()), iface(&tcx, collection), sig_t, type_decl("Array"))
        .with_type_witness(&coll_element, t());
    let array_collection = table.register_normal(&mut tcx, normal);
    let normal = NormalConformance::new(Ty::array(t()), iface(&tcx, equatable), sig_t_eq, extension("Array", false))
        .with_conditional_requirement(Requirement::Conformance(t(), equatable_ref));
    let array_equatable = table.register_normal(&mut tcx, normal);
    let q_abstract = ConformanceRef::for_abstract(t(), iface(&tcx, q));
    let normal = NormalConformance::new(Ty::array(t()), iface(&tcx, p), sig_t_q, extension("Array", false))
        .with_type_witness(&assoc, t())
        .with_associated_conformance(self_assoc, q, q_abstract);
    let array_p = table.register_normal(&mut tcx, normal);

    let normal = NormalConformance::new(model(), iface(&tcx, sendable), empty, type_decl("Model"))
        .isolated_to("MainActor")
        .with_span(Span::new(50, 60));
    let model_sendable = table.register_normal(&mut tcx, normal);
    let normal = NormalConformance::new(Ty::array(t()), iface(&tcx, sendable), sig_t_sendable, extension("Array", false));
    let array_sendable = table.register_normal(&mut tcx, normal);
    let normal = NormalConformance::new(Ty::named("Legacy"), iface(&tcx, equatable), empty, extension("Legacy", true))
        .with_span(Span::new(70, 80));
    let legacy_equatable = table.register_normal(&mut tcx, normal);

    table.mark_self_conforming(error);

    Fixture {
        tcx,
        table,
        equatable,
        hashable,
        sendable,
        error,
        sequence,
        collection,
        p,
        q,
        seq_element,
        coll_element,
        assoc,
        make_iterator,
        sig_t,
        sig_t_eq,
        sig_t_hashable,
        sig_t_p,
        sig_t_q,
        sig_t_sequence,
        sig_t_sendable,
        sig_t_error,
        sig_pack_eq,
        int_equatable,
        int_hashable,
        string_equatable,
        int_q,
        string_q,
        int_p,
        string_p,
        array_sequence,
        array_collection,
        array_equatable,
        array_p,
        array_sendable,
        model_sendable,
        legacy_equatable,
    }
}

/// Build a substitution map for a single-parameter signature.
pub fn single_map(
    tcx: &TypeContext,
    signature: GenericSignatureId,
    replacement: Ty,
    conformances: Vec<ConformanceRef>,
) -> SubstitutionMap {
    SubstitutionMap::new(&tcx.decls, signature, vec![replacement], conformances)
}
