//! Conformance arena: owner of every concrete and pack conformance payload.
//!
//! `ConformanceRef` values hold copyable handles into this arena. Payloads
//! are append-only: construction operations intern new payloads instead of
//! mutating existing ones. Specialized, builtin, self and pack payloads are
//! hash-consed so equal inputs produce equal handles.

use conformal_common::Span;
use rustc_hash::FxHashMap;

use crate::conformance::ConformanceRef;
use crate::decl::{DeclContext, GenericSignatureId, InterfaceId, Requirement};
use crate::subst::SubstitutionMap;
use crate::ty::{AssocTypeRef, InterfaceRef, Ty};

/// Handle to a concrete conformance payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConformanceId(pub u32);

/// Handle to a pack conformance payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackConformanceId(pub u32);

/// The declaration that satisfies a value requirement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValueWitness {
    pub decl: String,
    pub span: Option<Span>,
}

/// A root conformance written in source: `extension Array: Collection`.
#[derive(Clone, Debug)]
pub struct NormalConformance {
    /// The declared conforming type, expressed over `signature`'s params.
    pub ty: Ty,
    pub interface: InterfaceRef,
    /// Generic signature of the declaring context.
    pub signature: GenericSignatureId,
    pub context: DeclContext,
    pub type_witnesses: FxHashMap<AssocTypeRef, Ty>,
    /// Conformances of associated types, keyed by `(Self.Assoc, target)`.
    pub associated_conformances: FxHashMap<(Ty, InterfaceId), ConformanceRef>,
    pub value_witnesses: FxHashMap<String, ValueWitness>,
    pub conditional_requirements: Vec<Requirement>,
    /// Global actor the conformance is isolated to, if any.
    pub isolation: Option<String>,
    pub span: Option<Span>,
}

impl NormalConformance {
    pub fn new(
        ty: Ty,
        interface: InterfaceRef,
        signature: GenericSignatureId,
        context: DeclContext,
    ) -> Self {
        NormalConformance {
            ty,
            interface,
            signature,
            context,
            type_witnesses: FxHashMap::default(),
            associated_conformances: FxHashMap::default(),
            value_witnesses: FxHashMap::default(),
            conditional_requirements: Vec::new(),
            isolation: None,
            span: None,
        }
    }

    pub fn with_type_witness(mut self, assoc: &AssocTypeRef, witness: Ty) -> Self {
        self.type_witnesses.insert(assoc.clone(), witness);
        self
    }

    pub fn with_associated_conformance(
        mut self,
        subject: Ty,
        interface: InterfaceId,
        conformance: ConformanceRef,
    ) -> Self {
        self.associated_conformances.insert((subject.canonical(), interface), conformance);
        self
    }

    pub fn with_value_witness(mut self, requirement: &str, decl: &str, span: Option<Span>) -> Self {
        self.value_witnesses.insert(
            requirement.to_string(),
            ValueWitness { decl: decl.to_string(), span },
        );
        self
    }

    pub fn with_conditional_requirement(mut self, requirement: Requirement) -> Self {
        self.conditional_requirements.push(requirement);
        self
    }

    pub fn isolated_to(mut self, actor: &str) -> Self {
        self.isolation = Some(actor.to_string());
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }
}

/// A conformance the compiler supplies without a declaration. With
/// `missing` set it is the placeholder for a conformance discovery could
/// not find.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BuiltinConformance {
    pub ty: Ty,
    pub interface: InterfaceRef,
    pub missing: bool,
    pub conditional_requirements: Vec<Requirement>,
}

/// An existential `any P` conforming to `P` itself.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SelfConformance {
    pub interface: InterfaceRef,
}

impl SelfConformance {
    pub fn ty(&self) -> Ty {
        Ty::Existential(vec![self.interface.clone()])
    }
}

/// A generic normal conformance applied to a substitution map.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SpecializedConformance {
    pub generic: ConformanceId,
    pub subs: SubstitutionMap,
    pub ty: Ty,
    pub conditional_requirements: Vec<Requirement>,
}

#[derive(Clone, Debug)]
pub enum ConformanceData {
    Normal(NormalConformance),
    Builtin(BuiltinConformance),
    SelfConforming(SelfConformance),
    Specialized(SpecializedConformance),
}

/// A pack of types conforming element-wise to one interface.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PackConformance {
    /// Always a `Ty::Pack`.
    pub ty: Ty,
    pub interface: InterfaceRef,
    pub patterns: Vec<ConformanceRef>,
}

/// Arena owning every conformance payload of a compilation context.
#[derive(Debug, Default)]
pub struct ConformanceArena {
    conformances: Vec<ConformanceData>,
    packs: Vec<PackConformance>,
    specialized_cache: FxHashMap<SpecializedConformance, ConformanceId>,
    builtin_cache: FxHashMap<BuiltinConformance, ConformanceId>,
    self_cache: FxHashMap<InterfaceId, ConformanceId>,
    pack_cache: FxHashMap<PackConformance, PackConformanceId>,
}

impl ConformanceArena {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, data: ConformanceData) -> ConformanceId {
        let id = ConformanceId(self.conformances.len() as u32);
        self.conformances.push(data);
        id
    }

    // ── Allocation ──────────────────────────────────────────────────────

    /// Allocate a normal conformance. Each call yields a distinct root.
    pub fn alloc_normal(&mut self, normal: NormalConformance) -> ConformanceId {
        self.push(ConformanceData::Normal(normal))
    }

    pub fn intern_builtin(&mut self, builtin: BuiltinConformance) -> ConformanceId {
        if let Some(&id) = self.builtin_cache.get(&builtin) {
            return id;
        }
        let id = self.push(ConformanceData::Builtin(builtin.clone()));
        self.builtin_cache.insert(builtin, id);
        id
    }

    pub fn intern_self(&mut self, interface: InterfaceRef) -> ConformanceId {
        if let Some(&id) = self.self_cache.get(&interface.id) {
            return id;
        }
        let key = interface.id;
        let id = self.push(ConformanceData::SelfConforming(SelfConformance { interface }));
        self.self_cache.insert(key, id);
        id
    }

    pub fn intern_specialized(&mut self, specialized: SpecializedConformance) -> ConformanceId {
        if let Some(&id) = self.specialized_cache.get(&specialized) {
            return id;
        }
        let id = self.push(ConformanceData::Specialized(specialized.clone()));
        self.specialized_cache.insert(specialized, id);
        id
    }

    pub fn intern_pack(&mut self, pack: PackConformance) -> PackConformanceId {
        if let Some(&id) = self.pack_cache.get(&pack) {
            return id;
        }
        let id = PackConformanceId(self.packs.len() as u32);
        self.packs.push(pack.clone());
        self.pack_cache.insert(pack, id);
        id
    }

    // ── Queries ─────────────────────────────────────────────────────────

    pub fn get(&self, id: ConformanceId) -> &ConformanceData {
        &self.conformances[id.0 as usize]
    }

    pub fn pack(&self, id: PackConformanceId) -> &PackConformance {
        &self.packs[id.0 as usize]
    }

    /// The conforming type.
    pub fn ty(&self, id: ConformanceId) -> Ty {
        match self.get(id) {
            ConformanceData::Normal(normal) => normal.ty.clone(),
            ConformanceData::Builtin(builtin) => builtin.ty.clone(),
            ConformanceData::SelfConforming(conformance) => conformance.ty(),
            ConformanceData::Specialized(specialized) => specialized.ty.clone(),
        }
    }

    pub fn interface(&self, id: ConformanceId) -> &InterfaceRef {
        match self.get(id) {
            ConformanceData::Normal(normal) => &normal.interface,
            ConformanceData::Builtin(builtin) => &builtin.interface,
            ConformanceData::SelfConforming(conformance) => &conformance.interface,
            ConformanceData::Specialized(specialized) => self.interface(specialized.generic),
        }
    }

    /// The root (declaration-site) conformance behind any specialization.
    pub fn root(&self, id: ConformanceId) -> ConformanceId {
        match self.get(id) {
            ConformanceData::Specialized(specialized) => self.root(specialized.generic),
            _ => id,
        }
    }

    pub fn conditional_requirements(&self, id: ConformanceId) -> &[Requirement] {
        match self.get(id) {
            ConformanceData::Normal(normal) => &normal.conditional_requirements,
            ConformanceData::Builtin(builtin) => &builtin.conditional_requirements,
            ConformanceData::SelfConforming(_) => &[],
            ConformanceData::Specialized(specialized) => &specialized.conditional_requirements,
        }
    }

    /// Conformances nested in the payload's substitution map.
    pub fn substitution_conformances(&self, id: ConformanceId) -> &[ConformanceRef] {
        match self.get(id) {
            ConformanceData::Specialized(specialized) => specialized.subs.conformances(),
            _ => &[],
        }
    }

    pub fn len(&self) -> usize {
        self.conformances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conformances.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::GenericSignatureId;

    fn iface(id: u32, name: &str) -> InterfaceRef {
        InterfaceRef { id: InterfaceId(id), name: name.to_string() }
    }

    #[test]
    fn builtins_and_packs_are_uniqued() {
        let mut arena = ConformanceArena::new();
        let missing = BuiltinConformance {
            ty: Ty::int(),
            interface: iface(0, "P"),
            missing: true,
            conditional_requirements: Vec::new(),
        };
        let a = arena.intern_builtin(missing.clone());
        let b = arena.intern_builtin(missing);
        assert_eq!(a, b);
        assert_eq!(arena.len(), 1);

        let pack = PackConformance {
            ty: Ty::Pack(vec![Ty::int()]),
            interface: iface(0, "P"),
            patterns: vec![ConformanceRef::Concrete(a)],
        };
        assert_eq!(arena.intern_pack(pack.clone()), arena.intern_pack(pack));
    }

    #[test]
    fn normal_conformances_are_distinct_roots() {
        let mut arena = ConformanceArena::new();
        let normal = NormalConformance::new(
            Ty::int(),
            iface(0, "P"),
            GenericSignatureId(0),
            DeclContext::TypeDecl { name: "Int".to_string() },
        );
        let a = arena.alloc_normal(normal.clone());
        let b = arena.alloc_normal(normal);
        assert_ne!(a, b);
        assert_eq!(arena.root(a), a);
        assert_eq!(arena.interface(b).name, "P");
        assert!(arena.substitution_conformances(a).is_empty());
    }

    #[test]
    fn self_conformance_type_is_existential() {
        let mut arena = ConformanceArena::new();
        let id = arena.intern_self(iface(3, "Error"));
        assert_eq!(arena.intern_self(iface(3, "Error")), id);
        assert_eq!(arena.ty(id), Ty::Existential(vec![iface(3, "Error")]));
    }
}
