//! Declaration graph: interfaces, generic signatures and generic
//! environments.
//!
//! The conformance engine treats declarations as an already-built graph.
//! This module gives that graph a concrete shape: interfaces with their
//! associated types, value requirements and requirement signatures; generic
//! signatures whose conformance requirements fix the layout of substitution
//! maps; and generic environments that map interface types into archetypes.

use std::fmt;

use conformal_common::Span;
use rustc_hash::FxHashSet;

use crate::ty::{Archetype, AssocTypeRef, GenericParam, InterfaceRef, Ty};

/// Handle to an interface declaration.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InterfaceId(pub u32);

/// Handle to a generic signature.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GenericSignatureId(pub u32);

/// Handle to a generic environment.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GenericEnvId(pub u32);

/// Handle to a value requirement (method, property, initializer) of an
/// interface.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ValueRequirementId {
    pub interface: InterfaceId,
    pub index: u32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RequirementKind {
    Method,
    Property,
    Initializer,
}

/// A value requirement declared inside an interface.
#[derive(Clone, Debug)]
pub struct ValueRequirement {
    pub name: String,
    pub kind: RequirementKind,
}

/// An associated type declaration in an interface.
#[derive(Clone, Debug)]
pub struct AssocTypeDecl {
    pub name: String,
}

/// A generic requirement.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Requirement {
    /// `subject: Interface`
    Conformance(Ty, InterfaceRef),
    /// `first == second`
    SameType(Ty, Ty),
}

impl Requirement {
    /// Rebuild the requirement with every type passed through `f`.
    pub fn map_types(&self, mut f: impl FnMut(&Ty) -> Ty) -> Requirement {
        match self {
            Requirement::Conformance(subject, interface) => {
                Requirement::Conformance(f(subject), interface.clone())
            }
            Requirement::SameType(first, second) => Requirement::SameType(f(first), f(second)),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::Conformance(subject, interface) => write!(f, "{}: {}", subject, interface),
            Requirement::SameType(first, second) => write!(f, "{} == {}", first, second),
        }
    }
}

/// An interface (protocol) declaration.
#[derive(Clone, Debug)]
pub struct InterfaceDecl {
    pub id: InterfaceId,
    pub name: String,
    pub associated_types: Vec<AssocTypeDecl>,
    pub value_requirements: Vec<ValueRequirement>,
    /// Requirements on `Self` and its associated types, e.g.
    /// `Self.Element: Equatable` or `Self: Sequence` (inheritance).
    pub requirement_signature: Vec<Requirement>,
    /// The interface's own signature: `<Self where Self: Interface>`.
    pub signature: GenericSignatureId,
    pub span: Option<Span>,
}

impl InterfaceDecl {
    pub fn reference(&self) -> InterfaceRef {
        InterfaceRef { id: self.id, name: self.name.clone() }
    }

    /// Find an associated type by name.
    pub fn associated_type(&self, name: &str) -> Option<AssocTypeRef> {
        self.associated_types
            .iter()
            .position(|a| a.name == name)
            .map(|index| AssocTypeRef {
                interface: self.id,
                index: index as u32,
                name: name.to_string(),
            })
    }

    /// Find the one value requirement with the given name.
    ///
    /// Returns `None` when the name is absent or overloaded.
    pub fn single_requirement(&self, name: &str) -> Option<ValueRequirementId> {
        let mut matches = self
            .value_requirements
            .iter()
            .enumerate()
            .filter(|(_, r)| r.name == name);
        let (index, _) = matches.next()?;
        if matches.next().is_some() {
            return None;
        }
        Some(ValueRequirementId { interface: self.id, index: index as u32 })
    }

    /// Interfaces this interface directly inherits (`Self: Parent`).
    pub fn inherited(&self) -> impl Iterator<Item = &InterfaceRef> {
        self.requirement_signature.iter().filter_map(|req| match req {
            Requirement::Conformance(Ty::Param(_), parent) => Some(parent),
            _ => None,
        })
    }
}

/// A generic signature: parameters plus requirements.
///
/// The conformance requirements, in declaration order, define the
/// positions of the conformances stored in a substitution map for this
/// signature.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct GenericSignature {
    pub params: Vec<GenericParam>,
    pub requirements: Vec<Requirement>,
}

impl GenericSignature {
    pub fn new(params: Vec<GenericParam>, requirements: Vec<Requirement>) -> Self {
        GenericSignature { params, requirements }
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty() && self.requirements.is_empty()
    }

    /// Conformance requirements in order.
    pub fn conformance_requirements(&self) -> impl Iterator<Item = (&Ty, &InterfaceRef)> {
        self.requirements.iter().filter_map(|req| match req {
            Requirement::Conformance(subject, interface) => Some((subject, interface)),
            Requirement::SameType(..) => None,
        })
    }

    /// Position of the conformance requirement `subject: interface`.
    pub fn conformance_index(&self, subject: &Ty, interface: InterfaceId) -> Option<usize> {
        self.conformance_requirements()
            .position(|(s, i)| s == subject && i.id == interface)
    }

    pub fn param_index(&self, param: &GenericParam) -> Option<usize> {
        self.params.iter().position(|p| p == param)
    }

    /// The concrete type a type parameter is fixed to by a same-type
    /// requirement, if any.
    pub fn concrete_type_of(&self, ty: &Ty) -> Option<&Ty> {
        self.requirements.iter().find_map(|req| match req {
            Requirement::SameType(first, second) if first == ty && !second.is_type_parameter() => {
                Some(second)
            }
            Requirement::SameType(first, second) if second == ty && !first.is_type_parameter() => {
                Some(first)
            }
            _ => None,
        })
    }
}

/// A generic environment: the context in which a signature's type
/// parameters are represented as archetypes.
#[derive(Clone, Debug)]
pub struct GenericEnvironment {
    pub id: GenericEnvId,
    pub signature: GenericSignatureId,
}

/// Where a root conformance was declared.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeclContext {
    /// On the primary declaration of a nominal type.
    TypeDecl { name: String },
    /// On an extension of a nominal type.
    Extension { extended: String, unavailable: bool },
    /// Synthesized at module scope.
    Module { name: String },
}

impl DeclContext {
    pub fn is_unavailable_extension(&self) -> bool {
        matches!(self, DeclContext::Extension { unavailable: true, .. })
    }
}

/// Owns every interface, generic signature and generic environment known
/// to a compilation context.
#[derive(Debug)]
pub struct DeclGraph {
    interfaces: Vec<InterfaceDecl>,
    signatures: Vec<GenericSignature>,
    environments: Vec<GenericEnvironment>,
}

impl Default for DeclGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl DeclGraph {
    /// Create a graph holding only the empty generic signature.
    pub fn new() -> Self {
        DeclGraph {
            interfaces: Vec::new(),
            signatures: vec![GenericSignature::default()],
            environments: Vec::new(),
        }
    }

    /// The signature with no parameters and no requirements.
    pub fn empty_signature(&self) -> GenericSignatureId {
        GenericSignatureId(0)
    }

    // ── Interfaces ──────────────────────────────────────────────────────

    /// Declare a new interface and its `<Self where Self: Interface>`
    /// signature.
    pub fn declare_interface(&mut self, name: &str, span: Option<Span>) -> InterfaceId {
        let id = InterfaceId(self.interfaces.len() as u32);
        let reference = InterfaceRef { id, name: name.to_string() };
        let signature = self.add_signature(GenericSignature::new(
            vec![GenericParam::self_param()],
            vec![Requirement::Conformance(Ty::self_ty(), reference)],
        ));
        self.interfaces.push(InterfaceDecl {
            id,
            name: name.to_string(),
            associated_types: Vec::new(),
            value_requirements: Vec::new(),
            requirement_signature: Vec::new(),
            signature,
            span,
        });
        id
    }

    pub fn add_associated_type(&mut self, interface: InterfaceId, name: &str) -> AssocTypeRef {
        let decl = &mut self.interfaces[interface.0 as usize];
        decl.associated_types.push(AssocTypeDecl { name: name.to_string() });
        AssocTypeRef {
            interface,
            index: (decl.associated_types.len() - 1) as u32,
            name: name.to_string(),
        }
    }

    pub fn add_value_requirement(
        &mut self,
        interface: InterfaceId,
        name: &str,
        kind: RequirementKind,
    ) -> ValueRequirementId {
        let decl = &mut self.interfaces[interface.0 as usize];
        decl.value_requirements.push(ValueRequirement { name: name.to_string(), kind });
        ValueRequirementId {
            interface,
            index: (decl.value_requirements.len() - 1) as u32,
        }
    }

    /// Append to an interface's requirement signature.
    pub fn add_requirement(&mut self, interface: InterfaceId, requirement: Requirement) {
        self.interfaces[interface.0 as usize]
            .requirement_signature
            .push(requirement);
    }

    pub fn interface(&self, id: InterfaceId) -> &InterfaceDecl {
        &self.interfaces[id.0 as usize]
    }

    pub fn interface_ref(&self, id: InterfaceId) -> InterfaceRef {
        self.interface(id).reference()
    }

    pub fn value_requirement(&self, id: ValueRequirementId) -> &ValueRequirement {
        &self.interface(id.interface).value_requirements[id.index as usize]
    }

    /// Whether `child` inherits `ancestor`, directly or transitively.
    pub fn inherits(&self, child: InterfaceId, ancestor: InterfaceId) -> bool {
        let mut visited = FxHashSet::default();
        let mut stack = vec![child];
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            for parent in self.interface(current).inherited() {
                if parent.id == ancestor {
                    return true;
                }
                stack.push(parent.id);
            }
        }
        false
    }

    // ── Signatures & environments ───────────────────────────────────────

    pub fn add_signature(&mut self, signature: GenericSignature) -> GenericSignatureId {
        if signature.is_empty() {
            return self.empty_signature();
        }
        self.signatures.push(signature);
        GenericSignatureId((self.signatures.len() - 1) as u32)
    }

    pub fn signature(&self, id: GenericSignatureId) -> &GenericSignature {
        &self.signatures[id.0 as usize]
    }

    pub fn add_environment(&mut self, signature: GenericSignatureId) -> GenericEnvId {
        let id = GenericEnvId(self.environments.len() as u32);
        self.environments.push(GenericEnvironment { id, signature });
        id
    }

    pub fn environment(&self, id: GenericEnvId) -> &GenericEnvironment {
        &self.environments[id.0 as usize]
    }

    /// Whether the signature states (or implies through inheritance) that
    /// `ty` conforms to `interface`.
    pub fn requires_conformance(
        &self,
        signature: GenericSignatureId,
        ty: &Ty,
        interface: InterfaceId,
    ) -> bool {
        self.signature(signature)
            .conformance_requirements()
            .any(|(subject, required)| {
                subject == ty && (required.id == interface || self.inherits(required.id, interface))
            })
    }

    /// Replace the type parameters of `ty` with archetypes of `env`.
    ///
    /// Parameters fixed to a concrete type by a same-type requirement are
    /// replaced by that type instead.
    pub fn map_type_into_context(&self, env: GenericEnvId, ty: &Ty) -> Ty {
        let signature = self.signature(self.environment(env).signature);
        ty.transform(&mut |t| {
            if !t.is_type_parameter() {
                return None;
            }
            match signature.concrete_type_of(t) {
                Some(concrete) => Some(self.map_type_into_context(env, concrete)),
                None => Some(Ty::Archetype(Archetype {
                    env,
                    interface_ty: Box::new(t.clone()),
                })),
            }
        })
    }

    /// The nested type `archetype.assoc`, resolved in the archetype's
    /// environment.
    pub fn nested_type(&self, archetype: &Archetype, assoc: &AssocTypeRef) -> Ty {
        let member = Ty::member((*archetype.interface_ty).clone(), assoc);
        self.map_type_into_context(archetype.env, &member)
    }
}
