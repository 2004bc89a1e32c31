//! Type representation consumed by the conformance engine.
//!
//! Defines the `Ty` enum and the small identity types it is built from:
//! generic parameters, associated-type and interface references, archetypes
//! and inference variables (`TyVar`). Conformance references are always
//! "about" one of these types, and substitution rewrites them.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::decl::{GenericEnvId, InterfaceId};

/// A type inference variable, identified by a `u32` index into a
/// unification table.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TyVar(pub u32);

/// A nominal type constructor -- `Int`, `Array`, `Dictionary`, ...
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TyCon {
    pub name: String,
}

impl TyCon {
    pub fn new(name: impl Into<String>) -> Self {
        TyCon { name: name.into() }
    }
}

impl fmt::Display for TyCon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A generic type parameter, identified by its `(depth, index)` position.
///
/// The `name` is used ONLY for display. It is excluded from `PartialEq` and
/// `Hash` so that `T` and `Element` at the same position are the same
/// parameter.
#[derive(Clone, Debug)]
pub struct GenericParam {
    pub depth: u32,
    pub index: u32,
    pub name: String,
    /// Whether this is a variadic (pack) parameter.
    pub is_pack: bool,
}

impl GenericParam {
    pub fn new(depth: u32, index: u32, name: impl Into<String>) -> Self {
        GenericParam { depth, index, name: name.into(), is_pack: false }
    }

    pub fn pack(depth: u32, index: u32, name: impl Into<String>) -> Self {
        GenericParam { depth, index, name: name.into(), is_pack: true }
    }

    /// The implicit `Self` parameter of every interface.
    pub fn self_param() -> Self {
        GenericParam::new(0, 0, "Self")
    }
}

impl PartialEq for GenericParam {
    fn eq(&self, other: &Self) -> bool {
        self.depth == other.depth && self.index == other.index && self.is_pack == other.is_pack
    }
}

impl Eq for GenericParam {}

impl Hash for GenericParam {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.depth.hash(state);
        self.index.hash(state);
        self.is_pack.hash(state);
    }
}

/// A reference to an interface, carrying its name for display.
#[derive(Clone, Debug)]
pub struct InterfaceRef {
    pub id: InterfaceId,
    pub name: String,
}

impl PartialEq for InterfaceRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id // name intentionally excluded
    }
}

impl Eq for InterfaceRef {}

impl Hash for InterfaceRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for InterfaceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A reference to an associated type declared by an interface.
#[derive(Clone, Debug)]
pub struct AssocTypeRef {
    pub interface: InterfaceId,
    pub index: u32,
    pub name: String,
}

impl PartialEq for AssocTypeRef {
    fn eq(&self, other: &Self) -> bool {
        self.interface == other.interface && self.index == other.index
    }
}

impl Eq for AssocTypeRef {}

impl Hash for AssocTypeRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.interface.hash(state);
        self.index.hash(state);
    }
}

/// A primary archetype: a generic parameter (or a dependent member of one)
/// bound inside a generic environment.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Archetype {
    pub env: GenericEnvId,
    /// The interface type this archetype stands for (`T`, `T.Element`).
    pub interface_ty: Box<Ty>,
}

/// An opaque result-type archetype (`some P` returned from `decl`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OpaqueArchetype {
    pub decl: String,
    pub interface_ty: Box<Ty>,
}

/// A type as seen by the conformance engine.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Ty {
    /// A generic type parameter (`T`).
    Param(GenericParam),
    /// An associated type of a base type (`T.Element`).
    DependentMember(Box<Ty>, AssocTypeRef),
    /// A primary archetype inside a generic environment.
    Archetype(Archetype),
    /// An opaque result-type archetype.
    Opaque(OpaqueArchetype),
    /// A nominal type applied to its generic arguments: `Array<Int>`.
    Con(TyCon, Vec<Ty>),
    /// An existential: `any P & Q`. Empty means `Any`.
    Existential(Vec<InterfaceRef>),
    /// A variadic pack of types.
    Pack(Vec<Ty>),
    /// `repeat Pattern` -- expands once per element of the pack parameter
    /// referenced by the pattern.
    PackExpansion(Box<Ty>),
    /// Type sugar: a named alias for the underlying type. Never canonical.
    Alias(TyCon, Box<Ty>),
    /// An inference variable.
    Var(TyVar),
    /// A placeholder (`_`) written by the user.
    Placeholder,
    /// A type the solver has not resolved.
    Unresolved,
    /// The error type.
    Error,
}

impl Ty {
    /// Create a nominal type.
    pub fn con(name: &str, args: Vec<Ty>) -> Ty {
        Ty::Con(TyCon::new(name), args)
    }

    /// Create a nominal type without generic arguments.
    pub fn named(name: &str) -> Ty {
        Ty::con(name, Vec::new())
    }

    /// Create an `Int` type.
    pub fn int() -> Ty {
        Ty::named("Int")
    }

    /// Create a `String` type.
    pub fn string() -> Ty {
        Ty::named("String")
    }

    /// Create a `Bool` type.
    pub fn bool() -> Ty {
        Ty::named("Bool")
    }

    /// Create an `Array<T>` type.
    pub fn array(element: Ty) -> Ty {
        Ty::con("Array", vec![element])
    }

    /// Create a generic parameter type.
    pub fn param(depth: u32, index: u32, name: &str) -> Ty {
        Ty::Param(GenericParam::new(depth, index, name))
    }

    /// The `Self` parameter of an interface.
    pub fn self_ty() -> Ty {
        Ty::Param(GenericParam::self_param())
    }

    /// `base.assoc`
    pub fn member(base: Ty, assoc: &AssocTypeRef) -> Ty {
        Ty::DependentMember(Box::new(base), assoc.clone())
    }

    /// Create an alias (sugared) type.
    pub fn alias(name: &str, underlying: Ty) -> Ty {
        Ty::Alias(TyCon::new(name), Box::new(underlying))
    }

    // ── Shape predicates ────────────────────────────────────────────────

    /// A generic parameter or a dependent member rooted at one.
    pub fn is_type_parameter(&self) -> bool {
        match self {
            Ty::Param(_) => true,
            Ty::DependentMember(base, _) => base.is_type_parameter(),
            _ => false,
        }
    }

    /// An inference variable or a dependent member rooted at one.
    pub fn is_type_variable_or_member(&self) -> bool {
        match self {
            Ty::Var(_) => true,
            Ty::DependentMember(base, _) => base.is_type_variable_or_member(),
            _ => false,
        }
    }

    pub fn is_existential(&self) -> bool {
        match self {
            Ty::Existential(_) => true,
            Ty::Alias(_, underlying) => underlying.is_existential(),
            _ => false,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Ty::Error)
    }

    pub fn as_archetype(&self) -> Option<&Archetype> {
        match self {
            Ty::Archetype(archetype) => Some(archetype),
            Ty::Alias(_, underlying) => underlying.as_archetype(),
            _ => None,
        }
    }

    pub fn is_opaque_archetype(&self) -> bool {
        match self {
            Ty::Opaque(_) => true,
            Ty::Alias(_, underlying) => underlying.is_opaque_archetype(),
            _ => false,
        }
    }

    /// The generic parameter at the root of a type parameter.
    pub fn root_generic_param(&self) -> Option<&GenericParam> {
        match self {
            Ty::Param(param) => Some(param),
            Ty::DependentMember(base, _) => base.root_generic_param(),
            _ => None,
        }
    }

    /// Whether any inference variable occurs within this type.
    pub fn contains_type_variables(&self) -> bool {
        let mut found = false;
        self.walk(&mut |ty| found |= matches!(ty, Ty::Var(_)));
        found
    }

    /// Whether any archetype (primary or opaque) occurs within this type.
    pub fn has_archetypes(&self) -> bool {
        let mut found = false;
        self.walk(&mut |ty| found |= matches!(ty, Ty::Archetype(_) | Ty::Opaque(_)));
        found
    }

    // ── Traversal ───────────────────────────────────────────────────────

    /// Visit this type and every type nested inside it, pre-order.
    pub fn walk(&self, f: &mut impl FnMut(&Ty)) {
        f(self);
        match self {
            Ty::DependentMember(base, _) => base.walk(f),
            Ty::Archetype(a) => a.interface_ty.walk(f),
            Ty::Opaque(o) => o.interface_ty.walk(f),
            Ty::Con(_, args) | Ty::Pack(args) => args.iter().for_each(|a| a.walk(f)),
            Ty::PackExpansion(pattern) | Ty::Alias(_, pattern) => pattern.walk(f),
            Ty::Param(_)
            | Ty::Existential(_)
            | Ty::Var(_)
            | Ty::Placeholder
            | Ty::Unresolved
            | Ty::Error => {}
        }
    }

    /// Rebuild this type bottom-up, letting `f` replace any node first.
    ///
    /// When `f` returns `Some`, the replacement is used as-is and its
    /// children are not visited.
    pub fn transform(&self, f: &mut impl FnMut(&Ty) -> Option<Ty>) -> Ty {
        if let Some(replacement) = f(self) {
            return replacement;
        }
        match self {
            Ty::DependentMember(base, assoc) => {
                Ty::DependentMember(Box::new(base.transform(f)), assoc.clone())
            }
            Ty::Con(con, args) => {
                Ty::Con(con.clone(), args.iter().map(|a| a.transform(f)).collect())
            }
            Ty::Pack(elems) => Ty::Pack(elems.iter().map(|e| e.transform(f)).collect()),
            Ty::PackExpansion(pattern) => Ty::PackExpansion(Box::new(pattern.transform(f))),
            Ty::Alias(name, underlying) => {
                Ty::Alias(name.clone(), Box::new(underlying.transform(f)))
            }
            other => other.clone(),
        }
    }

    /// Replace every archetype with the interface type it stands for.
    pub fn map_out_of_context(&self) -> Ty {
        self.transform(&mut |ty| match ty {
            Ty::Archetype(a) => Some(a.interface_ty.map_out_of_context()),
            _ => None,
        })
    }

    // ── Canonical form ──────────────────────────────────────────────────

    /// The canonical form: aliases stripped, existential members sorted and
    /// deduplicated. Idempotent.
    pub fn canonical(&self) -> Ty {
        match self {
            Ty::Alias(_, underlying) => underlying.canonical(),
            Ty::Existential(members) => {
                let mut members = members.clone();
                members.sort_by_key(|m| m.id);
                members.dedup();
                Ty::Existential(members)
            }
            Ty::DependentMember(base, assoc) => {
                Ty::DependentMember(Box::new(base.canonical()), assoc.clone())
            }
            Ty::Archetype(a) => Ty::Archetype(Archetype {
                env: a.env,
                interface_ty: Box::new(a.interface_ty.canonical()),
            }),
            Ty::Opaque(o) => Ty::Opaque(OpaqueArchetype {
                decl: o.decl.clone(),
                interface_ty: Box::new(o.interface_ty.canonical()),
            }),
            Ty::Con(con, args) => Ty::Con(con.clone(), args.iter().map(Ty::canonical).collect()),
            Ty::Pack(elems) => Ty::Pack(elems.iter().map(Ty::canonical).collect()),
            Ty::PackExpansion(pattern) => Ty::PackExpansion(Box::new(pattern.canonical())),
            other => other.clone(),
        }
    }

    pub fn is_canonical(&self) -> bool {
        let mut canonical = true;
        self.walk(&mut |ty| match ty {
            Ty::Alias(..) => canonical = false,
            Ty::Existential(members) => {
                if members.windows(2).any(|w| w[0].id >= w[1].id) {
                    canonical = false;
                }
            }
            _ => {}
        });
        canonical
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Ty]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Param(p) => f.write_str(&p.name),
            Ty::DependentMember(base, assoc) => write!(f, "{}.{}", base, assoc.name),
            Ty::Archetype(a) => write!(f, "{}", a.interface_ty),
            Ty::Opaque(o) => write!(f, "(some {}).{}", o.decl, o.interface_ty),
            Ty::Con(con, args) => {
                write!(f, "{}", con)?;
                if !args.is_empty() {
                    write!(f, "<")?;
                    write_list(f, args)?;
                    write!(f, ">")?;
                }
                Ok(())
            }
            Ty::Existential(members) if members.is_empty() => write!(f, "Any"),
            Ty::Existential(members) => {
                write!(f, "any ")?;
                for (i, m) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, " & ")?;
                    }
                    write!(f, "{}", m)?;
                }
                Ok(())
            }
            Ty::Pack(elems) => {
                write!(f, "Pack{{")?;
                write_list(f, elems)?;
                write!(f, "}}")
            }
            Ty::PackExpansion(pattern) => write!(f, "repeat {}", pattern),
            Ty::Alias(name, _) => write!(f, "{}", name),
            Ty::Var(v) => write!(f, "?{}", v.0),
            Ty::Placeholder => write!(f, "_"),
            Ty::Unresolved => write!(f, "<<unresolved>>"),
            Ty::Error => write!(f, "<<error type>>"),
        }
    }
}

// ── ena trait implementations ──────────────────────────────────────────

impl ena::unify::UnifyKey for TyVar {
    type Value = Option<Ty>;

    fn index(&self) -> u32 {
        self.0
    }

    fn from_index(u: u32) -> Self {
        TyVar(u)
    }

    fn tag() -> &'static str {
        "TyVar"
    }
}

impl ena::unify::EqUnifyValue for Ty {}
