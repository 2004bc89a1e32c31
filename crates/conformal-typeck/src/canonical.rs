//! Canonical forms of conformance references and substitution maps.

use crate::arena::{BuiltinConformance, ConformanceData, SpecializedConformance};
use crate::conformance::ConformanceRef;
use crate::context::TypeContext;
use crate::subst::SubstitutionMap;

impl ConformanceRef {
    pub fn is_canonical(&self, tcx: &TypeContext) -> bool {
        match self {
            ConformanceRef::Invalid => true,
            ConformanceRef::Abstract(conformance) => conformance.ty.is_canonical(),
            ConformanceRef::Concrete(id) => match tcx.conformances.get(*id) {
                ConformanceData::Normal(_) | ConformanceData::SelfConforming(_) => true,
                ConformanceData::Builtin(builtin) => builtin.ty.is_canonical(),
                ConformanceData::Specialized(specialized) => {
                    specialized.ty.is_canonical() && specialized.subs.is_canonical(tcx)
                }
            },
            ConformanceRef::Pack(id) => {
                let pack = tcx.conformances.pack(*id);
                pack.ty.is_canonical() && pack.patterns.iter().all(|c| c.is_canonical(tcx))
            }
        }
    }

    /// The canonical reference: sugar stripped from every type reachable
    /// through the payload. `canonical(canonical(c)) == canonical(c)`.
    pub fn canonical(&self, tcx: &mut TypeContext) -> ConformanceRef {
        match self {
            ConformanceRef::Invalid => ConformanceRef::Invalid,
            ConformanceRef::Abstract(conformance) => {
                ConformanceRef::for_abstract(conformance.ty.canonical(), conformance.interface.clone())
            }
            ConformanceRef::Concrete(id) => {
                let data = tcx.conformances.get(*id).clone();
                match data {
                    ConformanceData::Normal(_) | ConformanceData::SelfConforming(_) => self.clone(),
                    ConformanceData::Builtin(builtin) => {
                        let canonical = BuiltinConformance {
                            ty: builtin.ty.canonical(),
                            interface: builtin.interface,
                            missing: builtin.missing,
                            conditional_requirements: builtin
                                .conditional_requirements
                                .iter()
                                .map(|req| req.map_types(|t| t.canonical()))
                                .collect(),
                        };
                        ConformanceRef::Concrete(tcx.conformances.intern_builtin(canonical))
                    }
                    ConformanceData::Specialized(specialized) => {
                        let canonical = SpecializedConformance {
                            generic: specialized.generic,
                            subs: specialized.subs.canonical(tcx),
                            ty: specialized.ty.canonical(),
                            conditional_requirements: specialized
                                .conditional_requirements
                                .iter()
                                .map(|req| req.map_types(|t| t.canonical()))
                                .collect(),
                        };
                        ConformanceRef::Concrete(tcx.conformances.intern_specialized(canonical))
                    }
                }
            }
            ConformanceRef::Pack(id) => {
                let pack = tcx.conformances.pack(*id).clone();
                let patterns = pack.patterns.iter().map(|c| c.canonical(tcx)).collect();
                ConformanceRef::for_pack(tcx, pack.ty.canonical(), pack.interface, patterns)
            }
        }
    }
}

impl SubstitutionMap {
    pub fn is_canonical(&self, tcx: &TypeContext) -> bool {
        self.replacement_types().iter().all(|ty| ty.is_canonical())
            && self.conformances().iter().all(|c| c.is_canonical(tcx))
    }

    pub fn canonical(&self, tcx: &mut TypeContext) -> SubstitutionMap {
        let types = self.replacement_types().iter().map(|ty| ty.canonical()).collect();
        let conformances = self.conformances().iter().map(|c| c.canonical(tcx)).collect();
        self.with_parts(types, conformances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::NormalConformance;
    use crate::decl::DeclContext;
    use crate::ty::Ty;

    #[test]
    fn abstract_canonicalization_keeps_interface() {
        let mut tcx = TypeContext::new();
        let p = tcx.decls.declare_interface("P", None);
        let sugared = ConformanceRef::for_abstract(Ty::alias("Count", Ty::int()), tcx.decls.interface_ref(p));
        assert!(!sugared.is_canonical(&tcx));
        let canonical = sugared.canonical(&mut tcx);
        assert_eq!(canonical, ConformanceRef::for_abstract(Ty::int(), tcx.decls.interface_ref(p)));
        assert!(canonical.is_canonical(&tcx));
        assert_eq!(canonical.canonical(&mut tcx), canonical);
    }

    #[test]
    fn sugared_missing_builtin_canonicalizes_to_one_handle() {
        let mut tcx = TypeContext::new();
        let p = tcx.decls.declare_interface("P", None);
        let interface = tcx.decls.interface_ref(p);
        let sugared = tcx.conformances.intern_builtin(BuiltinConformance {
            ty: Ty::alias("Count", Ty::int()),
            interface: interface.clone(),
            missing: true,
            conditional_requirements: Vec::new(),
        });
        let plain = tcx.conformances.intern_builtin(BuiltinConformance {
            ty: Ty::int(),
            interface,
            missing: true,
            conditional_requirements: Vec::new(),
        });
        let canonical = ConformanceRef::Concrete(sugared).canonical(&mut tcx);
        assert_eq!(canonical, ConformanceRef::Concrete(plain));
    }

    #[test]
    fn normal_roots_are_canonical() {
        let mut tcx = TypeContext::new();
        let p = tcx.decls.declare_interface("P", None);
        let sig = tcx.decls.empty_signature();
        let id = tcx.conformances.alloc_normal(NormalConformance::new(
            Ty::int(),
            tcx.decls.interface_ref(p),
            sig,
            DeclContext::TypeDecl { name: "Int".to_string() },
        ));
        let conformance = ConformanceRef::Concrete(id);
        assert!(conformance.is_canonical(&tcx));
        assert_eq!(conformance.canonical(&mut tcx), conformance);
    }
}
