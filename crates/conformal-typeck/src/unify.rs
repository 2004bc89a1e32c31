//! Structural matching of declared conforming types against queries.
//!
//! Uses `ena`'s union-find table the same way inference does, but for a
//! one-shot question: can `Array<T>` (declared, with `T` a generic
//! parameter of the conformance) be made equal to `Array<Int>` (queried)?
//! Declared parameters become flexible variables; inference variables in
//! the query are imported as rigid variables that only match themselves or
//! a flexible variable.

use ena::unify::InPlaceUnificationTable;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::MatchError;
use crate::ty::{GenericParam, Ty, TyVar};

/// A throwaway matching context.
pub struct MatchCtx {
    table: InPlaceUnificationTable<TyVar>,
    /// Flexible variable standing for each declared generic parameter.
    params: FxHashMap<GenericParam, TyVar>,
    /// Local rigid variable -> inference variable of the query.
    imported: FxHashMap<TyVar, TyVar>,
    rigid: FxHashSet<TyVar>,
}

impl Default for MatchCtx {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchCtx {
    pub fn new() -> Self {
        MatchCtx {
            table: InPlaceUnificationTable::new(),
            params: FxHashMap::default(),
            imported: FxHashMap::default(),
            rigid: FxHashSet::default(),
        }
    }

    // ── Entering and leaving the table ──────────────────────────────────

    /// Replace generic parameters in a declared type with flexible
    /// variables. The same parameter always maps to the same variable.
    pub fn instantiate(&mut self, declared: &Ty) -> Ty {
        declared.transform(&mut |ty| match ty {
            Ty::Param(param) => {
                let var = match self.params.get(param) {
                    Some(var) => *var,
                    None => {
                        let var = self.table.new_key(None);
                        self.params.insert(param.clone(), var);
                        var
                    }
                };
                Some(Ty::Var(var))
            }
            _ => None,
        })
    }

    /// Bring a queried type into the table, renaming its inference
    /// variables to rigid local ones.
    pub fn import(&mut self, query: &Ty) -> Ty {
        if !query.contains_type_variables() {
            return query.clone();
        }
        let mut renamed: FxHashMap<TyVar, TyVar> = FxHashMap::default();
        query.transform(&mut |ty| match ty {
            Ty::Var(external) => {
                let local = match renamed.get(external) {
                    Some(local) => *local,
                    None => {
                        let local = self.table.new_key(None);
                        renamed.insert(*external, local);
                        self.imported.insert(local, *external);
                        self.rigid.insert(local);
                        local
                    }
                };
                Some(Ty::Var(local))
            }
            _ => None,
        })
    }

    /// Resolve a type and map rigid variables back to the query's
    /// inference variables.
    pub fn export(&mut self, ty: Ty) -> Ty {
        let resolved = self.resolve(ty);
        resolved.transform(&mut |t| match t {
            Ty::Var(local) => self.imported.get(local).map(|external| Ty::Var(*external)),
            _ => None,
        })
    }

    /// What a declared parameter matched, if it was bound.
    pub fn binding(&mut self, param: &GenericParam) -> Option<Ty> {
        let var = *self.params.get(param)?;
        let resolved = self.resolve(Ty::Var(var));
        if let Ty::Var(v) = resolved {
            if !self.rigid.contains(&v) {
                return None;
            }
        }
        Some(self.export(resolved))
    }

    // ── Resolution ──────────────────────────────────────────────────────

    /// Resolve a type by following union-find indirection.
    pub fn resolve(&mut self, ty: Ty) -> Ty {
        match ty {
            Ty::Var(v) => match self.table.probe_value(v) {
                Some(inner) => self.resolve(inner),
                None => Ty::Var(self.table.find(v)),
            },
            Ty::Con(con, args) => {
                Ty::Con(con, args.into_iter().map(|a| self.resolve(a)).collect())
            }
            Ty::Pack(elems) => Ty::Pack(elems.into_iter().map(|e| self.resolve(e)).collect()),
            Ty::PackExpansion(pattern) => Ty::PackExpansion(Box::new(self.resolve(*pattern))),
            Ty::DependentMember(base, assoc) => {
                Ty::DependentMember(Box::new(self.resolve(*base)), assoc)
            }
            Ty::Alias(name, underlying) => Ty::Alias(name, Box::new(self.resolve(*underlying))),
            other => other,
        }
    }

    fn occurs_in(&mut self, var: TyVar, ty: &Ty) -> bool {
        let mut vars = Vec::new();
        ty.walk(&mut |t| {
            if let Ty::Var(v) = t {
                vars.push(*v);
            }
        });
        vars.into_iter().any(|v| {
            if self.table.find(v) == self.table.find(var) {
                return true;
            }
            match self.table.probe_value(v) {
                Some(inner) => self.occurs_in(var, &inner),
                None => false,
            }
        })
    }

    // ── Unification ─────────────────────────────────────────────────────

    /// Unify two types.
    pub fn unify(&mut self, a: Ty, b: Ty) -> Result<(), MatchError> {
        let a = self.resolve(a);
        let b = self.resolve(b);

        match (a, b) {
            (Ty::Var(v1), Ty::Var(v2)) if v1 == v2 => Ok(()),

            (Ty::Var(v1), Ty::Var(v2)) => match (self.rigid.contains(&v1), self.rigid.contains(&v2)) {
                (true, true) => Err(MatchError::Mismatch {
                    expected: Ty::Var(v1),
                    found: Ty::Var(v2),
                }),
                (true, false) => self.bind(v2, Ty::Var(v1)),
                (false, true) => self.bind(v1, Ty::Var(v2)),
                (false, false) => {
                    self.table
                        .unify_var_var(v1, v2)
                        .expect("unifying two unbound vars should not fail");
                    Ok(())
                }
            },

            (Ty::Var(v), ty) | (ty, Ty::Var(v)) => {
                if self.rigid.contains(&v) {
                    return Err(MatchError::Mismatch { expected: Ty::Var(v), found: ty });
                }
                if self.occurs_in(v, &ty) {
                    return Err(MatchError::InfiniteType { var: v, ty });
                }
                self.bind(v, ty)
            }

            (Ty::Alias(_, underlying), other) | (other, Ty::Alias(_, underlying)) => {
                self.unify(*underlying, other)
            }

            (Ty::Con(c1, a1), Ty::Con(c2, a2)) => {
                if c1 != c2 || a1.len() != a2.len() {
                    return Err(MatchError::Mismatch {
                        expected: Ty::Con(c1, a1),
                        found: Ty::Con(c2, a2),
                    });
                }
                for (a, b) in a1.into_iter().zip(a2) {
                    self.unify(a, b)?;
                }
                Ok(())
            }

            (Ty::Pack(e1), Ty::Pack(e2)) if e1.len() == e2.len() => {
                for (a, b) in e1.into_iter().zip(e2) {
                    self.unify(a, b)?;
                }
                Ok(())
            }

            (Ty::PackExpansion(p1), Ty::PackExpansion(p2)) => self.unify(*p1, *p2),

            (Ty::DependentMember(b1, m1), Ty::DependentMember(b2, m2)) if m1 == m2 => {
                self.unify(*b1, *b2)
            }

            (a, b) => {
                if a == b {
                    Ok(())
                } else {
                    Err(MatchError::Mismatch { expected: a, found: b })
                }
            }
        }
    }

    fn bind(&mut self, var: TyVar, ty: Ty) -> Result<(), MatchError> {
        self.table
            .unify_var_value(var, Some(ty))
            .expect("binding an unbound var after occurs check should not fail");
        Ok(())
    }
}
