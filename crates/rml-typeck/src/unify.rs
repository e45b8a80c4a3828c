use smol_str::SmolStr;
use tracing::trace;

use crate::error::UnifyError;
use crate::types::{Ty, TypeStore};

impl TypeStore {
    /// Make `a` and `b` equal by binding variables.
    ///
    /// A variable meeting a type held by another variable is linked to that
    /// variable, so a later extension of the held object is seen by both.
    ///
    /// On failure the bindings made so far stay in place; callers that need
    /// to back out take a [`snapshot`](TypeStore::snapshot) first.
    pub fn unify(&mut self, a: &Ty, b: &Ty) -> Result<(), UnifyError> {
        let (a_holder, b_holder) = (self.last_var(a), self.last_var(b));
        let (a, a_alias) = self.prune_aliased(a);
        let (b, b_alias) = self.prune_aliased(b);

        match (&a, &b) {
            (Ty::Var(x), Ty::Var(y)) if x == y => Ok(()),

            (Ty::Var(id), _) => match b_holder {
                Some(holder) => self.bind_var(*id, Ty::Var(holder), None),
                None => self.bind_var(*id, b.clone(), b_alias),
            },
            (_, Ty::Var(id)) => match a_holder {
                Some(holder) => self.bind_var(*id, Ty::Var(holder), None),
                None => self.bind_var(*id, a.clone(), a_alias),
            },

            // Native coerces to anything.
            (Ty::Native, _) | (_, Ty::Native) => Ok(()),

            (Ty::Number, Ty::Number)
            | (Ty::String, Ty::String)
            | (Ty::Boolean, Ty::Boolean)
            | (Ty::Unit, Ty::Unit) => Ok(()),

            (Ty::Array(x), Ty::Array(y)) => self.unify(x, y),

            (Ty::Tuple(xs), Ty::Tuple(ys)) if xs.len() == ys.len() => {
                for (x, y) in xs.iter().zip(ys.iter()) {
                    self.unify(x, y)?;
                }
                Ok(())
            }

            // Every property the right side asks for must exist on the left.
            (Ty::Object(left), Ty::Object(right)) => {
                for (name, r) in right {
                    match left.iter().find(|(k, _)| k == name) {
                        Some((_, l)) => self.unify(l, r)?,
                        None => return Err(self.mismatch(&a, a_alias, &b, b_alias)),
                    }
                }
                Ok(())
            }

            (Ty::Fn(p1, r1), Ty::Fn(p2, r2)) if p1.len() == p2.len() => {
                for (x, y) in p1.iter().zip(p2.iter()) {
                    self.unify(x, y)?;
                }
                self.unify(r1, r2)
            }

            (Ty::Tag(n1, a1), Ty::Tag(n2, a2)) if n1 == n2 && a1.len() == a2.len() => {
                for (x, y) in a1.iter().zip(a2.iter()) {
                    self.unify(x, y)?;
                }
                Ok(())
            }

            (Ty::TypeClass(n1, s1), Ty::TypeClass(n2, s2)) if n1 == n2 => self.unify(s1, s2),

            _ => Err(self.mismatch(&a, a_alias, &b, b_alias)),
        }
    }

    /// Unify on a trial basis: bindings are kept only when it succeeds.
    pub fn try_unify(&mut self, a: &Ty, b: &Ty) -> Result<(), UnifyError> {
        let snapshot = self.snapshot();
        match self.unify(a, b) {
            Ok(()) => {
                self.commit(snapshot);
                Ok(())
            }
            Err(err) => {
                self.rollback_to(snapshot);
                Err(err)
            }
        }
    }

    /// Whether `a` and `b` would unify. Never leaves bindings behind.
    pub fn unifiable(&mut self, a: &Ty, b: &Ty) -> bool {
        let snapshot = self.snapshot();
        let ok = self.unify(a, b).is_ok();
        self.rollback_to(snapshot);
        ok
    }

    fn bind_var(&mut self, id: u32, ty: Ty, alias: Option<SmolStr>) -> Result<(), UnifyError> {
        if self.occurs_in(id, &ty) {
            return Err(UnifyError::Recursive);
        }
        let ty = match alias {
            Some(name) => Ty::Aliased(name, Box::new(ty)),
            None => ty,
        };
        trace!(var = id, ty = %self.display(&ty), "bind");
        self.bind(id, ty);
        Ok(())
    }

    fn mismatch(
        &self,
        a: &Ty,
        a_alias: Option<SmolStr>,
        b: &Ty,
        b_alias: Option<SmolStr>,
    ) -> UnifyError {
        UnifyError::Mismatch {
            left: a_alias.map_or_else(|| self.display(a), |n| n.to_string()),
            right: b_alias.map_or_else(|| self.display(b), |n| n.to_string()),
        }
    }
}
