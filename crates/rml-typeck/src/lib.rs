//! Hindley-Milner type inference for rml modules.
//!
//! Checking walks the top-level nodes in order against a [`Session`], whose
//! environment persists between modules, and stops at the first error.
//! Besides types it records what the code generator needs: mangled operator
//! names, instance dictionaries and dictionary parameters.

pub mod env;
pub mod error;
pub mod operators;
pub mod result;
pub mod types;

mod annotation;
mod classes;
mod infer;
mod scc;
mod unify;

#[cfg(test)]
mod tests;

use la_arena::ArenaMap;
use rml_ast::Module;
use smol_str::SmolStr;
use std::collections::HashMap;
use tracing::debug;

pub use annotation::AliasDef;
pub use env::{Binding, ClassPredicate, Env, Role};
pub use error::{Diagnostic, TypeError, TypeErrorKind, UnifyError};
pub use operators::{OperatorTable, OverloadCandidate};
pub use result::{Annotations, Checked};
pub use types::{Ty, TyVarId, TypeStore};

use infer::InferenceContext;

#[derive(Clone, Debug)]
pub struct CheckOptions {
    /// Name reported in diagnostics.
    pub filename: String,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            filename: "stdin".to_string(),
        }
    }
}

/// Checker state that outlives a single module: the substitution, global
/// bindings, aliases and the operator table.
#[derive(Debug)]
pub struct Session {
    pub(crate) store: TypeStore,
    pub(crate) env: Env,
    pub(crate) aliases: HashMap<SmolStr, AliasDef>,
    pub(crate) operators: OperatorTable,
}

impl Session {
    /// A session with the built-in operators and runtime intrinsics.
    pub fn new() -> Self {
        let mut store = TypeStore::new();
        let operators = OperatorTable::with_builtins(&mut store);
        let mut env = Env::new();

        for name in ["__rml_sys_list_addFirst", "__rml_sys_list_addLast"] {
            let elem = store.fresh_var();
            let list = Ty::array(elem.clone());
            env.define(
                name.into(),
                Binding::value(Ty::func(vec![elem, list.clone()], list)),
            );
        }
        let printed = store.fresh_var();
        env.define(
            "__rml_print".into(),
            Binding::value(Ty::func(vec![printed], Ty::Unit)),
        );
        env.define(
            "exit".into(),
            Binding::value(Ty::func(vec![Ty::Number], Ty::Unit)),
        );

        Self {
            store,
            env,
            aliases: HashMap::new(),
            operators,
        }
    }

    /// Resolved type of a global binding.
    pub fn lookup(&self, name: &str) -> Option<Ty> {
        self.env.lookup(name).map(|b| self.store.resolve(&b.ty))
    }

    pub fn resolve(&self, ty: &Ty) -> Ty {
        self.store.resolve(ty)
    }

    pub fn display(&self, ty: &Ty) -> String {
        self.store.display(ty)
    }

    pub fn operators(&self) -> &OperatorTable {
        &self.operators
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

// ── Public API ───────────────────────────────────────────────────

/// Check `module` with a fresh session.
pub fn check(module: &Module) -> Result<Checked, Diagnostic> {
    typecheck(module, &mut Session::new(), &CheckOptions::default())
}

/// Check `module` in `session`. Global declarations stay in the session.
pub fn typecheck(
    module: &Module,
    session: &mut Session,
    options: &CheckOptions,
) -> Result<Checked, Diagnostic> {
    let mut annotations = Annotations::default();
    let mut raw_types = ArenaMap::default();
    let mut types = Vec::with_capacity(module.body.len());

    for &node in &module.body {
        let depth = session.env.depth();
        debug!(?node, "checking top-level node");
        let result = {
            let mut cx = InferenceContext::new(module, session, &mut annotations, &mut raw_types);
            cx.check_top_level(node)
        };
        session.env.truncate(depth);
        match result {
            Ok(ty) => types.push(ty),
            Err(err) => {
                debug!(error = %err, "type check failed");
                return Err(err.into_diagnostic(&options.filename));
            }
        }
    }

    let mut expr_types = ArenaMap::default();
    for (id, ty) in raw_types.iter() {
        expr_types.insert(id, session.store.resolve(ty));
    }
    let types: Vec<Ty> = types.iter().map(|t| session.store.resolve(t)).collect();

    Ok(Checked {
        ty: types.first().cloned(),
        types,
        expr_types,
        annotations,
    })
}
