use smol_str::SmolStr;
use std::collections::HashMap;

use crate::types::Ty;

/// A class obligation `class subject` carried by a binding or deferred
/// while a body is analysed.
#[derive(Clone, Debug)]
pub struct ClassPredicate {
    pub class: SmolStr,
    pub subject: Ty,
}

#[derive(Clone, Debug)]
pub enum Role {
    Value,
    /// Data constructor.
    Constructor,
    /// Member signature declared by a type class.
    ClassMember { class: SmolStr },
    /// A type class; its type is `Ty::TypeClass(name, subject)`.
    TypeClass { members: Vec<SmolStr> },
    /// A type-class instance dictionary.
    Instance { class: SmolStr, subject: Ty },
}

#[derive(Clone, Debug)]
pub struct Binding {
    pub ty: Ty,
    pub role: Role,
    /// Instance dictionaries the value expects, in parameter order.
    pub obligations: Vec<ClassPredicate>,
}

impl Binding {
    pub fn value(ty: Ty) -> Self {
        Self {
            ty,
            role: Role::Value,
            obligations: Vec::new(),
        }
    }

    pub fn with_role(ty: Ty, role: Role) -> Self {
        Self {
            ty,
            role,
            obligations: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
struct Scope {
    values: HashMap<SmolStr, Binding>,
    /// Data type names to their `Ty::Tag` over the declared parameters.
    types: HashMap<SmolStr, Ty>,
    /// Instance names in declaration order.
    instances: Vec<SmolStr>,
}

/// Lexical scope chain. The outermost scope is the session's global table;
/// inner scopes are dropped when the construct that opened them ends, so
/// nothing bound inside leaks outward.
#[derive(Debug)]
pub struct Env {
    scopes: Vec<Scope>,
}

impl Env {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::default()],
        }
    }

    // ── Scope management ─────────────────────────────────────────

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Drop every scope above `depth`.
    pub fn truncate(&mut self, depth: usize) {
        self.scopes.truncate(depth.max(1));
    }

    fn innermost(&mut self) -> &mut Scope {
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    // ── Values ───────────────────────────────────────────────────

    pub fn define(&mut self, name: SmolStr, binding: Binding) {
        let scope = self.innermost();
        if matches!(binding.role, Role::Instance { .. }) && !scope.instances.contains(&name) {
            scope.instances.push(name.clone());
        }
        scope.values.insert(name, binding);
    }

    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        self.scopes.iter().rev().find_map(|s| s.values.get(name))
    }

    /// Instances of `class`, innermost scope first, then declaration order.
    pub fn instances_of(&self, class: &str) -> Vec<(SmolStr, Ty)> {
        let mut found = Vec::new();
        for scope in self.scopes.iter().rev() {
            for name in &scope.instances {
                if let Some(Binding {
                    role: Role::Instance { class: c, subject },
                    ..
                }) = scope.values.get(name)
                {
                    if c == class {
                        found.push((name.clone(), subject.clone()));
                    }
                }
            }
        }
        found
    }

    // ── Types ────────────────────────────────────────────────────

    pub fn define_type(&mut self, name: SmolStr, tag: Ty) {
        self.innermost().types.insert(name, tag);
    }

    pub fn lookup_type(&self, name: &str) -> Option<&Ty> {
        self.scopes.iter().rev().find_map(|s| s.types.get(name))
    }
}

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}
