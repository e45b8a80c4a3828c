use smol_str::SmolStr;
use std::collections::HashSet;

use crate::{ExprId, ExprKind, Module, PatternId, PatternKind};

/// Collect the identifiers `expr` references without binding them itself,
/// in order of first occurrence.
///
/// For a named function this excludes its own name, its parameters, and
/// anything introduced by `let`, `where`, pattern or `<-` bindings in its body.
pub fn free_variables(module: &Module, expr: ExprId) -> Vec<SmolStr> {
    let mut collector = Collector {
        module,
        bound: Vec::new(),
        seen: HashSet::new(),
        free: Vec::new(),
    };
    collector.expr(expr);
    collector.free
}

struct Collector<'a> {
    module: &'a Module,
    bound: Vec<SmolStr>,
    seen: HashSet<SmolStr>,
    free: Vec<SmolStr>,
}

impl Collector<'_> {
    fn reference(&mut self, name: &SmolStr) {
        if self.bound.contains(name) {
            return;
        }
        if self.seen.insert(name.clone()) {
            self.free.push(name.clone());
        }
    }

    /// Walk a sequence whose bindings end with it.
    fn block(&mut self, body: &[ExprId]) {
        let mark = self.bound.len();
        for &id in body {
            self.expr(id);
        }
        self.bound.truncate(mark);
    }

    fn expr(&mut self, id: ExprId) {
        let module = self.module;
        match &module.exprs[id].kind {
            ExprKind::Lit(_) => {}
            ExprKind::Identifier(name) => self.reference(name),
            ExprKind::Function(func) => {
                let mark = self.bound.len();
                if let Some(name) = &func.name {
                    self.bound.push(name.clone());
                }
                self.bound.extend(func.args.iter().map(|a| a.name.clone()));
                for &decl in &func.where_decls {
                    if let ExprKind::Function(inner) = &module.exprs[decl].kind {
                        if let Some(name) = &inner.name {
                            self.bound.push(name.clone());
                        }
                    }
                }
                for &decl in &func.where_decls {
                    self.expr(decl);
                }
                self.block(&func.body);
                self.bound.truncate(mark);
                // A named function binds its name in the enclosing block.
                if let Some(name) = &func.name {
                    self.bound.push(name.clone());
                }
            }
            ExprKind::Call { func, args } => {
                self.expr(*func);
                for &arg in args {
                    self.expr(arg);
                }
            }
            ExprKind::Let { name, value, .. } | ExprKind::Bind { name, value } => {
                self.expr(*value);
                self.bound.push(name.clone());
            }
            ExprKind::Assignment { name, value } => {
                self.expr(*value);
                self.reference(name);
            }
            ExprKind::IfThenElse {
                condition,
                if_true,
                if_false,
            } => {
                self.expr(*condition);
                self.block(if_true);
                self.block(if_false);
            }
            ExprKind::Match { value, cases } => {
                self.expr(*value);
                for case in cases {
                    let mark = self.bound.len();
                    self.pattern(case.pattern);
                    self.expr(case.value);
                    self.bound.truncate(mark);
                }
            }
            ExprKind::Data(_) | ExprKind::TypeAlias(_) | ExprKind::TypeClass(_) => {}
            ExprKind::Instance(instance) => self.expr(instance.object),
            ExprKind::Do { monad, body } => {
                self.expr(*monad);
                self.block(body);
            }
            ExprKind::PropertyAccess { value, .. } | ExprKind::Not(value) => self.expr(*value),
            ExprKind::Access { value, index } => {
                self.expr(*value);
                self.expr(*index);
            }
            ExprKind::With { left, right } | ExprKind::BinaryOp { left, right, .. } => {
                self.expr(*left);
                self.expr(*right);
            }
            ExprKind::Array(values) | ExprKind::Tuple(values) => {
                for &v in values {
                    self.expr(v);
                }
            }
            ExprKind::Object(props) => {
                for (_, v) in props {
                    self.expr(*v);
                }
            }
        }
    }

    fn pattern(&mut self, id: PatternId) {
        let module = self.module;
        match &module.patterns[id].kind {
            PatternKind::Number(_) | PatternKind::String(_) | PatternKind::Boolean(_) => {}
            PatternKind::Identifier(name) => {
                if is_binder(name) {
                    self.bound.push(name.clone());
                }
            }
            PatternKind::Array(ps) | PatternKind::Tuple(ps) | PatternKind::ListCons(ps) => {
                for &p in ps {
                    self.pattern(p);
                }
            }
            PatternKind::Object(props) => {
                for (_, p) in props {
                    self.pattern(*p);
                }
            }
            PatternKind::Constructor { args, .. } => {
                for &p in args {
                    self.pattern(p);
                }
            }
        }
    }
}

/// Lower-case pattern identifiers bind, `_` and upper-case names do not.
pub fn is_binder(name: &str) -> bool {
    name != "_" && name.chars().next().is_some_and(|c| !c.is_uppercase())
}
