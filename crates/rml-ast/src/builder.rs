//! Programmatic construction of a [`Module`].
//!
//! Front ends (a parser, a REPL, tests) allocate nodes through
//! [`ModuleBuilder`] instead of touching the arenas directly. Every node
//! built gets the builder's current span, set with [`ModuleBuilder::at`].

use smol_str::SmolStr;

use crate::*;

pub struct ModuleBuilder {
    module: Module,
    span: Span,
}

impl ModuleBuilder {
    pub fn new() -> Self {
        Self {
            module: Module::new(),
            span: Span::new(1, 1),
        }
    }

    /// Set the span given to subsequently built nodes.
    pub fn at(&mut self, line: u32, column: u32) -> &mut Self {
        self.span = Span::new(line, column);
        self
    }

    pub fn finish(self) -> Module {
        self.module
    }

    /// Append a node to the module's top level.
    pub fn top(&mut self, id: ExprId) -> ExprId {
        self.module.body.push(id);
        id
    }

    // ── Raw allocation ───────────────────────────────────────────

    pub fn expr(&mut self, kind: ExprKind) -> ExprId {
        self.module.exprs.alloc(Expr {
            kind,
            span: self.span,
        })
    }

    pub fn pattern(&mut self, kind: PatternKind) -> PatternId {
        self.module.patterns.alloc(Pattern {
            kind,
            span: self.span,
        })
    }

    pub fn type_expr(&mut self, kind: TypeExprKind) -> TypeExprId {
        self.module.type_exprs.alloc(TypeExpr {
            kind,
            span: self.span,
        })
    }

    // ── Expressions ──────────────────────────────────────────────

    pub fn num(&mut self, value: f64) -> ExprId {
        self.expr(ExprKind::Lit(Literal::Number(value)))
    }

    pub fn string(&mut self, value: &str) -> ExprId {
        self.expr(ExprKind::Lit(Literal::String(value.to_string())))
    }

    pub fn boolean(&mut self, value: bool) -> ExprId {
        self.expr(ExprKind::Lit(Literal::Boolean(value)))
    }

    pub fn unit(&mut self) -> ExprId {
        self.expr(ExprKind::Lit(Literal::Unit))
    }

    pub fn ident(&mut self, name: &str) -> ExprId {
        self.expr(ExprKind::Identifier(SmolStr::new(name)))
    }

    pub fn call(&mut self, func: ExprId, args: Vec<ExprId>) -> ExprId {
        self.expr(ExprKind::Call { func, args })
    }

    /// Call a named function or operator: `apply("+", [a, b])`.
    pub fn apply(&mut self, name: &str, args: Vec<ExprId>) -> ExprId {
        let func = self.ident(name);
        self.call(func, args)
    }

    pub fn function(&mut self, mut function: Function) -> ExprId {
        for arg in &mut function.args {
            arg.span = self.span;
        }
        self.expr(ExprKind::Function(function))
    }

    pub fn let_(&mut self, name: &str, value: ExprId) -> ExprId {
        self.expr(ExprKind::Let {
            name: SmolStr::new(name),
            type_ann: None,
            value,
        })
    }

    pub fn let_typed(&mut self, name: &str, type_ann: TypeExprId, value: ExprId) -> ExprId {
        self.expr(ExprKind::Let {
            name: SmolStr::new(name),
            type_ann: Some(type_ann),
            value,
        })
    }

    pub fn assign(&mut self, name: &str, value: ExprId) -> ExprId {
        self.expr(ExprKind::Assignment {
            name: SmolStr::new(name),
            value,
        })
    }

    pub fn if_then_else(
        &mut self,
        condition: ExprId,
        if_true: Vec<ExprId>,
        if_false: Vec<ExprId>,
    ) -> ExprId {
        self.expr(ExprKind::IfThenElse {
            condition,
            if_true,
            if_false,
        })
    }

    pub fn match_(&mut self, value: ExprId, cases: Vec<(PatternId, ExprId)>) -> ExprId {
        let span = self.span;
        let cases = cases
            .into_iter()
            .map(|(pattern, value)| Case {
                pattern,
                value,
                span,
            })
            .collect();
        self.expr(ExprKind::Match { value, cases })
    }

    pub fn data(&mut self, name: &str, params: &[&str], tags: Vec<(&str, Vec<TypeExprId>)>) -> ExprId {
        let span = self.span;
        let tags = tags
            .into_iter()
            .map(|(name, fields)| Tag {
                name: SmolStr::new(name),
                fields,
                span,
            })
            .collect();
        self.expr(ExprKind::Data(Data {
            name: SmolStr::new(name),
            params: params.iter().map(|p| SmolStr::new(p)).collect(),
            tags,
        }))
    }

    pub fn type_alias(&mut self, name: &str, params: &[&str], value: TypeExprId) -> ExprId {
        self.expr(ExprKind::TypeAlias(TypeAlias {
            name: SmolStr::new(name),
            params: params.iter().map(|p| SmolStr::new(p)).collect(),
            value,
        }))
    }

    pub fn type_class(
        &mut self,
        name: &str,
        generic: TypeExprId,
        members: Vec<(&str, TypeExprId)>,
    ) -> ExprId {
        let span = self.span;
        let members = members
            .into_iter()
            .map(|(name, type_ann)| MemberSig {
                name: SmolStr::new(name),
                type_ann,
                span,
            })
            .collect();
        self.expr(ExprKind::TypeClass(TypeClass {
            name: SmolStr::new(name),
            generic,
            members,
        }))
    }

    pub fn instance(
        &mut self,
        name: &str,
        class_name: &str,
        type_ann: TypeExprId,
        object: ExprId,
    ) -> ExprId {
        self.expr(ExprKind::Instance(Instance {
            name: SmolStr::new(name),
            class_name: SmolStr::new(class_name),
            type_ann,
            object,
        }))
    }

    pub fn do_(&mut self, monad: ExprId, body: Vec<ExprId>) -> ExprId {
        self.expr(ExprKind::Do { monad, body })
    }

    pub fn bind(&mut self, name: &str, value: ExprId) -> ExprId {
        self.expr(ExprKind::Bind {
            name: SmolStr::new(name),
            value,
        })
    }

    pub fn property(&mut self, value: ExprId, property: &str) -> ExprId {
        self.expr(ExprKind::PropertyAccess {
            value,
            property: SmolStr::new(property),
        })
    }

    pub fn access(&mut self, value: ExprId, index: ExprId) -> ExprId {
        self.expr(ExprKind::Access { value, index })
    }

    pub fn with(&mut self, left: ExprId, right: ExprId) -> ExprId {
        self.expr(ExprKind::With { left, right })
    }

    pub fn binary(&mut self, kind: BinaryOpKind, op: &str, left: ExprId, right: ExprId) -> ExprId {
        self.expr(ExprKind::BinaryOp {
            kind,
            op: SmolStr::new(op),
            left,
            right,
        })
    }

    pub fn not(&mut self, value: ExprId) -> ExprId {
        self.expr(ExprKind::Not(value))
    }

    pub fn array(&mut self, values: Vec<ExprId>) -> ExprId {
        self.expr(ExprKind::Array(values))
    }

    pub fn tuple(&mut self, values: Vec<ExprId>) -> ExprId {
        self.expr(ExprKind::Tuple(values))
    }

    pub fn object(&mut self, props: Vec<(&str, ExprId)>) -> ExprId {
        let props = props
            .into_iter()
            .map(|(k, v)| (SmolStr::new(k), v))
            .collect();
        self.expr(ExprKind::Object(props))
    }

    // ── Types ────────────────────────────────────────────────────

    pub fn t_name(&mut self, name: &str) -> TypeExprId {
        self.t_applied(name, vec![])
    }

    pub fn t_applied(&mut self, name: &str, args: Vec<TypeExprId>) -> TypeExprId {
        self.type_expr(TypeExprKind::Name {
            name: SmolStr::new(name),
            args,
        })
    }

    pub fn t_generic(&mut self, name: &str) -> TypeExprId {
        self.type_expr(TypeExprKind::Generic(SmolStr::new(name)))
    }

    /// Function type: argument types followed by the result type.
    pub fn t_fn(&mut self, types: Vec<TypeExprId>) -> TypeExprId {
        self.type_expr(TypeExprKind::Function(types))
    }

    pub fn t_array(&mut self, elem: TypeExprId) -> TypeExprId {
        self.type_expr(TypeExprKind::Array(elem))
    }

    pub fn t_tuple(&mut self, types: Vec<TypeExprId>) -> TypeExprId {
        self.type_expr(TypeExprKind::Tuple(types))
    }

    pub fn t_object(&mut self, props: Vec<(&str, TypeExprId)>) -> TypeExprId {
        let props = props
            .into_iter()
            .map(|(k, v)| (SmolStr::new(k), v))
            .collect();
        self.type_expr(TypeExprKind::Object(props))
    }

    // ── Patterns ─────────────────────────────────────────────────

    pub fn p_ident(&mut self, name: &str) -> PatternId {
        self.pattern(PatternKind::Identifier(SmolStr::new(name)))
    }

    pub fn p_num(&mut self, value: f64) -> PatternId {
        self.pattern(PatternKind::Number(value))
    }

    pub fn p_str(&mut self, value: &str) -> PatternId {
        self.pattern(PatternKind::String(value.to_string()))
    }

    pub fn p_bool(&mut self, value: bool) -> PatternId {
        self.pattern(PatternKind::Boolean(value))
    }

    pub fn p_array(&mut self, values: Vec<PatternId>) -> PatternId {
        self.pattern(PatternKind::Array(values))
    }

    pub fn p_tuple(&mut self, values: Vec<PatternId>) -> PatternId {
        self.pattern(PatternKind::Tuple(values))
    }

    pub fn p_object(&mut self, props: Vec<(&str, PatternId)>) -> PatternId {
        let props = props
            .into_iter()
            .map(|(k, v)| (SmolStr::new(k), v))
            .collect();
        self.pattern(PatternKind::Object(props))
    }

    pub fn p_cons(&mut self, patterns: Vec<PatternId>) -> PatternId {
        self.pattern(PatternKind::ListCons(patterns))
    }

    pub fn p_ctor(&mut self, tag: &str, args: Vec<PatternId>) -> PatternId {
        self.pattern(PatternKind::Constructor {
            tag: SmolStr::new(tag),
            args,
        })
    }
}

impl Default for ModuleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spans_follow_cursor() {
        let mut b = ModuleBuilder::new();
        b.at(3, 7);
        let one = b.num(1.0);
        b.at(4, 2);
        let two = b.num(2.0);
        let call = b.apply("+", vec![one, two]);
        b.top(call);
        let module = b.finish();

        assert_eq!(module.exprs[one].span, Span::new(3, 7));
        assert_eq!(module.exprs[call].span, Span::new(4, 2));
        assert_eq!(module.body, vec![call]);
    }

    #[test]
    fn function_params_take_span() {
        let mut b = ModuleBuilder::new();
        let x = b.ident("x");
        b.at(9, 1);
        let f = b.function(Function::named("id").arg("x").body(vec![x]));
        let module = b.finish();

        match &module.exprs[f].kind {
            ExprKind::Function(func) => {
                assert_eq!(func.name.as_deref(), Some("id"));
                assert_eq!(func.args[0].span, Span::new(9, 1));
            }
            other => panic!("expected function, got {:?}", other),
        }
    }
}
