use la_arena::ArenaMap;
use rml_ast::free_vars::is_binder;
use rml_ast::*;
use smol_str::SmolStr;
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};

use crate::annotation::AliasDef;
use crate::env::{Binding, ClassPredicate, Env, Role};
use crate::error::{TypeError, TypeErrorKind, UnifyError};
use crate::operators::{mangle, signature, Fixity, OperatorTable, OverloadCandidate};
use crate::scc::dependency_groups;
use crate::types::{flatten_function_type, Ty, TypeStore};
use crate::{Annotations, Session};

/// A type-class obligation raised at `expr`, solved once the enclosing
/// function body (or top-level node) is fully analysed.
#[derive(Clone, Debug)]
pub(crate) struct Constraint {
    pub expr: ExprId,
    pub class: SmolStr,
    pub subject: Ty,
    pub span: Span,
}

/// Temporary type of a function whose body is not analysed yet.
struct Placeholder {
    params: Vec<Ty>,
    ret: Ty,
}

impl Placeholder {
    fn ty(&self) -> Ty {
        Ty::func(self.params.clone(), self.ret.clone())
    }

    /// The variables that stay monomorphic while the body is analysed.
    fn non_generic(&self) -> impl Iterator<Item = Ty> + '_ {
        self.params.iter().cloned().chain(std::iter::once(self.ret.clone()))
    }
}

/// Everything one analysis pass reads and writes.
pub(crate) struct InferenceContext<'a> {
    pub(crate) module: &'a Module,
    pub(crate) store: &'a mut TypeStore,
    pub(crate) env: &'a mut Env,
    pub(crate) aliases: &'a mut HashMap<SmolStr, AliasDef>,
    pub(crate) operators: &'a mut OperatorTable,
    pub(crate) annotations: &'a mut Annotations,
    pub(crate) expr_types: &'a mut ArenaMap<ExprId, Ty>,
    /// Named type variables of the declaration being resolved.
    pub(crate) type_param_scope: HashMap<SmolStr, Ty>,
    /// Dictionary obligations of analysed functions, for `let` to carry over.
    fn_obligations: HashMap<ExprId, Vec<ClassPredicate>>,
}

impl<'a> InferenceContext<'a> {
    pub(crate) fn new(
        module: &'a Module,
        session: &'a mut Session,
        annotations: &'a mut Annotations,
        expr_types: &'a mut ArenaMap<ExprId, Ty>,
    ) -> Self {
        Self {
            module,
            store: &mut session.store,
            env: &mut session.env,
            aliases: &mut session.aliases,
            operators: &mut session.operators,
            annotations,
            expr_types,
            type_param_scope: HashMap::new(),
            fn_obligations: HashMap::new(),
        }
    }

    // ── Helpers ──────────────────────────────────────────────────

    pub(crate) fn unify_at(&mut self, a: &Ty, b: &Ty, span: Span) -> Result<(), TypeError> {
        self.store
            .unify(a, b)
            .map_err(|err| TypeError::from_unify(err, span))
    }

    /// Run `f` in a child scope that is dropped afterwards, error or not.
    fn scoped<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, TypeError>,
    ) -> Result<T, TypeError> {
        self.env.push_scope();
        let result = f(self);
        self.env.pop_scope();
        result
    }

    fn span_of(&self, id: ExprId) -> Span {
        self.module.exprs[id].span
    }

    // ── Entry point ──────────────────────────────────────────────

    pub(crate) fn check_top_level(&mut self, id: ExprId) -> Result<Ty, TypeError> {
        let mut constraints = Vec::new();
        let ty = self.analyse(id, &[], &mut constraints)?;
        self.solve_constraints(constraints, None)?;
        Ok(ty)
    }

    /// Infer the type of `id`. Variables in `non_generic` are shared, not
    /// instantiated, when identifiers are looked up.
    pub(crate) fn analyse(
        &mut self,
        id: ExprId,
        non_generic: &[Ty],
        constraints: &mut Vec<Constraint>,
    ) -> Result<Ty, TypeError> {
        let ty = self.analyse_expr(id, non_generic, constraints)?;
        self.expr_types.insert(id, ty.clone());
        Ok(ty)
    }

    fn analyse_body(
        &mut self,
        body: &[ExprId],
        non_generic: &[Ty],
        constraints: &mut Vec<Constraint>,
    ) -> Result<Ty, TypeError> {
        let mut last = Ty::Unit;
        for &expr in body {
            last = self.analyse(expr, non_generic, constraints)?;
        }
        Ok(last)
    }

    fn analyse_expr(
        &mut self,
        id: ExprId,
        ng: &[Ty],
        constraints: &mut Vec<Constraint>,
    ) -> Result<Ty, TypeError> {
        let module = self.module;
        let expr = &module.exprs[id];
        let span = expr.span;

        match &expr.kind {
            ExprKind::Lit(lit) => Ok(match lit {
                Literal::Number(_) => Ty::Number,
                Literal::String(_) => Ty::String,
                Literal::Boolean(_) => Ty::Boolean,
                Literal::Unit => Ty::Unit,
            }),

            ExprKind::Identifier(name) => Ok(self.analyse_identifier(id, name, span, ng, constraints)),

            ExprKind::Function(func) => self.analyse_function_decl(id, func, span, ng),

            ExprKind::Call { func, args } => {
                self.analyse_call(*func, args, span, ng, constraints)
            }

            ExprKind::Let {
                name,
                type_ann,
                value,
            } => {
                let mut value_ty = self.analyse(*value, ng, constraints)?;
                if let Some(ann) = type_ann {
                    let ann_ty = self.type_param_frame(false, |cx| cx.resolve_type_expr(*ann))?;
                    if self.store.prune(&value_ty) == Ty::Native {
                        value_ty = ann_ty;
                    } else {
                        self.unify_at(&value_ty, &ann_ty, span)?;
                    }
                }
                let binding = Binding {
                    ty: value_ty.clone(),
                    role: Role::Value,
                    obligations: self.fn_obligations.get(value).cloned().unwrap_or_default(),
                };
                self.env.define(name.clone(), binding);
                Ok(value_ty)
            }

            ExprKind::Assignment { name, value } => {
                let value_ty = self.analyse(*value, ng, constraints)?;
                match self.env.lookup(name).map(|b| b.ty.clone()) {
                    Some(existing) => {
                        if self.store.prune(&value_ty) == Ty::Native {
                            return Ok(existing);
                        }
                        self.unify_at(&value_ty, &existing, span)?;
                    }
                    None => self.env.define(name.clone(), Binding::value(value_ty.clone())),
                }
                Ok(value_ty)
            }

            ExprKind::IfThenElse {
                condition,
                if_true,
                if_false,
            } => {
                let cond_ty = self.analyse(*condition, ng, constraints)?;
                self.unify_at(&cond_ty, &Ty::Boolean, self.span_of(*condition))?;
                let true_ty = self.scoped(|cx| cx.analyse_body(if_true, ng, constraints))?;
                let false_ty = self.scoped(|cx| cx.analyse_body(if_false, ng, constraints))?;
                self.unify_at(&true_ty, &false_ty, span)?;
                Ok(true_ty)
            }

            ExprKind::Match { value, cases } => self.analyse_match(*value, cases, ng, constraints),

            ExprKind::Data(data) => {
                self.register_data_decls(&[(data, span)])?;
                Ok(Ty::Native)
            }

            ExprKind::TypeAlias(alias) => {
                self.declare_alias(alias, span)?;
                Ok(Ty::Native)
            }

            ExprKind::TypeClass(class) => self.declare_type_class(class, span),

            ExprKind::Instance(instance) => {
                self.declare_instance(instance, span, ng, constraints)
            }

            ExprKind::Do { monad, body } => self.analyse_do(*monad, body, span, ng, constraints),

            ExprKind::Bind { name, value } => {
                self.analyse(*value, ng, constraints)?;
                let bound = self.store.fresh_var();
                self.env.define(name.clone(), Binding::value(bound.clone()));
                Ok(bound)
            }

            ExprKind::PropertyAccess { value, property } => {
                self.analyse_property_access(*value, property, span, ng, constraints)
            }

            ExprKind::Access { value, index } => {
                let value_ty = self.analyse(*value, ng, constraints)?;
                let index_ty = self.analyse(*index, ng, constraints)?;
                if self.store.prune(&value_ty) == Ty::Native {
                    return Ok(Ty::Native);
                }
                let elem = self.store.fresh_var();
                self.unify_at(&value_ty, &Ty::array(elem.clone()), span)?;
                self.unify_at(&index_ty, &Ty::Number, self.span_of(*index))?;
                Ok(elem)
            }

            ExprKind::With { left, right } => {
                let left_ty = self.analyse(*left, ng, constraints)?;
                let right_ty = self.analyse(*right, ng, constraints)?;
                let empty = Ty::Object(Vec::new());
                self.unify_at(&left_ty, &empty, self.span_of(*left))?;
                self.unify_at(&right_ty, &empty, self.span_of(*right))?;
                match (self.store.prune(&left_ty), self.store.prune(&right_ty)) {
                    (Ty::Object(mut merged), Ty::Object(extra)) => {
                        for (name, ty) in extra {
                            match merged.iter_mut().find(|(k, _)| *k == name) {
                                Some(slot) => slot.1 = ty,
                                None => merged.push((name, ty)),
                            }
                        }
                        Ok(Ty::Object(merged))
                    }
                    _ => Ok(Ty::Native),
                }
            }

            ExprKind::BinaryOp {
                kind,
                left,
                right,
                ..
            } => {
                let left_ty = self.analyse(*left, ng, constraints)?;
                let right_ty = self.analyse(*right, ng, constraints)?;
                let operand = match kind {
                    BinaryOpKind::Generic => {
                        self.unify_at(&left_ty, &right_ty, span)?;
                        return Ok(Ty::Boolean);
                    }
                    BinaryOpKind::Number => Ty::Number,
                    BinaryOpKind::Boolean => Ty::Boolean,
                    BinaryOpKind::String => Ty::String,
                };
                self.unify_at(&left_ty, &operand, self.span_of(*left))?;
                self.unify_at(&right_ty, &operand, self.span_of(*right))?;
                Ok(operand)
            }

            ExprKind::Not(value) => {
                let value_ty = self.analyse(*value, ng, constraints)?;
                self.unify_at(&value_ty, &Ty::Boolean, self.span_of(*value))?;
                Ok(Ty::Boolean)
            }

            ExprKind::Array(values) => {
                let elem = self.store.fresh_var();
                for &v in values {
                    let ty = self.analyse(v, ng, constraints)?;
                    self.unify_at(&elem, &ty, self.span_of(v))?;
                }
                Ok(Ty::array(elem))
            }

            ExprKind::Tuple(values) => Ok(Ty::Tuple(
                values
                    .iter()
                    .map(|&v| self.analyse(v, ng, constraints))
                    .collect::<Result<_, _>>()?,
            )),

            ExprKind::Object(props) => Ok(Ty::Object(
                props
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), self.analyse(*v, ng, constraints)?)))
                    .collect::<Result<_, TypeError>>()?,
            )),
        }
    }

    // ── Identifiers ──────────────────────────────────────────────

    fn analyse_identifier(
        &mut self,
        id: ExprId,
        name: &SmolStr,
        span: Span,
        ng: &[Ty],
        constraints: &mut Vec<Constraint>,
    ) -> Ty {
        // Operator values are resolved by the enclosing call.
        if is_operator_name(name) {
            return self.store.fresh_var();
        }

        let Some(binding) = self.env.lookup(name).cloned() else {
            trace!(%name, "unknown identifier is Native");
            return Ty::Native;
        };

        let mut mapping = HashMap::new();
        let ty = self.store.fresh_with(&binding.ty, ng, &mut mapping);

        if let Role::ClassMember { class } = &binding.role {
            let subject = match self.env.lookup(class).map(|b| b.ty.clone()) {
                Some(Ty::TypeClass(_, subject)) => *subject,
                _ => return ty,
            };
            let subject = self.store.fresh_with(&subject, ng, &mut mapping);
            constraints.push(Constraint {
                expr: id,
                class: class.clone(),
                subject,
                span,
            });
        }

        for obligation in &binding.obligations {
            let subject = self.store.fresh_with(&obligation.subject, ng, &mut mapping);
            constraints.push(Constraint {
                expr: id,
                class: obligation.class.clone(),
                subject,
                span,
            });
        }

        ty
    }

    // ── Functions ────────────────────────────────────────────────

    fn placeholder_type(&mut self, func: &Function) -> Placeholder {
        let params = func.args.iter().map(|_| self.store.fresh_var()).collect();
        let ret = self.store.fresh_var();
        Placeholder { params, ret }
    }

    /// Tie a declared return type to the placeholder's result.
    fn annotate_return(
        &mut self,
        func: &Function,
        placeholder: &Placeholder,
        span: Span,
    ) -> Result<(), TypeError> {
        if let Some(ann) = func.return_type {
            let ann_ty = self.resolve_type_expr(ann)?;
            self.unify_at(&placeholder.ret, &ann_ty, span)?;
        }
        Ok(())
    }

    /// A function or lambda in expression position: analyse it, register
    /// operators, solve its constraints and bind its name.
    fn analyse_function_decl(
        &mut self,
        id: ExprId,
        func: &Function,
        span: Span,
        ng: &[Ty],
    ) -> Result<Ty, TypeError> {
        self.type_param_frame(true, |cx| cx.analyse_function_decl_inner(id, func, span, ng))
    }

    fn analyse_function_decl_inner(
        &mut self,
        id: ExprId,
        func: &Function,
        span: Span,
        ng: &[Ty],
    ) -> Result<Ty, TypeError> {
        let placeholder = self.placeholder_type(func);
        self.annotate_return(func, &placeholder, span)?;

        let mut non_generic = ng.to_vec();
        non_generic.extend(placeholder.non_generic());

        let plain_name = func.name.clone().filter(|n| !starts_with_operator(n));
        let mut fn_constraints = Vec::new();
        let fn_ty = self.scoped(|cx| {
            if let Some(name) = &plain_name {
                cx.env.define(name.clone(), Binding::value(placeholder.ty()));
            }
            cx.analyse_function(func, &placeholder, span, &non_generic, &mut fn_constraints)
        })?;

        if let Some(op) = func.name.as_ref().filter(|n| starts_with_operator(n)) {
            self.register_operator(id, op, &fn_ty, span)?;
        }

        let mut dictionaries = Vec::new();
        self.solve_constraints(fn_constraints, Some(&mut dictionaries))?;
        if !dictionaries.is_empty() {
            let names = dictionaries.iter().map(|d| d.class.clone()).collect();
            self.annotations.dictionary_params.insert(id, names);
        }

        if let Some(name) = plain_name {
            if self.env.lookup(&name).is_some() {
                return Err(TypeError::new(
                    TypeErrorKind::Redefinition {
                        what: "Function",
                        name,
                    },
                    span,
                ));
            }
            self.env.define(
                name,
                Binding {
                    ty: fn_ty.clone(),
                    role: Role::Value,
                    obligations: dictionaries.clone(),
                },
            );
        }
        self.fn_obligations.insert(id, dictionaries);

        Ok(fn_ty)
    }

    /// Parameters, `where` declarations and body of a function, in the
    /// caller's scope. Returns the flattened function type.
    fn analyse_function(
        &mut self,
        func: &Function,
        placeholder: &Placeholder,
        span: Span,
        ng: &[Ty],
        constraints: &mut Vec<Constraint>,
    ) -> Result<Ty, TypeError> {
        let module = self.module;

        let mut seen = HashSet::new();
        let mut params = Vec::with_capacity(func.args.len());
        for (arg, slot) in func.args.iter().zip(&placeholder.params) {
            if !seen.insert(arg.name.clone()) {
                return Err(TypeError::new(
                    TypeErrorKind::RepeatedArgument(arg.name.clone()),
                    arg.span,
                ));
            }
            if let Some(ann) = arg.type_ann {
                let ann_ty = self.resolve_type_expr(ann)?;
                self.unify_at(slot, &ann_ty, arg.span)?;
            }
            self.env.define(arg.name.clone(), Binding::value(slot.clone()));
            params.push(slot.clone());
        }

        let data_decls: Vec<(&Data, Span)> = func
            .where_decls
            .iter()
            .filter_map(|&d| match &module.exprs[d].kind {
                ExprKind::Data(data) => Some((data, module.exprs[d].span)),
                _ => None,
            })
            .collect();
        self.register_data_decls(&data_decls)?;
        self.analyse_where_functions(&func.where_decls, ng, constraints)?;

        let result = if func.body.is_empty() {
            match func.return_type {
                Some(ann) => self.resolve_type_expr(ann)?,
                None => {
                    let name = func.name.clone().unwrap_or_else(|| "<anonymous>".into());
                    return Err(TypeError::new(
                        TypeErrorKind::MissingReturnAnnotation(name),
                        span,
                    ));
                }
            }
        } else {
            self.analyse_body(&func.body, ng, constraints)?
        };

        let returned = if func.return_type.is_some() && !func.body.is_empty() {
            self.annotated_result(&placeholder.ret, &result)
        } else {
            result.clone()
        };
        self.unify_at(&placeholder.ret, &returned, span)?;
        Ok(flatten_function_type(self.store, params, result))
    }

    /// The part of a body's result a return annotation describes: the final
    /// result of a curried body, unless the annotation is itself a function.
    fn annotated_result(&self, annotation: &Ty, result: &Ty) -> Ty {
        if matches!(self.store.prune(annotation), Ty::Fn(..)) {
            return result.clone();
        }
        let mut current = result.clone();
        while let Ty::Fn(_, ret) = self.store.prune(&current) {
            current = *ret;
        }
        current
    }

    /// Analyse the named functions of a `where` clause one dependency group
    /// at a time and bind their final types in the current scope.
    fn analyse_where_functions(
        &mut self,
        decls: &[ExprId],
        ng: &[Ty],
        constraints: &mut Vec<Constraint>,
    ) -> Result<(), TypeError> {
        let module = self.module;
        let functions: Vec<(ExprId, &Function)> = decls
            .iter()
            .filter_map(|&d| match &module.exprs[d].kind {
                ExprKind::Function(f) if f.name.is_some() => Some((d, f)),
                _ => None,
            })
            .collect();
        if functions.is_empty() {
            return Ok(());
        }

        for group in dependency_groups(module, &functions) {
            let members: Vec<(ExprId, &Function, SmolStr)> = group
                .iter()
                .filter_map(|&i| {
                    let (id, f) = functions[i];
                    f.name.clone().map(|name| (id, f, name))
                })
                .collect();
            debug!(
                group = ?members.iter().map(|(_, _, n)| n.as_str()).collect::<Vec<_>>(),
                "analysing where group"
            );

            let mut non_generic = ng.to_vec();
            let mut placeholders = Vec::with_capacity(members.len());
            // Named type variables of each member's return annotation, reused
            // when its parameters and body are analysed.
            let mut frames = Vec::with_capacity(members.len());
            for (id, func, _) in &members {
                let placeholder = self.placeholder_type(func);
                let span = self.span_of(*id);
                let frame = self.type_param_frame(true, |cx| {
                    cx.annotate_return(func, &placeholder, span)?;
                    Ok(cx.type_param_scope.clone())
                })?;
                non_generic.extend(placeholder.non_generic());
                placeholders.push(placeholder);
                frames.push(frame);
            }

            let types = self.scoped(|cx| {
                for ((_, _, name), placeholder) in members.iter().zip(&placeholders) {
                    cx.env.define(name.clone(), Binding::value(placeholder.ty()));
                }
                let mut types = Vec::with_capacity(members.len());
                for (((id, func, _), placeholder), frame) in
                    members.iter().zip(&placeholders).zip(frames)
                {
                    let span = cx.span_of(*id);
                    let ty = cx.type_param_frame(true, |cx| {
                        cx.type_param_scope = frame;
                        cx.scoped(|cx| {
                            cx.analyse_function(func, placeholder, span, &non_generic, constraints)
                        })
                    })?;
                    cx.expr_types.insert(*id, ty.clone());
                    types.push(ty);
                }
                Ok(types)
            })?;

            for ((_, _, name), ty) in members.into_iter().zip(types) {
                self.env.define(name, Binding::value(ty));
            }
        }
        Ok(())
    }

    fn register_operator(
        &mut self,
        id: ExprId,
        op: &SmolStr,
        fn_ty: &Ty,
        span: Span,
    ) -> Result<(), TypeError> {
        let types = signature(&self.store.resolve(fn_ty));
        let fixity = Fixity::from_arity(types.len() - 1).ok_or_else(|| {
            TypeError::new(TypeErrorKind::InvalidOperatorArity(op.clone()), span)
        })?;
        let mangled = mangle(op, &types);
        debug!(%op, %mangled, "registering operator overload");
        self.annotations.mangled_names.insert(id, mangled.clone());
        self.operators.register(
            fixity,
            OverloadCandidate {
                name: op.clone(),
                ty: fn_ty.clone(),
                mangled,
            },
        );
        Ok(())
    }

    // ── Calls ────────────────────────────────────────────────────

    fn analyse_call(
        &mut self,
        func: ExprId,
        args: &[ExprId],
        span: Span,
        ng: &[Ty],
        constraints: &mut Vec<Constraint>,
    ) -> Result<Ty, TypeError> {
        let module = self.module;
        let arg_types = args
            .iter()
            .map(|&a| self.analyse(a, ng, constraints))
            .collect::<Result<Vec<_>, _>>()?;

        let callee_name = match &module.exprs[func].kind {
            ExprKind::Identifier(name) => Some(name.clone()),
            _ => None,
        };

        if let Some(op) = callee_name.as_ref().filter(|n| is_operator_name(n)) {
            let result = self.resolve_operator_call(func, op, &arg_types, span, ng)?;
            self.resolve_operator_arguments(args, &arg_types, ng)?;
            return Ok(result);
        }

        let is_constructor = callee_name
            .as_ref()
            .and_then(|n| self.env.lookup(n))
            .is_some_and(|b| matches!(b.role, Role::Constructor));

        let callee = self.analyse(func, ng, constraints)?;
        let result = match self.store.prune(&callee) {
            Ty::Native => Ty::Native,
            Ty::Fn(params, ret) => {
                let too_many = arg_types.len() > params.len();
                let too_few = is_constructor && arg_types.len() < params.len();
                if too_many || too_few {
                    return Err(TypeError::new(
                        TypeErrorKind::Arity {
                            name: callee_name.unwrap_or_else(|| "function".into()),
                            expected: params.len(),
                            given: arg_types.len(),
                        },
                        span,
                    ));
                }
                for (arg, param) in arg_types.iter().zip(&params) {
                    self.unify_at(arg, param, span)?;
                }
                if arg_types.len() < params.len() {
                    // Partial application.
                    Ty::func(params[arg_types.len()..].to_vec(), *ret)
                } else {
                    *ret
                }
            }
            _ => {
                let result = self.store.fresh_var();
                self.unify_at(&Ty::func(arg_types.clone(), result.clone()), &callee, span)?;
                result
            }
        };

        self.resolve_operator_arguments(args, &arg_types, ng)?;
        Ok(result)
    }

    /// Pick the first overload whose parameters accept `arg_types`.
    fn resolve_operator_call(
        &mut self,
        func: ExprId,
        op: &SmolStr,
        arg_types: &[Ty],
        span: Span,
        ng: &[Ty],
    ) -> Result<Ty, TypeError> {
        let candidates = match self.operators.candidates(op, arg_types.len()) {
            Some(candidates) if !candidates.is_empty() => candidates.to_vec(),
            _ => {
                return Err(TypeError::new(
                    TypeErrorKind::UndefinedOperator(op.clone()),
                    span,
                ))
            }
        };

        for candidate in &candidates {
            let snapshot = self.store.snapshot();
            let candidate_ty = self.store.fresh(&candidate.ty, ng);
            match self.apply_candidate(&candidate_ty, arg_types) {
                Ok(result) => {
                    self.store.commit(snapshot);
                    debug!(%op, mangled = %candidate.mangled, "resolved operator call");
                    self.annotations
                        .mangled_names
                        .insert(func, candidate.mangled.clone());
                    self.expr_types.insert(func, candidate_ty);
                    return Ok(result);
                }
                Err(err) => {
                    trace!(%op, mangled = %candidate.mangled, ?err, "overload rejected");
                    self.store.rollback_to(snapshot);
                }
            }
        }

        let args = arg_types
            .iter()
            .map(|t| self.store.display(t))
            .collect::<Vec<_>>()
            .join(", ");
        Err(TypeError::new(
            TypeErrorKind::MissingOverload {
                op: op.clone(),
                args,
            },
            span,
        ))
    }

    fn apply_candidate(&mut self, candidate: &Ty, args: &[Ty]) -> Result<Ty, UnifyError> {
        let Ty::Fn(params, ret) = self.store.prune(candidate) else {
            return Err(UnifyError::Mismatch {
                left: self.store.display(candidate),
                right: "a function".into(),
            });
        };
        if params.len() < args.len() {
            return Err(UnifyError::Mismatch {
                left: self.store.display(candidate),
                right: format!("a function of {} arguments", args.len()),
            });
        }
        for (arg, param) in args.iter().zip(&params) {
            self.store.unify(arg, param)?;
        }
        Ok(if args.len() < params.len() {
            Ty::func(params[args.len()..].to_vec(), *ret)
        } else {
            *ret
        })
    }

    /// Operators passed as values, e.g. `fold (+) 0 xs`: once the call fixed
    /// their function type, pick the overload that matches it.
    fn resolve_operator_arguments(
        &mut self,
        args: &[ExprId],
        arg_types: &[Ty],
        ng: &[Ty],
    ) -> Result<(), TypeError> {
        let module = self.module;
        for (&arg, ty) in args.iter().zip(arg_types) {
            let ExprKind::Identifier(op) = &module.exprs[arg].kind else {
                continue;
            };
            if !is_operator_name(op) {
                continue;
            }
            let Ty::Fn(params, _) = self.store.prune(ty) else {
                continue;
            };
            let span = self.span_of(arg);
            let candidates = match self.operators.candidates(op, params.len()) {
                Some(candidates) if !candidates.is_empty() => candidates.to_vec(),
                _ => {
                    return Err(TypeError::new(
                        TypeErrorKind::UndefinedOperator(op.clone()),
                        span,
                    ))
                }
            };

            let mut resolved = None;
            for candidate in &candidates {
                let candidate_ty = self.store.fresh(&candidate.ty, ng);
                if self.store.try_unify(&candidate_ty, ty).is_ok() {
                    resolved = Some(candidate.mangled.clone());
                    break;
                }
            }
            match resolved {
                Some(mangled) => {
                    debug!(%op, %mangled, "resolved operator value");
                    self.annotations.mangled_names.insert(arg, mangled);
                }
                None => {
                    return Err(TypeError::new(
                        TypeErrorKind::MissingOverload {
                            op: op.clone(),
                            args: self.store.display(ty),
                        },
                        span,
                    ))
                }
            }
        }
        Ok(())
    }

    // ── Pattern matching ─────────────────────────────────────────

    fn analyse_match(
        &mut self,
        value: ExprId,
        cases: &[Case],
        ng: &[Ty],
        constraints: &mut Vec<Constraint>,
    ) -> Result<Ty, TypeError> {
        let result = self.store.fresh_var();
        let value_ty = self.analyse(value, ng, constraints)?;

        for case in cases {
            self.scoped(|cx| {
                let mut case_ng = ng.to_vec();
                cx.bind_pattern(case.pattern, &value_ty, &mut case_ng)?;
                let case_ty = cx.analyse(case.value, &case_ng, constraints)?;
                // A nullary constructor in result position stands for its value.
                let case_ty = match cx.store.prune(&case_ty) {
                    Ty::Fn(params, ret) if params.is_empty() => *ret,
                    _ => case_ty,
                };
                cx.unify_at(&result, &case_ty, case.span)
            })?;
        }

        Ok(result)
    }

    /// Bind the names `pattern` introduces, narrowing `expected` to its shape.
    fn bind_pattern(
        &mut self,
        pattern: PatternId,
        expected: &Ty,
        ng: &mut Vec<Ty>,
    ) -> Result<(), TypeError> {
        let module = self.module;
        let pat = &module.patterns[pattern];
        let span = pat.span;

        match &pat.kind {
            PatternKind::Number(_) => self.unify_at(expected, &Ty::Number, span),
            PatternKind::String(_) => self.unify_at(expected, &Ty::String, span),
            PatternKind::Boolean(_) => self.unify_at(expected, &Ty::Boolean, span),

            PatternKind::Identifier(name) => {
                if name == "_" {
                    return Ok(());
                }
                if is_binder(name) {
                    self.env.define(name.clone(), Binding::value(expected.clone()));
                    ng.push(expected.clone());
                    return Ok(());
                }
                let (fields, tag) = self.constructor_type(name, span, ng)?;
                if !fields.is_empty() {
                    return Err(TypeError::new(
                        TypeErrorKind::Arity {
                            name: name.clone(),
                            expected: fields.len(),
                            given: 0,
                        },
                        span,
                    ));
                }
                self.unify_at(expected, &tag, span)
            }

            PatternKind::Array(elems) => {
                let elem = self.store.fresh_var();
                self.unify_at(expected, &Ty::array(elem.clone()), span)?;
                for &p in elems {
                    self.bind_pattern(p, &elem, ng)?;
                }
                Ok(())
            }

            PatternKind::Tuple(elems) => {
                let mut types = Vec::with_capacity(elems.len());
                for &p in elems {
                    let var = self.store.fresh_var();
                    self.bind_pattern(p, &var, ng)?;
                    types.push(var);
                }
                self.unify_at(expected, &Ty::Tuple(types), span)
            }

            PatternKind::Object(props) => {
                let mut types = Vec::with_capacity(props.len());
                for (key, p) in props {
                    let var = self.store.fresh_var();
                    self.bind_pattern(*p, &var, ng)?;
                    types.push((key.clone(), var));
                }
                self.unify_at(expected, &Ty::Object(types), span)
            }

            PatternKind::ListCons(patterns) => {
                let elem = self.store.fresh_var();
                self.unify_at(expected, &Ty::array(elem.clone()), span)?;
                if let Some((rest, heads)) = patterns.split_last() {
                    for &p in heads {
                        self.bind_pattern(p, &elem, ng)?;
                    }
                    self.bind_pattern(*rest, &Ty::array(elem), ng)?;
                }
                Ok(())
            }

            PatternKind::Constructor { tag, args } => {
                if tag == "_" {
                    return Ok(());
                }
                if args.is_empty() && is_binder(tag) {
                    self.env.define(tag.clone(), Binding::value(expected.clone()));
                    ng.push(expected.clone());
                    return Ok(());
                }
                let (fields, tag_ty) = self.constructor_type(tag, span, ng)?;
                if fields.len() != args.len() {
                    return Err(TypeError::new(
                        TypeErrorKind::Arity {
                            name: tag.clone(),
                            expected: fields.len(),
                            given: args.len(),
                        },
                        span,
                    ));
                }
                self.unify_at(expected, &tag_ty, span)?;
                for (&p, field) in args.iter().zip(&fields) {
                    self.bind_pattern(p, field, ng)?;
                }
                Ok(())
            }
        }
    }

    /// A fresh instance of constructor `name`: its field types and its `Tag`.
    fn constructor_type(
        &mut self,
        name: &SmolStr,
        span: Span,
        ng: &[Ty],
    ) -> Result<(Vec<Ty>, Ty), TypeError> {
        let binding = match self.env.lookup(name) {
            Some(b) if matches!(b.role, Role::Constructor) => b.ty.clone(),
            _ => {
                return Err(TypeError::new(
                    TypeErrorKind::UndefinedConstructor(name.clone()),
                    span,
                ))
            }
        };
        match self.store.fresh(&binding, ng) {
            Ty::Fn(fields, tag) => Ok((fields, *tag)),
            other => Ok((Vec::new(), other)),
        }
    }

    // ── Declarations ─────────────────────────────────────────────

    /// Register data types in two passes so constructors of one declaration
    /// may mention every type of the group.
    pub(crate) fn register_data_decls(&mut self, decls: &[(&Data, Span)]) -> Result<(), TypeError> {
        let mut params_of = Vec::with_capacity(decls.len());
        for (data, span) in decls {
            if self.env.lookup_type(&data.name).is_some() {
                return Err(TypeError::new(
                    TypeErrorKind::Redefinition {
                        what: "Type constructor",
                        name: data.name.clone(),
                    },
                    *span,
                ));
            }
            let mut seen = HashSet::new();
            let mut params = Vec::with_capacity(data.params.len());
            for param in &data.params {
                if !seen.insert(param.clone()) {
                    return Err(TypeError::new(
                        TypeErrorKind::RepeatedTypeVariable(param.clone()),
                        *span,
                    ));
                }
                params.push((param.clone(), self.store.fresh_var()));
            }
            let tag = Ty::Tag(
                data.name.clone(),
                params.iter().map(|(_, v)| v.clone()).collect(),
            );
            debug!(name = %data.name, "declaring data type");
            self.env.define_type(data.name.clone(), tag.clone());
            params_of.push((params, tag));
        }

        for ((data, _), (params, tag)) in decls.iter().zip(params_of) {
            self.type_param_frame(false, |cx| {
                cx.type_param_scope.extend(params);
                for variant in &data.tags {
                    if cx.env.lookup(&variant.name).is_some() {
                        return Err(TypeError::new(
                            TypeErrorKind::Redefinition {
                                what: "Data constructor",
                                name: variant.name.clone(),
                            },
                            variant.span,
                        ));
                    }
                    let fields = variant
                        .fields
                        .iter()
                        .map(|&f| cx.resolve_type_expr(f))
                        .collect::<Result<Vec<_>, _>>()?;
                    cx.env.define(
                        variant.name.clone(),
                        Binding::with_role(Ty::func(fields, tag.clone()), Role::Constructor),
                    );
                }
                Ok(())
            })?;
        }
        Ok(())
    }

    fn declare_alias(&mut self, alias: &TypeAlias, span: Span) -> Result<(), TypeError> {
        let (params, body) = self.type_param_frame(false, |cx| {
            let mut seen = HashSet::new();
            let mut params = Vec::with_capacity(alias.params.len());
            for param in &alias.params {
                if !seen.insert(param.clone()) {
                    return Err(TypeError::new(
                        TypeErrorKind::RepeatedTypeVariable(param.clone()),
                        span,
                    ));
                }
                params.push(cx.type_param(param));
            }
            let body = cx.resolve_type_expr(alias.value)?;
            Ok((params, body))
        })?;

        let def = if params.is_empty() {
            AliasDef::Plain(Ty::Aliased(alias.name.clone(), Box::new(body)))
        } else {
            AliasDef::Parametric { params, body }
        };
        debug!(name = %alias.name, "declaring type alias");
        self.aliases.insert(alias.name.clone(), def);
        Ok(())
    }

    fn declare_type_class(&mut self, class: &TypeClass, span: Span) -> Result<Ty, TypeError> {
        if self
            .env
            .lookup(&class.name)
            .is_some_and(|b| matches!(b.role, Role::TypeClass { .. }))
        {
            return Err(TypeError::new(
                TypeErrorKind::Redefinition {
                    what: "Type-class",
                    name: class.name.clone(),
                },
                span,
            ));
        }

        self.type_param_frame(false, |cx| {
            let subject = cx.resolve_type_expr(class.generic)?;
            let mut members = Vec::with_capacity(class.members.len());
            for member in &class.members {
                if cx.env.lookup(&member.name).is_some() {
                    return Err(TypeError::new(
                        TypeErrorKind::Redefinition {
                            what: "Type-class member",
                            name: member.name.clone(),
                        },
                        member.span,
                    ));
                }
                let ty = cx.resolve_type_expr(member.type_ann)?;
                cx.env.define(
                    member.name.clone(),
                    Binding::with_role(
                        ty,
                        Role::ClassMember {
                            class: class.name.clone(),
                        },
                    ),
                );
                members.push(member.name.clone());
            }
            let ty = Ty::TypeClass(class.name.clone(), Box::new(subject));
            debug!(name = %class.name, "declaring type-class");
            cx.env.define(
                class.name.clone(),
                Binding::with_role(ty.clone(), Role::TypeClass { members }),
            );
            Ok(ty)
        })
    }

    fn declare_instance(
        &mut self,
        instance: &Instance,
        span: Span,
        ng: &[Ty],
        constraints: &mut Vec<Constraint>,
    ) -> Result<Ty, TypeError> {
        let (class_ty, members) = match self.env.lookup(&instance.class_name) {
            Some(Binding {
                ty,
                role: Role::TypeClass { members },
                ..
            }) => (ty.clone(), members.clone()),
            _ => {
                return Err(TypeError::new(
                    TypeErrorKind::UnknownTypeClass(instance.class_name.clone()),
                    span,
                ))
            }
        };

        // One instantiation shared by the class subject and every member
        // signature, so each member sees the instance type.
        let mut mapping = HashMap::new();
        let class_ty = self.store.fresh_with(&class_ty, &[], &mut mapping);
        let Ty::TypeClass(_, class_subject) = class_ty else {
            return Err(TypeError::new(
                TypeErrorKind::UnknownTypeClass(instance.class_name.clone()),
                span,
            ));
        };
        let subject = self.type_param_frame(false, |cx| cx.resolve_type_expr(instance.type_ann))?;
        self.unify_at(&class_subject, &subject, span)?;

        let object_ty = self.analyse(instance.object, ng, constraints)?;
        let props = match self.store.prune(&object_ty) {
            Ty::Object(props) => props,
            _ => Vec::new(),
        };

        for (key, prop_ty) in &props {
            let signature = match self.env.lookup(key) {
                Some(Binding {
                    ty,
                    role: Role::ClassMember { class },
                    ..
                }) if *class == instance.class_name => ty.clone(),
                _ => {
                    return Err(TypeError::new(
                        TypeErrorKind::UndefinedTypeClassMember {
                            member: key.clone(),
                            class: instance.class_name.clone(),
                        },
                        span,
                    ))
                }
            };
            let signature = self.store.fresh_with(&signature, &[], &mut mapping);
            self.unify_at(prop_ty, &signature, span)?;
        }

        if let Some(missing) = members
            .iter()
            .find(|m| !props.iter().any(|(k, _)| k == *m))
        {
            return Err(TypeError::new(
                TypeErrorKind::MissingInstanceMember {
                    instance: instance.name.clone(),
                    member: missing.clone(),
                },
                span,
            ));
        }

        debug!(name = %instance.name, class = %instance.class_name, "declaring instance");
        self.env.define(
            instance.name.clone(),
            Binding::with_role(
                object_ty.clone(),
                Role::Instance {
                    class: instance.class_name.clone(),
                    subject,
                },
            ),
        );
        Ok(object_ty)
    }

    // ── Other forms ──────────────────────────────────────────────

    /// `do monad ...`: the block's type is the result of the monad's `return`.
    fn analyse_do(
        &mut self,
        monad: ExprId,
        body: &[ExprId],
        span: Span,
        ng: &[Ty],
        constraints: &mut Vec<Constraint>,
    ) -> Result<Ty, TypeError> {
        let module = self.module;
        let monad_ty = self.analyse(monad, ng, constraints)?;
        let input = self.store.fresh_var();
        let output = self.store.fresh_var();
        let shape = Ty::Object(vec![("return".into(), Ty::func(vec![input], output.clone()))]);
        self.unify_at(&monad_ty, &shape, span)?;

        self.scoped(|cx| {
            let mut block_ng = ng.to_vec();
            for &stmt in body {
                match &module.exprs[stmt].kind {
                    ExprKind::Bind { name, value } => {
                        let value_ty = cx.analyse(*value, &block_ng, constraints)?;
                        let bound = cx.store.fresh_var();
                        cx.env.define(name.clone(), Binding::value(bound.clone()));
                        block_ng.push(bound);
                        cx.expr_types.insert(stmt, value_ty);
                    }
                    _ => {
                        cx.analyse(stmt, &block_ng, constraints)?;
                    }
                }
            }
            Ok(())
        })?;

        Ok(output)
    }

    fn analyse_property_access(
        &mut self,
        value: ExprId,
        property: &SmolStr,
        span: Span,
        ng: &[Ty],
        constraints: &mut Vec<Constraint>,
    ) -> Result<Ty, TypeError> {
        let value_ty = self.analyse(value, ng, constraints)?;
        match self.store.prune(&value_ty) {
            Ty::Native => return Ok(Ty::Native),
            Ty::Object(mut props) => {
                if let Some(ty) = props.iter().find(|(k, _)| k == property).map(|(_, t)| t) {
                    return Ok(ty.clone());
                }
                // An object type inferred through a variable grows the property.
                if let Some(var) = self.store.last_var(&value_ty) {
                    let prop = self.store.fresh_var();
                    props.push((property.clone(), prop.clone()));
                    trace!(%property, "extending inferred object type");
                    self.store.bind(var, Ty::Object(props));
                    return Ok(prop);
                }
            }
            _ => {}
        }
        let prop = self.store.fresh_var();
        self.unify_at(
            &value_ty,
            &Ty::Object(vec![(property.clone(), prop.clone())]),
            span,
        )?;
        Ok(prop)
    }
}
