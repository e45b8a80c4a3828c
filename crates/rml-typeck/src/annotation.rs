use rml_ast::{Span, TypeExprId, TypeExprKind};
use smol_str::SmolStr;
use std::collections::HashMap;

use crate::error::{TypeError, TypeErrorKind};
use crate::infer::InferenceContext;
use crate::types::Ty;

/// A declared type alias.
#[derive(Clone, Debug)]
pub enum AliasDef {
    /// `type Name = T`: stored already wrapped as `Ty::Aliased(Name, T)`.
    Plain(Ty),
    /// `type Name a b = T`: instantiated afresh at every use.
    Parametric { params: Vec<Ty>, body: Ty },
}

impl InferenceContext<'_> {
    /// Run `f` with its own set of named type variables. With `inherit`,
    /// the names already in scope stay visible.
    pub(crate) fn type_param_frame<T>(
        &mut self,
        inherit: bool,
        f: impl FnOnce(&mut Self) -> Result<T, TypeError>,
    ) -> Result<T, TypeError> {
        let saved = if inherit {
            self.type_param_scope.clone()
        } else {
            std::mem::take(&mut self.type_param_scope)
        };
        let result = f(self);
        self.type_param_scope = saved;
        result
    }

    /// The variable for a named type parameter, created on first mention.
    pub(crate) fn type_param(&mut self, name: &SmolStr) -> Ty {
        if let Some(ty) = self.type_param_scope.get(name) {
            return ty.clone();
        }
        let var = self.store.fresh_var();
        self.type_param_scope.insert(name.clone(), var.clone());
        var
    }

    /// Convert surface type syntax into a type.
    pub(crate) fn resolve_type_expr(&mut self, id: TypeExprId) -> Result<Ty, TypeError> {
        let module = self.module;
        let type_expr = &module.type_exprs[id];
        match &type_expr.kind {
            TypeExprKind::Generic(name) => Ok(self.type_param(name)),
            TypeExprKind::Function(types) => {
                let mut resolved = types
                    .iter()
                    .map(|&t| self.resolve_type_expr(t))
                    .collect::<Result<Vec<_>, _>>()?;
                let ret = resolved.pop().unwrap_or(Ty::Unit);
                Ok(Ty::func(resolved, ret))
            }
            TypeExprKind::Array(elem) => Ok(Ty::array(self.resolve_type_expr(*elem)?)),
            TypeExprKind::Tuple(types) => Ok(Ty::Tuple(
                types
                    .iter()
                    .map(|&t| self.resolve_type_expr(t))
                    .collect::<Result<_, _>>()?,
            )),
            TypeExprKind::Object(props) => Ok(Ty::Object(
                props
                    .iter()
                    .map(|(k, t)| Ok((k.clone(), self.resolve_type_expr(*t)?)))
                    .collect::<Result<_, TypeError>>()?,
            )),
            TypeExprKind::Name { name, args } => self.resolve_named(name, args, type_expr.span),
        }
    }

    fn resolve_named(
        &mut self,
        name: &SmolStr,
        args: &[TypeExprId],
        span: Span,
    ) -> Result<Ty, TypeError> {
        if args.is_empty() {
            if let Some(ty) = self.type_param_scope.get(name) {
                return Ok(ty.clone());
            }
        }

        if let Some(alias) = self.aliases.get(name).cloned() {
            return match alias {
                AliasDef::Plain(ty) => Ok(ty),
                AliasDef::Parametric { params, body } => {
                    if params.len() != args.len() {
                        return Err(TypeError::new(
                            TypeErrorKind::TypeAliasArityMismatch {
                                name: name.clone(),
                                expected: params.len(),
                                given: args.len(),
                            },
                            span,
                        ));
                    }
                    let mut mapping = HashMap::new();
                    let body = self.store.fresh_with(&body, &[], &mut mapping);
                    for (param, &arg) in params.iter().zip(args) {
                        let param = self.store.fresh_with(param, &[], &mut mapping);
                        let arg_ty = self.resolve_type_expr(arg)?;
                        let arg_span = self.module.type_exprs[arg].span;
                        self.unify_at(&param, &arg_ty, arg_span)?;
                    }
                    Ok(body)
                }
            };
        }

        if args.is_empty() {
            match name.as_str() {
                "Number" => return Ok(Ty::Number),
                "String" => return Ok(Ty::String),
                "Boolean" => return Ok(Ty::Boolean),
                "Unit" => return Ok(Ty::Unit),
                _ => {}
            }
        }

        let Some(tag) = self.env.lookup_type(name).cloned() else {
            return Err(TypeError::new(TypeErrorKind::UnknownType(name.clone()), span));
        };
        let Ty::Tag(_, params) = self.store.fresh(&tag, &[]) else {
            return Ok(tag);
        };
        if params.len() != args.len() {
            return Err(TypeError::new(
                TypeErrorKind::TypeArgumentCount {
                    name: name.clone(),
                    expected: params.len(),
                    given: args.len(),
                },
                span,
            ));
        }
        for (param, &arg) in params.iter().zip(args) {
            let arg_ty = self.resolve_type_expr(arg)?;
            let arg_span = self.module.type_exprs[arg].span;
            self.unify_at(param, &arg_ty, arg_span)?;
        }
        Ok(Ty::Tag(name.clone(), params))
    }
}
