use smol_str::SmolStr;
use std::collections::HashMap;

use crate::types::{Ty, TypeStore};

/// One implementation of an operator.
#[derive(Clone, Debug)]
pub struct OverloadCandidate {
    pub name: SmolStr,
    /// Function type of the implementation.
    pub ty: Ty,
    /// Name the code generator emits for calls resolved to this candidate.
    pub mangled: SmolStr,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fixity {
    Unary,
    Binary,
}

impl Fixity {
    pub fn from_arity(arity: usize) -> Option<Fixity> {
        match arity {
            1 => Some(Fixity::Unary),
            2 => Some(Fixity::Binary),
            _ => None,
        }
    }
}

/// Overload candidates per operator name, bucketed by arity.
/// Lookup order is registration order, built-ins first.
#[derive(Debug, Default)]
pub struct OperatorTable {
    unary: HashMap<SmolStr, Vec<OverloadCandidate>>,
    binary: HashMap<SmolStr, Vec<OverloadCandidate>>,
}

impl OperatorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in arithmetic, comparison, concatenation and indexing operators.
    pub fn with_builtins(store: &mut TypeStore) -> Self {
        let mut table = Self::new();
        let number_op = Ty::func(vec![Ty::Number, Ty::Number], Ty::Number);
        let compare_op = Ty::func(vec![Ty::Number, Ty::Number], Ty::Boolean);

        table.register_builtin(
            "++",
            Ty::func(vec![Ty::String, Ty::String], Ty::String),
        );
        for op in ["+", "-", "*", "/", "%"] {
            table.register_builtin(op, number_op.clone());
        }
        for op in ["<", ">"] {
            table.register_builtin(op, compare_op.clone());
        }
        table.register_builtin("!", Ty::func(vec![Ty::Boolean], Ty::Boolean));
        for op in ["==", "!="] {
            let (a, b) = (store.fresh_var(), store.fresh_var());
            table.register_builtin(op, Ty::func(vec![a, b], Ty::Boolean));
        }
        for op in ["<=", ">="] {
            table.register_builtin(op, compare_op.clone());
        }
        let elem = store.fresh_var();
        table.register_builtin("@", Ty::func(vec![Ty::array(elem.clone()), Ty::Number], elem));
        table
    }

    fn register_builtin(&mut self, name: &str, ty: Ty) {
        let Ty::Fn(params, _) = &ty else {
            return;
        };
        let Some(fixity) = Fixity::from_arity(params.len()) else {
            return;
        };
        let candidate = OverloadCandidate {
            name: SmolStr::new(name),
            mangled: mangle(name, &signature(&ty)),
            ty,
        };
        self.register(fixity, candidate);
    }

    pub fn register(&mut self, fixity: Fixity, candidate: OverloadCandidate) {
        let bucket = match fixity {
            Fixity::Unary => &mut self.unary,
            Fixity::Binary => &mut self.binary,
        };
        bucket
            .entry(candidate.name.clone())
            .or_default()
            .push(candidate);
    }

    /// Candidates for `name` applied to `arity` arguments.
    pub fn candidates(&self, name: &str, arity: usize) -> Option<&[OverloadCandidate]> {
        let bucket = match Fixity::from_arity(arity)? {
            Fixity::Unary => &self.unary,
            Fixity::Binary => &self.binary,
        };
        bucket.get(name).map(Vec::as_slice)
    }
}

/// Parameter types followed by the result type.
pub(crate) fn signature(ty: &Ty) -> Vec<Ty> {
    match ty.unaliased() {
        Ty::Fn(params, ret) => {
            let mut types = params.clone();
            types.push((**ret).clone());
            types
        }
        other => vec![other.clone()],
    }
}

// ── Name mangling ────────────────────────────────────────────────

/// `__op_` + encoded operator + `_` + sanitized types joined by `_`.
pub fn mangle(op: &str, types: &[Ty]) -> SmolStr {
    let types: Vec<String> = types
        .iter()
        .map(|t| sanitize_type_name(&t.to_string()))
        .collect();
    SmolStr::new(format!("__op_{}_{}", encode_operator_name(op), types.join("_")))
}

/// Spell each operator character as a word: `<=` becomes `lt_eq`.
pub fn encode_operator_name(op: &str) -> String {
    op.chars()
        .map(|c| match c {
            '+' => "add".to_string(),
            '-' => "sub".to_string(),
            '*' => "mul".to_string(),
            '/' => "div".to_string(),
            '%' => "mod".to_string(),
            '<' => "lt".to_string(),
            '>' => "gt".to_string(),
            '=' => "eq".to_string(),
            '!' => "not".to_string(),
            '|' => "or".to_string(),
            '&' => "and".to_string(),
            '?' => "qmark".to_string(),
            '@' => "at".to_string(),
            ':' => "colon".to_string(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join("_")
}

fn replace_non_alnum(s: &str, keep_underscore: bool) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || (keep_underscore && c == '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Turn a rendered type into an identifier fragment.
pub fn sanitize_type_name(rendered: &str) -> String {
    if let Some(inner) = rendered
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .filter(|s| !s.is_empty() && !s.contains(')'))
    {
        let parts: Vec<String> = inner
            .split(',')
            .map(|t| replace_non_alnum(t.trim(), false))
            .collect();
        return format!("tuple_{}", parts.join("_"));
    }

    if let Some(inner) = rendered
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .filter(|s| !s.is_empty())
    {
        return format!("array_{}", replace_non_alnum(inner.trim(), false));
    }

    if let Some(inner) = rendered
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .filter(|s| !s.is_empty())
    {
        let props: Vec<String> = inner
            .split(',')
            .map(|prop| {
                prop.split(':')
                    .map(str::trim)
                    .collect::<Vec<_>>()
                    .join("_")
            })
            .collect();
        return format!("object_{}", replace_non_alnum(&props.join("_"), true));
    }

    let mut out = String::with_capacity(rendered.len());
    for c in replace_non_alnum(rendered, false).chars() {
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }
    out
}
