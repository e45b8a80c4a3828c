use rml_ast::Span;
use smol_str::SmolStr;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeErrorKind {
    #[error("Type error: {left} is not {right}")]
    TypeMismatch { left: String, right: String },

    #[error("Recursive unification")]
    RecursiveUnification,

    #[error("Wrong number of arguments to `{name}`: expected {expected}, given {given}")]
    Arity {
        name: SmolStr,
        expected: usize,
        given: usize,
    },

    #[error("{what} `{name}` is already defined")]
    Redefinition { what: &'static str, name: SmolStr },

    #[error("Couldn't find constructor: {0}")]
    UndefinedConstructor(SmolStr),

    #[error("`{member}` doesn't exist on type-class `{class}`")]
    UndefinedTypeClassMember { member: SmolStr, class: SmolStr },

    #[error("Unknown type-class `{0}`")]
    UnknownTypeClass(SmolStr),

    #[error("Instance `{instance}` is missing member `{member}`")]
    MissingInstanceMember { instance: SmolStr, member: SmolStr },

    #[error("No matching overload found for operator {op} with argument types: {args}")]
    MissingOverload { op: SmolStr, args: String },

    #[error("Operator `{0}` is not defined")]
    UndefinedOperator(SmolStr),

    #[error("Couldn't find instance of: {0}")]
    MissingTypeClassInstance(String),

    #[error("Function '{0}' has no body and no return type annotation")]
    MissingReturnAnnotation(SmolStr),

    #[error(
        "Invalid operator function for `{0}`. Operator functions must have 1 to 2 parameters \
         (1 for Unary and 2 for Binary Operators)"
    )]
    InvalidOperatorArity(SmolStr),

    #[error("Type '{name}' expects {expected} arguments but got {given}")]
    TypeAliasArityMismatch {
        name: SmolStr,
        expected: usize,
        given: usize,
    },

    #[error("Type arg lengths differ: '{name}' given {given} but should be {expected}")]
    TypeArgumentCount {
        name: SmolStr,
        expected: usize,
        given: usize,
    },

    #[error("Can't convert from explicit type: `{0}`")]
    UnknownType(SmolStr),

    #[error("Repeated function argument '{0}'")]
    RepeatedArgument(SmolStr),

    #[error("Repeated type variable '{0}'")]
    RepeatedTypeVariable(SmolStr),
}

/// Failure of a single unification, before it is located.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnifyError {
    Mismatch { left: String, right: String },
    Recursive,
}

impl From<UnifyError> for TypeErrorKind {
    fn from(err: UnifyError) -> Self {
        match err {
            UnifyError::Mismatch { left, right } => TypeErrorKind::TypeMismatch { left, right },
            UnifyError::Recursive => TypeErrorKind::RecursiveUnification,
        }
    }
}

/// A type error located at the node that caused it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeError {
    pub kind: TypeErrorKind,
    pub span: Span,
}

impl TypeError {
    pub fn new(kind: TypeErrorKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub(crate) fn from_unify(err: UnifyError, span: Span) -> Self {
        Self::new(err.into(), span)
    }

    pub fn into_diagnostic(self, filename: &str) -> Diagnostic {
        Diagnostic {
            filename: filename.to_string(),
            line: self.span.line,
            column: self.span.column,
            message: self.kind.to_string(),
            kind: self.kind,
        }
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}:{}] {}", self.span.line, self.span.column, self.kind)
    }
}

impl std::error::Error for TypeError {}

// ── Diagnostics ──────────────────────────────────────────────────

/// The reported form of an error: where it happened and what went wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub filename: String,
    pub line: u32,
    pub column: u32,
    pub message: String,
    pub kind: TypeErrorKind,
}

impl Diagnostic {
    /// The header followed by the offending source line, its neighbours, and a
    /// caret under the column.
    pub fn render(&self, source: &str) -> String {
        let mut out = format!("{}\n", self);
        let lines: Vec<&str> = source.lines().collect();
        let line = self.line as usize;
        if line == 0 || line > lines.len() {
            return out;
        }

        let width = (line + 1).min(lines.len()).to_string().len();
        let gutter = |n: usize| format!("{:>width$} | ", n, width = width);

        if line > 1 {
            out.push_str(&format!("{}{}\n", gutter(line - 1), lines[line - 2]));
        }
        out.push_str(&format!("{}{}\n", gutter(line), lines[line - 1]));
        let caret_offset = width + 3 + (self.column as usize).saturating_sub(1);
        out.push_str(&format!("{}^\n", " ".repeat(caret_offset)));
        if line < lines.len() {
            out.push_str(&format!("{}{}\n", gutter(line + 1), lines[line]));
        }
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: Error: {}",
            self.filename, self.line, self.column, self.message
        )
    }
}

impl std::error::Error for Diagnostic {}
