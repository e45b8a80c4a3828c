pub mod builder;
pub mod free_vars;

use la_arena::{Arena, Idx};
use smol_str::SmolStr;

// ── Source locations ──────────────────────────────────────────────

/// Source position of a node: 1-based line and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

// ── ID types ──────────────────────────────────────────────────────

pub type ExprId = Idx<Expr>;
pub type TypeExprId = Idx<TypeExpr>;
pub type PatternId = Idx<Pattern>;

// ── Module ────────────────────────────────────────────────────────

/// One compilation unit: the top-level nodes plus the arenas they live in.
#[derive(Debug, Clone)]
pub struct Module {
    pub body: Vec<ExprId>,
    pub exprs: Arena<Expr>,
    pub type_exprs: Arena<TypeExpr>,
    pub patterns: Arena<Pattern>,
}

impl Module {
    pub fn new() -> Self {
        Self {
            body: Vec::new(),
            exprs: Arena::new(),
            type_exprs: Arena::new(),
            patterns: Arena::new(),
        }
    }
}

impl Default for Module {
    fn default() -> Self {
        Self::new()
    }
}

// ── Expressions ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    /// Literal value.
    Lit(Literal),
    /// Identifier reference. Operator names (`+`, `++`) are identifiers too.
    Identifier(SmolStr),
    /// Named or anonymous function: `f a b = body where ...` / `\a -> body`
    Function(Function),
    /// Application: `f a b`. Operator applications use an operator identifier as `func`.
    Call { func: ExprId, args: Vec<ExprId> },
    /// `let name : type = value`
    Let {
        name: SmolStr,
        type_ann: Option<TypeExprId>,
        value: ExprId,
    },
    /// `name = value`
    Assignment { name: SmolStr, value: ExprId },
    /// `if condition then ... else ...`
    IfThenElse {
        condition: ExprId,
        if_true: Vec<ExprId>,
        if_false: Vec<ExprId>,
    },
    /// `match value | pattern = expr ...`
    Match { value: ExprId, cases: Vec<Case> },
    /// Algebraic data type declaration: `data Option a = Some a | None`
    Data(Data),
    /// Type alias declaration: `type Pair a = {first: a, second: a}`
    TypeAlias(TypeAlias),
    /// Type-class declaration: `typeclass Show #a { show: Function(#a, String) }`
    TypeClass(TypeClass),
    /// Type-class instance: `instance showNumber = Show Number { show: \n -> ... }`
    Instance(Instance),
    /// Monadic block: `do monad ... `
    Do { monad: ExprId, body: Vec<ExprId> },
    /// Monadic bind inside a `do` block: `name <- value`
    Bind { name: SmolStr, value: ExprId },
    /// `value.property`
    PropertyAccess { value: ExprId, property: SmolStr },
    /// Array indexing: `value @ index`
    Access { value: ExprId, index: ExprId },
    /// Object merge: `left with right`
    With { left: ExprId, right: ExprId },
    /// Fixed-type binary operator.
    BinaryOp {
        kind: BinaryOpKind,
        op: SmolStr,
        left: ExprId,
        right: ExprId,
    },
    /// Boolean negation.
    Not(ExprId),
    /// `[a, b, c]`
    Array(Vec<ExprId>),
    /// `(a, b, c)`
    Tuple(Vec<ExprId>),
    /// `{x: a, y: b}`
    Object(Vec<(SmolStr, ExprId)>),
}

/// Operand discipline of a [`ExprKind::BinaryOp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOpKind {
    /// Both sides share one type, result is Boolean (`==`, `!=`, comparisons).
    Generic,
    /// Number operands and result.
    Number,
    /// Boolean operands and result (`&&`, `||`).
    Boolean,
    /// String operands and result.
    String,
}

/// Literal values.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    String(String),
    Boolean(bool),
    Unit,
}

/// Function declaration or lambda.
#[derive(Debug, Clone)]
pub struct Function {
    /// `None` for lambdas.
    pub name: Option<SmolStr>,
    pub args: Vec<Param>,
    pub return_type: Option<TypeExprId>,
    /// Empty for extern-style declarations, which then need a return annotation.
    pub body: Vec<ExprId>,
    /// `where` clause: local `Function` and `Data` declarations.
    pub where_decls: Vec<ExprId>,
}

impl Function {
    pub fn named(name: impl Into<SmolStr>) -> Self {
        Self {
            name: Some(name.into()),
            args: Vec::new(),
            return_type: None,
            body: Vec::new(),
            where_decls: Vec::new(),
        }
    }

    pub fn lambda() -> Self {
        Self {
            name: None,
            args: Vec::new(),
            return_type: None,
            body: Vec::new(),
            where_decls: Vec::new(),
        }
    }

    pub fn arg(mut self, name: impl Into<SmolStr>) -> Self {
        self.args.push(Param {
            name: name.into(),
            type_ann: None,
            span: Span::default(),
        });
        self
    }

    pub fn typed_arg(mut self, name: impl Into<SmolStr>, ty: TypeExprId) -> Self {
        self.args.push(Param {
            name: name.into(),
            type_ann: Some(ty),
            span: Span::default(),
        });
        self
    }

    pub fn returns(mut self, ty: TypeExprId) -> Self {
        self.return_type = Some(ty);
        self
    }

    pub fn body(mut self, body: Vec<ExprId>) -> Self {
        self.body = body;
        self
    }

    pub fn where_decls(mut self, decls: Vec<ExprId>) -> Self {
        self.where_decls = decls;
        self
    }
}

/// Function parameter.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: SmolStr,
    pub type_ann: Option<TypeExprId>,
    pub span: Span,
}

/// Sum type declaration.
#[derive(Debug, Clone)]
pub struct Data {
    pub name: SmolStr,
    pub params: Vec<SmolStr>,
    pub tags: Vec<Tag>,
}

/// One constructor of a sum type.
#[derive(Debug, Clone)]
pub struct Tag {
    pub name: SmolStr,
    pub fields: Vec<TypeExprId>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct TypeAlias {
    pub name: SmolStr,
    pub params: Vec<SmolStr>,
    pub value: TypeExprId,
}

#[derive(Debug, Clone)]
pub struct TypeClass {
    pub name: SmolStr,
    /// The subject type, normally a generic such as `#a`.
    pub generic: TypeExprId,
    pub members: Vec<MemberSig>,
}

/// Member signature declared by a type class.
#[derive(Debug, Clone)]
pub struct MemberSig {
    pub name: SmolStr,
    pub type_ann: TypeExprId,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Instance {
    /// Binding name of the instance dictionary.
    pub name: SmolStr,
    pub class_name: SmolStr,
    pub type_ann: TypeExprId,
    /// Object literal holding the member implementations.
    pub object: ExprId,
}

/// A match case: `| pattern = value`
#[derive(Debug, Clone)]
pub struct Case {
    pub pattern: PatternId,
    pub value: ExprId,
    pub span: Span,
}

// ── Patterns ──────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Pattern {
    pub kind: PatternKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum PatternKind {
    Number(f64),
    String(String),
    Boolean(bool),
    /// `_` is a wildcard, lower-case names bind, upper-case names are nullary constructors.
    Identifier(SmolStr),
    /// `[a, b]`
    Array(Vec<PatternId>),
    /// `(a, b)`
    Tuple(Vec<PatternId>),
    /// `{x: a}`
    Object(Vec<(SmolStr, PatternId)>),
    /// `a :: b :: rest`. The last pattern matches the rest of the list.
    ListCons(Vec<PatternId>),
    /// Constructor application: `Some x`
    Constructor { tag: SmolStr, args: Vec<PatternId> },
}

// ── Type expressions ──────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TypeExpr {
    pub kind: TypeExprKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum TypeExprKind {
    /// Generic type variable: `#a`
    Generic(SmolStr),
    /// `Function(A, B, R)`: argument types followed by the result type.
    Function(Vec<TypeExprId>),
    /// `[T]`
    Array(TypeExprId),
    /// Named type, possibly applied: `Number`, `Option Number`, an alias.
    Name { name: SmolStr, args: Vec<TypeExprId> },
    /// `(A, B)`
    Tuple(Vec<TypeExprId>),
    /// `{x: A, y: B}`
    Object(Vec<(SmolStr, TypeExprId)>),
}

// ── Helpers ───────────────────────────────────────────────────────

/// Characters an operator name is built from.
pub const OPERATOR_CHARS: &str = "+-*/%<>=!|&?@:";

/// True when every character of `name` is an operator character.
pub fn is_operator_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| OPERATOR_CHARS.contains(c))
}

/// True when `name` starts with an operator character (an operator definition).
pub fn starts_with_operator(name: &str) -> bool {
    name.chars()
        .next()
        .map(|c| OPERATOR_CHARS.contains(c))
        .unwrap_or(false)
}
