use la_arena::ArenaMap;
use rml_ast::ExprId;
use smol_str::SmolStr;

use crate::types::Ty;

/// Facts the code generator needs, keyed by node.
#[derive(Clone, Debug, Default)]
pub struct Annotations {
    /// Operator identifiers and operator declarations: the overload's mangled name.
    pub mangled_names: ArenaMap<ExprId, SmolStr>,
    /// Identifiers that need instance dictionaries: the instance names to
    /// pass, or the class name when the dictionary comes from a parameter.
    pub type_class_instances: ArenaMap<ExprId, Vec<SmolStr>>,
    /// Functions that take dictionaries: the class of each extra parameter.
    pub dictionary_params: ArenaMap<ExprId, Vec<SmolStr>>,
}

/// Result of checking one module.
#[derive(Debug)]
pub struct Checked {
    /// Type of the first top-level node, if any.
    pub ty: Option<Ty>,
    /// Type of every top-level node, in order.
    pub types: Vec<Ty>,
    /// Resolved type of every analysed expression.
    pub expr_types: ArenaMap<ExprId, Ty>,
    pub annotations: Annotations,
}
