use super::*;
use rml_ast::builder::ModuleBuilder;
use rml_ast::{BinaryOpKind, ExprId, Function};

fn check_ok(b: ModuleBuilder) -> Checked {
    let module = b.finish();
    match check(&module) {
        Ok(checked) => checked,
        Err(diagnostic) => panic!("unexpected type error: {}", diagnostic),
    }
}

fn check_err(b: ModuleBuilder) -> TypeErrorKind {
    let module = b.finish();
    match check(&module) {
        Ok(checked) => panic!("expected a type error, got {:?}", checked.types),
        Err(diagnostic) => diagnostic.kind,
    }
}

fn check_err_msg(b: ModuleBuilder) -> String {
    check_err(b).to_string()
}

/// Display of the last top-level type.
fn last_type(b: ModuleBuilder) -> String {
    check_ok(b)
        .types
        .last()
        .map(|t| t.to_string())
        .unwrap_or_default()
}

fn types_of(b: ModuleBuilder) -> Vec<String> {
    check_ok(b).types.iter().map(|t| t.to_string()).collect()
}

/// `data Option a = Some a | None`
fn declare_option(b: &mut ModuleBuilder) {
    let a = b.t_name("a");
    let data = b.data("Option", &["a"], vec![("Some", vec![a]), ("None", vec![])]);
    b.top(data);
}

/// `typeclass Show #a { show: Function(#a, String) }`
/// `instance showNumber = Show Number { show: \n -> "number" }`
fn declare_show(b: &mut ModuleBuilder) {
    let subject = b.t_generic("a");
    let arg = b.t_generic("a");
    let string = b.t_name("String");
    let show_ty = b.t_fn(vec![arg, string]);
    let class = b.type_class("Show", subject, vec![("show", show_ty)]);
    b.top(class);

    let number = b.t_name("Number");
    let text = b.string("number");
    let show_fn = b.function(Function::lambda().arg("n").body(vec![text]));
    let object = b.object(vec![("show", show_fn)]);
    let instance = b.instance("showNumber", "Show", number, object);
    b.top(instance);
}

/// `add3 a b c = a + b + c`
fn declare_add3(b: &mut ModuleBuilder) {
    let a = b.ident("a");
    let bb = b.ident("b");
    let ab = b.apply("+", vec![a, bb]);
    let c = b.ident("c");
    let abc = b.apply("+", vec![ab, c]);
    let f = b.function(Function::named("add3").arg("a").arg("b").arg("c").body(vec![abc]));
    b.top(f);
}

// ── Literals and structure ──────────────────────────────────────

#[test]
fn literals() {
    let mut b = ModuleBuilder::new();
    for id in [b.num(1.0), b.string("s"), b.boolean(true), b.unit()] {
        b.top(id);
    }
    assert_eq!(types_of(b), vec!["Number", "String", "Boolean", "Unit"]);
}

#[test]
fn arrays_share_an_element_type() {
    let mut b = ModuleBuilder::new();
    let one = b.num(1.0);
    let two = b.num(2.0);
    let arr = b.array(vec![one, two]);
    b.top(arr);
    assert_eq!(last_type(b), "[Number]");
}

#[test]
fn mixed_array_is_rejected() {
    let mut b = ModuleBuilder::new();
    let one = b.num(1.0);
    let s = b.string("a");
    let arr = b.array(vec![one, s]);
    b.top(arr);
    assert!(matches!(check_err(b), TypeErrorKind::TypeMismatch { .. }));
}

#[test]
fn tuples_and_objects() {
    let mut b = ModuleBuilder::new();
    let one = b.num(1.0);
    let s = b.string("a");
    let tuple = b.tuple(vec![one, s]);
    b.top(tuple);
    let yes = b.boolean(true);
    let object = b.object(vec![("ok", yes)]);
    b.top(object);
    assert_eq!(types_of(b), vec!["(Number, String)", "{ok: Boolean}"]);
}

#[test]
fn with_merges_objects() {
    let mut b = ModuleBuilder::new();
    let one = b.num(1.0);
    let left = b.object(vec![("a", one)]);
    let s = b.string("x");
    let right = b.object(vec![("b", s)]);
    let merged = b.with(left, right);
    b.top(merged);
    assert_eq!(last_type(b), "{a: Number, b: String}");
}

#[test]
fn array_access() {
    let mut b = ModuleBuilder::new();
    let one = b.num(1.0);
    let arr = b.array(vec![one]);
    let zero = b.num(0.0);
    let access = b.access(arr, zero);
    b.top(access);
    assert_eq!(last_type(b), "Number");
}

#[test]
fn if_requires_boolean_condition() {
    let mut b = ModuleBuilder::new();
    let cond = b.num(1.0);
    let yes = b.num(2.0);
    let no = b.num(3.0);
    let branch = b.if_then_else(cond, vec![yes], vec![no]);
    b.top(branch);
    assert!(matches!(check_err(b), TypeErrorKind::TypeMismatch { .. }));
}

#[test]
fn if_branches_must_agree() {
    let mut b = ModuleBuilder::new();
    let cond = b.boolean(true);
    let yes = b.num(2.0);
    let no = b.string("no");
    let branch = b.if_then_else(cond, vec![yes], vec![no]);
    b.top(branch);
    assert!(matches!(check_err(b), TypeErrorKind::TypeMismatch { .. }));
}

#[test]
fn fixed_binary_operators() {
    let mut b = ModuleBuilder::new();
    let s1 = b.string("a");
    let s2 = b.string("b");
    let concat = b.binary(BinaryOpKind::String, "++", s1, s2);
    b.top(concat);
    let one = b.num(1.0);
    let two = b.num(2.0);
    let eq = b.binary(BinaryOpKind::Generic, "==", one, two);
    b.top(eq);
    let t = b.boolean(true);
    let negated = b.not(t);
    b.top(negated);
    assert_eq!(types_of(b), vec!["String", "Boolean", "Boolean"]);
}

#[test]
fn generic_comparison_needs_equal_operands() {
    let mut b = ModuleBuilder::new();
    let one = b.num(1.0);
    let s = b.string("a");
    let eq = b.binary(BinaryOpKind::Generic, "==", one, s);
    b.top(eq);
    assert!(matches!(check_err(b), TypeErrorKind::TypeMismatch { .. }));
}

// ── Functions ───────────────────────────────────────────────────

#[test]
fn identity_is_polymorphic() {
    let mut b = ModuleBuilder::new();
    let x = b.ident("x");
    let id = b.function(Function::named("id").arg("x").body(vec![x]));
    b.top(id);
    let one = b.num(1.0);
    let call_num = b.apply("id", vec![one]);
    b.top(call_num);
    let s = b.string("s");
    let call_str = b.apply("id", vec![s]);
    b.top(call_str);
    assert_eq!(types_of(b), vec!["Function(#a, #a)", "Number", "String"]);
}

#[test]
fn partial_application() {
    let mut b = ModuleBuilder::new();
    declare_add3(&mut b);
    let one = b.num(1.0);
    let p1 = b.apply("add3", vec![one]);
    b.top(p1);
    let one = b.num(1.0);
    let two = b.num(2.0);
    let p2 = b.apply("add3", vec![one, two]);
    b.top(p2);
    let args: Vec<ExprId> = [1.0, 2.0, 3.0].iter().map(|&n| b.num(n)).collect();
    let full = b.apply("add3", args);
    b.top(full);
    assert_eq!(
        types_of(b),
        vec![
            "Function(Number, Number, Number, Number)",
            "Function(Number, Number, Number)",
            "Function(Number, Number)",
            "Number",
        ]
    );
}

#[test]
fn too_many_arguments() {
    let mut b = ModuleBuilder::new();
    declare_add3(&mut b);
    let args: Vec<ExprId> = [1.0, 2.0, 3.0, 4.0].iter().map(|&n| b.num(n)).collect();
    let call = b.apply("add3", args);
    b.top(call);
    assert_eq!(
        check_err(b),
        TypeErrorKind::Arity {
            name: "add3".into(),
            expected: 3,
            given: 4,
        }
    );
}

#[test]
fn returned_lambda_is_flattened() {
    let mut b = ModuleBuilder::new();
    let a = b.ident("a");
    let inner = b.function(Function::lambda().arg("b").body(vec![a]));
    let curried = b.function(Function::named("konst").arg("a").body(vec![inner]));
    b.top(curried);
    let one = b.num(1.0);
    let s = b.string("x");
    let call = b.apply("konst", vec![one, s]);
    b.top(call);
    assert_eq!(types_of(b), vec!["Function(#a, #b, #a)", "Number"]);
}

#[test]
fn self_application_fails_occurs_check() {
    let mut b = ModuleBuilder::new();
    let x1 = b.ident("x");
    let x2 = b.ident("x");
    let call = b.call(x1, vec![x2]);
    let f = b.function(Function::named("f").arg("x").body(vec![call]));
    b.top(f);
    assert_eq!(check_err(b), TypeErrorKind::RecursiveUnification);
}

#[test]
fn annotated_arguments_and_return() {
    let mut b = ModuleBuilder::new();
    let number = b.t_name("Number");
    let string = b.t_name("String");
    let s = b.string("ok");
    let f = b.function(
        Function::named("label")
            .typed_arg("n", number)
            .returns(string)
            .body(vec![s]),
    );
    b.top(f);
    assert_eq!(last_type(b), "Function(Number, String)");
}

#[test]
fn return_annotation_is_checked() {
    let mut b = ModuleBuilder::new();
    let string = b.t_name("String");
    let one = b.num(1.0);
    let f = b.function(Function::named("bad").arg("x").returns(string).body(vec![one]));
    b.top(f);
    assert!(matches!(check_err(b), TypeErrorKind::TypeMismatch { .. }));
}

/// `f a : <ret> = \b -> a + b`
fn curried_with_return(b: &mut ModuleBuilder, ret: &str) {
    let ret = b.t_name(ret);
    let a = b.ident("a");
    let bb = b.ident("b");
    let sum = b.apply("+", vec![a, bb]);
    let lambda = b.function(Function::lambda().arg("b").body(vec![sum]));
    let f = b.function(Function::named("f").arg("a").returns(ret).body(vec![lambda]));
    b.top(f);
}

#[test]
fn return_annotation_describes_curried_result() {
    let mut b = ModuleBuilder::new();
    curried_with_return(&mut b, "Number");
    assert_eq!(last_type(b), "Function(Number, Number, Number)");
}

#[test]
fn curried_result_is_checked_against_annotation() {
    let mut b = ModuleBuilder::new();
    curried_with_return(&mut b, "String");
    assert!(matches!(check_err(b), TypeErrorKind::TypeMismatch { .. }));
}

#[test]
fn bodyless_function_needs_return_type() {
    let mut b = ModuleBuilder::new();
    let f = b.function(Function::named("ext").arg("x"));
    b.top(f);
    assert_eq!(
        check_err(b),
        TypeErrorKind::MissingReturnAnnotation("ext".into())
    );
}

#[test]
fn repeated_argument() {
    let mut b = ModuleBuilder::new();
    let x = b.ident("x");
    let f = b.function(Function::named("f").arg("x").arg("x").body(vec![x]));
    b.top(f);
    assert_eq!(check_err(b), TypeErrorKind::RepeatedArgument("x".into()));
}

#[test]
fn function_redefinition() {
    let mut b = ModuleBuilder::new();
    for n in [1.0, 2.0] {
        let body = b.num(n);
        let f = b.function(Function::named("f").body(vec![body]));
        b.top(f);
    }
    assert_eq!(
        check_err(b),
        TypeErrorKind::Redefinition {
            what: "Function",
            name: "f".into(),
        }
    );
}

#[test]
fn mutually_recursive_where_functions() {
    let mut b = ModuleBuilder::new();

    let parity_fn = |b: &mut ModuleBuilder, name: &str, other: &str, base: bool| {
        let k = b.ident("k");
        let zero = b.num(0.0);
        let is_zero = b.apply("==", vec![k, zero]);
        let yes = b.boolean(base);
        let k = b.ident("k");
        let one = b.num(1.0);
        let pred = b.apply("-", vec![k, one]);
        let recurse = b.apply(other, vec![pred]);
        let body = b.if_then_else(is_zero, vec![yes], vec![recurse]);
        b.function(Function::named(name).arg("k").body(vec![body]))
    };
    let even = parity_fn(&mut b, "even", "odd", true);
    let odd = parity_fn(&mut b, "odd", "even", false);

    let n = b.ident("n");
    let call = b.apply("even", vec![n]);
    let f = b.function(
        Function::named("isEven")
            .arg("n")
            .body(vec![call])
            .where_decls(vec![even, odd]),
    );
    b.top(f);

    let checked = check_ok(b);
    assert_eq!(
        checked.ty.map(|t| t.to_string()).as_deref(),
        Some("Function(Number, Boolean)")
    );
    assert_eq!(
        checked.expr_types.get(odd).map(|t| t.to_string()).as_deref(),
        Some("Function(Number, Boolean)")
    );
}

#[test]
fn where_functions_do_not_leak() {
    let mut b = ModuleBuilder::new();
    let y = b.ident("y");
    let helper = b.function(Function::named("helper").arg("y").body(vec![y]));
    let x = b.ident("x");
    let call = b.apply("helper", vec![x]);
    let f = b.function(
        Function::named("outer")
            .arg("x")
            .body(vec![call])
            .where_decls(vec![helper]),
    );
    b.top(f);
    let one = b.num(1.0);
    let leaked = b.apply("helper", vec![one]);
    b.top(leaked);
    // Outside its function `helper` is an unknown name.
    assert_eq!(types_of(b), vec!["Function(#a, #a)", "Native"]);
}

// ── Bindings ────────────────────────────────────────────────────

#[test]
fn let_binding_is_generalised() {
    let mut b = ModuleBuilder::new();
    let x = b.ident("x");
    let lambda = b.function(Function::lambda().arg("x").body(vec![x]));
    let bind = b.let_("ident", lambda);
    b.top(bind);
    let one = b.num(1.0);
    let a = b.apply("ident", vec![one]);
    b.top(a);
    let t = b.boolean(true);
    let c = b.apply("ident", vec![t]);
    b.top(c);
    assert_eq!(types_of(b)[1..], ["Number", "Boolean"]);
}

#[test]
fn let_annotation_mismatch() {
    let mut b = ModuleBuilder::new();
    let string = b.t_name("String");
    let one = b.num(1.0);
    let bind = b.let_typed("x", string, one);
    b.top(bind);
    assert!(matches!(check_err(b), TypeErrorKind::TypeMismatch { .. }));
}

#[test]
fn assignment_keeps_the_type() {
    let mut b = ModuleBuilder::new();
    let one = b.num(1.0);
    let bind = b.let_("x", one);
    b.top(bind);
    let s = b.string("s");
    let assign = b.assign("x", s);
    b.top(assign);
    assert!(matches!(check_err(b), TypeErrorKind::TypeMismatch { .. }));
}

#[test]
fn unknown_identifiers_are_native() {
    let mut b = ModuleBuilder::new();
    let one = b.num(1.0);
    let call = b.apply("console", vec![one]);
    b.top(call);
    let number = b.t_name("Number");
    let js = b.ident("window");
    let bind = b.let_typed("width", number, js);
    b.top(bind);
    let width = b.ident("width");
    b.top(width);
    assert_eq!(types_of(b), vec!["Native", "Number", "Number"]);
}

#[test]
fn native_property_access() {
    let mut b = ModuleBuilder::new();
    let doc = b.ident("document");
    let prop = b.property(doc, "title");
    b.top(prop);
    assert_eq!(last_type(b), "Native");
}

#[test]
fn property_access_infers_open_object() {
    let mut b = ModuleBuilder::new();
    let o = b.ident("o");
    let name = b.property(o, "name");
    let f = b.function(Function::named("getName").arg("o").body(vec![name]));
    b.top(f);
    let o1 = b.ident("o");
    let a = b.property(o1, "a");
    let o2 = b.ident("o");
    let bb = b.property(o2, "b");
    let sum = b.apply("+", vec![a, bb]);
    let g = b.function(Function::named("sum").arg("o").body(vec![sum]));
    b.top(g);
    assert_eq!(
        types_of(b),
        vec![
            "Function({name: #a}, #a)",
            "Function({a: Number, b: Number}, Number)",
        ]
    );
}

#[test]
fn extension_is_seen_through_unified_parameters() {
    // g o q = o.a; [o, q]; q.b
    let mut b = ModuleBuilder::new();
    let o1 = b.ident("o");
    let a = b.property(o1, "a");
    let o2 = b.ident("o");
    let q1 = b.ident("q");
    let both = b.array(vec![o2, q1]);
    let q2 = b.ident("q");
    let bb = b.property(q2, "b");
    let g = b.function(Function::named("g").arg("o").arg("q").body(vec![a, both, bb]));
    b.top(g);
    assert_eq!(
        last_type(b),
        "Function({a: #a, b: #b}, {a: #a, b: #b}, #b)"
    );
}

#[test]
fn missing_property_on_known_object() {
    let mut b = ModuleBuilder::new();
    let one = b.num(1.0);
    let object = b.object(vec![("a", one)]);
    let prop = b.property(object, "b");
    b.top(prop);
    assert!(matches!(check_err(b), TypeErrorKind::TypeMismatch { .. }));
}

#[test]
fn do_block_returns_monad_result() {
    let mut b = ModuleBuilder::new();
    let x = b.ident("x");
    let wrapped = b.array(vec![x]);
    let ret = b.function(Function::lambda().arg("x").body(vec![wrapped]));
    let monad = b.object(vec![("return", ret)]);
    let bind = b.let_("listMonad", monad);
    b.top(bind);
    let m = b.ident("listMonad");
    let one = b.num(1.0);
    let step = b.bind("y", one);
    let y = b.ident("y");
    let block = b.do_(m, vec![step, y]);
    b.top(block);
    assert_eq!(last_type(b), "[#a]");
}

// ── Operators ───────────────────────────────────────────────────

#[test]
fn builtin_operator_is_mangled() {
    let mut b = ModuleBuilder::new();
    let plus = b.ident("+");
    let one = b.num(1.0);
    let two = b.num(2.0);
    let call = b.call(plus, vec![one, two]);
    b.top(call);
    let checked = check_ok(b);
    assert_eq!(checked.types.last(), Some(&Ty::Number));
    assert_eq!(
        checked.annotations.mangled_names.get(plus).map(|s| s.as_str()),
        Some("__op_add_Number_Number_Number")
    );
}

#[test]
fn user_overload_is_selected() {
    let mut b = ModuleBuilder::new();
    let s1 = b.t_name("String");
    let s2 = b.t_name("String");
    let s3 = b.t_name("String");
    let x = b.ident("x");
    let y = b.ident("y");
    let joined = b.apply("++", vec![x, y]);
    let decl = b.function(
        Function::named("+")
            .typed_arg("x", s1)
            .typed_arg("y", s2)
            .returns(s3)
            .body(vec![joined]),
    );
    b.top(decl);

    let plus = b.ident("+");
    let l = b.string("a");
    let r = b.string("b");
    let call = b.call(plus, vec![l, r]);
    b.top(call);

    let checked = check_ok(b);
    assert_eq!(checked.types.last(), Some(&Ty::String));
    let mangled = |id| checked.annotations.mangled_names.get(id).map(|s| s.as_str());
    assert_eq!(mangled(decl), Some("__op_add_String_String_String"));
    assert_eq!(mangled(plus), Some("__op_add_String_String_String"));
}

#[test]
fn no_matching_overload() {
    let mut b = ModuleBuilder::new();
    let t = b.boolean(true);
    let one = b.num(1.0);
    let call = b.apply("+", vec![t, one]);
    b.top(call);
    assert_eq!(
        check_err(b),
        TypeErrorKind::MissingOverload {
            op: "+".into(),
            args: "Boolean, Number".into(),
        }
    );
}

#[test]
fn undefined_operator() {
    let mut b = ModuleBuilder::new();
    let one = b.num(1.0);
    let two = b.num(2.0);
    let call = b.apply("<+>", vec![one, two]);
    b.top(call);
    assert_eq!(check_err(b), TypeErrorKind::UndefinedOperator("<+>".into()));
}

#[test]
fn operator_needs_one_or_two_parameters() {
    let mut b = ModuleBuilder::new();
    let one = b.num(1.0);
    let decl = b.function(Function::named("<+>").arg("a").arg("b").arg("c").body(vec![one]));
    b.top(decl);
    assert_eq!(
        check_err(b),
        TypeErrorKind::InvalidOperatorArity("<+>".into())
    );
}

#[test]
fn operator_passed_as_value() {
    let mut b = ModuleBuilder::new();
    let f = b.ident("f");
    let x = b.ident("x");
    let y = b.ident("y");
    let call = b.call(f, vec![x, y]);
    let apply2 = b.function(Function::named("apply2").arg("f").arg("x").arg("y").body(vec![call]));
    b.top(apply2);

    let plus = b.ident("+");
    let one = b.num(1.0);
    let two = b.num(2.0);
    let call = b.apply("apply2", vec![plus, one, two]);
    b.top(call);

    let checked = check_ok(b);
    assert_eq!(checked.types.last(), Some(&Ty::Number));
    assert_eq!(
        checked.annotations.mangled_names.get(plus).map(|s| s.as_str()),
        Some("__op_add_Number_Number_Number")
    );
}

// ── Data types and patterns ─────────────────────────────────────

#[test]
fn constructors_build_tags() {
    let mut b = ModuleBuilder::new();
    declare_option(&mut b);
    let five = b.num(5.0);
    let some = b.apply("Some", vec![five]);
    b.top(some);
    assert_eq!(last_type(b), "Option Number");
}

#[test]
fn constructor_needs_all_fields() {
    let mut b = ModuleBuilder::new();
    let n1 = b.t_name("Number");
    let n2 = b.t_name("Number");
    let data = b.data("Point", &[], vec![("Point", vec![n1, n2])]);
    b.top(data);
    let one = b.num(1.0);
    let call = b.apply("Point", vec![one]);
    b.top(call);
    assert_eq!(
        check_err(b),
        TypeErrorKind::Arity {
            name: "Point".into(),
            expected: 2,
            given: 1,
        }
    );
}

#[test]
fn match_on_constructor() {
    let mut b = ModuleBuilder::new();
    declare_option(&mut b);
    let five = b.num(5.0);
    let some = b.apply("Some", vec![five]);
    let px = b.p_ident("x");
    let p_some = b.p_ctor("Some", vec![px]);
    let x = b.ident("x");
    let p_none = b.p_ident("None");
    let zero = b.num(0.0);
    let m = b.match_(some, vec![(p_some, x), (p_none, zero)]);
    b.top(m);
    assert_eq!(last_type(b), "Number");
}

#[test]
fn bare_nullary_constructor_is_not_a_value_to_match() {
    let mut b = ModuleBuilder::new();
    declare_option(&mut b);
    let none = b.ident("None");
    let px = b.p_ident("x");
    let p_some = b.p_ctor("Some", vec![px]);
    let x = b.ident("x");
    let m = b.match_(none, vec![(p_some, x)]);
    b.top(m);
    assert!(matches!(check_err(b), TypeErrorKind::TypeMismatch { .. }));
}

#[test]
fn nullary_constructor_result_is_unwrapped() {
    let mut b = ModuleBuilder::new();
    declare_option(&mut b);
    let five = b.num(5.0);
    let p5 = b.p_num(5.0);
    let none = b.ident("None");
    let wild = b.p_ident("_");
    let one = b.num(1.0);
    let some = b.apply("Some", vec![one]);
    let m = b.match_(five, vec![(p5, none), (wild, some)]);
    b.top(m);
    assert_eq!(last_type(b), "Option Number");
}

#[test]
fn unknown_constructor_pattern() {
    let mut b = ModuleBuilder::new();
    let one = b.num(1.0);
    let p = b.p_ident("Foo");
    let two = b.num(2.0);
    let m = b.match_(one, vec![(p, two)]);
    b.top(m);
    assert_eq!(check_err(b), TypeErrorKind::UndefinedConstructor("Foo".into()));
}

#[test]
fn constructor_pattern_arity() {
    let mut b = ModuleBuilder::new();
    declare_option(&mut b);
    let one = b.num(1.0);
    let some = b.apply("Some", vec![one]);
    let pa = b.p_ident("a");
    let pb = b.p_ident("b");
    let p = b.p_ctor("Some", vec![pa, pb]);
    let zero = b.num(0.0);
    let m = b.match_(some, vec![(p, zero)]);
    b.top(m);
    assert_eq!(
        check_err(b),
        TypeErrorKind::Arity {
            name: "Some".into(),
            expected: 1,
            given: 2,
        }
    );
}

#[test]
fn record_pattern_narrows_fields() {
    let mut b = ModuleBuilder::new();
    let o = b.ident("o");
    let px = b.p_ident("x");
    let pattern = b.p_object(vec![("n", px)]);
    let x = b.ident("x");
    let one = b.num(1.0);
    let inc = b.apply("+", vec![x, one]);
    let m = b.match_(o, vec![(pattern, inc)]);
    let f = b.function(Function::named("bump").arg("o").body(vec![m]));
    b.top(f);
    assert_eq!(last_type(b), "Function({n: Number}, Number)");
}

#[test]
fn object_pattern_ignores_other_fields() {
    let mut b = ModuleBuilder::new();
    let one = b.num(1.0);
    let s = b.string("a");
    let record = b.object(vec![("x", one), ("y", s)]);
    let pn = b.p_ident("n");
    let pattern = b.p_object(vec![("x", pn)]);
    let n = b.ident("n");
    let m = b.match_(record, vec![(pattern, n)]);
    b.top(m);
    assert_eq!(last_type(b), "Number");
}

#[test]
fn list_cons_pattern() {
    let mut b = ModuleBuilder::new();
    let xs = b.ident("xs");
    let ph = b.p_ident("h");
    let pt = b.p_ident("t");
    let cons = b.p_cons(vec![ph, pt]);
    let h = b.ident("h");
    let empty = b.p_array(vec![]);
    let zero = b.num(0.0);
    let m = b.match_(xs, vec![(cons, h), (empty, zero)]);
    let f = b.function(Function::named("head").arg("xs").body(vec![m]));
    b.top(f);
    assert_eq!(last_type(b), "Function([Number], Number)");
}

#[test]
fn tuple_pattern() {
    let mut b = ModuleBuilder::new();
    let one = b.num(1.0);
    let s = b.string("s");
    let pair = b.tuple(vec![one, s]);
    let pa = b.p_ident("a");
    let pb = b.p_ident("b");
    let pattern = b.p_tuple(vec![pa, pb]);
    let second = b.ident("b");
    let m = b.match_(pair, vec![(pattern, second)]);
    b.top(m);
    assert_eq!(last_type(b), "String");
}

#[test]
fn repeated_data_type_variable() {
    let mut b = ModuleBuilder::new();
    let a = b.t_name("a");
    let data = b.data("Pair", &["a", "a"], vec![("Pair", vec![a])]);
    b.top(data);
    assert_eq!(check_err(b), TypeErrorKind::RepeatedTypeVariable("a".into()));
}

#[test]
fn data_type_argument_count() {
    let mut b = ModuleBuilder::new();
    declare_option(&mut b);
    let n1 = b.t_name("Number");
    let n2 = b.t_name("Number");
    let bad = b.t_applied("Option", vec![n1, n2]);
    let x = b.ident("x");
    let f = b.function(Function::named("f").typed_arg("x", bad).body(vec![x]));
    b.top(f);
    assert_eq!(
        check_err(b),
        TypeErrorKind::TypeArgumentCount {
            name: "Option".into(),
            expected: 1,
            given: 2,
        }
    );
}

#[test]
fn unknown_type_name() {
    let mut b = ModuleBuilder::new();
    let ty = b.t_name("Missing");
    let x = b.ident("x");
    let f = b.function(Function::named("f").typed_arg("x", ty).body(vec![x]));
    b.top(f);
    assert_eq!(check_err(b), TypeErrorKind::UnknownType("Missing".into()));
}

// ── Aliases ─────────────────────────────────────────────────────

#[test]
fn plain_alias_keeps_its_name() {
    let mut b = ModuleBuilder::new();
    let n1 = b.t_name("Number");
    let n2 = b.t_name("Number");
    let shape = b.t_object(vec![("x", n1), ("y", n2)]);
    let alias = b.type_alias("Point", &[], shape);
    b.top(alias);
    let point = b.t_name("Point");
    let p = b.ident("p");
    let f = b.function(Function::named("same").typed_arg("p", point).body(vec![p]));
    b.top(f);
    assert_eq!(last_type(b), "Function(Point, Point)");
}

#[test]
fn parametric_alias_is_instantiated() {
    let mut b = ModuleBuilder::new();
    let a1 = b.t_name("a");
    let a2 = b.t_name("a");
    let pair = b.t_tuple(vec![a1, a2]);
    let alias = b.type_alias("Pair", &["a"], pair);
    b.top(alias);
    let number = b.t_name("Number");
    let applied = b.t_applied("Pair", vec![number]);
    let p = b.ident("p");
    let f = b.function(Function::named("same").typed_arg("p", applied).body(vec![p]));
    b.top(f);
    assert_eq!(last_type(b), "Function((Number, Number), (Number, Number))");
}

#[test]
fn parametric_alias_arity() {
    let mut b = ModuleBuilder::new();
    let a = b.t_name("a");
    let list = b.t_array(a);
    let alias = b.type_alias("List", &["a"], list);
    b.top(alias);
    let bare = b.t_name("List");
    let p = b.ident("p");
    let f = b.function(Function::named("f").typed_arg("p", bare).body(vec![p]));
    b.top(f);
    assert_eq!(
        check_err(b),
        TypeErrorKind::TypeAliasArityMismatch {
            name: "List".into(),
            expected: 1,
            given: 0,
        }
    );
}

// ── Type classes ────────────────────────────────────────────────

#[test]
fn instance_is_resolved_for_member_call() {
    let mut b = ModuleBuilder::new();
    declare_show(&mut b);
    let show = b.ident("show");
    let five = b.num(5.0);
    let call = b.call(show, vec![five]);
    b.top(call);
    let checked = check_ok(b);
    assert_eq!(checked.types.last(), Some(&Ty::String));
    assert_eq!(
        checked.annotations.type_class_instances.get(show),
        Some(&vec![SmolStr::new("showNumber")])
    );
}

#[test]
fn missing_instance() {
    let mut b = ModuleBuilder::new();
    declare_show(&mut b);
    let s = b.string("text");
    let call = b.apply("show", vec![s]);
    b.top(call);
    assert_eq!(
        check_err(b),
        TypeErrorKind::MissingTypeClassInstance("Show String".into())
    );
}

#[test]
fn constrained_function_takes_dictionary() {
    let mut b = ModuleBuilder::new();
    declare_show(&mut b);
    let x = b.ident("x");
    let body = b.apply("show", vec![x]);
    let describe = b.function(Function::named("describe").arg("x").body(vec![body]));
    b.top(describe);
    let callee = b.ident("describe");
    let five = b.num(5.0);
    let call = b.call(callee, vec![five]);
    b.top(call);

    let checked = check_ok(b);
    assert_eq!(checked.types.last(), Some(&Ty::String));
    assert_eq!(
        checked.annotations.dictionary_params.get(describe),
        Some(&vec![SmolStr::new("Show")])
    );
    assert_eq!(
        checked.annotations.type_class_instances.get(callee),
        Some(&vec![SmolStr::new("showNumber")])
    );
}

/// `label x = show "text"`
fn declare_label(b: &mut ModuleBuilder) -> ExprId {
    declare_show(b);
    let text = b.string("text");
    let body = b.apply("show", vec![text]);
    let label = b.function(Function::named("label").arg("x").body(vec![body]));
    b.top(label)
}

#[test]
fn concrete_unsolved_constraint_becomes_dictionary() {
    let mut b = ModuleBuilder::new();
    let label = declare_label(&mut b);
    let checked = check_ok(b);
    assert_eq!(
        checked.annotations.dictionary_params.get(label),
        Some(&vec![SmolStr::new("Show")])
    );
}

#[test]
fn concrete_unsolved_constraint_fails_at_call_site() {
    let mut b = ModuleBuilder::new();
    declare_label(&mut b);
    let one = b.num(1.0);
    let call = b.apply("label", vec![one]);
    b.top(call);
    assert_eq!(
        check_err(b),
        TypeErrorKind::MissingTypeClassInstance("Show String".into())
    );
}

#[test]
fn instance_member_must_belong_to_class() {
    let mut b = ModuleBuilder::new();
    declare_show(&mut b);
    let number = b.t_name("Number");
    let text = b.string("x");
    let extra = b.function(Function::lambda().arg("n").body(vec![text]));
    let text = b.string("y");
    let show = b.function(Function::lambda().arg("n").body(vec![text]));
    let object = b.object(vec![("show", show), ("extra", extra)]);
    let instance = b.instance("showAgain", "Show", number, object);
    b.top(instance);
    assert_eq!(
        check_err(b),
        TypeErrorKind::UndefinedTypeClassMember {
            member: "extra".into(),
            class: "Show".into(),
        }
    );
}

#[test]
fn instance_must_define_every_member() {
    let mut b = ModuleBuilder::new();
    declare_show(&mut b);
    let string = b.t_name("String");
    let object = b.object(vec![]);
    let instance = b.instance("showString", "Show", string, object);
    b.top(instance);
    assert_eq!(
        check_err(b),
        TypeErrorKind::MissingInstanceMember {
            instance: "showString".into(),
            member: "show".into(),
        }
    );
}

#[test]
fn instance_member_type_is_checked() {
    let mut b = ModuleBuilder::new();
    declare_show(&mut b);
    let string = b.t_name("String");
    let one = b.num(1.0);
    let bad = b.function(Function::lambda().arg("s").body(vec![one]));
    let object = b.object(vec![("show", bad)]);
    let instance = b.instance("showString", "Show", string, object);
    b.top(instance);
    assert!(matches!(check_err(b), TypeErrorKind::TypeMismatch { .. }));
}

#[test]
fn instance_of_unknown_class() {
    let mut b = ModuleBuilder::new();
    let number = b.t_name("Number");
    let object = b.object(vec![]);
    let instance = b.instance("eqNumber", "Eq", number, object);
    b.top(instance);
    assert_eq!(check_err(b), TypeErrorKind::UnknownTypeClass("Eq".into()));
}

#[test]
fn type_class_redefinition() {
    let mut b = ModuleBuilder::new();
    declare_show(&mut b);
    let subject = b.t_generic("a");
    let class = b.type_class("Show", subject, vec![]);
    b.top(class);
    assert_eq!(
        check_err(b),
        TypeErrorKind::Redefinition {
            what: "Type-class",
            name: "Show".into(),
        }
    );
}

// ── Sessions and diagnostics ────────────────────────────────────

#[test]
fn session_keeps_global_bindings() {
    let mut session = Session::new();
    let options = CheckOptions::default();

    let mut b = ModuleBuilder::new();
    let x = b.ident("x");
    let two = b.num(2.0);
    let body = b.apply("*", vec![x, two]);
    let double = b.function(Function::named("double").arg("x").body(vec![body]));
    b.top(double);
    let first = b.finish();
    assert!(typecheck(&first, &mut session, &options).is_ok());

    let mut b = ModuleBuilder::new();
    let four = b.num(4.0);
    let call = b.apply("double", vec![four]);
    b.top(call);
    let second = b.finish();
    let checked = typecheck(&second, &mut session, &options).map_err(|d| d.to_string());
    assert_eq!(checked.map(|c| c.ty), Ok(Some(Ty::Number)));
    assert_eq!(
        session.lookup("double").map(|t| t.to_string()).as_deref(),
        Some("Function(Number, Number)")
    );
}

#[test]
fn first_node_type_is_reported() {
    let mut b = ModuleBuilder::new();
    let one = b.num(1.0);
    b.top(one);
    let s = b.string("s");
    b.top(s);
    let checked = check_ok(b);
    assert_eq!(checked.ty, Some(Ty::Number));
    assert_eq!(checked.types, vec![Ty::Number, Ty::String]);
}

#[test]
fn intrinsics_are_predeclared() {
    let mut b = ModuleBuilder::new();
    let one = b.num(1.0);
    let empty = b.array(vec![]);
    let call = b.apply("__rml_sys_list_addFirst", vec![one, empty]);
    b.top(call);
    assert_eq!(last_type(b), "[Number]");
}

#[test]
fn diagnostic_carries_location() {
    let mut b = ModuleBuilder::new();
    b.at(2, 9);
    let t = b.boolean(true);
    let one = b.num(1.0);
    let call = b.apply("+", vec![t, one]);
    b.top(call);
    let module = b.finish();

    let options = CheckOptions {
        filename: "main.rml".to_string(),
    };
    let diagnostic = match typecheck(&module, &mut Session::new(), &options) {
        Ok(_) => panic!("expected a type error"),
        Err(d) => d,
    };
    assert_eq!((diagnostic.line, diagnostic.column), (2, 9));
    assert_eq!(
        diagnostic.to_string(),
        "main.rml:2:9: Error: No matching overload found for operator + with argument types: Boolean, Number"
    );
}

#[test]
fn diagnostic_render_points_at_column() {
    let diagnostic = Diagnostic {
        filename: "main.rml".to_string(),
        line: 2,
        column: 9,
        message: "Operator `<+>` is not defined".to_string(),
        kind: TypeErrorKind::UndefinedOperator("<+>".into()),
    };
    let rendered = diagnostic.render("let x = 1\nlet y = true <+> 1\nx");
    assert_eq!(
        rendered,
        "main.rml:2:9: Error: Operator `<+>` is not defined\n\
         1 | let x = 1\n\
         2 | let y = true <+> 1\n\
         \x20           ^\n\
         3 | x\n"
    );
}

// ── Diagnostic messages ────────────────────────────────────────

#[test]
fn message_non_boolean_condition() {
    let mut b = ModuleBuilder::new();
    let cond = b.num(1.0);
    let yes = b.num(2.0);
    let no = b.num(3.0);
    let branch = b.if_then_else(cond, vec![yes], vec![no]);
    b.top(branch);
    insta::assert_snapshot!(check_err_msg(b), @"Type error: Number is not Boolean");
}

#[test]
fn message_prefers_alias_name() {
    let mut b = ModuleBuilder::new();
    let n1 = b.t_name("Number");
    let n2 = b.t_name("Number");
    let shape = b.t_object(vec![("x", n1), ("y", n2)]);
    let alias = b.type_alias("Point", &[], shape);
    b.top(alias);
    let point = b.t_name("Point");
    let p = b.ident("p");
    let f = b.function(Function::named("norm").typed_arg("p", point).body(vec![p]));
    b.top(f);
    let one = b.num(1.0);
    let call = b.apply("norm", vec![one]);
    b.top(call);
    insta::assert_snapshot!(check_err_msg(b), @"Type error: Number is not Point");
}

#[test]
fn message_too_many_arguments() {
    let mut b = ModuleBuilder::new();
    declare_add3(&mut b);
    let args: Vec<ExprId> = [1.0, 2.0, 3.0, 4.0].iter().map(|&n| b.num(n)).collect();
    let call = b.apply("add3", args);
    b.top(call);
    insta::assert_snapshot!(
        check_err_msg(b),
        @"Wrong number of arguments to `add3`: expected 3, given 4"
    );
}

#[test]
fn message_missing_overload() {
    let mut b = ModuleBuilder::new();
    let t = b.boolean(true);
    let one = b.num(1.0);
    let call = b.apply("+", vec![t, one]);
    b.top(call);
    insta::assert_snapshot!(
        check_err_msg(b),
        @"No matching overload found for operator + with argument types: Boolean, Number"
    );
}

#[test]
fn message_missing_instance() {
    let mut b = ModuleBuilder::new();
    declare_show(&mut b);
    let t = b.boolean(true);
    let call = b.apply("show", vec![t]);
    b.top(call);
    insta::assert_snapshot!(check_err_msg(b), @"Couldn't find instance of: Show Boolean");
}

#[test]
fn message_unknown_constructor() {
    let mut b = ModuleBuilder::new();
    let one = b.num(1.0);
    let p = b.p_ctor("Just", vec![]);
    let two = b.num(2.0);
    let m = b.match_(one, vec![(p, two)]);
    b.top(m);
    insta::assert_snapshot!(check_err_msg(b), @"Couldn't find constructor: Just");
}

#[test]
fn message_alias_arity() {
    let mut b = ModuleBuilder::new();
    let a = b.t_name("a");
    let list = b.t_array(a);
    let alias = b.type_alias("List", &["a"], list);
    b.top(alias);
    let n1 = b.t_name("Number");
    let n2 = b.t_name("Number");
    let applied = b.t_applied("List", vec![n1, n2]);
    let p = b.ident("p");
    let f = b.function(Function::named("f").typed_arg("p", applied).body(vec![p]));
    b.top(f);
    insta::assert_snapshot!(check_err_msg(b), @"Type 'List' expects 1 arguments but got 2");
}

#[test]
fn message_data_constructor_redefinition() {
    let mut b = ModuleBuilder::new();
    declare_option(&mut b);
    let data = b.data("Maybe", &[], vec![("None", vec![])]);
    b.top(data);
    insta::assert_snapshot!(check_err_msg(b), @"Data constructor `None` is already defined");
}

// ── Instantiation ──────────────────────────────────────────────

#[test]
fn fresh_copy_is_independent_but_unifiable() {
    let mut store = TypeStore::new();
    let a = store.fresh_var();
    let id = Ty::func(vec![a.clone()], a.clone());
    let copy = store.fresh(&id, &[]);
    assert_ne!(copy, id);
    assert!(store.unifiable(&copy, &id));
    assert_eq!(store.fresh(&id, &[a.clone()]), id);
}

#[test]
fn fresh_keeps_bound_non_generic_variable() {
    let mut store = TypeStore::new();
    let a = store.fresh_var();
    store.unify(&a, &Ty::Object(vec![])).unwrap();
    assert_eq!(store.fresh(&a, &[a.clone()]), a);
}

// ── Properties ──────────────────────────────────────────────────

mod properties {
    use super::*;
    use proptest::prelude::*;

    fn ground_ty() -> impl Strategy<Value = Ty> {
        let leaf = prop_oneof![
            Just(Ty::Number),
            Just(Ty::String),
            Just(Ty::Boolean),
            Just(Ty::Unit),
        ];
        leaf.prop_recursive(3, 24, 3, |inner| {
            prop_oneof![
                inner.clone().prop_map(Ty::array),
                proptest::collection::vec(inner.clone(), 1..3).prop_map(Ty::Tuple),
                (proptest::collection::vec(inner.clone(), 0..3), inner.clone())
                    .prop_map(|(params, ret)| Ty::func(params, ret)),
                proptest::collection::vec(inner, 0..3)
                    .prop_map(|args| Ty::Tag(SmolStr::new("Box"), args)),
            ]
        })
    }

    fn literal_array(kind: u8, len: usize) -> ModuleBuilder {
        let mut b = ModuleBuilder::new();
        let values = (0..len)
            .map(|i| match kind % 3 {
                0 => b.num(i as f64),
                1 => b.string("s"),
                _ => b.boolean(i % 2 == 0),
            })
            .collect();
        let arr = b.array(values);
        b.top(arr);
        b
    }

    proptest! {
        #[test]
        fn unify_is_reflexive(ty in ground_ty()) {
            let mut store = TypeStore::new();
            prop_assert!(store.unify(&ty, &ty).is_ok());
        }

        #[test]
        fn fresh_leaves_ground_types_alone(ty in ground_ty()) {
            let mut store = TypeStore::new();
            let copy = store.fresh(&ty, &[]);
            prop_assert_eq!(store.resolve(&copy), ty);
        }

        #[test]
        fn variable_takes_any_ground_type(ty in ground_ty()) {
            let mut store = TypeStore::new();
            let var = store.fresh_var();
            prop_assert!(store.unify(&var, &ty).is_ok());
            prop_assert_eq!(store.resolve(&var), ty);
        }

        #[test]
        fn checking_is_deterministic(kind in 0u8..3, len in 0usize..6) {
            let first = last_type(literal_array(kind, len));
            let second = last_type(literal_array(kind, len));
            prop_assert_eq!(first, second);
        }
    }
}
