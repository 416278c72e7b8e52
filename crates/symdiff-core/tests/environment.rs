use symdiff_core::{
    CompileEnvironment, ExecutionEnvironment, Expr, FunctionValue, SymdiffError, Type, Value,
};

#[test]
fn inner_scope_shadows_outer() {
    let mut env = ExecutionEnvironment::new();
    env.declare("x", Value::Int(1)).unwrap();
    env.push_scope();
    env.declare("x", Value::Int(10)).unwrap();

    let e = Expr::add(Expr::var("x"), Expr::constant(1));
    assert_eq!(e.evaluate(&env).unwrap(), Value::Int(11));

    env.pop_scope();
    assert_eq!(e.evaluate(&env).unwrap(), Value::Int(2));
}

#[test]
fn duplicate_declaration_in_same_scope_fails() {
    let mut env = CompileEnvironment::new();
    env.declare("x", Type::Int).unwrap();
    assert_eq!(
        env.declare("x", Type::Bool).unwrap_err(),
        SymdiffError::AlreadyDeclaredVariable("x".into())
    );
    env.push_scope();
    assert!(env.declare("x", Type::Bool).is_ok());
}

#[test]
fn popping_global_scope_is_ignored() {
    let mut env = ExecutionEnvironment::new();
    env.declare("keep", Value::Bool(true)).unwrap();
    env.pop_scope();
    assert_eq!(env.depth(), 1);
    assert_eq!(env.lookup("keep").unwrap(), &Value::Bool(true));
}

#[test]
fn type_check_reports_undeclared_variables() {
    let mut env = CompileEnvironment::new();
    let e = Expr::mul(Expr::var("x"), Expr::var("y"));
    env.declare("x", Type::Int).unwrap();
    assert_eq!(
        e.type_check(&mut env).unwrap_err(),
        SymdiffError::UndeclaredVariable("y".into())
    );
    env.declare("y", Type::Int).unwrap();
    assert!(e.type_check(&mut env).unwrap());
    assert_eq!(e.infer_type(&mut env).unwrap(), Type::Int);
}

#[test]
fn derivative_node_types() {
    let mut env = CompileEnvironment::new();
    let f = Expr::function(["x"], Expr::mul(Expr::var("x"), Expr::var("x")));
    let node = Expr::derivative(f, "x");
    assert!(node.type_check(&mut env).unwrap());
    assert_eq!(node.infer_type(&mut env).unwrap(), Type::int_to_int());
    assert_eq!(env.depth(), 1);
}

#[test]
fn gradient_node_types() {
    let mut env = CompileEnvironment::new();
    env.declare("v", Type::Vector).unwrap();
    let node = Expr::gradient(Expr::var("v"), ["x", "y"]);
    assert!(node.type_check(&mut env).unwrap());
    assert_eq!(node.infer_type(&mut env).unwrap(), Type::Vector);
}

#[test]
fn derivative_of_bound_function_value() {
    let mut env = ExecutionEnvironment::new();
    let square = FunctionValue::new(
        vec!["x".into()],
        Expr::add(Expr::mul(Expr::var("x"), Expr::var("x")), Expr::constant(3)),
    );
    env.declare("f", Value::Function(square)).unwrap();
    env.declare("x", Value::Int(7)).unwrap();

    let node = Expr::derivative(Expr::var("f"), "x");
    assert_eq!(node.evaluate(&env).unwrap(), Value::Int(14));
}
