//! Derivative and gradient expression nodes
//!
//! Both nodes chain the differentiation engine, the simplification engine
//! and ordinary evaluation.

use crate::env::{CompileEnvironment, ExecutionEnvironment};
use crate::expr::Expr;
use crate::options::SimplifyOptions;
use crate::simplify::Simplifier;
use crate::types::Type;
use crate::value::{FunctionValue, Value};
use crate::Result;
use serde::{Deserialize, Serialize};

/// `derive(f by x)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Derivative {
    pub function: Box<Expr>,
    pub variable: String,
    /// `None` means "use the defaults"; see `Expr::with_default_options`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<SimplifyOptions>,
}

impl Derivative {
    pub fn new(function: Expr, variable: impl Into<String>) -> Self {
        Derivative {
            function: Box::new(function),
            variable: variable.into(),
            options: None,
        }
    }

    pub fn with_options(mut self, options: SimplifyOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn options(&self) -> SimplifyOptions {
        self.options.unwrap_or_default()
    }

    /// The expression actually differentiated: the body of a function value,
    /// the body of a function bound to a variable in `env`, or the bound
    /// expression itself.
    fn body(&self, env: Option<&ExecutionEnvironment>) -> Expr {
        match self.function.as_ref() {
            Expr::Function { body, .. } => body.as_ref().clone(),
            Expr::Variable(name) => match env.map(|env| env.lookup(name)) {
                Some(Ok(Value::Function(f))) => f.body.as_ref().clone(),
                _ => self.function.as_ref().clone(),
            },
            other => other.clone(),
        }
    }

    fn differentiate(&self, body: &Expr) -> Result<Expr> {
        Simplifier::new(self.options()).derive_and_simplify(body, &self.variable)
    }

    /// Simplified derivative, without consulting any environment.
    pub fn symbolic(&self) -> Result<Expr> {
        self.differentiate(&self.body(None))
    }

    /// Simplified derivative, resolving a function named by a variable.
    pub fn symbolic_in(&self, env: &ExecutionEnvironment) -> Result<Expr> {
        self.differentiate(&self.body(Some(env)))
    }

    pub fn evaluate(&self, env: &ExecutionEnvironment) -> Result<Value> {
        let derivative = self.symbolic_in(env)?;
        log::debug!(
            "d/d{} ({}) = {}",
            self.variable,
            self.function,
            derivative
        );
        derivative.evaluate(env)
    }

    /// The derivative as a one-parameter function of the derivation variable.
    pub fn to_function(&self, env: &ExecutionEnvironment) -> Result<Value> {
        let body = self.symbolic_in(env)?;
        Ok(Value::Function(FunctionValue::new(
            vec![self.variable.clone()],
            body,
        )))
    }

    /// Well typed iff the function type-checks and yields an integer.
    pub fn type_check(&self, env: &mut CompileEnvironment) -> Result<bool> {
        if !self.function.type_check(env)? {
            return Ok(false);
        }
        Ok(self.function.infer_type(env)?.yields_int())
    }

    pub fn infer_type(&self) -> Type {
        Type::int_to_int()
    }

    /// Evaluate, falling back to the node itself on environment errors.
    pub fn reduce(&self, env: &ExecutionEnvironment) -> Result<Expr> {
        match self.evaluate(env) {
            Ok(value) => Ok(value.into_expr()),
            Err(err) if err.is_environment() => {
                log::debug!("derivative left unreduced: {err}");
                Ok(Expr::Derivative(self.clone()))
            }
            Err(err) => Err(err),
        }
    }
}

/// `gradient(f by [x, y, ...])`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gradient {
    pub function: Box<Expr>,
    pub variables: Vec<String>,
    /// `None` means "use the defaults"; see `Expr::with_default_options`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<SimplifyOptions>,
}

impl Gradient {
    pub fn new<S: Into<String>>(function: Expr, variables: impl IntoIterator<Item = S>) -> Self {
        Gradient {
            function: Box::new(function),
            variables: variables.into_iter().map(Into::into).collect(),
            options: None,
        }
    }

    pub fn with_options(mut self, options: SimplifyOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn options(&self) -> SimplifyOptions {
        self.options.unwrap_or_default()
    }

    /// One derivative node per variable, in order.
    pub fn partials(&self) -> impl Iterator<Item = Derivative> + '_ {
        self.variables.iter().map(move |v| Derivative {
            function: self.function.clone(),
            variable: v.clone(),
            options: self.options,
        })
    }

    pub fn symbolic(&self) -> Result<Vec<Expr>> {
        self.partials().map(|d| d.symbolic()).collect()
    }

    pub fn symbolic_in(&self, env: &ExecutionEnvironment) -> Result<Vec<Expr>> {
        self.partials().map(|d| d.symbolic_in(env)).collect()
    }

    pub fn evaluate(&self, env: &ExecutionEnvironment) -> Result<Value> {
        let values = self
            .partials()
            .map(|d| d.evaluate(env))
            .collect::<Result<Vec<_>>>()?;
        Ok(Value::Vector(values))
    }

    /// Well typed iff the function type-checks and has vector type.
    pub fn type_check(&self, env: &mut CompileEnvironment) -> Result<bool> {
        if !self.function.type_check(env)? {
            return Ok(false);
        }
        Ok(self.function.infer_type(env)?.is_vector())
    }

    pub fn infer_type(&self) -> Type {
        Type::Vector
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_plus_three() -> Expr {
        Expr::add(Expr::mul(Expr::var("x"), Expr::var("x")), Expr::constant(3))
    }

    fn env_at(x: i32) -> ExecutionEnvironment {
        let mut env = ExecutionEnvironment::new();
        env.push_scope();
        env.declare("x", Value::Int(x)).unwrap();
        env
    }

    #[test]
    fn evaluates_at_bound_point() {
        let d = Derivative::new(square_plus_three(), "x");
        assert_eq!(d.evaluate(&env_at(2)).unwrap(), Value::Int(4));
    }

    #[test]
    fn unwraps_function_values() {
        let f = Expr::function(["x"], square_plus_three());
        let d = Derivative::new(f, "x");
        assert_eq!(
            d.symbolic().unwrap(),
            Expr::mul(Expr::constant(2), Expr::var("x"))
        );
    }

    #[test]
    fn resolves_function_named_by_variable() {
        let mut env = env_at(5);
        env.declare(
            "f",
            Value::Function(FunctionValue::new(vec!["x".into()], square_plus_three())),
        )
        .unwrap();
        let d = Derivative::new(Expr::var("f"), "x");
        assert_eq!(d.evaluate(&env).unwrap(), Value::Int(10));
        // without the environment `f` is just a variable
        assert_eq!(d.symbolic().unwrap(), Expr::constant(0));
    }

    #[test]
    fn to_function_binds_derivation_variable() {
        let d = Derivative::new(square_plus_three(), "x");
        let f = d.to_function(&ExecutionEnvironment::new()).unwrap();
        assert_eq!(
            f,
            Value::Function(FunctionValue::new(
                vec!["x".into()],
                Expr::mul(Expr::constant(2), Expr::var("x"))
            ))
        );
    }

    #[test]
    fn type_check_requires_integer_function() {
        let mut env = CompileEnvironment::new();
        env.declare("x", Type::Int).unwrap();
        env.declare("s", Type::String).unwrap();
        assert!(Derivative::new(square_plus_three(), "x")
            .type_check(&mut env)
            .unwrap());
        assert!(!Derivative::new(Expr::var("s"), "x")
            .type_check(&mut env)
            .unwrap());
        assert_eq!(
            Derivative::new(Expr::var("s"), "x").infer_type(),
            Type::int_to_int()
        );
    }

    #[test]
    fn reduce_falls_back_on_missing_variable() {
        let d = Derivative::new(square_plus_three(), "x");
        let reduced = d.reduce(&ExecutionEnvironment::new()).unwrap();
        assert_eq!(reduced, Expr::Derivative(d.clone()));
        assert_eq!(d.reduce(&env_at(3)).unwrap(), Expr::constant(6));
    }

    #[test]
    fn reduce_propagates_unsupported_derivative() {
        let d = Derivative::new(Expr::Str("text".into()), "x");
        assert!(d.reduce(&env_at(1)).is_err());
    }

    #[test]
    fn gradient_keeps_variable_order() {
        let f = Expr::add(
            Expr::mul(Expr::constant(3), Expr::var("x")),
            Expr::mul(Expr::var("y"), Expr::var("y")),
        );
        let mut env = env_at(1);
        env.declare("y", Value::Int(4)).unwrap();
        let g = Gradient::new(f, ["y", "x"]);
        assert_eq!(
            g.evaluate(&env).unwrap(),
            Value::Vector(vec![Value::Int(8), Value::Int(3)])
        );
        assert_eq!(g.symbolic().unwrap().len(), 2);
    }

    #[test]
    fn gradient_type_check_requires_vector() {
        let mut env = CompileEnvironment::new();
        env.declare("x", Type::Int).unwrap();
        env.declare("v", Type::Vector).unwrap();
        assert!(!Gradient::new(square_plus_three(), ["x"])
            .type_check(&mut env)
            .unwrap());
        assert!(Gradient::new(Expr::var("v"), ["x"])
            .type_check(&mut env)
            .unwrap());
        assert_eq!(Gradient::new(Expr::var("v"), ["x"]).infer_type(), Type::Vector);
    }

    #[test]
    fn gradient_symbolic_in_resolves_named_function() {
        let mut env = ExecutionEnvironment::new();
        env.declare(
            "f",
            Value::Function(FunctionValue::new(vec!["x".into()], square_plus_three())),
        )
        .unwrap();
        let g = Gradient::new(Expr::var("f"), ["x", "y"]);
        assert_eq!(
            g.symbolic_in(&env).unwrap(),
            vec![
                Expr::mul(Expr::constant(2), Expr::var("x")),
                Expr::constant(0)
            ]
        );
        assert_eq!(
            g.symbolic().unwrap(),
            vec![Expr::constant(0), Expr::constant(0)]
        );
    }
}
