//! Expression tree and the uniform expression contract
//!
//! Every variant implements evaluate / type-check / infer-type (here) and
//! reduce-to-normal-form (see `reduce.rs`). Trees are immutable: every
//! transformation builds a new tree.

use crate::calculus::{Derivative, Gradient};
use crate::env::{CompileEnvironment, ExecutionEnvironment};
use crate::options::SimplifyOptions;
use crate::types::Type;
use crate::value::{FunctionValue, Value};
use crate::{Result, SymdiffError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expr {
    Constant(i32),
    Bool(bool),
    Str(String),
    Variable(String),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Negate(Box<Expr>),
    Multiply(Box<Expr>, Box<Expr>),
    /// A function value; produced by evaluation, never differentiated directly
    Function {
        params: Vec<String>,
        body: Box<Expr>,
    },
    Vector(Vec<Value>),
    Derivative(Derivative),
    Gradient(Gradient),
}

impl Expr {
    pub fn constant(c: i32) -> Self {
        Expr::Constant(c)
    }

    pub fn var(name: impl Into<String>) -> Self {
        Expr::Variable(name.into())
    }

    pub fn add(l: Expr, r: Expr) -> Self {
        Expr::Add(Box::new(l), Box::new(r))
    }

    pub fn sub(l: Expr, r: Expr) -> Self {
        Expr::Sub(Box::new(l), Box::new(r))
    }

    pub fn neg(e: Expr) -> Self {
        Expr::Negate(Box::new(e))
    }

    pub fn mul(l: Expr, r: Expr) -> Self {
        Expr::Multiply(Box::new(l), Box::new(r))
    }

    pub fn function<S: Into<String>>(params: impl IntoIterator<Item = S>, body: Expr) -> Self {
        Expr::Function {
            params: params.into_iter().map(Into::into).collect(),
            body: Box::new(body),
        }
    }

    pub fn vector(elements: Vec<Value>) -> Self {
        Expr::Vector(elements)
    }

    pub fn derivative(function: Expr, variable: impl Into<String>) -> Self {
        Expr::Derivative(Derivative::new(function, variable))
    }

    pub fn gradient<S: Into<String>>(function: Expr, variables: impl IntoIterator<Item = S>) -> Self {
        Expr::Gradient(Gradient::new(function, variables))
    }

    /// Short name of the node kind, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::Constant(_) => "constant",
            Expr::Bool(_) => "boolean",
            Expr::Str(_) => "string",
            Expr::Variable(_) => "variable",
            Expr::Add(_, _) => "addition",
            Expr::Sub(_, _) => "subtraction",
            Expr::Negate(_) => "negation",
            Expr::Multiply(_, _) => "multiplication",
            Expr::Function { .. } => "function value",
            Expr::Vector(_) => "vector",
            Expr::Derivative(_) => "derivative",
            Expr::Gradient(_) => "gradient",
        }
    }

    pub fn as_constant(&self) -> Option<i32> {
        match self {
            Expr::Constant(c) => Some(*c),
            _ => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.as_constant() == Some(0)
    }

    pub fn is_one(&self) -> bool {
        self.as_constant() == Some(1)
    }

    /// Number of nodes in the tree (nested derivative bodies included).
    pub fn node_count(&self) -> usize {
        match self {
            Expr::Constant(_)
            | Expr::Bool(_)
            | Expr::Str(_)
            | Expr::Variable(_)
            | Expr::Vector(_) => 1,
            Expr::Add(l, r) | Expr::Sub(l, r) | Expr::Multiply(l, r) => {
                1 + l.node_count() + r.node_count()
            }
            Expr::Negate(e) => 1 + e.node_count(),
            Expr::Function { body, .. } => 1 + body.node_count(),
            Expr::Derivative(d) => 1 + d.function.node_count(),
            Expr::Gradient(g) => 1 + g.function.node_count(),
        }
    }

    /// Names referenced but not bound by an enclosing function value, sorted.
    pub fn free_vars(&self) -> Vec<String> {
        let mut out = BTreeSet::new();
        self.collect_free_vars(&mut out);
        out.into_iter().collect()
    }

    fn collect_free_vars(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Variable(name) => {
                out.insert(name.clone());
            }
            Expr::Add(l, r) | Expr::Sub(l, r) | Expr::Multiply(l, r) => {
                l.collect_free_vars(out);
                r.collect_free_vars(out);
            }
            Expr::Negate(e) => e.collect_free_vars(out),
            Expr::Function { params, body } => {
                let mut inner = BTreeSet::new();
                body.collect_free_vars(&mut inner);
                out.extend(inner.into_iter().filter(|v| !params.contains(v)));
            }
            Expr::Derivative(d) => d.function.collect_free_vars(out),
            Expr::Gradient(g) => g.function.collect_free_vars(out),
            Expr::Constant(_) | Expr::Bool(_) | Expr::Str(_) | Expr::Vector(_) => {}
        }
    }

    /// Give every derivative and gradient node without explicit options the
    /// supplied ones, including nodes nested inside other nodes.
    pub fn with_default_options(self, options: SimplifyOptions) -> Expr {
        let fill = |e: Box<Expr>| Box::new(e.with_default_options(options));
        match self {
            Expr::Add(l, r) => Expr::Add(fill(l), fill(r)),
            Expr::Sub(l, r) => Expr::Sub(fill(l), fill(r)),
            Expr::Multiply(l, r) => Expr::Multiply(fill(l), fill(r)),
            Expr::Negate(e) => Expr::Negate(fill(e)),
            Expr::Function { params, body } => Expr::Function {
                params,
                body: fill(body),
            },
            Expr::Derivative(d) => Expr::Derivative(Derivative {
                function: fill(d.function),
                options: d.options.or(Some(options)),
                ..d
            }),
            Expr::Gradient(g) => Expr::Gradient(Gradient {
                function: fill(g.function),
                options: g.options.or(Some(options)),
                ..g
            }),
            leaf => leaf,
        }
    }

    /// Evaluate the expression against a run-time environment.
    pub fn evaluate(&self, env: &ExecutionEnvironment) -> Result<Value> {
        match self {
            Expr::Constant(c) => Ok(Value::Int(*c)),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Str(s) => Ok(Value::String(s.clone())),
            Expr::Variable(name) => env.lookup(name).cloned(),
            Expr::Add(l, r) => self.eval_binary("+", l, r, env, i32::checked_add),
            Expr::Sub(l, r) => self.eval_binary("-", l, r, env, i32::checked_sub),
            Expr::Multiply(l, r) => self.eval_binary("*", l, r, env, i32::checked_mul),
            Expr::Negate(e) => {
                let v = int_operand("-", e.evaluate(env)?)?;
                v.checked_neg()
                    .map(Value::Int)
                    .ok_or_else(|| SymdiffError::ArithmeticOverflow(self.to_string()))
            }
            Expr::Function { params, body } => Ok(Value::Function(FunctionValue {
                params: params.clone(),
                body: body.clone(),
            })),
            Expr::Vector(elements) => Ok(Value::Vector(elements.clone())),
            Expr::Derivative(d) => d.evaluate(env),
            Expr::Gradient(g) => g.evaluate(env),
        }
    }

    fn eval_binary(
        &self,
        op: &'static str,
        l: &Expr,
        r: &Expr,
        env: &ExecutionEnvironment,
        apply: fn(i32, i32) -> Option<i32>,
    ) -> Result<Value> {
        let a = int_operand(op, l.evaluate(env)?)?;
        let b = int_operand(op, r.evaluate(env)?)?;
        apply(a, b)
            .map(Value::Int)
            .ok_or_else(|| SymdiffError::ArithmeticOverflow(self.to_string()))
    }

    /// True iff every sub-expression type-checks. Arithmetic nodes impose no
    /// constraint beyond their operands checking.
    pub fn type_check(&self, env: &mut CompileEnvironment) -> Result<bool> {
        match self {
            Expr::Constant(_) | Expr::Bool(_) | Expr::Str(_) => Ok(true),
            Expr::Variable(name) => env.lookup(name).map(|_| true),
            Expr::Add(l, r) | Expr::Sub(l, r) | Expr::Multiply(l, r) => {
                let left = l.type_check(env)?;
                let right = r.type_check(env)?;
                Ok(left && right)
            }
            Expr::Negate(e) => e.type_check(env),
            Expr::Function { params, body } => env.with_scope(|scope| {
                for p in params {
                    scope.declare(p.clone(), Type::Int)?;
                }
                body.type_check(scope)
            }),
            Expr::Vector(elements) => {
                let mut types = elements.iter().map(Value::type_of);
                Ok(match types.next() {
                    Some(first) => types.all(|t| t == first),
                    None => true,
                })
            }
            Expr::Derivative(d) => d.type_check(env),
            Expr::Gradient(g) => g.type_check(env),
        }
    }

    /// Static type of the expression. Binary arithmetic reports the type of
    /// its left operand.
    pub fn infer_type(&self, env: &mut CompileEnvironment) -> Result<Type> {
        match self {
            Expr::Constant(_) => Ok(Type::Int),
            Expr::Bool(_) => Ok(Type::Bool),
            Expr::Str(_) => Ok(Type::String),
            Expr::Variable(name) => env.lookup(name).cloned(),
            Expr::Add(l, _) | Expr::Sub(l, _) | Expr::Multiply(l, _) => l.infer_type(env),
            Expr::Negate(e) => e.infer_type(env),
            Expr::Function { params, body } => {
                let returns = env.with_scope(|scope| {
                    for p in params {
                        scope.declare(p.clone(), Type::Int)?;
                    }
                    body.infer_type(scope)
                })?;
                Ok(Type::Function {
                    params: vec![Type::Int; params.len()],
                    returns: Box::new(returns),
                })
            }
            Expr::Vector(_) => Ok(Type::Vector),
            Expr::Derivative(d) => Ok(d.infer_type()),
            Expr::Gradient(g) => Ok(g.infer_type()),
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Function { .. } => 0,
            Expr::Add(_, _) | Expr::Sub(_, _) => 1,
            Expr::Multiply(_, _) => 2,
            Expr::Negate(_) => 3,
            _ => 4,
        }
    }
}

fn int_operand(op: &'static str, v: Value) -> Result<i32> {
    match v {
        Value::Int(i) => Ok(i),
        other => Err(SymdiffError::NonIntegerOperand {
            op,
            found: other.type_of(),
        }),
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, e: &Expr, parens: bool) -> fmt::Result {
    if parens {
        write!(f, "({e})")
    } else {
        write!(f, "{e}")
    }
}

fn write_binary(f: &mut fmt::Formatter<'_>, parent: &Expr, op: &str, l: &Expr, r: &Expr) -> fmt::Result {
    let p = parent.precedence();
    write_operand(f, l, l.precedence() < p)?;
    write!(f, " {op} ")?;
    // Left-associative rendering: a right operand of equal precedence is a
    // separate subtree and keeps its parentheses.
    write_operand(f, r, r.precedence() <= p)
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Constant(c) => write!(f, "{c}"),
            Expr::Bool(b) => write!(f, "{b}"),
            Expr::Str(s) => write!(f, "\"{s}\""),
            Expr::Variable(name) => write!(f, "{name}"),
            Expr::Add(l, r) => write_binary(f, self, "+", l, r),
            Expr::Sub(l, r) => write_binary(f, self, "-", l, r),
            Expr::Multiply(l, r) => write_binary(f, self, "*", l, r),
            Expr::Negate(e) => {
                write!(f, "-")?;
                write_operand(f, e, e.precedence() < 4)
            }
            Expr::Function { params, body } => write!(f, "fn({}) = {body}", params.join(", ")),
            Expr::Vector(elements) => write!(f, "{}", Value::Vector(elements.clone())),
            Expr::Derivative(d) => write!(f, "derive({} by {})", d.function, d.variable),
            Expr::Gradient(g) => write!(f, "gradient({} by [{}])", g.function, g.variables.join(", ")),
        }
    }
}
