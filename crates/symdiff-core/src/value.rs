use crate::expr::Expr;
use crate::types::Type;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Runtime value produced by evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    Int(i32),
    Bool(bool),
    String(String),
    Function(FunctionValue),
    // Ordered results, e.g. the partial derivatives of a gradient
    Vector(Vec<Value>),
}

/// A function value: named parameters and a body, no captured environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionValue {
    pub params: Vec<String>,
    pub body: Box<Expr>,
}

impl FunctionValue {
    pub fn new(params: Vec<String>, body: Expr) -> Self {
        FunctionValue {
            params,
            body: Box::new(body),
        }
    }
}

impl Value {
    pub fn type_of(&self) -> Type {
        match self {
            Value::Int(_) => Type::Int,
            Value::Bool(_) => Type::Bool,
            Value::String(_) => Type::String,
            Value::Function(f) => Type::Function {
                params: vec![Type::Int; f.params.len()],
                returns: Box::new(Type::Unknown),
            },
            Value::Vector(_) => Type::Vector,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Int, bool and string values can be substituted into a tree during
    /// reduction; functions and vectors stay behind their names.
    pub fn is_scalar(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Bool(_) | Value::String(_))
    }

    /// Turn the value back into an expression leaf.
    pub fn into_expr(self) -> Expr {
        match self {
            Value::Int(i) => Expr::Constant(i),
            Value::Bool(b) => Expr::Bool(b),
            Value::String(s) => Expr::Str(s),
            Value::Function(f) => Expr::Function {
                params: f.params,
                body: f.body,
            },
            Value::Vector(elements) => Expr::Vector(elements),
        }
    }
}

impl TryFrom<&Value> for i32 {
    type Error = String;
    fn try_from(v: &Value) -> Result<Self, Self::Error> {
        match v {
            Value::Int(i) => Ok(*i),
            other => Err(format!("cannot convert {other} to int")),
        }
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i)
    }
}

impl fmt::Display for FunctionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn({}) = {}", self.params.join(", "), self.body)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{i}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::String(s) => write!(f, "\"{s}\""),
            Value::Function(func) => write!(f, "{func}"),
            Value::Vector(elements) => {
                write!(f, "[")?;
                for (i, v) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
        }
    }
}
