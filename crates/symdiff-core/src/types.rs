use serde::{Deserialize, Serialize};
use std::fmt;

/// Static type of an expression, as seen by the compile environment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    /// Integer number type
    Int,
    /// Boolean type
    Bool,
    /// String type
    String,
    /// Function type with parameter and return types
    Function {
        /// Parameter types
        params: Vec<Type>,
        /// Return type
        returns: Box<Type>,
    },
    /// Ordered aggregate of values (gradients)
    Vector,
    /// Unknown type (mixed or empty aggregates)
    Unknown,
}

impl Type {
    /// The `(int) -> int` signature of a one-variable derivative.
    pub fn int_to_int() -> Self {
        Type::Function {
            params: vec![Type::Int],
            returns: Box::new(Type::Int),
        }
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Type::Int)
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, Type::Vector)
    }

    /// True for `int` itself and for any function whose result is `int`.
    pub fn yields_int(&self) -> bool {
        match self {
            Type::Int => true,
            Type::Function { returns, .. } => returns.is_int(),
            _ => false,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Bool => write!(f, "bool"),
            Type::String => write!(f, "string"),
            Type::Function { params, returns } => {
                write!(f, "(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ") -> {returns}")
            }
            Type::Vector => write!(f, "vector"),
            Type::Unknown => write!(f, "unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_function_signature() {
        assert_eq!(Type::int_to_int().to_string(), "(int) -> int");
        let binary = Type::Function {
            params: vec![Type::Int, Type::Int],
            returns: Box::new(Type::Bool),
        };
        assert_eq!(binary.to_string(), "(int, int) -> bool");
    }

    #[test]
    fn yields_int_accepts_int_results_only() {
        assert!(Type::Int.yields_int());
        assert!(Type::int_to_int().yields_int());
        assert!(!Type::Vector.yields_int());
        assert!(!Type::Function {
            params: vec![],
            returns: Box::new(Type::String),
        }
        .yields_int());
    }
}
