//! Symbolic differentiation engine
//!
//! This crate evaluates, type-checks and symbolically differentiates
//! integer arithmetic expressions built from a small closed grammar.
//!
//! # Architecture
//!
//! - [`Expr`] is a closed sum type; every variant implements the same
//!   contract (evaluate / type-check / infer-type / reduce-to-normal-form).
//! - [`derive`] maps an expression and a variable name to the raw derivative.
//! - [`Simplifier`] rewrites any expression of the fragment into a reduced
//!   form (constant folding, identity elimination, like-term combination).
//! - [`Derivative`] and [`Gradient`] are expression nodes that chain the two
//!   engines and then evaluate the result.
//!
//! Environments ([`CompileEnvironment`], [`ExecutionEnvironment`]) are owned
//! by the caller; the core only borrows them for the duration of one call.

mod calculus;
mod derive;
mod env;
mod expr;
mod options;
mod reduce;
mod simplify;
mod types;
mod value;

pub use calculus::{Derivative, Gradient};
pub use derive::{derive, derive_and_simplify, derive_nth};
pub use env::{CompileEnvironment, ExecutionEnvironment, ScopeStack};
pub use expr::Expr;
pub use options::{LikeTerms, OverflowPolicy, SimplifyOptions};
pub use simplify::{simplify, SimplifyReport, Simplifier};
pub use types::Type;
pub use value::{FunctionValue, Value};

/// Error type for expression operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SymdiffError {
    #[error("undeclared variable: {0}")]
    UndeclaredVariable(String),

    #[error("variable already declared in this scope: {0}")]
    AlreadyDeclaredVariable(String),

    #[error("derivative not defined for {kind} expressions")]
    UnsupportedDerivative { kind: &'static str },

    #[error("operator `{op}` expects integer operands, found {found}")]
    NonIntegerOperand { op: &'static str, found: Type },

    #[error("integer overflow evaluating {0}")]
    ArithmeticOverflow(String),
}

impl SymdiffError {
    /// Environment errors are the only ones best-effort reduction absorbs.
    pub fn is_environment(&self) -> bool {
        matches!(
            self,
            SymdiffError::UndeclaredVariable(_) | SymdiffError::AlreadyDeclaredVariable(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SymdiffError>;
