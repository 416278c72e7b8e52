//! Best-effort reduction to normal form
//!
//! Constant sub-trees are folded, variables bound to scalar values are
//! substituted. The internal step returns a `ReductionError`; the public
//! entry point absorbs environment errors and hands back the original tree.

use crate::env::ExecutionEnvironment;
use crate::expr::Expr;
use crate::options::{FoldOp, OverflowPolicy};
use crate::{Result, SymdiffError};

#[derive(Debug)]
pub(crate) enum ReductionError {
    /// Lookup or declaration failure; absorbed by `reduce_to_normal_form`
    Environment(SymdiffError),
    /// Never absorbed (e.g. an unsupported derivative)
    Fatal(SymdiffError),
}

impl From<SymdiffError> for ReductionError {
    fn from(err: SymdiffError) -> Self {
        if err.is_environment() {
            ReductionError::Environment(err)
        } else {
            ReductionError::Fatal(err)
        }
    }
}

impl Expr {
    /// Partially evaluate the tree against `env`.
    ///
    /// Never fails because of the environment: if any lookup misses, the
    /// whole reduction is abandoned and a copy of `self` is returned. Only
    /// fatal errors (differentiating an unsupported node) escape.
    pub fn reduce_to_normal_form(&self, env: &ExecutionEnvironment) -> Result<Expr> {
        match self.try_reduce(env) {
            Ok(reduced) => Ok(reduced),
            Err(ReductionError::Environment(err)) => {
                log::debug!("reduction of `{self}` abandoned: {err}");
                Ok(self.clone())
            }
            Err(ReductionError::Fatal(err)) => Err(err),
        }
    }

    pub(crate) fn try_reduce(&self, env: &ExecutionEnvironment) -> std::result::Result<Expr, ReductionError> {
        match self {
            Expr::Constant(_)
            | Expr::Bool(_)
            | Expr::Str(_)
            | Expr::Vector(_)
            | Expr::Function { .. }
            | Expr::Gradient(_) => Ok(self.clone()),
            Expr::Variable(name) => {
                let value = env.lookup(name)?;
                if value.is_scalar() {
                    Ok(value.clone().into_expr())
                } else {
                    Ok(self.clone())
                }
            }
            Expr::Add(l, r) => reduce_binary(FoldOp::Add, l, r, env, Expr::add),
            Expr::Sub(l, r) => reduce_binary(FoldOp::Sub, l, r, env, Expr::sub),
            Expr::Multiply(l, r) => reduce_binary(FoldOp::Mul, l, r, env, Expr::mul),
            Expr::Negate(e) => {
                let reduced = e.try_reduce(env)?;
                let folded = reduced
                    .as_constant()
                    .and_then(|c| OverflowPolicy::Checked.negate(c));
                Ok(match folded {
                    Some(n) => Expr::Constant(n),
                    None => Expr::neg(reduced),
                })
            }
            Expr::Derivative(d) => Ok(d.reduce(env)?),
        }
    }
}

fn reduce_binary(
    op: FoldOp,
    l: &Expr,
    r: &Expr,
    env: &ExecutionEnvironment,
    rebuild: fn(Expr, Expr) -> Expr,
) -> std::result::Result<Expr, ReductionError> {
    let rl = l.try_reduce(env)?;
    let rr = r.try_reduce(env)?;
    if let (Some(a), Some(b)) = (rl.as_constant(), rr.as_constant()) {
        if let Some(c) = OverflowPolicy::Checked.fold(op, a, b) {
            return Ok(Expr::Constant(c));
        }
    }
    Ok(rebuild(rl, rr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn folds_constant_subtrees() {
        let env = ExecutionEnvironment::new();
        let e = Expr::mul(Expr::add(Expr::constant(2), Expr::constant(3)), Expr::constant(4));
        assert_eq!(e.reduce_to_normal_form(&env).unwrap(), Expr::constant(20));
    }

    #[test]
    fn substitutes_bound_variables() {
        let mut env = ExecutionEnvironment::new();
        env.declare("x", Value::Int(3)).unwrap();
        let e = Expr::add(Expr::mul(Expr::var("x"), Expr::var("x")), Expr::constant(1));
        assert_eq!(e.reduce_to_normal_form(&env).unwrap(), Expr::constant(10));
    }

    #[test]
    fn missing_variable_returns_original_tree() {
        let env = ExecutionEnvironment::new();
        let e = Expr::add(
            Expr::mul(Expr::constant(2), Expr::constant(3)),
            Expr::var("free"),
        );
        assert_eq!(e.reduce_to_normal_form(&env).unwrap(), e);
    }

    #[test]
    fn function_bound_names_stay_symbolic() {
        let mut env = ExecutionEnvironment::new();
        env.declare(
            "f",
            Value::Function(crate::FunctionValue::new(vec!["x".into()], Expr::var("x"))),
        )
        .unwrap();
        let e = Expr::add(Expr::var("f"), Expr::neg(Expr::constant(4)));
        assert_eq!(
            e.reduce_to_normal_form(&env).unwrap(),
            Expr::add(Expr::var("f"), Expr::constant(-4))
        );
    }

    #[test]
    fn overflowing_fold_is_left_unfolded() {
        let env = ExecutionEnvironment::new();
        let e = Expr::add(Expr::constant(i32::MAX), Expr::constant(1));
        assert_eq!(e.reduce_to_normal_form(&env).unwrap(), e);
    }

    #[test]
    fn environment_errors_are_classified() {
        let err: ReductionError = SymdiffError::UndeclaredVariable("x".into()).into();
        assert!(matches!(err, ReductionError::Environment(_)));
        let err: ReductionError = SymdiffError::UnsupportedDerivative { kind: "string" }.into();
        assert!(matches!(err, ReductionError::Fatal(_)));
    }

    #[test]
    fn gradient_nodes_are_left_alone() {
        let square_plus_three = Expr::add(
            Expr::mul(Expr::var("x"), Expr::var("x")),
            Expr::constant(3),
        );
        let g = Expr::gradient(square_plus_three, ["x"]);

        let empty = ExecutionEnvironment::new();
        assert_eq!(g.reduce_to_normal_form(&empty).unwrap(), g);

        let mut bound = ExecutionEnvironment::new();
        bound.declare("x", Value::Int(2)).unwrap();
        assert_eq!(g.reduce_to_normal_form(&bound).unwrap(), g);

        // nested under arithmetic, the surrounding operands still reduce
        let sum = Expr::add(g.clone(), Expr::var("x"));
        assert_eq!(
            sum.reduce_to_normal_form(&bound).unwrap(),
            Expr::add(g, Expr::constant(2))
        );
    }
}
