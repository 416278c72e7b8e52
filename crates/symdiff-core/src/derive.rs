//! Differentiation engine
//!
//! Structural recursion over the arithmetic fragment. The derivation
//! variable is threaded through every call; the engine never looks at an
//! environment and never simplifies.

use crate::expr::Expr;
use crate::simplify::Simplifier;
use crate::{Result, SymdiffError};

/// Raw derivative of `expr` with respect to `var`.
pub fn derive(expr: &Expr, var: &str) -> Result<Expr> {
    match expr {
        Expr::Constant(_) => Ok(Expr::Constant(0)),
        Expr::Variable(name) => Ok(Expr::Constant(if name == var { 1 } else { 0 })),
        Expr::Add(l, r) => Ok(Expr::add(derive(l, var)?, derive(r, var)?)),
        Expr::Sub(l, r) => Ok(Expr::sub(derive(l, var)?, derive(r, var)?)),
        Expr::Negate(e) => Ok(Expr::neg(derive(e, var)?)),
        // (u * v)' = u' * v + u * v'
        Expr::Multiply(u, v) => {
            let du = derive(u, var)?;
            let dv = derive(v, var)?;
            Ok(Expr::add(
                Expr::mul(du, v.as_ref().clone()),
                Expr::mul(u.as_ref().clone(), dv),
            ))
        }
        Expr::Bool(_)
        | Expr::Str(_)
        | Expr::Function { .. }
        | Expr::Vector(_)
        | Expr::Derivative(_)
        | Expr::Gradient(_) => Err(SymdiffError::UnsupportedDerivative {
            kind: expr.kind_name(),
        }),
    }
}

/// Derivative followed by one simplification pass with default options.
pub fn derive_and_simplify(expr: &Expr, var: &str) -> Result<Expr> {
    Simplifier::default().derive_and_simplify(expr, var)
}

/// `order`-th derivative with default options. Order 0 returns the
/// expression unchanged.
pub fn derive_nth(expr: &Expr, var: &str, order: u32) -> Result<Expr> {
    Simplifier::default().derive_nth(expr, var, order)
}

impl Simplifier {
    /// Derivative followed by one simplification pass with these options.
    pub fn derive_and_simplify(&self, expr: &Expr, var: &str) -> Result<Expr> {
        derive(expr, var).map(|d| self.simplify(&d))
    }

    /// `order`-th derivative, simplifying between orders.
    pub fn derive_nth(&self, expr: &Expr, var: &str, order: u32) -> Result<Expr> {
        let mut result = expr.clone();
        for _ in 0..order {
            result = self.derive_and_simplify(&result, var)?;
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x() -> Expr {
        Expr::var("x")
    }

    #[test]
    fn constant_and_variable_rules() {
        assert_eq!(derive(&Expr::constant(42), "x").unwrap(), Expr::constant(0));
        assert_eq!(derive(&x(), "x").unwrap(), Expr::constant(1));
        assert_eq!(derive(&Expr::var("y"), "x").unwrap(), Expr::constant(0));
    }

    #[test]
    fn linear_rules_keep_shape() {
        let e = Expr::sub(Expr::neg(x()), Expr::var("y"));
        let d = derive(&e, "x").unwrap();
        assert_eq!(
            d,
            Expr::sub(Expr::neg(Expr::constant(1)), Expr::constant(0))
        );
    }

    #[test]
    fn product_rule_is_unsimplified() {
        let d = derive(&Expr::mul(x(), x()), "x").unwrap();
        assert_eq!(
            d,
            Expr::add(
                Expr::mul(Expr::constant(1), x()),
                Expr::mul(x(), Expr::constant(1))
            )
        );
    }

    #[test]
    fn unsupported_nodes_fail() {
        let err = derive(&Expr::add(x(), Expr::Bool(true)), "x").unwrap_err();
        assert_eq!(err, SymdiffError::UnsupportedDerivative { kind: "boolean" });

        let err = derive(&Expr::function(["x"], x()), "x").unwrap_err();
        assert_eq!(
            err,
            SymdiffError::UnsupportedDerivative {
                kind: "function value"
            }
        );
    }

    #[test]
    fn second_derivative_of_cube() {
        let cube = Expr::mul(Expr::mul(x(), x()), x());
        let d2 = derive_nth(&cube, "x", 2).unwrap();
        assert_eq!(d2, Expr::mul(Expr::constant(6), x()));
        let mut env = crate::ExecutionEnvironment::new();
        env.declare("x", crate::Value::Int(2)).unwrap();
        assert_eq!(d2.evaluate(&env).unwrap(), crate::Value::Int(12));
        assert_eq!(derive_nth(&cube, "x", 0).unwrap(), cube);
    }

    #[test]
    fn nth_derivative_honours_options() {
        use crate::options::{OverflowPolicy, SimplifyOptions};

        // (MAX + 1) * (x * x): the coefficient only folds once overflow is allowed
        let k = Expr::add(Expr::constant(i32::MAX), Expr::constant(1));
        let f = Expr::mul(k.clone(), Expr::mul(x(), x()));

        let saturating = Simplifier::new(SimplifyOptions {
            overflow: OverflowPolicy::Saturating,
            ..Default::default()
        });
        assert_eq!(
            saturating.derive_nth(&f, "x", 2).unwrap(),
            Expr::constant(i32::MAX)
        );
        assert_eq!(
            derive_nth(&f, "x", 2).unwrap(),
            Expr::mul(k, Expr::constant(2))
        );
    }
}
