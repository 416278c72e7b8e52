//! Simplification engine
//!
//! A single bottom-up pass: children are rewritten first, then the rule set
//! for the parent node kind fires in priority order.
//!
//! - Addition: identity, constant folding, like-term combination
//! - Subtraction: identities (`e - 0`, `0 - e`), constant folding
//! - Negation: `-0 = 0`, double negation
//! - Multiplication: zero and one identities, constant folding,
//!   coefficient re-association (`2 * (3 * x) = 6 * x`)
//!
//! Like terms are combined pairwise by default, so sums of three or more
//! terms are not guaranteed to reach a minimal form; `LikeTerms::Extended`
//! collects a whole additive chain instead.

use crate::expr::Expr;
use crate::options::{FoldOp, LikeTerms, SimplifyOptions};

/// Size bookkeeping for one simplification call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimplifyReport {
    pub initial_size: usize,
    pub final_size: usize,
    pub changed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Simplifier {
    options: SimplifyOptions,
}

/// Simplify with default options.
pub fn simplify(expr: &Expr) -> Expr {
    Simplifier::default().simplify(expr)
}

impl Simplifier {
    pub fn new(options: SimplifyOptions) -> Self {
        Simplifier { options }
    }

    pub fn options(&self) -> SimplifyOptions {
        self.options
    }

    pub fn simplify(&self, expr: &Expr) -> Expr {
        self.simplify_with_report(expr).0
    }

    pub fn simplify_with_report(&self, expr: &Expr) -> (Expr, SimplifyReport) {
        let result = self.rewrite(expr);
        let report = SimplifyReport {
            initial_size: expr.node_count(),
            final_size: result.node_count(),
            changed: &result != expr,
        };
        log::trace!(
            "simplify: {} -> {} ({} -> {} nodes)",
            expr,
            result,
            report.initial_size,
            report.final_size
        );
        (result, report)
    }

    fn rewrite(&self, expr: &Expr) -> Expr {
        match expr {
            Expr::Add(l, r) => self.add(self.rewrite(l), self.rewrite(r)),
            Expr::Sub(l, r) => self.sub(self.rewrite(l), self.rewrite(r)),
            Expr::Negate(e) => self.negate(self.rewrite(e)),
            Expr::Multiply(l, r) => self.mul(self.rewrite(l), self.rewrite(r)),
            Expr::Function { params, body } => Expr::Function {
                params: params.clone(),
                body: Box::new(self.rewrite(body)),
            },
            Expr::Constant(_)
            | Expr::Bool(_)
            | Expr::Str(_)
            | Expr::Variable(_)
            | Expr::Vector(_)
            | Expr::Derivative(_)
            | Expr::Gradient(_) => expr.clone(),
        }
    }

    fn fold(&self, op: FoldOp, a: i32, b: i32) -> Option<i32> {
        self.options.overflow.fold(op, a, b)
    }

    fn add(&self, l: Expr, r: Expr) -> Expr {
        // 0 + e = e, e + 0 = e
        if l.is_zero() {
            return r;
        }
        if r.is_zero() {
            return l;
        }

        if let (Some(a), Some(b)) = (l.as_constant(), r.as_constant()) {
            return match self.fold(FoldOp::Add, a, b) {
                Some(c) => Expr::Constant(c),
                None => Expr::add(l, r),
            };
        }

        match self.options.like_terms {
            LikeTerms::Pairwise => self.combine_pair(l, r),
            LikeTerms::Extended => self.collect_sum(l, r),
        }
    }

    /// c1*x + c2*x = (c1 + c2)*x, with a bare `x` counting as 1*x.
    fn combine_pair(&self, l: Expr, r: Expr) -> Expr {
        if let (Some((c1, x1)), Some((c2, x2))) = (linear_term(&l), linear_term(&r)) {
            if x1 == x2 {
                if let Some(c) = self.fold(FoldOp::Add, c1, c2) {
                    return scaled_var(c, x1);
                }
            }
        }
        Expr::add(l, r)
    }

    /// Flatten an addition chain and collect every linear term and constant.
    /// Terms keep the order of their first appearance; the constant goes last.
    fn collect_sum(&self, l: Expr, r: Expr) -> Expr {
        let mut terms = Vec::new();
        flatten_sum(&l, &mut terms);
        flatten_sum(&r, &mut terms);

        enum Slot<'a> {
            Other(&'a Expr),
            Linear(usize),
        }

        let mut slots: Vec<Slot> = Vec::new();
        let mut groups: Vec<(&str, i32)> = Vec::new();
        let mut constant = 0i32;

        for &term in &terms {
            if let Some(c) = term.as_constant() {
                match self.fold(FoldOp::Add, constant, c) {
                    Some(sum) => constant = sum,
                    None => return Expr::add(l.clone(), r.clone()),
                }
            } else if let Some((c, x)) = linear_term(term) {
                match groups.iter().position(|(name, _)| *name == x) {
                    Some(idx) => match self.fold(FoldOp::Add, groups[idx].1, c) {
                        Some(sum) => groups[idx].1 = sum,
                        None => return Expr::add(l.clone(), r.clone()),
                    },
                    None => {
                        groups.push((x, c));
                        slots.push(Slot::Linear(groups.len() - 1));
                    }
                }
            } else {
                slots.push(Slot::Other(term));
            }
        }

        let mut rebuilt: Vec<Expr> = slots
            .into_iter()
            .filter_map(|slot| match slot {
                Slot::Other(e) => Some(e.clone()),
                Slot::Linear(idx) => {
                    let (x, c) = groups[idx];
                    (c != 0).then(|| scaled_var(c, x))
                }
            })
            .collect();
        if constant != 0 {
            rebuilt.push(Expr::Constant(constant));
        }

        let mut iter = rebuilt.into_iter();
        match iter.next() {
            Some(first) => iter.fold(first, Expr::add),
            None => Expr::Constant(0),
        }
    }

    fn sub(&self, l: Expr, r: Expr) -> Expr {
        // e - 0 = e
        if r.is_zero() {
            return l;
        }
        // 0 - e = -e
        if l.is_zero() {
            return self.negate(r);
        }

        if let (Some(a), Some(b)) = (l.as_constant(), r.as_constant()) {
            if let Some(c) = self.fold(FoldOp::Sub, a, b) {
                return Expr::Constant(c);
            }
        }

        Expr::sub(l, r)
    }

    fn negate(&self, e: Expr) -> Expr {
        match e {
            // -0 = 0; any other negated constant is kept as written
            Expr::Constant(0) => Expr::Constant(0),
            // -(-e) = e, re-simplified
            Expr::Negate(inner) => self.rewrite(&inner),
            other => Expr::neg(other),
        }
    }

    fn mul(&self, l: Expr, r: Expr) -> Expr {
        // 0 * e = 0, e * 0 = 0
        if l.is_zero() || r.is_zero() {
            return Expr::Constant(0);
        }
        // 1 * e = e, e * 1 = e
        if l.is_one() {
            return r;
        }
        if r.is_one() {
            return l;
        }

        if let (Some(a), Some(b)) = (l.as_constant(), r.as_constant()) {
            return match self.fold(FoldOp::Mul, a, b) {
                Some(c) => Expr::Constant(c),
                None => Expr::mul(l, r),
            };
        }

        // c1 * (c2 * e) = (c1 * c2) * e, in any operand order
        let reassociated = match (l.as_constant(), r.as_constant()) {
            (Some(a), None) => coefficient_split(&r).map(|(b, e)| (a, b, e)),
            (None, Some(a)) => coefficient_split(&l).map(|(b, e)| (a, b, e)),
            _ => None,
        };
        if let Some((a, b, e)) = reassociated {
            if let Some(c) = self.fold(FoldOp::Mul, a, b) {
                return scaled(c, e.clone());
            }
        }

        Expr::mul(l, r)
    }
}

/// `x` -> (1, x); `c * x` and `x * c` -> (c, x).
fn linear_term(e: &Expr) -> Option<(i32, &str)> {
    match e {
        Expr::Variable(x) => Some((1, x.as_str())),
        Expr::Multiply(l, r) => match (l.as_ref(), r.as_ref()) {
            (Expr::Constant(c), Expr::Variable(x)) | (Expr::Variable(x), Expr::Constant(c)) => {
                Some((*c, x.as_str()))
            }
            _ => None,
        },
        _ => None,
    }
}

/// Split `c * e` or `e * c` where `e` is neither a constant nor another
/// coefficient product.
fn coefficient_split(e: &Expr) -> Option<(i32, &Expr)> {
    let Expr::Multiply(l, r) = e else {
        return None;
    };
    let (c, rest) = match (l.as_constant(), r.as_constant()) {
        (Some(c), None) => (c, r.as_ref()),
        (None, Some(c)) => (c, l.as_ref()),
        _ => return None,
    };
    let nested = matches!(rest, Expr::Multiply(a, b) if a.as_constant().is_some() || b.as_constant().is_some());
    (!nested).then_some((c, rest))
}

fn scaled(c: i32, e: Expr) -> Expr {
    match c {
        0 => Expr::Constant(0),
        1 => e,
        _ => Expr::mul(Expr::Constant(c), e),
    }
}

fn scaled_var(c: i32, x: &str) -> Expr {
    scaled(c, Expr::var(x))
}

fn flatten_sum<'a>(e: &'a Expr, out: &mut Vec<&'a Expr>) {
    match e {
        Expr::Add(l, r) => {
            flatten_sum(l, out);
            flatten_sum(r, out);
        }
        other => out.push(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::OverflowPolicy;

    fn x() -> Expr {
        Expr::var("x")
    }

    fn c(v: i32) -> Expr {
        Expr::constant(v)
    }

    #[test]
    fn additive_identity() {
        assert_eq!(simplify(&Expr::add(c(0), x())), x());
        assert_eq!(simplify(&Expr::add(x(), c(0))), x());
    }

    #[test]
    fn constant_folding() {
        assert_eq!(simplify(&Expr::add(c(2), c(3))), c(5));
        assert_eq!(simplify(&Expr::sub(c(2), c(3))), c(-1));
        assert_eq!(simplify(&Expr::mul(c(4), c(3))), c(12));
    }

    #[test]
    fn like_terms_either_operand_order() {
        let e = Expr::add(Expr::mul(c(2), x()), Expr::mul(x(), c(3)));
        assert_eq!(simplify(&e), Expr::mul(c(5), x()));
    }

    #[test]
    fn like_terms_collapse_to_zero_or_variable() {
        let zero = Expr::add(Expr::mul(c(2), x()), Expr::mul(c(-2), x()));
        assert_eq!(simplify(&zero), c(0));
        let one = Expr::add(Expr::mul(c(3), x()), Expr::mul(c(-2), x()));
        assert_eq!(simplify(&one), x());
    }

    #[test]
    fn different_variables_do_not_combine() {
        let e = Expr::add(Expr::mul(c(2), x()), Expr::mul(c(3), Expr::var("y")));
        assert_eq!(simplify(&e), e);
    }

    #[test]
    fn variable_plus_itself() {
        assert_eq!(simplify(&Expr::add(x(), x())), Expr::mul(c(2), x()));
    }

    #[test]
    fn subtraction_identities() {
        assert_eq!(simplify(&Expr::sub(x(), c(0))), x());
        assert_eq!(simplify(&Expr::sub(c(0), x())), Expr::neg(x()));
        let negated = simplify(&Expr::sub(c(0), c(5)));
        assert_eq!(negated, Expr::neg(c(5)));
        assert_eq!(simplify(&negated), negated);
    }

    #[test]
    fn negation_identities() {
        assert_eq!(simplify(&Expr::neg(c(0))), c(0));
        assert_eq!(simplify(&Expr::neg(c(5))), Expr::neg(c(5)));
        assert_eq!(simplify(&Expr::neg(Expr::neg(c(5)))), c(5));
        assert_eq!(simplify(&Expr::neg(Expr::neg(x()))), x());
        let inner = Expr::neg(Expr::neg(Expr::add(c(0), x())));
        assert_eq!(simplify(&inner), x());
    }

    #[test]
    fn multiplicative_identities() {
        assert_eq!(simplify(&Expr::mul(c(0), x())), c(0));
        assert_eq!(simplify(&Expr::mul(x(), c(0))), c(0));
        assert_eq!(simplify(&Expr::mul(c(1), x())), x());
        assert_eq!(simplify(&Expr::mul(x(), c(1))), x());
    }

    #[test]
    fn coefficients_reassociate() {
        let e = Expr::mul(c(2), Expr::mul(c(2), x()));
        assert_eq!(simplify(&e), Expr::mul(c(4), x()));
        let commuted = Expr::mul(Expr::mul(x(), c(3)), c(5));
        assert_eq!(simplify(&commuted), Expr::mul(c(15), x()));
    }

    #[test]
    fn pairwise_leaves_three_term_sums() {
        // (2x + y) + 3x: the two x terms are not direct siblings
        let e = Expr::add(
            Expr::add(Expr::mul(c(2), x()), Expr::var("y")),
            Expr::mul(c(3), x()),
        );
        assert_eq!(simplify(&e), e);
    }

    #[test]
    fn extended_collects_whole_chain() {
        let s = Simplifier::new(SimplifyOptions {
            like_terms: LikeTerms::Extended,
            ..Default::default()
        });
        let e = Expr::add(
            Expr::add(
                Expr::add(Expr::mul(c(2), x()), Expr::var("y")),
                Expr::constant(4),
            ),
            Expr::add(Expr::mul(x(), c(3)), Expr::constant(-1)),
        );
        let expected = Expr::add(
            Expr::add(Expr::mul(c(5), x()), Expr::var("y")),
            Expr::constant(3),
        );
        let once = s.simplify(&e);
        assert_eq!(once, expected);
        assert_eq!(s.simplify(&once), once);
    }

    #[test]
    fn checked_overflow_keeps_node() {
        let e = Expr::add(c(i32::MAX), c(1));
        assert_eq!(simplify(&e), e);

        let wrapping = Simplifier::new(SimplifyOptions {
            overflow: OverflowPolicy::Wrapping,
            ..Default::default()
        });
        assert_eq!(wrapping.simplify(&e), c(i32::MIN));
    }

    #[test]
    fn non_fragment_nodes_pass_through() {
        let b = Expr::Bool(true);
        assert_eq!(simplify(&b), b);
        let f = Expr::function(["x"], Expr::add(c(0), x()));
        assert_eq!(simplify(&f), Expr::function(["x"], x()));
    }

    #[test]
    fn report_tracks_sizes() {
        let e = Expr::add(Expr::mul(c(1), x()), Expr::mul(x(), c(1)));
        let (result, report) = Simplifier::default().simplify_with_report(&e);
        assert_eq!(result, Expr::mul(c(2), x()));
        assert_eq!(report.initial_size, 7);
        assert_eq!(report.final_size, 3);
        assert!(report.changed);
    }
}
