//! Options controlling constant folding and like-term combination

use serde::{Deserialize, Serialize};

/// What to do when folding two constants overflows `i32`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Leave the node unfolded
    #[default]
    Checked,
    /// Two's complement wrap-around
    Wrapping,
    /// Clamp to `i32::MIN` / `i32::MAX`
    Saturating,
}

/// How far like-term combination reaches inside a sum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LikeTerms {
    /// Only the two direct operands of one addition
    #[default]
    Pairwise,
    /// Every linear term of a flattened addition chain
    Extended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SimplifyOptions {
    #[serde(default)]
    pub overflow: OverflowPolicy,
    #[serde(default)]
    pub like_terms: LikeTerms,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FoldOp {
    Add,
    Sub,
    Mul,
}

impl OverflowPolicy {
    /// Fold two constants; `None` means the fold must not happen.
    pub(crate) fn fold(self, op: FoldOp, a: i32, b: i32) -> Option<i32> {
        match self {
            OverflowPolicy::Checked => match op {
                FoldOp::Add => a.checked_add(b),
                FoldOp::Sub => a.checked_sub(b),
                FoldOp::Mul => a.checked_mul(b),
            },
            OverflowPolicy::Wrapping => Some(match op {
                FoldOp::Add => a.wrapping_add(b),
                FoldOp::Sub => a.wrapping_sub(b),
                FoldOp::Mul => a.wrapping_mul(b),
            }),
            OverflowPolicy::Saturating => Some(match op {
                FoldOp::Add => a.saturating_add(b),
                FoldOp::Sub => a.saturating_sub(b),
                FoldOp::Mul => a.saturating_mul(b),
            }),
        }
    }

    pub(crate) fn negate(self, a: i32) -> Option<i32> {
        match self {
            OverflowPolicy::Checked => a.checked_neg(),
            OverflowPolicy::Wrapping => Some(a.wrapping_neg()),
            OverflowPolicy::Saturating => Some(a.saturating_neg()),
        }
    }
}
