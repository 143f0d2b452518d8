//! Semirings over log-space scores.
//!
//! One chart filling routine serves every semiring: [`Viterbi`] keeps the best derivation of each
//! item while [`LogInside`] sums over all of them.
use std::fmt::Debug;

///Scores closer than this are treated as ties.
pub const TIE_TOLERANCE: f64 = 1e-13;

///A commutative semiring whose elements can be read back as log-space weights.
pub trait Semiring: Copy + Debug + PartialEq + Send + Sync + 'static {
    ///Identity of [`Semiring::combine`], the score of an underivable item.
    fn zero() -> Self;

    ///Identity of [`Semiring::extend`].
    fn one() -> Self;

    ///Merges two alternative derivations (⊕).
    fn combine(self, other: Self) -> Self;

    ///Joins the parts of one derivation (⊗).
    fn extend(self, other: Self) -> Self;

    fn from_log(score: f64) -> Self;

    fn log_value(self) -> f64;

    fn is_zero(self) -> bool {
        self.log_value() == f64::NEG_INFINITY
    }
}

///Max-plus over log-probabilities.
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd)]
pub struct Viterbi(pub f64);

impl Semiring for Viterbi {
    fn zero() -> Self {
        Viterbi(f64::NEG_INFINITY)
    }

    fn one() -> Self {
        Viterbi(0.0)
    }

    fn combine(self, other: Self) -> Self {
        Viterbi(self.0.max(other.0))
    }

    fn extend(self, other: Self) -> Self {
        Viterbi(self.0 + other.0)
    }

    fn from_log(score: f64) -> Self {
        Viterbi(score)
    }

    fn log_value(self) -> f64 {
        self.0
    }
}

///Log-sum-exp and plus: the probability semiring in log space.
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd)]
pub struct LogInside(pub f64);

impl Semiring for LogInside {
    fn zero() -> Self {
        LogInside(f64::NEG_INFINITY)
    }

    fn one() -> Self {
        LogInside(0.0)
    }

    fn combine(self, other: Self) -> Self {
        LogInside(log_add(self.0, other.0))
    }

    fn extend(self, other: Self) -> Self {
        LogInside(self.0 + other.0)
    }

    fn from_log(score: f64) -> Self {
        LogInside(score)
    }

    fn log_value(self) -> f64 {
        self.0
    }
}

///`ln(exp(a) + exp(b))`, exact when either side is `-inf`.
pub fn log_add(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
    hi + (lo - hi).exp().ln_1p()
}
