//! Pure reduction contracts.
//!
//! A reducer never mutates an accumulator in place: `add` and `remove` take
//! the current value by reference and return the next one. `remove` must be
//! the exact inverse of `add` for the same record; the coordinator relies on
//! that when it applies deltas instead of rescanning.

use std::fmt;
use std::marker::PhantomData;
use thiserror::Error;

/// Value produced by a reduction.
pub trait Accumulator: Clone + fmt::Debug + 'static {
    /// Numeric projection used for default (descending) ordering.
    fn magnitude(&self) -> f64;

    /// Equality used when checking that `remove` undoes `add`.
    fn same_as(&self, other: &Self) -> bool;
}

impl Accumulator for u64 {
    fn magnitude(&self) -> f64 {
        *self as f64
    }

    fn same_as(&self, other: &Self) -> bool {
        self == other
    }
}

impl Accumulator for i64 {
    fn magnitude(&self) -> f64 {
        *self as f64
    }

    fn same_as(&self, other: &Self) -> bool {
        self == other
    }
}

impl Accumulator for f64 {
    fn magnitude(&self) -> f64 {
        *self
    }

    fn same_as(&self, other: &Self) -> bool {
        approx_eq(*self, *other)
    }
}

fn approx_eq(a: f64, b: f64) -> bool {
    let scale = a.abs().max(b.abs()).max(1.0);
    (a - b).abs() <= scale * 1e-9
}

/// Exact money amount, stored in millionths of a unit.
///
/// Sums of `Amount` are associative, so removing a record restores the
/// previous total bit for bit no matter what was added in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    const SCALE: f64 = 1_000_000.0;
    // Largest magnitude that still converts back into an i64.
    const LIMIT: f64 = 9.0e18;

    pub const fn from_micros(micros: i64) -> Self {
        Amount(micros)
    }

    pub const fn micros(self) -> i64 {
        self.0
    }

    /// Nearest representable amount, or `None` when `value` is not finite or
    /// does not fit.
    pub fn from_f64(value: f64) -> Option<Self> {
        let scaled = (value * Self::SCALE).round();
        if scaled.is_finite() && scaled.abs() < Self::LIMIT {
            Some(Amount(scaled as i64))
        } else {
            None
        }
    }

    pub fn to_f64(self) -> f64 {
        self.0 as f64 / Self::SCALE
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }
}

/// Whole units.
impl From<i32> for Amount {
    fn from(units: i32) -> Self {
        Amount(i64::from(units) * 1_000_000)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_f64())
    }
}

impl Accumulator for Amount {
    fn magnitude(&self) -> f64 {
        self.to_f64()
    }

    fn same_as(&self, other: &Self) -> bool {
        self == other
    }
}

/// Running count and total, e.g. tickets and revenue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CountSum {
    pub count: u64,
    pub total: Amount,
}

impl Accumulator for CountSum {
    fn magnitude(&self) -> f64 {
        self.total.to_f64()
    }

    fn same_as(&self, other: &Self) -> bool {
        self == other
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ReduceError {
    pub message: String,
}

impl ReduceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub type ReduceResult<A> = Result<A, ReduceError>;

pub trait Reducer<R>: 'static {
    type Acc: Accumulator;

    fn initial(&self) -> Self::Acc;
    fn add(&self, acc: &Self::Acc, record: &R) -> ReduceResult<Self::Acc>;
    fn remove(&self, acc: &Self::Acc, record: &R) -> ReduceResult<Self::Acc>;
}

/// Number of records.
#[derive(Debug, Clone, Copy, Default)]
pub struct Count;

impl<R> Reducer<R> for Count {
    type Acc = u64;

    fn initial(&self) -> u64 {
        0
    }

    fn add(&self, acc: &u64, _record: &R) -> ReduceResult<u64> {
        Ok(acc + 1)
    }

    fn remove(&self, acc: &u64, _record: &R) -> ReduceResult<u64> {
        acc.checked_sub(1)
            .ok_or_else(|| ReduceError::new("count underflow"))
    }
}

/// Exact sum of a numeric projection.
///
/// Values are rounded to the nearest millionth on the way in. Use [`reduce`]
/// with an `f64` accumulator when approximate sums are acceptable.
pub struct Sum<F> {
    value: F,
}

impl<F> Sum<F> {
    pub fn new(value: F) -> Self {
        Self { value }
    }
}

impl<R, F> Reducer<R> for Sum<F>
where
    F: Fn(&R) -> f64 + 'static,
{
    type Acc = Amount;

    fn initial(&self) -> Amount {
        Amount::ZERO
    }

    fn add(&self, acc: &Amount, record: &R) -> ReduceResult<Amount> {
        acc.checked_add(amount((self.value)(record))?)
            .ok_or_else(overflow)
    }

    fn remove(&self, acc: &Amount, record: &R) -> ReduceResult<Amount> {
        acc.checked_sub(amount((self.value)(record))?)
            .ok_or_else(overflow)
    }
}

/// Count together with the sum of a numeric projection.
pub struct CountAndSum<F> {
    value: F,
}

impl<F> CountAndSum<F> {
    pub fn new(value: F) -> Self {
        Self { value }
    }
}

impl<R, F> Reducer<R> for CountAndSum<F>
where
    F: Fn(&R) -> f64 + 'static,
{
    type Acc = CountSum;

    fn initial(&self) -> CountSum {
        CountSum::default()
    }

    fn add(&self, acc: &CountSum, record: &R) -> ReduceResult<CountSum> {
        Ok(CountSum {
            count: acc.count + 1,
            total: acc
                .total
                .checked_add(amount((self.value)(record))?)
                .ok_or_else(overflow)?,
        })
    }

    fn remove(&self, acc: &CountSum, record: &R) -> ReduceResult<CountSum> {
        let count = acc
            .count
            .checked_sub(1)
            .ok_or_else(|| ReduceError::new("count underflow"))?;
        Ok(CountSum {
            count,
            total: acc
                .total
                .checked_sub(amount((self.value)(record))?)
                .ok_or_else(overflow)?,
        })
    }
}

fn amount(v: f64) -> ReduceResult<Amount> {
    Amount::from_f64(v).ok_or_else(|| ReduceError::new(format!("value {v} is not a valid amount")))
}

fn overflow() -> ReduceError {
    ReduceError::new("amount overflow")
}

/// Reducer assembled from three closures.
pub struct FnReducer<R, A, I, Ad, Rm> {
    initial: I,
    add: Ad,
    remove: Rm,
    _marker: PhantomData<fn(&R) -> A>,
}

/// Build a reducer from `initial`, `add` and `remove` closures.
pub fn reduce<R, A, I, Ad, Rm>(initial: I, add: Ad, remove: Rm) -> FnReducer<R, A, I, Ad, Rm>
where
    A: Accumulator,
    I: Fn() -> A + 'static,
    Ad: Fn(&A, &R) -> ReduceResult<A> + 'static,
    Rm: Fn(&A, &R) -> ReduceResult<A> + 'static,
{
    FnReducer {
        initial,
        add,
        remove,
        _marker: PhantomData,
    }
}

impl<R, A, I, Ad, Rm> Reducer<R> for FnReducer<R, A, I, Ad, Rm>
where
    R: 'static,
    A: Accumulator,
    I: Fn() -> A + 'static,
    Ad: Fn(&A, &R) -> ReduceResult<A> + 'static,
    Rm: Fn(&A, &R) -> ReduceResult<A> + 'static,
{
    type Acc = A;

    fn initial(&self) -> A {
        (self.initial)()
    }

    fn add(&self, acc: &A, record: &R) -> ReduceResult<A> {
        (self.add)(acc, record)
    }

    fn remove(&self, acc: &A, record: &R) -> ReduceResult<A> {
        (self.remove)(acc, record)
    }
}
