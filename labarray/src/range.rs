//! Evenly spaced coordinate labels, described by a start, a step and a length.

use std::fmt::Debug;

use ndarray::Array1;
use num_traits::{cast, Float, PrimInt};

use crate::{data::Data, errors::Result, variable::Variable};

/// Floating point labels `start + i * step` for `i` in `0..len`
#[derive(Clone, Debug, PartialEq)]
pub struct FloatRange<N: Float> {
    pub start: N,
    pub step: N,
    pub len: usize,
}

impl<N> FloatRange<N>
where
    N: Float + Debug,
    Data: From<Array1<N>>,
{
    pub fn new(start: N, step: N, len: usize) -> Self {
        Self { start, step, len }
    }

    pub fn get(&self, position: usize) -> Option<N> {
        if position >= self.len {
            return None;
        }

        Some(cast::<usize, N>(position)?.mul_add(self.step, self.start))
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Position of the label nearest to `label`, if it falls within the range
    pub fn position(&self, label: N) -> Option<usize> {
        let offset = ((label - self.start) / self.step).round();
        let position = cast::<N, usize>(offset)?;

        (position < self.len).then_some(position)
    }

    pub fn to_array(&self) -> Array1<N> {
        (0..self.len).filter_map(|position| self.get(position)).collect()
    }

    /// A coordinate variable for `dimension` holding these labels
    pub fn coordinate(&self, dimension: &str) -> Result<Variable> {
        Variable::new([dimension], self.to_array())
    }
}

/// Integer labels `start + i * step` for `i` in `0..len`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntRange<N: PrimInt> {
    pub start: N,
    pub step: N,
    pub len: usize,
}

impl<N> IntRange<N>
where
    N: PrimInt + Debug,
    Data: From<Array1<N>>,
{
    pub fn new(start: N, step: N, len: usize) -> Self {
        Self { start, step, len }
    }

    pub fn get(&self, position: usize) -> Option<N> {
        if position >= self.len {
            return None;
        }

        cast::<usize, N>(position)?
            .checked_mul(&self.step)?
            .checked_add(&self.start)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Position of `label`, if it is one of the labels
    pub fn position(&self, label: N) -> Option<usize> {
        if self.step.is_zero() {
            return (label == self.start && self.len > 0).then_some(0);
        }

        let offset = label.checked_sub(&self.start)?;
        if !(offset % self.step).is_zero() {
            return None;
        }
        let position = cast::<N, usize>(offset / self.step)?;

        (position < self.len).then_some(position)
    }

    pub fn to_array(&self) -> Array1<N> {
        (0..self.len).filter_map(|position| self.get(position)).collect()
    }

    pub fn coordinate(&self, dimension: &str) -> Result<Variable> {
        Variable::new([dimension], self.to_array())
    }
}

/// Time labels in seconds since the Unix epoch, `step` seconds apart
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimeRange {
    seconds: IntRange<i64>,
}

impl TimeRange {
    pub fn new(start: i64, step: i64, len: usize) -> Self {
        Self {
            seconds: IntRange::new(start, step, len),
        }
    }

    pub fn get(&self, position: usize) -> Option<i64> {
        self.seconds.get(position)
    }

    pub fn len(&self) -> usize {
        self.seconds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seconds.is_empty()
    }

    pub fn position(&self, seconds: i64) -> Option<usize> {
        self.seconds.position(seconds)
    }

    pub fn to_array(&self) -> Array1<i64> {
        self.seconds.to_array()
    }

    pub fn coordinate(&self, dimension: &str) -> Result<Variable> {
        Variable::new([dimension], Data::time(self.to_array().into_dyn()))
    }
}
