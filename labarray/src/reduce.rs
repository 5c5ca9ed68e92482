use std::fmt;

use ndarray::{ArrayD, ArrayView1, Axis, IxDyn};

use crate::{
    data::{map_data, Data, NAT},
    dtype::{DType, Element},
    errors::{Error, Result},
    ops::BinaryOp,
};

/// Aggregation of data along a set of axes
pub trait Reducer {
    fn name(&self) -> &str;

    /// Reduce `data` over `axes`, removing them from the result
    fn reduce(&self, data: &Data, axes: &[usize]) -> Result<Data>;
}

/// The built in reductions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReduceOp {
    Sum,
    Mean,
    Min,
    Max,
    Prod,

    /// Population standard deviation
    Std,

    /// Population variance
    Var,
}

impl Reducer for ReduceOp {
    fn name(&self) -> &str {
        match self {
            Self::Sum => "sum",
            Self::Mean => "mean",
            Self::Min => "min",
            Self::Max => "max",
            Self::Prod => "prod",
            Self::Std => "std",
            Self::Var => "var",
        }
    }

    fn reduce(&self, data: &Data, axes: &[usize]) -> Result<Data> {
        let op = *self;
        match (op, data) {
            (Self::Min | Self::Max, Data::Time(array)) => {
                Ok(Data::Time(extremes(array, axes, op, |x| x == NAT)?))
            }
            (_, Data::Time(_)) => Err(Error::UnsupportedDType {
                operation: self.name().to_string(),
                dtype: DType::Time,
            }),
            (Self::Sum, _) => Ok(map_data!(data, array =>
                reduce_lanes(array, axes, |lane| fold(lane, BinaryOp::Add))?)),
            (Self::Prod, _) => Ok(map_data!(data, array =>
                reduce_lanes(array, axes, |lane| fold(lane, BinaryOp::Mul))?)),
            (Self::Min | Self::Max, _) => Ok(map_data!(data, array =>
                extremes(array, axes, op, Element::is_missing)?)),
            (Self::Mean | Self::Var | Self::Std, _) => {
                let moments =
                    FnReducer::new(self.name(), move |lane: ArrayView1<f64>| moment(lane, op));
                let reduced = moments.reduce(data, axes)?;
                if data.dtype() == DType::F32 {
                    reduced.astype(DType::F32)
                } else {
                    Ok(reduced)
                }
            }
        }
    }
}

impl fmt::Display for ReduceOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A named reduction over floating point lanes. Data is converted to `F64` first.
pub struct FnReducer<F>
where
    F: Fn(ArrayView1<f64>) -> f64,
{
    name: String,
    func: F,
}

impl<F> FnReducer<F>
where
    F: Fn(ArrayView1<f64>) -> f64,
{
    pub fn new<S: Into<String>>(name: S, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Reducer for FnReducer<F>
where
    F: Fn(ArrayView1<f64>) -> f64,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn reduce(&self, data: &Data, axes: &[usize]) -> Result<Data> {
        if data.dtype() == DType::Time {
            return Err(Error::UnsupportedDType {
                operation: self.name.clone(),
                dtype: DType::Time,
            });
        }

        let data = data.astype(DType::F64)?;
        let array = data.as_f64().ok_or(Error::Cast {
            from: data.dtype(),
            to: DType::F64,
        })?;

        Ok(Data::F64(reduce_lanes(array, axes, |lane| (self.func)(lane))?))
    }
}

/// Apply `f` to every lane running over `axes`. The reduced axes are moved last and
/// flattened into a single lane, so `f` sees every element being reduced at once.
pub(crate) fn reduce_lanes<T, U, F>(array: &ArrayD<T>, axes: &[usize], f: F) -> Result<ArrayD<U>>
where
    T: Copy,
    F: Fn(ArrayView1<T>) -> U,
{
    let ndim = array.ndim();
    let mut reduced = vec![false; ndim];
    for &axis in axes {
        match reduced.get_mut(axis) {
            Some(flag) if !*flag => *flag = true,
            _ => {
                return Err(Error::usage(format!(
                    "invalid reduction axes {axes:?} for data with {ndim} dimensions"
                )))
            }
        }
    }

    let kept: Vec<usize> = (0..ndim).filter(|&axis| !reduced[axis]).collect();
    let permutation: Vec<usize> = kept.iter().chain(axes).copied().collect();
    let mut shape: Vec<usize> = kept.iter().map(|&axis| array.shape()[axis]).collect();
    shape.push(axes.iter().map(|&axis| array.shape()[axis]).product());

    let lanes = array
        .view()
        .permuted_axes(permutation)
        .as_standard_layout()
        .into_owned()
        .into_shape(IxDyn(&shape))?;

    Ok(lanes.map_axis(Axis(kept.len()), f))
}

fn fold<T: Element>(lane: ArrayView1<T>, op: BinaryOp) -> T {
    let init = match op {
        BinaryOp::Mul => T::one(),
        _ => T::zero(),
    };

    lane.iter().fold(init, |acc, &x| acc.apply_binary(op, x))
}

fn extremes<T, M>(
    array: &ArrayD<T>,
    axes: &[usize],
    op: ReduceOp,
    is_missing: M,
) -> Result<ArrayD<T>>
where
    T: Copy + PartialOrd,
    M: Fn(T) -> bool,
{
    let picked = reduce_lanes(array, axes, |lane| {
        let mut values = lane.iter().copied();
        let first = values.next()?;
        Some(values.fold(first, |acc, x| {
            if is_missing(acc) {
                acc
            } else if is_missing(x) {
                x
            } else if (op == ReduceOp::Min && x < acc) || (op == ReduceOp::Max && x > acc) {
                x
            } else {
                acc
            }
        }))
    })?;

    let values = picked
        .iter()
        .copied()
        .collect::<Option<Vec<T>>>()
        .ok_or_else(|| Error::usage(format!("zero-size array to reduction operation {op}")))?;

    Ok(ArrayD::from_shape_vec(picked.raw_dim(), values)?)
}

fn moment(lane: ArrayView1<f64>, op: ReduceOp) -> f64 {
    let count = lane.len() as f64;
    let mean = lane.sum() / count;
    if op == ReduceOp::Mean {
        return mean;
    }

    let variance = lane.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / count;
    if op == ReduceOp::Std {
        variance.sqrt()
    } else {
        variance
    }
}
