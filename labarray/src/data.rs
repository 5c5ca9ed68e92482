use std::fmt;

use ndarray::{Array1, ArrayD, Axis, IxDyn, Zip};
use num_traits::{cast, NumCast};
use paste::paste;

use crate::{
    dtype::{DType, Element},
    errors::{Error, Result},
    index::Label,
    indexing::Selection,
    ops::{BinaryOp, UnaryOp},
};

/// Missing value marker for time data ("not a time")
pub const NAT: i64 = i64::MIN;

/// An n-dimensional array of one of the supported element types
#[derive(Clone, Debug, PartialEq)]
pub enum Data {
    I32(ArrayD<i32>),
    I64(ArrayD<i64>),
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),

    /// Seconds since the Unix epoch, [`NAT`] for missing values
    Time(ArrayD<i64>),
}

/// Apply an expression generic over the element type, rewrapping the result in the same
/// variant.
macro_rules! map_data {
    ($data:expr, $array:ident => $body:expr) => {
        match $data {
            Data::I32($array) => Data::I32($body),
            Data::I64($array) => Data::I64($body),
            Data::F32($array) => Data::F32($body),
            Data::F64($array) => Data::F64($body),
            Data::Time($array) => Data::Time($body),
        }
    };
}

/// Evaluate an expression generic over the element type.
macro_rules! with_data {
    ($data:expr, $array:ident => $body:expr) => {
        match $data {
            Data::I32($array) => $body,
            Data::I64($array) => $body,
            Data::F32($array) => $body,
            Data::F64($array) => $body,
            Data::Time($array) => $body,
        }
    };
}

pub(crate) use map_data;

macro_rules! accessor {
    ($variant:ident, $type:ty) => {
        paste! {
            pub fn [<as_ $variant:lower>](&self) -> Option<&ArrayD<$type>> {
                match self {
                    Self::$variant(array) => Some(array),
                    _ => None,
                }
            }
        }
    };
}

macro_rules! from_array {
    ($variant:ident, $type:ty) => {
        impl From<ArrayD<$type>> for Data {
            fn from(array: ArrayD<$type>) -> Self {
                Self::$variant(array)
            }
        }

        impl From<Array1<$type>> for Data {
            fn from(array: Array1<$type>) -> Self {
                Self::$variant(array.into_dyn())
            }
        }

        impl From<Vec<$type>> for Data {
            fn from(values: Vec<$type>) -> Self {
                Self::$variant(Array1::from(values).into_dyn())
            }
        }
    };
}

from_array!(I32, i32);
from_array!(I64, i64);
from_array!(F32, f32);
from_array!(F64, f64);

impl Data {
    accessor!(I32, i32);
    accessor!(I64, i64);
    accessor!(F32, f32);
    accessor!(F64, f64);
    accessor!(Time, i64);

    /// Time data from seconds since the Unix epoch
    pub fn time<A: Into<ArrayD<i64>>>(seconds: A) -> Self {
        Self::Time(seconds.into())
    }

    /// A zero-dimensional floating point value
    pub fn scalar(value: f64) -> Self {
        Self::F64(ArrayD::from_elem(IxDyn(&[]), value))
    }

    pub fn dtype(&self) -> DType {
        match self {
            Self::I32(_) => DType::I32,
            Self::I64(_) => DType::I64,
            Self::F32(_) => DType::F32,
            Self::F64(_) => DType::F64,
            Self::Time(_) => DType::Time,
        }
    }

    pub fn shape(&self) -> &[usize] {
        with_data!(self, array => array.shape())
    }

    pub fn ndim(&self) -> usize {
        with_data!(self, array => array.ndim())
    }

    pub fn size(&self) -> usize {
        with_data!(self, array => array.len())
    }

    /// Convert to another dtype. Fails if a value can't be represented, eg NaN as an integer.
    pub fn astype(&self, dtype: DType) -> Result<Data> {
        if self.dtype() == dtype {
            return Ok(self.clone());
        }

        let from = self.dtype();
        with_data!(self, array => Ok(match dtype {
            DType::I32 => Data::I32(cast_array(array, from, dtype)?),
            DType::I64 => Data::I64(cast_array(array, from, dtype)?),
            DType::F32 => Data::F32(cast_array(array, from, dtype)?),
            DType::F64 => Data::F64(cast_array(array, from, dtype)?),
            DType::Time => Data::Time(cast_array(array, from, dtype)?),
        }))
    }

    /// All values, in logical (row major) order, as labels
    pub fn labels(&self) -> Vec<Label> {
        match self {
            Self::I32(array) => array.iter().map(|&x| Label::Int(x.into())).collect(),
            Self::I64(array) => array.iter().map(|&x| Label::Int(x)).collect(),
            Self::F32(array) => array.iter().map(|&x| Label::Float(x.into())).collect(),
            Self::F64(array) => array.iter().map(|&x| Label::Float(x)).collect(),
            Self::Time(array) => array.iter().map(|&x| Label::Time(x)).collect(),
        }
    }

    /// One dimensional copy of the data in logical (row major) order
    pub fn flatten(&self) -> Data {
        map_data!(self, array => Array1::from_iter(array.iter().copied()).into_dyn())
    }

    /// Orthogonal indexing with one selection per axis. Scalar selections remove their axis.
    pub(crate) fn select(&self, selections: &[Selection]) -> Data {
        map_data!(self, array => select_array(array, selections))
    }

    /// Assign `value`, broadcast to the shape of the selected region, into the selected
    /// region.
    pub(crate) fn assign(&mut self, selections: &[Selection], value: &Data) -> Result<()> {
        let value = value.astype(self.dtype())?;
        match (self, &value) {
            (Self::I32(array), Self::I32(value)) => assign_array(array, selections, value),
            (Self::I64(array), Self::I64(value)) => assign_array(array, selections, value),
            (Self::F32(array), Self::F32(value)) => assign_array(array, selections, value),
            (Self::F64(array), Self::F64(value)) => assign_array(array, selections, value),
            (Self::Time(array), Self::Time(value)) => assign_array(array, selections, value),
            (this, value) => Err(Error::Cast {
                from: value.dtype(),
                to: this.dtype(),
            }),
        }
    }

    /// Gather positions along `axis`. `None` positions are filled with the missing value
    /// marker, promoting integer data to `F64` when any are present.
    pub(crate) fn take(&self, axis: usize, positions: &[Option<usize>]) -> Result<Data> {
        let promoted;
        let data = if positions.iter().any(Option::is_none) {
            promoted = self.astype(self.dtype().with_missing())?;
            &promoted
        } else {
            self
        };

        Ok(match data {
            Self::I32(array) => Self::I32(take_array(array, axis, positions, 0)),
            Self::I64(array) => Self::I64(take_array(array, axis, positions, 0)),
            Self::F32(array) => Self::F32(take_array(array, axis, positions, f32::NAN)),
            Self::F64(array) => Self::F64(take_array(array, axis, positions, f64::NAN)),
            Self::Time(array) => Self::Time(take_array(array, axis, positions, NAT)),
        })
    }

    /// Inverse of `flatten` for a sparse set of flat positions: builds an array of `shape`
    /// where element `i` of this one dimensional data lands at flat position `positions[i]`.
    /// Positions that receive no value hold the missing value marker.
    pub(crate) fn scatter(&self, shape: &[usize], positions: &[usize]) -> Result<Data> {
        let size: usize = shape.iter().product();
        let promoted;
        let data = if positions.len() < size {
            promoted = self.astype(self.dtype().with_missing())?;
            &promoted
        } else {
            self
        };

        Ok(match data {
            Self::I32(array) => Self::I32(scatter_array(array, shape, positions, 0)?),
            Self::I64(array) => Self::I64(scatter_array(array, shape, positions, 0)?),
            Self::F32(array) => Self::F32(scatter_array(array, shape, positions, f32::NAN)?),
            Self::F64(array) => Self::F64(scatter_array(array, shape, positions, f64::NAN)?),
            Self::Time(array) => Self::Time(scatter_array(array, shape, positions, NAT)?),
        })
    }

    /// Reorder axes. The result is realized in standard layout.
    pub(crate) fn transpose(&self, permutation: &[usize]) -> Data {
        map_data!(self, array => array
            .view()
            .permuted_axes(permutation.to_vec())
            .as_standard_layout()
            .into_owned())
    }

    pub(crate) fn insert_axis(&self, axis: usize) -> Data {
        map_data!(self, array => array.view().insert_axis(Axis(axis)).to_owned())
    }

    /// Permute axes, insert new length-1 axes at `new_axes` (ascending), then broadcast to
    /// `shape`. Returns `None` if the data can't be broadcast.
    pub(crate) fn expand(
        &self,
        permutation: &[usize],
        new_axes: &[usize],
        shape: &[usize],
    ) -> Option<Data> {
        Some(map_data!(self, array => {
            let mut view = array.view().permuted_axes(permutation.to_vec());
            for &axis in new_axes {
                view = view.insert_axis(Axis(axis));
            }
            view.broadcast(IxDyn(shape))?.to_owned()
        }))
    }

    /// Join pieces along an existing axis, promoting to a common dtype.
    pub(crate) fn concat(axis: usize, pieces: &[Data]) -> Result<Data> {
        let (first, rest) = pieces
            .split_first()
            .ok_or_else(|| Error::usage("cannot concatenate zero arrays"))?;
        let mut dtype = first.dtype();
        for piece in rest {
            dtype = dtype.promote(piece.dtype())?;
        }
        let pieces = pieces
            .iter()
            .map(|piece| piece.astype(dtype))
            .collect::<Result<Vec<_>>>()?;

        macro_rules! join {
            ($variant:ident) => {{
                let views = pieces
                    .iter()
                    .filter_map(|piece| match piece {
                        Data::$variant(array) => Some(array.view()),
                        _ => None,
                    })
                    .collect::<Vec<_>>();
                Data::$variant(ndarray::concatenate(Axis(axis), &views)?)
            }};
        }

        Ok(match dtype {
            DType::I32 => join!(I32),
            DType::I64 => join!(I64),
            DType::F32 => join!(F32),
            DType::F64 => join!(F64),
            DType::Time => join!(Time),
        })
    }

    pub(crate) fn unary(&self, op: UnaryOp) -> Result<Data> {
        if self.dtype() == DType::Time {
            return Err(Error::UnsupportedDType {
                operation: op.name().to_string(),
                dtype: DType::Time,
            });
        }

        Ok(map_data!(self, array => array.mapv(|x| x.apply_unary(op))))
    }

    /// Elementwise binary operation on data of identical shape.
    pub(crate) fn binary(&self, op: BinaryOp, other: &Data) -> Result<Data> {
        let dtype = op.result_dtype(self.dtype(), other.dtype())?;
        if self.shape() != other.shape() {
            return Err(Error::usage(format!(
                "cannot {} arrays with shapes {:?} and {:?}",
                op.name(),
                self.shape(),
                other.shape()
            )));
        }

        let left = self.astype(dtype)?;
        let right = other.astype(dtype)?;
        match (&left, &right) {
            (Self::I32(a), Self::I32(b)) => Ok(Self::I32(zip_arrays(a, b, op))),
            (Self::I64(a), Self::I64(b)) => Ok(Self::I64(zip_arrays(a, b, op))),
            (Self::F32(a), Self::F32(b)) => Ok(Self::F32(zip_arrays(a, b, op))),
            (Self::F64(a), Self::F64(b)) => Ok(Self::F64(zip_arrays(a, b, op))),
            _ => Err(Error::UnsupportedDType {
                operation: op.name().to_string(),
                dtype,
            }),
        }
    }

    /// Equality of dtype, shape and values, treating NaN as equal to NaN
    pub fn equals(&self, other: &Data) -> bool {
        if self.dtype() != other.dtype() || self.shape() != other.shape() {
            return false;
        }

        match (self, other) {
            (Self::F32(a), Self::F32(b)) => same_elements(a, b),
            (Self::F64(a), Self::F64(b)) => same_elements(a, b),
            _ => self == other,
        }
    }
}

impl fmt::Display for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        with_data!(self, array => write!(f, "{array}"))
    }
}

fn same_elements<T: Element>(a: &ArrayD<T>, b: &ArrayD<T>) -> bool {
    a.iter()
        .zip(b.iter())
        .all(|(x, y)| x == y || (x.is_missing() && y.is_missing()))
}

fn cast_array<S, T>(array: &ArrayD<S>, from: DType, to: DType) -> Result<ArrayD<T>>
where
    S: Copy + NumCast,
    T: NumCast,
{
    let values = array
        .iter()
        .map(|&x| cast::<S, T>(x).ok_or(Error::Cast { from, to }))
        .collect::<Result<Vec<T>>>()?;

    Ok(ArrayD::from_shape_vec(array.raw_dim(), values)?)
}

fn select_array<T: Copy>(array: &ArrayD<T>, selections: &[Selection]) -> ArrayD<T> {
    // Work from the last axis back so removing an axis doesn't shift the ones still to do
    let mut selected = array.clone();
    for (axis, selection) in selections.iter().enumerate().rev() {
        selected = match selection {
            Selection::Full => selected,
            Selection::Scalar(position) => selected.index_axis(Axis(axis), *position).to_owned(),
            Selection::Positions(positions) => selected.select(Axis(axis), positions),
        };
    }

    selected
}

fn assign_array<T: Copy>(
    array: &mut ArrayD<T>,
    selections: &[Selection],
    value: &ArrayD<T>,
) -> Result<()> {
    let target: Vec<usize> = selections
        .iter()
        .zip(array.shape())
        .filter_map(|(selection, &size)| match selection {
            Selection::Full => Some(size),
            Selection::Scalar(_) => None,
            Selection::Positions(positions) => Some(positions.len()),
        })
        .collect();
    let value = value.broadcast(IxDyn(&target)).ok_or_else(|| {
        Error::usage(format!(
            "cannot assign value with shape {:?} to selection with shape {:?}",
            value.shape(),
            target
        ))
    })?;

    let mut index = vec![0; array.ndim()];
    for (position, &element) in value.indexed_iter() {
        let mut k = 0;
        for (axis, selection) in selections.iter().enumerate() {
            index[axis] = match selection {
                Selection::Scalar(fixed) => *fixed,
                Selection::Full => {
                    k += 1;
                    position[k - 1]
                }
                Selection::Positions(positions) => {
                    k += 1;
                    positions[position[k - 1]]
                }
            };
        }
        array[index.as_slice()] = element;
    }

    Ok(())
}

fn take_array<T: Copy>(
    array: &ArrayD<T>,
    axis: usize,
    positions: &[Option<usize>],
    fill: T,
) -> ArrayD<T> {
    let mut shape = array.shape().to_vec();
    shape[axis] = positions.len();

    let mut taken = ArrayD::from_elem(IxDyn(&shape), fill);
    for (i, position) in positions.iter().enumerate() {
        if let Some(position) = position {
            taken
                .index_axis_mut(Axis(axis), i)
                .assign(&array.index_axis(Axis(axis), *position));
        }
    }

    taken
}

fn scatter_array<T: Copy>(
    values: &ArrayD<T>,
    shape: &[usize],
    positions: &[usize],
    fill: T,
) -> Result<ArrayD<T>> {
    let mut scattered = vec![fill; shape.iter().product()];
    for (&position, &value) in positions.iter().zip(values.iter()) {
        scattered[position] = value;
    }

    Ok(ArrayD::from_shape_vec(IxDyn(shape), scattered)?)
}

fn zip_arrays<T: Element>(a: &ArrayD<T>, b: &ArrayD<T>, op: BinaryOp) -> ArrayD<T> {
    Zip::from(a).and(b).map_collect(|&x, &y| x.apply_binary(op, y))
}
