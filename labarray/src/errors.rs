use std::result;

use thiserror::Error;

use crate::dtype::DType;

#[derive(Error, Debug)]
pub enum Error {
    /// Name is neither a stored nor a virtual variable of the dataset
    #[error("name {0:?} is not a variable in this dataset")]
    NameNotFound(String),

    /// Operands of a binary operation disagree on a shared coordinate
    #[error("coordinate {0:?} is not aligned")]
    CoordinateMismatch(String),

    #[error("{0}")]
    Usage(String),

    /// Squeeze requested on a dimension whose length is not 1
    #[error("cannot squeeze dimension {dimension:?} with length {length}")]
    Shape { dimension: String, length: usize },

    #[error("dimension {0:?} does not exist")]
    DimensionNotFound(String),

    #[error("conflicting sizes for dimension {dimension:?}: {expected} and {found}")]
    DimensionSize {
        dimension: String,
        expected: usize,
        found: usize,
    },

    #[error("label {label} not found along dimension {dimension:?}")]
    LabelNotFound { dimension: String, label: String },

    #[error("index {index} is out of bounds for dimension {dimension:?} with size {size}")]
    IndexOutOfBounds {
        dimension: String,
        index: isize,
        size: usize,
    },

    #[error("cannot cast {from} data to {to}")]
    Cast { from: DType, to: DType },

    #[error("{operation} is not supported for {dtype} data")]
    UnsupportedDType { operation: String, dtype: DType },

    /// Variables which must agree across datasets do not
    #[error("variable {0:?} conflicts across datasets")]
    Conflict(String),

    #[error(transparent)]
    Layout(#[from] ndarray::ShapeError),

    /// Failure building or reading a frame
    #[error(transparent)]
    Frame(#[from] polars::error::PolarsError),
}

impl Error {
    pub(crate) fn usage<S: Into<String>>(message: S) -> Self {
        Self::Usage(message.into())
    }
}

pub type Result<T> = result::Result<T, Error>;
