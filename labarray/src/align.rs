//! Conforming several datasets or arrays onto common coordinate labels.

use std::{fmt, str::FromStr};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    coordinates::Coordinates,
    data_array::DataArray,
    dataset::Dataset,
    errors::{Error, Result},
    index::Index,
};

/// How the labels of several indexes are combined
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinMode {
    /// Sorted union of all labels
    Outer,

    /// Labels present in every index, in the order of the first
    Inner,

    /// Labels of the first index
    Left,

    /// Labels of the last index
    Right,
}

impl JoinMode {
    pub fn join(self, indexes: &[Index]) -> Result<Index> {
        let (first, rest) = indexes
            .split_first()
            .ok_or_else(|| Error::usage("must supply at least one index to join"))?;

        match self {
            Self::Outer => rest
                .iter()
                .try_fold(first.unique(), |joined, index| joined.union(index)),
            Self::Inner => rest
                .iter()
                .try_fold(first.clone(), |joined, index| joined.intersection(index)),
            Self::Left => Ok(first.clone()),
            Self::Right => Ok(rest.last().unwrap_or(first).clone()),
        }
    }
}

impl FromStr for JoinMode {
    type Err = Error;

    fn from_str(mode: &str) -> Result<Self> {
        match mode {
            "outer" => Ok(Self::Outer),
            "inner" => Ok(Self::Inner),
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            _ => Err(Error::usage(format!("unknown join mode {mode:?}"))),
        }
    }
}

impl fmt::Display for JoinMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Outer => "outer",
            Self::Inner => "inner",
            Self::Left => "left",
            Self::Right => "right",
        })
    }
}

/// Options for [`align`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignOptions {
    /// Unset means inner, with a warning
    pub join: Option<JoinMode>,

    /// Deep copy variables which don't need reindexing
    pub copy: bool,
}

impl Default for AlignOptions {
    fn default() -> Self {
        Self {
            join: None,
            copy: true,
        }
    }
}

impl AlignOptions {
    pub fn join(mut self, join: JoinMode) -> Self {
        self.join = Some(join);
        self
    }

    pub fn copy(mut self, copy: bool) -> Self {
        self.copy = copy;
        self
    }
}

/// Something with coordinates that can be conformed onto new coordinate labels
pub trait Labeled: Sized {
    fn coordinates(&self) -> Result<Coordinates>;

    fn reindex(&self, copy: bool, targets: &IndexMap<String, Index>) -> Result<Self>;
}

impl Labeled for Dataset {
    fn coordinates(&self) -> Result<Coordinates> {
        let dimensions: Vec<String> = self.dimensions().into_keys().collect();
        Ok(Dataset::coordinates(self, &dimensions))
    }

    fn reindex(&self, copy: bool, targets: &IndexMap<String, Index>) -> Result<Self> {
        Dataset::reindex(self, copy, targets)
    }
}

impl Labeled for DataArray {
    fn coordinates(&self) -> Result<Coordinates> {
        DataArray::coordinates(self)
    }

    fn reindex(&self, copy: bool, targets: &IndexMap<String, Index>) -> Result<Self> {
        DataArray::reindex(self, copy, targets)
    }
}

/// Either kind of labeled object, for aligning datasets and arrays together
#[derive(Clone, Debug)]
pub enum Alignable {
    Dataset(Dataset),
    Array(DataArray),
}

impl Alignable {
    pub fn as_dataset(&self) -> Option<&Dataset> {
        match self {
            Self::Dataset(dataset) => Some(dataset),
            Self::Array(_) => None,
        }
    }

    pub fn as_array(&self) -> Option<&DataArray> {
        match self {
            Self::Array(array) => Some(array),
            Self::Dataset(_) => None,
        }
    }

    pub fn into_dataset(self) -> Option<Dataset> {
        match self {
            Self::Dataset(dataset) => Some(dataset),
            Self::Array(_) => None,
        }
    }

    pub fn into_array(self) -> Option<DataArray> {
        match self {
            Self::Array(array) => Some(array),
            Self::Dataset(_) => None,
        }
    }
}

impl From<Dataset> for Alignable {
    fn from(dataset: Dataset) -> Self {
        Self::Dataset(dataset)
    }
}

impl From<DataArray> for Alignable {
    fn from(array: DataArray) -> Self {
        Self::Array(array)
    }
}

impl Labeled for Alignable {
    fn coordinates(&self) -> Result<Coordinates> {
        match self {
            Self::Dataset(dataset) => Labeled::coordinates(dataset),
            Self::Array(array) => Labeled::coordinates(array),
        }
    }

    fn reindex(&self, copy: bool, targets: &IndexMap<String, Index>) -> Result<Self> {
        Ok(match self {
            Self::Dataset(dataset) => Self::Dataset(dataset.reindex(copy, targets)?),
            Self::Array(array) => Self::Array(array.reindex(copy, targets)?),
        })
    }
}

/// Reindex every object onto joined coordinate labels, so that afterwards they all carry the
/// same labels on every dimension they share. Objects come back in the order given. To
/// align datasets together with arrays, wrap them in [`Alignable`].
pub fn align<T: Labeled>(objects: &[&T], options: &AlignOptions) -> Result<Vec<T>> {
    let join = options.join.unwrap_or_else(|| {
        warn!("no join mode given for align, defaulting to inner");
        JoinMode::Inner
    });

    let mut all_indexes: IndexMap<String, Vec<Index>> = IndexMap::new();
    for object in objects {
        for (dimension, index) in object.coordinates()?.indexes()? {
            all_indexes.entry(dimension).or_default().push(index);
        }
    }

    let mut joined = IndexMap::new();
    for (dimension, indexes) in all_indexes {
        let first = &indexes[0];
        if indexes[1..].iter().all(|index| index.equals(first)) {
            continue;
        }
        joined.insert(dimension, join.join(&indexes)?);
    }

    if !joined.is_empty() {
        debug!(
            join = %join,
            dimensions = ?joined.keys().collect::<Vec<_>>(),
            "aligning"
        );
    }

    objects
        .iter()
        .map(|object| object.reindex(options.copy, &joined))
        .collect()
}
