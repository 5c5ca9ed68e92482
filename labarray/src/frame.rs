//! Tabular views of datasets as polars frames.
//!
//! A frame has no row index of its own, so the index levels of a table are its leading
//! columns: one per dimension, holding that dimension's label for every row.

use std::collections::HashSet;

use indexmap::IndexMap;
use ndarray::Array1;
use polars::prelude::*;

use crate::{
    data::{Data, NAT},
    dataset::Dataset,
    errors::{Error, Result},
    index::{Index, Label},
    variable::Variable,
};

/// Hierarchical row labels of a table: one label column per level, all of the same length
#[derive(Clone, Debug, PartialEq)]
pub struct MultiIndex {
    names: Vec<String>,
    levels: Vec<Index>,
    len: usize,
}

impl MultiIndex {
    pub fn new(names: Vec<String>, levels: Vec<Index>) -> Result<Self> {
        if names.len() != levels.len() {
            return Err(Error::usage(format!(
                "{} level names given for {} levels",
                names.len(),
                levels.len()
            )));
        }

        let len = levels.first().map_or(1, Index::len);
        if levels.iter().any(|level| level.len() != len) {
            return Err(Error::usage("all levels of a multi-index must have the same length"));
        }

        Ok(Self { names, levels, len })
    }

    /// Every combination of labels, the last level varying fastest
    pub fn from_product(indexes: &IndexMap<String, Index>) -> Self {
        let len = indexes.values().map(Index::len).product();
        let mut repeat = len;
        let levels = indexes
            .values()
            .map(|index| {
                let size = index.len().max(1);
                repeat /= size;
                let labels = (0..len)
                    .map(|row| index.labels()[(row / repeat) % size])
                    .collect();
                Index::from_labels(index.dtype(), labels)
            })
            .collect();

        Self {
            names: indexes.keys().cloned().collect(),
            levels,
            len,
        }
    }

    /// Levels read from the named columns of `frame`
    pub fn from_frame(frame: &DataFrame, names: &[&str]) -> Result<Self> {
        let levels = names
            .iter()
            .map(|&name| Index::new(&column_data(frame.column(name)?.as_materialized_series())?))
            .collect::<Result<Vec<_>>>()?;

        let index = Self::new(names.iter().map(ToString::to_string).collect(), levels)?;
        if names.is_empty() {
            return Ok(Self {
                len: frame.height(),
                ..index
            });
        }

        Ok(index)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn levels(&self) -> &[Index] {
        &self.levels
    }

    pub fn level(&self, name: &str) -> Option<&Index> {
        self.names
            .iter()
            .position(|level| level == name)
            .map(|position| &self.levels[position])
    }

    pub fn nlevels(&self) -> usize {
        self.levels.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Labels of one row, one per level
    pub fn row(&self, row: usize) -> Option<Vec<Label>> {
        (row < self.len).then(|| self.levels.iter().map(|level| level.labels()[row]).collect())
    }

    /// One frame column per level
    pub fn to_columns(&self) -> Result<Vec<Column>> {
        self.names
            .iter()
            .zip(&self.levels)
            .map(|(name, level)| data_column(name, &level.to_data()?))
            .collect()
    }
}

/// A one dimensional frame column holding `data` in row major order. Time becomes a
/// millisecond datetime column with NaT as null.
pub(crate) fn data_column(name: &str, data: &Data) -> Result<Column> {
    let name = PlSmallStr::from(name);
    let series = match data {
        Data::I32(array) => Series::new(name, array.iter().copied().collect::<Vec<_>>()),
        Data::I64(array) => Series::new(name, array.iter().copied().collect::<Vec<_>>()),
        Data::F32(array) => Series::new(name, array.iter().copied().collect::<Vec<_>>()),
        Data::F64(array) => Series::new(name, array.iter().copied().collect::<Vec<_>>()),
        Data::Time(array) => {
            let millis: Vec<Option<i64>> = array
                .iter()
                .map(|&seconds| (seconds != NAT).then(|| seconds.saturating_mul(1000)))
                .collect();
            Series::new(name, millis).cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?
        }
    };

    Ok(series.into_column())
}

fn nan_for_null<T, I>(values: I) -> Array1<T>
where
    I: IntoIterator<Item = Option<T>>,
    T: num_traits::Float,
{
    values.into_iter().map(|value| value.unwrap_or_else(T::nan)).collect()
}

/// One dimensional data of a frame column. Nulls become NaN, or NaT for datetimes, and
/// integer columns holding nulls are read as `F64`.
pub(crate) fn column_data(series: &Series) -> Result<Data> {
    let dtype = series.dtype().clone();
    let data = match dtype {
        DataType::Datetime(unit, _) => {
            let per_second = match unit {
                TimeUnit::Nanoseconds => 1_000_000_000,
                TimeUnit::Microseconds => 1_000_000,
                TimeUnit::Milliseconds => 1_000,
            };
            let physical = series.cast(&DataType::Int64)?;
            let seconds: Array1<i64> = physical
                .i64()?
                .into_iter()
                .map(|value| value.map_or(NAT, |value| value.div_euclid(per_second)))
                .collect();
            Data::time(seconds.into_dyn())
        }
        _ if dtype.is_integer() && series.null_count() > 0 => {
            Data::from(nan_for_null(series.cast(&DataType::Float64)?.f64()?))
        }
        DataType::Int8 | DataType::Int16 | DataType::UInt8 | DataType::UInt16 => {
            column_data(&series.cast(&DataType::Int32)?)?
        }
        DataType::UInt32 | DataType::UInt64 => column_data(&series.cast(&DataType::Int64)?)?,
        DataType::Int32 => Data::from(series.i32()?.into_no_null_iter().collect::<Vec<_>>()),
        DataType::Int64 => Data::from(series.i64()?.into_no_null_iter().collect::<Vec<_>>()),
        DataType::Float32 => Data::from(nan_for_null(series.f32()?)),
        DataType::Float64 => Data::from(nan_for_null(series.f64()?)),
        other => {
            return Err(Error::usage(format!(
                "column {:?} of type {other} cannot be converted",
                series.name().as_str()
            )))
        }
    };

    Ok(data)
}

impl Dataset {
    /// One row per combination of coordinate labels. The leading columns hold the labels of
    /// each dimension, followed by one column per non-coordinate variable broadcast over
    /// every dimension.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let dimensions = self.dimensions();
        let names: Vec<String> = dimensions.keys().cloned().collect();
        let shape: Vec<usize> = dimensions.values().copied().collect();

        let indexes = names
            .iter()
            .map(|dimension| Ok((dimension.clone(), self.coordinate_index(dimension)?)))
            .collect::<Result<IndexMap<_, _>>>()?;

        let mut columns = MultiIndex::from_product(&indexes).to_columns()?;
        for (name, variable) in self.noncoordinates() {
            columns.push(data_column(&name, &variable.broadcast_to(&names, &shape)?.flatten())?);
        }

        Ok(DataFrame::new(columns)?)
    }

    /// Inverse of [`Dataset::to_dataframe`]. The `index` columns become dimensions whose
    /// coordinates hold their sorted distinct labels, and every other column a variable over
    /// all of them. Combinations missing from the table are filled with the missing value
    /// marker.
    pub fn from_dataframe(frame: &DataFrame, index: &[&str]) -> Result<Dataset> {
        let levels = MultiIndex::from_frame(frame, index)?;
        let columns = frame
            .get_columns()
            .iter()
            .filter(|column| !index.contains(&column.name().as_str()))
            .map(|column| {
                let data = column_data(column.as_materialized_series())?;
                Ok((column.name().to_string(), data))
            })
            .collect::<Result<Vec<_>>>()?;

        Self::from_table(&levels, columns)
    }

    pub(crate) fn from_table(index: &MultiIndex, columns: Vec<(String, Data)>) -> Result<Dataset> {
        let uniques: Vec<Index> = index.levels().iter().map(Index::unique).collect();
        let shape: Vec<usize> = uniques.iter().map(Index::len).collect();

        let mut positions = vec![0; index.len()];
        for (level, unique) in index.levels().iter().zip(&uniques) {
            for (position, found) in positions.iter_mut().zip(unique.get_indexer(level)) {
                let found = found.ok_or_else(|| Error::usage("index label has no position"))?;
                *position = *position * unique.len() + found;
            }
        }

        let mut seen = HashSet::new();
        if !positions.iter().all(|position| seen.insert(*position)) {
            return Err(Error::usage("cannot convert a table with duplicate index entries"));
        }

        let mut variables = Vec::with_capacity(uniques.len() + columns.len());
        for (name, unique) in index.names().iter().zip(&uniques) {
            variables.push((name.clone(), Variable::new([name.as_str()], unique.to_data()?)?));
        }
        for (name, values) in columns {
            if values.size() != index.len() {
                return Err(Error::usage(format!(
                    "column {name:?} has {} rows, expected {}",
                    values.size(),
                    index.len()
                )));
            }
            let data = values.scatter(&shape, &positions)?;
            variables.push((name, Variable::new(index.names().iter().cloned(), data)?));
        }

        Dataset::from_variables(variables)
    }
}
