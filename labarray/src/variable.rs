use std::{collections::HashSet, fmt};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    data::Data,
    dtype::DType,
    errors::{Error, Result},
    index::Index,
    indexing::{Indexer, Selection},
    ops::{BinaryOp, UnaryOp},
    range::IntRange,
    reduce::Reducer,
};

/// Ordered attribute map of a variable or dataset
pub type Attributes = IndexMap<String, AttrValue>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Str(value) => f.write_str(value),
        }
    }
}

impl From<i32> for AttrValue {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

/// Data with a name for each of its dimensions
#[derive(Clone, Debug, PartialEq)]
pub struct Variable {
    dimensions: Vec<String>,
    data: Data,
    attributes: Attributes,
    encoding: Attributes,
}

impl Variable {
    pub fn new<S, D>(dimensions: impl IntoIterator<Item = S>, data: D) -> Result<Self>
    where
        S: Into<String>,
        D: Into<Data>,
    {
        let dimensions: Vec<String> = dimensions.into_iter().map(Into::into).collect();
        let data = data.into();
        if dimensions.len() != data.ndim() {
            return Err(Error::usage(format!(
                "dimensions {dimensions:?} must have the same length as the number of data \
                 dimensions, {}",
                data.ndim()
            )));
        }

        let mut seen = HashSet::new();
        if let Some(duplicate) = dimensions.iter().find(|&name| !seen.insert(name)) {
            return Err(Error::usage(format!(
                "dimension {duplicate:?} appears more than once"
            )));
        }

        Ok(Self {
            dimensions,
            data,
            attributes: Attributes::new(),
            encoding: Attributes::new(),
        })
    }

    /// A zero-dimensional variable
    pub fn scalar(value: f64) -> Self {
        Self {
            dimensions: vec![],
            data: Data::scalar(value),
            attributes: Attributes::new(),
            encoding: Attributes::new(),
        }
    }

    /// The `0..size` integer coordinate used for dimensions which don't have one
    pub fn default_coordinate(dimension: &str, size: usize) -> Self {
        Self {
            dimensions: vec![dimension.to_string()],
            data: IntRange::new(0i64, 1, size).to_array().into(),
            attributes: Attributes::new(),
            encoding: Attributes::new(),
        }
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_encoding(mut self, encoding: Attributes) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn dimensions(&self) -> &[String] {
        &self.dimensions
    }

    pub fn data(&self) -> &Data {
        &self.data
    }

    /// Replace the data, which must have the same shape.
    pub fn set_data(&mut self, data: Data) -> Result<()> {
        if data.shape() != self.shape() {
            return Err(Error::usage(format!(
                "replacement data has shape {:?}, expected {:?}",
                data.shape(),
                self.shape()
            )));
        }
        self.data = data;

        Ok(())
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }

    pub fn encoding(&self) -> &Attributes {
        &self.encoding
    }

    pub fn encoding_mut(&mut self) -> &mut Attributes {
        &mut self.encoding
    }

    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn size(&self) -> usize {
        self.data.size()
    }

    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    /// Length of the first dimension
    pub fn len(&self) -> Result<usize> {
        self.shape()
            .first()
            .copied()
            .ok_or_else(|| Error::usage("len() of unsized variable"))
    }

    pub fn axis_of(&self, dimension: &str) -> Option<usize> {
        self.dimensions.iter().position(|name| name == dimension)
    }

    fn require_axis(&self, dimension: &str) -> Result<usize> {
        self.axis_of(dimension)
            .ok_or_else(|| Error::DimensionNotFound(dimension.to_string()))
    }

    /// Size of `dimension` in this variable, if it has it
    pub fn size_of(&self, dimension: &str) -> Option<usize> {
        self.axis_of(dimension).map(|axis| self.shape()[axis])
    }

    /// Label index of a one dimensional variable
    pub fn index(&self) -> Result<Index> {
        Index::new(&self.data)
    }

    /// Whether this is the coordinate variable of dimension `name`
    pub fn is_coordinate_of(&self, name: &str) -> bool {
        self.dimensions.len() == 1 && self.dimensions[0] == name
    }

    fn selections(&self, key: &[Indexer]) -> Result<Vec<Selection>> {
        if key.len() != self.ndim() {
            return Err(Error::usage(format!(
                "expected {} indexers, got {}",
                self.ndim(),
                key.len()
            )));
        }

        self.dimensions
            .iter()
            .zip(self.shape())
            .zip(key)
            .map(|((dimension, &size), indexer)| indexer.resolve(dimension, size))
            .collect()
    }

    fn key_for(&self, indexers: &IndexMap<String, Indexer>) -> Vec<Indexer> {
        self.dimensions
            .iter()
            .map(|dimension| indexers.get(dimension).cloned().unwrap_or(Indexer::Full))
            .collect()
    }

    /// Index with exactly one indexer per dimension. Scalar indexers drop their dimension.
    pub fn indexed(&self, key: &[Indexer]) -> Result<Variable> {
        let selections = self.selections(key)?;
        let dimensions = self
            .dimensions
            .iter()
            .zip(&selections)
            .filter(|(_, selection)| !matches!(selection, Selection::Scalar(_)))
            .map(|(dimension, _)| dimension.clone())
            .collect();

        Ok(Self {
            dimensions,
            data: self.data.select(&selections),
            attributes: self.attributes.clone(),
            encoding: self.encoding.clone(),
        })
    }

    /// Index by dimension name. Dimensions this variable doesn't have are ignored.
    pub fn indexed_by(&self, indexers: &IndexMap<String, Indexer>) -> Result<Variable> {
        self.indexed(&self.key_for(indexers))
    }

    /// Assign `value` into the region selected by `key`, broadcasting by dimension name.
    pub fn set_indexed(&mut self, key: &[Indexer], value: &Variable) -> Result<()> {
        let selections = self.selections(key)?;
        let (dimensions, shape): (Vec<String>, Vec<usize>) = self
            .dimensions
            .iter()
            .zip(self.shape())
            .zip(&selections)
            .filter_map(|((dimension, &size), selection)| match selection {
                Selection::Full => Some((dimension.clone(), size)),
                Selection::Scalar(_) => None,
                Selection::Positions(positions) => Some((dimension.clone(), positions.len())),
            })
            .unzip();

        let value = value.broadcast_to(&dimensions, &shape)?;
        self.data.assign(&selections, &value)
    }

    /// Reorder dimensions. An empty list reverses them.
    pub fn transpose(&self, dimensions: &[&str]) -> Result<Variable> {
        let permutation: Vec<usize> = if dimensions.is_empty() {
            (0..self.ndim()).rev().collect()
        } else {
            let permutation = dimensions
                .iter()
                .map(|&dimension| self.require_axis(dimension))
                .collect::<Result<Vec<_>>>()?;
            let unique: HashSet<usize> = permutation.iter().copied().collect();
            if permutation.len() != self.ndim() || unique.len() != self.ndim() {
                return Err(Error::usage(format!(
                    "{dimensions:?} must be a permutation of {:?}",
                    self.dimensions
                )));
            }
            permutation
        };

        Ok(Self {
            dimensions: permutation
                .iter()
                .map(|&axis| self.dimensions[axis].clone())
                .collect(),
            data: self.data.transpose(&permutation),
            attributes: self.attributes.clone(),
            encoding: self.encoding.clone(),
        })
    }

    pub fn rename_dimensions(&self, mapping: &IndexMap<String, String>) -> Variable {
        let mut renamed = self.clone();
        for dimension in renamed.dimensions.iter_mut() {
            if let Some(name) = mapping.get(dimension) {
                *dimension = name.clone();
            }
        }

        renamed
    }

    /// Gather positions along `dimension`, filling `None` with the missing value marker.
    pub fn take(&self, dimension: &str, positions: &[Option<usize>]) -> Result<Variable> {
        let axis = self.require_axis(dimension)?;
        Ok(Self {
            dimensions: self.dimensions.clone(),
            data: self.data.take(axis, positions)?,
            attributes: self.attributes.clone(),
            encoding: self.encoding.clone(),
        })
    }

    /// Join variables along `dimension`. An existing dimension keeps its axis, a new one is
    /// inserted as the first axis. `positions`, one list per variable, say where each piece
    /// lands in the result and must form a permutation.
    pub fn concat(
        variables: &[Variable],
        dimension: &str,
        positions: Option<&[Vec<usize>]>,
    ) -> Result<Variable> {
        let first = variables
            .first()
            .ok_or_else(|| Error::usage("must supply at least one variable to concatenate"))?;

        let (axis, dimensions, pieces) = match first.axis_of(dimension) {
            Some(axis) => (
                axis,
                first.dimensions.clone(),
                variables
                    .iter()
                    .map(|variable| variable.data.clone())
                    .collect::<Vec<_>>(),
            ),
            None => (
                0,
                std::iter::once(dimension.to_string())
                    .chain(first.dimensions.iter().cloned())
                    .collect(),
                variables
                    .iter()
                    .map(|variable| variable.data.insert_axis(0))
                    .collect(),
            ),
        };

        if let Some(variable) = variables
            .iter()
            .find(|variable| variable.dimensions != first.dimensions)
        {
            return Err(Error::usage(format!(
                "cannot concatenate variables with dimensions {:?} and {:?}",
                first.dimensions, variable.dimensions
            )));
        }

        let mut data = Data::concat(axis, &pieces)?;
        if let Some(positions) = positions {
            let total = data.shape()[axis];
            let mut order = vec![None; total];
            for (k, &position) in positions.iter().flatten().enumerate() {
                match order.get_mut(position) {
                    Some(slot) if slot.is_none() => *slot = Some(k),
                    _ => {
                        return Err(Error::usage(format!(
                            "concatenation positions must be a permutation of 0..{total}"
                        )))
                    }
                }
            }
            if positions.iter().map(Vec::len).sum::<usize>() != total {
                return Err(Error::usage(format!(
                    "concatenation positions must be a permutation of 0..{total}"
                )));
            }
            data = data.take(axis, &order)?;
        }

        Ok(Self {
            dimensions,
            data,
            attributes: first.attributes.clone(),
            encoding: first.encoding.clone(),
        })
    }

    /// Reduce over the named dimensions or the given axes, at most one of which may be
    /// given. Neither reduces over all axes. Attributes are not kept.
    pub fn reduce<R: Reducer + ?Sized>(
        &self,
        reducer: &R,
        dimension: Option<&[&str]>,
        axis: Option<&[usize]>,
    ) -> Result<Variable> {
        let axes: Vec<usize> = match (dimension, axis) {
            (Some(_), Some(_)) => {
                return Err(Error::usage(
                    "cannot supply both 'axis' and 'dimension' arguments",
                ))
            }
            (Some(dimensions), None) => dimensions
                .iter()
                .map(|&dimension| self.require_axis(dimension))
                .collect::<Result<_>>()?,
            (None, Some(axes)) => {
                if let Some(&axis) = axes.iter().find(|&&axis| axis >= self.ndim()) {
                    return Err(Error::usage(format!(
                        "axis {axis} is out of bounds for variable with {} dimensions",
                        self.ndim()
                    )));
                }
                axes.to_vec()
            }
            (None, None) => (0..self.ndim()).collect(),
        };

        let dimensions = self
            .dimensions
            .iter()
            .enumerate()
            .filter(|(axis, _)| !axes.contains(axis))
            .map(|(_, dimension)| dimension.clone())
            .collect();

        Ok(Self {
            dimensions,
            data: reducer.reduce(&self.data, &axes)?,
            attributes: Attributes::new(),
            encoding: Attributes::new(),
        })
    }

    /// This variable's data laid out over `dimensions` with `shape`, which must include all
    /// of this variable's dimensions.
    pub fn broadcast_to(&self, dimensions: &[String], shape: &[usize]) -> Result<Data> {
        let mut targets = Vec::with_capacity(self.ndim());
        for (dimension, &size) in self.dimensions.iter().zip(self.shape()) {
            let target = dimensions
                .iter()
                .position(|name| name == dimension)
                .ok_or_else(|| Error::DimensionNotFound(dimension.clone()))?;
            if shape[target] != size {
                return Err(Error::DimensionSize {
                    dimension: dimension.clone(),
                    expected: shape[target],
                    found: size,
                });
            }
            targets.push(target);
        }

        let mut permutation: Vec<usize> = (0..self.ndim()).collect();
        permutation.sort_by_key(|&axis| targets[axis]);
        let new_axes: Vec<usize> = (0..dimensions.len())
            .filter(|position| !targets.contains(position))
            .collect();

        self.data
            .expand(&permutation, &new_axes, shape)
            .ok_or_else(|| {
                Error::usage(format!(
                    "cannot broadcast {:?} to {dimensions:?}",
                    self.dimensions
                ))
            })
    }

    pub fn unary(&self, op: UnaryOp) -> Result<Variable> {
        Ok(Self {
            dimensions: self.dimensions.clone(),
            data: self.data.unary(op)?,
            attributes: Attributes::new(),
            encoding: Attributes::new(),
        })
    }

    /// Elementwise operation, broadcasting by dimension name. The result has this variable's
    /// dimensions followed by any the other one adds. `reflexive` swaps the operands.
    pub fn binary(&self, op: BinaryOp, other: &Variable, reflexive: bool) -> Result<Variable> {
        let mut dimensions = self.dimensions.clone();
        let mut shape = self.shape().to_vec();
        for (dimension, &size) in other.dimensions.iter().zip(other.shape()) {
            match self.size_of(dimension) {
                Some(expected) if expected != size => {
                    return Err(Error::DimensionSize {
                        dimension: dimension.clone(),
                        expected,
                        found: size,
                    })
                }
                Some(_) => {}
                None => {
                    dimensions.push(dimension.clone());
                    shape.push(size);
                }
            }
        }

        let left = self.broadcast_to(&dimensions, &shape)?;
        let right = other.broadcast_to(&dimensions, &shape)?;
        let data = if reflexive {
            right.binary(op, &left)?
        } else {
            left.binary(op, &right)?
        };

        Ok(Self {
            dimensions,
            data,
            attributes: Attributes::new(),
            encoding: Attributes::new(),
        })
    }

    /// Same dimensions and values, NaN equal to NaN. Attributes are not compared.
    pub fn equals(&self, other: &Variable) -> bool {
        self.dimensions == other.dimensions && self.data.equals(&other.data)
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "<Variable ({})>", self.dimensions.join(", "))?;
        write!(f, "{}", self.data)?;
        for (name, value) in &self.attributes {
            write!(f, "\n    {name}: {value}")?;
        }

        Ok(())
    }
}
