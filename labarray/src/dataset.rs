use std::{collections::HashSet, fmt, sync::Arc};

use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::{
    coordinates::Coordinates,
    errors::{Error, Result},
    index::Index,
    indexing::{remap_label_indexers, Indexer, LabelIndexer},
    time,
    variable::{Attributes, Variable},
};

/// An ordered collection of named variables which agree on the sizes of their dimensions.
///
/// Every dimension has a coordinate variable, a one dimensional variable stored under the
/// dimension's name. When a variable introduces a dimension without one, a default `0..n`
/// integer coordinate is appended. Time coordinates additionally expose calendar fields as
/// virtual variables, eg `time.month`.
///
/// Variables are shared between datasets and copied on write.
#[derive(Clone, Debug, Default)]
pub struct Dataset {
    variables: IndexMap<String, Arc<Variable>>,
    attributes: Attributes,
}

/// Coordinates compare by their labels, other variables by dimensions and data
fn same_values(name: &str, existing: &Variable, other: &Variable) -> Result<bool> {
    if existing.is_coordinate_of(name) && other.is_coordinate_of(name) {
        return Ok(existing.index()?.equals(&other.index()?));
    }

    Ok(existing.equals(other))
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_variables<I, S>(variables: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Variable)>,
        S: Into<String>,
    {
        Self::build(
            variables
                .into_iter()
                .map(|(name, variable)| (name.into(), Arc::new(variable))),
            Attributes::new(),
        )
    }

    fn build<I>(variables: I, attributes: Attributes) -> Result<Self>
    where
        I: IntoIterator<Item = (String, Arc<Variable>)>,
    {
        let mut dataset = Self {
            variables: IndexMap::new(),
            attributes,
        };
        for (name, variable) in variables {
            dataset.store(name, variable)?;
        }
        dataset.fill_default_coordinates();

        Ok(dataset)
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Dimension sizes, in order of first appearance
    pub fn dimensions(&self) -> IndexMap<String, usize> {
        self.dimensions_without(None)
    }

    fn dimensions_without(&self, excluded: Option<&str>) -> IndexMap<String, usize> {
        let mut dimensions = IndexMap::new();
        for (name, variable) in &self.variables {
            if Some(name.as_str()) == excluded {
                continue;
            }
            for (dimension, &size) in variable.dimensions().iter().zip(variable.shape()) {
                dimensions.entry(dimension.clone()).or_insert(size);
            }
        }

        dimensions
    }

    fn validate(&self, name: &str, variable: &Variable) -> Result<()> {
        let dimensions = self.dimensions_without(Some(name));
        for (dimension, &size) in variable.dimensions().iter().zip(variable.shape()) {
            if let Some(&expected) = dimensions.get(dimension) {
                if expected != size {
                    return Err(Error::DimensionSize {
                        dimension: dimension.clone(),
                        expected,
                        found: size,
                    });
                }
            }

            if dimension != name {
                if let Some(existing) = self.variables.get(dimension) {
                    if !existing.is_coordinate_of(dimension) {
                        return Err(Error::usage(format!(
                            "variable {dimension:?} is not a coordinate and can't be used as a \
                             dimension"
                        )));
                    }
                }
            }
        }

        let is_dimension =
            dimensions.contains_key(name) || variable.dimensions().iter().any(|d| d == name);
        if is_dimension && !variable.is_coordinate_of(name) {
            return Err(Error::usage(format!(
                "variable {name:?} has the name of a dimension and must be its one dimensional \
                 coordinate"
            )));
        }

        Ok(())
    }

    fn store(&mut self, name: String, variable: Arc<Variable>) -> Result<()> {
        self.validate(&name, &variable)?;
        self.variables.insert(name, variable);

        Ok(())
    }

    fn fill_default_coordinates(&mut self) {
        for (dimension, size) in self.dimensions() {
            if !self.variables.contains_key(&dimension) {
                let coordinate = Variable::default_coordinate(&dimension, size);
                self.variables.insert(dimension, Arc::new(coordinate));
            }
        }
    }

    /// Add or replace a variable
    pub fn insert<S: Into<String>>(&mut self, name: S, variable: Variable) -> Result<()> {
        self.insert_shared(name, Arc::new(variable))
    }

    pub fn insert_shared<S: Into<String>>(
        &mut self,
        name: S,
        variable: Arc<Variable>,
    ) -> Result<()> {
        self.store(name.into(), variable)?;
        self.fill_default_coordinates();

        Ok(())
    }

    /// Whether `name` is a stored or a virtual variable
    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name) || self.is_virtual(name)
    }

    pub fn variables(&self) -> &IndexMap<String, Arc<Variable>> {
        &self.variables
    }

    /// A stored variable
    pub fn get(&self, name: &str) -> Option<&Arc<Variable>> {
        self.variables.get(name)
    }

    /// A stored or virtual variable
    pub fn variable(&self, name: &str) -> Result<Arc<Variable>> {
        if let Some(variable) = self.variables.get(name) {
            return Ok(Arc::clone(variable));
        }

        if let Some((coordinate, field)) = time::split_virtual(name) {
            if let Some(seconds) = self
                .variables
                .get(coordinate)
                .filter(|variable| variable.is_coordinate_of(coordinate))
                .and_then(|variable| variable.data().as_time())
            {
                return Ok(Arc::new(time::field_variable(coordinate, seconds, field)?));
            }
        }

        Err(Error::NameNotFound(name.to_string()))
    }

    /// Mutable access to a stored variable, copied first if it is shared with another dataset.
    pub(crate) fn variable_mut(&mut self, name: &str) -> Result<&mut Variable> {
        self.variables
            .get_mut(name)
            .map(Arc::make_mut)
            .ok_or_else(|| Error::NameNotFound(name.to_string()))
    }

    /// Remove a stored variable. A coordinate can only be removed once nothing else uses its
    /// dimension.
    pub fn remove(&mut self, name: &str) -> Result<Arc<Variable>> {
        if !self.variables.contains_key(name) {
            return Err(Error::NameNotFound(name.to_string()));
        }
        if self.dimensions_without(Some(name)).contains_key(name) {
            return Err(Error::usage(format!(
                "cannot remove coordinate {name:?} while other variables use its dimension"
            )));
        }

        self.variables
            .shift_remove(name)
            .ok_or_else(|| Error::NameNotFound(name.to_string()))
    }

    /// Names of the computed calendar fields of time coordinates
    pub fn virtual_variables(&self) -> Vec<String> {
        self.variables
            .iter()
            .filter(|(name, variable)| {
                variable.is_coordinate_of(name) && variable.data().as_time().is_some()
            })
            .flat_map(|(name, _)| time::FIELDS.iter().map(move |field| format!("{name}.{field}")))
            .collect()
    }

    pub fn is_virtual(&self, name: &str) -> bool {
        !self.variables.contains_key(name) && self.virtual_variables().iter().any(|v| v == name)
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }

    /// Coordinate variables of `dimensions`
    pub fn coordinates<S: AsRef<str>>(&self, dimensions: &[S]) -> Coordinates {
        Coordinates::derive(self, dimensions)
    }

    /// Variables which aren't the coordinate of a dimension
    pub fn noncoordinates(&self) -> IndexMap<String, Arc<Variable>> {
        self.variables
            .iter()
            .filter(|(name, variable)| !variable.is_coordinate_of(name))
            .map(|(name, variable)| (name.clone(), Arc::clone(variable)))
            .collect()
    }

    pub fn coordinate_index(&self, dimension: &str) -> Result<Index> {
        if !self.dimensions().contains_key(dimension) {
            return Err(Error::DimensionNotFound(dimension.to_string()));
        }

        self.variable(dimension)?.index()
    }

    /// A new dataset. Shallow copies share variables, which are copied on write.
    pub fn copy(&self, deep: bool) -> Dataset {
        if !deep {
            return self.clone();
        }

        Self {
            variables: self
                .variables
                .iter()
                .map(|(name, variable)| (name.clone(), Arc::new(Variable::clone(variable))))
                .collect(),
            attributes: self.attributes.clone(),
        }
    }

    fn check_dimensions<'a>(&self, dimensions: impl IntoIterator<Item = &'a String>) -> Result<()> {
        let existing = self.dimensions();
        for dimension in dimensions {
            if !existing.contains_key(dimension) {
                return Err(Error::DimensionNotFound(dimension.clone()));
            }
        }

        Ok(())
    }

    /// Index every variable along the given dimensions
    pub fn indexed_by(&self, indexers: &IndexMap<String, Indexer>) -> Result<Dataset> {
        self.check_dimensions(indexers.keys())?;

        let variables = self
            .variables
            .iter()
            .map(|(name, variable)| {
                let touched = variable
                    .dimensions()
                    .iter()
                    .any(|dimension| indexers.contains_key(dimension));
                let variable = if touched {
                    Arc::new(variable.indexed_by(indexers)?)
                } else {
                    Arc::clone(variable)
                };
                Ok((name.clone(), variable))
            })
            .collect::<Result<Vec<_>>>()?;

        Self::build(variables, self.attributes.clone())
    }

    /// Index every variable along the given dimensions, by coordinate label
    pub fn labeled_by(&self, indexers: &IndexMap<String, LabelIndexer>) -> Result<Dataset> {
        self.indexed_by(&remap_label_indexers(self, indexers)?)
    }

    /// Conform to new coordinate labels. Positions with no matching label are filled with
    /// the missing value marker. Dimensions the dataset doesn't have are ignored.
    pub fn reindex(&self, copy: bool, targets: &IndexMap<String, Index>) -> Result<Dataset> {
        let dimensions = self.dimensions();
        let mut changes = IndexMap::new();
        for (dimension, target) in targets {
            if !dimensions.contains_key(dimension) {
                continue;
            }
            let current = self.coordinate_index(dimension)?;
            if !current.equals(target) {
                changes.insert(dimension.clone(), (current.get_indexer(target), target));
            }
        }

        if !changes.is_empty() {
            debug!(dimensions = ?changes.keys().collect::<Vec<_>>(), "reindexing");
        }

        let variables = self
            .variables
            .iter()
            .map(|(name, variable)| {
                let target = changes
                    .get(name)
                    .filter(|_| variable.is_coordinate_of(name));
                if let Some((_, target)) = target {
                    let coordinate = Variable::new([name.as_str()], target.to_data()?)?
                        .with_attributes(variable.attributes().clone())
                        .with_encoding(variable.encoding().clone());
                    return Ok((name.clone(), Arc::new(coordinate)));
                }

                let mut reindexed: Option<Variable> = None;
                for (dimension, (positions, _)) in &changes {
                    if variable.axis_of(dimension).is_some() {
                        let source = reindexed.as_ref().unwrap_or(variable.as_ref());
                        reindexed = Some(source.take(dimension, positions)?);
                    }
                }

                let variable = match reindexed {
                    Some(reindexed) => Arc::new(reindexed),
                    None if copy => Arc::new(Variable::clone(variable)),
                    None => Arc::clone(variable),
                };
                Ok((name.clone(), variable))
            })
            .collect::<Result<Vec<_>>>()?;

        Self::build(variables, self.attributes.clone())
    }

    /// Rename variables and dimensions
    pub fn rename(&self, names: &IndexMap<String, String>) -> Result<Dataset> {
        let dimensions = self.dimensions();
        for name in names.keys() {
            if !self.variables.contains_key(name) && !dimensions.contains_key(name) {
                return Err(Error::NameNotFound(name.clone()));
            }
        }

        let mut seen = HashSet::new();
        let mut variables = Vec::with_capacity(self.variables.len());
        for (name, variable) in &self.variables {
            let renamed = names.get(name).unwrap_or(name).clone();
            if !seen.insert(renamed.clone()) {
                return Err(Error::usage(format!(
                    "the new name {renamed:?} conflicts with another variable"
                )));
            }
            variables.push((renamed, Arc::new(variable.rename_dimensions(names))));
        }

        Self::build(variables, self.attributes.clone())
    }

    /// A dataset with only the named variables and their coordinates. Virtual variables are
    /// computed and stored.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Dataset> {
        let mut selected = IndexMap::new();
        let mut virtuals = vec![];
        for name in names {
            let name = name.as_ref();
            let variable = self.variable(name)?;
            if !self.variables.contains_key(name) {
                virtuals.push((name.to_string(), Arc::clone(&variable)));
            }
            selected.insert(name.to_string(), variable);
        }

        let dimensions: HashSet<&String> = selected
            .values()
            .flat_map(|variable| variable.dimensions())
            .collect();

        let variables = self
            .variables
            .iter()
            .filter(|(name, variable)| {
                selected.contains_key(*name)
                    || (dimensions.contains(name) && variable.is_coordinate_of(name))
            })
            .map(|(name, variable)| (name.clone(), Arc::clone(variable)))
            .chain(virtuals)
            .collect::<Vec<_>>();

        Self::build(variables, self.attributes.clone())
    }

    /// A dataset without the named variables. Dropping a coordinate drops everything along
    /// its dimension.
    pub fn unselect<S: AsRef<str>>(&self, names: &[S]) -> Result<Dataset> {
        let mut dropped = HashSet::new();
        for name in names {
            let name = name.as_ref();
            if !self.variables.contains_key(name) {
                return Err(Error::NameNotFound(name.to_string()));
            }
            dropped.insert(name);
        }

        let variables = self
            .variables
            .iter()
            .filter(|(name, variable)| {
                !dropped.contains(name.as_str())
                    && !variable
                        .dimensions()
                        .iter()
                        .any(|dimension| dropped.contains(dimension.as_str()))
            })
            .map(|(name, variable)| (name.clone(), Arc::clone(variable)))
            .collect::<Vec<_>>();

        Self::build(variables, self.attributes.clone())
    }

    /// Combine with the variables of `other`. Variables present in both must be equal.
    pub fn merge(&self, other: &Dataset) -> Result<Dataset> {
        let mut merged = self.clone();
        merged.merge_in_place(other)?;

        Ok(merged)
    }

    /// Like `merge`, but updating this dataset. On failure it is left unchanged. Coordinates
    /// holding the same labels in different dtypes keep this dataset's version.
    pub fn merge_in_place(&mut self, other: &Dataset) -> Result<()> {
        let mut merged = self.clone();
        for (name, variable) in &other.variables {
            match self.variables.get(name) {
                None => merged.store(name.clone(), Arc::clone(variable))?,
                Some(existing) => {
                    if !Arc::ptr_eq(existing, variable) && !same_values(name, existing, variable)? {
                        return Err(Error::Conflict(name.clone()));
                    }
                }
            }
        }
        merged.fill_default_coordinates();
        *self = merged;

        Ok(())
    }

    /// Index length one dimensions at position 0, removing them. With no names given, all
    /// length one dimensions are squeezed.
    pub fn squeeze(&self, dimensions: Option<&[&str]>) -> Result<Dataset> {
        let sizes = self.dimensions();
        let squeezed: Vec<String> = match dimensions {
            Some(dimensions) => dimensions
                .iter()
                .map(|&dimension| match sizes.get(dimension) {
                    None => Err(Error::DimensionNotFound(dimension.to_string())),
                    Some(&1) => Ok(dimension.to_string()),
                    Some(&length) => Err(Error::Shape {
                        dimension: dimension.to_string(),
                        length,
                    }),
                })
                .collect::<Result<_>>()?,
            None => sizes
                .iter()
                .filter(|(_, &size)| size == 1)
                .map(|(dimension, _)| dimension.clone())
                .collect(),
        };

        let indexers = squeezed
            .into_iter()
            .map(|dimension| (dimension, Indexer::Scalar(0)))
            .collect();

        self.indexed_by(&indexers)
    }

    /// Join datasets along a new or existing dimension.
    ///
    /// Variables in `concat_over`, variables along the dimension and a scalar variable named
    /// after it are concatenated. Every other variable must be equal in all datasets.
    /// `positions`, one list per dataset, place each dataset's pieces in the result.
    pub fn concat(
        datasets: &[Dataset],
        dimension: &ConcatDimension,
        positions: Option<&[Vec<usize>]>,
        concat_over: &[String],
    ) -> Result<Dataset> {
        let first = datasets
            .first()
            .ok_or_else(|| Error::usage("must supply at least one dataset to concatenate"))?;

        let (name, coordinate) = match dimension {
            ConcatDimension::Name(name) => (name.clone(), None),
            ConcatDimension::Coordinate(variable) => match variable.dimensions() {
                [name] => (name.clone(), Some(variable)),
                dimensions => {
                    return Err(Error::usage(format!(
                        "a concatenation coordinate must be one dimensional, got {dimensions:?}"
                    )))
                }
            },
        };

        let mut concatenated: IndexSet<String> = IndexSet::new();
        for variable in concat_over {
            if !first.variables.contains_key(variable) {
                return Err(Error::NameNotFound(variable.clone()));
            }
            concatenated.insert(variable.clone());
        }
        for (variable_name, variable) in &first.variables {
            if variable_name == &name || variable.axis_of(&name).is_some() {
                concatenated.insert(variable_name.clone());
            }
        }

        for dataset in &datasets[1..] {
            if dataset.attributes != first.attributes {
                return Err(Error::usage("dataset attributes differ"));
            }
            for (variable_name, variable) in &dataset.variables {
                if concatenated.contains(variable_name) {
                    continue;
                }
                match first.variables.get(variable_name) {
                    Some(expected) if expected.equals(variable) => {}
                    _ => return Err(Error::Conflict(variable_name.clone())),
                }
            }
            for variable_name in first.variables.keys() {
                if !dataset.variables.contains_key(variable_name) {
                    return Err(Error::Conflict(variable_name.clone()));
                }
            }
        }

        debug!(
            dimension = %name,
            datasets = datasets.len(),
            variables = ?concatenated,
            "concatenating"
        );

        let mut variables = first
            .variables
            .iter()
            .map(|(variable_name, variable)| {
                if !concatenated.contains(variable_name) {
                    return Ok((variable_name.clone(), Arc::clone(variable)));
                }

                let pieces = datasets
                    .iter()
                    .map(|dataset| dataset.variables[variable_name].as_ref().clone())
                    .collect::<Vec<_>>();
                let joined = Variable::concat(&pieces, &name, positions)?;
                Ok((variable_name.clone(), Arc::new(joined)))
            })
            .collect::<Result<IndexMap<_, _>>>()?;

        if let Some(coordinate) = coordinate {
            variables.insert(name, Arc::new(coordinate.clone()));
        }

        Self::build(variables, first.attributes.clone())
    }
}

/// The dimension to concatenate along
#[derive(Clone, Debug, PartialEq)]
pub enum ConcatDimension {
    Name(String),

    /// A one dimensional coordinate, stored in the result, whose dimension is the
    /// concatenation dimension
    Coordinate(Variable),
}

impl ConcatDimension {
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) => name,
            Self::Coordinate(variable) => variable
                .dimensions()
                .first()
                .map(String::as_str)
                .unwrap_or_default(),
        }
    }
}

impl Default for ConcatDimension {
    fn default() -> Self {
        Self::Name("concat_dimension".to_string())
    }
}

impl From<&str> for ConcatDimension {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<Variable> for ConcatDimension {
    fn from(coordinate: Variable) -> Self {
        Self::Coordinate(coordinate)
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dimensions = self
            .dimensions()
            .iter()
            .map(|(dimension, size)| format!("{dimension}: {size}"))
            .collect::<Vec<_>>();
        writeln!(f, "<Dataset>\nDimensions: ({})", dimensions.join(", "))?;

        let names: Vec<String> = self.dimensions().into_keys().collect();
        write!(f, "{}", self.coordinates(&names))?;

        f.write_str("\nData variables:")?;
        for (name, variable) in self.noncoordinates() {
            write!(
                f,
                "\n    {name:<12} ({}) {}",
                variable.dimensions().join(", "),
                variable.dtype()
            )?;
        }

        if !self.attributes.is_empty() {
            f.write_str("\nAttributes:")?;
            for (name, value) in &self.attributes {
                write!(f, "\n    {name}: {value}")?;
            }
        }

        Ok(())
    }
}
