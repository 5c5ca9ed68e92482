use std::{fmt, sync::Arc};

use indexmap::IndexMap;

use crate::{
    dataset::Dataset,
    errors::{Error, Result},
    index::Index,
    variable::Variable,
};

/// Read-only view of the coordinate variables for a set of dimensions, in dimension order.
/// Dimensions without a coordinate variable are left out.
#[derive(Clone, Debug, Default)]
pub struct Coordinates {
    variables: IndexMap<String, Arc<Variable>>,
}

impl Coordinates {
    pub(crate) fn derive<S: AsRef<str>>(dataset: &Dataset, dimensions: &[S]) -> Self {
        let variables = dimensions
            .iter()
            .filter_map(|dimension| {
                let dimension = dimension.as_ref();
                dataset
                    .get(dimension)
                    .filter(|variable| variable.is_coordinate_of(dimension))
                    .map(|variable| (dimension.to_string(), Arc::clone(variable)))
            })
            .collect();

        Self { variables }
    }

    pub fn get(&self, dimension: &str) -> Option<&Arc<Variable>> {
        self.variables.get(dimension)
    }

    pub fn contains(&self, dimension: &str) -> bool {
        self.variables.contains_key(dimension)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.variables.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Arc<Variable>)> {
        self.variables.iter()
    }

    /// Label index of one coordinate
    pub fn index(&self, dimension: &str) -> Result<Index> {
        self.variables
            .get(dimension)
            .ok_or_else(|| Error::NameNotFound(dimension.to_string()))?
            .index()
    }

    /// Label indexes of all coordinates
    pub fn indexes(&self) -> Result<IndexMap<String, Index>> {
        self.variables
            .iter()
            .map(|(dimension, variable)| Ok((dimension.clone(), variable.index()?)))
            .collect()
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Coordinates:")?;
        for (dimension, variable) in &self.variables {
            let labels = variable
                .data()
                .labels()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>();
            write!(
                f,
                "\n  * {dimension:<12} ({dimension}) {} {}",
                variable.dtype(),
                labels.join(" ")
            )?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::testing;

    #[test]
    fn test_derive() -> Result<()> {
        let dataset = testing::make_dataset()?;
        let coordinates = Coordinates::derive(&dataset, &["x", "time", "nope"]);
        assert_eq!(coordinates.len(), 2);
        assert_eq!(
            coordinates.keys().collect::<Vec<_>>(),
            vec!["x", "time"]
        );
        assert!(coordinates.contains("time"));
        assert!(Arc::ptr_eq(
            coordinates.get("x").unwrap(),
            dataset.get("x").unwrap()
        ));

        let indexes = coordinates.indexes()?;
        assert_eq!(indexes["x"], Index::from(vec![10i64, 20, 30, 40]));
        assert!(matches!(
            coordinates.index("nope"),
            Err(Error::NameNotFound(_))
        ));

        Ok(())
    }

    #[test]
    fn test_display() -> Result<()> {
        let dataset = testing::make_dataset()?;
        let coordinates = Coordinates::derive(&dataset, &["x"]);
        let text = coordinates.to_string();
        assert!(text.starts_with("Coordinates:"));
        assert!(text.contains("10 20 30 40"));

        Ok(())
    }
}
