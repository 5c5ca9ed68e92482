use std::{fmt, sync::Arc};

use indexmap::IndexMap;
use parking_lot::RwLock;
use paste::paste;
use polars::frame::DataFrame;
use tracing::{debug, warn};

use crate::{
    align::Labeled,
    coordinates::Coordinates,
    data::Data,
    dataset::{ConcatDimension, Dataset},
    dtype::DType,
    errors::{Error, Result},
    frame::{column_data, data_column, MultiIndex},
    index::Index,
    indexing::{expanded_indexer, remap_label_indexers, Indexer, Key, LabelIndexer},
    reduce::{ReduceOp, Reducer},
    variable::{Attributes, Variable},
};

/// A dataset shared between several arrays
pub type SharedDataset = Arc<RwLock<Dataset>>;

/// One variable of a dataset, given array semantics, with the dataset's coordinates attached.
///
/// An array is a handle: cloning it, or getting another variable of it by name, gives an
/// array over the same dataset, and in place changes through any of them are seen by all.
/// Every other operation returns an array over a new dataset.
#[derive(Clone)]
pub struct DataArray {
    dataset: SharedDataset,
    name: String,
}

/// Argument to [`DataArray::rename`]
#[derive(Clone, Debug, PartialEq)]
pub enum Rename {
    /// Rename the array's own variable
    Name(String),

    /// Rename any variables and dimensions of the dataset
    Mapping(IndexMap<String, String>),
}

impl From<&str> for Rename {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for Rename {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<IndexMap<String, String>> for Rename {
    fn from(mapping: IndexMap<String, String>) -> Self {
        Self::Mapping(mapping)
    }
}

macro_rules! reductions {
    ($($op:ident),*) => {
        paste! {
            $(
                /// Shorthand for `reduce` with the matching `ReduceOp`, over the given
                /// dimensions or all of them
                pub fn [<$op:lower>](&self, dimension: Option<&[&str]>) -> Result<DataArray> {
                    self.reduce(&ReduceOp::$op, dimension, None)
                }
            )*
        }
    };
}

impl DataArray {
    pub fn new<S: Into<String>>(dataset: Dataset, name: S) -> Result<Self> {
        Self::bind(Arc::new(RwLock::new(dataset)), name)
    }

    /// An array over an existing shared dataset
    pub fn bind<S: Into<String>>(dataset: SharedDataset, name: S) -> Result<Self> {
        let name = name.into();
        if !dataset.read().contains(&name) {
            return Err(Error::NameNotFound(name));
        }

        Ok(Self { dataset, name })
    }

    /// An array over a new dataset holding just `variable` and its default coordinates
    pub fn from_variable<S: Into<String>>(name: S, variable: Variable) -> Result<Self> {
        let name = name.into();
        let dataset = Dataset::from_variables([(name.clone(), variable)])?;

        Self::new(dataset, name)
    }

    pub fn dataset(&self) -> &SharedDataset {
        &self.dataset
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether both arrays are over the same dataset
    pub fn same_dataset(&self, other: &DataArray) -> bool {
        Arc::ptr_eq(&self.dataset, &other.dataset)
    }

    /// A shallow copy of the current state of the dataset
    pub(crate) fn snapshot(&self) -> Dataset {
        self.dataset.read().clone()
    }

    pub fn variable(&self) -> Result<Arc<Variable>> {
        self.dataset.read().variable(&self.name)
    }

    pub fn set_variable(&self, variable: Variable) -> Result<()> {
        self.dataset.write().insert(self.name.clone(), variable)
    }

    pub fn dimensions(&self) -> Result<Vec<String>> {
        Ok(self.variable()?.dimensions().to_vec())
    }

    pub fn dtype(&self) -> Result<DType> {
        Ok(self.variable()?.dtype())
    }

    pub fn shape(&self) -> Result<Vec<usize>> {
        Ok(self.variable()?.shape().to_vec())
    }

    pub fn size(&self) -> Result<usize> {
        Ok(self.variable()?.size())
    }

    pub fn ndim(&self) -> Result<usize> {
        Ok(self.variable()?.ndim())
    }

    pub fn len(&self) -> Result<usize> {
        self.variable()?.len()
    }

    pub fn data(&self) -> Result<Data> {
        Ok(self.variable()?.data().clone())
    }

    pub fn set_data(&self, data: Data) -> Result<()> {
        self.dataset.write().variable_mut(&self.name)?.set_data(data)
    }

    pub fn index(&self) -> Result<Index> {
        self.variable()?.index()
    }

    pub fn is_coordinate(&self) -> Result<bool> {
        Ok(self.variable()?.is_coordinate_of(&self.name))
    }

    pub fn attributes(&self) -> Result<Attributes> {
        Ok(self.variable()?.attributes().clone())
    }

    pub fn encoding(&self) -> Result<Attributes> {
        Ok(self.variable()?.encoding().clone())
    }

    /// Coordinate variables of this array's dimensions
    pub fn coordinates(&self) -> Result<Coordinates> {
        let dataset = self.dataset.read();
        let variable = dataset.variable(&self.name)?;

        Ok(dataset.coordinates(variable.dimensions()))
    }

    /// All variables of the dataset
    pub fn variables(&self) -> IndexMap<String, Arc<Variable>> {
        self.dataset.read().variables().clone()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.dataset.read().contains(name)
    }

    fn positional_indexers(&self, key: Vec<Indexer>) -> Result<IndexMap<String, Indexer>> {
        let dimensions = self.dimensions()?;
        let key = expanded_indexer(key, dimensions.len())?;

        Ok(dimensions.into_iter().zip(key).collect())
    }

    /// Another variable of the same dataset, or this array indexed by position
    pub fn get_item<K: Into<Key>>(&self, key: K) -> Result<DataArray> {
        match key.into() {
            Key::Name(name) => Self::bind(Arc::clone(&self.dataset), name),
            Key::Positional(key) => self.indexed_by(&self.positional_indexers(key)?),
        }
    }

    /// Store a variable in the dataset, or assign into the selected region of this array
    pub fn set_item<K: Into<Key>>(&self, key: K, value: Variable) -> Result<()> {
        match key.into() {
            Key::Name(name) => self.dataset.write().insert(name, value),
            Key::Positional(key) => {
                let key = expanded_indexer(key, self.ndim()?)?;
                self.dataset
                    .write()
                    .variable_mut(&self.name)?
                    .set_indexed(&key, &value)
            }
        }
    }

    pub fn delete_item(&self, name: &str) -> Result<()> {
        self.dataset.write().remove(name)?;

        Ok(())
    }

    /// Label based indexing
    pub fn loc(&self) -> LocIndexer<'_> {
        LocIndexer { array: self }
    }

    /// Arrays for each position along the first dimension
    pub fn iter(&self) -> Result<Iter<'_>> {
        Ok(Iter {
            array: self,
            position: 0,
            len: self.len()?,
        })
    }

    /// An array over a copy of the dataset. Shallow copies share variables until either side
    /// changes them.
    pub fn copy(&self, deep: bool) -> Result<DataArray> {
        Self::new(self.dataset.read().copy(deep), self.name.clone())
    }

    pub fn indexed_by(&self, indexers: &IndexMap<String, Indexer>) -> Result<DataArray> {
        let dataset = self.dataset.read().indexed_by(indexers)?;
        Self::new(dataset, self.name.clone())
    }

    pub fn labeled_by(&self, indexers: &IndexMap<String, LabelIndexer>) -> Result<DataArray> {
        let dataset = self.dataset.read().labeled_by(indexers)?;
        Self::new(dataset, self.name.clone())
    }

    /// Conform this array and its coordinates onto new coordinate labels, filling in
    /// missing values. Only this array's variable and its coordinates are kept.
    pub fn reindex(&self, copy: bool, targets: &IndexMap<String, Index>) -> Result<DataArray> {
        let selected = self.dataset.read().select(&[self.name.as_str()])?;
        Self::new(selected.reindex(copy, targets)?, self.name.clone())
    }

    pub fn reindex_like<L: Labeled>(&self, other: &L, copy: bool) -> Result<DataArray> {
        self.reindex(copy, &other.coordinates()?.indexes()?)
    }

    pub fn rename<R: Into<Rename>>(&self, names: R) -> Result<DataArray> {
        let (mapping, name) = match names.into() {
            Rename::Name(name) => (
                IndexMap::from([(self.name.clone(), name.clone())]),
                name,
            ),
            Rename::Mapping(mapping) => {
                let name = mapping.get(&self.name).unwrap_or(&self.name).clone();
                (mapping, name)
            }
        };

        let dataset = self.dataset.read().rename(&mapping)?;
        Self::new(dataset, name)
    }

    /// Only the named variables, this array's variable and their coordinates
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<DataArray> {
        let mut names: Vec<&str> = names.iter().map(AsRef::as_ref).collect();
        names.push(&self.name);

        let dataset = self.dataset.read().select(&names)?;
        Self::new(dataset, self.name.clone())
    }

    pub fn unselect<S: AsRef<str>>(&self, names: &[S]) -> Result<DataArray> {
        if names.iter().any(|name| name.as_ref() == self.name) {
            return Err(Error::usage(format!(
                "cannot unselect {:?}, the array's own variable",
                self.name
            )));
        }

        let dataset = self.dataset.read().unselect(names)?;
        Self::new(dataset, self.name.clone())
    }

    /// Reorder dimensions. An empty list reverses them.
    pub fn transpose(&self, dimensions: &[&str]) -> Result<DataArray> {
        let mut dataset = self.dataset.read().copy(false);
        let transposed = dataset.variable(&self.name)?.transpose(dimensions)?;
        dataset.insert(self.name.clone(), transposed)?;

        Self::new(dataset, self.name.clone())
    }

    pub fn squeeze(&self, dimension: Option<&[&str]>) -> Result<DataArray> {
        let dataset = self.dataset.read().squeeze(dimension)?;
        Self::new(dataset, self.name.clone())
    }

    /// Reduce over the named dimensions or the given axes. Every variable of the dataset
    /// along a dimension removed by the reduction is dropped.
    pub fn reduce<R: Reducer + ?Sized>(
        &self,
        reducer: &R,
        dimension: Option<&[&str]>,
        axis: Option<&[usize]>,
    ) -> Result<DataArray> {
        let dataset = self.snapshot();
        let variable = dataset.variable(&self.name)?;
        let reduced = variable.reduce(reducer, dimension, axis)?;

        let dropped: Vec<&String> = variable
            .dimensions()
            .iter()
            .filter(|&dimension| !reduced.dimensions().contains(dimension))
            .collect();
        if !dropped.is_empty() {
            debug!(
                array = %self.name,
                reducer = reducer.name(),
                dimensions = ?dropped,
                "dropping variables along reduced dimensions"
            );
        }

        let mut dataset = dataset.unselect(&dropped)?;
        dataset.insert(self.name.clone(), reduced)?;

        Self::new(dataset, self.name.clone())
    }

    reductions!(Sum, Mean, Min, Max, Prod, Std, Var);

    /// Join arrays along a new or existing dimension. Arrays named differently from the first
    /// are renamed to match it. Variables in `concat_over` are concatenated along with the
    /// arrays' own.
    pub fn concat(
        arrays: &[DataArray],
        dimension: &ConcatDimension,
        positions: Option<&[Vec<usize>]>,
        concat_over: &[&str],
    ) -> Result<DataArray> {
        let first = arrays
            .first()
            .ok_or_else(|| Error::usage("must supply at least one array to concatenate"))?;
        let name = first.name.clone();

        let datasets = arrays
            .iter()
            .map(|array| {
                if array.name == name {
                    Ok(array.snapshot())
                } else {
                    warn!(
                        from = %array.name,
                        to = %name,
                        "renaming array to match the first array being concatenated"
                    );
                    Ok(array.rename(name.as_str())?.snapshot())
                }
            })
            .collect::<Result<Vec<_>>>()?;

        let mut over: Vec<String> = concat_over.iter().map(ToString::to_string).collect();
        if !over.contains(&name) {
            over.push(name.clone());
        }

        Self::new(Dataset::concat(&datasets, dimension, positions, &over)?, name)
    }

    pub fn to_dataframe(&self) -> Result<DataFrame> {
        self.dataset.read().to_dataframe()
    }

    /// This array as a table: one column per dimension holding the product of its
    /// coordinate labels, then a column named after the array with its values flattened.
    pub fn to_series(&self) -> Result<DataFrame> {
        let index = MultiIndex::from_product(&self.coordinates()?.indexes()?);
        let mut columns = index.to_columns()?;
        columns.push(data_column(&self.name, &self.data()?.flatten())?);

        Ok(DataFrame::new(columns)?)
    }

    /// Inverse of `to_series`: the last column holds the values and every column before it
    /// is an index level. An unnamed values column is called `values`. Combinations missing
    /// from the table are filled with the missing value marker.
    pub fn from_series(series: &DataFrame) -> Result<DataArray> {
        let (values, levels) = series
            .get_columns()
            .split_last()
            .ok_or_else(|| Error::usage("a series needs a values column"))?;

        let names: Vec<&str> = levels.iter().map(|level| level.name().as_str()).collect();
        let index = MultiIndex::from_frame(series, &names)?;
        let name = match values.name().as_str() {
            "" => "values".to_string(),
            name => name.to_string(),
        };
        let data = column_data(values.as_materialized_series())?;

        Self::new(Dataset::from_table(&index, vec![(name.clone(), data)])?, name)
    }
}

impl fmt::Display for DataArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let variable = match self.variable() {
            Ok(variable) => variable,
            Err(_) => return write!(f, "<DataArray {:?} (missing)>", self.name),
        };

        let dimensions = variable
            .dimensions()
            .iter()
            .zip(variable.shape())
            .map(|(dimension, size)| format!("{dimension}: {size}"))
            .collect::<Vec<_>>();
        writeln!(f, "<DataArray {:?} ({})>", self.name, dimensions.join(", "))?;
        write!(f, "{}", variable.data())?;

        let coordinates = self.dataset.read().coordinates(variable.dimensions());
        if !coordinates.is_empty() {
            write!(f, "\n{coordinates}")?;
        }
        if !variable.attributes().is_empty() {
            f.write_str("\nAttributes:")?;
            for (name, value) in variable.attributes() {
                write!(f, "\n    {name}: {value}")?;
            }
        }

        Ok(())
    }
}

impl fmt::Debug for DataArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataArray")
            .field("name", &self.name)
            .field("dataset", &Arc::as_ptr(&self.dataset))
            .finish()
    }
}

/// Label based indexing of a [`DataArray`], see [`DataArray::loc`]
pub struct LocIndexer<'a> {
    array: &'a DataArray,
}

impl LocIndexer<'_> {
    fn positional_key(&self, key: Vec<LabelIndexer>) -> Result<Key> {
        let dimensions = self.array.dimensions()?;
        if key.len() > dimensions.len() {
            return Err(Error::usage(format!(
                "too many indices: {} given for {} dimensions",
                key.len(),
                dimensions.len()
            )));
        }

        let labels: IndexMap<String, LabelIndexer> = dimensions.iter().cloned().zip(key).collect();
        let positions = remap_label_indexers(&self.array.dataset.read(), &labels)?;

        Ok(Key::Positional(
            dimensions
                .iter()
                .map(|dimension| positions.get(dimension).cloned().unwrap_or(Indexer::Full))
                .collect(),
        ))
    }

    pub fn get(&self, key: Vec<LabelIndexer>) -> Result<DataArray> {
        self.array.get_item(self.positional_key(key)?)
    }

    pub fn set(&self, key: Vec<LabelIndexer>, value: Variable) -> Result<()> {
        self.array.set_item(self.positional_key(key)?, value)
    }
}

/// Iterator over the positions of the first dimension of a [`DataArray`]
pub struct Iter<'a> {
    array: &'a DataArray,
    position: usize,
    len: usize,
}

impl Iterator for Iter<'_> {
    type Item = Result<DataArray>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.len {
            return None;
        }

        let item = self
            .array
            .get_item(Indexer::Scalar(self.position as isize));
        self.position += 1;

        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.len - self.position;
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ndarray::{Array1, Array2};
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use crate::{indexing::Slice, testing};

    #[test]
    fn test_new() -> Result<()> {
        let dataset = testing::make_dataset()?;
        assert!(matches!(
            DataArray::new(dataset.clone(), "nope"),
            Err(Error::NameNotFound(name)) if name == "nope"
        ));

        let array = DataArray::new(dataset, "foo")?;
        assert_eq!(array.name(), "foo");
        assert_eq!(array.dimensions()?, vec!["time", "x"]);
        assert_eq!(array.shape()?, vec![3, 4]);
        assert_eq!(array.size()?, 12);
        assert_eq!(array.ndim()?, 2);
        assert_eq!(array.len()?, 3);
        assert_eq!(array.dtype()?, DType::F64);
        assert!(!array.is_coordinate()?);
        assert_eq!(array.attributes()?["units"].to_string(), "m");
        assert_eq!(array.coordinates()?.keys().collect::<Vec<_>>(), vec!["time", "x"]);

        Ok(())
    }

    #[test]
    fn test_virtual_focus() -> Result<()> {
        let array = DataArray::new(testing::make_time_dataset()?, "t.dayofyear")?;
        assert_eq!(array.dimensions()?, vec!["t"]);
        assert_eq!(array.dtype()?, DType::I64);
        assert_eq!(array.coordinates()?.len(), 1);

        Ok(())
    }

    #[test]
    fn test_from_variable() -> Result<()> {
        let array = DataArray::from_variable("v", Variable::new(["a"], vec![1.0, 2.0])?)?;
        assert_eq!(array.index()?, Index::from(vec![1.0, 2.0]));
        assert_eq!(array.coordinates()?.index("a")?, Index::from(vec![0i64, 1]));

        Ok(())
    }

    #[test]
    fn test_get_item_by_name_shares_dataset() -> Result<()> {
        let array = testing::make_array()?;
        let x = array.get_item("x")?;
        assert!(x.same_dataset(&array));
        assert!(x.is_coordinate()?);
        assert!(matches!(array.get_item("nope"), Err(Error::NameNotFound(_))));

        Ok(())
    }

    #[test]
    fn test_get_item_positional() -> Result<()> {
        let array = testing::make_array()?;

        let row = array.get_item(Indexer::Scalar(1))?;
        assert!(!row.same_dataset(&array));
        assert_eq!(row.dimensions()?, vec!["x"]);
        assert_eq!(row.data()?, Data::from(vec![4.0, 5.0, 6.0, 7.0]));
        assert_eq!(row.get_item("time")?.ndim()?, 0);

        let block = array.get_item(vec![
            Indexer::Ellipsis,
            Indexer::Slice(Slice::new(None, None, -2)),
        ])?;
        assert_eq!(block.shape()?, vec![3, 2]);
        assert_eq!(block.coordinates()?.index("x")?, Index::from(vec![40i64, 20]));

        assert!(matches!(
            array.get_item(vec![Indexer::Scalar(0); 3]),
            Err(Error::Usage(_))
        ));
        assert!(matches!(
            array.get_item(Indexer::Scalar(3)),
            Err(Error::IndexOutOfBounds { dimension, .. }) if dimension == "time"
        ));

        Ok(())
    }

    #[test]
    fn test_set_item() -> Result<()> {
        let array = testing::make_array()?;
        let alias = array.clone();

        array.set_item(
            vec![Indexer::Scalar(0), Indexer::Array(vec![0, 1])],
            Variable::scalar(-1.0),
        )?;
        let data = alias.data()?;
        let values = data.as_f64().unwrap();
        assert_eq!(values[[0, 0]], -1.0);
        assert_eq!(values[[0, 1]], -1.0);
        assert_eq!(values[[0, 2]], 2.0);

        array.set_item("qux", Variable::new(["x"], vec![0.0; 4])?)?;
        assert!(alias.contains("qux"));

        array.delete_item("qux")?;
        assert!(!alias.contains("qux"));
        assert!(matches!(array.delete_item("qux"), Err(Error::NameNotFound(_))));

        Ok(())
    }

    #[test]
    fn test_loc() -> Result<()> {
        let array = testing::make_array()?;

        let selected = array.loc().get(vec![
            LabelIndexer::Full,
            LabelIndexer::labels([30i64, 10]),
        ])?;
        assert_eq!(selected.shape()?, vec![3, 2]);
        let row = selected.get_item(vec![Indexer::Scalar(0)])?;
        assert_eq!(row.data()?, Data::from(vec![2.0, 0.0]));

        let value = array.loc().get(vec![LabelIndexer::from(2i64), LabelIndexer::from(40i64)])?;
        assert_eq!(value.data()?, Data::scalar(11.0));

        array.loc().set(vec![LabelIndexer::from(1i64)], Variable::scalar(0.0))?;
        let data = array.data()?;
        assert!(data.as_f64().unwrap().index_axis(ndarray::Axis(0), 1).iter().all(|&v| v == 0.0));

        assert!(matches!(
            array.loc().get(vec![LabelIndexer::from(7i64)]),
            Err(Error::LabelNotFound { dimension, .. }) if dimension == "time"
        ));

        Ok(())
    }

    #[test]
    fn test_iter() -> Result<()> {
        let array = testing::make_array()?;
        let rows = array.iter()?.collect::<Result<Vec<_>>>()?;
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].data()?, Data::from(vec![8.0, 9.0, 10.0, 11.0]));

        let scalar = array.get_item(vec![Indexer::Scalar(0), Indexer::Scalar(0)])?;
        assert!(scalar.iter().is_err());

        Ok(())
    }

    #[test]
    fn test_copy_is_isolated() -> Result<()> {
        let array = testing::make_array()?;
        for deep in [false, true] {
            let copy = array.copy(deep)?;
            assert!(!copy.same_dataset(&array));
            copy.set_data(Data::F64(Array2::zeros((3, 4)).into_dyn()))?;
            assert_eq!(array.data()?.as_f64().unwrap()[[2, 3]], 11.0);
        }

        Ok(())
    }

    #[test]
    fn test_reindex() -> Result<()> {
        let array = testing::make_array()?;
        let targets = IndexMap::from([("x".to_string(), Index::from(vec![20i64, 25]))]);
        let reindexed = array.reindex(true, &targets)?;

        assert_eq!(
            reindexed.variables().keys().collect::<Vec<_>>(),
            vec!["time", "x", "foo"]
        );
        let data = reindexed.data()?;
        let values = data.as_f64().unwrap();
        assert_eq!(values[[1, 0]], 5.0);
        assert!(values[[1, 1]].is_nan());

        let other = array.get_item(vec![Indexer::Full, Indexer::Array(vec![3, 0])])?;
        let like = array.reindex_like(&other, true)?;
        assert_eq!(like.coordinates()?.index("x")?, Index::from(vec![40i64, 10]));
        assert_eq!(like.get_item(vec![Indexer::Scalar(0)])?.data()?, Data::from(vec![3.0, 0.0]));

        Ok(())
    }

    #[test]
    fn test_rename() -> Result<()> {
        let array = testing::make_array()?;

        let renamed = array.rename("spam")?;
        assert_eq!(renamed.name(), "spam");
        assert!(!renamed.contains("foo"));
        assert!(array.contains("foo"));

        let mapping = IndexMap::from([
            ("x".to_string(), "lon".to_string()),
            ("foo".to_string(), "eggs".to_string()),
        ]);
        let renamed = array.rename(mapping)?;
        assert_eq!(renamed.name(), "eggs");
        assert_eq!(renamed.dimensions()?, vec!["time", "lon"]);

        let mapping = IndexMap::from([("x".to_string(), "lon".to_string())]);
        assert_eq!(array.rename(mapping)?.name(), "foo");

        Ok(())
    }

    #[test]
    fn test_select_and_unselect() -> Result<()> {
        let array = testing::make_array()?;

        let selected = array.select::<&str>(&[])?;
        assert_eq!(
            selected.variables().keys().collect::<Vec<_>>(),
            vec!["time", "x", "foo"]
        );
        let selected = array.select(&["baz"])?;
        assert_eq!(
            selected.variables().keys().collect::<Vec<_>>(),
            vec!["time", "x", "foo", "baz"]
        );

        let unselected = array.unselect(&["bar", "baz"])?;
        assert_eq!(
            unselected.variables().keys().collect::<Vec<_>>(),
            vec!["time", "x", "foo"]
        );
        assert!(matches!(array.unselect(&["foo"]), Err(Error::Usage(_))));
        assert!(matches!(array.unselect(&["nope"]), Err(Error::NameNotFound(_))));

        Ok(())
    }

    #[test]
    fn test_transpose() -> Result<()> {
        let array = testing::make_array()?;
        let transposed = array.transpose(&[])?;
        assert_eq!(transposed.dimensions()?, vec!["x", "time"]);
        assert_eq!(transposed.data()?.as_f64().unwrap()[[3, 2]], 11.0);
        assert_eq!(array.dimensions()?, vec!["time", "x"]);

        assert!(array.transpose(&["time"]).is_err());

        Ok(())
    }

    #[test]
    fn test_squeeze() -> Result<()> {
        let array = testing::make_array()?;
        let single = array.get_item(vec![Indexer::Array(vec![1])])?;
        assert_eq!(single.shape()?, vec![1, 4]);

        let squeezed = single.squeeze(None)?;
        assert_eq!(squeezed.dimensions()?, vec!["x"]);
        assert!(matches!(
            array.squeeze(Some(&["x"])),
            Err(Error::Shape { length: 4, .. })
        ));

        Ok(())
    }

    #[test]
    fn test_reduce_drops_dependent_variables() -> Result<()> {
        let array = testing::make_array()?;

        let reduced = array.mean(Some(&["x"]))?;
        assert_eq!(reduced.dimensions()?, vec!["time"]);
        assert_eq!(reduced.data()?, Data::from(vec![1.5, 5.5, 9.5]));
        assert_eq!(
            reduced.variables().keys().collect::<Vec<_>>(),
            vec!["time", "baz", "foo"]
        );

        let total = array.sum(None)?;
        assert_eq!(total.data()?, Data::scalar(66.0));
        assert_eq!(total.variables().keys().collect::<Vec<_>>(), vec!["foo"]);

        let by_axis = array.reduce(&ReduceOp::Max, None, Some(&[0]))?;
        assert_eq!(by_axis.data()?, Data::from(vec![8.0, 9.0, 10.0, 11.0]));
        assert!(by_axis.contains("bar"));
        assert!(!by_axis.contains("baz"));

        assert!(matches!(
            array.reduce(&ReduceOp::Sum, Some(&["x"]), Some(&[1])),
            Err(Error::Usage(_))
        ));

        Ok(())
    }

    #[test]
    fn test_concat() -> Result<()> {
        let array = testing::make_array()?;
        let first = array.get_item(vec![Indexer::Slice(Slice::range(0, 2))])?;
        let second = array.get_item(vec![Indexer::Slice(Slice::range(2, 3))])?;

        let pieces = [first.clone(), second.clone()];
        let joined = DataArray::concat(&pieces, &"time".into(), None, &["baz"])?;
        assert_eq!(joined.data()?, array.data()?);
        assert_eq!(joined.coordinates()?.index("time")?, Index::from(vec![0i64, 1, 2]));

        let renamed = second.rename("other")?;
        let joined = DataArray::concat(&[first, renamed], &"time".into(), None, &["baz"])?;
        assert_eq!(joined.name(), "foo");
        assert_eq!(joined.shape()?, vec![3, 4]);

        assert!(matches!(
            DataArray::concat(&[], &"time".into(), None, &[]),
            Err(Error::Usage(_))
        ));

        Ok(())
    }

    #[test]
    fn test_series_round_trip() -> Result<()> {
        let array = testing::make_array()?;
        let series = array.to_series()?;
        assert_eq!(series.height(), 12);
        assert_eq!(
            series.get_column_names().iter().map(|name| name.as_str()).collect::<Vec<_>>(),
            vec!["time", "x", "foo"]
        );
        assert_eq!(array.to_dataframe()?.width(), 5);

        let restored = DataArray::from_series(&series)?;
        assert_eq!(restored.name(), "foo");
        assert!(restored.variable()?.equals(&*array.variable()?));
        for dimension in ["time", "x"] {
            assert!(restored
                .coordinates()?
                .index(dimension)?
                .equals(&array.coordinates()?.index(dimension)?));
        }

        Ok(())
    }

    #[test]
    fn test_series_round_trip_random() -> Result<()> {
        let mut rng = StdRng::seed_from_u64(17);
        let values: Vec<f64> = (0..10).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let mut labels: Vec<i64> = (0..10).map(|i| i * 7 - 20).collect();
        labels.sort();

        let dataset = Dataset::from_variables([
            ("a", Variable::new(["a"], Array1::from(labels))?),
            ("v", Variable::new(["a"], values)?),
        ])?;
        let array = DataArray::new(dataset, "v")?;

        let series = array.to_series()?;
        let restored = DataArray::from_series(&series)?;
        assert!(restored.variable()?.equals(&*array.variable()?));
        assert_eq!(restored.index()?.len(), 10);

        let mut unnamed = series.clone();
        unnamed.rename("v", "".into())?;
        assert_eq!(DataArray::from_series(&unnamed)?.name(), "values");
        assert!(DataArray::from_series(&DataFrame::empty()).is_err());

        let variable = Variable::new(Vec::<String>::new(), Data::scalar(2.5))?;
        let scalar = DataArray::from_variable("s", variable)?;
        let restored = DataArray::from_series(&scalar.to_series()?)?;
        assert_eq!(restored.data()?, Data::scalar(2.5));

        Ok(())
    }

    #[test]
    fn test_display() -> Result<()> {
        let array = testing::make_array()?;
        let text = array.to_string();
        assert!(text.starts_with("<DataArray \"foo\" (time: 3, x: 4)>"));
        assert!(text.contains("Coordinates:"));
        assert!(text.contains("units: m"));

        array.delete_item("foo")?;
        assert_eq!(array.to_string(), "<DataArray \"foo\" (missing)>");
        assert!(matches!(array.variable(), Err(Error::NameNotFound(_))));

        Ok(())
    }
}
