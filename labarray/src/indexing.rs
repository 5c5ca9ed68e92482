use indexmap::IndexMap;

use crate::{
    dataset::Dataset,
    errors::{Error, Result},
    index::{Index, Label},
};

/// The key of a `get_item`/`set_item` call, resolved once at the API boundary
#[derive(Clone, Debug, PartialEq)]
pub enum Key {
    /// A variable of the dataset
    Name(String),

    /// Positional indexers, one per leading dimension of the focus variable
    Positional(Vec<Indexer>),
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<Vec<Indexer>> for Key {
    fn from(indexers: Vec<Indexer>) -> Self {
        Self::Positional(indexers)
    }
}

impl From<Indexer> for Key {
    fn from(indexer: Indexer) -> Self {
        Self::Positional(vec![indexer])
    }
}

/// A slice with Python semantics: negative bounds count from the end, the stop is
/// exclusive and the step may be negative.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Slice {
    pub start: Option<isize>,
    pub stop: Option<isize>,
    pub step: isize,
}

impl Slice {
    pub fn new(start: Option<isize>, stop: Option<isize>, step: isize) -> Self {
        Self { start, stop, step }
    }

    pub fn range(start: isize, stop: isize) -> Self {
        Self::new(Some(start), Some(stop), 1)
    }

    /// The positions selected from an axis of length `size`
    pub fn indices(&self, size: usize) -> Result<Vec<usize>> {
        if self.step == 0 {
            return Err(Error::usage("slice step cannot be zero"));
        }

        let size = size as isize;
        let (lower, upper) = if self.step > 0 { (0, size) } else { (-1, size - 1) };
        let clamp = |bound: isize| {
            let bound = if bound < 0 { bound + size } else { bound };
            bound.clamp(lower, upper)
        };

        let (start, stop) = if self.step > 0 {
            (self.start.map_or(0, clamp), self.stop.map_or(size, clamp))
        } else {
            (
                self.start.map_or(size - 1, clamp),
                self.stop.map_or(-1, clamp),
            )
        };

        let mut positions = vec![];
        let mut position = Some(start);
        while let Some(current) = position {
            if (self.step > 0 && current >= stop) || (self.step < 0 && current <= stop) {
                break;
            }
            positions.push(current as usize);
            position = current.checked_add(self.step);
        }

        Ok(positions)
    }
}

/// Positional indexer for a single dimension
#[derive(Clone, Debug, PartialEq)]
pub enum Indexer {
    /// Select one position, dropping the dimension
    Scalar(isize),
    Slice(Slice),
    Array(Vec<isize>),
    Mask(Vec<bool>),
    Full,

    /// Stands for as many `Full` indexers as are needed to cover the remaining dimensions
    Ellipsis,
}

impl Indexer {
    /// Resolve against a dimension of length `size`, checking bounds.
    pub fn resolve(&self, dimension: &str, size: usize) -> Result<Selection> {
        let position = |index: isize| {
            let wrapped = if index < 0 { index + size as isize } else { index };
            if wrapped < 0 || wrapped >= size as isize {
                Err(Error::IndexOutOfBounds {
                    dimension: dimension.to_string(),
                    index,
                    size,
                })
            } else {
                Ok(wrapped as usize)
            }
        };

        Ok(match self {
            Self::Scalar(index) => Selection::Scalar(position(*index)?),
            Self::Slice(slice) => Selection::Positions(slice.indices(size)?),
            Self::Array(indices) => Selection::Positions(
                indices
                    .iter()
                    .map(|&index| position(index))
                    .collect::<Result<_>>()?,
            ),
            Self::Mask(mask) => {
                if mask.len() != size {
                    return Err(Error::DimensionSize {
                        dimension: dimension.to_string(),
                        expected: size,
                        found: mask.len(),
                    });
                }
                Selection::Positions(
                    mask.iter()
                        .enumerate()
                        .filter_map(|(i, &keep)| keep.then_some(i))
                        .collect(),
                )
            }
            Self::Full => Selection::Full,
            Self::Ellipsis => {
                return Err(Error::usage(format!(
                    "ellipsis must be expanded before indexing dimension {dimension:?}"
                )))
            }
        })
    }
}

impl From<isize> for Indexer {
    fn from(index: isize) -> Self {
        Self::Scalar(index)
    }
}

impl From<Slice> for Indexer {
    fn from(slice: Slice) -> Self {
        Self::Slice(slice)
    }
}

impl From<Vec<isize>> for Indexer {
    fn from(indices: Vec<isize>) -> Self {
        Self::Array(indices)
    }
}

impl From<Vec<bool>> for Indexer {
    fn from(mask: Vec<bool>) -> Self {
        Self::Mask(mask)
    }
}

/// A resolved, in-bounds selection along one axis
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selection {
    Full,
    Scalar(usize),
    Positions(Vec<usize>),
}

/// Expand a positional key to exactly one indexer per dimension.
pub fn expanded_indexer(key: Vec<Indexer>, ndim: usize) -> Result<Vec<Indexer>> {
    let ellipses = key.iter().filter(|&indexer| indexer == &Indexer::Ellipsis).count();
    if ellipses > 1 {
        return Err(Error::usage("an index can only have a single ellipsis"));
    }

    let explicit = key.len() - ellipses;
    if explicit > ndim {
        return Err(Error::usage(format!(
            "too many indices: {explicit} given for {ndim} dimensions"
        )));
    }

    let mut expanded = Vec::with_capacity(ndim);
    for indexer in key {
        if indexer == Indexer::Ellipsis {
            expanded.extend((0..ndim - explicit).map(|_| Indexer::Full));
        } else {
            expanded.push(indexer);
        }
    }
    expanded.resize(ndim, Indexer::Full);

    Ok(expanded)
}

/// Label based indexer for a single dimension
#[derive(Clone, Debug, PartialEq)]
pub enum LabelIndexer {
    Label(Label),

    /// Both bounds are inclusive
    Slice {
        start: Option<Label>,
        stop: Option<Label>,
    },
    Labels(Vec<Label>),
    Mask(Vec<bool>),
    Full,
}

impl LabelIndexer {
    pub fn slice<L: Into<Label>>(start: L, stop: L) -> Self {
        Self::Slice {
            start: Some(start.into()),
            stop: Some(stop.into()),
        }
    }

    pub fn labels<L: Into<Label>>(labels: impl IntoIterator<Item = L>) -> Self {
        Self::Labels(labels.into_iter().map(Into::into).collect())
    }

    /// Map labels to positions using the index of `dimension`'s coordinate.
    pub fn to_indexer(&self, dimension: &str, index: &Index) -> Result<Indexer> {
        let locate = |label: &Label| {
            index.get_loc(label).ok_or_else(|| Error::LabelNotFound {
                dimension: dimension.to_string(),
                label: label.to_string(),
            })
        };

        Ok(match self {
            Self::Label(label) => Indexer::Scalar(locate(label)? as isize),
            Self::Labels(labels) => Indexer::Array(
                labels
                    .iter()
                    .map(|label| locate(label).map(|position| position as isize))
                    .collect::<Result<_>>()?,
            ),
            Self::Mask(mask) => Indexer::Mask(mask.clone()),
            Self::Full => Indexer::Full,
            Self::Slice { start, stop } => {
                let labels = index.labels();
                let (first, last) = if index.is_monotonic_increasing() {
                    (
                        start.map_or(0, |start| labels.partition_point(|label| label < &start)),
                        stop.map_or(labels.len(), |stop| {
                            labels.partition_point(|label| label <= &stop)
                        }),
                    )
                } else {
                    (
                        start.as_ref().map_or(Ok(0), locate)?,
                        stop.as_ref()
                            .map_or(Ok(labels.len()), |stop| locate(stop).map(|stop| stop + 1))?,
                    )
                };

                Indexer::Slice(Slice::range(first as isize, last.max(first) as isize))
            }
        })
    }
}

impl From<Label> for LabelIndexer {
    fn from(label: Label) -> Self {
        Self::Label(label)
    }
}

impl From<i64> for LabelIndexer {
    fn from(label: i64) -> Self {
        Self::Label(Label::Int(label))
    }
}

impl From<f64> for LabelIndexer {
    fn from(label: f64) -> Self {
        Self::Label(Label::Float(label))
    }
}

/// Translate label indexers to positional indexers along the dataset's coordinates.
pub fn remap_label_indexers(
    dataset: &Dataset,
    indexers: &IndexMap<String, LabelIndexer>,
) -> Result<IndexMap<String, Indexer>> {
    indexers
        .iter()
        .map(|(dimension, indexer)| {
            let index = dataset.coordinate_index(dimension)?;
            Ok((dimension.clone(), indexer.to_indexer(dimension, &index)?))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_indices() -> Result<()> {
        assert_eq!(Slice::range(1, 3).indices(5)?, vec![1, 2]);
        assert_eq!(Slice::new(None, None, 2).indices(5)?, vec![0, 2, 4]);
        assert_eq!(Slice::new(Some(-2), None, 1).indices(5)?, vec![3, 4]);
        assert_eq!(Slice::new(None, None, -1).indices(3)?, vec![2, 1, 0]);
        assert_eq!(Slice::new(Some(3), Some(0), -2).indices(5)?, vec![3, 1]);
        assert_eq!(Slice::range(4, 100).indices(5)?, vec![4]);
        assert!(Slice::range(3, 1).indices(5)?.is_empty());
        assert!(Slice::new(None, None, 0).indices(5).is_err());

        Ok(())
    }

    #[test]
    fn test_slice_extreme_steps() -> Result<()> {
        assert_eq!(Slice::new(Some(1), None, isize::MAX).indices(5)?, vec![1]);
        assert_eq!(Slice::new(None, None, isize::MAX).indices(5)?, vec![0]);
        assert_eq!(Slice::new(Some(3), None, isize::MIN).indices(5)?, vec![3]);
        assert_eq!(Slice::new(None, None, isize::MIN).indices(5)?, vec![4]);
        assert!(Slice::new(None, None, isize::MAX).indices(0)?.is_empty());

        Ok(())
    }

    #[test]
    fn test_resolve() -> Result<()> {
        assert_eq!(Indexer::Scalar(-1).resolve("x", 4)?, Selection::Scalar(3));
        assert_eq!(
            Indexer::Array(vec![0, -1]).resolve("x", 4)?,
            Selection::Positions(vec![0, 3])
        );
        assert_eq!(
            Indexer::Mask(vec![true, false, true]).resolve("x", 3)?,
            Selection::Positions(vec![0, 2])
        );

        match Indexer::Scalar(4).resolve("x", 4) {
            Err(Error::IndexOutOfBounds {
                dimension,
                index,
                size,
            }) => {
                assert_eq!(dimension, "x");
                assert_eq!(index, 4);
                assert_eq!(size, 4);
            }
            other => panic!("unexpected {other:?}"),
        }

        assert!(matches!(
            Indexer::Mask(vec![true]).resolve("x", 3),
            Err(Error::DimensionSize { .. })
        ));

        Ok(())
    }

    #[test]
    fn test_expanded_indexer() -> Result<()> {
        let key = vec![Indexer::Ellipsis, Indexer::Scalar(0)];
        assert_eq!(
            expanded_indexer(key, 3)?,
            vec![Indexer::Full, Indexer::Full, Indexer::Scalar(0)]
        );

        let key = vec![Indexer::Scalar(1)];
        assert_eq!(
            expanded_indexer(key, 2)?,
            vec![Indexer::Scalar(1), Indexer::Full]
        );

        let key = vec![Indexer::Scalar(1), Indexer::Scalar(1)];
        assert!(matches!(expanded_indexer(key, 1), Err(Error::Usage(_))));

        let key = vec![Indexer::Ellipsis, Indexer::Ellipsis];
        assert!(expanded_indexer(key, 2).is_err());

        Ok(())
    }

    #[test]
    fn test_label_to_indexer() -> Result<()> {
        let index = Index::from(vec![10, 20, 30, 40]);

        assert_eq!(
            LabelIndexer::from(30i64).to_indexer("x", &index)?,
            Indexer::Scalar(2)
        );
        assert_eq!(
            LabelIndexer::labels([40, 10]).to_indexer("x", &index)?,
            Indexer::Array(vec![3, 0])
        );
        assert_eq!(
            LabelIndexer::slice(15, 30).to_indexer("x", &index)?,
            Indexer::Slice(Slice::range(1, 3))
        );

        match LabelIndexer::from(25i64).to_indexer("x", &index) {
            Err(Error::LabelNotFound { dimension, label }) => {
                assert_eq!(dimension, "x");
                assert_eq!(label, "25");
            }
            other => panic!("unexpected {other:?}"),
        }

        Ok(())
    }

    #[test]
    fn test_label_slice_unsorted() -> Result<()> {
        let index = Index::from(vec![30, 10, 20]);
        assert_eq!(
            LabelIndexer::slice(10, 20).to_indexer("x", &index)?,
            Indexer::Slice(Slice::range(1, 3))
        );
        assert!(LabelIndexer::slice(10, 25).to_indexer("x", &index).is_err());

        Ok(())
    }
}
