use std::{
    cmp::Ordering,
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use chrono::{DateTime, Utc};
use ndarray::Array1;
use num_traits::{cast, NumCast};

use crate::{
    data::{Data, NAT},
    dtype::DType,
    errors::{Error, Result},
};

/// A single coordinate label.
///
/// Integer and floating point labels compare numerically with each other, so an `I64`
/// coordinate can be looked up with float labels and vice versa. Floats use a total order in
/// which NaN equals NaN.
#[derive(Clone, Copy, Debug)]
pub enum Label {
    Int(i64),
    Float(f64),

    /// Seconds since the Unix epoch
    Time(i64),
}

impl Label {
    pub fn dtype(&self) -> DType {
        match self {
            Self::Int(_) => DType::I64,
            Self::Float(_) => DType::F64,
            Self::Time(_) => DType::Time,
        }
    }

    pub fn cast<T: NumCast>(&self) -> Option<T> {
        match *self {
            Self::Int(value) | Self::Time(value) => cast(value),
            Self::Float(value) => cast(value),
        }
    }

    fn kind(&self) -> u8 {
        match self {
            Self::Int(_) | Self::Float(_) => 0,
            Self::Time(_) => 1,
        }
    }
}

/// Exact comparison, consistent with the total order of floats
fn cmp_int_float(int: i64, float: f64) -> Ordering {
    // 2^63, the first float above every i64
    const BOUND: f64 = 9_223_372_036_854_775_808.0;

    if float.is_nan() {
        return if float.is_sign_negative() { Ordering::Greater } else { Ordering::Less };
    }
    if float >= BOUND {
        return Ordering::Less;
    }
    if float < -BOUND {
        return Ordering::Greater;
    }

    let whole = float.trunc();
    let fraction = float - whole;
    int.cmp(&(whole as i64)).then_with(|| {
        if fraction > 0.0 {
            Ordering::Less
        } else if fraction < 0.0 || (int == 0 && float.is_sign_negative()) {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    })
}

impl Ord for Label {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) | (Self::Time(a), Self::Time(b)) => a.cmp(b),
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
            (Self::Int(a), Self::Float(b)) => cmp_int_float(*a, *b),
            (Self::Float(a), Self::Int(b)) => cmp_int_float(*b, *a).reverse(),
            _ => self.kind().cmp(&other.kind()),
        }
    }
}

impl PartialOrd for Label {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Label {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Label {}

impl From<i32> for Label {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<i64> for Label {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Label {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Time(NAT) => f.write_str("NaT"),
            Self::Time(seconds) => match DateTime::<Utc>::from_timestamp(*seconds, 0) {
                Some(time) => write!(f, "{}", time.format("%Y-%m-%dT%H:%M:%S")),
                None => write!(f, "{seconds}s"),
            },
        }
    }
}

/// The label index of a coordinate variable
#[derive(Clone, Debug, PartialEq)]
pub struct Index {
    dtype: DType,
    labels: Vec<Label>,
}

impl Index {
    /// Index of one dimensional data
    pub fn new(data: &Data) -> Result<Self> {
        if data.ndim() != 1 {
            return Err(Error::usage(format!(
                "an index requires one dimensional data, got {} dimensions",
                data.ndim()
            )));
        }

        Ok(Self {
            dtype: data.dtype(),
            labels: data.labels(),
        })
    }

    pub fn from_labels(dtype: DType, labels: Vec<Label>) -> Self {
        Self { dtype, labels }
    }

    pub fn time(seconds: Vec<i64>) -> Self {
        Self {
            dtype: DType::Time,
            labels: seconds.into_iter().map(Label::Time).collect(),
        }
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Whether both indexes hold the same labels in the same order
    pub fn equals(&self, other: &Index) -> bool {
        self.labels == other.labels
    }

    /// Position of the first occurrence of `label`
    pub fn get_loc(&self, label: &Label) -> Option<usize> {
        self.labels.iter().position(|candidate| candidate == label)
    }

    /// For each label of `target`, its position in this index, if present
    pub fn get_indexer(&self, target: &Index) -> Vec<Option<usize>> {
        let mut positions = BTreeMap::new();
        for (position, label) in self.labels.iter().enumerate() {
            positions.entry(*label).or_insert(position);
        }

        target
            .labels
            .iter()
            .map(|label| positions.get(label).copied())
            .collect()
    }

    /// Sorted, de-duplicated labels of both indexes
    pub fn union(&self, other: &Index) -> Result<Index> {
        let dtype = self.dtype.promote(other.dtype)?;
        let labels: BTreeSet<Label> = self.labels.iter().chain(&other.labels).copied().collect();

        Ok(Self {
            dtype,
            labels: labels.into_iter().collect(),
        })
    }

    /// Labels of this index also found in `other`, in this index's order
    pub fn intersection(&self, other: &Index) -> Result<Index> {
        let dtype = self.dtype.promote(other.dtype)?;
        let theirs: BTreeSet<Label> = other.labels.iter().copied().collect();
        let mut seen = BTreeSet::new();
        let labels = self
            .labels
            .iter()
            .filter(|label| theirs.contains(label) && seen.insert(**label))
            .copied()
            .collect();

        Ok(Self { dtype, labels })
    }

    /// Sorted distinct labels
    pub fn unique(&self) -> Index {
        let labels: BTreeSet<Label> = self.labels.iter().copied().collect();
        Self {
            dtype: self.dtype,
            labels: labels.into_iter().collect(),
        }
    }

    pub fn is_monotonic_increasing(&self) -> bool {
        self.labels.windows(2).all(|pair| pair[0] <= pair[1])
    }

    /// The labels as one dimensional data of this index's dtype
    pub fn to_data(&self) -> Result<Data> {
        let dtype = self.dtype;
        Ok(match dtype {
            DType::I32 => Data::I32(collect_labels(&self.labels, dtype)?),
            DType::I64 => Data::I64(collect_labels(&self.labels, dtype)?),
            DType::F32 => Data::F32(collect_labels(&self.labels, dtype)?),
            DType::F64 => Data::F64(collect_labels(&self.labels, dtype)?),
            DType::Time => Data::Time(collect_labels(&self.labels, dtype)?),
        })
    }
}

fn collect_labels<T: NumCast>(labels: &[Label], dtype: DType) -> Result<ndarray::ArrayD<T>> {
    let values = labels
        .iter()
        .map(|label| {
            label.cast::<T>().ok_or(Error::Cast {
                from: label.dtype(),
                to: dtype,
            })
        })
        .collect::<Result<Vec<T>>>()?;

    Ok(Array1::from(values).into_dyn())
}

macro_rules! index_from {
    ($type:ty) => {
        impl From<Vec<$type>> for Index {
            fn from(values: Vec<$type>) -> Self {
                // Index::new only fails for data that isn't one dimensional
                let data = Data::from(values);
                Self {
                    dtype: data.dtype(),
                    labels: data.labels(),
                }
            }
        }
    };
}

index_from!(i32);
index_from!(i64);
index_from!(f32);
index_from!(f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_order() {
        assert!(Label::Int(1) < Label::Float(1.5));
        assert_eq!(Label::Int(2), Label::Float(2.0));
        assert_eq!(Label::Float(f64::NAN), Label::Float(f64::NAN));
        assert!(Label::Int(i64::MAX) < Label::Time(0));
    }

    #[test]
    fn test_label_order_beyond_float_precision() {
        let big = 1i64 << 53;
        assert!(Label::Int(big + 1) > Label::Float(big as f64));
        assert!(Label::Float(big as f64) < Label::Int(big + 1));
        assert_eq!(Label::Int(big), Label::Float(big as f64));
        assert!(Label::Int(i64::MAX) < Label::Float(i64::MAX as f64));
        assert_eq!(Label::Int(i64::MIN), Label::Float(i64::MIN as f64));
        assert!(Label::Int(-3) > Label::Float(-3.5));
        assert!(Label::Int(0) > Label::Float(-0.0));
        assert!(Label::Int(i64::MIN) < Label::Float(f64::NAN));
        assert!(Label::Int(i64::MIN) > Label::Float(f64::NEG_INFINITY));

        let labels = vec![Label::Int(big + 1), Label::Float(big as f64), Label::Int(big - 1)];
        let sorted: BTreeSet<Label> = labels.into_iter().collect();
        assert_eq!(sorted.len(), 3);
    }

    #[test]
    fn test_label_display() {
        assert_eq!(Label::Int(3).to_string(), "3");
        assert_eq!(Label::Time(86400).to_string(), "1970-01-02T00:00:00");
        assert_eq!(Label::Time(NAT).to_string(), "NaT");
    }

    #[test]
    fn test_join() -> Result<()> {
        let a = Index::from(vec![1, 2, 3]);
        let b = Index::from(vec![2, 3, 4]);

        assert_eq!(a.union(&b)?, Index::from(vec![1, 2, 3, 4]));
        assert_eq!(a.intersection(&b)?, Index::from(vec![2, 3]));
        assert_eq!(b.intersection(&a)?, Index::from(vec![2, 3]));

        let c = Index::from(vec![3.5]);
        let joined = a.union(&c)?;
        assert_eq!(joined.dtype(), DType::F64);
        assert_eq!(joined.to_data()?, Data::from(vec![1.0, 2.0, 3.0, 3.5]));

        assert!(a.union(&Index::time(vec![0])).is_err());

        Ok(())
    }

    #[test]
    fn test_intersection_keeps_order() -> Result<()> {
        let a = Index::from(vec![5, 1, 3, 1]);
        let b = Index::from(vec![1, 3, 5]);
        assert_eq!(a.intersection(&b)?, Index::from(vec![5, 1, 3]));

        Ok(())
    }

    #[test]
    fn test_get_indexer() {
        let index = Index::from(vec![10, 20, 30, 20]);
        let target = Index::from(vec![20.0, 40.0, 10.0]);
        assert_eq!(index.get_indexer(&target), vec![Some(1), None, Some(0)]);
        assert_eq!(index.get_loc(&Label::Int(30)), Some(2));
        assert_eq!(index.get_loc(&Label::Int(31)), None);
    }

    #[test]
    fn test_equals() {
        let a = Index::from(vec![1.0, f64::NAN]);
        assert!(a.equals(&a.clone()));
        assert!(!a.equals(&Index::from(vec![1.0])));
        assert!(Index::from(vec![1, 2]).equals(&Index::from(vec![1i64, 2])));
    }

    #[test]
    fn test_unique_and_monotonic() {
        let index = Index::from(vec![3, 1, 3, 2]);
        assert!(!index.is_monotonic_increasing());
        let unique = index.unique();
        assert_eq!(unique, Index::from(vec![1, 2, 3]));
        assert!(unique.is_monotonic_increasing());
    }

    #[test]
    fn test_new_requires_one_dimension() {
        assert!(Index::new(&Data::scalar(1.0)).is_err());
    }
}
