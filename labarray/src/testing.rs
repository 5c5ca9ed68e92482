use ndarray::Array2;

use crate::{
    data_array::DataArray,
    dataset::Dataset,
    errors::Result,
    range::TimeRange,
    variable::{Attributes, Variable},
};

/// Dimensions `time` (3) and `x` (4), with coordinates `time = [0, 1, 2]` and
/// `x = [10, 20, 30, 40]`, `foo(time, x) = 0..12`, `bar(x)` (int32) and `baz(time)`.
pub(crate) fn make_dataset() -> Result<Dataset> {
    let mut units = Attributes::new();
    units.insert("units".to_string(), "m".into());

    let foo = Array2::from_shape_fn((3, 4), |(i, j)| (i * 4 + j) as f64).into_dyn();

    Dataset::from_variables([
        ("time", Variable::new(["time"], vec![0i64, 1, 2])?),
        ("x", Variable::new(["x"], vec![10i64, 20, 30, 40])?),
        (
            "foo",
            Variable::new(["time", "x"], foo)?.with_attributes(units),
        ),
        ("bar", Variable::new(["x"], vec![1i32, 2, 3, 4])?),
        ("baz", Variable::new(["time"], vec![0.5, 1.5, 2.5])?),
    ])
}

pub(crate) fn make_array() -> Result<DataArray> {
    DataArray::new(make_dataset()?, "foo")
}

/// Hourly `t` time coordinate starting 2001-09-09T01:46:40Z, with `temperature(t)`
pub(crate) fn make_time_dataset() -> Result<Dataset> {
    Dataset::from_variables([
        ("t", TimeRange::new(1_000_000_000, 3600, 24).coordinate("t")?),
        (
            "temperature",
            Variable::new(["t"], (0..24).map(f64::from).collect::<Vec<_>>())?,
        ),
    ])
}

/// Same variables, in the same order, with equal dimensions and values
pub(crate) fn assert_same(a: &Dataset, b: &Dataset) {
    assert_eq!(
        a.variables().keys().collect::<Vec<_>>(),
        b.variables().keys().collect::<Vec<_>>()
    );
    for (name, variable) in a.variables() {
        assert!(
            variable.equals(&b.variables()[name]),
            "{name}: {variable} != {}",
            b.variables()[name]
        );
    }
}
