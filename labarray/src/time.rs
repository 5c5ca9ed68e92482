use chrono::{DateTime, Datelike, Timelike, Utc};
use ndarray::ArrayD;

use crate::{
    data::{Data, NAT},
    errors::{Error, Result},
    variable::Variable,
};

/// Calendar fields exposed as virtual variables of time coordinates
pub const FIELDS: [&str; 8] = [
    "year",
    "month",
    "day",
    "hour",
    "minute",
    "second",
    "dayofyear",
    "dayofweek",
];

/// Split a virtual variable name of the form `coordinate.field`.
pub(crate) fn split_virtual(name: &str) -> Option<(&str, &str)> {
    let (coordinate, field) = name.rsplit_once('.')?;
    FIELDS.contains(&field).then_some((coordinate, field))
}

fn field_of(time: DateTime<Utc>, field: &str) -> Option<i64> {
    let value = match field {
        "year" => i64::from(time.year()),
        "month" => i64::from(time.month()),
        "day" => i64::from(time.day()),
        "hour" => i64::from(time.hour()),
        "minute" => i64::from(time.minute()),
        "second" => i64::from(time.second()),
        "dayofyear" => i64::from(time.ordinal()),
        "dayofweek" => i64::from(time.weekday().num_days_from_monday()),
        _ => return None,
    };

    Some(value)
}

/// Compute `field` for every timestamp of a time coordinate along `dimension`. NaT yields NaN,
/// in which case the whole variable is floating point.
pub(crate) fn field_variable(
    dimension: &str,
    seconds: &ArrayD<i64>,
    field: &str,
) -> Result<Variable> {
    let values = seconds
        .iter()
        .map(|&seconds| {
            if seconds == NAT {
                return Ok(None);
            }
            DateTime::<Utc>::from_timestamp(seconds, 0)
                .and_then(|time| field_of(time, field))
                .map(Some)
                .ok_or_else(|| Error::usage(format!("cannot compute {field} of {seconds}")))
        })
        .collect::<Result<Vec<_>>>()?;

    let data = if values.iter().any(Option::is_none) {
        Data::from(
            values
                .into_iter()
                .map(|value| value.map_or(f64::NAN, |value| value as f64))
                .collect::<Vec<_>>(),
        )
    } else {
        Data::from(values.into_iter().flatten().collect::<Vec<i64>>())
    };

    Variable::new([dimension], data)
}
