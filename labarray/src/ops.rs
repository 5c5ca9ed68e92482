use std::{fmt, sync::Arc};

use paste::paste;

use crate::{
    data::Data,
    data_array::DataArray,
    dataset::Dataset,
    dtype::DType,
    errors::{Error, Result},
    variable::Variable,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Abs,
}

impl UnaryOp {
    pub fn name(self) -> &'static str {
        match self {
            Self::Neg => "neg",
            Self::Pos => "pos",
            Self::Abs => "abs",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
}

impl BinaryOp {
    pub fn name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Div => "div",
            Self::Rem => "mod",
            Self::Pow => "pow",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::Pow => "**",
        }
    }

    /// Dtype of the result of applying this operation to `left` and `right`.
    ///
    /// Integer division and powers give floats. Time data is not supported.
    pub fn result_dtype(self, left: DType, right: DType) -> Result<DType> {
        if left == DType::Time || right == DType::Time {
            return Err(Error::UnsupportedDType {
                operation: self.name().to_string(),
                dtype: DType::Time,
            });
        }

        let dtype = left.promote(right)?;
        match self {
            Self::Div | Self::Pow if dtype.is_integer() => Ok(DType::F64),
            _ => Ok(dtype),
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    Unary(UnaryOp),
    Binary(BinaryOp),
    InPlace(BinaryOp),
}

/// Every operator an array supports, by symbol
pub const OPERATORS: &[(&str, Operator)] = &[
    ("neg", Operator::Unary(UnaryOp::Neg)),
    ("pos", Operator::Unary(UnaryOp::Pos)),
    ("abs", Operator::Unary(UnaryOp::Abs)),
    ("+", Operator::Binary(BinaryOp::Add)),
    ("-", Operator::Binary(BinaryOp::Sub)),
    ("*", Operator::Binary(BinaryOp::Mul)),
    ("/", Operator::Binary(BinaryOp::Div)),
    ("%", Operator::Binary(BinaryOp::Rem)),
    ("**", Operator::Binary(BinaryOp::Pow)),
    ("+=", Operator::InPlace(BinaryOp::Add)),
    ("-=", Operator::InPlace(BinaryOp::Sub)),
    ("*=", Operator::InPlace(BinaryOp::Mul)),
    ("/=", Operator::InPlace(BinaryOp::Div)),
    ("%=", Operator::InPlace(BinaryOp::Rem)),
    ("**=", Operator::InPlace(BinaryOp::Pow)),
];

impl Operator {
    pub fn lookup(symbol: &str) -> Result<Operator> {
        OPERATORS
            .iter()
            .find(|(candidate, _)| *candidate == symbol)
            .map(|(_, operator)| *operator)
            .ok_or_else(|| Error::usage(format!("unknown operator {symbol:?}")))
    }
}

/// Right hand side of a binary operation
#[derive(Clone, Copy, Debug)]
pub enum Operand<'a> {
    Array(&'a DataArray),
    Variable(&'a Variable),
    Scalar(f64),
}

impl<'a> From<&'a DataArray> for Operand<'a> {
    fn from(array: &'a DataArray) -> Self {
        Self::Array(array)
    }
}

impl<'a> From<&'a Variable> for Operand<'a> {
    fn from(variable: &'a Variable) -> Self {
        Self::Variable(variable)
    }
}

impl From<f64> for Operand<'_> {
    fn from(value: f64) -> Self {
        Self::Scalar(value)
    }
}

/// A scalar in `dtype` if it can be represented there without loss, otherwise a float
fn scalar_like(value: f64, dtype: DType) -> Result<Variable> {
    let data = Data::scalar(value);
    let data = match dtype {
        DType::F32 => data.astype(DType::F32).unwrap_or(data),
        DType::I32 | DType::I64 if value.fract() == 0.0 => data.astype(dtype).unwrap_or(data),
        _ => data,
    };

    Variable::new(Vec::<String>::new(), data)
}

macro_rules! unary_methods {
    ($($op:ident),*) => {
        paste! {
            $(
                pub fn [<$op:lower>](&self) -> Result<DataArray> {
                    self.unary_op(UnaryOp::$op)
                }
            )*
        }
    };
}

macro_rules! binary_methods {
    ($($op:ident),*) => {
        paste! {
            $(
                pub fn [<$op:lower>]<'a, O>(&self, other: O) -> Result<DataArray>
                where
                    O: Into<Operand<'a>>,
                {
                    self.binary_op(BinaryOp::$op, other.into(), false)
                }

                /// Same operation with the operands swapped
                pub fn [<r $op:lower>]<'a, O>(&self, other: O) -> Result<DataArray>
                where
                    O: Into<Operand<'a>>,
                {
                    self.binary_op(BinaryOp::$op, other.into(), true)
                }

                pub fn [<$op:lower _assign>]<'a, O: Into<Operand<'a>>>(
                    &self,
                    other: O,
                ) -> Result<DataArray> {
                    self.inplace_op(BinaryOp::$op, other.into())?;
                    Ok(self.clone())
                }
            )*
        }
    };
}

impl DataArray {
    /// Every coordinate both arrays have must carry the same labels
    fn check_coordinates_compat(&self, other: &DataArray) -> Result<()> {
        let theirs = other.coordinates()?;
        for (dimension, coordinate) in self.coordinates()?.iter() {
            if let Some(other_coordinate) = theirs.get(dimension) {
                if !coordinate.index()?.equals(&other_coordinate.index()?) {
                    return Err(Error::CoordinateMismatch(dimension.clone()));
                }
            }
        }

        Ok(())
    }

    /// This array's coordinates, without the array itself unless it is a coordinate
    pub(crate) fn select_coordinates(&self) -> Result<Dataset> {
        let mut dataset = self.dataset().read().select(&[self.name()])?;
        if !self.is_coordinate()? {
            dataset.remove(self.name())?;
        }

        Ok(dataset)
    }

    fn operand_variable(&self, operand: Operand<'_>) -> Result<Arc<Variable>> {
        match operand {
            Operand::Array(array) => array.variable(),
            Operand::Variable(variable) => Ok(Arc::new(variable.clone())),
            Operand::Scalar(value) => Ok(Arc::new(scalar_like(value, self.dtype()?)?)),
        }
    }

    pub fn unary_op(&self, op: UnaryOp) -> Result<DataArray> {
        let variable = self.variable()?.unary(op)?;
        let name = format!("{}_{}", self.name(), op.name());

        let mut dataset = self.select_coordinates()?;
        dataset.insert(name.clone(), variable)?;

        DataArray::new(dataset, name)
    }

    /// Elementwise operation with another array, a variable or a scalar. Coordinates shared
    /// with another array must already be aligned. `reflexive` swaps the operands.
    pub fn binary_op(
        &self,
        op: BinaryOp,
        other: Operand<'_>,
        reflexive: bool,
    ) -> Result<DataArray> {
        let mut dataset = self.select_coordinates()?;
        let other_name = match other {
            Operand::Array(array) => {
                self.check_coordinates_compat(array)?;
                dataset.merge_in_place(&array.select_coordinates()?)?;
                array.name()
            }
            _ => "other",
        };

        let other = self.operand_variable(other)?;
        let variable = self.variable()?.binary(op, &other, reflexive)?;
        let name = format!("{}_{}_{}", self.name(), op.name(), other_name);
        dataset.insert(name.clone(), variable)?;

        DataArray::new(dataset, name)
    }

    /// Replace this array's variable in the shared dataset with the result of the operation.
    /// Attributes of the variable are kept.
    pub fn inplace_op(&self, op: BinaryOp, other: Operand<'_>) -> Result<()> {
        let coordinates = match other {
            Operand::Array(array) => {
                self.check_coordinates_compat(array)?;
                Some(array.select_coordinates()?)
            }
            _ => None,
        };

        let current = self.variable()?;
        let other = self.operand_variable(other)?;
        let variable = current
            .binary(op, &other, false)?
            .with_attributes(current.attributes().clone());

        let mut dataset = self.dataset().write();
        let mut updated = Dataset::clone(&dataset);
        updated.insert(self.name().to_string(), variable)?;
        if let Some(coordinates) = coordinates {
            updated.merge_in_place(&coordinates)?;
        }
        *dataset = updated;

        Ok(())
    }

    pub fn dispatch(
        &self,
        operator: Operator,
        operand: Option<Operand<'_>>,
        reflexive: bool,
    ) -> Result<DataArray> {
        match (operator, operand) {
            (Operator::Unary(op), None) => self.unary_op(op),
            (Operator::Binary(op), Some(other)) => self.binary_op(op, other, reflexive),
            (Operator::InPlace(op), Some(other)) => {
                self.inplace_op(op, other)?;
                Ok(self.clone())
            }
            (Operator::Unary(op), Some(_)) => Err(Error::usage(format!(
                "{} takes no operand",
                op.name()
            ))),
            (Operator::Binary(op) | Operator::InPlace(op), None) => Err(Error::usage(format!(
                "{} requires an operand",
                op.name()
            ))),
        }
    }

    /// Apply the operator with the given symbol, see [`OPERATORS`]
    pub fn apply(&self, symbol: &str, operand: Option<Operand<'_>>) -> Result<DataArray> {
        self.dispatch(Operator::lookup(symbol)?, operand, false)
    }

    unary_methods!(Neg, Pos, Abs);
    binary_methods!(Add, Sub, Mul, Div, Rem, Pow);
}

#[cfg(test)]
mod tests {
    use super::*;

    use ndarray::{Array2, Axis};

    use crate::{
        align::{align, AlignOptions, JoinMode},
        index::Index,
        indexing::Indexer,
        testing,
    };

    fn with_coordinate<T>(name: &str, labels: Vec<T>, values: Vec<f64>) -> Result<DataArray>
    where
        Data: From<Vec<T>>,
    {
        let dataset = Dataset::from_variables([
            ("x", Variable::new(["x"], labels)?),
            (name, Variable::new(["x"], values)?),
        ])?;

        DataArray::new(dataset, name)
    }

    #[test]
    fn test_lookup() {
        assert_eq!(Operator::lookup("**").unwrap(), Operator::Binary(BinaryOp::Pow));
        assert_eq!(Operator::lookup("%=").unwrap(), Operator::InPlace(BinaryOp::Rem));
        assert_eq!(Operator::lookup("abs").unwrap(), Operator::Unary(UnaryOp::Abs));
        assert!(matches!(Operator::lookup("//"), Err(Error::Usage(_))));
        assert_eq!(OPERATORS.len(), 15);
    }

    #[test]
    fn test_result_dtype() {
        assert_eq!(BinaryOp::Add.result_dtype(DType::I32, DType::I32).unwrap(), DType::I32);
        assert_eq!(BinaryOp::Add.result_dtype(DType::I32, DType::I64).unwrap(), DType::I64);
        assert_eq!(BinaryOp::Mul.result_dtype(DType::I64, DType::F32).unwrap(), DType::F64);
        assert_eq!(BinaryOp::Div.result_dtype(DType::I32, DType::I32).unwrap(), DType::F64);
        assert_eq!(BinaryOp::Pow.result_dtype(DType::I64, DType::I64).unwrap(), DType::F64);
        assert_eq!(BinaryOp::Rem.result_dtype(DType::F32, DType::F32).unwrap(), DType::F32);
        assert!(matches!(
            BinaryOp::Sub.result_dtype(DType::Time, DType::Time),
            Err(Error::UnsupportedDType { .. })
        ));
    }

    #[test]
    fn test_unary() -> Result<()> {
        let array = testing::make_array()?;

        let negated = array.neg()?;
        assert_eq!(negated.name(), "foo_neg");
        assert_eq!(
            negated.variables().keys().collect::<Vec<_>>(),
            vec!["time", "x", "foo_neg"]
        );
        assert_eq!(negated.data()?.as_f64().unwrap()[[2, 3]], -11.0);
        assert!(negated.attributes()?.is_empty());

        let x = array.get_item("x")?.neg()?;
        assert_eq!(x.name(), "x_neg");
        assert!(x.contains("x"));
        assert_eq!(x.data()?, Data::from(vec![-10i64, -20, -30, -40]));

        Ok(())
    }

    #[test]
    fn test_binary_with_array() -> Result<()> {
        let array = testing::make_array()?;
        let baz = array.get_item("baz")?;

        let sum = array.add(&baz)?;
        assert_eq!(sum.name(), "foo_add_baz");
        assert_eq!(sum.dimensions()?, vec!["time", "x"]);
        assert_eq!(sum.data()?.as_f64().unwrap()[[1, 2]], 6.0 + 1.5);
        assert!(!sum.contains("foo"));
        assert!(!sum.contains("baz"));

        let difference = baz.sub(&array)?;
        assert_eq!(difference.dimensions()?, vec!["time", "x"]);
        assert_eq!(difference.data()?.as_f64().unwrap()[[1, 2]], 1.5 - 6.0);

        let swapped = array.rsub(&baz)?;
        assert_eq!(swapped.data()?.as_f64().unwrap()[[1, 2]], 1.5 - 6.0);

        Ok(())
    }

    #[test]
    fn test_binary_keeps_input_coordinates() -> Result<()> {
        let array = testing::make_array()?;
        let baz = array.get_item("baz")?;
        let expected = array.coordinates()?.indexes()?;

        for result in [array.add(&baz)?, baz.mul(&array)?, array.pow(2.0)?, array.abs()?] {
            let coordinates = result.coordinates()?;
            assert_eq!(coordinates.len(), 2);
            assert_eq!(coordinates.indexes()?, expected);
        }
        assert_eq!(
            array.add(&baz)?.coordinates()?.index("time")?,
            baz.coordinates()?.index("time")?
        );

        Ok(())
    }

    #[test]
    fn test_binary_across_coordinate_dtypes() -> Result<()> {
        let ints = with_coordinate("a", vec![1i64, 2, 3], vec![1.0, 2.0, 3.0])?;
        let floats = with_coordinate("b", vec![1.0, 2.0, 3.0], vec![10.0, 20.0, 30.0])?;

        let aligned = align(&[&ints, &floats], &AlignOptions::default().join(JoinMode::Inner))?;
        let sum = aligned[0].add(&aligned[1])?;
        assert_eq!(sum.data()?, Data::from(vec![11.0, 22.0, 33.0]));
        assert_eq!(sum.coordinates()?.index("x")?, Index::from(vec![1i64, 2, 3]));
        assert_eq!(sum.get_item("x")?.dtype()?, DType::I64);

        let reflected = floats.sub(&ints)?;
        assert_eq!(reflected.data()?, Data::from(vec![9.0, 18.0, 27.0]));
        assert_eq!(reflected.get_item("x")?.dtype()?, DType::F64);

        ints.add_assign(&floats)?;
        assert_eq!(ints.data()?, Data::from(vec![11.0, 22.0, 33.0]));

        let shifted = with_coordinate("c", vec![1.0, 2.0, 3.5], vec![0.0; 3])?;
        assert!(matches!(
            ints.add(&shifted),
            Err(Error::CoordinateMismatch(dimension)) if dimension == "x"
        ));

        Ok(())
    }

    #[test]
    fn test_binary_requires_aligned_coordinates() -> Result<()> {
        let array = testing::make_array()?;

        let reversed = array.get_item(vec![Indexer::Full, Indexer::Array(vec![3, 2, 1, 0])])?;
        assert!(matches!(
            array.mul(&reversed),
            Err(Error::CoordinateMismatch(dimension)) if dimension == "x"
        ));

        let shorter = array.get_item(vec![Indexer::Array(vec![0, 1])])?;
        assert!(matches!(
            shorter.add(&array),
            Err(Error::CoordinateMismatch(dimension)) if dimension == "time"
        ));

        let other = DataArray::from_variable("v", Variable::new(["y"], vec![1.0, 2.0])?)?;
        let outer = array.mul(&other)?;
        assert_eq!(outer.dimensions()?, vec!["time", "x", "y"]);
        assert_eq!(outer.coordinates()?.len(), 3);

        Ok(())
    }

    #[test]
    fn test_binary_with_scalar() -> Result<()> {
        let array = testing::make_array()?;
        let bar = array.get_item("bar")?;

        assert_eq!(bar.add(2.0)?.dtype()?, DType::I32);
        assert_eq!(bar.add(2.0)?.name(), "bar_add_other");
        assert_eq!(bar.add(0.5)?.dtype()?, DType::F64);
        assert_eq!(bar.div(2.0)?.data()?, Data::from(vec![0.5, 1.0, 1.5, 2.0]));
        assert_eq!(bar.rem(-3.0)?.data()?, Data::from(vec![-2i32, -1, 0, -2]));
        assert_eq!(bar.rpow(2.0)?.data()?, Data::from(vec![2.0, 4.0, 8.0, 16.0]));

        let one_minus = array.rsub(1.0)?;
        assert_eq!(one_minus.data()?.as_f64().unwrap()[[0, 3]], -2.0);

        let variable = Variable::new(["x"], vec![1.0; 4])?;
        let shifted = array.add(&variable)?;
        assert_eq!(shifted.data()?.as_f64().unwrap()[[0, 0]], 1.0);

        let t = DataArray::new(testing::make_time_dataset()?, "t")?;
        assert!(matches!(t.add(1.0), Err(Error::UnsupportedDType { .. })));

        Ok(())
    }

    #[test]
    fn test_inplace_is_shared() -> Result<()> {
        let array = testing::make_array()?;
        let alias = array.clone();
        let other = array.get_item("bar")?.get_item("foo")?;

        let result = array.add_assign(1.0)?;
        assert!(result.same_dataset(&array));
        assert_eq!(result.name(), "foo");
        for view in [&alias, &other] {
            assert_eq!(view.data()?.as_f64().unwrap()[[0, 0]], 1.0);
        }
        assert_eq!(alias.attributes()?["units"].to_string(), "m");

        array.mul_assign(&array.clone())?;
        assert_eq!(alias.data()?.as_f64().unwrap()[[0, 1]], 4.0);

        let copy = array.copy(false)?;
        copy.sub_assign(1.0)?;
        assert_eq!(array.data()?.as_f64().unwrap()[[0, 0]], 1.0);

        Ok(())
    }

    #[test]
    fn test_inplace_checks_coordinates() -> Result<()> {
        let array = testing::make_array()?;
        let before = array.data()?;

        let reversed = array.get_item(vec![Indexer::Full, Indexer::Array(vec![3, 2, 1, 0])])?;
        assert!(matches!(
            array.add_assign(&reversed),
            Err(Error::CoordinateMismatch(_))
        ));
        assert_eq!(array.data()?, before);

        let wider = DataArray::from_variable("w", Variable::new(["y"], vec![1.0, 2.0])?)?;
        array.add_assign(&wider)?;
        assert_eq!(array.dimensions()?, vec!["time", "x", "y"]);
        assert!(array.coordinates()?.contains("y"));

        Ok(())
    }

    #[test]
    fn test_dispatch() -> Result<()> {
        let array = testing::make_array()?;

        let squared = array.apply("**", Some(Operand::Scalar(2.0)))?;
        let expected = Array2::from_shape_fn((3, 4), |(i, j)| ((i * 4 + j) as f64).powi(2));
        assert_eq!(squared.data()?, Data::F64(expected.into_dyn()));

        let absolute = array.apply("abs", None)?;
        assert_eq!(absolute.name(), "foo_abs");

        let baz = array.get_item("baz")?;
        let reflected = array.dispatch(Operator::Binary(BinaryOp::Div), Some((&baz).into()), true)?;
        let data = reflected.data()?;
        let row = data.as_f64().unwrap().index_axis(Axis(0), 2).to_owned();
        assert_eq!(row[1], 2.5 / 9.0);

        assert!(matches!(array.apply("neg", Some(Operand::Scalar(1.0))), Err(Error::Usage(_))));
        assert!(matches!(array.apply("+", None), Err(Error::Usage(_))));
        assert!(matches!(array.apply("+=", None), Err(Error::Usage(_))));

        let updated = array.apply("-=", Some(Operand::Scalar(1.0)))?;
        assert!(updated.same_dataset(&array));
        assert_eq!(array.data()?.as_f64().unwrap()[[0, 0]], -1.0);

        Ok(())
    }
}
