use std::fmt::{self, Debug};

use num_traits::{Num, NumCast};

use crate::{
    errors::{Error, Result},
    ops::{BinaryOp, UnaryOp},
};

/// The kind of numerical data stored in a variable
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DType {
    I32,
    I64,
    F32,
    F64,

    /// Seconds since the Unix epoch
    Time,
}

impl DType {
    pub fn is_integer(self) -> bool {
        matches!(self, Self::I32 | Self::I64)
    }

    pub fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    /// The smallest dtype able to hold values of both `self` and `other`.
    ///
    /// Time data never mixes with numeric data.
    pub fn promote(self, other: DType) -> Result<DType> {
        match (self, other) {
            (a, b) if a == b => Ok(a),
            (Self::Time, dtype) | (dtype, Self::Time) => Err(Error::Cast {
                from: dtype,
                to: Self::Time,
            }),
            (Self::I32, Self::I64) | (Self::I64, Self::I32) => Ok(Self::I64),
            _ => Ok(Self::F64),
        }
    }

    /// The dtype to use when missing values must be represented. Integers have no missing
    /// marker and are promoted to `F64`.
    pub fn with_missing(self) -> DType {
        if self.is_integer() {
            Self::F64
        } else {
            self
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::I32 => "int32",
            Self::I64 => "int64",
            Self::F32 => "float32",
            Self::F64 => "float64",
            Self::Time => "time",
        };
        f.write_str(name)
    }
}

/// Element types that can be stored in [`crate::Data`]
pub trait Element: Copy + Debug + PartialOrd + Num + NumCast + Send + Sync + 'static {
    /// Whether this value is the missing value marker
    fn is_missing(self) -> bool;

    fn apply_unary(self, op: UnaryOp) -> Self;

    fn apply_binary(self, op: BinaryOp, other: Self) -> Self;
}

// Integer arithmetic wraps on overflow. Division and modulo by zero yield zero, and modulo
// follows the sign of the divisor.
macro_rules! int_element {
    ($type:ty) => {
        impl Element for $type {
            fn is_missing(self) -> bool {
                false
            }

            fn apply_unary(self, op: UnaryOp) -> Self {
                match op {
                    UnaryOp::Neg => self.wrapping_neg(),
                    UnaryOp::Pos => self,
                    UnaryOp::Abs => self.wrapping_abs(),
                }
            }

            fn apply_binary(self, op: BinaryOp, other: Self) -> Self {
                match op {
                    BinaryOp::Add => self.wrapping_add(other),
                    BinaryOp::Sub => self.wrapping_sub(other),
                    BinaryOp::Mul => self.wrapping_mul(other),
                    BinaryOp::Div => {
                        if other == 0 {
                            0
                        } else {
                            self.wrapping_div(other)
                        }
                    }
                    BinaryOp::Rem => {
                        if other == 0 {
                            0
                        } else {
                            let rem = self.wrapping_rem(other);
                            if rem != 0 && (rem < 0) != (other < 0) {
                                rem + other
                            } else {
                                rem
                            }
                        }
                    }
                    BinaryOp::Pow => {
                        if other < 0 {
                            0
                        } else {
                            self.wrapping_pow(u32::try_from(other).unwrap_or(u32::MAX))
                        }
                    }
                }
            }
        }
    };
}

macro_rules! float_element {
    ($type:ty) => {
        impl Element for $type {
            fn is_missing(self) -> bool {
                self.is_nan()
            }

            fn apply_unary(self, op: UnaryOp) -> Self {
                match op {
                    UnaryOp::Neg => -self,
                    UnaryOp::Pos => self,
                    UnaryOp::Abs => self.abs(),
                }
            }

            fn apply_binary(self, op: BinaryOp, other: Self) -> Self {
                match op {
                    BinaryOp::Add => self + other,
                    BinaryOp::Sub => self - other,
                    BinaryOp::Mul => self * other,
                    BinaryOp::Div => self / other,
                    BinaryOp::Rem => {
                        let rem = self % other;
                        if rem != 0.0 && (rem < 0.0) != (other < 0.0) {
                            rem + other
                        } else {
                            rem
                        }
                    }
                    BinaryOp::Pow => self.powf(other),
                }
            }
        }
    };
}

int_element!(i32);
int_element!(i64);
float_element!(f32);
float_element!(f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_promote() -> Result<()> {
        assert_eq!(DType::I32.promote(DType::I32)?, DType::I32);
        assert_eq!(DType::I32.promote(DType::I64)?, DType::I64);
        assert_eq!(DType::F32.promote(DType::F64)?, DType::F64);
        assert_eq!(DType::I64.promote(DType::F32)?, DType::F64);
        assert_eq!(DType::Time.promote(DType::Time)?, DType::Time);
        assert!(DType::Time.promote(DType::F64).is_err());

        Ok(())
    }

    #[test]
    fn test_with_missing() {
        assert_eq!(DType::I32.with_missing(), DType::F64);
        assert_eq!(DType::F32.with_missing(), DType::F32);
        assert_eq!(DType::Time.with_missing(), DType::Time);
    }

    #[test]
    fn test_integer_arithmetic() {
        assert_eq!(7i32.apply_binary(BinaryOp::Rem, -3), -2);
        assert_eq!((-7i64).apply_binary(BinaryOp::Rem, 3), 2);
        assert_eq!(5i32.apply_binary(BinaryOp::Div, 0), 0);
        assert_eq!(i32::MAX.apply_binary(BinaryOp::Add, 1), i32::MIN);
        assert_eq!(2i64.apply_binary(BinaryOp::Pow, 10), 1024);
        assert_eq!((-4i32).apply_unary(UnaryOp::Abs), 4);
    }

    #[test]
    fn test_float_arithmetic() {
        assert_eq!((-7.0f64).apply_binary(BinaryOp::Rem, 3.0), 2.0);
        assert_eq!(2.0f32.apply_binary(BinaryOp::Pow, 3.0), 8.0);
        assert!(f64::NAN.is_missing());
        assert!(!1.0f64.is_missing());
        assert_eq!(1.5f64.apply_unary(UnaryOp::Neg), -1.5);
    }
}
