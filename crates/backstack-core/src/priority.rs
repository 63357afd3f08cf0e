//! Handler priorities.
//!
//! Any real number is a valid priority, including zero and negatives.
//! Higher priorities are evaluated first.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Numeric rank of a handler. Higher runs earlier.
///
/// `Priority` is totally ordered via [`f64::total_cmp`]. `NaN` has no
/// meaningful rank, so it is stored as negative infinity and evaluated
/// after every other handler. Negative zero is stored as zero.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Priority(f64);

impl Priority {
    /// The priority used when nothing more specific is needed.
    pub const DEFAULT: Self = Self(0.0);

    /// Creates a priority from a float.
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            Self(f64::NEG_INFINITY)
        } else if value == 0.0 {
            // -0.0 and 0.0 must compare equal under total_cmp
            Self(0.0)
        } else {
            Self(value)
        }
    }

    /// Returns the numeric value.
    pub fn value(&self) -> f64 {
        self.0
    }
}

impl PartialEq for Priority {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Priority {}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<f64> for Priority {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl From<f32> for Priority {
    fn from(value: f32) -> Self {
        Self::new(f64::from(value))
    }
}

impl From<Priority> for f64 {
    fn from(priority: Priority) -> Self {
        priority.0
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Priority {
                fn from(value: $t) -> Self {
                    Self::new(f64::from(value))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, u8, u16, u32);

// Wide integers convert with `as f64`, so magnitudes above 2^53 are
// rounded to the nearest representable value.
macro_rules! impl_from_wide_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Priority {
                fn from(value: $t) -> Self {
                    Self::new(value as f64)
                }
            }
        )*
    };
}

impl_from_wide_int!(i64, u64, isize, usize);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering() {
        assert!(Priority::from(10) > Priority::from(5));
        assert!(Priority::from(-1) < Priority::DEFAULT);
        assert!(Priority::from(0.5) > Priority::from(0));
        assert_eq!(Priority::from(3), Priority::from(3.0));
    }

    #[test]
    fn test_nan_ranks_last() {
        let nan = Priority::new(f64::NAN);
        assert!(nan < Priority::from(i32::MIN));
        assert_eq!(nan.value(), f64::NEG_INFINITY);
    }

    #[test]
    fn test_wide_integers() {
        assert_eq!(Priority::from(7_i64), Priority::from(7));
        assert_eq!(Priority::from(3_usize).value(), 3.0);
        assert!(Priority::from(u64::MAX) > Priority::from(i64::MAX - 1024));
        assert!(Priority::from(isize::MIN) < Priority::from(i32::MIN));
    }

    #[test]
    fn test_signed_zero_is_equal() {
        assert_eq!(Priority::new(0.0), Priority::new(-0.0));
    }
}
