/*!
    Rational number type for frame rates.
*/

use std::fmt;
use std::str::FromStr;

use crate::Error;

/**
    A rational number represented as a numerator and denominator.

    Used for timeline frame rates, which are frequently not whole
    numbers (e.g., 24000/1001 for 23.976 fps). Keeping the exact ratio
    lets position mapping stay in integer arithmetic.
*/
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rational {
    pub num: i32,
    pub den: i32,
}

impl Rational {
    /**
        Create a new rational number.

        # Panics

        Panics if `den` is zero.
    */
    #[inline]
    pub const fn new(num: i32, den: i32) -> Self {
        assert!(den != 0, "denominator cannot be zero");
        Self { num, den }
    }

    /**
        Convert to f64.
    */
    #[inline]
    pub fn to_f64(self) -> f64 {
        self.num as f64 / self.den as f64
    }

    /**
        Returns true if the value is strictly greater than zero.
    */
    #[inline]
    pub const fn is_positive(self) -> bool {
        self.num != 0 && (self.num > 0) == (self.den > 0)
    }

    /**
        Returns the numerator and denominator as unsigned magnitudes with
        the sign folded away. Callers check [`Rational::is_positive`] first.
    */
    #[inline]
    pub(crate) const fn magnitudes(self) -> (u128, u128) {
        (self.num.unsigned_abs() as u128, self.den.unsigned_abs() as u128)
    }
}

impl fmt::Debug for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl From<(i32, i32)> for Rational {
    fn from((num, den): (i32, i32)) -> Self {
        Self::new(num, den)
    }
}

impl From<i32> for Rational {
    fn from(num: i32) -> Self {
        Self::new(num, 1)
    }
}

/**
    Parses `"25"` or `"30000/1001"`.
*/
impl FromStr for Rational {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (num, den) = match s.split_once('/') {
            Some((num, den)) => (num.trim(), den.trim()),
            None => (s, "1"),
        };

        let num = num
            .parse::<i32>()
            .map_err(|e| Error::invalid_rate(format!("numerator {num:?}: {e}")))?;
        let den = den
            .parse::<i32>()
            .map_err(|e| Error::invalid_rate(format!("denominator {den:?}: {e}")))?;

        if den == 0 {
            return Err(Error::invalid_rate("denominator cannot be zero"));
        }

        Ok(Self { num, den })
    }
}
