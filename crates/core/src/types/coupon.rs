//! Applied coupon type.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing a [`Coupon`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CouponError {
    /// The code is empty or only whitespace.
    #[error("coupon code cannot be empty")]
    EmptyCode,
    /// The code is too long.
    #[error("coupon code must be at most {max} characters")]
    CodeTooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The discount is outside `[0, 100]`.
    #[error("coupon discount must be between 0 and 100 percent (got {value})")]
    DiscountOutOfRange {
        /// The rejected percentage.
        value: Decimal,
    },
}

/// A coupon applied to the cart.
///
/// A coupon is tied to the cart contents it was applied to: clearing the
/// cart also clears the coupon.
///
/// ## Constraints
///
/// - Code: 1-32 characters after trimming, stored upper-case
/// - Discount: a percentage in `[0, 100]`
///
/// ## Examples
///
/// ```
/// use atelier_core::Coupon;
/// use rust_decimal::Decimal;
///
/// let coupon = Coupon::new(" spring10 ", Decimal::new(10, 0)).unwrap();
/// assert_eq!(coupon.code(), "SPRING10");
///
/// assert!(Coupon::new("", Decimal::new(10, 0)).is_err());
/// assert!(Coupon::new("HALF", Decimal::new(101, 0)).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    code: String,
    #[serde(rename = "discount", with = "rust_decimal::serde::float")]
    discount_percent: Decimal,
}

impl Coupon {
    /// Maximum length of a coupon code.
    pub const MAX_CODE_LENGTH: usize = 32;

    /// Validate and build a coupon.
    ///
    /// # Errors
    ///
    /// Returns an error if the code is empty or too long, or if the discount
    /// is not within `[0, 100]`.
    pub fn new(code: &str, discount_percent: Decimal) -> Result<Self, CouponError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(CouponError::EmptyCode);
        }

        if code.chars().count() > Self::MAX_CODE_LENGTH {
            return Err(CouponError::CodeTooLong {
                max: Self::MAX_CODE_LENGTH,
            });
        }

        if discount_percent < Decimal::ZERO || discount_percent > Decimal::ONE_HUNDRED {
            return Err(CouponError::DiscountOutOfRange {
                value: discount_percent,
            });
        }

        Ok(Self {
            code: code.to_uppercase(),
            discount_percent,
        })
    }

    /// Returns the coupon code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Returns the discount as a percentage.
    #[must_use]
    pub const fn discount_percent(&self) -> Decimal {
        self.discount_percent
    }
}

impl fmt::Display for Coupon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (-{}%)", self.code, self.discount_percent.normalize())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_valid() {
        let coupon = Coupon::new("WELCOME", Decimal::new(15, 0)).unwrap();
        assert_eq!(coupon.code(), "WELCOME");
        assert_eq!(coupon.discount_percent(), Decimal::new(15, 0));
    }

    #[test]
    fn test_new_bounds_inclusive() {
        assert!(Coupon::new("FREE", Decimal::ONE_HUNDRED).is_ok());
        assert!(Coupon::new("NOTHING", Decimal::ZERO).is_ok());
    }

    #[test]
    fn test_new_empty_code() {
        assert_eq!(
            Coupon::new("   ", Decimal::new(5, 0)),
            Err(CouponError::EmptyCode)
        );
    }

    #[test]
    fn test_new_code_too_long() {
        let long = "X".repeat(Coupon::MAX_CODE_LENGTH + 1);
        assert!(matches!(
            Coupon::new(&long, Decimal::new(5, 0)),
            Err(CouponError::CodeTooLong { .. })
        ));
    }

    #[test]
    fn test_new_discount_out_of_range() {
        assert!(matches!(
            Coupon::new("NEG", Decimal::new(-1, 0)),
            Err(CouponError::DiscountOutOfRange { .. })
        ));
        assert!(matches!(
            Coupon::new("BIG", Decimal::new(10001, 2)),
            Err(CouponError::DiscountOutOfRange { .. })
        ));
    }

    #[test]
    fn test_ledger_shape() {
        let coupon = Coupon::new("spring", Decimal::new(10, 0)).unwrap();
        let json = serde_json::to_value(&coupon).unwrap();
        assert_eq!(json["code"], "SPRING");
        assert!(json["discount"].is_number());

        let back: Coupon = serde_json::from_str(r#"{"code":"SPRING","discount":10}"#).unwrap();
        assert_eq!(back, coupon);
    }

    #[test]
    fn test_display() {
        let coupon = Coupon::new("spring", Decimal::new(1000, 2)).unwrap();
        assert_eq!(coupon.to_string(), "SPRING (-10%)");
    }
}
