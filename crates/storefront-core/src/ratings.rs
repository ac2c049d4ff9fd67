//! Star ratings and the running (count, mean) aggregate kept per product.

use serde::Serialize;

use crate::CoreError;

/// A validated 1-5 star rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatingValue(u8);

impl RatingValue {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for RatingValue {
    type Error = CoreError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .ok()
            .filter(|v| (Self::MIN..=Self::MAX).contains(v))
            .map(RatingValue)
            .ok_or(CoreError::InvalidRating(value))
    }
}

/// Running mean and sample count for one product.
///
/// `rating_count == 0` implies `rating == 0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatingSummary {
    pub rating: f64,
    pub rating_count: i64,
}

impl RatingSummary {
    pub const EMPTY: RatingSummary = RatingSummary {
        rating: 0.0,
        rating_count: 0,
    };

    /// Folds one more sample into the mean without the sample history.
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // counts stay far below 2^52
    pub fn with_sample(self, value: RatingValue) -> Self {
        let count = self.rating_count.max(0);
        let new_count = count + 1;
        let rating = (self.rating * count as f64 + f64::from(value.get())) / new_count as f64;
        Self {
            rating,
            rating_count: new_count,
        }
    }
}

impl Default for RatingSummary {
    fn default() -> Self {
        Self::EMPTY
    }
}
