use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::collection::EntityCollection;
use crate::summary::Summary;
use crate::Record;

/// A product review. One per author and product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Record)]
#[record(collection = "reviews")]
pub struct Review {
    #[serde(default)]
    pub id: String,
    #[record(key)]
    pub product_id: String,
    #[record(key)]
    pub author_id: String,
    /// 1 to 5 stars.
    pub rating: u8,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
}

impl Review {
    pub fn new(product_id: impl Into<String>, author_id: impl Into<String>, rating: u8) -> Self {
        Self {
            id: String::new(),
            product_id: product_id.into(),
            author_id: author_id.into(),
            rating,
            title: String::new(),
            body: String::new(),
        }
    }

    pub fn with_text(mut self, title: impl Into<String>, body: impl Into<String>) -> Self {
        self.title = title.into();
        self.body = body.into();
        self
    }

    fn star_index(&self) -> Option<usize> {
        (1..=5)
            .contains(&self.rating)
            .then(|| usize::from(self.rating) - 1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ReviewSummary {
    pub count: usize,
    /// Mean of valid ratings, two decimal places. `None` without any.
    pub average_rating: Option<Decimal>,
    /// Review counts for 1 through 5 stars.
    pub distribution: [u32; 5],
}

impl Summary<Review> for ReviewSummary {
    fn summarize(collection: &EntityCollection<Review>) -> Self {
        let mut summary = ReviewSummary::default();
        let mut rated = 0u32;
        let mut stars = 0u32;

        for review in collection.records() {
            summary.count += 1;
            // out-of-range ratings are counted but not averaged
            if let Some(index) = review.star_index() {
                summary.distribution[index] += 1;
                rated += 1;
                stars = stars.saturating_add(u32::from(review.rating));
            }
        }

        if rated > 0 {
            let average = Decimal::from(stars) / Decimal::from(rated);
            summary.average_rating = Some(average.round_dp(2));
        }
        summary
    }
}
