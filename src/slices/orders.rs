use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::collection::EntityCollection;
use crate::summary::Summary;
use crate::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Placed,
    Paid,
    Shipped,
    Delivered,
    Cancelled,
}

/// An entry in the customer's order history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Record)]
pub struct Order {
    #[serde(default)]
    pub id: String,
    /// Human-facing order number, e.g. `SO-1042`.
    #[record(key)]
    pub number: String,
    pub status: OrderStatus,
    #[serde(default)]
    pub total: Option<Decimal>,
    #[serde(default)]
    pub item_count: u32,
}

impl Order {
    pub fn new(number: impl Into<String>, status: OrderStatus) -> Self {
        Self {
            id: String::new(),
            number: number.into(),
            status,
            total: None,
            item_count: 0,
        }
    }

    pub fn with_total(mut self, total: Decimal, item_count: u32) -> Self {
        self.total = Some(total);
        self.item_count = item_count;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct OrderSummary {
    pub count: usize,
    /// Totals of orders that were not cancelled.
    pub total_spent: Decimal,
    pub by_status: BTreeMap<OrderStatus, usize>,
}

impl Summary<Order> for OrderSummary {
    fn summarize(collection: &EntityCollection<Order>) -> Self {
        let mut summary = OrderSummary::default();
        for order in collection.records() {
            summary.count += 1;
            *summary.by_status.entry(order.status).or_insert(0) += 1;
            if order.status != OrderStatus::Cancelled {
                summary.total_spent = summary
                    .total_spent
                    .saturating_add(order.total.unwrap_or(Decimal::ZERO));
            }
        }
        summary
    }
}
