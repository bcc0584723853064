use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::collection::EntityCollection;
use crate::record::SyncStatus;
use crate::summary::Summary;
use crate::Record;

/// One product variant in the cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Record)]
#[record(collection = "cart_lines", merge = merge_lines)]
pub struct CartLine {
    #[serde(default)]
    pub id: String,
    #[record(key)]
    pub product_id: String,
    #[record(key)]
    #[serde(default)]
    pub variant_id: Option<String>,
    #[serde(default)]
    pub name: String,
    pub quantity: u32,
    /// Unknown until the catalog has priced the line.
    #[serde(default)]
    pub unit_price: Option<Decimal>,
}

impl CartLine {
    pub fn new(product_id: impl Into<String>, quantity: u32) -> Self {
        Self {
            id: String::new(),
            product_id: product_id.into(),
            variant_id: None,
            name: String::new(),
            quantity,
            unit_price: None,
        }
    }

    pub fn with_variant(mut self, variant_id: impl Into<String>) -> Self {
        self.variant_id = Some(variant_id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_price(mut self, unit_price: Decimal) -> Self {
        self.unit_price = Some(unit_price);
        self
    }

    /// Price times quantity; zero when unpriced. Saturates instead of overflowing.
    pub fn line_total(&self) -> Decimal {
        self.unit_price
            .unwrap_or(Decimal::ZERO)
            .saturating_mul(Decimal::from(self.quantity))
    }
}

/// Adding a product already in the cart bumps its quantity.
fn merge_lines(incoming: &CartLine, existing: &CartLine) -> CartLine {
    CartLine {
        id: existing.id.clone(),
        quantity: existing.quantity.saturating_add(incoming.quantity),
        name: if incoming.name.is_empty() {
            existing.name.clone()
        } else {
            incoming.name.clone()
        },
        unit_price: incoming.unit_price.or(existing.unit_price),
        ..incoming.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct CartSummary {
    pub line_count: usize,
    pub total_quantity: u32,
    pub subtotal: Decimal,
    /// Lines still waiting on the server.
    pub pending: usize,
    pub errored: usize,
}

impl CartSummary {
    pub fn is_settled(&self) -> bool {
        self.pending == 0
    }
}

impl Summary<CartLine> for CartSummary {
    fn summarize(collection: &EntityCollection<CartLine>) -> Self {
        collection
            .iter()
            .fold(CartSummary::default(), |mut summary, entry| {
                summary.line_count += 1;
                summary.total_quantity = summary.total_quantity.saturating_add(entry.record.quantity);
                summary.subtotal = summary.subtotal.saturating_add(entry.record.line_total());
                match entry.status {
                    SyncStatus::Pending => summary.pending += 1,
                    SyncStatus::Error => summary.errored += 1,
                    SyncStatus::Synced => {}
                }
                summary
            })
    }
}
