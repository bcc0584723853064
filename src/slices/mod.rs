//! Storefront slices - the record types the sync pattern is applied to.
//!
//! Each slice pairs a record with the summary its views render.

pub mod cart;
pub mod media;
pub mod orders;
pub mod reviews;

pub use cart::{CartLine, CartSummary};
pub use media::{MediaItem, MediaSummary};
pub use orders::{Order, OrderStatus, OrderSummary};
pub use reviews::{Review, ReviewSummary};
