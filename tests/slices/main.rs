//! Review, media and order slices driven through the sync engine.

mod media;
mod orders;
mod reviews;
