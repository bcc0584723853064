mod record;

use proc_macro::TokenStream;

// ============================================================================
// #[derive(Record)] derive macro
// ============================================================================

/// Derive macro for the `Record` trait.
///
/// # Usage
///
/// ```ignore
/// #[derive(Clone, Serialize, Deserialize, Record)]
/// #[record(collection = "cart_lines", merge = merge_lines)]
/// struct CartLine {
///     #[record(id)]
///     pub id: String,
///     #[record(key)]
///     pub product_id: String,
///     #[record(key)]
///     pub variant_id: Option<String>,
///     pub quantity: u32,
/// }
/// ```
///
/// - `#[record(collection = "...")]` sets the collection name.
///   If omitted, defaults to snake_case struct name + "s".
/// - `#[record(merge = path)]` names a `fn(&Self, &Self) -> Self` used when a
///   repeated add lands on an already-synced record. Without it the incoming
///   record replaces the existing one.
/// - `#[record(id)]` marks the surrogate identifier field.
///   If omitted, defaults to a field named `id`.
/// - `#[record(key)]` marks the fields that make up the natural key, in
///   declaration order. Without any, the natural key is the id.
#[proc_macro_derive(Record, attributes(record))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    record::derive_record(input)
}
