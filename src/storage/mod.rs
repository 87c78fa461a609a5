/// Storage layer for RustLog segments
///
/// Two leaf components, paired 1:1 by the segment that owns them:
/// - Store: append-only, length-prefixed record file
/// - Index: memory-mapped, fixed-width offset → position map
///
/// The segment calls `Store::append` and then `Index::write` with the
/// returned position; lookups go `Index::read` then `Store::read`.
/// Neither call pair is atomic across the two files.
pub mod format;
pub mod index;
pub mod store;
