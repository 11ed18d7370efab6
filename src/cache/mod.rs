//! Caching subsystem.
//!
//! - [`key`] derives content-addressed [`CacheKey`]s from generation inputs.
//! - [`store::CacheStore`] persists accepted generations, one JSON file per
//!   key, with atomic replace on write and corruption treated as a miss.

pub mod key;
pub mod store;

pub use key::{CacheKey, derive_key, key_for, normalize_excerpt};
pub use store::{CacheEntry, CacheStore};
