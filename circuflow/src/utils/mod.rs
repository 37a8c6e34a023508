//! Small shared helpers.

mod hashing;

pub use hashing::{canonical_json, content_hash};
