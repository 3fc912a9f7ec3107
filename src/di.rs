//! Compile-time dependency injection.
//!
//! - [`FromRef<T>`]: extracts a value from a reference to `T`.
//! - `#[derive(Context)]`: makes every field of the root context extractable.
//! - `#[derive(FromContext)]`: builds a struct by resolving each field.
//!
//! ```ignore
//! #[derive(FromContext, Clone)]
//! pub struct EntityRepository {
//!     graph: AppGraph,        // resolved via FromRef<Context>
//!     settings: AppSettings,
//! }
//!
//! let repo = EntityRepository::from_ref(&ctx);
//! ```
//!
//! Services compose the same way: a field whose type is itself
//! `FromContext` is resolved recursively.

pub trait FromRef<T> {
    fn from_ref(input: &T) -> Self;
}

/// Any `Clone` type can be extracted from itself.
impl<T: Clone> FromRef<T> for T {
    fn from_ref(input: &T) -> Self {
        input.clone()
    }
}

pub use di_macros::{Context, FromContext};
