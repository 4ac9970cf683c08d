//! Seams between the core and whatever persists its state.

use anyhow::Result;

use crate::models::Supplement;

/// Small keyed string storage, one value per key.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Returns whether a value was present.
    fn remove(&self, key: &str) -> Result<bool>;

    /// Read `key`, hand the current value to `apply`, and write back what it
    /// returns. Implementations must run the read and the write as one unit so
    /// concurrent writers cannot interleave between them.
    fn update(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<String>) -> Result<String>,
    ) -> Result<()>;
}

/// Read side of the supplement catalog.
pub trait SupplementCatalog {
    /// All supplements in insertion order.
    fn list(&self) -> Result<Vec<Supplement>>;
}
