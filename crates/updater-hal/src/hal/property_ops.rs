//! System property lookup.

use crate::HalResult;

pub trait PropertyOps {
    /// Value of system property `key`, if set.
    fn property(&self, key: &str) -> HalResult<Option<String>>;
}
