//! Device access layer for the recovery updater.
//!
//! Everything that touches the kernel (mount tables, MTD character devices, the UBI
//! control node, child processes) goes through the traits in [`hal`], so the builtin
//! library can be exercised against [`FakeHal`] without root or flash hardware.

pub mod error;
pub mod hal;
pub mod path;
pub mod procfs;
pub mod propfile;
pub mod sysfs;

pub use error::{HalError, HalResult};
pub use hal::*;
