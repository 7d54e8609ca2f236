//! Path utilities.
//!
//! Pure functions for path manipulation.
//!
//! - [`fs`]: file system paths (`absolutize`, `is_contained_relative`)

pub mod fs;

pub use fs::{absolutize, is_contained_relative};
