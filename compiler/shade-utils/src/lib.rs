//! Shade compiler general utilities.

pub mod crash;
pub mod hashing;
pub mod highlight;
pub mod logging;
pub mod printing;
pub mod stream;
pub mod timing;

// Re-export commonly used collection packages
pub use fxhash;
pub use indexmap;
// Re-export logging utility
pub use log;
