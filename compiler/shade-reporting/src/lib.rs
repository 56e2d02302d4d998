//! Shade compiler error and warning reporting.
pub mod report;
pub mod reporter;
