//! Shade compiler pipeline definitions. This crate holds everything that the
//! individual compiler stages agree upon: the shape of a compile request,
//! the settings of a session, the stage interface and the errors that can
//! occur before any stage runs.
pub mod error;
pub mod fs;
pub mod interface;
pub mod request;
pub mod settings;
