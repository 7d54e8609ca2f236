//! Utility modules for the build server.

pub mod date;
pub mod exec;
pub mod html;
pub mod mime;
pub mod path;
