//! Router module for deployment selection.
//!
//! Public model names sent by clients are mapped to vendor deployment
//! names. Names without an alias are used as the deployment name as-is.

mod aliases;

pub use aliases::ModelAliases;
