//! Command implementations

pub mod update_metadata;
pub mod version;
