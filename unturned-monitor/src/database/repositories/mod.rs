//! Repository layer for database access.

pub mod recipient;
pub mod status;

pub use recipient::*;
pub use status::*;
