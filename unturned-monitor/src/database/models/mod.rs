//! Database models.
//!
//! Row types map one-to-one onto the SQLite tables; conversion to and from
//! the domain types lives next to each model.

pub mod recipient;
pub mod status;

pub use recipient::*;
pub use status::*;
