//! Core identifier types.

mod id;

pub use id::UnitId;
