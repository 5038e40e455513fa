//! Record Model
//!
//! Loosely typed records as handed to the engine by the host pipeline.
//!
//! - `value`: the [`FieldValue`] enum and its fallible typed accessors
//! - `item`: the [`Record`] container

pub mod item;
pub mod value;

pub use item::Record;
pub use value::FieldValue;
