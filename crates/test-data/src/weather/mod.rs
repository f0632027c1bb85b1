//! Synthetic wind records.

mod wind_field;

pub use wind_field::WindField;
