//! Entity schema: per-kind column layout and field classification.

mod entity;
pub mod kinds;

pub use entity::*;
