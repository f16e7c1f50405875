//! Per-provider payload conversion.
//!
//! Each provider module parses its own JSON shape, applies the bounding-box
//! filter, and emits canonical records. [`converter`] maps provider
//! identifiers onto the right variant and folds the result into a tri-state
//! outcome.

pub mod converter;
pub mod opensensemap;
pub mod sensor_community;
pub mod telraam;

pub use converter::{Outcome, Provider, dispatch};
