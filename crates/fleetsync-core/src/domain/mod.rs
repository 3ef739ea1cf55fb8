//! # Domain Models
//!
//! | Type | Description |
//! |------|-------------|
//! | [`RawRecord`] | Positional vendor row, decoded through a field schema |
//! | [`Observation`] | Normalized, offset-aware position report |
//! | [`PollWindow`] | Vendor query window derived from the checkpoint |
//!
//! Timestamps use the `time` crate throughout. The vendor speaks naive UTC
//! (`YYYY-MM-DD HH:MM:SS`) on the wire; observations carry the integration's
//! configured fixed offset.

mod observation;
mod record;
pub mod timestamp;
mod window;

pub use observation::{Location, Observation, OBSERVATION_TYPE, SUBJECT_GROUP, SUBJECT_TYPE};
pub use record::{as_coordinate, as_text, is_truthy, RawRecord};
pub use window::PollWindow;
