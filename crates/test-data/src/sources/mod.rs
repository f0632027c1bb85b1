//! Track geometry sources.

mod procedural;

pub use procedural::{TrackConfig, VesselTrackGenerator};
