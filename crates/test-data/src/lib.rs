//! Synthetic data for exercising the apparent-wind pipeline.
//!
//! Generates vessel tracks and hourly wind records, and provides an
//! in-process wind transport so the whole pipeline runs without network
//! access.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use test_data::prelude::*;
//!
//! let fixes = VesselTrackGenerator::for_region(Region::SOLENT)
//!     .with_fixes(360, 5.0)
//!     .generate(&mut rng);
//! let transport = Arc::new(ScriptedTransport::serving(WindField::new(7)));
//! let enricher = Enricher::new(transport, EnrichConfig::default());
//! let enrichment = enricher.enrich(&fixes, EnrichRequest::default()).await?;
//! ```

pub mod config;
pub mod gpx;
pub mod sources;
pub mod transport;
pub mod weather;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::config::{BoundingBox, DEFAULT_SESSION_START, Region};
    pub use crate::gpx::generate_gpx;
    pub use crate::sources::{TrackConfig, VesselTrackGenerator};
    pub use crate::transport::{Scripted, ScriptedTransport};
    pub use crate::weather::WindField;
    pub use apparent_wind::{
        config::EnrichConfig,
        models::Fix,
        pipeline::{EnrichRequest, Enricher},
    };
}
