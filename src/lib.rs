//! terratile - compose terrain, buildings, roads and water into watertight
//! 3D-printable map tiles

pub mod config;
pub mod domain;
pub mod error;
pub mod geometry;
pub mod layers;
pub mod mesh;
pub mod pipeline;
pub mod scene;
pub mod terrain;

pub use config::GenerationParams;
pub use error::PipelineError;
pub use pipeline::{generate_scene, CancelToken, GeoBounds, RegionInputs};
pub use scene::Scene;
pub use terrain::{ElevationSource, FnElevation};
