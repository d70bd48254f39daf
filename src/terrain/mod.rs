pub mod heightfield;
pub mod provider;
pub mod solidify;

pub use heightfield::{quantile, HeightField};
pub use provider::TerrainProvider;
pub use solidify::solidify;

use crate::error::ElevationError;

/// Source of absolute elevations, sampled per geographic point.
///
/// Implementations may block on I/O (tiled HTTP fetchers, raster readers) or
/// be purely synthetic. Caching belongs to the implementation, not the core.
pub trait ElevationSource: Sync {
    /// Absolute elevation in meters at (lat, lon).
    fn sample(&self, lat: f64, lon: f64) -> Result<f64, ElevationError>;

    /// Whether `sample` tolerates concurrent calls. When false the grid is
    /// sampled serially.
    fn thread_safe(&self) -> bool {
        false
    }
}

/// Elevation source backed by a plain function of (lat, lon). Always
/// sampled in parallel.
pub struct FnElevation<F: Fn(f64, f64) -> f64 + Sync>(pub F);

impl<F: Fn(f64, f64) -> f64 + Sync> ElevationSource for FnElevation<F> {
    fn sample(&self, lat: f64, lon: f64) -> Result<f64, ElevationError> {
        Ok((self.0)(lat, lon))
    }

    fn thread_safe(&self) -> bool {
        true
    }
}
