use crate::error::PipelineError;

/// Meters per degree of latitude at the equator.
const METERS_PER_DEGREE: f64 = 111_320.0;

/// Immutable origin of the local metric frame for one world region.
///
/// Maps geographic (lat, lon) to a metric projection and to local
/// coordinates centered on the region. Uses the city-scale approximation
/// `x = lon * cos(lat_ref) * 111320`, `y = lat * 111320`, accurate enough
/// for regions up to ~50 km across.
///
/// The anchor is derived deterministically from the region bounding box, so
/// two runs over the same region produce bit-identical values and adjacent
/// tiles of that region stitch exactly.
#[derive(Debug, Clone)]
pub struct GlobalAnchor {
    ref_lat: f64,
    ref_lon: f64,
    cos_lat: f64,
    crs: String,
    origin_x: f64,
    origin_y: f64,
}

impl GlobalAnchor {
    /// Build the anchor for a world region given as (south, west, north, east)
    /// in WGS84 degrees. The reference point is the bbox centroid.
    pub fn for_region(
        south: f64,
        west: f64,
        north: f64,
        east: f64,
    ) -> Result<Self, PipelineError> {
        if !(south.is_finite() && west.is_finite() && north.is_finite() && east.is_finite()) {
            return Err(PipelineError::InvalidInput {
                stage: "anchor",
                reason: "non-finite region bounds".to_string(),
            });
        }
        if north <= south || east <= west {
            return Err(PipelineError::InvalidInput {
                stage: "anchor",
                reason: format!(
                    "empty region bounds: south={south} north={north} west={west} east={east}"
                ),
            });
        }

        let ref_lat = (south + north) / 2.0;
        let ref_lon = (west + east) / 2.0;
        let cos_lat = ref_lat.to_radians().cos();
        let origin_x = ref_lon * cos_lat * METERS_PER_DEGREE;
        let origin_y = ref_lat * METERS_PER_DEGREE;

        Ok(Self {
            ref_lat,
            ref_lon,
            cos_lat,
            crs: format!("equirect:{ref_lat:.6}"),
            origin_x,
            origin_y,
        })
    }

    /// Project a geographic point to projected metric coordinates.
    pub fn to_projected(&self, lat: f64, lon: f64) -> (f64, f64) {
        (
            lon * self.cos_lat * METERS_PER_DEGREE,
            lat * METERS_PER_DEGREE,
        )
    }

    /// Inverse of [`Self::to_projected`].
    pub fn to_geographic(&self, x: f64, y: f64) -> (f64, f64) {
        (
            y / METERS_PER_DEGREE,
            x / (self.cos_lat * METERS_PER_DEGREE),
        )
    }

    /// Projected metric -> local (centered) coordinates.
    pub fn to_local(&self, x: f64, y: f64) -> (f64, f64) {
        (x - self.origin_x, y - self.origin_y)
    }

    /// Local -> projected metric coordinates.
    pub fn to_projected_from_local(&self, x: f64, y: f64) -> (f64, f64) {
        (x + self.origin_x, y + self.origin_y)
    }

    /// Local coordinates -> geographic, for elevation sampling.
    pub fn local_to_geographic(&self, x: f64, y: f64) -> (f64, f64) {
        let (px, py) = self.to_projected_from_local(x, y);
        self.to_geographic(px, py)
    }

    pub fn reference(&self) -> (f64, f64) {
        (self.ref_lat, self.ref_lon)
    }

    pub fn origin(&self) -> (f64, f64) {
        (self.origin_x, self.origin_y)
    }

    /// Identifier of the metric CRS this anchor projects into.
    pub fn crs(&self) -> &str {
        &self.crs
    }
}
