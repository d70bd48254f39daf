use geo::{Area, BooleanOps, MultiPolygon, Simplify};
use log::{debug, warn};
use rayon::prelude::*;

use crate::domain::{Material, PolygonFeature};
use crate::error::PipelineError;
use crate::mesh::extrude_polygon;
use crate::pipeline::CancelToken;
use crate::scene::MeshFragment;
use crate::terrain::HeightField;

const STAGE: &str = "water";

/// Gap kept between the water top and the original (pre-depression) banks.
const BANK_GAP_M: f64 = 0.02;

/// Water polygons smaller than this are noise.
const MIN_AREA_M2: f64 = 25.0;

#[derive(Debug, Clone)]
pub struct WaterConfig {
    /// Slab thickness of the water surface.
    pub thickness_m: f64,
    /// How far the surface rises above the depressed bed.
    pub protrusion_m: f64,
}

impl Default for WaterConfig {
    fn default() -> Self {
        Self {
            thickness_m: 0.4,
            protrusion_m: 0.1,
        }
    }
}

/// Place a thin water slab in every depressed basin.
///
/// The terrain was already carved down under these polygons, so the surface
/// level at each (x, y) is `depressed ground + protrusion`, clamped below
/// the original banks. The extrusion grid is kept as-is (no subdivision) so
/// vertices stay on the triangle-exact sampling used here.
pub fn generate_water_meshes(
    features: &[PolygonFeature],
    field: &HeightField,
    config: &WaterConfig,
    cancel: &CancelToken,
) -> Result<Vec<MeshFragment>, PipelineError> {
    if config.thickness_m <= 0.0 {
        return Ok(Vec::new());
    }
    let provider = field.provider();
    let original = field.original_provider();
    let extent_poly = MultiPolygon(vec![field.bounds().to_polygon()]);
    let thickness = config.thickness_m;

    let results: Vec<Vec<MeshFragment>> = features
        .par_iter()
        .map(|feature| {
            if cancel.is_cancelled() {
                return Vec::new();
            }
            if feature.polygon.exterior().0.len() < 4 {
                warn!("{STAGE}: feature {} has a degenerate ring, skipped", feature.id);
                return Vec::new();
            }

            let clipped = MultiPolygon(vec![feature.polygon.clone()]).intersection(&extent_poly);
            let mut fragments = Vec::new();
            for poly in &clipped.0 {
                if poly.unsigned_area() < MIN_AREA_M2 {
                    continue;
                }
                let poly = poly.simplify(&0.5);
                let mut mesh = extrude_polygon(&poly, thickness);
                if mesh.is_empty() {
                    continue;
                }

                mesh.drape_z(|x, y, z_local| {
                    let g_orig = original.height_at(x, y);
                    let g_depr = provider.height_at(x, y);
                    let surface = (g_depr + config.protrusion_m).min(g_orig - BANK_GAP_M);
                    surface - (thickness - z_local)
                });
                fragments.push(MeshFragment::new(mesh, Material::Water));
            }
            fragments
        })
        .collect();

    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled { stage: STAGE });
    }

    let fragments: Vec<MeshFragment> = results.into_iter().flatten().collect();
    debug!("water: {} fragments from {} polygons", fragments.len(), features.len());
    Ok(fragments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Bounds;
    use geo::polygon;

    fn lake_setup() -> (HeightField, PolygonFeature) {
        // Constant 10 m terrain, 50 x 50 m lake depressed by 2 m.
        let bounds = Bounds::new(0.0, 0.0, 200.0, 200.0);
        let mut field =
            HeightField::from_grid(&bounds, 21, 21, vec![10.0; 441]).unwrap();
        let lake = polygon![
            (x: 75.0, y: 75.0),
            (x: 125.0, y: 75.0),
            (x: 125.0, y: 125.0),
            (x: 75.0, y: 125.0),
        ];
        field.depress_under(std::slice::from_ref(&lake), 2.0, 0.10);
        (field, PolygonFeature::new(1, lake))
    }

    #[test]
    fn test_surface_clamped_below_banks() {
        let (field, lake) = lake_setup();
        let config = WaterConfig {
            thickness_m: 0.4,
            protrusion_m: 2.5,
        };
        let fragments =
            generate_water_meshes(&[lake], &field, &config, &CancelToken::new()).unwrap();
        assert_eq!(fragments.len(), 1);

        // Requested protrusion would overshoot the banks (8 + 2.5 > 10), so
        // the top is clamped to 10 - 0.02 = 9.98.
        let (min, max) = fragments[0].mesh.bounds().unwrap();
        assert!((max[2] - 9.98).abs() < 1e-9);
        assert!((min[2] - (9.98 - 0.4)).abs() < 1e-9);
    }

    #[test]
    fn test_surface_at_protrusion_above_bed() {
        let (field, lake) = lake_setup();
        let config = WaterConfig {
            thickness_m: 0.4,
            protrusion_m: 0.1,
        };
        let fragments =
            generate_water_meshes(&[lake], &field, &config, &CancelToken::new()).unwrap();

        // Bed is at 8; interior vertices sit at 8 + 0.1.
        let (_, max) = fragments[0].mesh.bounds().unwrap();
        assert!((max[2] - 8.1).abs() < 1e-9);
    }

    #[test]
    fn test_water_outside_extent_dropped() {
        let (field, _) = lake_setup();
        let far = polygon![
            (x: 900.0, y: 900.0),
            (x: 950.0, y: 900.0),
            (x: 950.0, y: 950.0),
            (x: 900.0, y: 950.0),
        ];
        let fragments = generate_water_meshes(
            &[PolygonFeature::new(9, far)],
            &field,
            &WaterConfig::default(),
            &CancelToken::new(),
        )
        .unwrap();
        assert!(fragments.is_empty());
    }

    #[test]
    fn test_tiny_water_dropped() {
        let (field, _) = lake_setup();
        let puddle = polygon![
            (x: 10.0, y: 10.0),
            (x: 13.0, y: 10.0),
            (x: 13.0, y: 13.0),
            (x: 10.0, y: 13.0),
        ];
        let fragments = generate_water_meshes(
            &[PolygonFeature::new(9, puddle)],
            &field,
            &WaterConfig::default(),
            &CancelToken::new(),
        )
        .unwrap();
        assert!(fragments.is_empty());
    }
}
