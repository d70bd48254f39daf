use geo::{Area, BooleanOps, MultiPolygon, Simplify};
use log::debug;
use rayon::prelude::*;

use crate::domain::{Material, PolygonFeature};
use crate::error::PipelineError;
use crate::mesh::extrude_polygon;
use crate::pipeline::CancelToken;
use crate::scene::MeshFragment;
use crate::terrain::HeightField;

const STAGE: &str = "green";

/// Green areas smaller than this are dropped as noise.
const MIN_AREA_M2: f64 = 100.0;

#[derive(Debug, Clone)]
pub struct GreenConfig {
    pub height_m: f64,
    pub embed_m: f64,
}

impl Default for GreenConfig {
    fn default() -> Self {
        Self {
            height_m: 0.6,
            embed_m: 0.2,
        }
    }
}

/// Drape thin embossed slabs over parks and other green areas.
pub fn generate_green_meshes(
    features: &[PolygonFeature],
    field: &HeightField,
    config: &GreenConfig,
    cancel: &CancelToken,
) -> Result<Vec<MeshFragment>, PipelineError> {
    if config.height_m <= 0.0 {
        return Ok(Vec::new());
    }
    let provider = field.provider();
    let extent_poly = MultiPolygon(vec![field.bounds().to_polygon()]);

    let results: Vec<Vec<MeshFragment>> = features
        .par_iter()
        .map(|feature| {
            if cancel.is_cancelled() || feature.polygon.exterior().0.len() < 4 {
                return Vec::new();
            }
            let material = if feature.tags.get("leisure").map(String::as_str) == Some("park") {
                Material::Park
            } else {
                Material::Green
            };

            let clipped = MultiPolygon(vec![feature.polygon.clone()]).intersection(&extent_poly);
            let mut fragments = Vec::new();
            for poly in &clipped.0 {
                if poly.unsigned_area() < MIN_AREA_M2 {
                    continue;
                }
                let poly = poly.simplify(&0.5);
                let mut mesh = extrude_polygon(&poly, config.height_m);
                if mesh.is_empty() {
                    continue;
                }
                mesh.drape_z(|x, y, z_local| {
                    provider.height_at(x, y) + z_local - config.embed_m
                });
                fragments.push(MeshFragment::new(mesh, material));
            }
            fragments
        })
        .collect();

    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled { stage: STAGE });
    }

    let fragments: Vec<MeshFragment> = results.into_iter().flatten().collect();
    debug!("green: {} fragments from {} polygons", fragments.len(), features.len());
    Ok(fragments)
}
