use log::debug;

use crate::domain::{Material, PoiClass, PoiFeature};
use crate::error::PipelineError;
use crate::pipeline::CancelToken;
use crate::scene::MeshFragment;
use crate::terrain::{HeightField, TerrainProvider};
use crate::mesh::TriMesh;

const STAGE: &str = "poi";

#[derive(Debug, Clone)]
pub struct PoiConfig {
    pub height_m: f64,
    pub embed_m: f64,
    /// Hard cap on emitted markers.
    pub max: usize,
    /// Square footprint side length.
    pub footprint_m: f64,
}

impl Default for PoiConfig {
    fn default() -> Self {
        Self {
            height_m: 0.8,
            embed_m: 0.2,
            max: 600,
            footprint_m: 2.0,
        }
    }
}

/// Emit small prism markers for points of interest, merged into a single
/// fragment.
///
/// When the input exceeds the cap, selection is deterministic: class
/// priority first, then distance from the extent center, then input order.
/// Markers are emitted in input order.
pub fn generate_poi_meshes(
    features: &[PoiFeature],
    field: &HeightField,
    config: &PoiConfig,
    cancel: &CancelToken,
) -> Result<Vec<MeshFragment>, PipelineError> {
    if features.is_empty() || config.max == 0 {
        return Ok(Vec::new());
    }
    let provider = field.provider();
    let extent = field.bounds();

    let selected = select_pois(features, &extent.center(), config.max);

    let half = config.footprint_m / 2.0;
    let mut mesh = TriMesh::new();
    let mut emitted = 0usize;
    for &idx in &selected {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled { stage: STAGE });
        }
        let p = &features[idx].point;
        if !extent.contains(p.x(), p.y()) {
            continue;
        }
        mesh.append(&marker(p.x(), p.y(), half, &provider, config));
        emitted += 1;
    }

    debug!("poi: {emitted} markers of {} candidates", features.len());
    if mesh.is_empty() {
        return Ok(Vec::new());
    }
    Ok(vec![MeshFragment::new(mesh, Material::Poi)])
}

/// Indices of the kept POIs, in input order.
fn select_pois(features: &[PoiFeature], center: &(f64, f64), max: usize) -> Vec<usize> {
    if features.len() <= max {
        return (0..features.len()).collect();
    }

    let mut ranked: Vec<(u8, f64, usize)> = features
        .iter()
        .enumerate()
        .map(|(idx, f)| {
            let dx = f.point.x() - center.0;
            let dy = f.point.y() - center.1;
            (PoiClass::from_tags(&f.tags).priority(), dx * dx + dy * dy, idx)
        })
        .collect();
    ranked.sort_by(|a, b| {
        a.0.cmp(&b.0)
            .then(a.1.total_cmp(&b.1))
            .then(a.2.cmp(&b.2))
    });
    ranked.truncate(max);

    let mut kept: Vec<usize> = ranked.into_iter().map(|(_, _, idx)| idx).collect();
    kept.sort_unstable();
    kept
}

fn marker(
    x: f64,
    y: f64,
    half: f64,
    provider: &TerrainProvider,
    config: &PoiConfig,
) -> TriMesh {
    let center_z = provider.height_at(x, y) + config.height_m / 2.0 - config.embed_m;
    TriMesh::axis_box(
        x,
        y,
        half,
        half,
        center_z - config.height_m / 2.0,
        center_z + config.height_m / 2.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Tags;
    use crate::geometry::Bounds;
    use geo::Point;

    fn flat_field() -> HeightField {
        let bounds = Bounds::new(0.0, 0.0, 100.0, 100.0);
        HeightField::from_grid(&bounds, 11, 11, vec![7.0; 121]).unwrap()
    }

    fn poi(id: u64, x: f64, y: f64) -> PoiFeature {
        PoiFeature::new(id, Point::new(x, y))
    }

    #[test]
    fn test_markers_on_terrain() {
        let field = flat_field();
        let config = PoiConfig::default();
        let fragments = generate_poi_meshes(
            &[poi(1, 30.0, 30.0), poi(2, 60.0, 60.0)],
            &field,
            &config,
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].material, Material::Poi);

        // Two boxes: embedded 0.2 into the 7 m terrain, 0.8 tall.
        let (min, max) = fragments[0].mesh.bounds().unwrap();
        assert!((min[2] - 6.8).abs() < 1e-9);
        assert!((max[2] - 7.4).abs() < 1e-9);
        assert_eq!(fragments[0].mesh.vertices.len(), 16);
    }

    #[test]
    fn test_cap_prefers_class_then_distance() {
        let field = flat_field();
        let mut fountain_tags = Tags::new();
        fountain_tags.insert("amenity".to_string(), "fountain".to_string());

        // A far fountain must beat a near bench when only one slot remains.
        let features = vec![
            poi(1, 51.0, 51.0), // near center, Other
            poi(2, 90.0, 90.0).with_tags(fountain_tags),
        ];
        let config = PoiConfig {
            max: 1,
            ..Default::default()
        };
        let fragments =
            generate_poi_meshes(&features, &field, &config, &CancelToken::new()).unwrap();
        let (min, max) = fragments[0].mesh.bounds().unwrap();
        // Only the fountain at (90, 90) survives.
        assert!(min[0] > 80.0 && max[0] < 100.0);
    }

    #[test]
    fn test_outside_extent_skipped() {
        let field = flat_field();
        let fragments = generate_poi_meshes(
            &[poi(1, 500.0, 500.0)],
            &field,
            &PoiConfig::default(),
            &CancelToken::new(),
        )
        .unwrap();
        assert!(fragments.is_empty());
    }

    #[test]
    fn test_selection_is_input_stable() {
        let features: Vec<PoiFeature> = (0..10)
            .map(|k| poi(k, 10.0 + k as f64 * 5.0, 50.0))
            .collect();
        let kept = select_pois(&features, &(50.0, 50.0), 4);
        // Emission order follows input order.
        let mut sorted = kept.clone();
        sorted.sort_unstable();
        assert_eq!(kept, sorted);
        assert_eq!(kept.len(), 4);
    }
}
