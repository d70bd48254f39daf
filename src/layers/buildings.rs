use geo::{Area, BooleanOps, BoundingRect, Centroid, Contains, MultiPolygon, Point, Polygon, Simplify};
use log::{debug, warn};
use rayon::prelude::*;

use crate::domain::{Material, PolygonFeature, Tags};
use crate::error::PipelineError;
use crate::mesh::extrude_polygon;
use crate::pipeline::CancelToken;
use crate::scene::MeshFragment;
use crate::terrain::TerrainProvider;

const STAGE: &str = "buildings";

/// A vertex may sit at most this far below its local ground.
const GROUND_TOLERANCE_M: f64 = 0.05;

/// Meters of height assumed per tagged building level.
const METERS_PER_LEVEL: f64 = 3.0;
const METERS_PER_ROOF_LEVEL: f64 = 1.5;

#[derive(Debug, Clone)]
pub struct BuildingConfig {
    pub min_height_m: f64,
    pub height_multiplier: f64,
    /// Foundation sunk below the base elevation.
    pub foundation_m: f64,
    /// How far the footprint is pressed into the terrain.
    pub embed_m: f64,
    /// Lift above the lowest ground sample when not embedding.
    pub safety_margin_m: f64,
}

impl Default for BuildingConfig {
    fn default() -> Self {
        Self {
            min_height_m: 2.0,
            height_multiplier: 1.0,
            foundation_m: 0.5,
            embed_m: 0.2,
            safety_margin_m: 0.1,
        }
    }
}

/// Generate one prism fragment per building polygon, seated on the terrain.
///
/// Features are processed in parallel; output order is input order.
/// Degenerate polygons are skipped with a warning, never fatal.
pub fn generate_building_meshes(
    features: &[PolygonFeature],
    provider: &TerrainProvider,
    config: &BuildingConfig,
    cancel: &CancelToken,
) -> Result<Vec<MeshFragment>, PipelineError> {
    let results: Vec<Option<MeshFragment>> = features
        .par_iter()
        .map(|feature| {
            if cancel.is_cancelled() {
                return None;
            }
            match build_one(feature, provider, config) {
                Ok(fragment) => fragment,
                Err(e) => {
                    warn!("{e}");
                    None
                }
            }
        })
        .collect();

    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled { stage: STAGE });
    }

    let fragments: Vec<MeshFragment> = results.into_iter().flatten().collect();
    debug!("built {} of {} buildings", fragments.len(), features.len());
    Ok(fragments)
}

fn build_one(
    feature: &PolygonFeature,
    provider: &TerrainProvider,
    config: &BuildingConfig,
) -> Result<Option<MeshFragment>, PipelineError> {
    let area = feature.polygon.unsigned_area();
    if feature.polygon.exterior().0.len() < 4 || area <= 1e-6 {
        return Err(PipelineError::DegenerateFeature {
            stage: STAGE,
            feature: feature.id,
            reason: format!("footprint area {area:.3} m^2"),
        });
    }

    // Light simplification removes redundant vertices before triangulation.
    let simplified = feature.polygon.simplify(&0.1);
    let polygon = if simplified.exterior().0.len() >= 4 && simplified.unsigned_area() > 1e-6 {
        simplified
    } else {
        feature.polygon.clone()
    };

    // Clip to the terrain extent so boundary-straddling footprints never
    // emit out-of-extent vertices. Each remaining part is seated on its own
    // ground level.
    let extent = MultiPolygon(vec![provider.bounds().to_polygon()]);
    let clipped = MultiPolygon(vec![polygon]).intersection(&extent);
    if clipped.0.is_empty() {
        return Ok(None);
    }

    let height = resolve_height(feature, config);
    let mut mesh = crate::mesh::TriMesh::new();
    for part in &clipped.0 {
        let part_area = part.unsigned_area();
        if part_area <= 1e-6 {
            continue;
        }
        if let Some(prism) = build_prism(part, part_area, height, provider, config) {
            mesh.append(&prism);
        }
    }
    if mesh.is_empty() {
        return Err(PipelineError::InternalGeometryFailure {
            stage: STAGE,
            feature: feature.id,
            reason: "extrusion produced no faces".to_string(),
        });
    }

    Ok(Some(MeshFragment::new(mesh, Material::Building)))
}

fn build_prism(
    polygon: &Polygon<f64>,
    area: f64,
    height: f64,
    provider: &TerrainProvider,
    config: &BuildingConfig,
) -> Option<crate::mesh::TriMesh> {
    let samples = ground_samples(polygon, area, provider);
    let ground_min = samples.iter().cloned().fold(f64::MAX, f64::min);

    let base_z = if config.embed_m > 0.0 {
        ground_min - config.embed_m
    } else {
        ground_min + config.safety_margin_m
    };
    let translate_z = base_z - config.foundation_m;

    let mut mesh = extrude_polygon(polygon, height);
    if mesh.is_empty() {
        return None;
    }
    mesh.translate(0.0, 0.0, translate_z);

    // Two correction passes against the triangle-exact ground. First the
    // lowest 20% of the prism, then a full recheck; each lifts the whole
    // mesh uniformly by the worst remaining deficit.
    let bottom_limit = translate_z + height * 0.2;
    lift_above_ground(&mut mesh, provider, Some(bottom_limit));
    lift_above_ground(&mut mesh, provider, None);

    Some(mesh)
}

fn lift_above_ground(
    mesh: &mut crate::mesh::TriMesh,
    provider: &TerrainProvider,
    z_limit: Option<f64>,
) {
    let mut max_deficit = 0.0f64;
    for v in &mesh.vertices {
        if let Some(limit) = z_limit {
            if v[2] > limit {
                continue;
            }
        }
        let ground = provider.height_at(v[0], v[1]);
        let deficit = (ground - GROUND_TOLERANCE_M) - v[2];
        if deficit > max_deficit {
            max_deficit = deficit;
        }
    }
    if max_deficit > 0.0 {
        mesh.translate(0.0, 0.0, max_deficit);
    }
}

/// Resolve the extruded height from the explicit attribute or OSM tags:
/// explicit meters win, then `building:levels` at 3 m per level, plus
/// `roof:height` or `roof:levels` at 1.5 m. Clamped to the configured
/// minimum, then multiplied.
fn resolve_height(feature: &PolygonFeature, config: &BuildingConfig) -> f64 {
    let mut height = feature.height_m.or_else(|| tag_height_m(&feature.tags));

    if height.is_none() {
        height = tag_number(&feature.tags, &["building:levels", "levels"])
            .map(|levels| levels * METERS_PER_LEVEL);
    }

    let roof = tag_height_tagged(&feature.tags, "roof:height").or_else(|| {
        tag_number(&feature.tags, &["roof:levels"]).map(|l| l * METERS_PER_ROOF_LEVEL)
    });
    if let Some(r) = roof {
        height = Some(height.unwrap_or(0.0) + r);
    }

    height
        .unwrap_or(config.min_height_m)
        .max(config.min_height_m)
        * config.height_multiplier
}

fn tag_height_m(tags: &Tags) -> Option<f64> {
    tag_height_tagged(tags, "height").or_else(|| tag_height_tagged(tags, "building:height"))
}

/// Parse a height tag, accepting "20", "20 m", "65 ft", comma decimals.
fn tag_height_tagged(tags: &Tags, key: &str) -> Option<f64> {
    let raw = tags.get(key)?;
    let value = parse_leading_number(raw)?;
    let lower = raw.to_ascii_lowercase();
    if lower.contains("ft") || lower.contains("feet") || lower.contains("foot") {
        Some(value * 0.3048)
    } else {
        Some(value)
    }
}

fn tag_number(tags: &Tags, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .find_map(|k| tags.get(*k).and_then(|v| parse_leading_number(v)))
        .filter(|&v| v > 0.0)
}

/// First number in a string; "5;6" and "5-6" yield 5, "3,5" yields 3.5.
fn parse_leading_number(s: &str) -> Option<f64> {
    let s = s.trim().replace(',', ".");
    let start = s.find(|c: char| c.is_ascii_digit() || c == '-' || c == '+')?;
    let rest = &s[start..];
    let end = rest
        .char_indices()
        .skip(1)
        .find(|(_, c)| !c.is_ascii_digit() && *c != '.')
        .map(|(i, _)| i)
        .unwrap_or(rest.len());
    rest[..end].parse().ok()
}

/// Adaptive ground sampling: ring points subsampled by footprint size, the
/// centroid, and an interior grid (none under 100 m^2, 3x3 under 1000 m^2,
/// 5x5 above).
fn ground_samples(polygon: &Polygon<f64>, area: f64, provider: &TerrainProvider) -> Vec<f64> {
    let mut points: Vec<(f64, f64)> = Vec::new();

    let ring = &polygon.exterior().0;
    let boundary_target: usize = if area < 100.0 {
        8
    } else if area < 1000.0 {
        16
    } else {
        32
    };
    let step = (ring.len() / boundary_target).max(1);
    for c in ring.iter().step_by(step) {
        points.push((c.x, c.y));
    }

    if let Some(c) = polygon.centroid() {
        points.push((c.x(), c.y()));
    }

    let divisions = if area < 100.0 {
        0
    } else if area < 1000.0 {
        4
    } else {
        6
    };
    if divisions > 0 {
        if let Some(rect) = polygon.bounding_rect() {
            let (w, h) = (rect.width(), rect.height());
            for i in 1..divisions {
                for j in 1..divisions {
                    let x = rect.min().x + w * i as f64 / divisions as f64;
                    let y = rect.min().y + h * j as f64 / divisions as f64;
                    if polygon.contains(&Point::new(x, y)) {
                        points.push((x, y));
                    }
                }
            }
        }
    }

    provider.heights_for(&points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Bounds;
    use crate::terrain::HeightField;
    use geo::polygon;

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn slope_field() -> HeightField {
        // Z(x) = x / 10 over 100 m.
        let bounds = Bounds::new(0.0, 0.0, 100.0, 100.0);
        let mut z = Vec::new();
        for _j in 0..11 {
            for i in 0..11 {
                z.push(i as f64);
            }
        }
        HeightField::from_grid(&bounds, 11, 11, z).unwrap()
    }

    fn square(cx: f64, cy: f64, half: f64) -> Polygon<f64> {
        polygon![
            (x: cx - half, y: cy - half),
            (x: cx + half, y: cy - half),
            (x: cx + half, y: cy + half),
            (x: cx - half, y: cy + half),
        ]
    }

    #[test]
    fn test_parse_leading_number() {
        assert_eq!(parse_leading_number("20"), Some(20.0));
        assert_eq!(parse_leading_number("20.5 m"), Some(20.5));
        assert_eq!(parse_leading_number("3,5"), Some(3.5));
        assert_eq!(parse_leading_number("5;6"), Some(5.0));
        assert_eq!(parse_leading_number("about 12"), Some(12.0));
        assert_eq!(parse_leading_number("tall"), None);
    }

    #[test]
    fn test_resolve_height_explicit_wins() {
        let config = BuildingConfig::default();
        let feature = PolygonFeature::new(1, square(0.0, 0.0, 5.0))
            .with_height(25.0)
            .with_tags(tags(&[("building:levels", "2")]));
        assert_eq!(resolve_height(&feature, &config), 25.0);
    }

    #[test]
    fn test_resolve_height_from_levels_and_roof() {
        let config = BuildingConfig::default();
        let feature = PolygonFeature::new(1, square(0.0, 0.0, 5.0))
            .with_tags(tags(&[("building:levels", "4"), ("roof:levels", "1")]));
        // 4 * 3.0 + 1 * 1.5
        assert_eq!(resolve_height(&feature, &config), 13.5);
    }

    #[test]
    fn test_resolve_height_feet() {
        let config = BuildingConfig::default();
        let feature = PolygonFeature::new(1, square(0.0, 0.0, 5.0))
            .with_tags(tags(&[("height", "65 ft")]));
        assert!((resolve_height(&feature, &config) - 65.0 * 0.3048).abs() < 1e-9);
    }

    #[test]
    fn test_resolve_height_clamps_to_minimum() {
        let config = BuildingConfig::default();
        let feature =
            PolygonFeature::new(1, square(0.0, 0.0, 5.0)).with_tags(tags(&[("height", "0.5")]));
        assert_eq!(resolve_height(&feature, &config), config.min_height_m);
    }

    #[test]
    fn test_resolve_height_multiplier() {
        let config = BuildingConfig {
            height_multiplier: 2.0,
            ..Default::default()
        };
        let feature =
            PolygonFeature::new(1, square(0.0, 0.0, 5.0)).with_tags(tags(&[("height", "10")]));
        assert_eq!(resolve_height(&feature, &config), 20.0);
    }

    #[test]
    fn test_building_sits_on_terrain() {
        let field = slope_field();
        let provider = field.provider();
        let config = BuildingConfig::default();
        let features = vec![PolygonFeature::new(1, square(50.0, 50.0, 10.0)).with_height(12.0)];

        let fragments =
            generate_building_meshes(&features, &provider, &config, &CancelToken::new()).unwrap();
        assert_eq!(fragments.len(), 1);

        // Every vertex at most 5 cm below its local ground.
        for v in &fragments[0].mesh.vertices {
            let ground = provider.height_at(v[0], v[1]);
            assert!(
                v[2] >= ground - GROUND_TOLERANCE_M - 1e-9,
                "vertex at {:?} below ground {ground}",
                v
            );
        }
    }

    #[test]
    fn test_degenerate_building_skipped() {
        let field = slope_field();
        let provider = field.provider();
        let config = BuildingConfig::default();
        let sliver = polygon![
            (x: 0.0, y: 0.0),
            (x: 10.0, y: 0.0),
            (x: 20.0, y: 0.0),
        ];
        let features = vec![
            PolygonFeature::new(1, sliver),
            PolygonFeature::new(2, square(50.0, 50.0, 5.0)),
        ];

        let fragments =
            generate_building_meshes(&features, &provider, &config, &CancelToken::new()).unwrap();
        assert_eq!(fragments.len(), 1);
    }

    #[test]
    fn test_boundary_building_is_clipped() {
        let field = slope_field();
        let provider = field.provider();
        // Footprint straddles the eastern extent edge at x = 100.
        let features = vec![PolygonFeature::new(1, square(95.0, 50.0, 10.0)).with_height(10.0)];
        let fragments = generate_building_meshes(
            &features,
            &provider,
            &BuildingConfig::default(),
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(fragments.len(), 1);
        for v in &fragments[0].mesh.vertices {
            assert!(v[0] <= 100.0 + 1e-9);
        }
    }

    #[test]
    fn test_building_outside_extent_skipped() {
        let field = slope_field();
        let provider = field.provider();
        let features = vec![PolygonFeature::new(1, square(500.0, 500.0, 10.0))];
        let fragments = generate_building_meshes(
            &features,
            &provider,
            &BuildingConfig::default(),
            &CancelToken::new(),
        )
        .unwrap();
        assert!(fragments.is_empty());
    }

    #[test]
    fn test_cancelled() {
        let field = slope_field();
        let provider = field.provider();
        let cancel = CancelToken::new();
        cancel.cancel();
        let features = vec![PolygonFeature::new(1, square(50.0, 50.0, 5.0))];
        let err = generate_building_meshes(
            &features,
            &provider,
            &BuildingConfig::default(),
            &cancel,
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled { .. }));
    }
}
