use geo::{Area, BooleanOps, Coord, Intersects, LineString, MultiPolygon, Polygon};
use log::{debug, warn};
use rayon::prelude::*;

use crate::domain::{LineFeature, Material, RoadClass};
use crate::error::PipelineError;
use crate::geometry::{buffer_polyline, union_all, union_all_multi, Bounds};
use crate::mesh::{extrude_polygon, TriMesh};
use crate::pipeline::CancelToken;
use crate::scene::MeshFragment;
use crate::terrain::{quantile, HeightField, TerrainProvider};

const STAGE: &str = "roads";

/// Minimum vertical gap kept between a draped road and the ground, so roads
/// never vanish into steep slopes.
const CLEARANCE_M: f64 = 0.02;

/// Water overlap below this area does not make a road a bridge.
const MIN_WATER_OVERLAP_M2: f64 = 1.0;

/// Bridge support footprint (square side).
const SUPPORT_WIDTH_M: f64 = 2.5;

/// Maximum spacing between bridge supports along the centerline.
const SUPPORT_SPACING_M: f64 = 20.0;

/// Per-class road widths in meters, overridable via configuration.
#[derive(Debug, Clone)]
pub struct ClassWidths {
    pub motorway: f64,
    pub trunk: f64,
    pub primary: f64,
    pub secondary: f64,
    pub tertiary: f64,
    pub residential: f64,
    pub service: f64,
    pub footway: f64,
    pub other: f64,
}

impl Default for ClassWidths {
    fn default() -> Self {
        Self {
            motorway: RoadClass::Motorway.default_width_m(),
            trunk: RoadClass::Trunk.default_width_m(),
            primary: RoadClass::Primary.default_width_m(),
            secondary: RoadClass::Secondary.default_width_m(),
            tertiary: RoadClass::Tertiary.default_width_m(),
            residential: RoadClass::Residential.default_width_m(),
            service: RoadClass::Service.default_width_m(),
            footway: RoadClass::Footway.default_width_m(),
            other: RoadClass::Other.default_width_m(),
        }
    }
}

impl ClassWidths {
    pub fn width_for(&self, class: RoadClass) -> f64 {
        match class {
            RoadClass::Motorway => self.motorway,
            RoadClass::Trunk => self.trunk,
            RoadClass::Primary => self.primary,
            RoadClass::Secondary => self.secondary,
            RoadClass::Tertiary => self.tertiary,
            RoadClass::Residential => self.residential,
            RoadClass::Service => self.service,
            RoadClass::Footway => self.footway,
            RoadClass::Other => self.other,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RoadConfig {
    pub width_multiplier: f64,
    /// Extrusion height of the road slab.
    pub height_m: f64,
    /// Nominal embed into the terrain; reduced adaptively on steep ground.
    pub embed_m: f64,
    pub widths: ClassWidths,
}

impl Default for RoadConfig {
    fn default() -> Self {
        Self {
            width_multiplier: 1.0,
            height_m: 0.5,
            embed_m: 0.3,
            widths: ClassWidths::default(),
        }
    }
}

/// Generate road fragments: draped ground roads first, then bridge decks
/// with their supports, in input order.
///
/// A line is a bridge when its `bridge` tag is truthy or its buffered
/// footprint overlaps a water polygon by more than a trivial area.
pub fn generate_road_meshes(
    roads: &[LineFeature],
    water: &[Polygon<f64>],
    field: &HeightField,
    config: &RoadConfig,
    cancel: &CancelToken,
) -> Result<Vec<MeshFragment>, PipelineError> {
    let provider = field.provider();
    let original = field.original_provider();
    let extent = field.bounds();
    let extent_poly = MultiPolygon(vec![extent.to_polygon()]);

    // Buffer every centerline at its class width.
    let buffered: Vec<MultiPolygon<f64>> = roads
        .par_iter()
        .map(|road| {
            let width = config.widths.width_for(road.class) * config.width_multiplier;
            buffer_polyline(&road.line, width / 2.0)
        })
        .collect();

    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled { stage: STAGE });
    }

    let water_union = union_all(water.to_vec());

    let is_bridge: Vec<bool> = roads
        .iter()
        .zip(&buffered)
        .map(|(road, footprint)| {
            road.bridge_tagged()
                || (!water_union.0.is_empty()
                    && footprint.intersects(&water_union)
                    && footprint.intersection(&water_union).unsigned_area() > MIN_WATER_OVERLAP_M2)
        })
        .collect();

    let mut fragments = Vec::new();

    // Ground roads: union all non-bridge footprints into one layer, clip to
    // the terrain extent, then drape polygon by polygon.
    let ground_layer: Vec<MultiPolygon<f64>> = buffered
        .iter()
        .zip(is_bridge.iter().copied())
        .filter(|&(_, bridge)| !bridge)
        .map(|(mp, _)| mp.clone())
        .collect();
    let ground_union = union_all_multi(ground_layer).intersection(&extent_poly);

    let ground_fragments: Vec<Option<MeshFragment>> = ground_union
        .0
        .par_iter()
        .map(|poly| {
            if cancel.is_cancelled() || poly.unsigned_area() < 1e-3 {
                return None;
            }
            Some(drape_ground_road(poly, &provider, config))
        })
        .collect();
    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled { stage: STAGE });
    }
    fragments.extend(ground_fragments.into_iter().flatten());

    // Bridges, one deck (plus supports) per line.
    for (idx, road) in roads.iter().enumerate() {
        if !is_bridge[idx] {
            continue;
        }
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled { stage: STAGE });
        }
        match build_bridge(road, &buffered[idx], &extent_poly, &provider, &original, config) {
            Ok(Some(fragment)) => fragments.push(fragment),
            Ok(None) => {}
            Err(e) => warn!("{e}"),
        }
    }

    debug!(
        "roads: {} fragments from {} lines ({} bridges)",
        fragments.len(),
        roads.len(),
        is_bridge.iter().filter(|&&b| b).count()
    );
    Ok(fragments)
}

/// Extrude and drape one ground road polygon onto the terrain.
fn drape_ground_road(
    poly: &Polygon<f64>,
    provider: &TerrainProvider,
    config: &RoadConfig,
) -> MeshFragment {
    let mut mesh = extrude_polygon(poly, config.height_m.max(0.05));

    // Local slope across the polygon decides the effective embed.
    let grounds: Vec<f64> = mesh
        .vertices
        .iter()
        .map(|v| provider.height_at(v[0], v[1]))
        .collect();
    let g_min = grounds.iter().cloned().fold(f64::MAX, f64::min);
    let g_max = grounds.iter().cloned().fold(f64::MIN, f64::max);
    let embed = effective_embed(config.embed_m, g_max - g_min);

    mesh.drape_z(|x, y, z_local| {
        let g = provider.height_at(x, y);
        (g + z_local - embed).max(g + CLEARANCE_M)
    });

    MeshFragment::new(mesh, Material::Road)
}

/// Reduce the embed linearly once the local slope exceeds twice its value,
/// bottoming out at 50% of nominal at four times.
fn effective_embed(embed: f64, slope: f64) -> f64 {
    if embed <= 0.0 || slope <= 2.0 * embed {
        return embed;
    }
    let factor = 1.0 - 0.5 * (slope - 2.0 * embed) / (2.0 * embed);
    embed * factor.clamp(0.5, 1.0)
}

/// Build one bridge deck lifted to its base level, with supports at the
/// line ends and at most every 20 m between them.
fn build_bridge(
    road: &LineFeature,
    footprint: &MultiPolygon<f64>,
    extent: &MultiPolygon<f64>,
    provider: &TerrainProvider,
    original: &TerrainProvider,
    config: &RoadConfig,
) -> Result<Option<MeshFragment>, PipelineError> {
    let clipped = footprint.intersection(extent);
    if clipped.0.is_empty() {
        return Ok(None);
    }

    let height = config.height_m.max(0.05);
    let mut deck = TriMesh::new();
    for poly in &clipped.0 {
        if poly.unsigned_area() < 1e-3 {
            continue;
        }
        deck.append(&extrude_polygon(poly, height));
    }
    if deck.is_empty() {
        return Err(PipelineError::InternalGeometryFailure {
            stage: STAGE,
            feature: road.id,
            reason: "bridge footprint produced no faces".to_string(),
        });
    }

    // Water level estimate from the pre-depression terrain under the deck.
    let deck_xy: Vec<(f64, f64)> = deck.vertices.iter().map(|v| (v[0], v[1])).collect();
    let originals = original.heights_for(&deck_xy);
    let grounds = provider.heights_for(&deck_xy);
    let water_level = quantile(&originals, 0.5) - 0.2;
    let ground_med = quantile(&grounds, 0.5);

    let class_height = road.bridge_kind().clearance_m();
    let base = (water_level + class_height.max(3.0)).max(ground_med + class_height);

    deck.drape_z(|_, _, z_local| base + z_local);

    // Supports: both ends plus intermediates at <= 20 m spacing. Bottoms
    // reach the lower of local ground and half a meter below water level.
    let length = polyline_length(&road.line);
    let intermediates = (length / SUPPORT_SPACING_M).floor() as usize;
    let extent_bounds = bounds_of(extent);
    for k in 0..=(intermediates + 1) {
        let d = length * k as f64 / (intermediates + 1) as f64;
        let Some(p) = point_along(&road.line, d) else {
            continue;
        };
        if !extent_bounds.contains(p.x, p.y) {
            continue;
        }
        let ground = provider.height_at(p.x, p.y);
        let bottom = ground.min(water_level - 0.5);
        if base - bottom < 0.1 {
            continue;
        }
        deck.append(&TriMesh::axis_box(
            p.x,
            p.y,
            SUPPORT_WIDTH_M / 2.0,
            SUPPORT_WIDTH_M / 2.0,
            bottom,
            base,
        ));
    }

    Ok(Some(MeshFragment::new(deck, Material::Bridge)))
}

fn polyline_length(line: &LineString<f64>) -> f64 {
    line.0
        .windows(2)
        .map(|w| ((w[1].x - w[0].x).powi(2) + (w[1].y - w[0].y).powi(2)).sqrt())
        .sum()
}

/// Point at arc-length distance `d` along the line, clamped to its ends.
fn point_along(line: &LineString<f64>, d: f64) -> Option<Coord<f64>> {
    let pts = &line.0;
    if pts.is_empty() {
        return None;
    }
    if d <= 0.0 {
        return Some(pts[0]);
    }
    let mut remaining = d;
    for w in pts.windows(2) {
        let seg = ((w[1].x - w[0].x).powi(2) + (w[1].y - w[0].y).powi(2)).sqrt();
        if seg > 0.0 && remaining <= seg {
            let t = remaining / seg;
            return Some(Coord {
                x: w[0].x + (w[1].x - w[0].x) * t,
                y: w[0].y + (w[1].y - w[0].y) * t,
            });
        }
        remaining -= seg;
    }
    pts.last().copied()
}

fn bounds_of(mp: &MultiPolygon<f64>) -> Bounds {
    use geo::BoundingRect;
    match mp.bounding_rect() {
        Some(r) => Bounds::new(r.min().x, r.min().y, r.max().x, r.max().y),
        None => Bounds::new(0.0, 0.0, 0.0, 0.0),
    }
}
