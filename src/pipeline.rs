use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use geo::Polygon;
use log::info;

use crate::config::GenerationParams;
use crate::domain::{LineFeature, Material, PoiFeature, PolygonFeature};
use crate::error::PipelineError;
use crate::geometry::{buffer_polyline, Bounds, GlobalAnchor};
use crate::layers::{
    generate_building_meshes, generate_green_meshes, generate_poi_meshes, generate_road_meshes,
    generate_water_meshes, BuildingConfig, GreenConfig, PoiConfig, RoadConfig, WaterConfig,
};
use crate::scene::{assemble, MeshFragment, Scene};
use crate::terrain::{solidify, ElevationSource, HeightField};

/// Cooperative cancellation flag, checked at stage boundaries and between
/// features. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Progress observer: percentage (0..=100) and stage name.
pub type ProgressCallback<'a> = dyn Fn(u8, &str) + Sync + 'a;

/// Geographic bounding box, WGS84 degrees.
#[derive(Debug, Clone, Copy)]
pub struct GeoBounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

/// Everything the pipeline consumes for one tile.
///
/// `region` is the union bounding box of the whole production (it pins the
/// coordinate anchor, so adjacent tiles stitch); `tile` is the extent
/// actually produced here. Feature coordinates are in the projected metric
/// CRS recorded by the anchor.
#[derive(Debug, Clone, Default)]
pub struct RegionInputs {
    pub region: Option<GeoBounds>,
    pub tile: Option<GeoBounds>,
    pub buildings: Vec<PolygonFeature>,
    pub roads: Vec<LineFeature>,
    pub water: Vec<PolygonFeature>,
    pub green: Vec<PolygonFeature>,
    pub pois: Vec<PoiFeature>,
}

impl RegionInputs {
    /// Single-tile production: the tile is the whole region.
    pub fn for_tile(tile: GeoBounds) -> Self {
        Self {
            region: Some(tile),
            tile: Some(tile),
            ..Default::default()
        }
    }
}

/// Run the full composition pipeline for one tile and return the
/// normalized scene.
///
/// Stages: height field (with flatten/depress), terrain solid, buildings,
/// roads, water, green, POI, assembly. Per-feature failures are logged and
/// skipped; structural failures abort. The progress callback fires after
/// every stage.
pub fn generate_scene(
    inputs: &RegionInputs,
    params: &GenerationParams,
    elevation: &dyn ElevationSource,
    progress: Option<&ProgressCallback>,
    cancel: &CancelToken,
) -> Result<Scene, PipelineError> {
    let params = params.clone().clamped();
    let report = |pct: u8, stage: &str| {
        if let Some(cb) = progress {
            cb(pct, stage);
        }
    };
    let check = |stage: &'static str| -> Result<(), PipelineError> {
        if cancel.is_cancelled() {
            Err(PipelineError::Cancelled { stage })
        } else {
            Ok(())
        }
    };

    check("terrain")?;
    let region = inputs.region.ok_or(PipelineError::InvalidInput {
        stage: "terrain",
        reason: "missing region bounds".to_string(),
    })?;
    let tile = inputs.tile.unwrap_or(region);

    if params.model_size_mm <= 0.0 || !params.model_size_mm.is_finite() {
        return Err(PipelineError::InvalidInput {
            stage: "terrain",
            reason: format!("model size must be positive, got {}", params.model_size_mm),
        });
    }

    let anchor = GlobalAnchor::for_region(region.south, region.west, region.north, region.east)?;
    let extent = tile_extent(&anchor, &tile)?;

    // Print-aware millimeter parameters convert to world meters through the
    // model scale, which is fixed by the extent before anything is built.
    let meters_per_model_mm = (extent.width() + extent.height()) / 2.0 / params.model_size_mm;

    let buildings: Vec<PolygonFeature> =
        inputs.buildings.iter().map(|f| f.to_local(&anchor)).collect();
    let roads: Vec<LineFeature> = inputs.roads.iter().map(|f| f.to_local(&anchor)).collect();
    let water: Vec<PolygonFeature> = inputs.water.iter().map(|f| f.to_local(&anchor)).collect();
    let green: Vec<PolygonFeature> = inputs.green.iter().map(|f| f.to_local(&anchor)).collect();
    let pois: Vec<PoiFeature> = inputs.pois.iter().map(|f| f.to_local(&anchor)).collect();

    // Stage 1: height field and its terrain-first modification passes.
    let mut field = HeightField::build(
        &extent,
        params.resolution,
        params.elevation_ref_m,
        params.z_scale,
        &anchor,
        elevation,
    )?;
    field.smooth(params.smoothing_sigma);

    if params.flatten_buildings && !buildings.is_empty() {
        let polys: Vec<Polygon<f64>> = buildings.iter().map(|f| f.polygon.clone()).collect();
        let n = field.flatten_under(&polys, 0.5);
        info!("flattened terrain under {n} buildings");
    }
    if params.flatten_roads && !roads.is_empty() {
        let polys: Vec<Polygon<f64>> = roads
            .iter()
            .flat_map(|road| {
                let width =
                    params.road_widths.width_for(road.class) * params.road_width_multiplier;
                buffer_polyline(&road.line, width / 2.0).0
            })
            .collect();
        let n = field.flatten_under(&polys, params.flatten_road_quantile);
        info!("flattened terrain under {n} road polygons");
    }

    let water_polys: Vec<Polygon<f64>> = water.iter().map(|f| f.polygon.clone()).collect();
    if params.water_depth_m > 0.0 && !water_polys.is_empty() {
        let n = field.depress_under(
            &water_polys,
            params.water_depth_m,
            params.water_surface_quantile,
        );
        info!("depressed terrain under {n} water polygons");
    }
    report(15, "terrain");

    // Stage 2: watertight terrain solid.
    check("terrain solid")?;
    let base_thickness_m = params.base_thickness_mm * meters_per_model_mm;
    let solid = solidify(&field, base_thickness_m, params.subdivision_levels)?;
    report(30, "terrain solid");

    // Stage 3: buildings.
    check("buildings")?;
    let building_config = BuildingConfig {
        min_height_m: params.building_min_height_m,
        height_multiplier: params.building_height_multiplier,
        foundation_m: params.building_foundation_mm * meters_per_model_mm,
        embed_m: params.building_embed_mm * meters_per_model_mm,
        safety_margin_m: params.building_safety_margin_m,
    };
    let building_fragments = {
        let provider = field.provider();
        generate_building_meshes(&buildings, &provider, &building_config, cancel)?
    };
    report(45, "buildings");

    // Stage 4: roads and bridges.
    check("roads")?;
    let road_config = RoadConfig {
        width_multiplier: params.road_width_multiplier,
        height_m: params.road_height_mm * meters_per_model_mm,
        embed_m: params.road_embed_mm * meters_per_model_mm,
        widths: params.road_widths.clone(),
    };
    let road_fragments = generate_road_meshes(&roads, &water_polys, &field, &road_config, cancel)?;
    report(60, "roads");

    // Stage 5: water surface.
    check("water")?;
    let water_config = WaterConfig {
        thickness_m: params.water_thickness_m,
        protrusion_m: params.water_protrusion_m,
    };
    let water_fragments = generate_water_meshes(&water, &field, &water_config, cancel)?;
    report(70, "water");

    // Stage 6: green areas.
    check("green")?;
    let green_config = GreenConfig {
        height_m: params.green_height_m,
        embed_m: params.green_embed_m,
    };
    let green_fragments = generate_green_meshes(&green, &field, &green_config, cancel)?;
    report(80, "green");

    // Stage 7: POI markers.
    check("poi")?;
    let poi_config = PoiConfig {
        height_m: params.poi_height_m,
        embed_m: params.poi_embed_m,
        max: params.poi_max,
        ..Default::default()
    };
    let poi_fragments = generate_poi_meshes(&pois, &field, &poi_config, cancel)?;
    report(85, "poi");

    // Stage 8: assemble in the documented insertion order.
    check("assemble")?;
    let mut fragments = Vec::with_capacity(
        1 + road_fragments.len()
            + building_fragments.len()
            + water_fragments.len()
            + green_fragments.len()
            + poi_fragments.len(),
    );
    fragments.push(MeshFragment::new(solid, Material::Base));
    fragments.extend(road_fragments);
    fragments.extend(building_fragments);
    fragments.extend(water_fragments);
    fragments.extend(green_fragments);
    fragments.extend(poi_fragments);

    let scene = assemble(fragments, params.model_size_mm, &params.palette)?;
    report(100, "assemble");
    Ok(scene)
}

fn tile_extent(anchor: &GlobalAnchor, tile: &GeoBounds) -> Result<Bounds, PipelineError> {
    let (x0, y0) = anchor.to_projected(tile.south, tile.west);
    let (x1, y1) = anchor.to_projected(tile.north, tile.east);
    let (lx0, ly0) = anchor.to_local(x0, y0);
    let (lx1, ly1) = anchor.to_local(x1, y1);
    let extent = Bounds::new(lx0.min(lx1), ly0.min(ly1), lx0.max(lx1), ly0.max(ly1));
    if extent.is_empty() {
        return Err(PipelineError::InvalidInput {
            stage: "terrain",
            reason: format!("empty tile extent {tile:?}"),
        });
    }
    Ok(extent)
}
