use serde::Deserialize;
use std::path::PathBuf;

use crate::scene::Palette;

/// Resolved parameter set consumed by the pipeline.
///
/// Print-aware sizes (`*_mm`) are millimeters on the final model and are
/// converted to world meters once the model scale is known; `*_m` values are
/// world meters. [`GenerationParams::clamped`] applies the documented ranges.
#[derive(Debug, Clone)]
pub struct GenerationParams {
    /// Grid nodes along the longer extent axis. Clamped to 60..=320.
    pub resolution: usize,
    pub z_scale: f64,
    pub smoothing_sigma: f64,
    /// Scalar subtracted from raw elevation samples. Must be identical
    /// across tiles of the same world region.
    pub elevation_ref_m: f64,
    pub base_thickness_mm: f64,
    pub model_size_mm: f64,
    /// Terrain-solid subdivision levels, at most 2.
    pub subdivision_levels: u8,

    pub road_width_multiplier: f64,
    pub road_height_mm: f64,
    pub road_embed_mm: f64,
    pub road_widths: crate::layers::ClassWidths,

    pub building_min_height_m: f64,
    pub building_height_multiplier: f64,
    pub building_foundation_mm: f64,
    pub building_embed_mm: f64,
    pub building_safety_margin_m: f64,

    pub water_depth_m: f64,
    pub water_thickness_m: f64,
    pub water_protrusion_m: f64,
    pub water_surface_quantile: f64,

    pub flatten_buildings: bool,
    pub flatten_roads: bool,
    pub flatten_road_quantile: f64,

    pub green_height_m: f64,
    pub green_embed_m: f64,

    pub poi_height_m: f64,
    pub poi_embed_m: f64,
    pub poi_max: usize,

    pub palette: Palette,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            resolution: 180,
            z_scale: 1.0,
            smoothing_sigma: 2.0,
            elevation_ref_m: 0.0,
            base_thickness_mm: 2.0,
            model_size_mm: 100.0,
            subdivision_levels: 0,
            road_width_multiplier: 1.0,
            road_height_mm: 0.5,
            road_embed_mm: 0.3,
            road_widths: crate::layers::ClassWidths::default(),
            building_min_height_m: 2.0,
            building_height_multiplier: 1.0,
            building_foundation_mm: 0.6,
            building_embed_mm: 0.2,
            building_safety_margin_m: 0.1,
            water_depth_m: 2.0,
            water_thickness_m: 0.4,
            water_protrusion_m: 0.1,
            water_surface_quantile: 0.10,
            flatten_buildings: true,
            flatten_roads: false,
            flatten_road_quantile: 0.50,
            green_height_m: 0.6,
            green_embed_m: 0.2,
            poi_height_m: 0.8,
            poi_embed_m: 0.2,
            poi_max: 600,
            palette: Palette::default(),
        }
    }
}

impl GenerationParams {
    /// Apply the documented ranges.
    pub fn clamped(mut self) -> Self {
        self.resolution = self.resolution.clamp(60, 320);
        self.subdivision_levels = self.subdivision_levels.min(2);
        self.water_surface_quantile = self.water_surface_quantile.clamp(0.0, 1.0);
        self.flatten_road_quantile = self.flatten_road_quantile.clamp(0.0, 1.0);
        self
    }
}

fn default_resolution() -> usize {
    180
}
fn default_z_scale() -> f64 {
    1.0
}
fn default_smoothing_sigma() -> f64 {
    2.0
}
fn default_base_thickness() -> f64 {
    2.0
}
fn default_model_size() -> f64 {
    100.0
}
fn default_width_multiplier() -> f64 {
    1.0
}
fn default_road_height_mm() -> f64 {
    0.5
}
fn default_road_embed_mm() -> f64 {
    0.3
}
fn default_min_height() -> f64 {
    2.0
}
fn default_height_multiplier() -> f64 {
    1.0
}
fn default_foundation_mm() -> f64 {
    0.6
}
fn default_building_embed_mm() -> f64 {
    0.2
}
fn default_safety_margin() -> f64 {
    0.1
}
fn default_water_depth() -> f64 {
    2.0
}
fn default_water_thickness() -> f64 {
    0.4
}
fn default_water_protrusion() -> f64 {
    0.1
}
fn default_surface_quantile() -> f64 {
    0.10
}
fn default_true() -> bool {
    true
}
fn default_road_quantile() -> f64 {
    0.50
}
fn default_green_height() -> f64 {
    0.6
}
fn default_embed() -> f64 {
    0.2
}
fn default_poi_height() -> f64 {
    0.8
}
fn default_poi_max() -> usize {
    600
}

#[derive(Debug, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default = "default_resolution")]
    pub resolution: usize,
    #[serde(default = "default_z_scale")]
    pub z_scale: f64,
    #[serde(default = "default_smoothing_sigma")]
    pub smoothing_sigma: f64,
    #[serde(default)]
    pub elevation_ref_m: f64,
    #[serde(default = "default_base_thickness")]
    pub base_thickness_mm: f64,
    #[serde(default = "default_model_size")]
    pub model_size_mm: f64,
    #[serde(default)]
    pub subdivision: SubdivisionConfig,
    #[serde(default)]
    pub road: RoadSection,
    #[serde(default)]
    pub building: BuildingSection,
    #[serde(default)]
    pub water: WaterSection,
    #[serde(default)]
    pub flatten: FlattenSection,
    #[serde(default)]
    pub green: GreenSection,
    #[serde(default)]
    pub poi: PoiSection,
}

#[derive(Debug, Deserialize, Default)]
pub struct SubdivisionConfig {
    #[serde(default)]
    pub levels: u8,
}

#[derive(Debug, Deserialize)]
pub struct RoadSection {
    #[serde(default = "default_width_multiplier")]
    pub width_multiplier: f64,
    #[serde(default = "default_road_height_mm")]
    pub height_mm: f64,
    #[serde(default = "default_road_embed_mm")]
    pub embed_mm: f64,
}

impl Default for RoadSection {
    fn default() -> Self {
        Self {
            width_multiplier: default_width_multiplier(),
            height_mm: default_road_height_mm(),
            embed_mm: default_road_embed_mm(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BuildingSection {
    #[serde(default = "default_min_height")]
    pub min_height_m: f64,
    #[serde(default = "default_height_multiplier")]
    pub height_multiplier: f64,
    #[serde(default = "default_foundation_mm")]
    pub foundation_mm: f64,
    #[serde(default = "default_building_embed_mm")]
    pub embed_mm: f64,
    #[serde(default = "default_safety_margin")]
    pub safety_margin_m: f64,
}

impl Default for BuildingSection {
    fn default() -> Self {
        Self {
            min_height_m: default_min_height(),
            height_multiplier: default_height_multiplier(),
            foundation_mm: default_foundation_mm(),
            embed_mm: default_building_embed_mm(),
            safety_margin_m: default_safety_margin(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WaterSection {
    #[serde(default = "default_water_depth")]
    pub depth_m: f64,
    #[serde(default = "default_water_thickness")]
    pub thickness_m: f64,
    #[serde(default = "default_water_protrusion")]
    pub protrusion_m: f64,
    #[serde(default = "default_surface_quantile")]
    pub surface_quantile: f64,
}

impl Default for WaterSection {
    fn default() -> Self {
        Self {
            depth_m: default_water_depth(),
            thickness_m: default_water_thickness(),
            protrusion_m: default_water_protrusion(),
            surface_quantile: default_surface_quantile(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FlattenSection {
    #[serde(default = "default_true")]
    pub buildings: bool,
    #[serde(default)]
    pub roads: bool,
    #[serde(default = "default_road_quantile")]
    pub road_quantile: f64,
}

impl Default for FlattenSection {
    fn default() -> Self {
        Self {
            buildings: true,
            roads: false,
            road_quantile: default_road_quantile(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GreenSection {
    #[serde(default = "default_green_height")]
    pub height_m: f64,
    #[serde(default = "default_embed")]
    pub embed_m: f64,
}

impl Default for GreenSection {
    fn default() -> Self {
        Self {
            height_m: default_green_height(),
            embed_m: default_embed(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PoiSection {
    #[serde(default = "default_poi_height")]
    pub height_m: f64,
    #[serde(default = "default_embed")]
    pub embed_m: f64,
    #[serde(default = "default_poi_max")]
    pub max: usize,
}

impl Default for PoiSection {
    fn default() -> Self {
        Self {
            height_m: default_poi_height(),
            embed_m: default_embed(),
            max: default_poi_max(),
        }
    }
}

impl FileConfig {
    pub fn load() -> Option<Self> {
        for path in get_config_paths() {
            if !path.exists() {
                continue;
            }
            if let Ok(contents) = std::fs::read_to_string(&path) {
                match toml::from_str(&contents) {
                    Ok(config) => return Some(config),
                    Err(e) => {
                        eprintln!("Warning: Failed to parse config file {:?}: {}", path, e);
                    }
                }
            }
        }
        None
    }

    pub fn into_params(self) -> GenerationParams {
        GenerationParams {
            resolution: self.resolution,
            z_scale: self.z_scale,
            smoothing_sigma: self.smoothing_sigma,
            elevation_ref_m: self.elevation_ref_m,
            base_thickness_mm: self.base_thickness_mm,
            model_size_mm: self.model_size_mm,
            subdivision_levels: self.subdivision.levels,
            road_width_multiplier: self.road.width_multiplier,
            road_height_mm: self.road.height_mm,
            road_embed_mm: self.road.embed_mm,
            road_widths: crate::layers::ClassWidths::default(),
            building_min_height_m: self.building.min_height_m,
            building_height_multiplier: self.building.height_multiplier,
            building_foundation_mm: self.building.foundation_mm,
            building_embed_mm: self.building.embed_mm,
            building_safety_margin_m: self.building.safety_margin_m,
            water_depth_m: self.water.depth_m,
            water_thickness_m: self.water.thickness_m,
            water_protrusion_m: self.water.protrusion_m,
            water_surface_quantile: self.water.surface_quantile,
            flatten_buildings: self.flatten.buildings,
            flatten_roads: self.flatten.roads,
            flatten_road_quantile: self.flatten.road_quantile,
            green_height_m: self.green.height_m,
            green_embed_m: self.green.embed_m,
            poi_height_m: self.poi.height_m,
            poi_embed_m: self.poi.embed_m,
            poi_max: self.poi.max,
            palette: Palette::default(),
        }
        .clamped()
    }
}

fn get_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    paths.push(PathBuf::from("terratile.toml"));
    paths.push(PathBuf::from(".terratile.toml"));

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("terratile").join("config.toml"));
        paths.push(config_dir.join("terratile.toml"));
    }

    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".terratile.toml"));
    }

    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = GenerationParams::default();
        assert_eq!(params.resolution, 180);
        assert_eq!(params.model_size_mm, 100.0);
        assert_eq!(params.water_surface_quantile, 0.10);
        assert!(params.flatten_buildings);
        assert!(!params.flatten_roads);
        assert_eq!(params.poi_max, 600);
    }

    #[test]
    fn test_clamping() {
        let params = GenerationParams {
            resolution: 20,
            subdivision_levels: 9,
            ..Default::default()
        }
        .clamped();
        assert_eq!(params.resolution, 60);
        assert_eq!(params.subdivision_levels, 2);

        let params = GenerationParams {
            resolution: 9999,
            ..Default::default()
        }
        .clamped();
        assert_eq!(params.resolution, 320);
    }

    #[test]
    fn test_parse_partial_file() {
        let config: FileConfig = toml::from_str(
            r#"
            resolution = 240

            [road]
            height_mm = 0.8

            [flatten]
            roads = true
            "#,
        )
        .unwrap();
        let params = config.into_params();
        assert_eq!(params.resolution, 240);
        assert_eq!(params.road_height_mm, 0.8);
        // Unset keys keep their defaults.
        assert_eq!(params.road_embed_mm, 0.3);
        assert!(params.flatten_roads);
        assert_eq!(params.flatten_road_quantile, 0.50);
    }

    #[test]
    fn test_parse_empty_file() {
        let config: FileConfig = toml::from_str("").unwrap();
        let params = config.into_params();
        assert_eq!(params.resolution, 180);
        assert_eq!(params.water_depth_m, 2.0);
    }
}
