use anyhow::{bail, Context, Result};
use clap::Parser;
use geo::{polygon, LineString, Point};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Instant;

use terratile::config::{FileConfig, GenerationParams};
use terratile::domain::{LineFeature, PoiFeature, PolygonFeature, RoadClass, Tags};
use terratile::geometry::GlobalAnchor;
use terratile::pipeline::{generate_scene, CancelToken, GeoBounds, RegionInputs};
use terratile::terrain::FnElevation;

/// Compose a synthetic demo tile into a 3D-printable STL
///
/// Examples:
///   # Default demo tile around Zurich coordinates
///   terratile
///
///   # Larger tile, finer grid, custom output
///   terratile --lat 47.3769 --lon 8.5417 -r 800 --resolution 240 -o tile.stl
///
///   # Use a config file for print parameters
///   terratile --config my-settings.toml
#[derive(Parser, Debug)]
#[command(name = "terratile")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to config file (optional, auto-searches terratile.toml if not provided)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Tile center latitude
    #[arg(long, default_value = "47.3769")]
    lat: f64,

    /// Tile center longitude
    #[arg(long, allow_hyphen_values = true, default_value = "8.5417")]
    lon: f64,

    /// Tile half-size in meters
    #[arg(short = 'r', long, default_value = "500")]
    radius: u32,

    /// Output STL file path
    #[arg(short = 'o', long, default_value = "map_tile.stl")]
    output: PathBuf,

    /// Physical model size in mm (average of the XY extents)
    #[arg(short = 's', long)]
    size: Option<f64>,

    /// Height-field resolution (nodes along the longer axis, 60-320)
    #[arg(long)]
    resolution: Option<usize>,

    /// Vertical exaggeration
    #[arg(long)]
    z_scale: Option<f64>,

    /// Seed for the synthetic hills
    #[arg(long, default_value = "7")]
    seed: u64,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if args.verbose { "debug" } else { "warn" }),
    )
    .init();
    let total_start = Instant::now();

    let file_config = if let Some(ref config_path) = args.config {
        if config_path.exists() {
            let contents = std::fs::read_to_string(config_path)
                .context(format!("Failed to read config file: {:?}", config_path))?;
            Some(toml::from_str(&contents).context("Failed to parse config file")?)
        } else {
            bail!("Config file not found: {:?}", config_path);
        }
    } else {
        FileConfig::load()
    };

    let mut params: GenerationParams = file_config
        .map(FileConfig::into_params)
        .unwrap_or_default();
    if let Some(size) = args.size {
        params.model_size_mm = size;
    }
    if let Some(resolution) = args.resolution {
        params.resolution = resolution;
    }
    if let Some(z_scale) = args.z_scale {
        params.z_scale = z_scale;
    }

    println!("terratile - Printable Map Tile Composer");
    println!("=======================================");
    println!();
    println!(
        "Center ({:.4}, {:.4}), radius {} m, model {} mm, grid {}",
        args.lat, args.lon, args.radius, params.model_size_mm, params.resolution
    );
    println!();

    let radius = args.radius as f64;
    let tile = tile_around(args.lat, args.lon, radius);
    let inputs = demo_inputs(tile, radius).context("Failed to build demo features")?;

    // Synthetic rolling hills, deterministic for a given seed.
    let phase = args.seed as f64 * 0.7;
    let elevation = FnElevation(move |lat: f64, lon: f64| {
        120.0
            + 18.0 * (lat * 2_500.0 + phase).sin() * (lon * 2_100.0).cos()
            + 6.0 * (lon * 5_300.0 + phase).sin()
    });

    let spinner = create_spinner("Composing scene...");
    let start = Instant::now();
    let progress = {
        let spinner = spinner.clone();
        move |pct: u8, stage: &str| {
            spinner.set_message(format!("Composing scene... {stage} [{pct}%]"));
        }
    };

    let scene = generate_scene(
        &inputs,
        &params,
        &elevation,
        Some(&progress),
        &CancelToken::new(),
    )
    .context("Pipeline failed")?;
    spinner.finish_with_message(format!(
        "Composed {} fragments, {} triangles [{:.1}s]",
        scene.fragments.len(),
        scene.triangle_count(),
        start.elapsed().as_secs_f32()
    ));

    let spinner = create_spinner("Writing STL file...");
    let start = Instant::now();
    let file_size = terratile::mesh::stl::estimate_stl_size(scene.triangle_count());
    scene
        .write_stl(&args.output)
        .context("Failed to write STL file")?;
    spinner.finish_with_message(format!(
        "Wrote {} ({:.1} KB) [{:.1}s]",
        args.output.display(),
        file_size as f64 / 1024.0,
        start.elapsed().as_secs_f32()
    ));

    if args.verbose {
        if let Some((min, max)) = scene.bounds() {
            println!();
            println!(
                "Model bounds: {:.1} x {:.1} x {:.1} mm",
                max[0] - min[0],
                max[1] - min[1],
                max[2] - min[2]
            );
        }
    }

    println!();
    println!(
        "Done! Total time: {:.1}s",
        total_start.elapsed().as_secs_f32()
    );
    Ok(())
}

fn tile_around(lat: f64, lon: f64, radius_m: f64) -> GeoBounds {
    let dlat = radius_m / 111_320.0;
    let dlon = radius_m / (111_320.0 * lat.to_radians().cos());
    GeoBounds {
        south: lat - dlat,
        west: lon - dlon,
        north: lat + dlat,
        east: lon + dlon,
    }
}

/// A small demo town: a river with a road bridging it, a residential
/// street, a block of buildings, a park and a few markers.
fn demo_inputs(tile: GeoBounds, r: f64) -> Result<RegionInputs> {
    let mut inputs = RegionInputs::for_tile(tile);
    let anchor = GlobalAnchor::for_region(tile.south, tile.west, tile.north, tile.east)?;
    let proj = |x: f64, y: f64| {
        let (px, py) = anchor.to_projected_from_local(x, y);
        (px, py)
    };

    // River band across the tile.
    let (w0x, w0y) = proj(-r, -0.15 * r);
    let (w1x, w1y) = proj(r, 0.0);
    inputs.water.push(PolygonFeature::new(
        1,
        polygon![
            (x: w0x, y: w0y),
            (x: w1x, y: w0y),
            (x: w1x, y: w1y),
            (x: w0x, y: w1y),
        ],
    ));

    // Main street crossing the river: becomes a bridge by detection.
    let (a_x, a_y) = proj(0.2 * r, -0.8 * r);
    let (b_x, b_y) = proj(0.2 * r, 0.8 * r);
    inputs.roads.push(LineFeature::new(
        10,
        LineString::from(vec![(a_x, a_y), (b_x, b_y)]),
        RoadClass::Primary,
    ));

    // Residential street on the north side.
    let (c_x, c_y) = proj(-0.8 * r, 0.5 * r);
    let (d_x, d_y) = proj(0.8 * r, 0.5 * r);
    inputs.roads.push(LineFeature::new(
        11,
        LineString::from(vec![(c_x, c_y), (d_x, d_y)]),
        RoadClass::Residential,
    ));

    // A block of buildings with mixed height sources.
    let heights = ["12", "6", "21", "9", "15", "7"];
    for (k, h) in heights.iter().enumerate() {
        let col = (k % 3) as f64;
        let row = (k / 3) as f64;
        let x0 = -0.6 * r + col * 0.18 * r;
        let y0 = 0.15 * r + row * 0.18 * r;
        let side = 0.1 * r;
        let (p0x, p0y) = proj(x0, y0);
        let (p1x, p1y) = proj(x0 + side, y0 + side);
        let mut tags = Tags::new();
        tags.insert("height".to_string(), h.to_string());
        inputs.buildings.push(
            PolygonFeature::new(
                20 + k as u64,
                polygon![
                    (x: p0x, y: p0y),
                    (x: p1x, y: p0y),
                    (x: p1x, y: p1y),
                    (x: p0x, y: p1y),
                ],
            )
            .with_tags(tags),
        );
    }

    // Park with a fountain and benches.
    let (g0x, g0y) = proj(0.4 * r, 0.2 * r);
    let (g1x, g1y) = proj(0.8 * r, 0.6 * r);
    let mut park_tags = Tags::new();
    park_tags.insert("leisure".to_string(), "park".to_string());
    inputs.green.push(
        PolygonFeature::new(
            30,
            polygon![
                (x: g0x, y: g0y),
                (x: g1x, y: g0y),
                (x: g1x, y: g1y),
                (x: g0x, y: g1y),
            ],
        )
        .with_tags(park_tags),
    );

    let mut fountain = Tags::new();
    fountain.insert("amenity".to_string(), "fountain".to_string());
    let (f_x, f_y) = proj(0.6 * r, 0.4 * r);
    inputs
        .pois
        .push(PoiFeature::new(40, Point::new(f_x, f_y)).with_tags(fountain));
    for (k, (bx, by)) in [(0.5 * r, 0.3 * r), (0.7 * r, 0.5 * r)].iter().enumerate() {
        let mut bench = Tags::new();
        bench.insert("amenity".to_string(), "bench".to_string());
        let (p_x, p_y) = proj(*bx, *by);
        inputs
            .pois
            .push(PoiFeature::new(41 + k as u64, Point::new(p_x, p_y)).with_tags(bench));
    }

    Ok(inputs)
}

fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb
}
