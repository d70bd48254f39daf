use geo::{coord, BoundingRect, Intersects, Polygon, Rect};
use log::{debug, warn};
use rayon::prelude::*;

use super::provider::TerrainProvider;
use super::ElevationSource;
use crate::error::PipelineError;
use crate::geometry::{Bounds, GlobalAnchor};

const STAGE: &str = "terrain";

/// Regular grid of elevations in local coordinates.
///
/// Nodes lie at the axis positions inclusive of both extent edges; the Z
/// array is row-major, `z[j * nx + i]` for column `i` (X) and row `j` (Y).
/// Z is mutated only by the flatten/depress operators, and `original_z`
/// snapshots the field before the first depression so the water surface can
/// be placed relative to the unmodified banks.
#[derive(Debug, Clone)]
pub struct HeightField {
    xs: Vec<f64>,
    ys: Vec<f64>,
    z: Vec<f64>,
    elevation_ref_m: f64,
    z_scale: f64,
    original_z: Option<Vec<f64>>,
}

impl HeightField {
    /// Build the field by sampling `source` at every grid node.
    ///
    /// Grid dimensions preserve the extent's aspect ratio with
    /// `max(nx, ny) == resolution`. Raw samples are normalized as
    /// `(raw - elevation_ref_m) * z_scale`. Failed or non-finite samples are
    /// filled from the nearest valid node.
    pub fn build(
        bounds: &Bounds,
        resolution: usize,
        elevation_ref_m: f64,
        z_scale: f64,
        anchor: &GlobalAnchor,
        source: &dyn ElevationSource,
    ) -> Result<Self, PipelineError> {
        if bounds.is_empty()
            || !bounds.width().is_finite()
            || !bounds.height().is_finite()
        {
            return Err(PipelineError::InvalidInput {
                stage: STAGE,
                reason: format!("degenerate extent {bounds:?}"),
            });
        }
        let (nx, ny) = grid_dims(bounds.width(), bounds.height(), resolution)?;

        let xs = linspace(bounds.min_x, bounds.max_x, nx);
        let ys = linspace(bounds.min_y, bounds.max_y, ny);

        let sample_node = |i: usize, j: usize| -> (f64, Option<String>) {
            let (lat, lon) = anchor.local_to_geographic(xs[i], ys[j]);
            match source.sample(lat, lon) {
                Ok(v) if v.is_finite() => (v, None),
                Ok(_) => (f64::NAN, None),
                Err(e) => (f64::NAN, Some(e.0)),
            }
        };

        let results: Vec<(f64, Option<String>)> = if source.thread_safe() {
            (0..ny * nx)
                .into_par_iter()
                .map(|k| sample_node(k % nx, k / nx))
                .collect()
        } else {
            (0..ny * nx).map(|k| sample_node(k % nx, k / nx)).collect()
        };

        let mut z: Vec<f64> = Vec::with_capacity(nx * ny);
        let mut last_error: Option<String> = None;
        let mut missing = 0usize;
        for (v, err) in results {
            if v.is_nan() {
                missing += 1;
            }
            if let Some(e) = err {
                last_error = Some(e);
            }
            z.push(v);
        }

        if missing == z.len() {
            return Err(match last_error {
                Some(reason) => PipelineError::ElevationSample { stage: STAGE, reason },
                None => PipelineError::EmptyHeightField { stage: STAGE },
            });
        }
        if missing > 0 {
            warn!("{missing} of {} elevation samples missing, filling from neighbors", z.len());
            fill_missing(&mut z, nx, ny);
        }

        for v in &mut z {
            *v = (*v - elevation_ref_m) * z_scale;
        }

        debug!("height field {nx}x{ny}, z range {:.2}..{:.2}",
            z.iter().cloned().fold(f64::MAX, f64::min),
            z.iter().cloned().fold(f64::MIN, f64::max));

        Ok(Self {
            xs,
            ys,
            z,
            elevation_ref_m,
            z_scale,
            original_z: None,
        })
    }

    /// Construct directly from a Z grid (row-major, `ny * nx` values).
    pub fn from_grid(
        bounds: &Bounds,
        nx: usize,
        ny: usize,
        z: Vec<f64>,
    ) -> Result<Self, PipelineError> {
        if nx < 2 || ny < 2 {
            return Err(PipelineError::InvalidInput {
                stage: STAGE,
                reason: format!("grid must be at least 2x2, got {nx}x{ny}"),
            });
        }
        if z.len() != nx * ny {
            return Err(PipelineError::InvalidInput {
                stage: STAGE,
                reason: format!("expected {} Z values, got {}", nx * ny, z.len()),
            });
        }
        Ok(Self {
            xs: linspace(bounds.min_x, bounds.max_x, nx),
            ys: linspace(bounds.min_y, bounds.max_y, ny),
            z,
            elevation_ref_m: 0.0,
            z_scale: 1.0,
            original_z: None,
        })
    }

    pub fn nx(&self) -> usize {
        self.xs.len()
    }

    pub fn ny(&self) -> usize {
        self.ys.len()
    }

    pub fn dx(&self) -> f64 {
        (self.xs[self.xs.len() - 1] - self.xs[0]) / (self.xs.len() - 1) as f64
    }

    pub fn dy(&self) -> f64 {
        (self.ys[self.ys.len() - 1] - self.ys[0]) / (self.ys.len() - 1) as f64
    }

    pub fn xs(&self) -> &[f64] {
        &self.xs
    }

    pub fn ys(&self) -> &[f64] {
        &self.ys
    }

    pub fn z(&self) -> &[f64] {
        &self.z
    }

    pub fn elevation_ref_m(&self) -> f64 {
        self.elevation_ref_m
    }

    pub fn z_scale(&self) -> f64 {
        self.z_scale
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::new(
            self.xs[0],
            self.ys[0],
            self.xs[self.xs.len() - 1],
            self.ys[self.ys.len() - 1],
        )
    }

    pub fn min_z(&self) -> f64 {
        self.z.iter().cloned().fold(f64::MAX, f64::min)
    }

    pub fn max_z(&self) -> f64 {
        self.z.iter().cloned().fold(f64::MIN, f64::max)
    }

    /// Triangle-exact view over the current Z.
    pub fn provider(&self) -> TerrainProvider<'_> {
        TerrainProvider::new(&self.xs, &self.ys, &self.z)
    }

    /// View over the pre-depression snapshot; falls back to the current Z
    /// when no depression has happened.
    pub fn original_provider(&self) -> TerrainProvider<'_> {
        match &self.original_z {
            Some(orig) => TerrainProvider::new(&self.xs, &self.ys, orig),
            None => self.provider(),
        }
    }

    /// Gaussian-smooth the field (separable kernel, reflected boundary).
    /// No-op for sigma <= 0. Must run before any flatten/depress pass.
    pub fn smooth(&mut self, sigma: f64) {
        if sigma <= 0.0 {
            return;
        }
        let radius = (3.0 * sigma).ceil().max(1.0) as usize;
        let mut kernel: Vec<f64> = (0..=radius)
            .map(|k| (-((k * k) as f64) / (2.0 * sigma * sigma)).exp())
            .collect();
        let sum: f64 = kernel[0] + 2.0 * kernel[1..].iter().sum::<f64>();
        for w in &mut kernel {
            *w /= sum;
        }

        let (nx, ny) = (self.nx(), self.ny());
        // Rows (X direction).
        let mut pass = vec![0.0f64; nx * ny];
        for j in 0..ny {
            for i in 0..nx {
                let mut acc = kernel[0] * self.z[j * nx + i];
                for k in 1..=radius {
                    let left = reflect(i as isize - k as isize, nx);
                    let right = reflect(i as isize + k as isize, nx);
                    acc += kernel[k] * (self.z[j * nx + left] + self.z[j * nx + right]);
                }
                pass[j * nx + i] = acc;
            }
        }
        // Columns (Y direction).
        for i in 0..nx {
            for j in 0..ny {
                let mut acc = kernel[0] * pass[j * nx + i];
                for k in 1..=radius {
                    let down = reflect(j as isize - k as isize, ny);
                    let up = reflect(j as isize + k as isize, ny);
                    acc += kernel[k] * (pass[down * nx + i] + pass[up * nx + i]);
                }
                self.z[j * nx + i] = acc;
            }
        }
    }

    /// Flatten the field under each polygon to the given quantile of the
    /// covered nodes' current Z. Later polygons overwrite earlier ones;
    /// callers order passes buildings-first, roads-second.
    ///
    /// Returns how many polygons actually flattened any node.
    pub fn flatten_under(&mut self, polygons: &[Polygon<f64>], q: f64) -> usize {
        let mut applied = 0;
        for poly in polygons {
            let nodes = self.covered_nodes(poly);
            let values: Vec<f64> = nodes
                .iter()
                .map(|&n| self.z[n])
                .filter(|v| v.is_finite())
                .collect();
            if values.is_empty() {
                continue;
            }
            let target = quantile(&values, q);
            for &n in &nodes {
                self.z[n] = target;
            }
            applied += 1;
        }
        applied
    }

    /// Depress the field under each polygon: Z becomes the `q` quantile of
    /// the *pre-depression* surface minus `depth`. Snapshots `original_z` on
    /// first use so water never sits above the original banks.
    pub fn depress_under(&mut self, polygons: &[Polygon<f64>], depth: f64, q: f64) -> usize {
        if depth <= 0.0 {
            return 0;
        }
        if self.original_z.is_none() {
            self.original_z = Some(self.z.clone());
        }
        let original = self.original_z.as_ref().unwrap().clone();

        let mut applied = 0;
        for poly in polygons {
            let nodes = self.covered_nodes(poly);
            let values: Vec<f64> = nodes
                .iter()
                .map(|&n| original[n])
                .filter(|v| v.is_finite())
                .collect();
            if values.is_empty() {
                continue;
            }
            let surface = quantile(&values, q);
            for &n in &nodes {
                self.z[n] = surface - depth;
            }
            applied += 1;
        }
        applied
    }

    /// Indices of nodes whose dx x dy cell intersects the polygon.
    /// Conservative: a cell touched by the boundary counts as covered.
    fn covered_nodes(&self, poly: &Polygon<f64>) -> Vec<usize> {
        let Some(rect) = poly.bounding_rect() else {
            return Vec::new();
        };
        let (nx, ny) = (self.nx(), self.ny());
        let (dx, dy) = (self.dx(), self.dy());
        let (hx, hy) = (dx / 2.0, dy / 2.0);

        let i0 = clamp_index((rect.min().x - self.xs[0] - hx) / dx, nx);
        let i1 = clamp_index((rect.max().x - self.xs[0] + hx) / dx + 1.0, nx);
        let j0 = clamp_index((rect.min().y - self.ys[0] - hy) / dy, ny);
        let j1 = clamp_index((rect.max().y - self.ys[0] + hy) / dy + 1.0, ny);

        let mut nodes = Vec::new();
        for j in j0..=j1 {
            for i in i0..=i1 {
                let cell = Rect::new(
                    coord! { x: self.xs[i] - hx, y: self.ys[j] - hy },
                    coord! { x: self.xs[i] + hx, y: self.ys[j] + hy },
                )
                .to_polygon();
                if cell.intersects(poly) {
                    nodes.push(j * nx + i);
                }
            }
        }
        nodes
    }
}

/// Linear-interpolation quantile over exact samples. `values` must be
/// non-empty; `q` is clamped to [0, 1].
pub fn quantile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let q = q.clamp(0.0, 1.0);
    let h = (sorted.len() - 1) as f64 * q;
    let lo = h.floor() as usize;
    if lo + 1 >= sorted.len() {
        return sorted[sorted.len() - 1];
    }
    sorted[lo] + (sorted[lo + 1] - sorted[lo]) * (h - lo as f64)
}

/// Pick (nx, ny) so that max(nx, ny) = resolution and the aspect ratio is
/// preserved; the smaller dimension is rounded, never below 2.
fn grid_dims(width: f64, height: f64, resolution: usize) -> Result<(usize, usize), PipelineError> {
    if resolution < 2 {
        return Err(PipelineError::InvalidInput {
            stage: STAGE,
            reason: format!("resolution {resolution} below minimum of 2"),
        });
    }
    let aspect = width.max(height) / width.min(height);
    let minor = ((resolution as f64 / aspect).round() as usize).max(2);
    if width >= height {
        Ok((resolution, minor))
    } else {
        Ok((minor, resolution))
    }
}

fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    let step = (end - start) / (n - 1) as f64;
    let mut out: Vec<f64> = (0..n).map(|i| start + step * i as f64).collect();
    // Exact endpoint so that abutting tiles share boundary nodes bit-exactly.
    out[n - 1] = end;
    out
}

fn reflect(i: isize, n: usize) -> usize {
    let n = n as isize;
    let mut i = i;
    loop {
        if i < 0 {
            i = -i - 1;
        } else if i >= n {
            i = 2 * n - 1 - i;
        } else {
            return i as usize;
        }
    }
}

fn clamp_index(raw: f64, n: usize) -> usize {
    if raw.is_nan() || raw < 0.0 {
        0
    } else {
        (raw as usize).min(n - 1)
    }
}

/// Fill NaN nodes from the nearest valid node, searched in expanding rings.
/// Validity is judged against the original array so fills never cascade.
fn fill_missing(z: &mut [f64], nx: usize, ny: usize) {
    let snapshot: Vec<f64> = z.to_vec();
    let max_ring = nx.max(ny);

    for j in 0..ny {
        for i in 0..nx {
            if !z[j * nx + i].is_nan() {
                continue;
            }
            'search: for r in 1..=max_ring {
                let mut best: Option<(i64, f64)> = None;
                let (ri, rj) = (i as isize, j as isize);
                for dj in -(r as isize)..=(r as isize) {
                    for di in -(r as isize)..=(r as isize) {
                        if di.unsigned_abs().max(dj.unsigned_abs()) != r {
                            continue;
                        }
                        let (ci, cj) = (ri + di, rj + dj);
                        if ci < 0 || cj < 0 || ci >= nx as isize || cj >= ny as isize {
                            continue;
                        }
                        let v = snapshot[cj as usize * nx + ci as usize];
                        if v.is_nan() {
                            continue;
                        }
                        let d2 = di * di + dj * dj;
                        match best {
                            Some((bd2, _)) if (d2 as i64) >= bd2 => {}
                            _ => best = Some((d2 as i64, v)),
                        }
                    }
                }
                if let Some((_, v)) = best {
                    z[j * nx + i] = v;
                    break 'search;
                }
            }
        }
    }
}
