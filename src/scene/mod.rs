use std::collections::HashMap;
use std::path::Path;

use log::info;

use crate::domain::Material;
use crate::error::PipelineError;
use crate::mesh::{sanitize, write_stl, TriMesh};

const STAGE: &str = "assemble";

/// One colored piece of the scene. Fragments of different materials are
/// never welded together, which keeps color separation for material-aware
/// export formats.
#[derive(Debug, Clone)]
pub struct MeshFragment {
    pub mesh: TriMesh,
    pub material: Material,
    /// Per-fragment RGB; filled from the palette during assembly when None.
    pub color: Option<[u8; 3]>,
}

impl MeshFragment {
    pub fn new(mesh: TriMesh, material: Material) -> Self {
        Self {
            mesh,
            material,
            color: None,
        }
    }

    pub fn with_color(mut self, color: [u8; 3]) -> Self {
        self.color = Some(color);
        self
    }
}

/// Material color overrides; anything unset falls back to
/// [`Material::default_color`].
#[derive(Debug, Clone, Default)]
pub struct Palette {
    overrides: HashMap<Material, [u8; 3]>,
}

impl Palette {
    pub fn set(&mut self, material: Material, color: [u8; 3]) {
        self.overrides.insert(material, color);
    }

    pub fn color_for(&self, material: Material) -> [u8; 3] {
        self.overrides
            .get(&material)
            .copied()
            .unwrap_or_else(|| material.default_color())
    }
}

/// The final exportable scene. All dimensions are millimeters; the XY
/// centroid sits at the origin and the lowest point at Z = 0.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub fragments: Vec<MeshFragment>,
}

impl Scene {
    pub fn bounds(&self) -> Option<([f64; 3], [f64; 3])> {
        bounds_over(self.fragments.iter().map(|f| &f.mesh))
    }

    pub fn triangle_count(&self) -> usize {
        self.fragments.iter().map(|f| f.mesh.faces.len()).sum()
    }

    /// Write the whole scene as one binary STL (colors discarded).
    pub fn write_stl(&self, path: &Path) -> anyhow::Result<()> {
        write_stl(path, self.fragments.iter().map(|f| &f.mesh))
    }
}

/// Normalize fragments into the final scene.
///
/// Centers the XY centroid at the origin, uniformly scales so the average
/// of the XY extents equals `model_size_mm` (vertical proportion is
/// preserved), then lifts so min Z = 0 and fills missing fragment colors.
pub fn assemble(
    fragments: Vec<MeshFragment>,
    model_size_mm: f64,
    palette: &Palette,
) -> Result<Scene, PipelineError> {
    let mut fragments: Vec<MeshFragment> = fragments
        .into_iter()
        .filter_map(|mut f| {
            sanitize(&mut f.mesh);
            (!f.mesh.is_empty()).then_some(f)
        })
        .collect();

    if fragments.is_empty() {
        return Err(PipelineError::InvalidInput {
            stage: STAGE,
            reason: "no non-empty fragments to assemble".to_string(),
        });
    }
    if model_size_mm <= 0.0 || !model_size_mm.is_finite() {
        return Err(PipelineError::InvalidInput {
            stage: STAGE,
            reason: format!("model size must be positive, got {model_size_mm}"),
        });
    }

    // Center on the vertex centroid, XY only.
    let (cx, cy) = centroid_xy(&fragments);
    for f in &mut fragments {
        f.mesh.translate(-cx, -cy, 0.0);
    }

    // Uniform scale so the average XY extent hits the requested size.
    let (min, max) = bounds_over(fragments.iter().map(|f| &f.mesh)).unwrap();
    let avg_xy = ((max[0] - min[0]) + (max[1] - min[1])) / 2.0;
    if avg_xy <= 0.0 {
        return Err(PipelineError::InvalidInput {
            stage: STAGE,
            reason: "scene has zero XY extent".to_string(),
        });
    }
    let scale = model_size_mm / avg_xy;
    for f in &mut fragments {
        f.mesh.scale_uniform(scale);
    }

    // Re-center and lift the floor to Z = 0.
    let (cx, cy) = centroid_xy(&fragments);
    let (min, _) = bounds_over(fragments.iter().map(|f| &f.mesh)).unwrap();
    for f in &mut fragments {
        f.mesh.translate(-cx, -cy, -min[2]);
    }

    for f in &mut fragments {
        if f.color.is_none() {
            f.color = Some(palette.color_for(f.material));
        }
    }

    let scene = Scene { fragments };
    info!(
        "assembled scene: {} fragments, {} triangles, scale {:.5} mm/m",
        scene.fragments.len(),
        scene.triangle_count(),
        scale
    );
    Ok(scene)
}

fn centroid_xy(fragments: &[MeshFragment]) -> (f64, f64) {
    let mut sx = 0.0;
    let mut sy = 0.0;
    let mut n = 0usize;
    for f in fragments {
        for v in &f.mesh.vertices {
            sx += v[0];
            sy += v[1];
            n += 1;
        }
    }
    (sx / n as f64, sy / n as f64)
}

fn bounds_over<'a>(meshes: impl Iterator<Item = &'a TriMesh>) -> Option<([f64; 3], [f64; 3])> {
    let mut acc: Option<([f64; 3], [f64; 3])> = None;
    for mesh in meshes {
        if let Some((min, max)) = mesh.bounds() {
            acc = Some(match acc {
                None => (min, max),
                Some((amin, amax)) => (
                    [
                        amin[0].min(min[0]),
                        amin[1].min(min[1]),
                        amin[2].min(min[2]),
                    ],
                    [
                        amax[0].max(max[0]),
                        amax[1].max(max[1]),
                        amax[2].max(max[2]),
                    ],
                ),
            });
        }
    }
    acc
}
