use log::debug;

use super::heightfield::HeightField;
use crate::error::PipelineError;
use crate::mesh::TriMesh;

const STAGE: &str = "terrain solid";

/// Maximum 1 -> 4 subdivision depth.
pub const MAX_SUBDIVISION_LEVELS: u8 = 2;

/// Build a watertight solid from the height field.
///
/// Top surface: one vertex per grid node, each cell split along the fixed
/// diagonal (the same rule the terrain provider interpolates on). Bottom: the
/// grid mirrored onto a flat plane at `min(Z) - base_thickness_m`, faces
/// reversed, so every skirt edge pairs 1:1 with a cap edge. Side skirts join
/// the two along the four boundary chains.
///
/// After assembly the mesh is welded at `1e-6` of the bounding-box diagonal
/// and checked for edge-manifoldness; one re-weld is attempted before
/// reporting `NonWatertightBase`.
pub fn solidify(
    field: &HeightField,
    base_thickness_m: f64,
    subdivision_levels: u8,
) -> Result<TriMesh, PipelineError> {
    if base_thickness_m <= 0.0 || !base_thickness_m.is_finite() {
        return Err(PipelineError::InvalidInput {
            stage: STAGE,
            reason: format!("base thickness must be positive, got {base_thickness_m}"),
        });
    }

    let (nx, ny) = (field.nx(), field.ny());
    let (xs, ys, z) = (field.xs(), field.ys(), field.z());
    let z_bottom = field.min_z() - base_thickness_m;

    let mut mesh = TriMesh::with_capacity(nx * ny * 2, (nx - 1) * (ny - 1) * 4 + (nx + ny) * 4);

    // Top grid, index j * nx + i.
    for j in 0..ny {
        for i in 0..nx {
            mesh.add_vertex(xs[i], ys[j], z[j * nx + i]);
        }
    }
    // Bottom grid, offset by nx * ny.
    for j in 0..ny {
        for i in 0..nx {
            mesh.add_vertex(xs[i], ys[j], z_bottom);
        }
    }

    let top = |i: usize, j: usize| (j * nx + i) as u32;
    let bot = |i: usize, j: usize| (nx * ny + j * nx + i) as u32;

    // Top faces: triangle A covers dx + dy <= 1, triangle B the rest.
    for j in 0..ny - 1 {
        for i in 0..nx - 1 {
            mesh.add_face(top(i, j), top(i + 1, j), top(i, j + 1));
            mesh.add_face(top(i, j + 1), top(i + 1, j), top(i + 1, j + 1));
        }
    }

    // Bottom faces, reversed winding to face down.
    for j in 0..ny - 1 {
        for i in 0..nx - 1 {
            mesh.add_face(bot(i, j), bot(i, j + 1), bot(i + 1, j));
            mesh.add_face(bot(i, j + 1), bot(i + 1, j + 1), bot(i + 1, j));
        }
    }

    // Side skirts along the four boundary chains, wound outward.
    for i in 0..nx - 1 {
        // South (j = 0), outward -Y.
        skirt_quad(&mut mesh, top(i, 0), top(i + 1, 0), bot(i, 0), bot(i + 1, 0));
        // North (j = ny - 1), outward +Y.
        skirt_quad(
            &mut mesh,
            top(i + 1, ny - 1),
            top(i, ny - 1),
            bot(i + 1, ny - 1),
            bot(i, ny - 1),
        );
    }
    for j in 0..ny - 1 {
        // East (i = nx - 1), outward +X.
        skirt_quad(
            &mut mesh,
            top(nx - 1, j),
            top(nx - 1, j + 1),
            bot(nx - 1, j),
            bot(nx - 1, j + 1),
        );
        // West (i = 0), outward -X.
        skirt_quad(&mut mesh, top(0, j + 1), top(0, j), bot(0, j + 1), bot(0, j));
    }

    let tolerance = weld_tolerance(&mesh);
    mesh.weld(tolerance);
    if !mesh.is_edge_manifold() {
        mesh.weld(tolerance);
        if !mesh.is_edge_manifold() {
            return Err(PipelineError::NonWatertightBase { stage: STAGE });
        }
    }

    for _ in 0..subdivision_levels.min(MAX_SUBDIVISION_LEVELS) {
        mesh.subdivide();
    }

    debug!(
        "terrain solid: {} vertices, {} faces, bottom at {:.2}",
        mesh.vertices.len(),
        mesh.faces.len(),
        z_bottom
    );
    Ok(mesh)
}

/// Two triangles joining a top edge (a -> b) to its bottom counterparts,
/// wound so the wall faces away from the grid interior.
fn skirt_quad(mesh: &mut TriMesh, top_a: u32, top_b: u32, bot_a: u32, bot_b: u32) {
    mesh.add_face(top_a, bot_a, bot_b);
    mesh.add_face(top_a, bot_b, top_b);
}

fn weld_tolerance(mesh: &TriMesh) -> f64 {
    match mesh.bounds() {
        Some((min, max)) => {
            let d = [max[0] - min[0], max[1] - min[1], max[2] - min[2]];
            1e-6 * (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt()
        }
        None => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Bounds;

    fn flat_field(n: usize, elevation: f64) -> HeightField {
        let bounds = Bounds::new(0.0, 0.0, 1000.0, 1000.0);
        HeightField::from_grid(&bounds, n, n, vec![elevation; n * n]).unwrap()
    }

    #[test]
    fn test_flat_solid_is_watertight() {
        let field = flat_field(10, 100.0);
        let solid = solidify(&field, 20.0, 0).unwrap();
        assert!(solid.is_edge_manifold());

        let (min, max) = solid.bounds().unwrap();
        assert_eq!(min[2], 80.0);
        assert_eq!(max[2], 100.0);
        assert_eq!(min[0], 0.0);
        assert_eq!(max[0], 1000.0);
    }

    #[test]
    fn test_sloped_solid_is_watertight() {
        let bounds = Bounds::new(0.0, 0.0, 100.0, 50.0);
        let (nx, ny) = (12, 7);
        let mut z = Vec::new();
        for j in 0..ny {
            for i in 0..nx {
                z.push(i as f64 * 0.8 + (j as f64).sin() * 3.0);
            }
        }
        let field = HeightField::from_grid(&bounds, nx, ny, z).unwrap();
        let solid = solidify(&field, 5.0, 0).unwrap();
        assert!(solid.is_edge_manifold());
    }

    #[test]
    fn test_face_and_vertex_counts() {
        let n = 5;
        let field = flat_field(n, 10.0);
        let solid = solidify(&field, 2.0, 0).unwrap();
        // Top and bottom grids: 2 * n^2 vertices, no duplicates to weld.
        assert_eq!(solid.vertices.len(), 2 * n * n);
        // Caps: 2 * 2 * (n-1)^2, skirts: 2 * 4 * (n-1).
        assert_eq!(solid.faces.len(), 4 * (n - 1) * (n - 1) + 8 * (n - 1));
    }

    #[test]
    fn test_top_matches_provider() {
        // Every top vertex must agree with the triangle-exact provider.
        let bounds = Bounds::new(0.0, 0.0, 100.0, 100.0);
        let mut z = Vec::new();
        for j in 0..8 {
            for i in 0..8 {
                z.push((i * j) as f64 * 0.3);
            }
        }
        let field = HeightField::from_grid(&bounds, 8, 8, z).unwrap();
        let provider = field.provider();
        let solid = solidify(&field, 3.0, 0).unwrap();

        let z_bottom = field.min_z() - 3.0;
        for v in &solid.vertices {
            if v[2] != z_bottom {
                assert_eq!(v[2], provider.height_at(v[0], v[1]));
            }
        }
    }

    #[test]
    fn test_subdivision_stays_watertight() {
        let field = flat_field(6, 10.0);
        let base = solidify(&field, 2.0, 0).unwrap();
        let sub1 = solidify(&field, 2.0, 1).unwrap();
        let sub2 = solidify(&field, 2.0, 2).unwrap();
        assert_eq!(sub1.faces.len(), base.faces.len() * 4);
        assert_eq!(sub2.faces.len(), base.faces.len() * 16);
        assert!(sub1.is_edge_manifold());
        assert!(sub2.is_edge_manifold());

        // Levels are capped.
        let sub9 = solidify(&field, 2.0, 9).unwrap();
        assert_eq!(sub9.faces.len(), sub2.faces.len());
    }

    #[test]
    fn test_invalid_thickness() {
        let field = flat_field(4, 0.0);
        assert!(solidify(&field, 0.0, 0).is_err());
        assert!(solidify(&field, -1.0, 0).is_err());
    }
}
