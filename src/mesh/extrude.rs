use geo::orient::{Direction, Orient};
use geo::Polygon;

use super::tri::TriMesh;
use super::triangulation::{ring_coords, triangulate_polygon};

/// Extrude a polygon (with holes) into a vertical prism from z = 0 to
/// z = `height`.
///
/// The exterior is normalized to CCW and holes to CW first, so caps face
/// up/down and side walls face outward. Returns an empty mesh for
/// degenerate input.
pub fn extrude_polygon(poly: &Polygon<f64>, height: f64) -> TriMesh {
    if height <= 0.0 {
        return TriMesh::new();
    }

    let oriented = poly.orient(Direction::Default);
    let (points, cap_indices) = triangulate_polygon(&oriented);
    if cap_indices.is_empty() {
        return TriMesh::new();
    }

    let n = points.len();
    let mut mesh = TriMesh::with_capacity(n * 2, cap_indices.len() / 3 * 2 + n * 2);

    for p in &points {
        mesh.add_vertex(p.x, p.y, 0.0);
    }
    for p in &points {
        mesh.add_vertex(p.x, p.y, height);
    }

    // Caps: earcut follows the exterior's CCW orientation, so the indices
    // face up as-is for the top and reversed for the bottom.
    for tri in cap_indices.chunks(3) {
        let (a, b, c) = (tri[0] as u32, tri[1] as u32, tri[2] as u32);
        mesh.add_face(a + n as u32, b + n as u32, c + n as u32);
        mesh.add_face(a, c, b);
    }

    // Side walls per ring. CCW exterior walls face outward; CW holes face
    // into the cavity with the same index pattern.
    let mut start = 0usize;
    let mut ring_lengths = vec![ring_coords(oriented.exterior()).len()];
    ring_lengths.extend(
        oriented
            .interiors()
            .iter()
            .map(|h| ring_coords(h).len())
            .filter(|&l| l >= 3),
    );

    for len in ring_lengths {
        for k in 0..len {
            let i = (start + k) as u32;
            let j = (start + (k + 1) % len) as u32;
            mesh.add_face(i, j, j + n as u32);
            mesh.add_face(i, j + n as u32, i + n as u32);
        }
        start += len;
    }

    mesh
}
