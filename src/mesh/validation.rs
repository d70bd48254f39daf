//! Mesh validation and cleanup for 3D-printing output.
//!
//! Catches degenerate faces (zero area), NaN/Inf coordinates, and provides
//! the one-pass sanitize used on every fragment before assembly.

use log::warn;

use super::tri::TriMesh;

/// Result of mesh validation
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Total number of faces validated
    pub total: usize,
    /// Number of degenerate faces (zero or near-zero area)
    pub degenerate: usize,
    /// Number of faces touching invalid coordinates (NaN/Inf)
    pub invalid_coords: usize,
}

impl ValidationResult {
    pub fn has_issues(&self) -> bool {
        self.degenerate > 0 || self.invalid_coords > 0
    }

    pub fn summary(&self) -> String {
        if !self.has_issues() {
            format!("mesh valid: {} faces, no issues", self.total)
        } else {
            format!(
                "mesh issues: {} total, {} degenerate, {} invalid coords",
                self.total, self.degenerate, self.invalid_coords
            )
        }
    }
}

/// Minimum area for a face to count as non-degenerate (square meters).
const MIN_FACE_AREA: f64 = 1e-10;

/// Validate a mesh and return a report.
pub fn validate_mesh(mesh: &TriMesh) -> ValidationResult {
    let mut result = ValidationResult {
        total: mesh.faces.len(),
        ..Default::default()
    };

    for i in 0..mesh.faces.len() {
        if face_has_invalid_coords(mesh, i) {
            result.invalid_coords += 1;
            continue;
        }
        if face_area(mesh, i) < MIN_FACE_AREA {
            result.degenerate += 1;
        }
    }

    result
}

/// Drop degenerate and NaN/Inf faces in place; logs when anything was removed.
pub fn sanitize(mesh: &mut TriMesh) -> ValidationResult {
    let report = validate_mesh(mesh);
    if report.has_issues() {
        warn!("{}", report.summary());
        let mut keep = Vec::with_capacity(mesh.faces.len());
        for i in 0..mesh.faces.len() {
            if !face_has_invalid_coords(mesh, i) && face_area(mesh, i) >= MIN_FACE_AREA {
                keep.push(mesh.faces[i]);
            }
        }
        mesh.faces = keep;
    }
    report
}

fn face_has_invalid_coords(mesh: &TriMesh, i: usize) -> bool {
    mesh.faces[i]
        .iter()
        .any(|&v| mesh.vertices[v as usize].iter().any(|c| !c.is_finite()))
}

fn face_area(mesh: &TriMesh, i: usize) -> f64 {
    let [a, b, c] = mesh.faces[i];
    let v0 = mesh.vertices[a as usize];
    let v1 = mesh.vertices[b as usize];
    let v2 = mesh.vertices[c as usize];

    let u = [v1[0] - v0[0], v1[1] - v0[1], v1[2] - v0[2]];
    let v = [v2[0] - v0[0], v2[1] - v0[1], v2[2] - v0[2]];

    let cx = u[1] * v[2] - u[2] * v[1];
    let cy = u[2] * v[0] - u[0] * v[2];
    let cz = u[0] * v[1] - u[1] * v[0];

    0.5 * (cx * cx + cy * cy + cz * cz).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle(v0: [f64; 3], v1: [f64; 3], v2: [f64; 3]) -> TriMesh {
        let mut mesh = TriMesh::new();
        let a = mesh.add_vertex(v0[0], v0[1], v0[2]);
        let b = mesh.add_vertex(v1[0], v1[1], v1[2]);
        let c = mesh.add_vertex(v2[0], v2[1], v2[2]);
        mesh.add_face(a, b, c);
        mesh
    }

    #[test]
    fn test_valid_mesh() {
        let mesh = triangle([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]);
        let result = validate_mesh(&mesh);
        assert_eq!(result.total, 1);
        assert!(!result.has_issues());
    }

    #[test]
    fn test_degenerate_collinear() {
        let mesh = triangle([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0]);
        let result = validate_mesh(&mesh);
        assert_eq!(result.degenerate, 1);
    }

    #[test]
    fn test_invalid_coords_nan() {
        let mesh = triangle([f64::NAN, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]);
        let result = validate_mesh(&mesh);
        assert_eq!(result.invalid_coords, 1);
    }

    #[test]
    fn test_sanitize_removes_bad_faces() {
        let mut mesh = triangle([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]);
        let other = triangle([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0]);
        mesh.append(&other);
        assert_eq!(mesh.faces.len(), 2);

        let report = sanitize(&mut mesh);
        assert_eq!(report.degenerate, 1);
        assert_eq!(mesh.faces.len(), 1);
    }

    #[test]
    fn test_face_area() {
        let mesh = triangle([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]);
        assert!((face_area(&mesh, 0) - 0.5).abs() < 1e-12);
    }
}
