use std::collections::HashMap;

/// An indexed triangle mesh in local meters.
///
/// Faces are CCW when viewed from outside. Vertices are owned by the mesh;
/// processors build one per feature and hand it to the scene assembler.
#[derive(Debug, Clone, Default)]
pub struct TriMesh {
    pub vertices: Vec<[f64; 3]>,
    pub faces: Vec<[u32; 3]>,
}

impl TriMesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(vertices: usize, faces: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertices),
            faces: Vec::with_capacity(faces),
        }
    }

    pub fn add_vertex(&mut self, x: f64, y: f64, z: f64) -> u32 {
        self.vertices.push([x, y, z]);
        (self.vertices.len() - 1) as u32
    }

    pub fn add_face(&mut self, a: u32, b: u32, c: u32) {
        self.faces.push([a, b, c]);
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Append another mesh, offsetting its indices.
    pub fn append(&mut self, other: &TriMesh) {
        let offset = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.faces
            .extend(other.faces.iter().map(|f| [f[0] + offset, f[1] + offset, f[2] + offset]));
    }

    pub fn translate(&mut self, dx: f64, dy: f64, dz: f64) {
        for v in &mut self.vertices {
            v[0] += dx;
            v[1] += dy;
            v[2] += dz;
        }
    }

    pub fn scale_uniform(&mut self, s: f64) {
        for v in &mut self.vertices {
            v[0] *= s;
            v[1] *= s;
            v[2] *= s;
        }
    }

    /// Replace every vertex Z with `f(x, y, z)`. This is the draping
    /// primitive: `z` passed in is the vertex's local extrusion height.
    pub fn drape_z(&mut self, f: impl Fn(f64, f64, f64) -> f64) {
        for v in &mut self.vertices {
            v[2] = f(v[0], v[1], v[2]);
        }
    }

    /// Axis-aligned bounds as (min, max), or None when empty.
    pub fn bounds(&self) -> Option<([f64; 3], [f64; 3])> {
        if self.vertices.is_empty() {
            return None;
        }
        let mut min = [f64::MAX; 3];
        let mut max = [f64::MIN; 3];
        for v in &self.vertices {
            for k in 0..3 {
                min[k] = min[k].min(v[k]);
                max[k] = max[k].max(v[k]);
            }
        }
        Some((min, max))
    }

    pub fn min_z(&self) -> Option<f64> {
        self.bounds().map(|(min, _)| min[2])
    }

    /// Merge vertices closer than `tolerance` and drop faces that collapse.
    ///
    /// Quantizes coordinates onto a `tolerance`-sized lattice; the first
    /// vertex in each lattice cell wins, so the result is deterministic.
    pub fn weld(&mut self, tolerance: f64) {
        if tolerance <= 0.0 || self.vertices.is_empty() {
            return;
        }

        let mut cell_to_new: HashMap<(i64, i64, i64), u32> = HashMap::new();
        let mut remap: Vec<u32> = Vec::with_capacity(self.vertices.len());
        let mut kept: Vec<[f64; 3]> = Vec::with_capacity(self.vertices.len());

        for v in &self.vertices {
            let key = (
                (v[0] / tolerance).round() as i64,
                (v[1] / tolerance).round() as i64,
                (v[2] / tolerance).round() as i64,
            );
            let idx = *cell_to_new.entry(key).or_insert_with(|| {
                kept.push(*v);
                (kept.len() - 1) as u32
            });
            remap.push(idx);
        }

        self.vertices = kept;
        self.faces.retain_mut(|f| {
            let (a, b, c) = (
                remap[f[0] as usize],
                remap[f[1] as usize],
                remap[f[2] as usize],
            );
            *f = [a, b, c];
            a != b && b != c && a != c
        });
    }

    /// True when every undirected edge is shared by exactly two faces.
    pub fn is_edge_manifold(&self) -> bool {
        let mut counts: HashMap<(u32, u32), u32> = HashMap::new();
        for f in &self.faces {
            for (a, b) in [(f[0], f[1]), (f[1], f[2]), (f[2], f[0])] {
                let key = if a < b { (a, b) } else { (b, a) };
                *counts.entry(key).or_insert(0) += 1;
            }
        }
        !counts.is_empty() && counts.values().all(|&c| c == 2)
    }

    /// Split every face 1 -> 4 once, interpolating new vertices on edge
    /// midpoints only. Shared edges reuse the same midpoint vertex, so a
    /// watertight mesh stays watertight.
    pub fn subdivide(&mut self) {
        let mut midpoints: HashMap<(u32, u32), u32> = HashMap::new();
        let old_faces = std::mem::take(&mut self.faces);
        self.faces.reserve(old_faces.len() * 4);

        let mut midpoint = |mesh: &mut TriMesh, a: u32, b: u32| -> u32 {
            let key = if a < b { (a, b) } else { (b, a) };
            if let Some(&idx) = midpoints.get(&key) {
                return idx;
            }
            let va = mesh.vertices[a as usize];
            let vb = mesh.vertices[b as usize];
            let idx = mesh.add_vertex(
                (va[0] + vb[0]) / 2.0,
                (va[1] + vb[1]) / 2.0,
                (va[2] + vb[2]) / 2.0,
            );
            midpoints.insert(key, idx);
            idx
        };

        for f in old_faces {
            let [a, b, c] = f;
            let ab = midpoint(self, a, b);
            let bc = midpoint(self, b, c);
            let ca = midpoint(self, c, a);
            self.faces.push([a, ab, ca]);
            self.faces.push([ab, b, bc]);
            self.faces.push([ca, bc, c]);
            self.faces.push([ab, bc, ca]);
        }
    }

    /// Rectangular prism centered at (cx, cy), spanning z0..z1.
    pub fn axis_box(cx: f64, cy: f64, half_x: f64, half_y: f64, z0: f64, z1: f64) -> Self {
        let mut mesh = Self::with_capacity(8, 12);
        for &z in &[z0, z1] {
            mesh.add_vertex(cx - half_x, cy - half_y, z);
            mesh.add_vertex(cx + half_x, cy - half_y, z);
            mesh.add_vertex(cx + half_x, cy + half_y, z);
            mesh.add_vertex(cx - half_x, cy + half_y, z);
        }
        // Bottom and top.
        mesh.add_face(0, 2, 1);
        mesh.add_face(0, 3, 2);
        mesh.add_face(4, 5, 6);
        mesh.add_face(4, 6, 7);
        // Side walls, wound outward.
        for (a, b) in [(0u32, 1u32), (1, 2), (2, 3), (3, 0)] {
            mesh.add_face(a, b, b + 4);
            mesh.add_face(a, b + 4, a + 4);
        }
        mesh
    }

    /// Unit outward normal of face `i`, with +Z fallback for degenerate faces.
    pub fn face_normal(&self, i: usize) -> [f64; 3] {
        let [a, b, c] = self.faces[i];
        let v0 = self.vertices[a as usize];
        let v1 = self.vertices[b as usize];
        let v2 = self.vertices[c as usize];

        let u = [v1[0] - v0[0], v1[1] - v0[1], v1[2] - v0[2]];
        let v = [v2[0] - v0[0], v2[1] - v0[1], v2[2] - v0[2]];

        let nx = u[1] * v[2] - u[2] * v[1];
        let ny = u[2] * v[0] - u[0] * v[2];
        let nz = u[0] * v[1] - u[1] * v[0];

        let len = (nx * nx + ny * ny + nz * nz).sqrt();
        if len > 1e-12 {
            [nx / len, ny / len, nz / len]
        } else {
            [0.0, 0.0, 1.0]
        }
    }
}
