use crate::geometry::Bounds;

/// Triangle-exact elevation query over a height field.
///
/// Interpolates on the *same* two triangles per grid cell as the terrain
/// solid's top surface (the diagonal between (i+1, j) and (i, j+1)), so a
/// draped vertex agrees with the mesh underneath it instead of floating the
/// way bilinear sampling does. Holds non-owning views over the field's axes
/// and Z; queries outside the extent clamp to the boundary.
#[derive(Debug, Clone, Copy)]
pub struct TerrainProvider<'a> {
    xs: &'a [f64],
    ys: &'a [f64],
    z: &'a [f64],
}

impl<'a> TerrainProvider<'a> {
    pub(crate) fn new(xs: &'a [f64], ys: &'a [f64], z: &'a [f64]) -> Self {
        debug_assert!(xs.len() >= 2 && ys.len() >= 2);
        debug_assert_eq!(z.len(), xs.len() * ys.len());
        Self { xs, ys, z }
    }

    /// Ground elevation at (x, y).
    pub fn height_at(&self, x: f64, y: f64) -> f64 {
        let nx = self.xs.len();
        let x = x.clamp(self.xs[0], self.xs[nx - 1]);
        let y = y.clamp(self.ys[0], self.ys[self.ys.len() - 1]);

        let i = cell_index(self.xs, x);
        let j = cell_index(self.ys, y);

        let dx = (x - self.xs[i]) / (self.xs[i + 1] - self.xs[i]);
        let dy = (y - self.ys[j]) / (self.ys[j + 1] - self.ys[j]);

        let z00 = self.z[j * nx + i];
        let z10 = self.z[j * nx + i + 1];
        let z01 = self.z[(j + 1) * nx + i];
        let z11 = self.z[(j + 1) * nx + i + 1];

        if dx + dy <= 1.0 {
            z00 * (1.0 - dx - dy) + z10 * dx + z01 * dy
        } else {
            z11 * (dx + dy - 1.0) + z10 * (1.0 - dy) + z01 * (1.0 - dx)
        }
    }

    /// Batch form of [`Self::height_at`].
    pub fn heights_for(&self, points: &[(f64, f64)]) -> Vec<f64> {
        points.iter().map(|&(x, y)| self.height_at(x, y)).collect()
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
}

/// Cell index by binary search: largest `i` with `axis[i] <= v`, clamped so
/// that `i + 1` is always a valid node.
fn cell_index(axis: &[f64], v: f64) -> usize {
    let upper = axis.partition_point(|&a| a <= v);
    upper.saturating_sub(1).min(axis.len() - 2)
}

#[cfg(test)]
mod tests {
    use crate::geometry::Bounds;
    use crate::terrain::HeightField;

    fn ramp_field() -> HeightField {
        let bounds = Bounds::new(0.0, 0.0, 100.0, 100.0);
        let mut z = Vec::new();
        for j in 0..11 {
            for i in 0..11 {
                z.push(i as f64 + j as f64 * 0.5);
            }
        }
        HeightField::from_grid(&bounds, 11, 11, z).unwrap()
    }

    #[test]
    fn test_exact_at_nodes() {
        let field = ramp_field();
        let provider = field.provider();
        for j in 0..11 {
            for i in 0..11 {
                let expect = field.z()[j * 11 + i];
                let got = provider.height_at(field.xs()[i], field.ys()[j]);
                assert_eq!(got, expect, "node ({i}, {j})");
            }
        }
    }

    #[test]
    fn test_lower_triangle_barycentric() {
        let field = ramp_field();
        let provider = field.provider();
        // Point inside the first cell, dx + dy < 1.
        let (dx, dy) = (0.25, 0.25);
        let got = provider.height_at(10.0 * dx, 10.0 * dy);
        let z00 = field.z()[0];
        let z10 = field.z()[1];
        let z01 = field.z()[11];
        let expect = z00 * (1.0 - dx - dy) + z10 * dx + z01 * dy;
        assert_eq!(got, expect);
    }

    #[test]
    fn test_upper_triangle_barycentric() {
        let field = ramp_field();
        let provider = field.provider();
        let (dx, dy) = (0.75, 0.75);
        let got = provider.height_at(10.0 * dx, 10.0 * dy);
        let z10 = field.z()[1];
        let z01 = field.z()[11];
        let z11 = field.z()[12];
        let expect = z11 * (dx + dy - 1.0) + z10 * (1.0 - dy) + z01 * (1.0 - dx);
        assert_eq!(got, expect);
    }

    #[test]
    fn test_clamped_outside_extent() {
        let field = ramp_field();
        let provider = field.provider();
        assert_eq!(provider.height_at(-50.0, -50.0), provider.height_at(0.0, 0.0));
        assert_eq!(
            provider.height_at(1000.0, 1000.0),
            provider.height_at(100.0, 100.0)
        );
    }

    #[test]
    fn test_diagonal_is_continuous() {
        // Both triangle formulas must agree on the shared cell diagonal.
        let field = ramp_field();
        let provider = field.provider();
        for k in 1..10 {
            let t = k as f64 / 10.0;
            let (x, y) = (10.0 * t, 10.0 * (1.0 - t));
            let below = provider.height_at(x - 1e-9, y - 1e-9);
            let above = provider.height_at(x + 1e-9, y + 1e-9);
            assert!((below - above).abs() < 1e-6);
        }
    }

    #[test]
    fn test_batch_matches_scalar() {
        let field = ramp_field();
        let provider = field.provider();
        let pts = vec![(5.0, 5.0), (33.3, 71.2), (99.9, 0.1)];
        let batch = provider.heights_for(&pts);
        for (k, &(x, y)) in pts.iter().enumerate() {
            assert_eq!(batch[k], provider.height_at(x, y));
        }
    }
}
