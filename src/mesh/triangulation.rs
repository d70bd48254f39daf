use earcutr::earcut;
use geo::{Coord, LineString, Polygon};

/// Ring coordinates with the closing duplicate dropped.
pub fn ring_coords(ring: &LineString<f64>) -> Vec<Coord<f64>> {
    let mut pts: Vec<Coord<f64>> = ring.coords().copied().collect();
    if pts.len() >= 2 {
        let first = pts[0];
        let last = pts[pts.len() - 1];
        if (first.x - last.x).abs() < 1e-12 && (first.y - last.y).abs() < 1e-12 {
            pts.pop();
        }
    }
    pts
}

/// Triangulate a polygon with holes.
///
/// Returns the flattened ring points (exterior first, then holes, closing
/// duplicates dropped) and earcut triangle indices into that point list.
/// Empty indices for degenerate input.
pub fn triangulate_polygon(poly: &Polygon<f64>) -> (Vec<Coord<f64>>, Vec<usize>) {
    let mut points = ring_coords(poly.exterior());
    if points.len() < 3 {
        return (points, Vec::new());
    }

    let mut hole_indices: Vec<usize> = Vec::with_capacity(poly.interiors().len());
    for hole in poly.interiors() {
        let hole_pts = ring_coords(hole);
        if hole_pts.len() < 3 {
            continue;
        }
        hole_indices.push(points.len());
        points.extend(hole_pts);
    }

    let mut vertices: Vec<f64> = Vec::with_capacity(points.len() * 2);
    for p in &points {
        vertices.push(p.x);
        vertices.push(p.y);
    }

    let indices = earcut(&vertices, &hole_indices, 2).unwrap_or_default();
    (points, indices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    #[test]
    fn test_triangulate_square() {
        let square = polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
        ];
        let (points, indices) = triangulate_polygon(&square);
        assert_eq!(points.len(), 4);
        assert_eq!(indices.len(), 6);
    }

    #[test]
    fn test_triangulate_degenerate() {
        let line = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)];
        let (_, indices) = triangulate_polygon(&line);
        assert!(indices.is_empty());
    }

    #[test]
    fn test_triangulate_with_hole() {
        let poly = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]),
            vec![LineString::from(vec![
                (2.0, 2.0),
                (8.0, 2.0),
                (8.0, 8.0),
                (2.0, 8.0),
            ])],
        );
        let (points, indices) = triangulate_polygon(&poly);
        assert_eq!(points.len(), 8);
        assert!(!indices.is_empty());
        assert_eq!(indices.len() % 3, 0);
    }
}
