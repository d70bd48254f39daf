use geo::{coord, BooleanOps, Coord, LineString, MultiPolygon, Polygon};

/// Segments used to approximate a quarter turn of a round cap or join.
const CAP_SEGMENTS: usize = 8;

/// Buffer a polyline into a polygon of the given half width, with round
/// caps and joins.
///
/// Each segment becomes a capsule (rectangle plus semicircular caps); the
/// capsules are unioned, which resolves joins into round corners and merges
/// self-overlapping stretches. Returns an empty multipolygon for degenerate
/// input.
pub fn buffer_polyline(line: &LineString<f64>, half_width: f64) -> MultiPolygon<f64> {
    if half_width <= 0.0 {
        return MultiPolygon(vec![]);
    }

    let pts: Vec<Coord<f64>> = line.coords().copied().collect();
    let mut capsules = Vec::new();
    for pair in pts.windows(2) {
        if let Some(c) = capsule(pair[0], pair[1], half_width) {
            capsules.push(c);
        }
    }

    if capsules.is_empty() {
        // Zero-length line: fall back to a disc around the first point.
        return match pts.first() {
            Some(&p) => MultiPolygon(vec![circle(p, half_width)]),
            None => MultiPolygon(vec![]),
        };
    }

    union_all(capsules)
}

/// Union a collection of polygons into one multipolygon.
pub fn union_all(polys: Vec<Polygon<f64>>) -> MultiPolygon<f64> {
    let mut iter = polys.into_iter();
    let mut acc = match iter.next() {
        Some(p) => MultiPolygon(vec![p]),
        None => return MultiPolygon(vec![]),
    };
    for p in iter {
        acc = acc.union(&MultiPolygon(vec![p]));
    }
    acc
}

/// Union a collection of multipolygons into one.
pub fn union_all_multi(polys: Vec<MultiPolygon<f64>>) -> MultiPolygon<f64> {
    let mut iter = polys.into_iter();
    let mut acc = match iter.next() {
        Some(p) => p,
        None => return MultiPolygon(vec![]),
    };
    for p in iter {
        acc = acc.union(&p);
    }
    acc
}

/// Capsule around one segment: CCW ring of rectangle sides and two
/// semicircular caps. Returns None for a zero-length segment.
fn capsule(p1: Coord<f64>, p2: Coord<f64>, r: f64) -> Option<Polygon<f64>> {
    let dx = p2.x - p1.x;
    let dy = p2.y - p1.y;
    let len = (dx * dx + dy * dy).sqrt();
    if len < 1e-12 {
        return None;
    }
    let (ux, uy) = (dx / len, dy / len);
    // Perpendicular, 90 degrees counter-clockwise from the direction.
    let (px, py) = (-uy, ux);
    let heading = uy.atan2(ux);

    let mut ring = Vec::with_capacity(4 + 2 * CAP_SEGMENTS);
    // Right side, p1 -> p2.
    ring.push(coord! { x: p1.x - px * r, y: p1.y - py * r });
    ring.push(coord! { x: p2.x - px * r, y: p2.y - py * r });
    // End cap around p2, from heading - 90deg to heading + 90deg.
    arc_points(p2, r, heading - std::f64::consts::FRAC_PI_2, &mut ring);
    // Left side, p2 -> p1.
    ring.push(coord! { x: p2.x + px * r, y: p2.y + py * r });
    ring.push(coord! { x: p1.x + px * r, y: p1.y + py * r });
    // Start cap around p1, from heading + 90deg to heading + 270deg.
    arc_points(p1, r, heading + std::f64::consts::FRAC_PI_2, &mut ring);

    Some(Polygon::new(LineString::from(ring), vec![]))
}

/// Interior points of a half-circle arc starting at `start_angle`, sweeping
/// 180 degrees counter-clockwise. Endpoints are omitted (the caller already
/// placed them).
fn arc_points(center: Coord<f64>, r: f64, start_angle: f64, out: &mut Vec<Coord<f64>>) {
    let step = std::f64::consts::PI / CAP_SEGMENTS as f64;
    for k in 1..CAP_SEGMENTS {
        let a = start_angle + step * k as f64;
        out.push(coord! { x: center.x + r * a.cos(), y: center.y + r * a.sin() });
    }
}

fn circle(center: Coord<f64>, r: f64) -> Polygon<f64> {
    let n = 4 * CAP_SEGMENTS;
    let ring: Vec<Coord<f64>> = (0..n)
        .map(|k| {
            let a = std::f64::consts::TAU * k as f64 / n as f64;
            coord! { x: center.x + r * a.cos(), y: center.y + r * a.sin() }
        })
        .collect();
    Polygon::new(LineString::from(ring), vec![])
}
