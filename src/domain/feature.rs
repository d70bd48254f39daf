use std::collections::HashMap;

use geo::{LineString, MapCoords, Point, Polygon};

use super::road::{BridgeKind, RoadClass};
use crate::geometry::GlobalAnchor;

/// OSM-style key/value tags attached to a feature.
pub type Tags = HashMap<String, String>;

/// A planar polygon feature (possibly with holes) with its tags.
///
/// Coordinates arrive in the projected metric CRS recorded by the anchor;
/// [`PolygonFeature::to_local`] converts them into the local frame before
/// processing.
#[derive(Debug, Clone)]
pub struct PolygonFeature {
    pub id: u64,
    pub polygon: Polygon<f64>,
    pub tags: Tags,
    /// Explicit height in meters, when known upstream. Overrides tags.
    pub height_m: Option<f64>,
}

impl PolygonFeature {
    pub fn new(id: u64, polygon: Polygon<f64>) -> Self {
        Self {
            id,
            polygon,
            tags: Tags::new(),
            height_m: None,
        }
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_height(mut self, height_m: f64) -> Self {
        self.height_m = Some(height_m);
        self
    }

    pub fn to_local(&self, anchor: &GlobalAnchor) -> Self {
        let mut out = self.clone();
        out.polygon = self.polygon.map_coords(|c| {
            let (x, y) = anchor.to_local(c.x, c.y);
            geo::coord! { x: x, y: y }
        });
        out
    }
}

/// A road centerline with its classification and bridge tags.
#[derive(Debug, Clone)]
pub struct LineFeature {
    pub id: u64,
    pub line: LineString<f64>,
    pub tags: Tags,
    pub class: RoadClass,
}

impl LineFeature {
    pub fn new(id: u64, line: LineString<f64>, class: RoadClass) -> Self {
        Self {
            id,
            line,
            tags: Tags::new(),
            class,
        }
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    /// Whether the way is tagged as a bridge.
    pub fn bridge_tagged(&self) -> bool {
        self.tags
            .get("bridge")
            .is_some_and(|v| super::road::is_bridge_tag_truthy(v))
    }

    pub fn bridge_kind(&self) -> BridgeKind {
        BridgeKind::from_tag(
            self.tags
                .get("bridge:type")
                .or_else(|| self.tags.get("bridge:structure"))
                .map(String::as_str),
        )
    }

    pub fn to_local(&self, anchor: &GlobalAnchor) -> Self {
        let mut out = self.clone();
        out.line = self.line.map_coords(|c| {
            let (x, y) = anchor.to_local(c.x, c.y);
            geo::coord! { x: x, y: y }
        });
        out
    }
}

/// A point of interest marker.
#[derive(Debug, Clone)]
pub struct PoiFeature {
    pub id: u64,
    pub point: Point<f64>,
    pub tags: Tags,
}

impl PoiFeature {
    pub fn new(id: u64, point: Point<f64>) -> Self {
        Self {
            id,
            point,
            tags: Tags::new(),
        }
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    pub fn to_local(&self, anchor: &GlobalAnchor) -> Self {
        let mut out = self.clone();
        let (x, y) = anchor.to_local(self.point.x(), self.point.y());
        out.point = Point::new(x, y);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_bridge_tagged() {
        let line = LineString::from(vec![(0.0, 0.0), (1.0, 1.0)]);
        let road = LineFeature::new(1, line.clone(), RoadClass::Primary);
        assert!(!road.bridge_tagged());

        let bridge = LineFeature::new(2, line, RoadClass::Primary)
            .with_tags(tags(&[("bridge", "yes"), ("bridge:type", "suspension")]));
        assert!(bridge.bridge_tagged());
        assert_eq!(bridge.bridge_kind(), BridgeKind::Suspension);
    }

    #[test]
    fn test_polygon_to_local() {
        let anchor = GlobalAnchor::for_region(10.0, 10.0, 10.2, 10.2).unwrap();
        let (ox, oy) = anchor.origin();
        let poly = polygon![
            (x: ox + 10.0, y: oy + 20.0),
            (x: ox + 30.0, y: oy + 20.0),
            (x: ox + 30.0, y: oy + 40.0),
        ];
        let feature = PolygonFeature::new(7, poly);
        let local = feature.to_local(&anchor);
        let first = local.polygon.exterior().0[0];
        assert!((first.x - 10.0).abs() < 1e-9);
        assert!((first.y - 20.0).abs() < 1e-9);
        assert_eq!(local.id, 7);
    }
}
