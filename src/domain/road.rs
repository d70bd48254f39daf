/// Road classification based on OSM highway tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoadClass {
    Motorway,
    Trunk,
    Primary,
    Secondary,
    Tertiary,
    Residential,
    Service,
    Footway,
    Other,
}

impl RoadClass {
    /// Classify a highway tag value into a RoadClass
    pub fn from_highway_tag(tag: &str) -> RoadClass {
        match tag {
            "motorway" | "motorway_link" => RoadClass::Motorway,
            "trunk" | "trunk_link" => RoadClass::Trunk,
            "primary" | "primary_link" => RoadClass::Primary,
            "secondary" | "secondary_link" => RoadClass::Secondary,
            "tertiary" | "tertiary_link" => RoadClass::Tertiary,
            "residential" | "living_street" | "unclassified" => RoadClass::Residential,
            "service" => RoadClass::Service,
            "footway" | "path" | "cycleway" | "pedestrian" => RoadClass::Footway,
            _ => RoadClass::Other,
        }
    }

    /// Default carriageway width in meters, before the width multiplier.
    pub fn default_width_m(self) -> f64 {
        match self {
            RoadClass::Motorway => 12.0,
            RoadClass::Trunk => 10.0,
            RoadClass::Primary => 8.0,
            RoadClass::Secondary => 7.0,
            RoadClass::Tertiary => 6.0,
            RoadClass::Residential => 5.0,
            RoadClass::Service => 3.5,
            RoadClass::Footway => 2.5,
            RoadClass::Other => 4.0,
        }
    }
}

/// Bridge structure kind, from the `bridge:type` / `bridge:structure` tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BridgeKind {
    Suspension,
    Arch,
    #[default]
    Beam,
}

impl BridgeKind {
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag {
            Some(t) if t.contains("suspension") => BridgeKind::Suspension,
            Some(t) if t.contains("arch") => BridgeKind::Arch,
            _ => BridgeKind::Beam,
        }
    }

    /// Deck clearance above ground/water for this structure kind.
    pub fn clearance_m(self) -> f64 {
        match self {
            BridgeKind::Suspension => 5.0,
            BridgeKind::Arch => 4.0,
            BridgeKind::Beam => 3.0,
        }
    }
}

/// True for OSM tag values that mark a way as a bridge.
pub fn is_bridge_tag_truthy(value: &str) -> bool {
    let v = value.to_ascii_lowercase();
    matches!(v.as_str(), "yes" | "true" | "1" | "viaduct" | "aqueduct") || v.starts_with("viaduct")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_road_class_from_tag() {
        assert_eq!(RoadClass::from_highway_tag("motorway"), RoadClass::Motorway);
        assert_eq!(RoadClass::from_highway_tag("primary_link"), RoadClass::Primary);
        assert_eq!(
            RoadClass::from_highway_tag("residential"),
            RoadClass::Residential
        );
        assert_eq!(RoadClass::from_highway_tag("footway"), RoadClass::Footway);
        assert_eq!(RoadClass::from_highway_tag("busway"), RoadClass::Other);
    }

    #[test]
    fn test_default_widths_ordered() {
        assert!(RoadClass::Motorway.default_width_m() > RoadClass::Primary.default_width_m());
        assert!(RoadClass::Primary.default_width_m() > RoadClass::Residential.default_width_m());
        assert!(RoadClass::Residential.default_width_m() > RoadClass::Footway.default_width_m());
    }

    #[test]
    fn test_bridge_kind() {
        assert_eq!(BridgeKind::from_tag(Some("suspension")), BridgeKind::Suspension);
        assert_eq!(BridgeKind::from_tag(Some("arch")), BridgeKind::Arch);
        assert_eq!(BridgeKind::from_tag(Some("beam")), BridgeKind::Beam);
        assert_eq!(BridgeKind::from_tag(None), BridgeKind::Beam);
        assert_eq!(BridgeKind::Suspension.clearance_m(), 5.0);
        assert_eq!(BridgeKind::Beam.clearance_m(), 3.0);
    }

    #[test]
    fn test_bridge_tag_truthy() {
        assert!(is_bridge_tag_truthy("yes"));
        assert!(is_bridge_tag_truthy("viaduct"));
        assert!(is_bridge_tag_truthy("1"));
        assert!(!is_bridge_tag_truthy("no"));
        assert!(!is_bridge_tag_truthy(""));
    }
}
