use super::feature::Tags;

/// POI classification used for deterministic selection when the marker
/// count exceeds the cap. Lower rank wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PoiClass {
    Fountain,
    Memorial,
    Artwork,
    Viewpoint,
    Bench,
    Other,
}

impl PoiClass {
    pub fn from_tags(tags: &Tags) -> Self {
        if let Some(amenity) = tags.get("amenity") {
            match amenity.as_str() {
                "fountain" => return PoiClass::Fountain,
                "bench" => return PoiClass::Bench,
                _ => {}
            }
        }
        if let Some(historic) = tags.get("historic") {
            if historic == "memorial" || historic == "monument" {
                return PoiClass::Memorial;
            }
        }
        if let Some(tourism) = tags.get("tourism") {
            match tourism.as_str() {
                "artwork" => return PoiClass::Artwork,
                "viewpoint" => return PoiClass::Viewpoint,
                _ => {}
            }
        }
        PoiClass::Other
    }

    pub fn priority(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_classification() {
        assert_eq!(
            PoiClass::from_tags(&tags(&[("amenity", "fountain")])),
            PoiClass::Fountain
        );
        assert_eq!(
            PoiClass::from_tags(&tags(&[("historic", "memorial")])),
            PoiClass::Memorial
        );
        assert_eq!(
            PoiClass::from_tags(&tags(&[("tourism", "viewpoint")])),
            PoiClass::Viewpoint
        );
        assert_eq!(PoiClass::from_tags(&tags(&[])), PoiClass::Other);
    }

    #[test]
    fn test_priority_order() {
        assert!(PoiClass::Fountain.priority() < PoiClass::Bench.priority());
        assert!(PoiClass::Bench.priority() < PoiClass::Other.priority());
    }
}
