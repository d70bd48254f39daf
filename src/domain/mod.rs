pub mod feature;
pub mod material;
pub mod poi;
pub mod road;

pub use feature::{LineFeature, PoiFeature, PolygonFeature, Tags};
pub use material::Material;
pub use poi::PoiClass;
pub use road::{is_bridge_tag_truthy, BridgeKind, RoadClass};
