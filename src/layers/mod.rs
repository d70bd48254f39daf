pub mod buildings;
pub mod green;
pub mod poi;
pub mod roads;
pub mod water;

pub use buildings::{generate_building_meshes, BuildingConfig};
pub use green::{generate_green_meshes, GreenConfig};
pub use poi::{generate_poi_meshes, PoiConfig};
pub use roads::{generate_road_meshes, ClassWidths, RoadConfig};
pub use water::{generate_water_meshes, WaterConfig};
