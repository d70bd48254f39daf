pub mod extrude;
pub mod stl;
pub mod tri;
pub mod triangulation;
pub mod validation;

pub use extrude::extrude_polygon;
pub use stl::write_stl;
pub use tri::TriMesh;
pub use triangulation::{ring_coords, triangulate_polygon};
pub use validation::{sanitize, validate_mesh, ValidationResult};
