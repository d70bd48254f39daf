pub mod anchor;
pub mod bounds;
pub mod buffer;

pub use anchor::GlobalAnchor;
pub use bounds::Bounds;
pub use buffer::{buffer_polyline, union_all, union_all_multi};
