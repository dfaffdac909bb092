//! Polygon geometry primitives: vertex rings, edge normals and bounding boxes.

pub mod axes;
pub mod bounds;
pub mod vertices;
