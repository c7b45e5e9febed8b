pub mod simplify;

pub use simplify::{simplify_geometry, simplify_points, simplify_polygon};
