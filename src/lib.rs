//! Spatial-data core: a geometry container with text and WKB codecs, box
//! algebra, index support operations with an in-memory R-tree, block range
//! summaries and Douglas–Peucker simplification.

pub mod codec;
pub mod errors;
pub mod geometry;
pub mod index;
pub mod summary;
pub mod utils;

pub use codec::{bbox_of, decode, encode, ByteOrder, Encoded, Format, GeometryInput};
pub use errors::{GeoError, Result};
pub use geometry::{Box2D, Box3D, BoxND, Geometry, GeometryKind, GeometryType, Point, SubObject};
pub use index::{IndexConfig, IndexKey, Strategy};
pub use summary::{BlockSummary, SummaryValue};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        geometry::{HasArea, UNKNOWN_SRID},
        index::{penalty, union},
        utils::simplify_points,
    };

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_core_types_are_thread_safe() {
        assert_send_sync::<Geometry>();
        assert_send_sync::<BoxND>();
        assert_send_sync::<IndexKey>();
        assert_send_sync::<BlockSummary>();
        assert_send_sync::<GeoError>();
    }

    #[test]
    fn test_point_scenario() {
        let g = decode(GeometryInput::Text("POINT(1 2)")).unwrap();
        assert_eq!(&[SubObject::Point(Point::new(1.0, 2.0))], g.sub_objects());
        assert!(!g.is_3d());
        let b = bbox_of(&g).unwrap();
        assert_eq!(Box3D::new(Point::new(1.0, 2.0), Point::new(1.0, 2.0)), b);
    }

    #[test]
    fn test_line_scenario() {
        let g = decode(GeometryInput::Text("LINESTRING(0 0, 2 2)")).unwrap();
        let points = g.lines().next().unwrap();
        assert_eq!(points, simplify_points(points, 0.5).unwrap().as_slice());
    }

    #[test]
    fn test_polygon_scenario() {
        let g = decode(GeometryInput::Text("POLYGON((0 0,0 10,10 10,10 0,0 0))")).unwrap();
        assert_eq!(100.0, g.bbox().unwrap().to_box2d().area());
    }

    #[test]
    fn test_wkb_scenario() {
        let g = Geometry::point(UNKNOWN_SRID, 1.5, -2.25);
        let Encoded::Binary(mut bytes) = encode(&g, Format::Binary(ByteOrder::LittleEndian)).unwrap() else {
            panic!("expected binary output");
        };
        assert_eq!(g, decode(GeometryInput::Binary(&bytes)).unwrap());

        // rewrite the body in the other order, then flip the marker
        let body: Vec<u8> = bytes[1..5]
            .iter()
            .rev()
            .copied()
            .chain(bytes[5..13].iter().rev().copied())
            .chain(bytes[13..21].iter().rev().copied())
            .collect();
        bytes[0] = ByteOrder::BigEndian.as_byte();
        bytes[1..].copy_from_slice(&body);
        assert_eq!(g, decode(GeometryInput::Binary(&bytes)).unwrap());
    }

    #[test]
    fn test_box_scenario() {
        let a = Box2D::new(0.0, 0.0, 10.0, 10.0);
        let b = Box2D::new(5.0, 5.0, 15.0, 15.0);
        assert!(a.overlaps(&b));
        let keys = [IndexKey::new(a, UNKNOWN_SRID), IndexKey::new(b, UNKNOWN_SRID)];
        assert_eq!(Box2D::new(0.0, 0.0, 15.0, 15.0), union(&keys).unwrap().bbox);
        assert_eq!(125.0, penalty(&a, &b));
    }

    #[test]
    fn test_block_summary_scenario() {
        let mut summary = BlockSummary::new();
        summary
            .add_value(Some(&BoxND::from(Box2D::new(0.0, 0.0, 1.0, 1.0))))
            .unwrap();
        let cube = Box3D::new(Point::new_3d(0.0, 0.0, 0.0), Point::new_3d(1.0, 1.0, 1.0));
        assert!(summary.add_value(Some(&BoxND::from(cube))).unwrap());
        assert!(summary.is_unmergeable());
        assert!(!summary.add_value(Some(&BoxND::from(cube))).unwrap());
    }
}
