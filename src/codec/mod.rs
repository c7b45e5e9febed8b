//! Conversions between [`Geometry`] values and their text and binary forms.

use crate::{errors::*, geometry::*};
use snafu::prelude::*;

pub mod text;
pub mod wkb;

pub use text::{from_text, to_text};
pub use wkb::{from_hex_wkb, from_wkb, from_wkb_with_srid, to_hex_wkb, to_wkb};

/// Byte order of the multi-byte values in a WKB buffer.
///
/// The discriminant is the value of the leading order byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ByteOrder {
    /// XDR
    BigEndian = 0,
    /// NDR
    LittleEndian = 1,
}

impl ByteOrder {
    /// The byte order of the machine we are running on.
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::BigEndian
        } else {
            ByteOrder::LittleEndian
        }
    }

    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0 => Ok(ByteOrder::BigEndian),
            1 => Ok(ByteOrder::LittleEndian),
            _ => WkbSnafu {
                description: format!("unknown byte order marker {byte}, expected 0 or 1"),
            }
            .fail(),
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn flipped(self) -> Self {
        match self {
            ByteOrder::BigEndian => ByteOrder::LittleEndian,
            ByteOrder::LittleEndian => ByteOrder::BigEndian,
        }
    }
}

impl Default for ByteOrder {
    fn default() -> Self {
        ByteOrder::native()
    }
}

/// Raw input handed to [`decode`].
#[derive(Debug, Clone, Copy)]
pub enum GeometryInput<'a> {
    Text(&'a str),
    Binary(&'a [u8]),
}

/// Requested output form for [`encode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Text,
    Binary(ByteOrder),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Encoded {
    Text(String),
    Binary(Vec<u8>),
}

/// Decode either form into a geometry.
pub fn decode(input: GeometryInput<'_>) -> Result<Geometry> {
    match input {
        GeometryInput::Text(text) => from_text(text),
        GeometryInput::Binary(bytes) => from_wkb(bytes),
    }
}

/// Inverse of [`decode`].
pub fn encode(geometry: &Geometry, format: Format) -> Result<Encoded> {
    match format {
        Format::Text => Ok(Encoded::Text(to_text(geometry))),
        Format::Binary(order) => to_wkb(geometry, order).map(Encoded::Binary),
    }
}

/// Recompute the bounding volume of `geometry` from its sub-objects.
///
/// Returns `None` when there are no sub-objects. Box-only geometries return
/// their stored volume.
pub fn bbox_of(geometry: &Geometry) -> Option<Box3D> {
    if geometry.kind() == GeometryKind::BoxOnly {
        return geometry.bbox().copied();
    }
    geometry
        .sub_objects()
        .iter()
        .map(bbox_of_sub_object)
        .fold(None, Box3D::union_opt)
}

fn bbox_of_sub_object(object: &SubObject) -> Option<Box3D> {
    match object {
        SubObject::Point(p) => Some(Box3D::around(p)),
        SubObject::Line(points) => Box3D::from_points(points.iter()),
        SubObject::Polygon(poly) => poly
            .rings
            .iter()
            .map(|ring| Box3D::from_points(ring.iter()))
            .fold(None, Box3D::union_opt),
    }
}

/// Closed rings need at least this many points.
pub(crate) const MIN_RING_POINTS: usize = 4;

/// What is wrong with a decoded polygon ring, if anything.
///
/// Both decoders accept exactly the rings that pass this check.
pub(crate) fn ring_problem(ring: &[Point]) -> Option<String> {
    let (Some(first), Some(last)) = (ring.first(), ring.last()) else {
        return Some("has no points".to_string());
    };
    if ring.len() < MIN_RING_POINTS {
        return Some(format!(
            "has {} points, at least {MIN_RING_POINTS} are required",
            ring.len()
        ));
    }
    if !first.same_as(last) {
        return Some(format!(
            "is not closed, it starts at {first} but ends at {last}"
        ));
    }
    None
}

/// Parse the `SRID=n;` prefix shared by the text form and hex input.
pub(crate) fn split_srid_prefix(input: &str) -> Result<(Option<i32>, &str)> {
    let trimmed = input.trim_start();
    let Some(rest) = trimmed
        .get(..5)
        .filter(|p| p.eq_ignore_ascii_case("SRID="))
        .map(|_| &trimmed[5..])
    else {
        return Ok((None, trimmed));
    };
    let end = rest.find(';').context(ParseSnafu {
        description: "SRID prefix is missing its terminating ';'",
    })?;
    let srid = rest[..end]
        .trim()
        .parse::<i32>()
        .ok()
        .context(ParseSnafu {
            description: format!("could not parse SRID '{}'", &rest[..end]),
        })?;
    Ok((Some(srid), &rest[end + 1..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_point_text() {
        let g = decode(GeometryInput::Text("POINT(1 2)")).unwrap();
        assert_eq!(GeometryType::Point, g.geometry_type());
        assert!(!g.is_3d());
        assert_eq!(&[SubObject::Point(Point::new(1.0, 2.0))], g.sub_objects());
        let b = bbox_of(&g).unwrap();
        assert_eq!(Point::new_3d(1.0, 2.0, 0.0), b.low_corner);
        assert_eq!(Point::new_3d(1.0, 2.0, 0.0), b.high_corner);
    }

    #[test]
    fn test_bbox_of_matches_every_coordinate() {
        let g = from_text(
            "GEOMETRYCOLLECTION(POINT(5 -3 1),LINESTRING(0 0 0,2 9 4),POLYGON((0 0 0,0 1 0,1 1 0,0 0 0)))",
        )
        .unwrap();
        let b = bbox_of(&g).unwrap();
        assert_eq!(Point::new_3d(0.0, -3.0, 0.0), b.low_corner);
        assert_eq!(Point::new_3d(5.0, 9.0, 4.0), b.high_corner);
        assert_eq!(Some(&b), g.bbox());
        for p in g.points() {
            assert!(b.contains_box(&Box3D::around(p)));
        }
        let empty = from_text("GEOMETRYCOLLECTION(EMPTY)").unwrap();
        assert_eq!(None, bbox_of(&empty));
    }

    #[test]
    fn test_encode_decode_both_forms() {
        let g = from_text("SRID=4326;MULTILINESTRING((0 0,1 1),(2 2,3 3,4 5))").unwrap();
        let Encoded::Text(text) = encode(&g, Format::Text).unwrap() else {
            panic!("expected text");
        };
        assert_eq!(g, decode(GeometryInput::Text(&text)).unwrap());
        for order in [ByteOrder::BigEndian, ByteOrder::LittleEndian] {
            let Encoded::Binary(bytes) = encode(&g, Format::Binary(order)).unwrap() else {
                panic!("expected binary");
            };
            assert_eq!(order.as_byte(), bytes[0]);
            // WKB carries no SRID
            assert_eq!(g.with_srid(UNKNOWN_SRID), decode(GeometryInput::Binary(&bytes)).unwrap());
        }
    }

    #[test]
    fn test_byte_order() {
        assert_eq!(ByteOrder::BigEndian, ByteOrder::from_byte(0).unwrap());
        assert_eq!(ByteOrder::LittleEndian, ByteOrder::from_byte(1).unwrap());
        assert!(ByteOrder::from_byte(2).is_err());
        assert_eq!(ByteOrder::native(), ByteOrder::native().flipped().flipped());
    }

    #[test]
    fn test_srid_prefix() {
        assert_eq!((Some(4326), "POINT(1 2)"), split_srid_prefix("SRID=4326;POINT(1 2)").unwrap());
        assert_eq!((None, "POINT(1 2)"), split_srid_prefix("  POINT(1 2)").unwrap());
        assert!(split_srid_prefix("SRID=abc;POINT(1 2)").is_err());
        assert!(split_srid_prefix("SRID=4326 POINT(1 2)").is_err());
    }
}
