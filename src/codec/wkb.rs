//! Well-known binary.
//!
//! Every record starts with its own order byte followed by a 4-byte type
//! word. Multi and collection members are complete records, so a reader
//! has to honour the order byte of every nested record.

use super::{ring_problem, split_srid_prefix, ByteOrder};
use crate::{errors::*, geometry::*};
use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};
use snafu::prelude::*;
use std::io::Cursor;

/// Set on the type word of records carrying a z coordinate.
pub const WKB_3D_FLAG: u32 = 0x8000_0000;

/// Order byte plus type word.
const HEADER_SIZE: usize = 5;
/// The smallest possible record: a header and a zero count.
const MIN_RECORD_SIZE: usize = HEADER_SIZE + 4;

fn point_size(is_3d: bool) -> usize {
    if is_3d {
        24
    } else {
        16
    }
}

fn sub_object_size(object: &SubObject, is_3d: bool) -> usize {
    HEADER_SIZE
        + match object {
            SubObject::Point(_) => point_size(is_3d),
            SubObject::Line(points) => 4 + points.len() * point_size(is_3d),
            SubObject::Polygon(poly) => {
                4 + poly
                    .rings
                    .iter()
                    .map(|r| 4 + r.len() * point_size(is_3d))
                    .sum::<usize>()
            }
        }
}

/// Exact number of bytes [`to_wkb`] produces for `geometry`.
pub fn wkb_size(geometry: &Geometry) -> usize {
    match (geometry.kind(), geometry.sub_objects()) {
        (GeometryKind::BoxOnly, _) => geometry.envelope().map_or(0, |env| wkb_size(&env)),
        (GeometryKind::Single(_), [object]) => sub_object_size(object, geometry.is_3d()),
        (_, objects) => {
            MIN_RECORD_SIZE
                + objects
                    .iter()
                    .map(|o| sub_object_size(o, geometry.is_3d()))
                    .sum::<usize>()
        }
    }
}

/// Encode `geometry` as WKB in the given byte order.
///
/// The SRID is not part of WKB. Box-only geometries are written as their
/// envelope polygon.
pub fn to_wkb(geometry: &Geometry, order: ByteOrder) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(wkb_size(geometry));
    match order {
        ByteOrder::BigEndian => write_geometry::<BigEndian>(&mut out, geometry, order)?,
        ByteOrder::LittleEndian => write_geometry::<LittleEndian>(&mut out, geometry, order)?,
    }
    Ok(out)
}

/// Upper-case hex rendering of [`to_wkb`].
pub fn to_hex_wkb(geometry: &Geometry, order: ByteOrder) -> Result<String> {
    Ok(to_wkb(geometry, order)?
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect())
}

fn write_header<B: byteorder::ByteOrder>(
    out: &mut Vec<u8>,
    order: ByteOrder,
    geometry_type: GeometryType,
    is_3d: bool,
) -> Result<()> {
    out.write_u8(order.as_byte())?;
    let mut word = geometry_type.code();
    if is_3d {
        word |= WKB_3D_FLAG;
    }
    out.write_u32::<B>(word)?;
    Ok(())
}

fn write_count<B: byteorder::ByteOrder>(out: &mut Vec<u8>, count: usize) -> Result<()> {
    let count = u32::try_from(count).ok().context(WkbSnafu {
        description: format!("{count} elements do not fit a WKB count"),
    })?;
    out.write_u32::<B>(count)?;
    Ok(())
}

fn write_points<B: byteorder::ByteOrder>(
    out: &mut Vec<u8>,
    points: &[Point],
    is_3d: bool,
) -> Result<()> {
    write_count::<B>(out, points.len())?;
    for p in points {
        write_point::<B>(out, p, is_3d)?;
    }
    Ok(())
}

fn write_point<B: byteorder::ByteOrder>(out: &mut Vec<u8>, p: &Point, is_3d: bool) -> Result<()> {
    out.write_f64::<B>(p.x)?;
    out.write_f64::<B>(p.y)?;
    if is_3d {
        out.write_f64::<B>(p.z)?;
    }
    Ok(())
}

fn write_sub_object<B: byteorder::ByteOrder>(
    out: &mut Vec<u8>,
    object: &SubObject,
    order: ByteOrder,
    is_3d: bool,
) -> Result<()> {
    write_header::<B>(out, order, GeometryKind::Single(object.kind()).into(), is_3d)?;
    match object {
        SubObject::Point(p) => write_point::<B>(out, p, is_3d),
        SubObject::Line(points) => write_points::<B>(out, points, is_3d),
        SubObject::Polygon(poly) => {
            write_count::<B>(out, poly.rings.len())?;
            for ring in poly.rings.iter() {
                write_points::<B>(out, ring, is_3d)?;
            }
            Ok(())
        }
    }
}

fn write_geometry<B: byteorder::ByteOrder>(
    out: &mut Vec<u8>,
    geometry: &Geometry,
    order: ByteOrder,
) -> Result<()> {
    let is_3d = geometry.is_3d();
    match (geometry.kind(), geometry.sub_objects()) {
        (GeometryKind::BoxOnly, _) => {
            let envelope = geometry.envelope().context(WkbSnafu {
                description: "a box-only geometry without a box cannot be written",
            })?;
            write_geometry::<B>(out, &envelope, order)
        }
        (GeometryKind::Single(_), [object]) => write_sub_object::<B>(out, object, order, is_3d),
        (GeometryKind::Single(kind), objects) => WkbSnafu {
            description: format!("a single {kind:?} holds {} objects", objects.len()),
        }
        .fail(),
        (kind, objects) => {
            write_header::<B>(out, order, kind.into(), is_3d)?;
            write_count::<B>(out, objects.len())?;
            for object in objects {
                write_sub_object::<B>(out, object, order, is_3d)?;
            }
            Ok(())
        }
    }
}

/// Decode a WKB buffer. The result carries the unknown SRID.
pub fn from_wkb(bytes: &[u8]) -> Result<Geometry> {
    from_wkb_with_srid(bytes, UNKNOWN_SRID)
}

/// Decode a WKB buffer and tag the result with `srid`.
///
/// The whole buffer must be consumed.
pub fn from_wkb_with_srid(bytes: &[u8], srid: i32) -> Result<Geometry> {
    ensure!(
        !bytes.is_empty(),
        WkbSnafu {
            description: "empty WKB buffer"
        }
    );
    let mut reader = WkbReader {
        cursor: Cursor::new(bytes),
        is_3d: false,
    };
    let (header, objects) = reader.read_record(0)?;
    let remaining = reader.remaining();
    ensure!(
        remaining == 0,
        WkbSnafu {
            description: format!("{remaining} trailing bytes after the geometry")
        }
    );
    let kind = GeometryKind::from(header.geometry_type);
    if objects.is_empty() {
        return Ok(Geometry::empty(srid, kind));
    }
    Geometry::new(srid, reader.is_3d, kind, objects)
}

/// Decode upper- or lower-case hex WKB, optionally preceded by `SRID=n;`.
pub fn from_hex_wkb(hex: &str) -> Result<Geometry> {
    let (srid, hex) = split_srid_prefix(hex)?;
    let hex = hex.trim();
    ensure!(
        hex.len() % 2 == 0,
        ParseSnafu {
            description: format!("hex WKB has odd length {}", hex.len())
        }
    );
    let bytes = hex
        .as_bytes()
        .chunks(2)
        .enumerate()
        .map(|(index, pair)| {
            let digit = |c: u8| (c as char).to_digit(16);
            match (digit(pair[0]), digit(pair[1])) {
                (Some(high), Some(low)) => Ok((high << 4 | low) as u8),
                _ => ParseSnafu {
                    description: format!("invalid hex digit at position {}", index * 2),
                }
                .fail(),
            }
        })
        .collect::<Result<Vec<u8>>>()?;
    from_wkb_with_srid(&bytes, srid.unwrap_or(UNKNOWN_SRID))
}

struct RecordHeader {
    order: ByteOrder,
    geometry_type: GeometryType,
    is_3d: bool,
}

struct WkbReader<'a> {
    cursor: Cursor<&'a [u8]>,
    is_3d: bool,
}

impl<'a> WkbReader<'a> {
    fn offset(&self) -> u64 {
        self.cursor.position()
    }

    fn remaining(&self) -> usize {
        let len = self.cursor.get_ref().len();
        len.saturating_sub(self.cursor.position() as usize)
    }

    fn read_u32(&mut self, order: ByteOrder) -> Result<u32> {
        Ok(match order {
            ByteOrder::BigEndian => self.cursor.read_u32::<BigEndian>()?,
            ByteOrder::LittleEndian => self.cursor.read_u32::<LittleEndian>()?,
        })
    }

    fn read_f64(&mut self, order: ByteOrder) -> Result<f64> {
        Ok(match order {
            ByteOrder::BigEndian => self.cursor.read_f64::<BigEndian>()?,
            ByteOrder::LittleEndian => self.cursor.read_f64::<LittleEndian>()?,
        })
    }

    /// Read a count and make sure the buffer can hold that many elements of
    /// at least `element_size` bytes.
    fn read_count(&mut self, order: ByteOrder, element_size: usize) -> Result<usize> {
        let offset = self.offset();
        let count = self.read_u32(order)? as usize;
        let remaining = self.remaining();
        ensure!(
            count.saturating_mul(element_size) <= remaining,
            WkbSnafu {
                description: format!(
                    "count {count} at offset {offset} needs more than the {remaining} remaining bytes"
                )
            }
        );
        Ok(count)
    }

    fn read_header(&mut self) -> Result<RecordHeader> {
        let offset = self.offset();
        let order = ByteOrder::from_byte(self.cursor.read_u8()?)?;
        let word = self.read_u32(order)?;
        let code = word & !WKB_3D_FLAG;
        let geometry_type = GeometryType::from_code(code)
            .filter(|t| *t != GeometryType::BoxOnly)
            .context(WkbSnafu {
                description: format!("unknown geometry type code {code} at offset {offset}"),
            })?;
        Ok(RecordHeader {
            order,
            geometry_type,
            is_3d: word & WKB_3D_FLAG != 0,
        })
    }

    fn read_point(&mut self, order: ByteOrder, is_3d: bool) -> Result<Point> {
        let x = self.read_f64(order)?;
        let y = self.read_f64(order)?;
        let z = if is_3d { self.read_f64(order)? } else { 0.0 };
        Ok(Point::new_3d(x, y, z))
    }

    fn read_points(&mut self, order: ByteOrder, is_3d: bool) -> Result<Vec<Point>> {
        let count = self.read_count(order, point_size(is_3d))?;
        (0..count).map(|_| self.read_point(order, is_3d)).collect()
    }

    /// Read the next header without consuming it.
    fn peek_header(&mut self) -> Result<RecordHeader> {
        let position = self.cursor.position();
        let header = self.read_header();
        self.cursor.set_position(position);
        header
    }

    /// Read one record; multi records yield all their members.
    ///
    /// `depth` is 0 for the outermost record. Collections may only appear
    /// there, multi records at most one level below, inside a collection.
    fn read_record(&mut self, depth: usize) -> Result<(RecordHeader, Vec<SubObject>)> {
        let offset = self.offset();
        let header = self.read_header()?;
        match GeometryKind::from(header.geometry_type) {
            GeometryKind::Collection if depth > 0 => {
                return WkbSnafu {
                    description: format!("nested collection at offset {offset}"),
                }
                .fail();
            }
            GeometryKind::Multi(_) if depth > 1 => {
                return WkbSnafu {
                    description: format!(
                        "{} at offset {offset} is nested too deeply",
                        header.geometry_type.name()
                    ),
                }
                .fail();
            }
            _ => (),
        }
        self.is_3d |= header.is_3d;
        let (order, is_3d) = (header.order, header.is_3d);
        let objects = match header.geometry_type {
            GeometryType::Point => vec![SubObject::Point(self.read_point(order, is_3d)?)],
            GeometryType::LineString => {
                let points = self.read_points(order, is_3d)?;
                if points.is_empty() {
                    Vec::new()
                } else {
                    vec![SubObject::Line(points)]
                }
            }
            GeometryType::Polygon => {
                let ring_count = self.read_count(order, 4)?;
                let mut rings = Vec::with_capacity(ring_count);
                for index in 0..ring_count {
                    let ring = self.read_points(order, is_3d)?;
                    if let Some(problem) = ring_problem(&ring) {
                        return WkbSnafu {
                            description: format!(
                                "ring {index} of the polygon at offset {offset} {problem}"
                            ),
                        }
                        .fail();
                    }
                    rings.push(ring);
                }
                if rings.is_empty() {
                    Vec::new()
                } else {
                    vec![Polygon::new(rings).into()]
                }
            }
            multi_type => {
                let expected = match GeometryKind::from(multi_type) {
                    GeometryKind::Multi(kind) => Some(GeometryType::from(GeometryKind::Single(kind))),
                    _ => None,
                };
                let count = self.read_count(order, MIN_RECORD_SIZE)?;
                let mut objects = Vec::with_capacity(count);
                for _ in 0..count {
                    let member_offset = self.offset();
                    if let Some(expected) = expected {
                        let member = self.peek_header()?;
                        ensure!(
                            member.geometry_type == expected,
                            WkbSnafu {
                                description: format!(
                                    "{} member at offset {member_offset} is a {}",
                                    multi_type.name(),
                                    member.geometry_type.name()
                                )
                            }
                        );
                    }
                    let (_, member_objects) = self.read_record(depth + 1)?;
                    objects.extend(member_objects);
                }
                objects
            }
        };
        Ok((header, objects))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::from_text;

    #[test]
    fn test_point_layout() {
        let p = Geometry::point(UNKNOWN_SRID, 1.0, 2.0);
        let le = to_wkb(&p, ByteOrder::LittleEndian).unwrap();
        assert_eq!(21, le.len());
        assert_eq!(&[1, 1, 0, 0, 0], &le[..5]);
        assert_eq!(1.0f64.to_le_bytes(), le[5..13]);
        assert_eq!(2.0f64.to_le_bytes(), le[13..21]);

        let p3 = from_text("POINT(1 2 3)").unwrap();
        let be = to_wkb(&p3, ByteOrder::BigEndian).unwrap();
        assert_eq!(29, be.len());
        assert_eq!(&[0, 0x80, 0, 0, 1], &be[..5]);
        assert_eq!(3.0f64.to_be_bytes(), be[21..29]);
    }

    #[test]
    fn test_flipped_order_is_self_consistent() {
        let p = Geometry::point(UNKNOWN_SRID, 1.5, -2.25);
        let le = to_wkb(&p, ByteOrder::LittleEndian).unwrap();
        assert_eq!(p, from_wkb(&le).unwrap());

        let mut flipped = vec![ByteOrder::BigEndian.as_byte()];
        flipped.extend(le[1..5].iter().rev());
        for value in le[5..].chunks(8) {
            flipped.extend(value.iter().rev());
        }
        assert_eq!(to_wkb(&p, ByteOrder::BigEndian).unwrap(), flipped);
        assert_eq!(p, from_wkb(&flipped).unwrap());
    }

    #[test]
    fn test_round_trip_both_orders() {
        let texts = [
            "LINESTRING(0 0,1 1,2 0.5)",
            "POLYGON((0 0 1,0 10 1,10 10 1,10 0 1,0 0 1),(2 2 0,3 2 0,3 3 0,2 2 0))",
            "MULTIPOINT(0 0,1 1)",
            "MULTILINESTRING((0 0,1 1),(5 5,6 6,7 5))",
            "MULTIPOLYGON(((0 0,0 1,1 1,0 0)),((5 5,5 6,6 6,5 5)))",
            "GEOMETRYCOLLECTION(POINT(1 2),LINESTRING(0 0,1 1),POLYGON((0 0,0 1,1 1,0 0)))",
            "MULTIPOINT(EMPTY)",
            "GEOMETRYCOLLECTION(EMPTY)",
        ];
        for text in texts {
            let g = from_text(text).unwrap();
            for order in [ByteOrder::BigEndian, ByteOrder::LittleEndian] {
                let bytes = to_wkb(&g, order).unwrap();
                assert_eq!(wkb_size(&g), bytes.len(), "{text}");
                assert_eq!(g, from_wkb(&bytes).unwrap(), "{text} in {order:?}");
            }
        }
    }

    #[test]
    fn test_members_are_full_records() {
        let g = from_text("MULTIPOINT(1 2,3 4)").unwrap();
        let bytes = to_wkb(&g, ByteOrder::LittleEndian).unwrap();
        assert_eq!(9 + 2 * 21, bytes.len());
        assert_eq!(&[1, 4, 0, 0, 0, 2, 0, 0, 0], &bytes[..9]);
        assert_eq!(&[1, 1, 0, 0, 0], &bytes[9..14]);

        // every member may use its own byte order
        let mut mixed = vec![0, 0, 0, 0, 4, 0, 0, 0, 2];
        mixed.extend(to_wkb(&Geometry::point(UNKNOWN_SRID, 1.0, 2.0), ByteOrder::LittleEndian).unwrap());
        mixed.extend(to_wkb(&Geometry::point(UNKNOWN_SRID, 3.0, 4.0), ByteOrder::BigEndian).unwrap());
        assert_eq!(g, from_wkb(&mixed).unwrap());
    }

    #[test]
    fn test_srid_is_not_on_the_wire() {
        let g = from_text("SRID=4326;POINT(1 2)").unwrap();
        let bytes = to_wkb(&g, ByteOrder::native()).unwrap();
        assert_eq!(UNKNOWN_SRID, from_wkb(&bytes).unwrap().srid());
        assert_eq!(g, from_wkb_with_srid(&bytes, 4326).unwrap());
    }

    #[test]
    fn test_box_only_writes_envelope() {
        let g = from_text("BOX3D(0 0 0,2 3 4)").unwrap();
        let decoded = from_wkb(&to_wkb(&g, ByteOrder::LittleEndian).unwrap()).unwrap();
        assert_eq!(GeometryType::Polygon, decoded.geometry_type());
        assert_eq!(6.0, decoded.area_2d());
    }

    #[test]
    fn test_hex() {
        let g = Geometry::point(UNKNOWN_SRID, 1.0, 2.0);
        let hex = to_hex_wkb(&g, ByteOrder::LittleEndian).unwrap();
        assert_eq!("0101000000000000000000F03F0000000000000040", hex);
        assert_eq!(g, from_hex_wkb(&hex).unwrap());
        assert_eq!(g, from_hex_wkb(&hex.to_lowercase()).unwrap());
        assert_eq!(31466, from_hex_wkb(&format!("SRID=31466;{hex}")).unwrap().srid());
        assert!(matches!(from_hex_wkb("010"), Err(GeoError::Parse { .. })));
        assert!(matches!(from_hex_wkb("01XY"), Err(GeoError::Parse { .. })));
    }

    fn wkb_error(bytes: &[u8]) -> String {
        match from_wkb(bytes) {
            Err(GeoError::Wkb { description, .. }) => description,
            other => panic!("expected a WKB error for {bytes:?}, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_input() {
        let good = to_wkb(&Geometry::point(UNKNOWN_SRID, 1.0, 2.0), ByteOrder::LittleEndian)
            .unwrap();
        assert!(wkb_error(&[]).contains("empty"));

        let mut bad_order = good.clone();
        bad_order[0] = 7;
        assert!(wkb_error(&bad_order).contains("byte order"));

        let mut bad_type = good.clone();
        bad_type[1] = 99;
        assert!(wkb_error(&bad_type).contains("unknown geometry type code 99"));
        bad_type[1] = 8;
        assert!(wkb_error(&bad_type).contains("unknown geometry type code 8"));

        assert!(wkb_error(&good[..15]).contains("insufficient bytes"));

        let mut trailing = good.clone();
        trailing.push(0);
        assert!(wkb_error(&trailing).contains("1 trailing bytes"));

        let huge_line = [1, 2, 0, 0, 0, 0xff, 0xff, 0xff, 0x7f];
        assert!(wkb_error(&huge_line).contains("remaining bytes"));
    }

    #[test]
    fn test_structural_errors() {
        let line = to_wkb(&from_text("LINESTRING(0 0,1 1)").unwrap(), ByteOrder::LittleEndian)
            .unwrap();
        let mut wrong_member = vec![1, 4, 0, 0, 0, 1, 0, 0, 0];
        wrong_member.extend(&line);
        assert!(wkb_error(&wrong_member).contains("MULTIPOINT member"));

        let mut nested = vec![1, 7, 0, 0, 0, 1, 0, 0, 0];
        nested.extend([1, 7, 0, 0, 0, 0, 0, 0, 0]);
        assert!(wkb_error(&nested).contains("nested collection"));

        // multi members inside a collection are flattened
        let mp = to_wkb(&from_text("MULTIPOINT(0 0,1 1)").unwrap(), ByteOrder::BigEndian).unwrap();
        let mut coll = vec![1, 7, 0, 0, 0, 1, 0, 0, 0];
        coll.extend(&mp);
        let g = from_wkb(&coll).unwrap();
        assert_eq!(GeometryType::GeometryCollection, g.geometry_type());
        assert_eq!(2, g.num_objects());
    }

    #[test]
    fn test_deeply_nested_multis_are_rejected() {
        // every level claims one member that is another MULTIPOINT
        let bytes = [1, 4, 0, 0, 0, 1, 0, 0, 0].repeat(200_000);
        assert!(wkb_error(&bytes).contains("MULTIPOINT member"));

        let mp = to_wkb(&from_text("MULTIPOINT(0 0)").unwrap(), ByteOrder::LittleEndian).unwrap();
        let mut coll_in_multi = vec![1, 4, 0, 0, 0, 1, 0, 0, 0];
        coll_in_multi.extend([1, 7, 0, 0, 0, 1, 0, 0, 0]);
        coll_in_multi.extend(&mp);
        assert!(wkb_error(&coll_in_multi).contains("MULTIPOINT member"));
    }

    #[test]
    fn test_rings_are_checked_like_text() {
        let polygon = |ring: &[(f64, f64)]| {
            let mut bytes = vec![1, 3, 0, 0, 0, 1, 0, 0, 0];
            bytes.extend((ring.len() as u32).to_le_bytes());
            for (x, y) in ring {
                bytes.extend(x.to_le_bytes());
                bytes.extend(y.to_le_bytes());
            }
            bytes
        };
        let short = polygon(&[(0.0, 0.0), (1.0, 1.0), (0.0, 0.0)]);
        assert!(wkb_error(&short).contains("has 3 points, at least 4"));
        assert!(from_text("POLYGON((0 0,1 1,0 0))").is_err());

        let open = polygon(&[(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, 0.0)]);
        assert!(wkb_error(&open).contains("is not closed"));
        assert!(from_text("POLYGON((0 0,0 1,1 1,1 0))").is_err());

        let closed = polygon(&[(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (0.0, 0.0)]);
        assert_eq!(from_text("POLYGON((0 0,0 1,1 1,0 0))").unwrap(), from_wkb(&closed).unwrap());
    }
}
