//! The bracketed text form, e.g. `SRID=4326;MULTIPOINT(0 0,1 1)`.

use super::{ring_problem, split_srid_prefix};
use crate::{errors::*, geometry::*};
use itertools::Itertools;
use snafu::prelude::*;

/// Parse the text form of a geometry.
///
/// Accepts an optional `SRID=n;` prefix, every single and multi type word,
/// `GEOMETRYCOLLECTION` (without nested collections), `EMPTY` in both the
/// `X EMPTY` and `X(EMPTY)` spelling, `BOX3D(x y z,x y z)` and the 2D
/// `BOX(x y,x y)`.
/// Type words are case-insensitive.
pub fn from_text(input: &str) -> Result<Geometry> {
    let (srid, body) = split_srid_prefix(input)?;
    let srid = srid.unwrap_or(UNKNOWN_SRID);
    check_brackets(body)?;
    let mut parser = Parser::new(body);
    let geometry = parser.parse_geometry(srid)?;
    parser.expect_end()?;
    Ok(geometry)
}

/// Print the text form of a geometry.
///
/// Coordinates are printed with the shortest representation that reads
/// back to the identical `f64`.
pub fn to_text(geometry: &Geometry) -> String {
    let prefix = if geometry.srid() != UNKNOWN_SRID {
        format!("SRID={};", geometry.srid())
    } else {
        String::new()
    };
    let is_3d = geometry.is_3d();
    let body = match geometry.kind() {
        GeometryKind::BoxOnly => match geometry.bbox() {
            Some(b) if is_3d => b.to_string(),
            Some(b) => b.to_box2d().to_string(),
            None => "BOX3D(EMPTY)".to_string(),
        },
        _ if geometry.is_empty() => format!("{}(EMPTY)", geometry.geometry_type_name()),
        GeometryKind::Single(_) => format!(
            "{}{}",
            geometry.geometry_type_name(),
            geometry
                .sub_objects()
                .iter()
                .map(|o| body_text(o, is_3d))
                .join(",")
        ),
        GeometryKind::Multi(_) => format!(
            "{}({})",
            geometry.geometry_type_name(),
            geometry
                .sub_objects()
                .iter()
                .map(|o| match o {
                    SubObject::Point(p) => coordinate_text(p, is_3d),
                    other => body_text(other, is_3d),
                })
                .join(",")
        ),
        GeometryKind::Collection => format!(
            "{}({})",
            geometry.geometry_type_name(),
            geometry
                .sub_objects()
                .iter()
                .map(|o| format!(
                    "{}{}",
                    GeometryType::from(GeometryKind::Single(o.kind())).name(),
                    body_text(o, is_3d)
                ))
                .join(",")
        ),
    };
    prefix + &body
}

fn coordinate_text(p: &Point, is_3d: bool) -> String {
    if is_3d {
        format!("{} {} {}", p.x, p.y, p.z)
    } else {
        format!("{} {}", p.x, p.y)
    }
}

fn point_list_text(points: &[Point], is_3d: bool) -> String {
    format!(
        "({})",
        points.iter().map(|p| coordinate_text(p, is_3d)).join(",")
    )
}

fn body_text(object: &SubObject, is_3d: bool) -> String {
    match object {
        SubObject::Point(p) => format!("({})", coordinate_text(p, is_3d)),
        SubObject::Line(points) => point_list_text(points, is_3d),
        SubObject::Polygon(poly) => format!(
            "({})",
            poly.rings
                .iter()
                .map(|ring| point_list_text(ring, is_3d))
                .join(",")
        ),
    }
}

/// Reject unbalanced brackets before any allocation happens.
fn check_brackets(text: &str) -> Result<()> {
    let mut open = Vec::new();
    for (pos, c) in text.char_indices() {
        match c {
            '(' => open.push(pos),
            ')' => {
                ensure!(
                    open.pop().is_some(),
                    ParseSnafu {
                        description: format!("unmatched ')' at position {pos}")
                    }
                );
            }
            _ => (),
        }
    }
    if let Some(pos) = open.last() {
        return ParseSnafu {
            description: format!("'(' at position {pos} is never closed"),
        }
        .fail();
    }
    Ok(())
}

fn describe(found: Option<u8>) -> String {
    match found {
        Some(c) => format!("'{}'", c as char),
        None => "end of input".to_string(),
    }
}

struct Parser<'a> {
    text: &'a str,
    pos: usize,
    is_3d: bool,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Parser {
            text,
            pos: 0,
            is_3d: false,
        }
    }

    fn error<T>(&self, what: impl AsRef<str>) -> Result<T> {
        ParseSnafu {
            description: format!("{} at position {}", what.as_ref(), self.pos),
        }
        .fail()
    }

    /// Skip whitespace and return the next byte without consuming it.
    fn peek(&mut self) -> Option<u8> {
        let bytes = self.text.as_bytes();
        while self.pos < bytes.len() && bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
        bytes.get(self.pos).copied()
    }

    fn expect(&mut self, expected: u8) -> Result<()> {
        match self.peek() {
            Some(c) if c == expected => {
                self.pos += 1;
                Ok(())
            }
            found => self.error(format!(
                "expected '{}' but found {}",
                expected as char,
                describe(found)
            )),
        }
    }

    fn expect_end(&mut self) -> Result<()> {
        match self.peek() {
            None => Ok(()),
            found => self.error(format!("unexpected trailing input {}", describe(found))),
        }
    }

    fn take_while(&mut self, accept: impl Fn(u8) -> bool) -> &'a str {
        let bytes = self.text.as_bytes();
        let start = self.pos;
        while self.pos < bytes.len() && accept(bytes[self.pos]) {
            self.pos += 1;
        }
        &self.text[start..self.pos]
    }

    fn word(&mut self) -> Result<String> {
        match self.peek() {
            Some(c) if c.is_ascii_alphabetic() => {
                Ok(self.take_while(|c| c.is_ascii_alphanumeric()).to_ascii_uppercase())
            }
            found => self.error(format!("expected a type word but found {}", describe(found))),
        }
    }

    /// Consume `keyword` if it is the next word.
    fn eat_keyword(&mut self, keyword: &str) -> bool {
        self.peek();
        let rest = &self.text.as_bytes()[self.pos..];
        let matches = rest.len() >= keyword.len()
            && rest[..keyword.len()].eq_ignore_ascii_case(keyword.as_bytes())
            && !rest
                .get(keyword.len())
                .is_some_and(|c| c.is_ascii_alphanumeric());
        if matches {
            self.pos += keyword.len();
        }
        matches
    }

    /// Number of comma separated items up to the bracket closing the
    /// current level.
    fn count_items(&self) -> usize {
        let mut depth = 0usize;
        let mut items = 1;
        for c in self.text.as_bytes()[self.pos..].iter() {
            match c {
                b'(' => depth += 1,
                b')' if depth == 0 => break,
                b')' => depth -= 1,
                b',' if depth == 0 => items += 1,
                _ => (),
            }
        }
        items
    }

    /// Parse `item (, item)* )`, consuming the closing bracket.
    fn parse_list<T>(&mut self, mut item: impl FnMut(&mut Self) -> Result<T>) -> Result<Vec<T>> {
        let mut items = Vec::with_capacity(self.count_items());
        loop {
            items.push(item(self)?);
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b')') => {
                    self.pos += 1;
                    return Ok(items);
                }
                found => {
                    return self.error(format!("expected ',' or ')' but found {}", describe(found)))
                }
            }
        }
    }

    fn number(&mut self) -> Result<f64> {
        let start = self.pos;
        let token = self.take_while(|c| !c.is_ascii_whitespace() && !b",()".contains(&c));
        token.parse::<f64>().ok().context(ParseSnafu {
            description: format!("could not parse number '{token}' at position {start}"),
        })
    }

    fn parse_point(&mut self) -> Result<Point> {
        self.peek();
        let start = self.pos;
        let mut values = [0.0; 3];
        let mut count = 0;
        loop {
            match self.peek() {
                Some(b',') | Some(b')') | None => break,
                Some(b'(') => return self.error("unexpected '(' inside a coordinate"),
                _ => (),
            }
            let value = self.number()?;
            if count < values.len() {
                values[count] = value;
            }
            count += 1;
        }
        match count {
            2 => Ok(Point::new(values[0], values[1])),
            3 => {
                self.is_3d = true;
                Ok(Point::new_3d(values[0], values[1], values[2]))
            }
            n => ParseSnafu {
                description: format!(
                    "coordinate at position {start} has {n} values, expected 2 or 3"
                ),
            }
            .fail(),
        }
    }

    fn parse_line(&mut self) -> Result<Vec<Point>> {
        self.expect(b'(')?;
        self.parse_list(Self::parse_point)
    }

    fn parse_ring(&mut self) -> Result<Vec<Point>> {
        self.peek();
        let start = self.pos;
        let ring = self.parse_line()?;
        if let Some(problem) = ring_problem(&ring) {
            return ParseSnafu {
                description: format!("ring at position {start} {problem}"),
            }
            .fail();
        }
        Ok(ring)
    }

    fn parse_polygon(&mut self) -> Result<Polygon> {
        self.expect(b'(')?;
        Ok(Polygon::new(self.parse_list(Self::parse_ring)?))
    }

    /// Accepts both `0 0` and `(0 0)`.
    fn parse_multi_point_member(&mut self) -> Result<SubObject> {
        if self.peek() == Some(b'(') {
            self.pos += 1;
            let p = self.parse_point()?;
            self.expect(b')')?;
            Ok(p.into())
        } else {
            Ok(self.parse_point()?.into())
        }
    }

    fn parse_type_word(&mut self) -> Result<GeometryType> {
        self.peek();
        let start = self.pos;
        let word = self.word()?;
        let geometry_type = match word.as_str() {
            "POINT" => GeometryType::Point,
            "LINESTRING" => GeometryType::LineString,
            "POLYGON" => GeometryType::Polygon,
            "MULTIPOINT" => GeometryType::MultiPoint,
            "MULTILINESTRING" => GeometryType::MultiLineString,
            "MULTIPOLYGON" => GeometryType::MultiPolygon,
            "GEOMETRYCOLLECTION" => GeometryType::GeometryCollection,
            "BOX3D" => GeometryType::BoxOnly,
            _ => {
                return ParseSnafu {
                    description: format!("unknown geometry type '{word}' at position {start}"),
                }
                .fail()
            }
        };
        Ok(geometry_type)
    }

    fn parse_geometry(&mut self, srid: i32) -> Result<Geometry> {
        if self.eat_keyword("BOX") {
            let start = self.pos;
            let b = self.parse_box()?;
            ensure!(
                !self.is_3d,
                ParseSnafu {
                    description: format!("BOX at position {start} takes 2D corners, use BOX3D for z")
                }
            );
            return Ok(Geometry::from_box_2d(srid, b.to_box2d()));
        }
        let geometry_type = self.parse_type_word()?;
        if geometry_type == GeometryType::BoxOnly {
            return Ok(Geometry::from_box(srid, self.parse_box()?));
        }
        let objects = self.parse_body(geometry_type)?;
        if objects.is_empty() {
            return Ok(Geometry::empty(srid, geometry_type.into()));
        }
        Geometry::new(srid, self.is_3d, geometry_type.into(), objects)
    }

    fn parse_box(&mut self) -> Result<Box3D> {
        self.expect(b'(')?;
        let low = self.parse_point()?;
        self.expect(b',')?;
        let high = self.parse_point()?;
        self.expect(b')')?;
        Ok(Box3D::new(low, high))
    }

    /// Everything after the type word. Returns no objects for `EMPTY`.
    fn parse_body(&mut self, geometry_type: GeometryType) -> Result<Vec<SubObject>> {
        if self.eat_keyword("EMPTY") {
            return Ok(Vec::new());
        }
        self.expect(b'(')?;
        if self.eat_keyword("EMPTY") {
            self.expect(b')')?;
            return Ok(Vec::new());
        }
        match geometry_type {
            GeometryType::Point => {
                let p = self.parse_point()?;
                self.expect(b')')?;
                Ok(vec![p.into()])
            }
            GeometryType::LineString => Ok(vec![SubObject::Line(self.parse_list(Self::parse_point)?)]),
            GeometryType::Polygon => Ok(vec![Polygon::new(self.parse_list(Self::parse_ring)?).into()]),
            GeometryType::MultiPoint => self.parse_list(Self::parse_multi_point_member),
            GeometryType::MultiLineString => {
                self.parse_list(|p| p.parse_line().map(SubObject::Line))
            }
            GeometryType::MultiPolygon => {
                self.parse_list(|p| p.parse_polygon().map(SubObject::from))
            }
            GeometryType::GeometryCollection => {
                let members = self.parse_list(|p| {
                    let member_type = p.parse_type_word()?;
                    match member_type {
                        GeometryType::GeometryCollection | GeometryType::BoxOnly => p.error(format!(
                            "{} cannot be a collection member",
                            member_type.name()
                        )),
                        t => p.parse_body(t),
                    }
                })?;
                Ok(members.into_iter().flatten().collect())
            }
            GeometryType::BoxOnly => self.error("BOX3D has no sub-objects"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(text: &str) {
        let g = from_text(text).unwrap();
        assert_eq!(text, to_text(&g), "printing {:?}", g);
        assert_eq!(g, from_text(&to_text(&g)).unwrap());
    }

    #[test]
    fn test_print_canonical_forms() {
        round_trip("POINT(1 2)");
        round_trip("POINT(1 2 3)");
        round_trip("SRID=4326;LINESTRING(0 0,1.5 2.25,-3 4)");
        round_trip("POLYGON((0 0,0 10,10 10,10 0,0 0),(2 2,3 2,3 3,2 2))");
        round_trip("MULTIPOINT(0 0,1 1)");
        round_trip("MULTILINESTRING((0 0,1 1),(2 2,3 3))");
        round_trip("MULTIPOLYGON(((0 0,0 1,1 1,0 0)),((5 5,5 6,6 6,5 5)))");
        round_trip("GEOMETRYCOLLECTION(POINT(1 2),LINESTRING(0 0,1 1))");
        round_trip("GEOMETRYCOLLECTION(EMPTY)");
        round_trip("MULTIPOINT(EMPTY)");
        round_trip("SRID=3857;BOX3D(0 1 2,3 4 5)");
    }

    #[test]
    fn test_parse_point_scenario() {
        let g = from_text("POINT(1 2)").unwrap();
        assert!(!g.is_3d());
        assert_eq!(UNKNOWN_SRID, g.srid());
        assert_eq!(&[SubObject::Point(Point::new(1.0, 2.0))], g.sub_objects());
    }

    #[test]
    fn test_multipoint_forms_are_equivalent() {
        let brief = from_text("MULTIPOINT(0 0, 1 1)").unwrap();
        let bracketed = from_text("MULTIPOINT((0 0),(1 1))").unwrap();
        assert_eq!(brief, bracketed);
        assert_eq!(2, brief.num_objects());
        assert_eq!("MULTIPOINT(0 0,1 1)", to_text(&bracketed));
    }

    #[test]
    fn test_whitespace_and_case() {
        let g = from_text("  srid=4;  linestring ( 0 0 ,  1  1 ) ").unwrap();
        assert_eq!(4, g.srid());
        assert_eq!(GeometryType::LineString, g.geometry_type());
        assert_eq!("SRID=4;LINESTRING(0 0,1 1)", to_text(&g));
    }

    #[test]
    fn test_any_three_value_tuple_makes_3d() {
        let g = from_text("LINESTRING(0 0,1 1 5)").unwrap();
        assert!(g.is_3d());
        assert_eq!("LINESTRING(0 0 0,1 1 5)", to_text(&g));
    }

    #[test]
    fn test_empty_forms() {
        for text in ["POINT EMPTY", "POINT(EMPTY)", "GEOMETRYCOLLECTION EMPTY"] {
            let g = from_text(text).unwrap();
            assert!(g.is_empty(), "{text}");
            assert_eq!("GEOMETRYCOLLECTION(EMPTY)", to_text(&g));
        }
        let g = from_text("GEOMETRYCOLLECTION(POINT EMPTY,POINT(1 1))").unwrap();
        assert_eq!(1, g.num_objects());
        let mp = from_text("MULTIPOINT EMPTY").unwrap();
        assert_eq!(GeometryType::MultiPoint, mp.geometry_type());
    }

    #[test]
    fn test_collection_flattens_multi_members() {
        let g = from_text("GEOMETRYCOLLECTION(MULTIPOINT(0 0,1 1),POLYGON((0 0,0 1,1 1,0 0)))")
            .unwrap();
        assert_eq!(GeometryType::GeometryCollection, g.geometry_type());
        assert_eq!(3, g.num_objects());
        assert_eq!(
            "GEOMETRYCOLLECTION(POINT(0 0),POINT(1 1),POLYGON((0 0,0 1,1 1,0 0)))",
            to_text(&g)
        );
    }

    #[test]
    fn test_precision_round_trip() {
        let values = [0.1 + 0.2, 1.0 / 3.0, 123456.789012345678, -1.0e-300, 6.02214076e23];
        for v in values {
            let g = Geometry::point(UNKNOWN_SRID, v, -v);
            let back = from_text(&to_text(&g)).unwrap();
            assert_eq!(g, back);
        }
    }

    #[test]
    fn test_box3d() {
        let g = from_text("BOX3D(3 4 5,0 1 2)").unwrap();
        assert_eq!(GeometryKind::BoxOnly, g.kind());
        assert!(g.is_3d());
        let b = g.bbox().unwrap();
        assert_eq!(Point::new_3d(0.0, 1.0, 2.0), b.low_corner);
        assert_eq!(Point::new_3d(3.0, 4.0, 5.0), b.high_corner);
    }

    #[test]
    fn test_flat_box() {
        round_trip("SRID=3857;BOX(0 1,3 4)");
        let g = from_text("box(3 4,0 1)").unwrap();
        assert_eq!(GeometryKind::BoxOnly, g.kind());
        assert!(!g.is_3d());
        assert_eq!(Some(Box2D::new(0.0, 1.0, 3.0, 4.0)), g.bounding_box());

        let flattened = from_text("BOX3D(0 1 2,3 4 5)").unwrap().force_2d();
        assert_eq!("BOX(0 1,3 4)", to_text(&flattened));
        let back = from_text(&to_text(&flattened)).unwrap();
        assert!(!back.is_3d());
        assert_eq!(flattened, back);

        assert!(parse_error("BOX(0 1 2,3 4 5)").contains("use BOX3D"));
    }

    fn parse_error(text: &str) -> String {
        match from_text(text) {
            Err(GeoError::Parse { description, .. }) => description,
            other => panic!("expected a parse error for {text:?}, got {other:?}"),
        }
    }

    #[test]
    fn test_bracket_errors() {
        assert!(parse_error("LINESTRING(0 0,1 1").contains("never closed"));
        assert!(parse_error("LINESTRING(0 0,1 1))").contains("unmatched ')'"));
        assert!(parse_error("POLYGON(0 0,0 1,1 1,0 0)").contains("expected '('"));
        assert!(parse_error("POINT(1 2").contains("position 5"));
    }

    #[test]
    fn test_coordinate_errors() {
        assert!(parse_error("POINT(1)").contains("has 1 values"));
        assert!(parse_error("POINT(1 2 3 4)").contains("has 4 values"));
        assert!(parse_error("LINESTRING()").contains("has 0 values"));
        assert!(parse_error("POINT(1 x)").contains("'x'"));
    }

    #[test]
    fn test_ring_errors() {
        assert!(parse_error("POLYGON((0 0,0 1,0 0))").contains("at least 4"));
        assert!(parse_error("POLYGON((0 0,0 1,1 1,1 0))").contains("not closed"));
        // closure uses the fuzzy comparison
        assert!(from_text("POLYGON((0 0,0 1,1 1,0.0000000001 0))").is_ok());
    }

    #[test]
    fn test_structure_errors() {
        assert!(parse_error("TRIANGLE((0 0,0 1,1 1,0 0))").contains("unknown geometry type"));
        assert!(parse_error("GEOMETRYCOLLECTION(GEOMETRYCOLLECTION(POINT(0 0)))")
            .contains("cannot be a collection member"));
        assert!(parse_error("POINT(1 2) POINT(3 4)").contains("trailing"));
        assert!(parse_error("SRID=4326POINT(1 2)").contains("';'"));
        assert!(parse_error("").contains("end of input"));
    }
}
