use super::*;
use crate::errors::*;
use itertools::Itertools;
use snafu::prelude::*;
use std::fmt;

/// The three kinds of sub-objects a [`Geometry`] can hold.
///
/// The discriminants are the type codes used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SubObjectKind {
    Point = 1,
    Line = 2,
    Polygon = 3,
}

impl SubObjectKind {
    /// Topological dimension: 0 for points, 1 for lines, 2 for polygons.
    pub fn dimension(self) -> i32 {
        match self {
            SubObjectKind::Point => 0,
            SubObjectKind::Line => 1,
            SubObjectKind::Polygon => 2,
        }
    }
}

/// One or more closed rings. Ring 0 is the outer boundary, all others are holes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Polygon {
    pub rings: Vec<Vec<Point>>,
}

impl Polygon {
    pub fn new(rings: Vec<Vec<Point>>) -> Self {
        Polygon { rings }
    }

    pub fn outer_ring(&self) -> Option<&[Point]> {
        self.rings.first().map(|r| r.as_slice())
    }

    pub fn holes(&self) -> &[Vec<Point>] {
        if self.rings.is_empty() {
            &[]
        } else {
            &self.rings[1..]
        }
    }

    pub fn num_points(&self) -> usize {
        self.rings.iter().map(|r| r.len()).sum()
    }

    /// Planar area of the outer ring minus the area of every hole.
    pub fn area_2d(&self) -> f64 {
        self.rings
            .iter()
            .enumerate()
            .map(|(index, ring)| {
                let ring_area = (ring
                    .iter()
                    .tuple_windows()
                    .map(|(a, b)| a.x * b.y - a.y * b.x)
                    .sum::<f64>()
                    / 2.0)
                    .abs();
                if index == 0 {
                    ring_area
                } else {
                    -ring_area
                }
            })
            .sum()
    }
}

/// A single component of a geometry container.
#[derive(Debug, Clone, PartialEq)]
pub enum SubObject {
    Point(Point),
    Line(Vec<Point>),
    Polygon(Polygon),
}

impl SubObject {
    pub fn kind(&self) -> SubObjectKind {
        match self {
            SubObject::Point(_) => SubObjectKind::Point,
            SubObject::Line(_) => SubObjectKind::Line,
            SubObject::Polygon(_) => SubObjectKind::Polygon,
        }
    }

    /// All coordinates of this object, in storage order.
    pub fn points(&self) -> Box<dyn Iterator<Item = &Point> + '_> {
        match self {
            SubObject::Point(p) => Box::new(std::iter::once(p)),
            SubObject::Line(points) => Box::new(points.iter()),
            SubObject::Polygon(poly) => Box::new(poly.rings.iter().flatten()),
        }
    }

    fn points_mut(&mut self) -> Box<dyn Iterator<Item = &mut Point> + '_> {
        match self {
            SubObject::Point(p) => Box::new(std::iter::once(p)),
            SubObject::Line(points) => Box::new(points.iter_mut()),
            SubObject::Polygon(poly) => Box::new(poly.rings.iter_mut().flatten()),
        }
    }

    pub fn num_points(&self) -> usize {
        match self {
            SubObject::Point(_) => 1,
            SubObject::Line(points) => points.len(),
            SubObject::Polygon(poly) => poly.num_points(),
        }
    }

    pub fn bbox(&self) -> Option<Box3D> {
        Box3D::from_points(self.points())
    }

    fn validate(&self) -> Result<()> {
        match self {
            SubObject::Point(_) => Ok(()),
            SubObject::Line(points) => {
                ensure!(
                    !points.is_empty(),
                    DegenerateGeometrySnafu {
                        description: "a line needs at least one point"
                    }
                );
                Ok(())
            }
            SubObject::Polygon(poly) => {
                ensure!(
                    !poly.rings.is_empty(),
                    DegenerateGeometrySnafu {
                        description: "a polygon needs at least one ring"
                    }
                );
                for (index, ring) in poly.rings.iter().enumerate() {
                    ensure!(
                        !ring.is_empty(),
                        DegenerateGeometrySnafu {
                            description: format!("ring {index} of a polygon has no points")
                        }
                    );
                }
                Ok(())
            }
        }
    }
}

impl From<Point> for SubObject {
    fn from(p: Point) -> Self {
        SubObject::Point(p)
    }
}

impl From<Polygon> for SubObject {
    fn from(p: Polygon) -> Self {
        SubObject::Polygon(p)
    }
}

/// Container-level classification of a geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum GeometryKind {
    /// Exactly one sub-object of the given kind.
    Single(SubObjectKind),
    /// Any number of sub-objects, all of the given kind.
    Multi(SubObjectKind),
    /// Any number of sub-objects of any kind.
    Collection,
    /// No sub-objects, just a bounding volume.
    BoxOnly,
}

impl GeometryKind {
    /// The simplest classification that holds this one plus an object of
    /// kind `added`.
    pub fn promoted(self, added: SubObjectKind) -> GeometryKind {
        match self {
            GeometryKind::Single(k) | GeometryKind::Multi(k) if k == added => GeometryKind::Multi(k),
            GeometryKind::Single(_) | GeometryKind::Multi(_) => GeometryKind::Collection,
            GeometryKind::Collection => GeometryKind::Collection,
            GeometryKind::BoxOnly => GeometryKind::Single(added),
        }
    }
}

/// The numeric type codes of the container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum GeometryType {
    Point = 1,
    LineString = 2,
    Polygon = 3,
    MultiPoint = 4,
    MultiLineString = 5,
    MultiPolygon = 6,
    GeometryCollection = 7,
    BoxOnly = 99,
}

impl GeometryType {
    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(GeometryType::Point),
            2 => Some(GeometryType::LineString),
            3 => Some(GeometryType::Polygon),
            4 => Some(GeometryType::MultiPoint),
            5 => Some(GeometryType::MultiLineString),
            6 => Some(GeometryType::MultiPolygon),
            7 => Some(GeometryType::GeometryCollection),
            99 => Some(GeometryType::BoxOnly),
            _ => None,
        }
    }

    /// The upper-case type word used in the text format.
    pub fn name(self) -> &'static str {
        match self {
            GeometryType::Point => "POINT",
            GeometryType::LineString => "LINESTRING",
            GeometryType::Polygon => "POLYGON",
            GeometryType::MultiPoint => "MULTIPOINT",
            GeometryType::MultiLineString => "MULTILINESTRING",
            GeometryType::MultiPolygon => "MULTIPOLYGON",
            GeometryType::GeometryCollection => "GEOMETRYCOLLECTION",
            GeometryType::BoxOnly => "BOX3D",
        }
    }
}

impl From<GeometryKind> for GeometryType {
    fn from(kind: GeometryKind) -> Self {
        match kind {
            GeometryKind::Single(SubObjectKind::Point) => GeometryType::Point,
            GeometryKind::Single(SubObjectKind::Line) => GeometryType::LineString,
            GeometryKind::Single(SubObjectKind::Polygon) => GeometryType::Polygon,
            GeometryKind::Multi(SubObjectKind::Point) => GeometryType::MultiPoint,
            GeometryKind::Multi(SubObjectKind::Line) => GeometryType::MultiLineString,
            GeometryKind::Multi(SubObjectKind::Polygon) => GeometryType::MultiPolygon,
            GeometryKind::Collection => GeometryType::GeometryCollection,
            GeometryKind::BoxOnly => GeometryType::BoxOnly,
        }
    }
}

impl From<GeometryType> for GeometryKind {
    fn from(t: GeometryType) -> Self {
        match t {
            GeometryType::Point => GeometryKind::Single(SubObjectKind::Point),
            GeometryType::LineString => GeometryKind::Single(SubObjectKind::Line),
            GeometryType::Polygon => GeometryKind::Single(SubObjectKind::Polygon),
            GeometryType::MultiPoint => GeometryKind::Multi(SubObjectKind::Point),
            GeometryType::MultiLineString => GeometryKind::Multi(SubObjectKind::Line),
            GeometryType::MultiPolygon => GeometryKind::Multi(SubObjectKind::Polygon),
            GeometryType::GeometryCollection => GeometryKind::Collection,
            GeometryType::BoxOnly => GeometryKind::BoxOnly,
        }
    }
}

/// A geometry value: an ordered set of sub-objects plus the metadata
/// every operation needs (classification, dimensionality, SRID and the
/// cached bounding volume).
///
/// Geometries are immutable; every transform produces a new value with a
/// freshly computed bounding volume.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    srid: i32,
    is_3d: bool,
    kind: GeometryKind,
    objects: Vec<SubObject>,
    bbox: Option<Box3D>,
}

impl Geometry {
    /// Create a geometry with an explicit classification.
    ///
    /// Fails if `kind` does not describe `objects`, or if any object is
    /// structurally empty. For 2D geometries all z values are reset to 0.
    pub fn new(
        srid: i32,
        is_3d: bool,
        kind: GeometryKind,
        mut objects: Vec<SubObject>,
    ) -> Result<Self> {
        for object in objects.iter() {
            object.validate()?;
        }
        match kind {
            GeometryKind::Single(sub_kind) => {
                ensure!(
                    objects.len() == 1 && objects[0].kind() == sub_kind,
                    DegenerateGeometrySnafu {
                        description: format!(
                            "a single {sub_kind:?} needs exactly one {sub_kind:?} object, got {}",
                            objects.iter().map(|o| format!("{:?}", o.kind())).join(",")
                        )
                    }
                );
            }
            GeometryKind::Multi(sub_kind) => {
                ensure!(
                    objects.iter().all(|o| o.kind() == sub_kind),
                    DegenerateGeometrySnafu {
                        description: format!("a multi {sub_kind:?} may only hold {sub_kind:?} objects")
                    }
                );
            }
            GeometryKind::Collection => (),
            GeometryKind::BoxOnly => {
                ensure!(
                    objects.is_empty(),
                    DegenerateGeometrySnafu {
                        description: "a box-only geometry has no sub-objects"
                    }
                );
            }
        }
        if !is_3d {
            for object in objects.iter_mut() {
                object.points_mut().for_each(|p| p.z = 0.0);
            }
        }
        Ok(Geometry::assemble(srid, is_3d, kind, objects))
    }

    /// Create a geometry, deriving its classification from the sub-objects.
    pub fn from_sub_objects(srid: i32, is_3d: bool, objects: Vec<SubObject>) -> Result<Self> {
        let kind = Geometry::derive_kind(&objects);
        Geometry::new(srid, is_3d, kind, objects)
    }

    /// A single 2D point.
    pub fn point(srid: i32, x: f64, y: f64) -> Self {
        Geometry::assemble(
            srid,
            false,
            GeometryKind::Single(SubObjectKind::Point),
            vec![SubObject::Point(Point::new(x, y))],
        )
    }

    /// The zero-sub-object sentinel of the given classification.
    pub fn empty(srid: i32, kind: GeometryKind) -> Self {
        let kind = match kind {
            GeometryKind::Single(_) | GeometryKind::BoxOnly => GeometryKind::Collection,
            k => k,
        };
        Geometry::assemble(srid, false, kind, Vec::new())
    }

    /// A geometry that is nothing but a bounding volume.
    pub fn from_box(srid: i32, bbox: Box3D) -> Self {
        Geometry {
            srid,
            is_3d: true,
            kind: GeometryKind::BoxOnly,
            objects: Vec::new(),
            bbox: Some(bbox),
        }
    }

    /// A box-only geometry without a z axis.
    pub fn from_box_2d(srid: i32, bbox: Box2D) -> Self {
        Geometry {
            is_3d: false,
            ..Geometry::from_box(srid, Box3D::from(bbox))
        }
    }

    fn assemble(srid: i32, is_3d: bool, kind: GeometryKind, objects: Vec<SubObject>) -> Self {
        let mut g = Geometry {
            srid,
            is_3d,
            kind,
            objects,
            bbox: None,
        };
        g.bbox = g.compute_bbox();
        g
    }

    fn derive_kind(objects: &[SubObject]) -> GeometryKind {
        match objects.iter().map(|o| o.kind()).all_equal_value() {
            Ok(k) if objects.len() == 1 => GeometryKind::Single(k),
            Ok(k) => GeometryKind::Multi(k),
            Err(None) => GeometryKind::Collection,
            Err(Some(_)) => GeometryKind::Collection,
        }
    }

    fn compute_bbox(&self) -> Option<Box3D> {
        if self.kind == GeometryKind::BoxOnly {
            return self.bbox;
        }
        self.objects
            .iter()
            .map(|o| o.bbox())
            .fold(None, Box3D::union_opt)
    }

    pub fn srid(&self) -> i32 {
        self.srid
    }

    pub fn is_3d(&self) -> bool {
        self.is_3d
    }

    /// Number of coordinate axes: 3 for 3D geometries, 2 otherwise.
    pub fn ndims(&self) -> usize {
        if self.is_3d {
            3
        } else {
            2
        }
    }

    pub fn kind(&self) -> GeometryKind {
        self.kind
    }

    pub fn geometry_type(&self) -> GeometryType {
        self.kind.into()
    }

    pub fn sub_objects(&self) -> &[SubObject] {
        &self.objects
    }

    pub fn num_objects(&self) -> usize {
        self.objects.len()
    }

    /// The cached bounding volume.
    pub fn bbox(&self) -> Option<&Box3D> {
        self.bbox.as_ref()
    }

    /// `true` for the zero-sub-object sentinel.
    ///
    /// Box-only geometries are not empty.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.kind != GeometryKind::BoxOnly
    }

    pub fn with_srid(&self, srid: i32) -> Geometry {
        let mut g = self.clone();
        g.srid = srid;
        g
    }

    /// Move every coordinate by the given offsets.
    pub fn translate(&self, dx: f64, dy: f64, dz: f64) -> Geometry {
        let dz = if self.is_3d { dz } else { 0.0 };
        if self.kind == GeometryKind::BoxOnly {
            let bbox = self.bbox.map(|b| Box3D {
                low_corner: b.low_corner.translated(dx, dy, dz),
                high_corner: b.high_corner.translated(dx, dy, dz),
            });
            return Geometry { bbox, ..self.clone() };
        }
        let mut objects = self.objects.clone();
        for object in objects.iter_mut() {
            object
                .points_mut()
                .for_each(|p| *p = p.translated(dx, dy, dz));
        }
        Geometry::assemble(self.srid, self.is_3d, self.kind, objects)
    }

    /// Drop the z axis.
    pub fn force_2d(&self) -> Geometry {
        if self.kind == GeometryKind::BoxOnly {
            let bbox = self.bbox.map(|b| Box3D::from(b.to_box2d()));
            return Geometry {
                is_3d: false,
                bbox,
                ..self.clone()
            };
        }
        let mut objects = self.objects.clone();
        for object in objects.iter_mut() {
            object.points_mut().for_each(|p| p.z = 0.0);
        }
        Geometry::assemble(self.srid, false, self.kind, objects)
    }

    /// Mark the geometry as 3D. Coordinates keep their (possibly zero) z.
    pub fn force_3d(&self) -> Geometry {
        Geometry {
            is_3d: true,
            ..self.clone()
        }
    }

    /// Reclassify as a heterogeneous collection.
    pub fn force_collection(&self) -> Geometry {
        if self.kind == GeometryKind::BoxOnly {
            return self.clone();
        }
        Geometry::assemble(
            self.srid,
            self.is_3d,
            GeometryKind::Collection,
            self.objects.clone(),
        )
    }

    /// Append a sub-object, promoting the classification to the simplest
    /// one that can hold the result.
    pub fn add_sub_object(&self, object: SubObject) -> Result<Geometry> {
        object.validate()?;
        let kind = self.kind.promoted(object.kind());
        let mut objects = self.objects.clone();
        objects.push(object);
        Geometry::new(self.srid, self.is_3d, kind, objects)
    }

    /// Combine the sub-objects of two geometries into one.
    ///
    /// An empty operand yields the other one unchanged. The result is 3D
    /// if either operand is, and keeps the z values of the 3D operand.
    pub fn collect(&self, other: &Geometry) -> Result<Geometry> {
        check_srid(self.srid, other.srid)?;
        if self.is_empty() {
            return Ok(other.clone());
        }
        if other.is_empty() {
            return Ok(self.clone());
        }
        let kind = other
            .objects
            .iter()
            .fold(self.kind, |kind, object| kind.promoted(object.kind()));
        let objects = self
            .objects
            .iter()
            .chain(other.objects.iter())
            .cloned()
            .collect();
        Geometry::new(self.srid, self.is_3d || other.is_3d, kind, objects)
    }

    pub fn num_points(&self) -> usize {
        self.objects.iter().map(|o| o.num_points()).sum()
    }

    /// Total number of rings over all polygons.
    pub fn num_rings(&self) -> usize {
        self.polygons().map(|p| p.rings.len()).sum()
    }

    /// Sum of the planar lengths of all lines.
    pub fn length_2d(&self) -> f64 {
        self.lines().map(|l| distance::path_length_2d(l)).sum()
    }

    /// Sum of the 3D lengths of all lines.
    pub fn length_3d(&self) -> f64 {
        self.lines().map(|l| distance::path_length_3d(l)).sum()
    }

    /// Sum of the planar areas of all polygons.
    pub fn area_2d(&self) -> f64 {
        self.polygons().map(|p| p.area_2d()).sum()
    }

    /// Sum of the planar lengths of all polygon rings.
    pub fn perimeter_2d(&self) -> f64 {
        self.polygons()
            .flat_map(|p| p.rings.iter())
            .map(|r| distance::path_length_2d(r))
            .sum()
    }

    pub fn perimeter_3d(&self) -> f64 {
        self.polygons()
            .flat_map(|p| p.rings.iter())
            .map(|r| distance::path_length_3d(r))
            .sum()
    }

    /// Topological dimension, `-1` for geometries without sub-objects.
    pub fn dimension(&self) -> i32 {
        self.objects
            .iter()
            .map(|o| o.kind().dimension())
            .max()
            .unwrap_or(-1)
    }

    pub fn geometry_type_name(&self) -> &'static str {
        self.geometry_type().name()
    }

    /// The bounding volume as a 2D polygon (corners in clockwise order).
    pub fn envelope(&self) -> Option<Geometry> {
        let b = self.bbox?;
        let (lo, hi) = (b.low_corner, b.high_corner);
        let ring = vec![
            Point::new(lo.x, lo.y),
            Point::new(lo.x, hi.y),
            Point::new(hi.x, hi.y),
            Point::new(hi.x, lo.y),
            Point::new(lo.x, lo.y),
        ];
        Some(Geometry::assemble(
            self.srid,
            false,
            GeometryKind::Single(SubObjectKind::Polygon),
            vec![SubObject::Polygon(Polygon::new(vec![ring]))],
        ))
    }

    /// Human readable description of the sub-objects, one line each plus
    /// one line per polygon ring.
    pub fn summary(&self) -> String {
        self.objects
            .iter()
            .enumerate()
            .map(|(index, object)| match object {
                SubObject::Point(_) => format!("Object {index} is a POINT()\n"),
                SubObject::Line(points) => {
                    format!("Object {index} is a LINESTRING() with {} points\n", points.len())
                }
                SubObject::Polygon(poly) => {
                    let mut text = format!(
                        "Object {index} is a POLYGON() with {} rings\n",
                        poly.rings.len()
                    );
                    for (ring_index, ring) in poly.rings.iter().enumerate() {
                        text.push_str(&format!(
                            "     + ring {ring_index} has {} points\n",
                            ring.len()
                        ));
                    }
                    text
                }
            })
            .collect()
    }

    pub fn points(&self) -> impl Iterator<Item = &Point> {
        self.objects.iter().flat_map(|o| o.points())
    }

    pub fn lines(&self) -> impl Iterator<Item = &[Point]> {
        self.objects.iter().filter_map(|o| match o {
            SubObject::Line(points) => Some(points.as_slice()),
            _ => None,
        })
    }

    pub fn polygons(&self) -> impl Iterator<Item = &Polygon> {
        self.objects.iter().filter_map(|o| match o {
            SubObject::Polygon(poly) => Some(poly),
            _ => None,
        })
    }
}

impl Bounding for Geometry {
    fn bounding_box(&self) -> Option<Box2D> {
        self.bbox.map(|b| b.to_box2d())
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::codec::text::to_text(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x: f64, y: f64, size: f64) -> Vec<Point> {
        vec![
            Point::new(x, y),
            Point::new(x, y + size),
            Point::new(x + size, y + size),
            Point::new(x + size, y),
            Point::new(x, y),
        ]
    }

    #[test]
    fn test_kind_derivation() {
        let single = Geometry::from_sub_objects(-1, false, vec![Point::new(1.0, 2.0).into()])
            .unwrap();
        assert_eq!(GeometryType::Point, single.geometry_type());
        let multi = Geometry::from_sub_objects(
            -1,
            false,
            vec![Point::new(1.0, 2.0).into(), Point::new(3.0, 4.0).into()],
        )
        .unwrap();
        assert_eq!(GeometryType::MultiPoint, multi.geometry_type());
        let mixed = Geometry::from_sub_objects(
            -1,
            false,
            vec![
                Point::new(1.0, 2.0).into(),
                SubObject::Line(vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)]),
            ],
        )
        .unwrap();
        assert_eq!(GeometryType::GeometryCollection, mixed.geometry_type());
        let nothing = Geometry::from_sub_objects(-1, false, vec![]).unwrap();
        assert!(nothing.is_empty());
        assert_eq!(None, nothing.bbox());
        assert_eq!(-1, nothing.dimension());
    }

    #[test]
    fn test_kind_must_match_objects() {
        let res = Geometry::new(
            4326,
            false,
            GeometryKind::Single(SubObjectKind::Line),
            vec![Point::new(1.0, 2.0).into()],
        );
        assert!(matches!(res, Err(GeoError::DegenerateGeometry { .. })));
        let res = Geometry::new(
            4326,
            false,
            GeometryKind::Multi(SubObjectKind::Polygon),
            vec![SubObject::Polygon(Polygon::default())],
        );
        assert!(res.is_err());
        let res = Geometry::new(4326, false, GeometryKind::Collection, vec![SubObject::Line(vec![])]);
        assert!(res.is_err());
    }

    #[test]
    fn test_bbox_is_union_of_sub_objects() {
        let g = Geometry::from_sub_objects(
            -1,
            true,
            vec![
                Point::new_3d(1.0, 2.0, 3.0).into(),
                SubObject::Line(vec![Point::new_3d(-1.0, 0.0, 0.0), Point::new_3d(4.0, 5.0, -6.0)]),
            ],
        )
        .unwrap();
        let b = g.bbox().unwrap();
        assert_eq!(Point::new_3d(-1.0, 0.0, -6.0), b.low_corner);
        assert_eq!(Point::new_3d(4.0, 5.0, 3.0), b.high_corner);
        // 2D geometries drop any z that was handed in
        let flat = Geometry::from_sub_objects(-1, false, vec![Point::new_3d(1.0, 2.0, 3.0).into()])
            .unwrap();
        assert_eq!(0.0, flat.bbox().unwrap().high_corner.z);
    }

    #[test]
    fn test_transforms_recompute_bbox() {
        let g = Geometry::from_sub_objects(
            7,
            true,
            vec![SubObject::Line(vec![Point::new_3d(0.0, 0.0, 1.0), Point::new_3d(1.0, 1.0, 2.0)])],
        )
        .unwrap();
        let moved = g.translate(10.0, 20.0, 30.0);
        assert_eq!(Point::new_3d(10.0, 20.0, 31.0), moved.bbox().unwrap().low_corner);
        assert_eq!(7, moved.srid());
        // original is untouched
        assert_eq!(Point::new_3d(0.0, 0.0, 1.0), g.bbox().unwrap().low_corner);

        let flat = g.force_2d();
        assert!(!flat.is_3d());
        assert_eq!(0.0, flat.bbox().unwrap().high_corner.z);
        assert!(flat.force_3d().is_3d());

        let coll = g.force_collection();
        assert_eq!(GeometryType::GeometryCollection, coll.geometry_type());
        assert_eq!(g.bbox(), coll.bbox());
    }

    #[test]
    fn test_add_sub_object_promotion() {
        let p = Geometry::point(-1, 0.0, 0.0);
        let mp = p.add_sub_object(Point::new(5.0, 5.0).into()).unwrap();
        assert_eq!(GeometryType::MultiPoint, mp.geometry_type());
        assert_eq!(Box2D::new(0.0, 0.0, 5.0, 5.0), mp.bounding_box().unwrap());
        let coll = mp
            .add_sub_object(SubObject::Line(vec![Point::new(0.0, 0.0), Point::new(-1.0, 9.0)]))
            .unwrap();
        assert_eq!(GeometryType::GeometryCollection, coll.geometry_type());
        assert_eq!(Box2D::new(-1.0, 0.0, 5.0, 9.0), coll.bounding_box().unwrap());
        let still_coll = coll.add_sub_object(Point::new(1.0, 1.0).into()).unwrap();
        assert_eq!(GeometryType::GeometryCollection, still_coll.geometry_type());
        assert_eq!(4, still_coll.num_objects());

        let line = GeometryKind::Single(SubObjectKind::Line);
        assert_eq!(GeometryKind::Multi(SubObjectKind::Line), line.promoted(SubObjectKind::Line));
        assert_eq!(GeometryKind::Collection, line.promoted(SubObjectKind::Polygon));
        assert_eq!(line, GeometryKind::BoxOnly.promoted(SubObjectKind::Line));
    }

    #[test]
    fn test_collect() {
        let a = Geometry::point(4326, 0.0, 0.0);
        let b = Geometry::point(4326, 1.0, 1.0);
        let ab = a.collect(&b).unwrap();
        assert_eq!(GeometryType::MultiPoint, ab.geometry_type());
        let empty = Geometry::empty(4326, GeometryKind::Collection);
        assert_eq!(a, empty.collect(&a).unwrap());
        assert_eq!(a, a.collect(&empty).unwrap());
        let other_srid = Geometry::point(3857, 1.0, 1.0);
        assert!(matches!(a.collect(&other_srid), Err(GeoError::SridMismatch { .. })));
    }

    #[test]
    fn test_collect_keeps_z_of_either_side() {
        let flat = Geometry::point(4326, 0.0, 0.0);
        let high = Geometry::from_sub_objects(4326, true, vec![Point::new_3d(1.0, 1.0, 5.0).into()])
            .unwrap();
        for collected in [flat.collect(&high).unwrap(), high.collect(&flat).unwrap()] {
            assert_eq!(GeometryType::MultiPoint, collected.geometry_type());
            assert!(collected.is_3d());
            assert_eq!(5.0, collected.bbox().unwrap().high_corner.z);
            assert_eq!(0.0, collected.bbox().unwrap().low_corner.z);
            assert!(collected.points().any(|p| p.z == 5.0));
        }
        let line = Geometry::from_sub_objects(
            4326,
            true,
            vec![SubObject::Line(vec![Point::new_3d(0.0, 0.0, 1.0), Point::new_3d(1.0, 1.0, 2.0)])],
        )
        .unwrap();
        let mixed = flat.collect(&line).unwrap();
        assert_eq!(GeometryType::GeometryCollection, mixed.geometry_type());
        assert_eq!(Point::new_3d(1.0, 1.0, 2.0), mixed.bbox().unwrap().high_corner);
    }

    #[test]
    fn test_measures() {
        let mut outer = square(0.0, 0.0, 10.0);
        outer.reverse();
        let poly = Polygon::new(vec![outer, square(2.0, 2.0, 2.0)]);
        let g = Geometry::from_sub_objects(
            -1,
            false,
            vec![
                SubObject::Polygon(poly),
                SubObject::Line(vec![Point::new(0.0, 0.0), Point::new(3.0, 4.0)]),
                Point::new(1.0, 1.0).into(),
            ],
        )
        .unwrap();
        assert_eq!(96.0, g.area_2d());
        assert_eq!(48.0, g.perimeter_2d());
        assert_eq!(5.0, g.length_2d());
        assert_eq!(5.0, g.length_3d());
        assert_eq!(13, g.num_points());
        assert_eq!(2, g.num_rings());
        assert_eq!(2, g.dimension());
        assert_eq!("GEOMETRYCOLLECTION", g.geometry_type_name());
        let summary = g.summary();
        assert!(summary.contains("Object 0 is a POLYGON() with 2 rings"));
        assert!(summary.contains("     + ring 1 has 5 points"));
        assert!(summary.contains("Object 1 is a LINESTRING() with 2 points"));
        assert!(summary.contains("Object 2 is a POINT()"));
    }

    #[test]
    fn test_summary_text() {
        let g = Geometry::from_sub_objects(
            -1,
            false,
            vec![
                SubObject::Polygon(Polygon::new(vec![square(0.0, 0.0, 1.0)])),
                Point::new(1.0, 1.0).into(),
            ],
        )
        .unwrap();
        assert_eq!(
            "Object 0 is a POLYGON() with 1 rings\n     + ring 0 has 5 points\nObject 1 is a POINT()\n",
            g.summary()
        );
        assert_eq!("", Geometry::empty(-1, GeometryKind::Collection).summary());
    }

    #[test]
    fn test_envelope_and_box_only() {
        let g = Geometry::from_sub_objects(
            5,
            false,
            vec![SubObject::Line(vec![Point::new(1.0, 2.0), Point::new(3.0, 7.0)])],
        )
        .unwrap();
        let env = g.envelope().unwrap();
        assert_eq!(GeometryType::Polygon, env.geometry_type());
        assert_eq!(10.0, env.area_2d());
        assert_eq!(5, env.srid());

        let boxed = Geometry::from_box(5, *g.bbox().unwrap());
        assert!(!boxed.is_empty());
        assert_eq!(0, boxed.num_objects());
        assert_eq!(g.bbox(), boxed.bbox());
        let moved = boxed.translate(1.0, 1.0, 0.0);
        assert_eq!(Box2D::new(2.0, 3.0, 4.0, 8.0), moved.bounding_box().unwrap());

        let flat = Geometry::from_box_2d(5, Box2D::new(0.0, 1.0, 3.0, 4.0));
        assert!(!flat.is_3d());
        assert_eq!(GeometryKind::BoxOnly, flat.kind());
        assert_eq!(Some(Box2D::new(0.0, 1.0, 3.0, 4.0)), flat.bounding_box());
        let forced = Geometry::from_box(5, Box3D::from(Box2D::new(0.0, 1.0, 3.0, 4.0))).force_2d();
        assert_eq!(flat, forced);
    }
}
