use crate::error::GeometryError;
use crate::gml::GmlNode;

/// Coordinate dimensionality of a ring, fixed at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Xy,
    Xyz,
}

impl Dimension {
    /// Default when neither the ring nor any enclosing element declares one.
    pub const DEFAULT: Dimension = Dimension::Xyz;

    /// Map an `srsDimension` value to a dimension, if supported.
    #[inline]
    pub fn from_srs_dimension(value: u8) -> Option<Self> {
        match value {
            2 => Some(Self::Xy),
            3 => Some(Self::Xyz),
            _ => None,
        }
    }

    /// Number of ordinates per point.
    #[inline]
    pub fn size(self) -> usize {
        match self {
            Self::Xy => 2,
            Self::Xyz => 3,
        }
    }
}

/// A 2D or 3D position. `z` is `None` exactly when the owning ring is 2D.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: Option<f64>,
}

impl Point {
    #[inline] pub fn xy(x: f64, y: f64) -> Self { Self { x, y, z: None } }
    #[inline] pub fn xyz(x: f64, y: f64, z: f64) -> Self { Self { x, y, z: Some(z) } }

    /// Exchange the first two ordinates, leaving Z untouched.
    #[inline]
    pub fn swapped(self) -> Self {
        Self { x: self.y, y: self.x, z: self.z }
    }

    /// Drop the Z ordinate.
    #[inline]
    pub fn to_coord(self) -> geo::Coord<f64> {
        geo::Coord { x: self.x, y: self.y }
    }
}

/// A closed sequence of at least four points (first == last).
#[derive(Debug, Clone, PartialEq)]
pub struct Ring {
    points: Vec<Point>,
    dim: Dimension,
}

impl Ring {
    /// Close `points` if necessary and validate the result.
    ///
    /// Ring direction is preserved as given. Returns a reason string when the
    /// closed ring has fewer than four points or fewer than three distinct ones.
    pub fn new(mut points: Vec<Point>, dim: Dimension) -> Result<Self, String> {
        if let (Some(&first), Some(&last)) = (points.first(), points.last()) {
            if first != last {
                points.push(first);
            }
        }
        if points.len() < 4 {
            return Err(format!("{} points after closing, need at least 4", points.len()));
        }
        let distinct = count_distinct(&points[..points.len() - 1]);
        if distinct < 3 {
            return Err(format!("only {distinct} distinct points"));
        }
        Ok(Self { points, dim })
    }

    #[inline] pub fn points(&self) -> &[Point] { &self.points }
    #[inline] pub fn dim(&self) -> Dimension { self.dim }
    #[inline] pub fn len(&self) -> usize { self.points.len() }
    #[inline] pub fn is_empty(&self) -> bool { self.points.is_empty() }

    /// Project onto the XY plane.
    pub fn to_line_string(&self) -> geo::LineString<f64> {
        geo::LineString(self.points.iter().map(|p| p.to_coord()).collect())
    }
}

/// Number of distinct points, compared component-wise.
fn count_distinct(points: &[Point]) -> usize {
    let mut seen: Vec<Point> = Vec::with_capacity(points.len());
    for p in points {
        if !seen.contains(p) {
            seen.push(*p);
        }
    }
    seen.len()
}

/// Parse one `LinearRing` element.
///
/// Dimensionality resolves as: the ring's own `srsDimension`, then the one on
/// its coordinate list, then `inherited`, then 3D. With `swap_axes` the first
/// two ordinates of every point are exchanged.
pub fn parse_ring<N: GmlNode>(ring: N, inherited: Option<u8>, swap_axes: bool) -> Result<Ring, GeometryError> {
    let id = ring.gml_id();
    let fail = |reason: String| GeometryError::ring(id, reason);

    let (raw, list_dim) = coordinate_text(ring).ok_or_else(|| fail("no coordinates".into()))?;
    let declared = ring.srs_dimension().or(list_dim).or(inherited);
    let dim = match declared {
        Some(value) => Dimension::from_srs_dimension(value)
            .ok_or_else(|| fail(format!("unsupported srsDimension {value}")))?,
        None => Dimension::DEFAULT,
    };

    let mut points = match raw {
        RawCoordinates::Flat(text) => parse_flat(&text, dim),
        RawCoordinates::Tuples(text) => parse_tuples(&text, dim),
    }
    .map_err(fail)?;

    if swap_axes {
        points = points.into_iter().map(Point::swapped).collect();
    }

    Ring::new(points, dim).map_err(fail)
}

enum RawCoordinates {
    /// `posList` or a `pos` sequence: whitespace-separated ordinates.
    Flat(String),
    /// Legacy `coordinates`: whitespace-separated, comma-joined tuples.
    Tuples(String),
}

/// Locate the ring's coordinate text and the `srsDimension` declared on it.
fn coordinate_text<N: GmlNode>(ring: N) -> Option<(RawCoordinates, Option<u8>)> {
    if let Some(list) = ring.find("posList") {
        return Some((RawCoordinates::Flat(list.text_content()), list.srs_dimension()));
    }

    let positions: Vec<N> = ring.descendants_named("pos").collect();
    if !positions.is_empty() {
        let text = positions.iter().map(|p| p.text_content()).collect::<Vec<_>>().join(" ");
        return Some((RawCoordinates::Flat(text), positions[0].srs_dimension()));
    }

    ring.find("coordinates")
        .map(|c| (RawCoordinates::Tuples(c.text_content()), c.srs_dimension()))
}

fn parse_ordinate(token: &str) -> Result<f64, String> {
    match token.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(format!("invalid ordinate {token:?}")),
    }
}

fn make_point(ordinates: &[f64], dim: Dimension) -> Point {
    match dim {
        Dimension::Xy => Point::xy(ordinates[0], ordinates[1]),
        Dimension::Xyz => Point::xyz(ordinates[0], ordinates[1], ordinates[2]),
    }
}

/// Group whitespace-separated ordinates into points of `dim` size, in order.
fn parse_flat(text: &str, dim: Dimension) -> Result<Vec<Point>, String> {
    let ordinates = text.split_whitespace()
        .map(parse_ordinate)
        .collect::<Result<Vec<_>, _>>()?;

    if ordinates.len() % dim.size() != 0 {
        return Err(format!("{} ordinates is not a multiple of dimension {}", ordinates.len(), dim.size()));
    }

    Ok(ordinates.chunks_exact(dim.size()).map(|c| make_point(c, dim)).collect())
}

fn parse_tuples(text: &str, dim: Dimension) -> Result<Vec<Point>, String> {
    text.split_whitespace()
        .map(|tuple| {
            let ordinates = tuple.split(',')
                .map(parse_ordinate)
                .collect::<Result<Vec<_>, _>>()?;
            if ordinates.len() != dim.size() {
                return Err(format!("tuple {tuple:?} does not have {} ordinates", dim.size()));
            }
            Ok(make_point(&ordinates, dim))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use roxmltree::Document;

    fn ring_xml(attrs: &str, body: &str) -> String {
        format!(r#"<gml:LinearRing xmlns:gml="http://www.opengis.net/gml" gml:id="r1" {attrs}>{body}</gml:LinearRing>"#)
    }

    fn parse(xml: &str, inherited: Option<u8>, swap: bool) -> Result<Ring, GeometryError> {
        let doc = Document::parse(xml).unwrap();
        parse_ring(doc.root_element(), inherited, swap)
    }

    #[test]
    fn closes_open_ring() {
        let xml = ring_xml("", "<gml:posList>0 0 0 10 0 0 10 10 0 0 10 0</gml:posList>");
        let ring = parse(&xml, None, false).unwrap();
        assert_eq!(ring.len(), 5);
        assert_eq!(ring.points().first(), ring.points().last());
        assert_eq!(ring.dim(), Dimension::Xyz);
    }

    #[test]
    fn keeps_closed_ring_and_order() {
        let xml = ring_xml(r#"srsDimension="2""#, "<gml:posList>0 0 10 0 10 10 0 0</gml:posList>");
        let ring = parse(&xml, None, false).unwrap();
        let xs: Vec<_> = ring.points().iter().map(|p| (p.x, p.y)).collect();
        assert_eq!(xs, [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 0.0)]);
    }

    #[test]
    fn too_few_distinct_points_is_degenerate() {
        // Two distinct points, closed to three.
        let xml = ring_xml("", "<gml:posList>0 0 0 10 0 0</gml:posList>");
        let err = parse(&xml, None, false).unwrap_err();
        assert_eq!(err.element_id(), "r1");

        // Four points after closing but only two distinct.
        let xml = ring_xml(r#"srsDimension="2""#, "<gml:posList>0 0 1 1 1 1 0 0</gml:posList>");
        assert!(parse(&xml, None, false).is_err());
    }

    #[test]
    fn missing_id_reports_unknown() {
        let xml = r#"<LinearRing><posList>1 2 3</posList></LinearRing>"#;
        let err = parse(xml, None, false).unwrap_err();
        assert_eq!(err.element_id(), "unknown");
    }

    #[test]
    fn dimension_resolution_order() {
        // Ring attribute beats the list attribute and the inherited hint.
        let xml = ring_xml(r#"srsDimension="2""#,
            r#"<gml:posList srsDimension="3">0 0 4 0 4 4 0 4</gml:posList>"#);
        assert_eq!(parse(&xml, Some(3), false).unwrap().dim(), Dimension::Xy);

        // List attribute beats the inherited hint.
        let xml = ring_xml("", r#"<gml:posList srsDimension="2">0 0 4 0 4 4 0 4</gml:posList>"#);
        assert_eq!(parse(&xml, Some(3), false).unwrap().dim(), Dimension::Xy);

        // Inherited hint beats the default.
        let xml = ring_xml("", "<gml:posList>0 0 4 0 4 4 0 4</gml:posList>");
        assert_eq!(parse(&xml, Some(2), false).unwrap().dim(), Dimension::Xy);
    }

    #[test]
    fn swap_exchanges_xy_only_and_is_an_involution() {
        let xml = ring_xml("", "<gml:posList>1 2 3 4 5 6 7 8 9</gml:posList>");
        let plain = parse(&xml, None, false).unwrap();
        let swapped = parse(&xml, None, true).unwrap();
        for (a, b) in plain.points().iter().zip(swapped.points()) {
            assert_eq!((a.x, a.y, a.z), (b.y, b.x, b.z));
            assert_eq!(b.swapped(), *a);
        }
    }

    #[test]
    fn pos_sequence_and_legacy_coordinates() {
        let xml = ring_xml(r#"srsDimension="2""#,
            "<gml:pos>0 0</gml:pos><gml:pos>3 0</gml:pos><gml:pos>3 3</gml:pos>");
        assert_eq!(parse(&xml, None, false).unwrap().len(), 4);

        let xml = ring_xml("", "<gml:coordinates>0,0,1 3,0,1 3,3,1 0,0,1</gml:coordinates>");
        let ring = parse(&xml, None, false).unwrap();
        assert_eq!(ring.points()[1], Point::xyz(3.0, 0.0, 1.0));
    }

    #[test]
    fn malformed_coordinates_are_degenerate() {
        let ragged = ring_xml("", "<gml:posList>0 0 0 1 0 0 1 1</gml:posList>");
        assert!(parse(&ragged, None, false).is_err());

        let text = ring_xml("", "<gml:posList>0 0 0 a 0 0 1 1 0</gml:posList>");
        assert!(parse(&text, None, false).is_err());

        let nan = ring_xml("", "<gml:posList>0 0 0 NaN 0 0 1 1 0</gml:posList>");
        assert!(parse(&nan, None, false).is_err());

        let dim4 = ring_xml(r#"srsDimension="4""#, "<gml:posList>0 0 0 0</gml:posList>");
        assert!(parse(&dim4, None, false).is_err());

        let empty = ring_xml("", "");
        assert!(parse(&empty, None, false).is_err());
    }
}
