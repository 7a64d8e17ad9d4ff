//! Area-of-interest types and the bounding-box arithmetic behind the `area`
//! request parameter.

use std::fmt;

use crate::error::{Error, Result};
use crate::util::python_float;

/// A lon/lat rectangle in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl Bounds {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Every bound must lie strictly inside the globe; ±180 and ±90 are rejected.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("West", self.west, 180.0),
            ("East", self.east, 180.0),
            ("North", self.north, 90.0),
            ("South", self.south, 90.0),
        ];
        for (name, value, limit) in checks {
            // NaN fails both comparisons and is rejected here too.
            if !(value > -limit && value < limit) {
                return Err(Error::validation(format!(
                    "{} bound: {} is outside of globe",
                    name, value
                )));
            }
        }
        Ok(())
    }

    /// Grows the box by its own width on each side and its own height above and
    /// below, clamped to the globe. All deltas come from the original box.
    pub fn expand_for_line_of_sight(&self) -> Self {
        let dx = (self.east - self.west).abs();
        let dy = (self.north - self.south).abs();
        Self {
            west: (self.west - dx).max(-180.0),
            east: (self.east + dx).min(180.0),
            south: (self.south - dy).max(-90.0),
            north: (self.north + dy).min(90.0),
        }
    }

    /// CDS `area` value: `north/west/south/east`.
    pub fn area_param(&self) -> String {
        [self.north, self.west, self.south, self.east]
            .iter()
            .map(|b| python_float(*b))
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Filename suffix: `west_south_east_north`, two decimals each.
    pub fn filename_suffix(&self) -> String {
        format!(
            "{:.2}_{:.2}_{:.2}_{:.2}",
            self.west, self.south, self.east, self.north
        )
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[w={}, s={}, e={}, n={}]",
            self.west, self.south, self.east, self.north
        )
    }
}

/// A planar polygon given by its exterior ring of `(lon, lat)` vertices.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    exterior: Vec<(f64, f64)>,
}

impl Polygon {
    pub fn new(exterior: Vec<(f64, f64)>) -> Self {
        Self { exterior }
    }

    pub fn exterior(&self) -> &[(f64, f64)] {
        &self.exterior
    }

    /// Envelope of the ring, `None` when there are no vertices.
    pub fn bounds(&self) -> Option<Bounds> {
        let (first, rest) = self.exterior.split_first()?;
        let mut b = Bounds::new(first.0, first.1, first.0, first.1);
        for &(lon, lat) in rest {
            b.west = b.west.min(lon);
            b.east = b.east.max(lon);
            b.south = b.south.min(lat);
            b.north = b.north.max(lat);
        }
        Some(b)
    }

    /// Parses `POLYGON((lon lat, lon lat, ...))`. Only the exterior ring is kept.
    pub fn from_wkt(wkt: &str) -> Result<Self> {
        let s = wkt.trim();
        let invalid = |why: &str| Error::validation(format!("invalid WKT polygon '{}': {}", s, why));

        if !s.to_uppercase().starts_with("POLYGON") {
            return Err(invalid("expected POLYGON"));
        }
        let start = s.find("((").ok_or_else(|| invalid("missing opening parentheses"))?;
        let end = s.find(')').ok_or_else(|| invalid("missing closing parenthesis"))?;
        if end <= start + 2 {
            return Err(invalid("empty ring"));
        }

        let points = s[start + 2..end]
            .split(',')
            .map(|pair| {
                let parts: Vec<&str> = pair.split_whitespace().collect();
                let &[lon, lat] = &parts[..] else {
                    return Err(invalid(&format!("expected 'lon lat', got '{}'", pair.trim())));
                };
                let lon: f64 = lon.parse().map_err(|_| invalid(&format!("bad longitude '{}'", lon)))?;
                let lat: f64 = lat.parse().map_err(|_| invalid(&format!("bad latitude '{}'", lat)))?;
                Ok((lon, lat))
            })
            .collect::<Result<Vec<_>>>()?;

        if points.len() < 4 {
            return Err(invalid("a ring needs at least 4 points including the closing one"));
        }
        Ok(Self::new(points))
    }
}

/// Area of interest accepted by the download call.
#[derive(Debug, Clone, PartialEq)]
pub enum Subset {
    Bounds(Bounds),
    Polygon(Polygon),
    /// WKT text, parsed when the download starts.
    Wkt(String),
}

impl Subset {
    /// Normalizes to a bounding box.
    pub fn bounds(&self) -> Result<Bounds> {
        match self {
            Subset::Bounds(b) => Ok(*b),
            // An empty polygon is an error rather than a silent full-globe request.
            Subset::Polygon(p) => p
                .bounds()
                .ok_or_else(|| Error::validation("subset polygon has no vertices")),
            Subset::Wkt(text) => Subset::Polygon(Polygon::from_wkt(text)?).bounds(),
        }
    }
}

impl From<Bounds> for Subset {
    fn from(b: Bounds) -> Self {
        Subset::Bounds(b)
    }
}

impl From<Polygon> for Subset {
    fn from(p: Polygon) -> Self {
        Subset::Polygon(p)
    }
}

impl From<&str> for Subset {
    fn from(s: &str) -> Self {
        Subset::Wkt(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_of_sight_doubles_the_box() {
        let b = Bounds::new(-10.0, -5.0, 10.0, 5.0).expand_for_line_of_sight();
        assert_eq!(b, Bounds::new(-30.0, -15.0, 30.0, 15.0));
    }

    #[test]
    fn line_of_sight_clamps_to_globe() {
        let b = Bounds::new(100.0, 40.0, 170.0, 80.0).expand_for_line_of_sight();
        assert_eq!(b, Bounds::new(30.0, 0.0, 180.0, 90.0));

        let b = Bounds::new(-179.0, -89.0, -100.0, -60.0).expand_for_line_of_sight();
        assert_eq!(b.west, -180.0);
        assert_eq!(b.east, -21.0);
        assert_eq!(b.south, -90.0);
        assert_eq!(b.north, -31.0);
    }

    #[test]
    fn boundaries_are_exclusive() {
        assert!(Bounds::new(-179.99, -89.99, 179.99, 89.99).validate().is_ok());

        let err = Bounds::new(-10.0, -5.0, 180.0, 5.0).validate().unwrap_err();
        assert!(err.to_string().contains("East bound: 180"));

        let err = Bounds::new(-10.0, -90.0, 10.0, 5.0).validate().unwrap_err();
        assert!(err.to_string().contains("South bound: -90"));

        assert!(Bounds::new(-180.0, 0.0, 1.0, 1.0).validate().is_err());
        assert!(Bounds::new(0.0, 0.0, 1.0, 90.0).validate().is_err());
        assert!(Bounds::new(f64::NAN, 0.0, 1.0, 1.0).validate().is_err());
    }

    #[test]
    fn area_and_suffix_formatting() {
        let b = Bounds::new(-10.0, -5.0, 10.5, 5.0);
        assert_eq!(b.area_param(), "5.0/-10.0/-5.0/10.5");
        assert_eq!(b.filename_suffix(), "-10.00_-5.00_10.50_5.00");

        let b = Bounds::new(-105.123, 39.5, -104.987, 40.0);
        assert_eq!(b.filename_suffix(), "-105.12_39.50_-104.99_40.00");
    }

    #[test]
    fn polygon_envelope() {
        let p = Polygon::new(vec![(-105.0, 39.0), (-104.0, 39.5), (-104.5, 40.2), (-105.0, 39.0)]);
        assert_eq!(p.bounds(), Some(Bounds::new(-105.0, 39.0, -104.0, 40.2)));
        assert_eq!(Polygon::new(Vec::new()).bounds(), None);
        assert!(Subset::from(Polygon::new(Vec::new())).bounds().is_err());
    }

    #[test]
    fn wkt_polygons() {
        let subset = Subset::from("POLYGON((-10 -5, 10 -5, 10 5, -10 5, -10 -5))");
        assert_eq!(subset.bounds().unwrap(), Bounds::new(-10.0, -5.0, 10.0, 5.0));

        let p = Polygon::from_wkt("polygon ((0 0, 1 0, 1 1, 0 0))").unwrap();
        assert_eq!(p.exterior().len(), 4);

        assert!(Polygon::from_wkt("POINT(1 2)").is_err());
        assert!(Polygon::from_wkt("POLYGON((0 0, 1 1))").is_err());
        assert!(Polygon::from_wkt("POLYGON((0 0, 1 x, 1 1, 0 0))").is_err());
        assert!(Polygon::from_wkt("POLYGON((0 0 0, 1 0, 1 1, 0 0))").is_err());
    }
}
