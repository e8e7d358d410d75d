//! Projection adapter wrapping the proj4rs transform engine.
//!
//! World coordinates are expressed in the units of the coordinate reference
//! system: metres for projected systems, degrees for geographic ones. At the
//! adapter boundary geographic angles are exchanged in radians, matching the
//! underlying engine.

use std::sync::Arc;

use proj4rs::Proj;
use proj4rs::transform::transform;
use proj4wkt::wkt_to_projstring;

use crate::crs::Epsg;
use crate::{Error, Point, Result};

const WKT_ROOTS: [&str; 7] = ["GEOGCS[", "PROJCS[", "GEOCCS[", "VERT_CS[", "LOCAL_CS[", "COMPD_CS[", "FITTED_C["];
const WKT2_ROOTS: [&str; 9] = [
    "GEODCRS[",
    "GEOGCRS[",
    "PROJCRS[",
    "VERTCRS[",
    "ENGCRS[",
    "COMPOUNDCRS[",
    "BOUNDCRS[",
    "PARAMETRICCRS[",
    "TIMECRS[",
];

fn is_wkt_string(s: &str) -> bool {
    WKT_ROOTS.iter().any(|&root| s.starts_with(root)) || WKT2_ROOTS.iter().any(|&root| s.starts_with(root))
}

/// Parameters that tie a projection to its ellipsoid and datum. These carry
/// over to the geographic pivot so that inverse/forward round trips do not
/// introduce a datum shift.
const DATUM_PARAMETERS: [&str; 9] = [
    "+ellps=", "+datum=", "+a=", "+b=", "+rf=", "+f=", "+R=", "+towgs84=", "+nadgrids=",
];

fn geographic_definition(proj_definition: &str) -> String {
    let mut def = String::from("+proj=longlat");
    for token in proj_definition.split_whitespace() {
        if DATUM_PARAMETERS.iter().any(|p| token.starts_with(p)) {
            def.push(' ');
            def.push_str(token);
        }
    }

    def
}

fn normalized_parameters(definition: &str) -> Vec<String> {
    let mut tokens: Vec<String> = definition
        .split_whitespace()
        .filter(|tok| !matches!(*tok, "+no_defs" | "+wktext" | "+type=crs"))
        .map(String::from)
        .collect();
    tokens.sort();
    tokens.dedup();
    tokens
}

fn proj_string_for_epsg(epsg: Epsg) -> Result<String> {
    crs_definitions::from_code(epsg.code())
        .map(|def| def.proj4.to_string())
        .ok_or_else(|| Error::Projection(format!("No projection definition known for {epsg}")))
}

/// A coordinate reference system with forward and inverse point transforms.
/// Handles are immutable and reentrant; share them with [`ProjectionRef`].
#[derive(Debug, Clone)]
pub struct Projection {
    proj: Proj,
    geographic: Proj,
    definition: String,
    epsg: Option<Epsg>,
}

pub type ProjectionRef = Arc<Projection>;

impl Projection {
    /// Accepts an `EPSG:xxxx` reference, a WKT string or a proj parameter string.
    pub fn from_definition(definition: &str) -> Result<Self> {
        let definition = definition.trim();
        if definition.is_empty() {
            return Err(Error::InvalidArgument("Empty projection definition".into()));
        }

        if let Some(code) = definition.strip_prefix("EPSG:") {
            let code = code
                .parse::<u16>()
                .map_err(|_| Error::InvalidArgument(format!("Invalid EPSG reference '{definition}'")))?;
            return Self::from_epsg(Epsg::from(code));
        }

        if is_wkt_string(definition) {
            let proj_str =
                wkt_to_projstring(definition).map_err(|e| Error::InvalidArgument(format!("Failed to parse WKT string ({e})")))?;
            return Self::from_proj(&proj_str);
        }

        Self::from_proj(definition)
    }

    pub fn from_epsg(epsg: Epsg) -> Result<Self> {
        let mut projection = Self::from_proj(&proj_string_for_epsg(epsg)?)?;
        projection.epsg = Some(epsg);
        Ok(projection)
    }

    pub fn from_proj(proj_str: &str) -> Result<Self> {
        let proj = Proj::from_proj_string(proj_str)?;
        let geographic = Proj::from_proj_string(&geographic_definition(proj_str))?;

        Ok(Projection {
            proj,
            geographic,
            definition: proj_str.to_string(),
            epsg: None,
        })
    }

    pub fn definition(&self) -> &str {
        &self.definition
    }

    pub fn epsg(&self) -> Option<Epsg> {
        self.epsg
    }

    pub fn is_geographic(&self) -> bool {
        self.proj.is_latlong()
    }

    /// Projects a geographic coordinate (radians) to a world coordinate.
    /// Fails when the coordinate lies outside the projection domain.
    pub fn forward(&self, lon_rad: f64, lat_rad: f64) -> Result<Point> {
        if self.is_geographic() {
            return Ok(Point::new(lon_rad.to_degrees(), lat_rad.to_degrees()));
        }

        let mut point = Point::new(lon_rad, lat_rad);
        transform(&self.geographic, &self.proj, &mut point)?;
        Ok(point)
    }

    /// Unprojects a world coordinate back to geographic radians.
    /// Fails when the coordinate lies outside the projection domain.
    pub fn inverse(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        if self.is_geographic() {
            return Ok((x.to_radians(), y.to_radians()));
        }

        let mut point = Point::new(x, y);
        transform(&self.proj, &self.geographic, &mut point)?;
        Ok((point.x(), point.y()))
    }

    /// Transforms a world coordinate in this reference system to a world
    /// coordinate in `target`, passing through geographic coordinates.
    pub fn transform_point_to(&self, target: &Projection, point: Point) -> Result<Point> {
        let mut p = if self.is_geographic() {
            Point::new(point.x().to_radians(), point.y().to_radians())
        } else {
            point
        };

        transform(&self.proj, &target.proj, &mut p)?;

        if target.is_geographic() {
            p = Point::new(p.x().to_degrees(), p.y().to_degrees());
        }

        Ok(p)
    }

    /// True when both handles describe the same projection family with the
    /// same parameter vector.
    pub fn eq_definition(&self, other: &Projection) -> bool {
        normalized_parameters(&self.definition) == normalized_parameters(&other.definition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn geographic_pivot_definition() {
        assert_eq!(
            geographic_definition("+proj=eqc +ellps=GRS80 +lon_0=0 +units=m"),
            "+proj=longlat +ellps=GRS80"
        );
        assert_eq!(geographic_definition("+proj=moll +R=6370997 +x_0=0"), "+proj=longlat +R=6370997");
    }

    #[test]
    fn forward_inverse_round_trip() -> crate::Result {
        let proj = Projection::from_proj("+proj=eqc +ellps=WGS84 +lon_0=0")?;
        assert!(!proj.is_geographic());

        let lon = 5.3_f64.to_radians();
        let lat = 51.2_f64.to_radians();
        let world = proj.forward(lon, lat)?;
        let (lon2, lat2) = proj.inverse(world.x(), world.y())?;

        assert_relative_eq!(lon, lon2, epsilon = 1e-9);
        assert_relative_eq!(lat, lat2, epsilon = 1e-9);
        Ok(())
    }

    #[test]
    fn geographic_crs_units_are_degrees() -> crate::Result {
        let proj = Projection::from_epsg(crate::crs::epsg::WGS84)?;
        assert!(proj.is_geographic());

        let world = proj.forward(0.25_f64.to_radians(), 0.5_f64.to_radians())?;
        assert_relative_eq!(world.x(), 0.25, epsilon = 1e-12);
        assert_relative_eq!(world.y(), 0.5, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn transform_between_projections() -> crate::Result {
        let eqc = Projection::from_proj("+proj=eqc +ellps=WGS84")?;
        let wgs = Projection::from_epsg(crate::crs::epsg::WGS84)?;

        // The eqc x axis is linear in longitude, so a point on the equator
        // should land on the same longitude when transformed to WGS84.
        let world = eqc.transform_point_to(&wgs, eqc.forward(10.0_f64.to_radians(), 0.0)?)?;
        assert_relative_eq!(world.x(), 10.0, epsilon = 1e-6);
        assert_relative_eq!(world.y(), 0.0, epsilon = 1e-6);
        Ok(())
    }

    #[test]
    fn equality_ignores_parameter_order() -> crate::Result {
        let a = Projection::from_proj("+proj=eqc +ellps=WGS84 +lon_0=0")?;
        let b = Projection::from_proj("+lon_0=0 +ellps=WGS84 +proj=eqc +no_defs")?;
        let c = Projection::from_proj("+proj=eqc +ellps=WGS84 +lon_0=12")?;

        assert!(a.eq_definition(&b));
        assert!(!a.eq_definition(&c));
        Ok(())
    }

    #[test]
    fn out_of_domain_is_an_error_or_unstable() -> crate::Result {
        // The mollweide inverse is undefined outside the projection ellipse:
        // either the transform reports the failure, or the folded-back
        // coordinate cannot survive a forward round trip.
        let moll = Projection::from_proj("+proj=moll +R=6370997")?;
        match moll.inverse(4.0e7, 0.0) {
            Err(_) => {}
            Ok((lon, lat)) => {
                let round_trip = moll.forward(lon, lat);
                assert!(round_trip.is_err() || (round_trip?.x() - 4.0e7).abs() > 1.0);
            }
        }
        Ok(())
    }
}
