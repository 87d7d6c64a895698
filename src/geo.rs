use serde::{Deserialize, Serialize};

/// Mean earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
    /// Meters, interpreted in the owning item's reference frame.
    pub alt: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64, alt: f64) -> Self {
        Self { lat, lon, alt }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite() && self.alt.is_finite()
    }

    pub fn with_alt(self, alt: f64) -> Self {
        Self { alt, ..self }
    }
}

/// Clamps latitude into [-90, 90] and wraps longitude into (-180, 180].
pub fn normalize(lat: f64, lon: f64) -> Coordinate {
    Coordinate::new(lat.clamp(-90.0, 90.0), wrap_lon(lon), 0.0)
}

/// Normalizes the horizontal part of `coord`, keeping its altitude.
pub fn normalized(coord: Coordinate) -> Coordinate {
    normalize(coord.lat, coord.lon).with_alt(coord.alt)
}

fn wrap_lon(lon: f64) -> f64 {
    let mut wrapped = lon % 360.0;
    if wrapped <= -180.0 {
        wrapped += 360.0;
    } else if wrapped > 180.0 {
        wrapped -= 360.0;
    }
    wrapped
}

/// Great-circle distance in meters; altitude is ignored.
pub fn distance(a: Coordinate, b: Coordinate) -> f64 {
    let a = normalized(a);
    let b = normalized(b);
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = wrap_lon(b.lon - a.lon).to_radians();
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * h.sqrt().min(1.0).asin() * EARTH_RADIUS_M
}

/// Signed altitude change from `a` to `b`. Both must already be in a comparable frame.
pub fn altitude_delta(a: Coordinate, b: Coordinate) -> f64 {
    b.alt - a.alt
}

/// Initial bearing from `a` to `b` in degrees, [0, 360).
pub fn bearing(a: Coordinate, b: Coordinate) -> f64 {
    let a = normalized(a);
    let b = normalized(b);
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlon = wrap_lon(b.lon - a.lon).to_radians();
    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    let deg = y.atan2(x).to_degrees();
    let deg = if deg < 0.0 { deg + 360.0 } else { deg };
    if deg >= 360.0 {
        0.0
    } else {
        deg
    }
}

/// East/north offset in meters of `point` relative to `origin` (equirectangular).
///
/// Accurate enough for survey-sized areas, not for continental distances.
pub fn to_local(origin: Coordinate, point: Coordinate) -> (f64, f64) {
    let origin = normalized(origin);
    let point = normalized(point);
    let north = (point.lat - origin.lat).to_radians() * EARTH_RADIUS_M;
    let east =
        wrap_lon(point.lon - origin.lon).to_radians() * EARTH_RADIUS_M * origin.lat.to_radians().cos();
    (east, north)
}

/// Inverse of [`to_local`]. The result carries `origin`'s altitude.
pub fn from_local(origin: Coordinate, east: f64, north: f64) -> Coordinate {
    let origin = normalized(origin);
    let lat = origin.lat + (north / EARTH_RADIUS_M).to_degrees();
    let cos_lat = origin.lat.to_radians().cos();
    let lon = if cos_lat.abs() < 1e-12 {
        origin.lon
    } else {
        origin.lon + (east / (EARTH_RADIUS_M * cos_lat)).to_degrees()
    };
    normalize(lat, lon).with_alt(origin.alt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_wraps_and_clamps() {
        let c = normalize(95.0, 190.0);
        assert_eq!(c.lat, 90.0);
        assert!((c.lon - -170.0).abs() < 1e-9);
        assert_eq!(normalize(0.0, -180.0).lon, 180.0);
        assert_eq!(normalize(0.0, 180.0).lon, 180.0);
        assert!((normalize(-100.0, -540.0).lon - 180.0).abs() < 1e-9);
    }

    #[test]
    fn distance_same_point_is_zero() {
        let p = Coordinate::new(26.0, -80.0, 100.0);
        assert!(distance(p, p.with_alt(0.0)).abs() < 1e-6);
    }

    #[test]
    fn distance_ignores_altitude_and_matches_arc() {
        let a = Coordinate::new(0.0, 0.0, 0.0);
        let b = Coordinate::new(0.0, 0.001, 500.0);
        let expected = 0.001_f64.to_radians() * EARTH_RADIUS_M;
        assert!((distance(a, b) - expected).abs() < 1e-6);
    }

    #[test]
    fn distance_across_antimeridian_is_short() {
        let a = Coordinate::new(0.0, 179.9995, 0.0);
        let b = Coordinate::new(0.0, -179.9995, 0.0);
        let d = distance(a, b);
        assert!(d < 200.0, "got {d}");
        assert!((bearing(a, b) - 90.0).abs() < 1e-6);
    }

    #[test]
    fn bearing_cardinals() {
        let origin = Coordinate::new(10.0, 10.0, 0.0);
        assert!(bearing(origin, Coordinate::new(11.0, 10.0, 0.0)).abs() < 1e-9);
        assert!((bearing(origin, Coordinate::new(10.0, 11.0, 0.0)) - 90.0).abs() < 1.0);
        assert!((bearing(origin, Coordinate::new(9.0, 10.0, 0.0)) - 180.0).abs() < 1e-9);
        let west = bearing(origin, Coordinate::new(10.0, 9.0, 0.0));
        assert!((west - 270.0).abs() < 1.0);
        assert!((0.0..360.0).contains(&west));
    }

    #[test]
    fn altitude_delta_is_signed() {
        let a = Coordinate::new(0.0, 0.0, 50.0);
        let b = Coordinate::new(0.0, 0.0, 20.0);
        assert_eq!(altitude_delta(a, b), -30.0);
        assert_eq!(altitude_delta(b, a), 30.0);
    }

    #[test]
    fn local_offsets_round_trip() {
        let origin = Coordinate::new(47.3977, 8.5456, 30.0);
        let p = from_local(origin, 120.0, -45.0);
        let (east, north) = to_local(origin, p);
        assert!((east - 120.0).abs() < 1e-6);
        assert!((north + 45.0).abs() < 1e-6);
        assert_eq!(p.alt, 30.0);
    }
}
