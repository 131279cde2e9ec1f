//! Great-circle distance between coordinates

const EARTH_RADIUS_MILES: f64 = 3958.8;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    #[n(0)]
    pub lat: f64,
    #[n(1)]
    pub lng: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        distance_miles(self, other)
    }

    pub fn within(&self, other: &GeoPoint, radius_miles: f64) -> bool {
        distance_miles(self, other) <= radius_miles
    }
}

/// Haversine distance in statute miles.
pub fn distance_miles(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let d_lat = lat2 - lat1;
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_MILES * h.sqrt().min(1.0).asin()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DALLAS: GeoPoint = GeoPoint::new(32.7767, -96.7970);
    const HOUSTON: GeoPoint = GeoPoint::new(29.7604, -95.3698);

    #[test]
    fn identical_points_are_zero() {
        assert_eq!(distance_miles(&DALLAS, &DALLAS), 0.0);
    }

    #[test]
    fn dallas_to_houston() {
        let d = distance_miles(&DALLAS, &HOUSTON);
        assert!((d - 225.0).abs() < 5.0, "got {d}");
        assert!((d - distance_miles(&HOUSTON, &DALLAS)).abs() < 1e-9);
    }

    #[test]
    fn one_degree_of_latitude() {
        let d = distance_miles(&GeoPoint::new(0.0, 0.0), &GeoPoint::new(1.0, 0.0));
        assert!((d - 69.09).abs() < 0.1, "got {d}");
    }
}
