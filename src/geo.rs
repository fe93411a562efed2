//! Lossy quantization between geographic degrees / meters and the i32
//! values the packed record layout stores.

/// One degree is split into ten-millionths, giving ~1cm resolution.
pub const DEGREE_FACTOR: f64 = 10_000_000.0;

/// Distances are stored as millimeters, so the i32 range covers about
/// +-2100 km per edge.
pub const DIST_FACTOR: f64 = 1000.0;

pub fn degree_to_int(deg: f64) -> i32 {
    (deg * DEGREE_FACTOR) as i32
}

pub fn int_to_degree(stored: i32) -> f64 {
    f64::from(stored) / DEGREE_FACTOR
}

/// Truncates toward zero, matching the storage contract.
pub fn dist_to_int(meters: f64) -> i32 {
    (meters * DIST_FACTOR) as i32
}

pub fn int_to_dist(stored: i32) -> f64 {
    f64::from(stored) / DIST_FACTOR
}

/// A geographic coordinate in degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Geographic extent of all nodes ever written.
///
/// Starts out inverted so that the first insertion snaps all four
/// limits; widening is monotonic after that.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub const INVERSE: Self = Self {
        min_lat: f64::MAX,
        max_lat: -f64::MAX,
        min_lon: f64::MAX,
        max_lon: -f64::MAX,
    };

    pub fn extend(&mut self, lat: f64, lon: f64) {
        if lat > self.max_lat {
            self.max_lat = lat;
        }
        if lat < self.min_lat {
            self.min_lat = lat;
        }
        if lon > self.max_lon {
            self.max_lon = lon;
        }
        if lon < self.min_lon {
            self.min_lon = lon;
        }
    }

    pub fn is_valid(&self) -> bool {
        self.min_lat <= self.max_lat && self.min_lon <= self.max_lon
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lon >= self.min_lon && lon <= self.max_lon
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degree_quantization_round_trips_within_resolution() {
        for deg in [-180.0, -52.3124, 0.0, 0.000_000_1, 13.37, 89.999_999_9] {
            let back = int_to_degree(degree_to_int(deg));
            assert!((back - deg).abs() < 1.0 / DEGREE_FACTOR, "{deg} -> {back}");
        }
    }

    #[test]
    fn distance_quantization_truncates_toward_zero() {
        assert_eq!(dist_to_int(1.2345), 1234);
        assert_eq!(dist_to_int(-1.2345), -1234);
        assert_eq!(int_to_dist(dist_to_int(1000.0)), 1000.0);
    }

    #[test]
    fn bounding_box_extends_monotonically() {
        let mut bounds = BoundingBox::INVERSE;
        assert!(!bounds.is_valid());
        bounds.extend(1.0, 2.0);
        assert!(bounds.is_valid());
        bounds.extend(-3.0, 7.0);
        assert_eq!(bounds.min_lat, -3.0);
        assert_eq!(bounds.max_lat, 1.0);
        assert_eq!(bounds.min_lon, 2.0);
        assert_eq!(bounds.max_lon, 7.0);
        assert!(bounds.contains(0.0, 5.0));
        assert!(!bounds.contains(2.0, 5.0));
    }
}
