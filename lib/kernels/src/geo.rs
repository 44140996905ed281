//! Great-circle distance over `(latitude, longitude)` pairs in degrees.

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_009.0;

/// Haversine distance between two coordinates, in meters.
///
/// Inputs are degrees; identical coordinates return exactly zero.
pub fn haversine_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    if lat1 == lat2 && lon1 == lon2 {
        return 0.0;
    }

    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().min(1.0).asin();

    c * EARTH_RADIUS_METERS
}

/// Dense-kernel form: each operand is a `(lat, lon)` pair of little-endian
/// `f64`s, the layout host blobs use.
pub(crate) fn haversine_f64(a: &[u8], b: &[u8]) -> f32 {
    let read = |bytes: &[u8], i: usize| {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&bytes[i * 8..i * 8 + 8]);
        f64::from_le_bytes(buf)
    };
    haversine_meters(read(a, 0), read(a, 1), read(b, 0), read(b, 1)) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_coordinates_are_zero() {
        assert_eq!(haversine_meters(40.7128, -74.0060, 40.7128, -74.0060), 0.0);
    }

    #[test]
    fn new_york_to_los_angeles() {
        // Roughly 3936 km great-circle
        let d = haversine_meters(40.7128, -74.0060, 34.0522, -118.2437);
        assert!((3.90e6..4.00e6).contains(&d), "got {d}");
    }

    #[test]
    fn symmetric() {
        let ab = haversine_meters(51.5074, -0.1278, 35.6895, 139.6917);
        let ba = haversine_meters(35.6895, 139.6917, 51.5074, -0.1278);
        assert!((ab - ba).abs() < 1e-6);
    }

    #[test]
    fn dense_form_matches_scalar_form() {
        let pack = |lat: f64, lon: f64| {
            let mut v = Vec::with_capacity(16);
            v.extend_from_slice(&lat.to_le_bytes());
            v.extend_from_slice(&lon.to_le_bytes());
            v
        };
        let a = pack(40.7128, -74.0060);
        let b = pack(37.7749, -122.4194);
        let dense = haversine_f64(&a, &b) as f64;
        let scalar = haversine_meters(40.7128, -74.0060, 37.7749, -122.4194);
        assert!((dense - scalar).abs() < 1.0);
    }
}
