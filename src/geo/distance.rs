use crate::models::GeoPoint;

pub const EARTH_RADIUS_MILES: f64 = 3958.8;

/// Haversine great-circle distance between two points in miles.
pub fn haversine_miles(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_MILES * c
}

/// Round to two decimal places for display and storage
pub fn round_miles(miles: f64) -> f64 {
    (miles * 100.0).round() / 100.0
}
