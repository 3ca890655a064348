use crate::models::vehicle::GeoPoint;

const EARTH_RADIUS_KM: f64 = 6_371.0;

/// Fallback when a vehicle reports no usable speed.
pub const DEFAULT_SPEED_KMH: f64 = 12.0;

/// Floor for any single routed leg.
pub const MIN_LEG_MINUTES: u32 = 1;
pub const MIN_SOLO_PICKUP_MINUTES: u32 = 2;
pub const MIN_SOLO_TRIP_MINUTES: u32 = 3;

pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

pub fn effective_speed(speed_kmh: f64) -> f64 {
    if speed_kmh.is_finite() && speed_kmh > 0.0 {
        speed_kmh
    } else {
        DEFAULT_SPEED_KMH
    }
}

/// Unrounded travel time in minutes.
pub fn travel_minutes(distance_km: f64, speed_kmh: f64) -> f64 {
    distance_km / effective_speed(speed_kmh) * 60.0
}

/// Whole minutes, rounded up, never below `floor`.
pub fn eta_minutes(distance_km: f64, speed_kmh: f64, floor: u32) -> u32 {
    let minutes = travel_minutes(distance_km, speed_kmh).ceil();
    (minutes.max(0.0) as u32).max(floor)
}

pub fn centroid(points: &[GeoPoint]) -> Option<GeoPoint> {
    if points.is_empty() {
        return None;
    }

    let count = points.len() as f64;
    let (lat, lng) = points
        .iter()
        .fold((0.0, 0.0), |(lat, lng), p| (lat + p.lat, lng + p.lng));

    Some(GeoPoint::new(lat / count, lng / count))
}

#[cfg(test)]
mod tests {
    use super::{centroid, eta_minutes, haversine_km, DEFAULT_SPEED_KMH};
    use crate::models::vehicle::GeoPoint;

    #[test]
    fn zero_distance_for_same_point() {
        let p = GeoPoint::new(6.8928, 3.7183);
        let distance = haversine_km(&p, &p);
        assert!(distance < 1e-9);
    }

    #[test]
    fn london_to_paris_is_around_343_km() {
        let london = GeoPoint::new(51.5074, -0.1278);
        let paris = GeoPoint::new(48.8566, 2.3522);
        let distance = haversine_km(&london, &paris);
        assert!((distance - 343.0).abs() < 5.0);
    }

    #[test]
    fn half_km_at_12_kmh_is_three_minutes() {
        assert_eq!(eta_minutes(0.5, 12.0, 1), 3);
        assert_eq!(eta_minutes(1.0, 12.0, 1), 5);
    }

    #[test]
    fn floor_applies_to_short_hops() {
        assert_eq!(eta_minutes(0.0, 12.0, 1), 1);
        assert_eq!(eta_minutes(0.01, 12.0, 2), 2);
        assert_eq!(eta_minutes(0.01, 12.0, 3), 3);
    }

    #[test]
    fn zero_or_broken_speed_falls_back_to_default() {
        let expected = eta_minutes(1.0, DEFAULT_SPEED_KMH, 1);
        assert_eq!(eta_minutes(1.0, 0.0, 1), expected);
        assert_eq!(eta_minutes(1.0, -4.0, 1), expected);
        assert_eq!(eta_minutes(1.0, f64::NAN, 1), expected);
    }

    #[test]
    fn centroid_is_mean_of_points() {
        let c = centroid(&[GeoPoint::new(0.0, 0.0), GeoPoint::new(2.0, 4.0)]).unwrap();
        assert!((c.lat - 1.0).abs() < 1e-12);
        assert!((c.lng - 2.0).abs() < 1e-12);
        assert!(centroid(&[]).is_none());
    }
}
