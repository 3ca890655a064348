use crate::geo::{eta_minutes, haversine_km, travel_minutes, MIN_LEG_MINUTES};
use crate::models::pool::{Destination, Rider};
use crate::models::route::{OptimizedRoute, RouteStop};
use crate::models::vehicle::Vehicle;

/// Orders pickups nearest-first from the vehicle's starting position and
/// times each leg.
///
/// Riders are ranked once against the start point; the ranking is not
/// re-evaluated as the vehicle moves. Each leg is then timed from the
/// previous stop. `total_time` rounds the raw minute sum once, so it can be
/// smaller than the sum of the per-leg floors.
pub fn optimize_route(vehicle: &Vehicle, riders: &[Rider], destination: &Destination) -> OptimizedRoute {
    let start = vehicle.location;

    let mut ranked: Vec<(&Rider, f64)> = riders
        .iter()
        .map(|rider| (rider, haversine_km(&start, &rider.pickup)))
        .collect();
    ranked.sort_by(|a, b| a.1.total_cmp(&b.1));

    let mut current = start;
    let mut total_minutes = 0.0;
    let mut cumulative = 0;

    let estimated_pickup_order = ranked
        .into_iter()
        .enumerate()
        .map(|(index, (rider, distance_from_start))| {
            let leg_km = haversine_km(&current, &rider.pickup);
            total_minutes += travel_minutes(leg_km, vehicle.speed);
            current = rider.pickup;

            let eta = eta_minutes(leg_km, vehicle.speed, MIN_LEG_MINUTES);
            cumulative += eta;

            RouteStop {
                rider_id: rider.id.clone(),
                name: rider.name.clone(),
                pickup: rider.pickup,
                pickup_order: index as u32 + 1,
                distance_km: distance_from_start,
                eta,
                cumulative_eta: cumulative,
            }
        })
        .collect();

    let final_leg_km = haversine_km(&current, &destination.location);
    total_minutes += travel_minutes(final_leg_km, vehicle.speed);

    OptimizedRoute {
        vehicle: vehicle.summary(),
        destination: destination.clone(),
        mode: None,
        estimated_pickup_order,
        shared_pickup_eta: None,
        total_time: total_minutes.ceil() as u32,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::optimize_route;
    use crate::geo::haversine_km;
    use crate::models::pool::{Destination, Rider};
    use crate::models::vehicle::{GeoPoint, Vehicle};

    fn vehicle_at(lat: f64, lng: f64, speed: f64) -> Vehicle {
        Vehicle::new(1, "Tricycle #001", GeoPoint::new(lat, lng), speed, 4, Utc::now())
    }

    fn rider(id: &str, lat: f64, lng: f64) -> Rider {
        Rider {
            id: id.to_string(),
            name: format!("rider {id}"),
            pickup: GeoPoint::new(lat, lng),
            joined_at: Utc::now(),
        }
    }

    fn destination(lat: f64, lng: f64) -> Destination {
        Destination {
            name: "Library".to_string(),
            location: GeoPoint::new(lat, lng),
        }
    }

    #[test]
    fn riders_are_ordered_by_distance_from_vehicle_start() {
        let vehicle = vehicle_at(6.8900, 3.7200, 12.0);
        let riders = vec![
            rider("far", 6.9000, 3.7200),
            rider("near", 6.8910, 3.7200),
            rider("mid", 6.8950, 3.7200),
        ];

        let route = optimize_route(&vehicle, &riders, &destination(6.9100, 3.7200));
        let order: Vec<&str> = route
            .estimated_pickup_order
            .iter()
            .map(|s| s.rider_id.as_str())
            .collect();

        assert_eq!(order, vec!["near", "mid", "far"]);
        assert_eq!(route.estimated_pickup_order[0].pickup_order, 1);
        assert_eq!(route.estimated_pickup_order[2].pickup_order, 3);
        assert!(route.mode.is_none());
    }

    #[test]
    fn legs_are_timed_from_previous_stop() {
        // ~0.5 km north, then a further ~0.5 km north, then ~1 km to destination.
        let vehicle = vehicle_at(6.8928, 3.7183, 12.0);
        let first = rider("a", 6.8973, 3.7183);
        let second = rider("b", 6.9018, 3.7183);
        let dest = destination(6.9108, 3.7183);

        let route = optimize_route(&vehicle, &[second.clone(), first.clone()], &dest);
        let stops = &route.estimated_pickup_order;

        assert_eq!(stops[0].rider_id, "a");
        assert_eq!(stops[0].eta, 3);
        assert_eq!(stops[1].eta, 3);
        assert_eq!(stops[1].cumulative_eta, 6);

        let raw = [
            haversine_km(&vehicle.location, &first.pickup),
            haversine_km(&first.pickup, &second.pickup),
            haversine_km(&second.pickup, &dest.location),
        ]
        .iter()
        .map(|km| km / 12.0 * 60.0)
        .sum::<f64>();
        assert_eq!(route.total_time, raw.ceil() as u32);
    }

    #[test]
    fn co_located_pickups_still_cost_one_minute_per_leg() {
        let vehicle = vehicle_at(6.8928, 3.7183, 12.0);
        let riders = vec![rider("a", 6.8928, 3.7183), rider("b", 6.8928, 3.7183)];

        let route = optimize_route(&vehicle, &riders, &destination(6.8928, 3.7183));

        assert!(route.estimated_pickup_order.iter().all(|s| s.eta == 1));
        assert_eq!(route.estimated_pickup_order[1].cumulative_eta, 2);
        assert_eq!(route.total_time, 0);
    }

    #[test]
    fn zero_speed_uses_fallback() {
        let slow = vehicle_at(6.8928, 3.7183, 0.0);
        let default = vehicle_at(6.8928, 3.7183, 12.0);
        let riders = vec![rider("a", 6.8973, 3.7183)];
        let dest = destination(6.9000, 3.7183);

        assert_eq!(
            optimize_route(&slow, &riders, &dest).total_time,
            optimize_route(&default, &riders, &dest).total_time
        );
    }
}
