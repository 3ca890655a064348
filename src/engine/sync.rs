use chrono::{DateTime, Duration, Utc};

use crate::geo::{centroid, eta_minutes, haversine_km, MIN_LEG_MINUTES};
use crate::models::pool::{Destination, Rider};
use crate::models::route::{OptimizedRoute, PickupMode, PickupPlanEntry, RouteStop, SyncState};
use crate::models::vehicle::{GeoPoint, Vehicle};

/// Pickups this close to the group centroid count as one shared stop.
/// Wide enough to absorb phone GPS drift.
pub const SAME_LOCATION_THRESHOLD_KM: f64 = 0.08;

/// Lead time between building a plan and the anchored ride start.
pub const RIDE_START_LEAD_SECS: i64 = 2;

#[derive(Debug, Clone)]
pub struct SyncPlan {
    pub route: OptimizedRoute,
    pub state: SyncState,
}

pub fn same_pickup_location(riders: &[Rider]) -> bool {
    let pickups: Vec<GeoPoint> = riders.iter().map(|r| r.pickup).collect();
    let Some(center) = centroid(&pickups) else {
        return false;
    };

    pickups
        .iter()
        .all(|p| haversine_km(p, &center) <= SAME_LOCATION_THRESHOLD_KM)
}

/// Resolves the pickup policy for a full pool and anchors every ETA to a
/// single ride-start instant.
///
/// Returns a fresh route alongside the sync state; the input route is left
/// untouched.
pub fn synchronize(
    route: &OptimizedRoute,
    vehicle: &Vehicle,
    riders: &[Rider],
    destination: &Destination,
    now: DateTime<Utc>,
) -> SyncPlan {
    let ride_start_at = now + Duration::seconds(RIDE_START_LEAD_SECS);
    let same_location = same_pickup_location(riders);

    let (route, pickup_plan, total_time_minutes) = if same_location {
        group_plan(route, vehicle, riders, destination, ride_start_at)
    } else {
        staggered_plan(route, ride_start_at)
    };

    let state = SyncState {
        generated_at: now,
        ride_start_at,
        same_pickup_location: same_location,
        mode: if same_location {
            PickupMode::Group
        } else {
            PickupMode::Staggered
        },
        total_time_minutes,
        estimated_arrival_at: ride_start_at + minutes(total_time_minutes),
        pickup_plan,
    };

    SyncPlan { route, state }
}

fn group_plan(
    route: &OptimizedRoute,
    vehicle: &Vehicle,
    riders: &[Rider],
    destination: &Destination,
    ride_start_at: DateTime<Utc>,
) -> (OptimizedRoute, Vec<PickupPlanEntry>, u32) {
    // The shared stop is the first stop on the optimized route, i.e. the
    // pickup nearest the vehicle.
    let shared_point = route
        .estimated_pickup_order
        .first()
        .map(|stop| stop.pickup)
        .or_else(|| riders.first().map(|r| r.pickup))
        .unwrap_or(destination.location);

    let shared_eta = eta_minutes(
        haversine_km(&vehicle.location, &shared_point),
        vehicle.speed,
        MIN_LEG_MINUTES,
    );
    let to_destination = eta_minutes(
        haversine_km(&shared_point, &destination.location),
        vehicle.speed,
        MIN_LEG_MINUTES,
    );
    let total = shared_eta + to_destination;
    let eta_at = ride_start_at + minutes(shared_eta);

    let plan: Vec<PickupPlanEntry> = riders
        .iter()
        .enumerate()
        .map(|(index, rider)| PickupPlanEntry {
            rider_id: rider.id.clone(),
            rider_name: rider.name.clone(),
            pickup_order: index as u32 + 1,
            leg_eta_minutes: shared_eta,
            cumulative_eta: shared_eta,
            eta_at,
            pickup: rider.pickup,
        })
        .collect();

    let stops = plan
        .iter()
        .map(|entry| RouteStop {
            rider_id: entry.rider_id.clone(),
            name: entry.rider_name.clone(),
            pickup: entry.pickup,
            pickup_order: entry.pickup_order,
            distance_km: haversine_km(&vehicle.location, &entry.pickup),
            eta: shared_eta,
            cumulative_eta: shared_eta,
        })
        .collect();

    let route = OptimizedRoute {
        mode: Some(PickupMode::Group),
        estimated_pickup_order: stops,
        shared_pickup_eta: Some(shared_eta),
        total_time: total,
        ..route.clone()
    };

    (route, plan, total)
}

fn staggered_plan(
    route: &OptimizedRoute,
    ride_start_at: DateTime<Utc>,
) -> (OptimizedRoute, Vec<PickupPlanEntry>, u32) {
    let mut cumulative = 0;

    let plan: Vec<PickupPlanEntry> = route
        .estimated_pickup_order
        .iter()
        .enumerate()
        .map(|(index, stop)| {
            let leg = stop.eta.max(MIN_LEG_MINUTES);
            cumulative += leg;
            PickupPlanEntry {
                rider_id: stop.rider_id.clone(),
                rider_name: stop.name.clone(),
                pickup_order: if stop.pickup_order > 0 {
                    stop.pickup_order
                } else {
                    index as u32 + 1
                },
                leg_eta_minutes: leg,
                cumulative_eta: cumulative,
                eta_at: ride_start_at + minutes(cumulative),
                pickup: stop.pickup,
            }
        })
        .collect();

    let stops = route
        .estimated_pickup_order
        .iter()
        .zip(&plan)
        .map(|(stop, entry)| RouteStop {
            pickup_order: entry.pickup_order,
            eta: entry.leg_eta_minutes,
            cumulative_eta: entry.cumulative_eta,
            ..stop.clone()
        })
        .collect();

    let total = route.total_time;
    let route = OptimizedRoute {
        mode: Some(PickupMode::Staggered),
        estimated_pickup_order: stops,
        ..route.clone()
    };

    (route, plan, total)
}

fn minutes(value: u32) -> Duration {
    Duration::minutes(i64::from(value))
}
