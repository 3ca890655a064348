use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::pool::{PoolId, PoolSnapshot};
use crate::models::reservation::{Reservation, ReservationKind, ReservationStatus, ReservationView};
use crate::models::vehicle::VehicleId;

#[derive(Debug, Default)]
pub struct ReservationBook {
    entries: DashMap<Uuid, Reservation>,
}

impl ReservationBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.value().status == ReservationStatus::Reserved)
            .count()
    }

    pub fn insert(&self, reservation: Reservation) {
        self.entries.insert(reservation.id, reservation);
    }

    pub fn get(&self, id: &Uuid) -> Option<Reservation> {
        self.entries.get(id).map(|entry| entry.value().clone())
    }

    pub fn view(&self, id: &Uuid, now: DateTime<Utc>) -> Option<ReservationView> {
        let reservation = self.get(id)?;
        let remaining = reservation.expires_at - now;

        Some(ReservationView {
            is_valid: now <= reservation.expires_at,
            expires_in: remaining.num_minutes().max(0),
            reservation,
        })
    }

    pub fn find_for_pool(&self, pool_id: PoolId) -> Option<Reservation> {
        self.entries
            .iter()
            .find(|entry| entry.value().pool_id() == Some(pool_id))
            .map(|entry| entry.value().clone())
    }

    pub fn mark_pool_started(&self, pool_id: PoolId) {
        for mut entry in self.entries.iter_mut() {
            if entry.pool_id() == Some(pool_id) && entry.status != ReservationStatus::Completed {
                entry.status = ReservationStatus::InProgress;
            }
        }
    }

    /// Closes out every open reservation on `vehicle_id` and returns how many
    /// were touched.
    pub fn complete_for_vehicle(&self, vehicle_id: VehicleId, now: DateTime<Utc>) -> usize {
        let mut completed = 0;
        for mut entry in self.entries.iter_mut() {
            if entry.vehicle_id == vehicle_id && entry.status != ReservationStatus::Completed {
                entry.status = ReservationStatus::Completed;
                entry.completed_at = Some(now);
                completed += 1;
            }
        }
        completed
    }

    /// Drops expired reservations that are neither completed nor underway,
    /// and completed ones older than `completed_retention`.
    pub fn prune_expired(&self, now: DateTime<Utc>, completed_retention: Duration) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, reservation| match reservation.completed_at {
            Some(completed_at) => now - completed_at < completed_retention,
            None => reservation.is_pinned() || !reservation.is_expired(now),
        });
        before.saturating_sub(self.entries.len())
    }
}

/// Group reservation recorded when a pool fills.
pub fn pool_reservation(pool: &PoolSnapshot, ttl: Duration, now: DateTime<Utc>) -> Option<Reservation> {
    let vehicle = pool.assigned_vehicle.clone()?;

    Some(Reservation {
        id: Uuid::new_v4(),
        vehicle_id: pool.vehicle_id,
        vehicle,
        status: ReservationStatus::Ready,
        kind: ReservationKind::Pool {
            pool_id: pool.id,
            destination: pool.destination.clone(),
            riders: pool.riders.clone(),
            optimized_route: pool.optimized_route.clone(),
            sync_state: pool.sync_state.clone(),
        },
        created_at: now,
        expires_at: now + ttl,
        completed_at: None,
    })
}
