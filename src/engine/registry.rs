use crate::models::pool::{Pool, PoolId, PoolStatus};
use crate::models::vehicle::VehicleId;

/// Active pools in creation order.
#[derive(Debug, Default)]
pub struct PoolRegistry {
    pools: Vec<Pool>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatusCounts {
    pub waiting: usize,
    pub ready: usize,
    pub in_progress: usize,
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    pub fn insert(&mut self, pool: Pool) {
        self.pools.push(pool);
    }

    pub fn get(&self, id: PoolId) -> Option<&Pool> {
        self.pools.iter().find(|p| p.id() == id)
    }

    pub fn get_mut(&mut self, id: PoolId) -> Option<&mut Pool> {
        self.pools.iter_mut().find(|p| p.id() == id)
    }

    pub fn remove(&mut self, id: PoolId) -> Option<Pool> {
        let index = self.pools.iter().position(|p| p.id() == id)?;
        Some(self.pools.remove(index))
    }

    /// Oldest waiting pool for `destination_name` with a free seat.
    pub fn find_open(&self, destination_name: &str) -> Option<&Pool> {
        self.pools
            .iter()
            .find(|p| p.is_open() && p.destination().name == destination_name)
    }

    pub fn attached_to(&self, vehicle_id: VehicleId) -> Option<&Pool> {
        self.pools.iter().find(|p| p.vehicle_id() == vehicle_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pool> {
        self.pools.iter()
    }

    /// Removes every pool matching `discard` and hands them back.
    pub fn drain_where<F>(&mut self, mut discard: F) -> Vec<Pool>
    where
        F: FnMut(&Pool) -> bool,
    {
        let (drained, kept): (Vec<Pool>, Vec<Pool>) = std::mem::take(&mut self.pools)
            .into_iter()
            .partition(|p| discard(p));
        self.pools = kept;
        drained
    }

    pub fn status_counts(&self) -> StatusCounts {
        self.pools
            .iter()
            .fold(StatusCounts::default(), |mut counts, pool| {
                match pool.status() {
                    PoolStatus::Waiting => counts.waiting += 1,
                    PoolStatus::Ready => counts.ready += 1,
                    PoolStatus::InProgress => counts.in_progress += 1,
                }
                counts
            })
    }
}
