pub mod booking;
pub mod coordinator;
pub mod directory;
pub mod pool;
pub mod registry;
pub mod reservations;
pub mod route;
pub mod sweep;
pub mod sync;
