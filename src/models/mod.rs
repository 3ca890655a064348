pub mod event;
pub mod pool;
pub mod reservation;
pub mod route;
pub mod vehicle;
