pub mod accounts;
pub mod audit;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod schedules;
pub mod transactions;

pub use routes::create_router;
