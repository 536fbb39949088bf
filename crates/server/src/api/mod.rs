pub mod admin;
pub mod castings;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod printings;
pub mod routes;
pub mod tasks;
pub mod tokens;

pub use routes::create_router;
