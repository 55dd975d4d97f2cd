pub mod handlers;
pub mod model;
pub mod validation;


pub use handlers::config;
