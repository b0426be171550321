mod api;
mod client;
mod error;

pub use api::VehicleApi;
pub use client::WebfleetClient;
pub use error::ApiError;
