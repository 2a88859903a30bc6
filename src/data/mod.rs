pub mod cache;
pub mod estimates;
pub mod geocoder;
pub mod order_api;
pub mod simulator;
pub mod types;

#[cfg(test)]
pub mod mock;
