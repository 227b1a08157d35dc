pub mod client;
pub mod dialect;
