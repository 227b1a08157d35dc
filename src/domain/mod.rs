pub mod changeset;
pub mod error;
pub mod fingerprint;
pub mod ports;
pub mod schema;
pub mod value_objects;
