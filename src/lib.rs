pub mod config;
pub mod connection;
pub mod credentials;
pub mod errors;
pub mod models;
pub mod smoke;
pub mod store;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use connection::{Connector, FirestoreConnection};
pub use errors::ProbeError;
pub use smoke::{ConnectivitySmokeTest, SmokeTestOptions, SmokeTestReport};
pub use store::{DocumentStore, StoredDocument};
