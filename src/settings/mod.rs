// Persisted user preferences.

pub mod store;
pub mod types;
