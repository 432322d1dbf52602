// Camera domain: printer addresses, connection states and stream sources.

pub mod backend;
pub mod error;
#[cfg(test)]
pub(crate) mod mock;
pub mod types;
