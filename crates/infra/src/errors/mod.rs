//! Error conversions for infrastructure adapters.

mod conversions;

pub use conversions::InfraError;
