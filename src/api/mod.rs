pub mod client;
pub mod measure;

pub use client::{FliprClient, FliprError};
pub use measure::PoolMeasure;
