pub mod artifacts;
pub mod forecast;
pub mod observability;
pub mod persistence;
pub mod repositories;

pub use repositories::{InMemorySeriesStore, StaticForecastSource};
