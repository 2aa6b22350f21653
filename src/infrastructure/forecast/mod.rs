pub mod csv_source;

pub use csv_source::{CsvForecastSource, read_series_csv};
