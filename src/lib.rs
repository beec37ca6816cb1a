pub mod config;
pub mod data;
pub mod error;
pub mod report;
pub mod state;

pub use data::aggregate::{filter_aggregate, Aggregate};
pub use data::filter::Predicates;
pub use data::model::{Dataset, Record, Value};
pub use data::schema::{CanonicalField, Pollutant, RuleTable, SchemaMapping};
pub use error::DataError;
