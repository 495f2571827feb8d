//! SEPPE delivery dashboard: data service client, filter/query builder,
//! aggregation, CSV export and spreadsheet upload jobs.
pub mod aggregate;
pub mod client;
pub mod config;
pub mod error;
pub mod export;
pub mod filters;
pub mod import;
pub mod logging;
pub mod session;
pub mod status;
pub mod table;
pub mod types;
pub mod upload;
pub mod util;
