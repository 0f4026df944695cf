//! Ingestion services: fetch, filter, store

pub mod geo_filter;
pub mod http_fetch_client;
pub mod record_store;

pub use geo_filter::{contains, position_of, retain_in_box};
pub use http_fetch_client::{FetchClient, FetchError, RawEnvelope};
pub use record_store::{AppendOutcome, RecordStore};
