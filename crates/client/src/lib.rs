//! HTTP client of the ledger service and the `ledger` command line.

pub mod config;
pub mod convert;
pub mod error;
mod http;
pub mod report;

pub use http::HttpLedger;
