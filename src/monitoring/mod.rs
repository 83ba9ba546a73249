#![forbid(unsafe_code)]
#![allow(missing_docs)]

//! Observability: Prometheus metrics and the `/metrics` scrape endpoint.

pub mod http;
pub mod metrics;
