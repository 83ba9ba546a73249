#![forbid(unsafe_code)]
#![allow(missing_docs)]

//! Signature aggregation and quorum/settlement.

pub mod aggregator;
