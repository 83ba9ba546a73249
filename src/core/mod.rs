#![forbid(unsafe_code)]
#![allow(missing_docs)]

//! Core protocol primitives: signer addresses, signed observations, the
//! aggregation/quorum engine, configuration, price source, and persistence.

pub mod address;
pub mod config;
pub mod consensus;
pub mod observation;
pub mod persistence;
pub mod price;
