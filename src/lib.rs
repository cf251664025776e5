//! HTTP load generator for a wallet operation endpoint.

pub mod check;
pub mod engine;
pub mod error;
pub mod generator;
pub mod logging;
pub mod metrics;
pub mod probe;
pub mod profile;
pub mod report;
pub mod request;
pub mod stub;
pub mod vu;
