//! Bayesian MilkBot fitting: request/response shapes and priors.
//!
//! The HTTP transport lives outside this crate behind [`BayesianFitter`];
//! everything needed to build a request and read a response is here.

pub mod priors;
pub mod request;

pub use priors::*;
pub use request::*;
