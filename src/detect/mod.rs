//! Detection wire types, the dispatch client, and the confidence filter.

pub mod client;
pub mod filter;
pub mod result;

pub use client::{DispatchError, HttpInferenceClient, InferenceClient};
pub use result::{Detection, DetectionBatch, Severity};
