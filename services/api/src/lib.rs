//! services/api/src/lib.rs
//!
//! The HTTP service of the digestive-health diagnostic: adapters for the core
//! ports, configuration, errors and the axum web layer.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
