//! Core domain types and logic.

pub mod backtest;
pub mod benchmark;
pub mod calendar;
pub mod config_validation;
pub mod error;
pub mod execution;
pub mod metrics;
pub mod plan;
pub mod portfolio;
pub mod trade;
