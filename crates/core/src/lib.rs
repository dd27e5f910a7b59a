//! Core library: enumeration, resume filtering, detection, the worker pool
//! and the checkpointed classification report.

pub mod aggregator;
pub mod archive;
pub mod config;
pub mod detector;
pub mod models;
pub mod pipeline;
pub mod pool;
pub mod report;
pub mod resume;
pub mod scanner;
pub mod video;
