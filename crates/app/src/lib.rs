pub mod config;
pub mod control;
pub mod ingest;
pub mod pipeline;
pub mod queue;
pub mod scope;
pub mod tone;
