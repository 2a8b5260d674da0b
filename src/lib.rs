pub mod app;
pub mod config;
pub mod cycle_times;
pub mod diagnostics;
pub mod error;
pub mod flatten;
pub mod fs_util;
pub mod merge;
pub mod node;
pub mod output;
pub mod reconcile;
pub mod record;
pub mod report;
pub mod run;
pub mod run_info;
pub mod run_parameters;
pub mod samplesheet;
pub mod statusdb;
