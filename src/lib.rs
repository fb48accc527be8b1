// Library for tests to access modules

pub mod accounting;
pub mod collector;
pub mod config;
pub mod error;
pub mod models;
pub mod normalizer;
pub mod report;
pub mod scheduler_repo;
pub mod snapshot_repo;
pub mod timeseries;
pub mod version;
pub mod worker;
