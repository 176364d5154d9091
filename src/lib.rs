pub mod config;
pub mod db;
pub mod edit;
pub mod format;
pub mod input;
pub mod model;
pub mod pipeline;
pub mod session;
pub mod storage;
pub mod wizard;
