pub mod config;
pub mod event;
pub mod outcome;
pub mod signal;
