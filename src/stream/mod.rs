pub mod client;
pub mod manager;
pub mod parser;
pub mod sse;
