//! Chat history and code block handling

pub mod cache;
pub mod parser;
pub mod patch;
