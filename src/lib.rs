pub mod cli;
pub mod error;
pub mod merge;
pub mod model;
pub mod parsers;
pub mod render;
pub mod report;
pub mod scheduler;
