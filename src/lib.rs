pub mod boulder;
pub mod cache;
pub mod config;
pub mod errors;
pub mod pipeline;
pub mod render;
pub mod sequence;
pub mod server;
pub mod workspace;
