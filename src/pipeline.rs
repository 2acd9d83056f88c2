pub mod config;
pub mod context;
pub mod filter;
pub mod stream;
pub mod transform;
