pub mod config;
pub mod handlers;
pub mod observability;
pub mod server;

pub use server::{LtigateServer, ServerBuilder, build_app};
