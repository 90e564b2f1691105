pub mod policy;
mod server;

pub use policy::{PolicyKey, PolicySet};
pub use server::ServerConfig;
