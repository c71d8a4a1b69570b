pub mod config;
pub mod handlers;
pub mod router;
pub mod server;
pub mod types;

pub use config::*;
pub use router::*;
pub use server::*;
pub use types::*;
