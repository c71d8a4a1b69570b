pub mod cf;
pub mod classify;
pub mod config;
pub mod envelope;
pub mod firehose;
pub mod sink;
pub mod tls;

pub use cf::*;
pub use classify::*;
pub use config::*;
pub use envelope::*;
pub use firehose::*;
pub use sink::*;
