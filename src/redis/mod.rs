pub mod client;
pub mod config;
pub mod vcap;

pub use client::*;
pub use config::*;
pub use vcap::*;
