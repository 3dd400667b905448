#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unused_crate_dependencies)]

mod client;
mod error;
mod info;
mod players;
mod reader;
mod rules;
mod wire;

pub use client::QueryClient;
pub use error::{ParseError, QueryError};
