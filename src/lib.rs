#![warn(
    rust_2024_compatibility,
    clippy::all,
    clippy::future_not_send,
    clippy::mod_module_files,
    clippy::needless_pass_by_ref_mut,
    clippy::unused_async
)]

pub mod config;
pub mod content_type;
pub mod cors;
pub mod edge;
pub mod error;
pub mod headers;
pub mod hotcache;
pub mod legacy;
pub mod npmrc;
pub mod origin;
pub mod proxy;
pub mod purge;
pub mod query;
pub mod resolver;
pub mod specifier;
pub mod storage;
pub mod target;
pub mod tasks;
pub mod tee;
