//! htsget ticket resolution and byte serving for indexed BAM, VCF and BCF.
//!
//! A ticket request flows through [`query`] (validation), [`storage`]
//! (locating the file and its index), [`index`] (cached index parsing via
//! [`formats`]), [`planner`] (byte ranges) and [`ticket`] (the JSON
//! response). Clients then fetch the ranges from the [`gateway`].

pub mod auth;
pub mod config;
pub mod error;
pub mod formats;
pub mod gateway;
pub mod handlers;
pub mod index;
pub mod planner;
pub mod query;
pub mod storage;
pub mod ticket;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
