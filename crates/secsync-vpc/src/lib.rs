//! VPC API adapter for secsync
//!
//! Implements the secsync provider traits over a REST VPC API, so a
//! [`secsync::SecurityGroupSyncer`] can reconcile security groups there.
//!
//! # Requirements
//!
//! - `SECSYNC_API_ENDPOINT` and `SECSYNC_API_TOKEN` env vars, or an explicit
//!   [`VpcConfig`]
//! - Optional: `SECSYNC_REGION`, `SECSYNC_TIMEOUT_SECS`
//!
//! # Example
//!
//! ```ignore
//! use secsync::{SecurityGroupSyncer, SyncConfig};
//! use secsync_vpc::{VpcConfig, VpcProvider};
//!
//! let provider = VpcProvider::from_config(VpcConfig::from_env()?)?;
//! let syncer = SecurityGroupSyncer::new(provider, SyncConfig::default());
//!
//! let rules = vec!["in:allow 10.0.0.0/24 tcp 22".parse()?];
//! let result = syncer.sync("sg-123", &rules).await?;
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod provider;

pub use client::VpcClient;
pub use config::VpcConfig;
pub use error::{Result, VpcError};
pub use provider::VpcProvider;
