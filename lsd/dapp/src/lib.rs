//! Staking orchestration core of the LSD dApp.
//!
//! The crate owns everything between a connected wallet and the
//! Stakehouse contracts: configuration, the wallet session, subgraph
//! reads, the staking SDK seam, deposit and keystore handling, and the
//! workflows that drive staking, funding, rewards, withdrawals, minting
//! and network administration. Rendering is left to the caller; the
//! [`cli`] module is the bundled read-only front end.
//!
//! The `mock` feature exposes scriptable doubles for the SDK, the
//! wallet signer, the subgraph and the proxy service.

pub mod cli;
pub mod config;
pub mod deposit;
pub mod error_map;
pub mod forms;
pub mod routes;
pub mod sdk;
pub mod services;
pub mod session;
pub mod subgraph;
pub mod telemetry;
pub mod tx_link;
pub mod validators;
pub mod workflows;

pub use config::{ConfigError, DappConfig};
pub use services::DappServices;
pub use session::Session;
