//! Synthesizes the node level configuration files consumed on Kubernetes worker nodes:
//! the kubelet configuration file, the kubelet command line, and the sysctl drop-in.

pub mod cli;
pub mod commands;
pub mod error;
pub mod kubelet;
pub mod sysctl;
pub mod utils;

pub use cli::{Cli, Commands};
pub use error::{Error, Result};
