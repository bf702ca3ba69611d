use std::path::Path;

use super::{flags::CONFIG_FILE_FLAGS, KubeletFlags};
use crate::{utils, Result};

/// Environment file sourced by the kubelet systemd unit
pub const DEFAULTS_PATH: &str = "/etc/default/kubelet";

/// The kubelet command line rendered from a set of kubelet flags
#[derive(Debug, Default)]
pub struct KubeletArgs {
  flags: KubeletFlags,
}

impl KubeletArgs {
  /// Use every flag as given on the kubelet command line
  pub fn new(flags: &KubeletFlags) -> Self {
    Self { flags: flags.clone() }
  }

  /// Move the flags carried by the kubelet configuration file off of the command line,
  /// pointing the kubelet at the file with `--config` instead
  pub fn with_config_file(flags: &KubeletFlags, config_path: &str) -> Self {
    let mut flags: KubeletFlags = flags
      .iter()
      .filter(|(flag, _)| !CONFIG_FILE_FLAGS.contains(*flag))
      .collect();
    flags.insert("--config", config_path);

    Self { flags }
  }

  /// Space separated `--flag=value` tokens in flag name order, as used by `KUBELET_CONFIG`
  pub fn to_shell(&self) -> String {
    self
      .flags
      .iter()
      .map(|(flag, value)| format!("{flag}={value}"))
      .collect::<Vec<_>>()
      .join(" ")
  }

  /// The body of a PowerShell array literal, i.e. `"--a=b", "--c=d"`
  pub fn to_powershell(&self) -> String {
    self
      .flags
      .iter()
      .map(|(flag, value)| format!("\"{flag}={value}\""))
      .collect::<Vec<_>>()
      .join(", ")
  }

  pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
    let contents = format!("KUBELET_CONFIG={}\n", self.to_shell());
    utils::write_file(contents.as_bytes(), path, Some(0o644))
  }
}
