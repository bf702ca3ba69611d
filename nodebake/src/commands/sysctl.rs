use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::warn;

use super::{emit, read_input};
use crate::sysctl::{self, CustomOsConfig, SYSCTL_PATH, SYSFS_ROOT};

#[derive(Args, Debug)]
pub struct SysctlConfigInput {
  /// File containing custom operating system settings (JSON or YAML)
  #[arg(long)]
  pub custom_os_config: Option<PathBuf>,

  /// Path to write the sysctl configuration file to, `/etc/sysctl.d/999-sysctl-nodebake.conf` when given without a value
  ///
  /// The file is printed to stdout when the flag is omitted
  #[arg(short, long, num_args = 0..=1, default_missing_value = SYSCTL_PATH)]
  pub output: Option<PathBuf>,

  /// Write the transparent huge page settings of the custom configuration to sysfs
  #[arg(long)]
  pub apply_thp: bool,

  /// Mount point of sysfs
  #[arg(long, default_value = SYSFS_ROOT)]
  pub sysfs_root: PathBuf,
}

impl SysctlConfigInput {
  async fn custom(&self) -> Result<Option<CustomOsConfig>> {
    match &self.custom_os_config {
      Some(path) => Ok(Some(read_input(path).await?)),
      None => Ok(None),
    }
  }

  pub async fn result(&self) -> Result<()> {
    let custom = self.custom().await?;
    emit(&sysctl::synthesize(custom.as_ref()), self.output.as_deref())?;

    if self.apply_thp {
      match &custom {
        Some(custom) => custom
          .apply_transparent_huge_pages(&self.sysfs_root)
          .await
          .context("Unable to apply transparent huge page settings")?,
        None => warn!("No custom OS configuration provided, skipping transparent huge pages"),
      }
    }

    Ok(())
  }
}
