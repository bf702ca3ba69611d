use std::{collections::BTreeMap, path::PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use super::{emit, read_input};
use crate::kubelet::{self, CustomKubeletConfig, KubeletArgs, KubeletFlags, CONFIG_PATH, DEFAULTS_PATH};

/// Parse a single `KEY=VALUE` kubelet flag from the command line
fn parse_flag(s: &str) -> std::result::Result<(String, String), String> {
  s.split_once('=')
    .map(|(flag, value)| (flag.to_string(), value.to_string()))
    .ok_or_else(|| format!("expected KEY=VALUE, found `{s}`"))
}

/// The kubelet flags a node is provisioned with
#[derive(Args, Debug, Default)]
pub struct FlagsInput {
  /// File containing a mapping of kubelet flag names to values (JSON or YAML)
  #[arg(long, env = "NODEBAKE_KUBELET_FLAGS_FILE")]
  pub flags_file: Option<PathBuf>,

  /// Kubelet flag, applied on top of the flags file (i.e. `--flag --max-pods=110`)
  #[arg(long = "flag", value_name = "KEY=VALUE", value_parser = parse_flag, allow_hyphen_values = true)]
  pub flags: Vec<(String, String)>,
}

impl FlagsInput {
  pub async fn load(&self) -> Result<KubeletFlags> {
    let mut flags = match &self.flags_file {
      Some(path) => {
        let values: BTreeMap<String, JsonValue> = read_input(path).await?;
        KubeletFlags::from_values(values).with_context(|| format!("Invalid kubelet flags in {}", path.display()))?
      }
      None => KubeletFlags::new(),
    };
    flags.extend(self.flags.iter().cloned());

    if flags.is_empty() {
      warn!("No kubelet flags provided");
    }
    debug!("Kubelet flags: {flags:#?}");

    Ok(flags)
  }
}

#[derive(Args, Debug)]
pub struct KubeletConfigInput {
  #[command(flatten)]
  pub input: FlagsInput,

  /// File containing custom kubelet settings which take precedence over the flags (JSON or YAML)
  #[arg(long)]
  pub custom_config: Option<PathBuf>,

  /// Path to write the kubelet configuration file to, `/etc/default/kubeletconfig.json` when given without a value
  ///
  /// The file is printed to stdout when the flag is omitted
  #[arg(short, long, num_args = 0..=1, default_missing_value = CONFIG_PATH)]
  pub output: Option<PathBuf>,
}

impl KubeletConfigInput {
  pub async fn synthesize(&self) -> Result<String> {
    let flags = self.input.load().await?;
    let custom: Option<CustomKubeletConfig> = match &self.custom_config {
      Some(path) => Some(read_input(path).await?),
      None => None,
    };

    Ok(kubelet::synthesize(&flags, custom.as_ref())?)
  }

  pub async fn result(&self) -> Result<()> {
    let contents = self.synthesize().await?;
    emit(&contents, self.output.as_deref())
  }
}

#[derive(Args, Debug)]
pub struct KubeletArgsInput {
  #[command(flatten)]
  pub input: FlagsInput,

  /// Replace the flags carried by the kubelet configuration file with `--config=<CONFIG_FILE>`
  #[arg(long, num_args = 0..=1, default_missing_value = CONFIG_PATH)]
  pub config_file: Option<String>,

  /// Render the flags as the body of a PowerShell array for Windows nodes
  #[arg(long, conflicts_with = "output")]
  pub powershell: bool,

  /// Path to write the kubelet environment file to, `/etc/default/kubelet` when given without a value
  ///
  /// The flags are printed to stdout when the flag is omitted
  #[arg(short, long, num_args = 0..=1, default_missing_value = DEFAULTS_PATH)]
  pub output: Option<PathBuf>,
}

impl KubeletArgsInput {
  pub async fn args(&self) -> Result<KubeletArgs> {
    let flags = self.input.load().await?;

    Ok(match &self.config_file {
      Some(path) => KubeletArgs::with_config_file(&flags, path),
      None => KubeletArgs::new(&flags),
    })
  }

  pub async fn result(&self) -> Result<()> {
    let args = self.args().await?;

    match (&self.output, self.powershell) {
      (Some(path), _) => {
        args
          .write(path)
          .with_context(|| format!("Unable to write {}", path.display()))?;
        info!("Wrote {}", path.display());
      }
      (None, true) => println!("{}", args.to_powershell()),
      (None, false) => println!("{}", args.to_shell()),
    }

    Ok(())
  }
}
