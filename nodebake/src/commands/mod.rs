pub mod kubelet;
pub mod sysctl;

use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use tracing::info;

use crate::utils;

/// Read and deserialize an input file (JSON or YAML)
async fn read_input<T: DeserializeOwned>(path: &Path) -> Result<T> {
  let contents = tokio::fs::read_to_string(path)
    .await
    .with_context(|| format!("Unable to read {}", path.display()))?;

  utils::parse_input(&contents, path).with_context(|| format!("Unable to parse {}", path.display()))
}

/// Write the rendered file to `output`, or print it when no output path is given
fn emit(contents: &str, output: Option<&Path>) -> Result<()> {
  match output {
    Some(path) => {
      utils::write_file(contents.as_bytes(), path, Some(0o644))
        .with_context(|| format!("Unable to write {}", path.display()))?;
      info!("Wrote {}", path.display());
    }
    None => match contents.ends_with('\n') {
      true => print!("{contents}"),
      false => println!("{contents}"),
    },
  }

  Ok(())
}
