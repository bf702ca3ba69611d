use std::{fs::OpenOptions, io::Write, os::unix::fs::OpenOptionsExt, path::Path};

use serde::de::DeserializeOwned;

use crate::Result;

/// Write a file to disk, replacing any prior contents and setting the file mode on creation
pub fn write_file<P: AsRef<Path>>(contents: &[u8], path: P, mode: Option<u32>) -> Result<()> {
  let mut file = OpenOptions::new()
    .write(true)
    .create(true)
    .truncate(true)
    .mode(mode.unwrap_or(0o644))
    .open(&path)?;
  file.write_all(contents)?;

  Ok(())
}

/// Deserialize the contents of an input file
///
/// Files ending in `.json` are parsed as JSON, everything else as YAML
pub fn parse_input<T: DeserializeOwned, P: AsRef<Path>>(contents: &str, path: P) -> Result<T> {
  let is_json = path
    .as_ref()
    .extension()
    .map(|ext| ext.eq_ignore_ascii_case("json"))
    .unwrap_or(false);

  match is_json {
    true => Ok(serde_json::from_str(contents)?),
    false => Ok(serde_yaml::from_str(contents)?),
  }
}
