use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while synthesizing node configuration files
#[derive(Debug, Error)]
pub enum Error {
  /// A kubelet flag value cannot be converted to the type its configuration field requires
  #[error("invalid value {value:?} for kubelet flag {flag}: expected {expected}")]
  Parse {
    /// The dash-prefixed flag name (i.e. `--max-pods`)
    flag: String,
    /// The raw value as provided
    value: String,
    /// The type the value was expected to parse into
    expected: &'static str,
  },

  /// The input is structurally invalid
  #[error("invalid configuration for {key}: {reason}")]
  Schema { key: String, reason: String },

  #[error(transparent)]
  Json(#[from] serde_json::Error),

  #[error(transparent)]
  Yaml(#[from] serde_yaml::Error),

  #[error(transparent)]
  Io(#[from] std::io::Error),
}

impl Error {
  pub(crate) fn parse(flag: &str, value: &str, expected: &'static str) -> Self {
    Error::Parse {
      flag: flag.to_string(),
      value: value.to_string(),
      expected,
    }
  }
}
