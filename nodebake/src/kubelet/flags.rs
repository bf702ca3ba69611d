use std::{collections::BTreeMap, str::FromStr};

use phf::phf_set;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::warn;

use crate::{Error, Result};

/// Flags that are carried by the kubelet configuration file
///
/// When a configuration file is in use, these are removed from the kubelet command line
pub(crate) static CONFIG_FILE_FLAGS: phf::Set<&'static str> = phf_set! {
  "--address",
  "--allowed-unsafe-sysctls",
  "--anonymous-auth",
  "--authentication-token-webhook",
  "--authorization-mode",
  "--cgroups-per-qos",
  "--client-ca-file",
  "--cluster-dns",
  "--cluster-domain",
  "--container-log-max-files",
  "--container-log-max-size",
  "--cpu-cfs-quota",
  "--cpu-cfs-quota-period",
  "--enforce-node-allocatable",
  "--event-qps",
  "--eviction-hard",
  "--fail-swap-on",
  "--feature-gates",
  "--image-gc-high-threshold",
  "--image-gc-low-threshold",
  "--kube-reserved",
  "--max-pods",
  "--node-status-update-frequency",
  "--pod-manifest-path",
  "--pod-max-pids",
  "--protect-kernel-defaults",
  "--read-only-port",
  "--resolv-conf",
  "--rotate-certificates",
  "--streaming-connection-idle-timeout",
  "--system-reserved",
  "--tls-cert-file",
  "--tls-cipher-suites",
  "--tls-private-key-file",
};

/// Kubelet command line flags keyed by their dash-prefixed name (i.e. `--max-pods`)
///
/// Values are kept as the raw strings the kubelet would receive on its command line and
/// only converted into typed values when the configuration file is synthesized
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KubeletFlags(BTreeMap<String, String>);

impl KubeletFlags {
  pub fn new() -> Self {
    Self::default()
  }

  /// Build the flags from a deserialized mapping where values may be any scalar
  ///
  /// Numbers and booleans are accepted as a convenience for YAML input; nested values are rejected
  pub fn from_values(values: BTreeMap<String, JsonValue>) -> Result<Self> {
    let mut flags = Self::new();
    for (key, value) in values {
      let value = match value {
        JsonValue::String(s) => s,
        JsonValue::Number(n) => n.to_string(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Null => {
          return Err(Error::Schema {
            key,
            reason: "flag value must not be null".to_string(),
          })
        }
        JsonValue::Array(_) | JsonValue::Object(_) => {
          return Err(Error::Schema {
            key,
            reason: "flag value must be a string, number, or boolean".to_string(),
          })
        }
      };
      flags.insert(key, value);
    }

    Ok(flags)
  }

  /// Insert a flag, normalizing the name to carry the leading `--`
  pub fn insert<K: Into<String>, V: Into<String>>(&mut self, flag: K, value: V) -> Option<String> {
    let flag = flag.into();
    let flag = match flag.starts_with("--") {
      true => flag,
      false => format!("--{}", flag.trim_start_matches('-')),
    };

    self.0.insert(flag, value.into())
  }

  pub fn get(&self, flag: &str) -> Option<&str> {
    self.0.get(flag).map(String::as_str)
  }

  /// Iterate over the flags in lexicographic order of their names
  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  /// Flags the kubelet configuration file does not carry
  pub fn unrecognized(&self) -> impl Iterator<Item = &str> {
    self.0.keys().map(String::as_str).filter(|k| !CONFIG_FILE_FLAGS.contains(*k))
  }

  /// An empty value leaves the field unset
  pub(crate) fn string(&self, flag: &str) -> Option<String> {
    self.get(flag).filter(|value| !value.is_empty()).map(str::to_string)
  }

  /// Parse a `true`/`false` flag value
  pub(crate) fn boolean(&self, flag: &str) -> Result<Option<bool>> {
    self
      .get(flag)
      .map(|value| value.parse::<bool>().map_err(|_| Error::parse(flag, value, "boolean")))
      .transpose()
  }

  /// Parse an integer flag value
  pub(crate) fn integer<T: FromStr>(&self, flag: &str) -> Result<Option<T>> {
    self
      .get(flag)
      .map(|value| value.parse::<T>().map_err(|_| Error::parse(flag, value, "integer")))
      .transpose()
  }

  /// Split a comma separated flag value into a list, preserving order
  ///
  /// An empty value yields no list at all
  pub(crate) fn list(&self, flag: &str) -> Option<Vec<String>> {
    match self.get(flag) {
      Some(value) if !value.is_empty() => Some(value.split(',').map(str::to_string).collect()),
      _ => None,
    }
  }

  /// Split a comma separated list of `<key><separator><value>` pairs into a mapping
  ///
  /// Keys and values are trimmed of surrounding whitespace. Later duplicate keys overwrite earlier ones.
  /// Pairs without the separator are skipped, and a value without any pairs yields no mapping at all.
  pub(crate) fn key_values(&self, flag: &str, separator: char) -> Option<BTreeMap<String, String>> {
    let value = self.get(flag)?;
    let mut map = BTreeMap::new();

    for pair in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
      match pair.split_once(separator) {
        Some((key, val)) => {
          map.insert(key.trim().to_string(), val.trim().to_string());
        }
        None => warn!("Skipping malformed entry {pair:?} in {flag}, expected key{separator}value"),
      }
    }

    (!map.is_empty()).then_some(map)
  }

  /// Parse a comma separated list of `Feature=bool` pairs
  pub(crate) fn feature_gates(&self, flag: &str) -> Result<Option<BTreeMap<String, bool>>> {
    let Some(pairs) = self.key_values(flag, '=') else {
      return Ok(None);
    };

    pairs
      .into_iter()
      .map(|(gate, enabled)| match enabled.parse::<bool>() {
        Ok(enabled) => Ok((gate, enabled)),
        Err(_) => Err(Error::parse(flag, &format!("{gate}={enabled}"), "boolean")),
      })
      .collect::<Result<BTreeMap<_, _>>>()
      .map(Some)
  }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for KubeletFlags {
  fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
    let mut flags = Self::new();
    for (k, v) in iter {
      flags.insert(k, v);
    }
    flags
  }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for KubeletFlags {
  fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
    for (k, v) in iter {
      self.insert(k, v);
    }
  }
}

#[cfg(test)]
mod tests {
  use rstest::*;
  use serde_json::json;

  use super::*;

  fn flags(pairs: &[(&str, &str)]) -> KubeletFlags {
    pairs.iter().copied().collect()
  }

  #[rstest]
  #[case("true", Some(true))]
  #[case("false", Some(false))]
  fn it_parses_booleans(#[case] value: &str, #[case] expected: Option<bool>) {
    let flags = flags(&[("--rotate-certificates", value)]);
    assert_eq!(flags.boolean("--rotate-certificates").unwrap(), expected);
  }

  #[rstest]
  #[case("yes")]
  #[case("True")]
  #[case("1")]
  #[case("")]
  fn it_rejects_malformed_booleans(#[case] value: &str) {
    let flags = flags(&[("--protect-kernel-defaults", value)]);
    let err = flags.boolean("--protect-kernel-defaults").unwrap_err();

    match err {
      Error::Parse { flag, value: raw, expected } => {
        assert_eq!(flag, "--protect-kernel-defaults");
        assert_eq!(raw, value);
        assert_eq!(expected, "boolean");
      }
      _ => panic!("unexpected error: {err:?}"),
    }
  }

  #[test]
  fn it_parses_integers() {
    let flags = flags(&[("--max-pods", "110"), ("--pod-max-pids", "-1")]);
    assert_eq!(flags.integer::<i32>("--max-pods").unwrap(), Some(110));
    assert_eq!(flags.integer::<i64>("--pod-max-pids").unwrap(), Some(-1));
    assert_eq!(flags.integer::<i32>("--event-qps").unwrap(), None);
  }

  #[rstest]
  #[case("eleven")]
  #[case("1.5")]
  #[case("")]
  fn it_rejects_malformed_integers(#[case] value: &str) {
    let flags = flags(&[("--max-pods", value)]);
    let err = flags.integer::<i32>("--max-pods").unwrap_err();
    assert_eq!(
      err.to_string(),
      format!("invalid value {value:?} for kubelet flag --max-pods: expected integer")
    );
  }

  #[test]
  fn it_splits_lists_in_order() {
    let flags = flags(&[("--cluster-dns", "10.0.0.10,10.0.0.11"), ("--enforce-node-allocatable", "")]);
    assert_eq!(
      flags.list("--cluster-dns"),
      Some(vec!["10.0.0.10".to_string(), "10.0.0.11".to_string()])
    );
    assert_eq!(flags.list("--enforce-node-allocatable"), None);
    assert_eq!(flags.list("--tls-cipher-suites"), None);
  }

  #[test]
  fn it_splits_eviction_thresholds_on_less_than() {
    let flags = flags(&[("--eviction-hard", "memory.available<750Mi,nodefs.available<10%")]);
    let expected = BTreeMap::from([
      ("memory.available".to_string(), "750Mi".to_string()),
      ("nodefs.available".to_string(), "10%".to_string()),
    ]);
    assert_eq!(flags.key_values("--eviction-hard", '<'), Some(expected));
  }

  #[test]
  fn it_skips_pairs_without_separator() {
    let flags = flags(&[("--system-reserved", "cpu=2,memory,ephemeral-storage=1Gi")]);
    let expected = BTreeMap::from([
      ("cpu".to_string(), "2".to_string()),
      ("ephemeral-storage".to_string(), "1Gi".to_string()),
    ]);
    assert_eq!(flags.key_values("--system-reserved", '='), Some(expected));
  }

  #[test]
  fn it_trims_whitespace_around_pairs() {
    let flags = flags(&[
      ("--system-reserved", "cpu=2, memory=1Gi ,ephemeral-storage = 1Gi"),
      ("--feature-gates", "Foo=true, Bar=false"),
    ]);
    let expected = BTreeMap::from([
      ("cpu".to_string(), "2".to_string()),
      ("ephemeral-storage".to_string(), "1Gi".to_string()),
      ("memory".to_string(), "1Gi".to_string()),
    ]);
    assert_eq!(flags.key_values("--system-reserved", '='), Some(expected));

    let expected = BTreeMap::from([("Bar".to_string(), false), ("Foo".to_string(), true)]);
    assert_eq!(flags.feature_gates("--feature-gates").unwrap(), Some(expected));
  }

  #[rstest]
  #[case("")]
  #[case(",")]
  #[case(" , ")]
  #[case("memory")]
  fn it_yields_no_mapping_without_pairs(#[case] value: &str) {
    let flags = flags(&[("--eviction-hard", value), ("--feature-gates", value)]);
    assert_eq!(flags.key_values("--eviction-hard", '<'), None);
    assert_eq!(flags.feature_gates("--feature-gates").unwrap(), None);
  }

  #[test]
  fn it_leaves_empty_strings_unset() {
    let flags = flags(&[("--address", ""), ("--cluster-domain", "cluster.local")]);
    assert_eq!(flags.string("--address"), None);
    assert_eq!(flags.string("--cluster-domain").as_deref(), Some("cluster.local"));
  }

  #[test]
  fn it_overwrites_duplicate_feature_gates() {
    let flags = flags(&[("--feature-gates", "Foo=true,Bar=false,Foo=false")]);
    let expected = BTreeMap::from([("Bar".to_string(), false), ("Foo".to_string(), false)]);
    assert_eq!(flags.feature_gates("--feature-gates").unwrap(), Some(expected));
  }

  #[test]
  fn it_rejects_non_boolean_feature_gates() {
    let flags = flags(&[("--feature-gates", "Foo=enabled")]);
    let err = flags.feature_gates("--feature-gates").unwrap_err();
    assert!(matches!(err, Error::Parse { ref value, .. } if value == "Foo=enabled"));
  }

  #[test]
  fn it_normalizes_flag_names() {
    let mut flags = KubeletFlags::new();
    flags.insert("max-pods", "110");
    flags.insert("-v", "2");
    assert_eq!(flags.get("--max-pods"), Some("110"));
    assert_eq!(flags.get("--v"), Some("2"));
  }

  #[test]
  fn it_stringifies_scalar_values() {
    let values = BTreeMap::from([
      ("--max-pods".to_string(), json!(110)),
      ("--rotate-certificates".to_string(), json!(true)),
      ("--cluster-domain".to_string(), json!("cluster.local")),
    ]);
    let flags = KubeletFlags::from_values(values).unwrap();
    assert_eq!(flags.get("--max-pods"), Some("110"));
    assert_eq!(flags.get("--rotate-certificates"), Some("true"));
    assert_eq!(flags.get("--cluster-domain"), Some("cluster.local"));
  }

  #[rstest]
  #[case(json!(null))]
  #[case(json!(["a", "b"]))]
  #[case(json!({"cpu": "2"}))]
  fn it_rejects_nested_values(#[case] value: JsonValue) {
    let values = BTreeMap::from([("--system-reserved".to_string(), value)]);
    let err = KubeletFlags::from_values(values).unwrap_err();
    assert!(matches!(err, Error::Schema { ref key, .. } if key == "--system-reserved"));
  }

  #[test]
  fn it_lists_unrecognized_flags() {
    let flags = flags(&[("--max-pods", "110"), ("--node-labels", "a=b"), ("--v", "2")]);
    let unrecognized: Vec<_> = flags.unrecognized().collect();
    assert_eq!(unrecognized, vec!["--node-labels", "--v"]);
  }
}
