use std::{collections::BTreeMap, path::Path};

use phf::phf_ordered_map;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::Result;

/// Drop-in loaded by `sysctl --system` on boot
pub const SYSCTL_PATH: &str = "/etc/sysctl.d/999-sysctl-nodebake.conf";

/// Default sysfs mount point holding the transparent huge page settings
pub const SYSFS_ROOT: &str = "/sys";

const TRANSPARENT_HUGEPAGE_DIR: &str = "kernel/mm/transparent_hugepage";

/// Network tuning applied to every node, in the order it is written out
static BASELINE: phf::OrderedMap<&'static str, &'static str> = phf_ordered_map! {
  "net.core.somaxconn" => "16384",
  "net.ipv4.ip_local_port_range" => "32768 60999",
  "net.ipv4.tcp_tw_reuse" => "1",
  "net.core.message_burst" => "80",
  "net.core.message_cost" => "40",
  "net.ipv4.neigh.default.gc_thresh1" => "4096",
  "net.ipv4.neigh.default.gc_thresh2" => "8192",
  "net.ipv4.neigh.default.gc_thresh3" => "16384",
  "net.ipv4.tcp_max_syn_backlog" => "16384",
  "net.ipv4.tcp_retries2" => "8",
};

/// User supplied operating system tuning for a node
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomOsConfig {
  /// Sysctl key/value overrides, i.e. `net.core.somaxconn: "32768"`
  #[serde(default)]
  pub sysctls: BTreeMap<String, String>,

  /// Value for `/sys/kernel/mm/transparent_hugepage/enabled` (`always`, `madvise`, `never`)
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub transparent_huge_page_enabled: Option<String>,

  /// Value for `/sys/kernel/mm/transparent_hugepage/defrag`
  /// (`always`, `defer`, `defer+madvise`, `madvise`, `never`)
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub transparent_huge_page_defrag: Option<String>,
}

impl CustomOsConfig {
  /// The transparent huge page settings that are set, as (sysfs file name, value) pairs
  ///
  /// These are not sysctls and never appear in the sysctl file
  pub fn transparent_huge_pages(&self) -> Vec<(&'static str, &str)> {
    [
      ("enabled", &self.transparent_huge_page_enabled),
      ("defrag", &self.transparent_huge_page_defrag),
    ]
    .into_iter()
    .filter_map(|(name, value)| match value.as_deref() {
      Some(value) if !value.is_empty() => Some((name, value)),
      _ => None,
    })
    .collect()
  }

  /// Write the transparent huge page settings under the given sysfs mount point
  pub async fn apply_transparent_huge_pages<P: AsRef<Path>>(&self, sysfs_root: P) -> Result<()> {
    let dir = sysfs_root.as_ref().join(TRANSPARENT_HUGEPAGE_DIR);

    for (name, value) in self.transparent_huge_pages() {
      let path = dir.join(name);
      info!("Setting {} to {value}", path.display());
      tokio::fs::write(&path, value).await?;
    }

    Ok(())
  }
}

/// Render the sysctl configuration file
///
/// Baseline keys keep their position even when overridden. Keys that are not part of the
/// baseline follow it in lexicographic order.
pub fn synthesize(custom: Option<&CustomOsConfig>) -> String {
  let overrides = custom.map(|c| &c.sysctls);
  let mut contents = String::new();

  for (key, default) in BASELINE.entries() {
    let value = match overrides.and_then(|o| o.get(*key)) {
      Some(value) => {
        debug!("Overriding sysctl {key}={default} with {value}");
        value.as_str()
      }
      None => *default,
    };
    contents.push_str(&format!("{key}={value}\n"));
  }

  if let Some(overrides) = overrides {
    for (key, value) in overrides.iter().filter(|(k, _)| !BASELINE.contains_key(k.as_str())) {
      contents.push_str(&format!("{key}={value}\n"));
    }
  }

  contents
}

#[cfg(test)]
mod tests {
  use std::fs;

  use tempfile::tempdir;

  use super::*;

  fn lines(contents: &str) -> Vec<&str> {
    contents.lines().collect()
  }

  fn custom(sysctls: &[(&str, &str)]) -> CustomOsConfig {
    CustomOsConfig {
      sysctls: sysctls.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
      ..Default::default()
    }
  }

  #[test]
  fn it_renders_baseline() {
    insta::assert_snapshot!(synthesize(None));
  }

  #[test]
  fn it_renders_baseline_for_matching_overrides() {
    let mut config = custom(&[
      ("net.core.somaxconn", "16384"),
      ("net.ipv4.tcp_tw_reuse", "1"),
      ("net.ipv4.ip_local_port_range", "32768 60999"),
    ]);
    config.transparent_huge_page_enabled = Some("never".to_string());
    config.transparent_huge_page_defrag = Some("defer+madvise".to_string());

    assert_eq!(synthesize(Some(&config)), synthesize(None));
  }

  #[test]
  fn it_overrides_in_place() {
    let config = custom(&[("net.ipv4.tcp_retries2", "5"), ("net.core.message_burst", "120")]);
    let contents = synthesize(Some(&config));
    let lines = lines(&contents);

    assert_eq!(lines.len(), BASELINE.len());
    assert_eq!(lines[3], "net.core.message_burst=120");
    assert_eq!(lines[9], "net.ipv4.tcp_retries2=5");

    let baseline = synthesize(None);
    for (overridden, original) in lines.iter().zip(baseline.lines()) {
      assert_eq!(overridden.split('=').next(), original.split('=').next());
    }
  }

  #[test]
  fn it_appends_new_keys_sorted() {
    let config = custom(&[
      ("vm.max_map_count", "262144"),
      ("net.core.somaxconn", "32768"),
      ("fs.inotify.max_user_watches", "1048576"),
    ]);
    let contents = synthesize(Some(&config));
    let lines = lines(&contents);

    assert_eq!(lines.len(), BASELINE.len() + 2);
    assert_eq!(lines[0], "net.core.somaxconn=32768");
    assert_eq!(
      &lines[BASELINE.len()..],
      &["fs.inotify.max_user_watches=1048576", "vm.max_map_count=262144"]
    );
  }

  #[test]
  fn it_ends_every_line_with_newline() {
    let contents = synthesize(Some(&custom(&[("kernel.pid_max", "4194304")])));
    assert!(contents.ends_with("kernel.pid_max=4194304\n"));
    assert!(!contents.contains("\n\n"));
  }

  #[test]
  fn it_lists_transparent_huge_pages() {
    let config = CustomOsConfig {
      transparent_huge_page_enabled: Some("never".to_string()),
      transparent_huge_page_defrag: Some(String::new()),
      ..Default::default()
    };
    assert_eq!(config.transparent_huge_pages(), vec![("enabled", "never")]);
    assert!(CustomOsConfig::default().transparent_huge_pages().is_empty());
  }

  #[tokio::test]
  async fn it_applies_transparent_huge_pages() {
    let root = tempdir().unwrap();
    let dir = root.path().join(TRANSPARENT_HUGEPAGE_DIR);
    fs::create_dir_all(&dir).unwrap();

    let config = CustomOsConfig {
      transparent_huge_page_enabled: Some("madvise".to_string()),
      transparent_huge_page_defrag: Some("defer+madvise".to_string()),
      ..Default::default()
    };
    config.apply_transparent_huge_pages(root.path()).await.unwrap();

    assert_eq!(fs::read_to_string(dir.join("enabled")).unwrap(), "madvise");
    assert_eq!(fs::read_to_string(dir.join("defrag")).unwrap(), "defer+madvise");
  }

  #[test]
  fn it_deserializes_cluster_spec_keys() {
    let yaml = r#"
sysctls:
  net.core.somaxconn: "32768"
transparentHugePageEnabled: never
transparentHugePageDefrag: defer+madvise
"#;
    let config: CustomOsConfig = serde_yaml::from_str(yaml).unwrap();

    assert_eq!(config.sysctls.get("net.core.somaxconn").map(String::as_str), Some("32768"));
    assert_eq!(config.transparent_huge_page_enabled.as_deref(), Some("never"));
    assert_eq!(config.transparent_huge_page_defrag.as_deref(), Some("defer+madvise"));
  }
}
