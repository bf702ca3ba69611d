use serde::{Deserialize, Serialize};

use super::KubeletConfiguration;

/// User supplied kubelet settings that take precedence over the values derived from kubelet flags
///
/// Unset fields leave the flag derived value untouched. Empty strings are treated as unset.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomKubeletConfig {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub cpu_manager_policy: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub cpu_cfs_quota: Option<bool>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub cpu_cfs_quota_period: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub image_gc_high_threshold: Option<i32>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub image_gc_low_threshold: Option<i32>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub topology_manager_policy: Option<String>,

  /// An empty list clears any value derived from `--allowed-unsafe-sysctls`
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub allowed_unsafe_sysctls: Option<Vec<String>>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub fail_swap_on: Option<bool>,

  /// Rendered as `containerLogMaxSize: "<n>M"`
  #[serde(rename = "containerLogMaxSizeMB", default, skip_serializing_if = "Option::is_none")]
  pub container_log_max_size_mb: Option<i32>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub container_log_max_files: Option<i32>,

  /// Rendered as `podPidsLimit`
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub pod_max_pids: Option<i64>,
}

fn non_empty(value: &Option<String>) -> Option<String> {
  value.as_ref().filter(|v| !v.is_empty()).cloned()
}

impl CustomKubeletConfig {
  /// Override the fields of `config` with every value set here
  pub fn apply(&self, config: &mut KubeletConfiguration) {
    if let Some(policy) = non_empty(&self.cpu_manager_policy) {
      config.cpu_manager_policy = Some(policy);
    }
    if let Some(quota) = self.cpu_cfs_quota {
      config.cpu_cfs_quota = Some(quota);
    }
    if let Some(period) = non_empty(&self.cpu_cfs_quota_period) {
      config.cpu_cfs_quota_period = Some(period);
    }
    if let Some(threshold) = self.image_gc_high_threshold {
      config.image_gc_high_threshold_percent = Some(threshold);
    }
    if let Some(threshold) = self.image_gc_low_threshold {
      config.image_gc_low_threshold_percent = Some(threshold);
    }
    if let Some(policy) = non_empty(&self.topology_manager_policy) {
      config.topology_manager_policy = Some(policy);
    }
    if let Some(sysctls) = &self.allowed_unsafe_sysctls {
      config.allowed_unsafe_sysctls = (!sysctls.is_empty()).then(|| sysctls.clone());
    }
    if let Some(fail_swap_on) = self.fail_swap_on {
      config.fail_swap_on = Some(fail_swap_on);
    }
    if let Some(size) = self.container_log_max_size_mb {
      config.container_log_max_size = Some(format!("{size}M"));
    }
    if let Some(files) = self.container_log_max_files {
      config.container_log_max_files = Some(files);
    }
    if let Some(pids) = self.pod_max_pids {
      config.pod_pids_limit = Some(pids);
    }
  }
}
