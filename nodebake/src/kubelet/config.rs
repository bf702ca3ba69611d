use std::{collections::BTreeMap, fs::File, io::BufReader, path::Path};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::KubeletFlags;
use crate::{utils, Result};

/// Location the provisioning scripts point `kubelet --config` at
pub const CONFIG_PATH: &str = "/etc/default/kubeletconfig.json";

pub const KIND: &str = "KubeletConfiguration";
pub const API_VERSION: &str = "kubelet.config.k8s.io/v1beta1";

const AUTHN_WEBHOOK_CACHE_TTL: &str = "2m0s";
const AUTHZ_WEBHOOK_CACHE_AUTHORIZED_TTL: &str = "5m0s";
const AUTHZ_WEBHOOK_CACHE_UNAUTHORIZED_TTL: &str = "30s";

/// KubeletConfiguration contains the configuration for the Kubelet
///
/// Fields serialize in declaration order, which is the order the kubelet v1beta1 API declares them.
/// That order is stable so that rendered files can be compared byte for byte.
///
/// https://kubernetes.io/docs/tasks/administer-cluster/kubelet-config-file/
/// https://kubernetes.io/docs/reference/config-api/kubelet-config.v1beta1/
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubeletConfiguration {
  /// Kind is a string value representing the REST resource this object represents.
  pub kind: String,

  /// APIVersion defines the versioned schema of this representation of an object.
  pub api_version: String,

  /// staticPodPath is the path to the directory containing local (static) pods to
  /// run, or the path to a single static pod file.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub static_pod_path: Option<String>,

  /// address is the IP address for the Kubelet to serve on (set to 0.0.0.0
  /// for all interfaces).
  #[serde(skip_serializing_if = "Option::is_none")]
  pub address: Option<String>,

  /// readOnlyPort is the read-only port for the Kubelet to serve on with
  /// no authentication/authorization. 0 disables the read-only service.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub read_only_port: Option<i32>,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub tls_cert_file: Option<String>,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub tls_private_key_file: Option<String>,

  /// tlsCipherSuites is the list of allowed cipher suites for the server.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub tls_cipher_suites: Option<Vec<String>>,

  /// rotateCertificates enables client certificate rotation.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub rotate_certificates: Option<bool>,

  /// authentication specifies how requests to the Kubelet's server are authenticated.
  pub authentication: Authentication,

  /// authorization specifies how requests to the Kubelet's server are authorized.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub authorization: Option<Authorization>,

  /// eventRecordQPS is the maximum event creations per second. If 0, there
  /// is no limit enforced.
  #[serde(rename = "eventRecordQPS", skip_serializing_if = "Option::is_none")]
  pub event_record_qps: Option<i32>,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub cluster_domain: Option<String>,

  /// clusterDNS is a list of IP addresses for the cluster DNS server.
  #[serde(rename = "clusterDNS", skip_serializing_if = "Option::is_none")]
  pub cluster_dns: Option<Vec<String>>,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub streaming_connection_idle_timeout: Option<String>,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub node_status_update_frequency: Option<String>,

  /// imageGCHighThresholdPercent is the percent of disk usage after which
  /// image garbage collection is always run.
  #[serde(rename = "imageGCHighThresholdPercent", skip_serializing_if = "Option::is_none")]
  pub image_gc_high_threshold_percent: Option<i32>,

  /// imageGCLowThresholdPercent is the percent of disk usage before which
  /// image garbage collection is never run.
  #[serde(rename = "imageGCLowThresholdPercent", skip_serializing_if = "Option::is_none")]
  pub image_gc_low_threshold_percent: Option<i32>,

  /// cgroupsPerQOS enable QoS based CGroup hierarchy.
  #[serde(rename = "cgroupsPerQOS", skip_serializing_if = "Option::is_none")]
  pub cgroups_per_qos: Option<bool>,

  /// cpuManagerPolicy is the name of the CPU manager policy to use.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub cpu_manager_policy: Option<String>,

  /// topologyManagerPolicy is the name of the topology manager policy to use
  /// (`restricted`, `best-effort`, `none` or `single-numa-node`).
  #[serde(skip_serializing_if = "Option::is_none")]
  pub topology_manager_policy: Option<String>,

  /// maxPods is the maximum number of Pods that can run on this Kubelet.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub max_pods: Option<i32>,

  /// podPidsLimit is the maximum number of PIDs in any pod. -1 means unlimited.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub pod_pids_limit: Option<i64>,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub resolv_conf: Option<String>,

  /// cpuCFSQuota enables CPU CFS quota enforcement for containers that
  /// specify CPU limits.
  #[serde(rename = "cpuCFSQuota", skip_serializing_if = "Option::is_none")]
  pub cpu_cfs_quota: Option<bool>,

  /// cpuCFSQuotaPeriod is the CPU CFS quota period value, `cpu.cfs_period_us`.
  #[serde(rename = "cpuCFSQuotaPeriod", skip_serializing_if = "Option::is_none")]
  pub cpu_cfs_quota_period: Option<String>,

  /// evictionHard is a map of signal names to quantities that defines hard eviction
  /// thresholds. For example: `{"memory.available": "300Mi"}`.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub eviction_hard: Option<BTreeMap<String, String>>,

  /// protectKernelDefaults, if true, causes the Kubelet to error if kernel
  /// flags are not as it expects.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub protect_kernel_defaults: Option<bool>,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub feature_gates: Option<BTreeMap<String, bool>>,

  /// failSwapOn tells the Kubelet to fail to start if swap is enabled on the node.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub fail_swap_on: Option<bool>,

  /// containerLogMaxSize is a quantity defining the maximum size of the container log
  /// file before it is rotated. For example: "5Mi" or "256Ki".
  #[serde(skip_serializing_if = "Option::is_none")]
  pub container_log_max_size: Option<String>,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub container_log_max_files: Option<i32>,

  /// systemReserved is a set of ResourceName=ResourceQuantity (e.g. cpu=200m,memory=150G)
  /// pairs that describe resources reserved for non-kubernetes components.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub system_reserved: Option<BTreeMap<String, String>>,

  /// kubeReserved is a set of ResourceName=ResourceQuantity (e.g. cpu=200m,memory=150G) pairs
  /// that describe resources reserved for kubernetes system components.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub kube_reserved: Option<BTreeMap<String, String>>,

  /// The Node Allocatable enforcements the Kubelet performs
  /// (`none`, `pods`, `system-reserved` and `kube-reserved`).
  #[serde(skip_serializing_if = "Option::is_none")]
  pub enforce_node_allocatable: Option<Vec<String>>,

  /// A whitelist of unsafe sysctls or sysctl patterns (ending in `*`).
  /// For example: "`kernel.msg*,net.ipv4.route.min_pmtu`"
  #[serde(skip_serializing_if = "Option::is_none")]
  pub allowed_unsafe_sysctls: Option<Vec<String>>,
}

impl KubeletConfiguration {
  pub fn new() -> Self {
    KubeletConfiguration {
      kind: KIND.to_string(),
      api_version: API_VERSION.to_string(),
      ..KubeletConfiguration::default()
    }
  }

  /// Translate kubelet command line flags into their configuration file equivalents
  ///
  /// Flags that are absent leave their field unset; unknown flags are ignored
  pub fn from_flags(flags: &KubeletFlags) -> Result<Self> {
    for flag in flags.unrecognized() {
      debug!("Ignoring kubelet flag {flag} which has no configuration file equivalent");
    }

    let authorization = flags.string("--authorization-mode").map(|mode| {
      let webhook = (mode == "Webhook").then(|| AuthzWebhook {
        cache_authorized_ttl: AUTHZ_WEBHOOK_CACHE_AUTHORIZED_TTL.to_string(),
        cache_unauthorized_ttl: AUTHZ_WEBHOOK_CACHE_UNAUTHORIZED_TTL.to_string(),
      });
      Authorization { mode, webhook }
    });

    let webhook = match flags.boolean("--authentication-token-webhook")? {
      Some(true) => Some(AuthnWebhook {
        enabled: true,
        cache_ttl: AUTHN_WEBHOOK_CACHE_TTL.to_string(),
      }),
      _ => None,
    };

    let authentication = Authentication {
      x509: flags
        .string("--client-ca-file")
        .map(|client_ca_file| AuthnX509 { client_ca_file }),
      webhook,
      anonymous: AuthnAnonymous {
        // `false` is the kubelet default and is left out
        enabled: flags.boolean("--anonymous-auth")?.filter(|enabled| *enabled),
      },
    };

    Ok(KubeletConfiguration {
      static_pod_path: flags.string("--pod-manifest-path"),
      address: flags.string("--address"),
      read_only_port: flags.integer("--read-only-port")?,
      tls_cert_file: flags.string("--tls-cert-file"),
      tls_private_key_file: flags.string("--tls-private-key-file"),
      tls_cipher_suites: flags.list("--tls-cipher-suites"),
      rotate_certificates: flags.boolean("--rotate-certificates")?,
      authentication,
      authorization,
      event_record_qps: flags.integer("--event-qps")?,
      cluster_domain: flags.string("--cluster-domain"),
      cluster_dns: flags.list("--cluster-dns"),
      streaming_connection_idle_timeout: flags.string("--streaming-connection-idle-timeout"),
      node_status_update_frequency: flags.string("--node-status-update-frequency"),
      image_gc_high_threshold_percent: flags.integer("--image-gc-high-threshold")?,
      image_gc_low_threshold_percent: flags.integer("--image-gc-low-threshold")?,
      cgroups_per_qos: flags.boolean("--cgroups-per-qos")?,
      max_pods: flags.integer("--max-pods")?,
      pod_pids_limit: flags.integer("--pod-max-pids")?,
      resolv_conf: flags.string("--resolv-conf"),
      cpu_cfs_quota: flags.boolean("--cpu-cfs-quota")?,
      cpu_cfs_quota_period: flags.string("--cpu-cfs-quota-period"),
      eviction_hard: flags.key_values("--eviction-hard", '<'),
      protect_kernel_defaults: flags.boolean("--protect-kernel-defaults")?,
      feature_gates: flags.feature_gates("--feature-gates")?,
      fail_swap_on: flags.boolean("--fail-swap-on")?,
      container_log_max_size: flags.string("--container-log-max-size"),
      container_log_max_files: flags.integer("--container-log-max-files")?,
      system_reserved: flags.key_values("--system-reserved", '='),
      kube_reserved: flags.key_values("--kube-reserved", '='),
      enforce_node_allocatable: flags.list("--enforce-node-allocatable"),
      allowed_unsafe_sysctls: flags.list("--allowed-unsafe-sysctls"),
      ..KubeletConfiguration::new()
    })
  }

  /// Serialize as two-space indented JSON, without a trailing newline
  pub fn to_json(&self) -> Result<String> {
    Ok(serde_json::to_string_pretty(self)?)
  }

  pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let conf: KubeletConfiguration = serde_json::from_reader(reader)?;

    Ok(conf)
  }

  pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
    utils::write_file(self.to_json()?.as_bytes(), path, Some(0o644))
  }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authentication {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub x509: Option<AuthnX509>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub webhook: Option<AuthnWebhook>,
  pub anonymous: AuthnAnonymous,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthnAnonymous {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub enabled: Option<bool>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthnWebhook {
  pub enabled: bool,
  #[serde(rename = "cacheTTL")]
  pub cache_ttl: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthnX509 {
  #[serde(rename = "clientCAFile")]
  pub client_ca_file: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authorization {
  pub mode: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub webhook: Option<AuthzWebhook>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthzWebhook {
  #[serde(rename = "cacheAuthorizedTTL")]
  pub cache_authorized_ttl: String,
  #[serde(rename = "cacheUnauthorizedTTL")]
  pub cache_unauthorized_ttl: String,
}
