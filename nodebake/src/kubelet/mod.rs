mod args;
mod config;
mod custom;
mod flags;

pub use args::{KubeletArgs, DEFAULTS_PATH};
pub use config::{
  Authentication, Authorization, AuthnAnonymous, AuthnWebhook, AuthnX509, AuthzWebhook, KubeletConfiguration,
  API_VERSION, CONFIG_PATH, KIND,
};
pub use custom::CustomKubeletConfig;
pub use flags::KubeletFlags;
use tracing::debug;

use crate::Result;

/// Render the kubelet configuration file for the given kubelet flags
///
/// Values from `custom` take precedence over the values derived from `flags`.
/// Either the complete document is returned or the error for the first malformed flag.
pub fn synthesize(flags: &KubeletFlags, custom: Option<&CustomKubeletConfig>) -> Result<String> {
  let mut config = KubeletConfiguration::from_flags(flags)?;

  if let Some(custom) = custom {
    debug!("Applying custom kubelet configuration: {custom:?}");
    custom.apply(&mut config);
  }

  config.to_json()
}
