//! Configuration management

use crate::keys::FalseFlagPolicy;
use serde::Deserialize;

/// Environment prefix for every setting, e.g. `FEED_VIEW_PAGE_SIZE=20`
pub const ENV_PREFIX: &str = "FEED_VIEW_";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ViewCacheConfig {
    /// Items requested per page fetch
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Whether `{onlyFollowing: false}` and `{}` are the same view
    #[serde(default)]
    pub false_flag_policy: FalseFlagPolicy,
    /// Fetch latency samples kept for percentile stats
    #[serde(default = "default_latency_samples")]
    pub latency_samples: usize,
}

impl Default for ViewCacheConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            false_flag_policy: FalseFlagPolicy::default(),
            latency_samples: default_latency_samples(),
        }
    }
}

impl ViewCacheConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::prefixed(ENV_PREFIX).from_env()
    }
}

fn default_page_size() -> u32 {
    10
}

fn default_latency_samples() -> usize {
    1000
}
