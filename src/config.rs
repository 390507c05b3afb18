//! Named constants of `spec.md` §6, exposed as overridable configuration
//! rather than hardcoded literals.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProxyConfig {
    /// `SpinUpPeersTimeout`: bound on parallel idle-peer wake-up (§4.2).
    #[serde(with = "duration_secs")]
    pub spin_up_timeout: Duration,

    /// `RowContextCheck`: scan rows between cancellation checks (§4.5, §5).
    pub row_context_check: u64,

    /// Minimum capacity for the per-peer result channel even when zero
    /// peers are selected (`mpsc::channel` rejects capacity 0).
    pub collector_channel_capacity_floor: usize,

    /// `ListSepChar1`: group-key separator the Stats Aggregator joins
    /// request-column values with (§4.6).
    #[serde(with = "separator_char")]
    pub group_key_separator: char,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            spin_up_timeout: Duration::from_secs(5),
            row_context_check: 10_000,
            collector_channel_capacity_floor: 1,
            group_key_separator: '\u{1F}',
        }
    }
}

impl ProxyConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn channel_capacity(&self, selected_peers: usize) -> usize {
        selected_peers.max(self.collector_channel_capacity_floor)
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

mod separator_char {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(c: &char, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&c.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<char, D::Error> {
        let s = String::deserialize(d)?;
        s.chars().next().ok_or_else(|| D::Error::custom("group_key_separator must be a single character"))
    }
}
