//! Settings consumed by connection establishment.
//!
//! Loading these from a file is the embedding client's business; the structs
//! derive `serde` so they can live inside a larger client configuration.

use serde::{Deserialize, Serialize};

use crate::addr::Family;

/// Transport settings read by [`Connector`](crate::Connector).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportSettings {
    #[serde(default)]
    pub keepalive: KeepaliveSettings,
    /// `TCP_USER_TIMEOUT` in milliseconds.
    #[serde(default = "default_ack_timeout_ms")]
    pub ack_timeout_ms: u32,
    #[serde(default)]
    pub prefer_ipv6: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_family: Option<ForcedFamily>,
    #[serde(default)]
    pub gateway_enabled: bool,
    /// Race the alternate targets even when the host name resolves.
    #[serde(default)]
    pub remote_assistance: bool,
    /// Alternate target addresses for the redundancy race.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<TargetAddress>,
}

fn default_ack_timeout_ms() -> u32 {
    9000
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            keepalive: KeepaliveSettings::default(),
            ack_timeout_ms: default_ack_timeout_ms(),
            prefer_ipv6: false,
            force_family: None,
            gateway_enabled: false,
            remote_assistance: false,
            targets: Vec::new(),
        }
    }
}

impl TransportSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keepalive(mut self, config: KeepaliveSettings) -> Self {
        self.keepalive = config;
        self
    }

    pub fn ack_timeout_ms(mut self, ms: u32) -> Self {
        self.ack_timeout_ms = ms;
        self
    }

    pub fn prefer_ipv6(mut self, enable: bool) -> Self {
        self.prefer_ipv6 = enable;
        self
    }

    pub fn force_family(mut self, family: Option<ForcedFamily>) -> Self {
        self.force_family = family;
        self
    }

    pub fn gateway_enabled(mut self, enable: bool) -> Self {
        self.gateway_enabled = enable;
        self
    }

    pub fn remote_assistance(mut self, enable: bool) -> Self {
        self.remote_assistance = enable;
        self
    }

    pub fn target(mut self, target: TargetAddress) -> Self {
        self.targets.push(target);
        self
    }

    /// The address-family policy applied to resolved candidates.
    pub fn family_policy(&self) -> FamilyPolicy {
        FamilyPolicy {
            prefer_ipv6: self.prefer_ipv6,
            force: self.force_family,
        }
    }
}

/// Keep-alive timing configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeepaliveSettings {
    pub enabled: bool,
    pub idle_secs: u32,
    pub retries: u32,
    pub interval_secs: u32,
}

impl Default for KeepaliveSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            idle_secs: 5,
            retries: 3,
            interval_secs: 2,
        }
    }
}

impl KeepaliveSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn idle(mut self, secs: u32) -> Self {
        self.idle_secs = secs;
        self
    }

    pub fn interval(mut self, secs: u32) -> Self {
        self.interval_secs = secs;
        self
    }

    pub fn retries(mut self, count: u32) -> Self {
        self.retries = count;
        self
    }
}

/// An alternate target; without a port the request's fallback port is used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetAddress {
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl TargetAddress {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
        }
    }

    pub fn with_port(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port: Some(port),
        }
    }
}

/// Hard address-family requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForcedFamily {
    Ipv4,
    Ipv6,
}

impl ForcedFamily {
    /// Maps the numeric selector used by client settings (4 or 6).
    pub fn from_selector(selector: u32) -> Option<Self> {
        match selector {
            4 => Some(ForcedFamily::Ipv4),
            6 => Some(ForcedFamily::Ipv6),
            _ => None,
        }
    }

    pub fn family(self) -> Family {
        match self {
            ForcedFamily::Ipv4 => Family::Inet,
            ForcedFamily::Ipv6 => Family::Inet6,
        }
    }
}

/// Soft preference plus optional hard requirement for picking a resolved address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FamilyPolicy {
    pub prefer_ipv6: bool,
    pub force: Option<ForcedFamily>,
}
