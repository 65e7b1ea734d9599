//! Worker node domain types.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::profile::EncodingProfile;

/// Unique identifier for a worker node, minted at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Mint a fresh random node ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse from its string form.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Last-known resource snapshot reported by a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResourceUsage {
    /// CPU utilisation (0-100)
    pub cpu_percent: f64,
    /// Memory utilisation (0-100)
    pub memory_percent: f64,
    /// Disk utilisation (0-100)
    pub disk_percent: f64,
}

/// A registered worker node.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Node {
    /// Identity minted on registration
    pub id: NodeId,
    /// Display name advertised by the worker
    pub name: String,
    /// Encoding profiles this node has benchmarked and can run
    pub profiles: Vec<EncodingProfile>,
    /// Last resource snapshot
    pub resources: ResourceUsage,
    /// Refreshed on every accepted metrics update
    pub heartbeat: DateTime<Utc>,
}

impl Node {
    /// Whether this node advertises a profile with the given name.
    pub fn has_profile(&self, profile_name: &str) -> bool {
        self.profiles.iter().any(|p| p.name == profile_name)
    }
}

/// Registration payload for a new node.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NodeRegistration {
    pub name: String,
    pub profiles: Vec<EncodingProfile>,
}

/// Filter for node discovery. An empty profile name matches every node.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct NodeFilter {
    pub profile_name: String,
}

impl NodeFilter {
    pub fn for_profile(profile_name: impl Into<String>) -> Self {
        Self {
            profile_name: profile_name.into(),
        }
    }

    pub fn matches(&self, node: &Node) -> bool {
        self.profile_name.is_empty() || node.has_profile(&self.profile_name)
    }
}
