//! Integration descriptor types as published by the catalog.
//!
//! A descriptor tells the AppLink desktop app how to launch one connector:
//! either a local process (`stdio`) or a network endpoint (`http`, `sse`,
//! `streamable-http`). Catalog entries are user-supplied and semi-trusted;
//! nothing here is safe to hand to an OS protocol handler until the link
//! builder in `applink-rs` has validated it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// How the desktop app talks to an installed connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportKind {
    /// Local child process speaking over stdin/stdout
    Stdio,
    /// Plain HTTP endpoint
    Http,
    /// Server-sent-events endpoint
    Sse,
    /// Streamable HTTP endpoint
    StreamableHttp,
}

impl TransportKind {
    /// The wire name used in catalog JSON and in install-link query strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Stdio => "stdio",
            TransportKind::Http => "http",
            TransportKind::Sse => "sse",
            TransportKind::StreamableHttp => "streamable-http",
        }
    }

    /// True for the three URL-based sub-kinds, which share one validation path.
    pub fn is_network(&self) -> bool {
        !matches!(self, TransportKind::Stdio)
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection template: the launch recipe half of a descriptor.
///
/// The catalog serves this as a loose bag of optional fields rather than a
/// clean tagged union - older entries omit the `transport` tag entirely and
/// rely on consumers inferring `stdio` from the presence of a command. The
/// link builder owns that inference and enforces the exactly-one-variant
/// invariant; this type just carries what the wire said.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionTemplate {
    /// Transport tag, when the catalog entry carries one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<TransportKind>,
    /// Command to execute (`stdio` variant).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Ordered argument list for the command (`stdio` variant).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Environment variables the connector needs (`stdio` variant).
    ///
    /// Values are often secrets; they are never embedded in install links.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<BTreeMap<String, String>>,
    /// Target URL (network variants).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// HTTP headers to send (network variants).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
}

/// One post-install setup field the desktop app should prompt for.
///
/// Descriptive only: config fields never influence the install link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigField {
    /// Stable key the connector reads the value under.
    pub key: String,
    /// Field type hint for the prompt UI (text, password, ...).
    #[serde(rename = "type")]
    pub field_type: String,
    /// Whether the connector refuses to start without it.
    #[serde(default)]
    pub required: bool,
}

/// One installable integration as published by the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationDescriptor {
    /// Stable catalog identifier.
    pub id: String,
    /// Display name shown on install surfaces.
    pub name: String,
    /// Catalog category, when assigned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Free-form source/topic tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Descriptor-level transport hint.
    ///
    /// Some catalog entries state the transport here instead of (or as well
    /// as) inside the template. Used as a fallback during inference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<TransportKind>,
    /// Launch recipe. Absent on entries that are listed but not installable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<ConnectionTemplate>,
    /// Post-install setup fields the desktop app should prompt for.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub config_fields: Vec<ConfigField>,
}

impl IntegrationDescriptor {
    /// Minimal descriptor with just an id and a display name.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: None,
            tags: Vec::new(),
            transport: None,
            template: None,
            config_fields: Vec::new(),
        }
    }
}
