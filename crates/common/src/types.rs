//! Core types for the LwM2M console
//!
//! Two shapes of the same bootstrap configuration live here: the flat,
//! instance-indexed record the bootstrap server stores and serves over REST
//! ([`BootstrapConfig`]) and the grouped record operators edit
//! ([`GroupedConfig`]). See [`crate::adapter`] for the conversion.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::objects::ObjectLink;

/// Object instance identifier
pub type InstanceId = u16;

/// LwM2M Security object id
pub const SECURITY_OBJECT_ID: u16 = 0;

/// LwM2M Server object id
pub const SERVER_OBJECT_ID: u16 = 1;

/// OSCORE object id in the OMA object registry
pub const OSCORE_OBJECT_ID: u16 = 21;

/// Security mode of a Security object instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityMode {
    Psk,
    Rpk,
    X509,
    NoSec,
    Est,
}

impl std::fmt::Display for SecurityMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecurityMode::Psk => write!(f, "psk"),
            SecurityMode::Rpk => write!(f, "rpk"),
            SecurityMode::X509 => write!(f, "x509"),
            SecurityMode::NoSec => write!(f, "no_sec"),
            SecurityMode::Est => write!(f, "est"),
        }
    }
}

impl std::str::FromStr for SecurityMode {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "psk" => Ok(SecurityMode::Psk),
            "rpk" => Ok(SecurityMode::Rpk),
            "x509" => Ok(SecurityMode::X509),
            "no_sec" | "nosec" => Ok(SecurityMode::NoSec),
            "est" => Ok(SecurityMode::Est),
            other => Err(crate::Error::InvalidConfig(format!(
                "unknown security mode '{}'",
                other
            ))),
        }
    }
}

/// Server object (`/1`) instance as written during bootstrap.
///
/// Only `shortId` matters to the adapter; every other resource is carried
/// as-is in `attributes`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    pub short_id: u16,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl ServerConfig {
    pub fn new(short_id: u16) -> Self {
        Self {
            short_id,
            attributes: Map::new(),
        }
    }

    /// Registration lifetime in seconds, when present
    pub fn lifetime(&self) -> Option<u64> {
        self.attributes.get("lifetime").and_then(Value::as_u64)
    }

    /// Transport binding, rendered as a compact string ("U", "UQ", ...)
    pub fn binding(&self) -> Option<String> {
        match self.attributes.get("binding")? {
            Value::String(s) => Some(s.clone()),
            Value::Array(modes) => Some(
                modes
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(""),
            ),
            _ => None,
        }
    }
}

/// Security object (`/0`) instance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSecurity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default)]
    pub bootstrap_server: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_mode: Option<SecurityMode>,
    #[serde(default, deserialize_with = "byte_array::deserialize")]
    pub public_key_or_id: Vec<u8>,
    #[serde(default, deserialize_with = "byte_array::deserialize")]
    pub server_public_key: Vec<u8>,
    #[serde(default, deserialize_with = "byte_array::deserialize")]
    pub secret_key: Vec<u8>,
    /// Short server id of the DM server this entry secures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<u16>,
    /// Instance id of the OSCORE object holding this entry's context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oscore_security_mode: Option<InstanceId>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl ServerSecurity {
    /// Security entry for the bootstrap server itself
    pub fn bootstrap(uri: impl Into<String>, mode: SecurityMode) -> Self {
        Self {
            uri: Some(uri.into()),
            bootstrap_server: true,
            security_mode: Some(mode),
            ..Default::default()
        }
    }

    /// Security entry for the DM server with the given short id
    pub fn for_server(uri: impl Into<String>, mode: SecurityMode, server_id: u16) -> Self {
        Self {
            uri: Some(uri.into()),
            bootstrap_server: false,
            security_mode: Some(mode),
            server_id: Some(server_id),
            ..Default::default()
        }
    }
}

/// OSCORE object (`/21`) instance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OscoreObject {
    #[serde(
        default,
        deserialize_with = "byte_array::deserialize_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub oscore_master_secret: Option<Vec<u8>>,
    #[serde(
        default,
        deserialize_with = "byte_array::deserialize_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub oscore_sender_id: Option<Vec<u8>>,
    #[serde(
        default,
        deserialize_with = "byte_array::deserialize_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub oscore_recipient_id: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oscore_aead_algorithm: Option<OscoreAlgorithm>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oscore_hmac_algorithm: Option<OscoreAlgorithm>,
    #[serde(
        default,
        deserialize_with = "byte_array::deserialize_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub oscore_master_salt: Option<Vec<u8>>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

/// COSE algorithm of an OSCORE context, by numeric id or by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OscoreAlgorithm {
    Id(i64),
    Name(String),
}

/// Byte arrays as JSON number arrays. Bytes may arrive signed (-128..=127)
/// or unsigned (0..=255); they are always written unsigned.
mod byte_array {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Vec::<i64>::deserialize(deserializer)?
            .into_iter()
            .map(to_byte::<D::Error>)
            .collect()
    }

    pub fn deserialize_opt<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Vec<i64>>::deserialize(deserializer)? {
            Some(values) => values
                .into_iter()
                .map(to_byte::<D::Error>)
                .collect::<Result<Vec<u8>, D::Error>>()
                .map(Some),
            None => Ok(None),
        }
    }

    fn to_byte<E: Error>(value: i64) -> Result<u8, E> {
        if (-128..=255).contains(&value) {
            Ok(value as u8)
        } else {
            Err(E::custom(format!("byte value {} out of range", value)))
        }
    }
}

/// Flat bootstrap configuration of one endpoint, as stored by the server.
///
/// Maps are keyed by object instance id; JSON keys are decimal strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapConfig {
    #[serde(default)]
    pub servers: BTreeMap<InstanceId, ServerConfig>,
    #[serde(default)]
    pub security: BTreeMap<InstanceId, ServerSecurity>,
    #[serde(default)]
    pub oscore: BTreeMap<InstanceId, OscoreObject>,
    #[serde(default)]
    pub to_delete: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_id_for_security_object: Option<bool>,
}

/// Bootstrap server credentials as shown to the operator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BootstrapEntry {
    pub security: ServerSecurity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oscore: Option<OscoreObject>,
}

/// DM server with its security (and optional OSCORE) entry attached
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DmServer {
    #[serde(flatten)]
    pub server: ServerConfig,
    #[serde(default)]
    pub security: ServerSecurity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oscore: Option<OscoreObject>,
}

/// Grouped bootstrap configuration of one endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupedConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub bs: Vec<BootstrapEntry>,
    #[serde(default)]
    pub dm: Vec<DmServer>,
    #[serde(default)]
    pub to_delete: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_id_for_security_object: Option<bool>,
}

impl GroupedConfig {
    /// Whether any bootstrap or DM entry carries an OSCORE context
    pub fn uses_oscore(&self) -> bool {
        self.bs.iter().any(|e| e.oscore.is_some()) || self.dm.iter().any(|s| s.oscore.is_some())
    }
}

/// Client registration as reported by the LwM2M server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub endpoint: String,
    #[serde(default)]
    pub registration_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, rename = "lwM2mVersion", skip_serializing_if = "Option::is_none")]
    pub lwm2m_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifetime: Option<u64>,
    #[serde(default = "default_root_path")]
    pub root_path: String,
    #[serde(default)]
    pub object_links: Vec<ObjectLink>,
    #[serde(default)]
    pub secure: bool,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

fn default_root_path() -> String {
    "/".to_string()
}

/// Response body of a read request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<crate::store::Node>,
    #[serde(default, rename = "errormessage", skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ReadResponse {
    pub fn is_success(&self) -> bool {
        matches!(self.status.as_str(), "CONTENT" | "CHANGED" | "CREATED" | "DELETED")
    }
}
