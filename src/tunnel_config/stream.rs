// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! Stream settings: one transport plus one security layer.
//!
//! The engine expects a flat object with `network`, `security` and exactly one
//! `<transport>Settings` key (plus `tlsSettings`/`realitySettings` when a
//! security layer is active). Modelling both as enums makes "two transports at
//! once" unrepresentable; the custom `Serialize` flattens them back.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct StreamSettings {
    pub transport: Transport,
    pub security: Security,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Transport {
    Raw(RawSettings),
    Kcp(KcpSettings),
    Ws(WsSettings),
    Grpc(GrpcSettings),
    HttpUpgrade(HttpUpgradeSettings),
    Xhttp(XhttpSettings),
}

impl Transport {
    pub fn network(&self) -> &'static str {
        match self {
            Self::Raw(_) => "raw",
            Self::Kcp(_) => "kcp",
            Self::Ws(_) => "ws",
            Self::Grpc(_) => "grpc",
            Self::HttpUpgrade(_) => "httpupgrade",
            Self::Xhttp(_) => "xhttp",
        }
    }

    fn settings_key(&self) -> &'static str {
        match self {
            Self::Raw(_) => "rawSettings",
            Self::Kcp(_) => "kcpSettings",
            Self::Ws(_) => "wsSettings",
            Self::Grpc(_) => "grpcSettings",
            Self::HttpUpgrade(_) => "httpupgradeSettings",
            Self::Xhttp(_) => "xhttpSettings",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Security {
    None,
    Tls(TlsSettings),
    Reality(RealitySettings),
}

impl Security {
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Tls(_) => "tls",
            Self::Reality(_) => "reality",
        }
    }
}

impl Serialize for StreamSettings {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("network", self.transport.network())?;
        map.serialize_entry("security", self.security.name())?;

        let key = self.transport.settings_key();
        match &self.transport {
            Transport::Raw(s) => map.serialize_entry(key, s)?,
            Transport::Kcp(s) => map.serialize_entry(key, s)?,
            Transport::Ws(s) => map.serialize_entry(key, s)?,
            Transport::Grpc(s) => map.serialize_entry(key, s)?,
            Transport::HttpUpgrade(s) => map.serialize_entry(key, s)?,
            Transport::Xhttp(s) => map.serialize_entry(key, s)?,
        }

        match &self.security {
            Security::None => {}
            Security::Tls(s) => map.serialize_entry("tlsSettings", s)?,
            Security::Reality(s) => map.serialize_entry("realitySettings", s)?,
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeaderType {
    #[serde(rename = "type")]
    pub kind: String,
}

impl HeaderType {
    pub fn new(kind: impl Into<String>) -> Self {
        Self { kind: kind.into() }
    }
}

impl Default for HeaderType {
    fn default() -> Self {
        Self::new("none")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RawSettings {
    pub header: HeaderType,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KcpSettings {
    pub mtu: u32,
    pub tti: u32,
    pub uplink_capacity: u32,
    pub downlink_capacity: u32,
    pub congestion: bool,
    pub read_buffer_size: u32,
    pub write_buffer_size: u32,
    pub header: HeaderType,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub seed: String,
}

impl Default for KcpSettings {
    fn default() -> Self {
        Self {
            mtu: 1350,
            tti: 50,
            uplink_capacity: 12,
            downlink_capacity: 100,
            congestion: false,
            read_buffer_size: 2,
            write_buffer_size: 2,
            header: HeaderType::default(),
            seed: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WsSettings {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub host: String,
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrpcSettings {
    #[serde(rename = "serviceName")]
    pub service_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub authority: String,
    #[serde(rename = "multiMode")]
    pub multi_mode: bool,
    pub idle_timeout: u32,
    pub health_check_timeout: u32,
    pub permit_without_stream: bool,
    pub initial_windows_size: u32,
}

impl Default for GrpcSettings {
    fn default() -> Self {
        Self {
            service_name: String::new(),
            authority: String::new(),
            multi_mode: false,
            idle_timeout: 60,
            health_check_timeout: 20,
            permit_without_stream: false,
            initial_windows_size: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HttpUpgradeSettings {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub host: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct XhttpSettings {
    pub path: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub host: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub mode: String,
}

impl Default for XhttpSettings {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            host: String::new(),
            mode: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsSettings {
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub allow_insecure: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub server_name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub alpn: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub fingerprint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ech_config_list: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealitySettings {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub server_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub fingerprint: String,
    pub show: bool,
    pub public_key: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub short_id: String,
    pub spider_x: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mldsa65_verify: Option<String>,
}

impl Default for RealitySettings {
    fn default() -> Self {
        Self {
            server_name: String::new(),
            fingerprint: String::new(),
            show: false,
            public_key: String::new(),
            short_id: String::new(),
            spider_x: "/".to_string(),
            mldsa65_verify: None,
        }
    }
}
