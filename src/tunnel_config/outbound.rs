// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! Outbounds and their per-protocol settings.

use super::stream::StreamSettings;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

pub const PROXY_TAG: &str = "proxy";
pub const DIRECT_TAG: &str = "direct";
pub const BLOCK_TAG: &str = "block";

#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub tag: String,
    pub settings: ProtocolSettings,
    pub stream_settings: Option<StreamSettings>,
    pub mux: Option<MuxSettings>,
}

impl Outbound {
    /// The tunnelled outbound, with multiplexing disabled.
    pub fn proxy(settings: ProtocolSettings, stream_settings: Option<StreamSettings>) -> Self {
        Self {
            tag: PROXY_TAG.to_string(),
            settings,
            stream_settings,
            mux: Some(MuxSettings::disabled()),
        }
    }

    pub fn direct() -> Self {
        Self {
            tag: DIRECT_TAG.to_string(),
            settings: ProtocolSettings::Freedom(EmptySettings {}),
            stream_settings: None,
            mux: None,
        }
    }

    pub fn block() -> Self {
        Self {
            tag: BLOCK_TAG.to_string(),
            settings: ProtocolSettings::Blackhole(EmptySettings {}),
            stream_settings: None,
            mux: None,
        }
    }
}

impl Serialize for Outbound {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Outbound", 5)?;
        s.serialize_field("tag", &self.tag)?;
        s.serialize_field("protocol", self.settings.protocol_id())?;
        s.serialize_field("settings", &self.settings)?;
        if let Some(stream) = &self.stream_settings {
            s.serialize_field("streamSettings", stream)?;
        }
        if let Some(mux) = &self.mux {
            s.serialize_field("mux", mux)?;
        }
        s.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MuxSettings {
    pub enabled: bool,
    pub concurrency: i32,
}

impl MuxSettings {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            concurrency: -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ProtocolSettings {
    Vmess(VnextSettings<VmessUser>),
    Vless(VnextSettings<VlessUser>),
    Trojan(ServersSettings<TrojanServer>),
    Shadowsocks(ServersSettings<ShadowsocksServer>),
    Wireguard(WireguardSettings),
    Freedom(EmptySettings),
    Blackhole(EmptySettings),
}

impl ProtocolSettings {
    /// Protocol identifier as understood by the engine.
    pub fn protocol_id(&self) -> &'static str {
        match self {
            Self::Vmess(_) => "vmess",
            Self::Vless(_) => "vless",
            Self::Trojan(_) => "trojan",
            Self::Shadowsocks(_) => "shadowsocks",
            Self::Wireguard(_) => "wireguard",
            Self::Freedom(_) => "freedom",
            Self::Blackhole(_) => "blackhole",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmptySettings {}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VnextSettings<U> {
    pub vnext: Vec<VnextServer<U>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VnextServer<U> {
    pub address: String,
    pub port: u16,
    pub users: Vec<U>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VmessUser {
    pub id: String,
    pub security: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VlessUser {
    pub id: String,
    pub encryption: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flow: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServersSettings<S> {
    pub servers: Vec<S>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrojanServer {
    pub address: String,
    pub port: u16,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShadowsocksServer {
    pub address: String,
    pub port: u16,
    pub method: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireguardSettings {
    pub secret_key: String,
    pub address: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dns: Vec<String>,
    pub mtu: u32,
    pub workers: u32,
    pub domain_strategy: String,
    pub no_kernel_tun: bool,
    pub peers: Vec<WireguardPeer>,
    #[serde(flatten)]
    pub amnezia: Option<AmneziaParams>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireguardPeer {
    pub public_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_shared_key: Option<String>,
    #[serde(rename = "allowedIPs", skip_serializing_if = "Vec::is_empty")]
    pub allowed_ips: Vec<String>,
    pub endpoint: String,
}

/// AmneziaWG obfuscation knobs (junk packets and magic headers).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AmneziaParams {
    pub jc: u32,
    pub jmin: u32,
    pub jmax: u32,
    pub s1: u32,
    pub s2: u32,
    pub h1: u32,
    pub h2: u32,
    pub h3: u32,
    pub h4: u32,
}

impl Default for AmneziaParams {
    fn default() -> Self {
        Self {
            jc: 0,
            jmin: 0,
            jmax: 0,
            s1: 0,
            s2: 0,
            h1: 1,
            h2: 2,
            h3: 3,
            h4: 4,
        }
    }
}
