// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! Typed tunnel configuration tree.
//!
//! The tree serialises into the JSON document accepted by xray-core: a `log`
//! block plus an ordered list of outbounds. The proxy outbound comes first so
//! that the engine routes traffic through it by default; `direct` and `block`
//! are always appended after it.

pub mod outbound;
pub mod stream;

pub use outbound::{
    AmneziaParams, EmptySettings, MuxSettings, Outbound, ProtocolSettings, ServersSettings,
    ShadowsocksServer, TrojanServer, VlessUser, VmessUser, VnextServer, VnextSettings,
    WireguardPeer, WireguardSettings, BLOCK_TAG, DIRECT_TAG, PROXY_TAG,
};
pub use stream::{
    GrpcSettings, HeaderType, HttpUpgradeSettings, KcpSettings, RawSettings, RealitySettings,
    Security, StreamSettings, TlsSettings, Transport, WsSettings, XhttpSettings,
};

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogSettings {
    pub loglevel: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access: Option<String>,
}

impl LogSettings {
    /// Engine logging fully disabled.
    pub fn silent() -> Self {
        Self {
            loglevel: "none".to_string(),
            access: None,
        }
    }

    /// Debug error log with access logging disabled.
    pub fn debug() -> Self {
        Self {
            loglevel: "debug".to_string(),
            access: Some("none".to_string()),
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self::silent()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TunnelConfig {
    pub log: LogSettings,
    pub outbounds: Vec<Outbound>,
}

impl TunnelConfig {
    /// Build a configuration around a proxy outbound, appending the
    /// `direct` and `block` outbounds.
    pub fn new(proxy: Outbound) -> Self {
        Self {
            log: LogSettings::silent(),
            outbounds: vec![proxy, Outbound::direct(), Outbound::block()],
        }
    }

    pub fn proxy(&self) -> Option<&Outbound> {
        self.outbounds.iter().find(|o| o.tag == PROXY_TAG)
    }

    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}
