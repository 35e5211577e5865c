// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! Stream settings from the uniform parameter namespace.

use super::params::StreamParams;
use super::TranslateError;
use crate::tunnel_config::{
    GrpcSettings, HeaderType, HttpUpgradeSettings, KcpSettings, RawSettings, RealitySettings,
    Security, StreamSettings, TlsSettings, Transport, WsSettings, XhttpSettings,
};

pub fn parse(params: &StreamParams) -> Result<StreamSettings, TranslateError> {
    Ok(StreamSettings {
        transport: parse_transport(params)?,
        security: parse_security(params)?,
    })
}

fn parse_transport(params: &StreamParams) -> Result<Transport, TranslateError> {
    let network = params.get_or("type", "raw").to_ascii_lowercase();
    let owned = |key: &str| params.get(key).unwrap_or_default().to_string();

    let transport = match network.as_str() {
        "raw" | "tcp" => Transport::Raw(RawSettings {
            header: HeaderType::new(params.get_or("headerType", "none")),
        }),
        "kcp" | "mkcp" => Transport::Kcp(KcpSettings {
            header: HeaderType::new(params.get_or("headerType", "none")),
            seed: owned("seed"),
            ..Default::default()
        }),
        "ws" | "websocket" => Transport::Ws(WsSettings {
            path: owned("path"),
            host: owned("host"),
            headers: Default::default(),
        }),
        "grpc" | "gun" => Transport::Grpc(GrpcSettings {
            service_name: owned("serviceName"),
            authority: owned("authority"),
            multi_mode: params.get("mode") == Some("multi"),
            ..Default::default()
        }),
        "httpupgrade" => Transport::HttpUpgrade(HttpUpgradeSettings {
            path: owned("path"),
            host: owned("host"),
        }),
        "xhttp" | "splithttp" => Transport::Xhttp(XhttpSettings {
            path: params.get_or("path", "/").to_string(),
            host: owned("host"),
            mode: owned("mode"),
        }),
        _ => {
            return Err(TranslateError::InvalidField {
                field: "type",
                value: network,
            })
        }
    };
    Ok(transport)
}

fn parse_security(params: &StreamParams) -> Result<Security, TranslateError> {
    let kind = params.get_or("security", "none").to_ascii_lowercase();
    let owned = |key: &str| params.get(key).unwrap_or_default().to_string();

    match kind.as_str() {
        "none" => Ok(Security::None),
        "tls" => Ok(Security::Tls(TlsSettings {
            allow_insecure: params.flag("allowInsecure") || params.flag("insecure"),
            server_name: owned("sni"),
            alpn: params
                .get("alpn")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            fingerprint: owned("fp"),
            ech_config_list: params.get("ech").map(str::to_string),
        })),
        "reality" => Ok(Security::Reality(RealitySettings {
            server_name: owned("sni"),
            fingerprint: owned("fp"),
            public_key: params
                .get("pbk")
                .ok_or(TranslateError::MissingField("pbk"))?
                .to_string(),
            short_id: owned("sid"),
            spider_x: params.get_or("spx", "/").to_string(),
            mldsa65_verify: params.get("pqv").map(str::to_string),
            ..Default::default()
        })),
        _ => Err(TranslateError::InvalidField {
            field: "security",
            value: kind,
        }),
    }
}
