// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! Per-protocol outbound settings.

use super::params::value_to_string;
use super::{decode_base64, TranslateError};
use crate::descriptor::ConnectionDescriptor;
use crate::tunnel_config::{
    ProtocolSettings, ServersSettings, ShadowsocksServer, TrojanServer, VlessUser, VmessUser,
    VnextServer, VnextSettings,
};
use serde_json::{Map, Value};

fn endpoint(descriptor: &ConnectionDescriptor) -> Result<(String, u16), TranslateError> {
    let host = descriptor
        .host()
        .ok_or(TranslateError::MissingField("address"))?;
    let port = descriptor.port().ok_or(TranslateError::MissingField("port"))?;
    Ok((host.to_string(), port))
}

fn credential(descriptor: &ConnectionDescriptor, field: &'static str) -> Result<String, TranslateError> {
    descriptor
        .user()
        .filter(|u| !u.is_empty())
        .map(str::to_string)
        .ok_or(TranslateError::MissingField(field))
}

pub fn vmess(inner: &Map<String, Value>) -> Result<ProtocolSettings, TranslateError> {
    let field = |name: &'static str| {
        inner
            .get(name)
            .and_then(value_to_string)
            .filter(|v| !v.is_empty())
            .ok_or(TranslateError::MissingField(name))
    };

    let address = field("add")?;
    let raw_port = field("port")?;
    let port = raw_port
        .parse::<u16>()
        .map_err(|_| TranslateError::InvalidField {
            field: "port",
            value: raw_port.clone(),
        })?;
    let id = field("id")?;
    let security = field("scy").unwrap_or_else(|_| "auto".to_string());

    Ok(ProtocolSettings::Vmess(VnextSettings {
        vnext: vec![VnextServer {
            address,
            port,
            users: vec![VmessUser { id, security }],
        }],
    }))
}

pub fn vless(descriptor: &ConnectionDescriptor) -> Result<ProtocolSettings, TranslateError> {
    let (address, port) = endpoint(descriptor)?;
    let id = credential(descriptor, "id")?;
    let encryption = descriptor
        .query("encryption")
        .filter(|v| !v.is_empty())
        .unwrap_or("none")
        .to_string();
    let flow = descriptor
        .query("flow")
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    Ok(ProtocolSettings::Vless(VnextSettings {
        vnext: vec![VnextServer {
            address,
            port,
            users: vec![VlessUser {
                id,
                encryption,
                flow,
            }],
        }],
    }))
}

pub fn trojan(descriptor: &ConnectionDescriptor) -> Result<ProtocolSettings, TranslateError> {
    let (address, port) = endpoint(descriptor)?;
    let password = credential(descriptor, "password")?;
    Ok(ProtocolSettings::Trojan(ServersSettings {
        servers: vec![TrojanServer {
            address,
            port,
            password,
        }],
    }))
}

/// Userinfo is `base64(method:password)`; a plain `method:password` is accepted too.
pub fn shadowsocks(descriptor: &ConnectionDescriptor) -> Result<ProtocolSettings, TranslateError> {
    let (address, port) = endpoint(descriptor)?;
    let userinfo = credential(descriptor, "userinfo")?;

    let decoded = decode_base64(&userinfo)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .filter(|s| s.contains(':'));
    let plain = decoded.unwrap_or(userinfo);

    let (method, password) = plain
        .split_once(':')
        .ok_or_else(|| TranslateError::InvalidField {
            field: "userinfo",
            value: plain.clone(),
        })?;
    if method.is_empty() {
        return Err(TranslateError::MissingField("method"));
    }
    if password.is_empty() {
        return Err(TranslateError::MissingField("password"));
    }

    Ok(ProtocolSettings::Shadowsocks(ServersSettings {
        servers: vec![ShadowsocksServer {
            address,
            port,
            method: method.to_string(),
            password: password.to_string(),
        }],
    }))
}
