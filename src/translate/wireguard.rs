// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! WireGuard and AmneziaWG outbounds from `wg-quick` style INI documents.

use super::TranslateError;
use crate::tunnel_config::{AmneziaParams, ProtocolSettings, WireguardPeer, WireguardSettings};
use ini::{Ini, Properties};
use std::str::FromStr;

const DEFAULT_MTU: u32 = 1420;
const WORKERS: u32 = 2;
const DOMAIN_STRATEGY: &str = "ForceIP";

pub fn parse(text: &str, amnezia: bool) -> Result<ProtocolSettings, TranslateError> {
    let doc = Ini::load_from_str(text).map_err(|e| TranslateError::Ini(e.to_string()))?;
    let iface = doc
        .section(Some("Interface"))
        .ok_or_else(|| TranslateError::Ini("missing [Interface] section".to_string()))?;
    let peer = doc
        .section(Some("Peer"))
        .ok_or_else(|| TranslateError::Ini("missing [Peer] section".to_string()))?;

    let endpoint = required(peer, "Endpoint", "Peer.Endpoint")?;
    check_endpoint(&endpoint)?;

    let amnezia = if amnezia {
        Some(AmneziaParams {
            jc: number(iface, "Jc", 0)?,
            jmin: number(iface, "Jmin", 0)?,
            jmax: number(iface, "Jmax", 0)?,
            s1: number(iface, "S1", 0)?,
            s2: number(iface, "S2", 0)?,
            h1: number(iface, "H1", 1)?,
            h2: number(iface, "H2", 2)?,
            h3: number(iface, "H3", 3)?,
            h4: number(iface, "H4", 4)?,
        })
    } else {
        None
    };

    Ok(ProtocolSettings::Wireguard(WireguardSettings {
        secret_key: required(iface, "PrivateKey", "Interface.PrivateKey")?,
        address: list(iface, "Address"),
        dns: list(iface, "DNS"),
        mtu: number(iface, "MTU", DEFAULT_MTU)?,
        workers: WORKERS,
        domain_strategy: DOMAIN_STRATEGY.to_string(),
        no_kernel_tun: false,
        peers: vec![WireguardPeer {
            public_key: required(peer, "PublicKey", "Peer.PublicKey")?,
            pre_shared_key: if amnezia.is_some() {
                optional(peer, "PresharedKey")
            } else {
                None
            },
            allowed_ips: list(peer, "AllowedIPs"),
            endpoint,
        }],
        amnezia,
    }))
}

fn optional(section: &Properties, key: &str) -> Option<String> {
    section
        .get(key)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn required(
    section: &Properties,
    key: &str,
    field: &'static str,
) -> Result<String, TranslateError> {
    optional(section, key).ok_or(TranslateError::MissingField(field))
}

fn list(section: &Properties, key: &str) -> Vec<String> {
    section
        .get(key)
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn number<T: FromStr>(section: &Properties, key: &'static str, default: T) -> Result<T, TranslateError> {
    match optional(section, key) {
        None => Ok(default),
        Some(v) => v
            .parse()
            .map_err(|_| TranslateError::InvalidField { field: key, value: v }),
    }
}

fn check_endpoint(endpoint: &str) -> Result<(), TranslateError> {
    let invalid = || TranslateError::InvalidField {
        field: "Peer.Endpoint",
        value: endpoint.to_string(),
    };
    let (host, port) = endpoint.rsplit_once(':').ok_or_else(invalid)?;
    if host.is_empty() {
        return Err(invalid());
    }
    port.parse::<u16>().map_err(|_| invalid())?;
    Ok(())
}
