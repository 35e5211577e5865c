// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! Descriptor translation: connection descriptor in, tunnel configuration out.
//!
//! Translation is pure. It never touches the network or the filesystem, and
//! the same descriptor always yields the same configuration.

pub mod params;
pub mod protocol;
pub mod stream;
pub mod wireguard;

use crate::descriptor::ConnectionDescriptor;
use crate::tunnel_config::{Outbound, TunnelConfig};
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use params::StreamParams;

#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    #[error("malformed connection descriptor: {0}")]
    MalformedDescriptor(String),
    #[error("unsupported protocol '{0}'")]
    UnsupportedProtocol(String),
    #[error("inline payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("inline payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("inline payload is not a valid INI document: {0}")]
    Ini(String),
    #[error("missing mandatory field '{0}'")]
    MissingField(&'static str),
    #[error("invalid value '{value}' for '{field}'")]
    InvalidField { field: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Vmess,
    Vless,
    Trojan,
    Shadowsocks,
    Wireguard,
    AmneziaWg,
}

impl Protocol {
    pub fn from_scheme(scheme: &str) -> Result<Self, TranslateError> {
        match scheme {
            "vmess" => Ok(Self::Vmess),
            "vless" => Ok(Self::Vless),
            "trojan" => Ok(Self::Trojan),
            "ss" => Ok(Self::Shadowsocks),
            "wireguard" | "wg" => Ok(Self::Wireguard),
            "awg" | "amneziawg" => Ok(Self::AmneziaWg),
            other => Err(TranslateError::UnsupportedProtocol(other.to_string())),
        }
    }
}

/// Translate a parsed descriptor into a full tunnel configuration.
pub fn translate(descriptor: &ConnectionDescriptor) -> Result<TunnelConfig, TranslateError> {
    let proxy = match Protocol::from_scheme(descriptor.scheme())? {
        Protocol::Vmess => {
            let inner = decode_vmess_payload(descriptor)?;
            let settings = protocol::vmess(&inner)?;
            let stream = stream::parse(&StreamParams::from_vmess(&inner))?;
            Outbound::proxy(settings, Some(stream))
        }
        Protocol::Vless => {
            let settings = protocol::vless(descriptor)?;
            let stream = stream::parse(&StreamParams::from_query(descriptor))?;
            Outbound::proxy(settings, Some(stream))
        }
        Protocol::Trojan => {
            let settings = protocol::trojan(descriptor)?;
            let stream = stream::parse(&StreamParams::from_query(descriptor))?;
            Outbound::proxy(settings, Some(stream))
        }
        Protocol::Shadowsocks => {
            let settings = protocol::shadowsocks(descriptor)?;
            let stream = stream::parse(&StreamParams::from_query(descriptor))?;
            Outbound::proxy(settings, Some(stream))
        }
        Protocol::Wireguard => {
            let ini = decode_text_payload(descriptor)?;
            Outbound::proxy(wireguard::parse(&ini, false)?, None)
        }
        Protocol::AmneziaWg => {
            let ini = decode_text_payload(descriptor)?;
            Outbound::proxy(wireguard::parse(&ini, true)?, None)
        }
    };
    Ok(TunnelConfig::new(proxy))
}

/// Parse and translate in one step.
pub fn translate_str(raw: &str) -> Result<TunnelConfig, TranslateError> {
    translate(&ConnectionDescriptor::parse(raw)?)
}

const LENIENT: GeneralPurposeConfig =
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent);
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);

/// Decode base64 in either alphabet, with or without padding.
pub(crate) fn decode_base64(input: &str) -> Result<Vec<u8>, TranslateError> {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    match STANDARD_LENIENT.decode(&compact) {
        Ok(bytes) => Ok(bytes),
        Err(first) => URL_SAFE_LENIENT
            .decode(&compact)
            .map_err(|_| TranslateError::Base64(first)),
    }
}

fn decode_text_payload(descriptor: &ConnectionDescriptor) -> Result<String, TranslateError> {
    let payload = descriptor.payload().ok_or_else(|| {
        TranslateError::MalformedDescriptor("missing inline payload".to_string())
    })?;
    let bytes = decode_base64(payload)?;
    String::from_utf8(bytes)
        .map_err(|_| TranslateError::MalformedDescriptor("inline payload is not UTF-8".to_string()))
}

fn decode_vmess_payload(
    descriptor: &ConnectionDescriptor,
) -> Result<serde_json::Map<String, serde_json::Value>, TranslateError> {
    let text = decode_text_payload(descriptor)?;
    match serde_json::from_str::<serde_json::Value>(&text)? {
        serde_json::Value::Object(map) => Ok(map),
        _ => Err(TranslateError::MalformedDescriptor(
            "vmess payload must be a JSON object".to_string(),
        )),
    }
}
