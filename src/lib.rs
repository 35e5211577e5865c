// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! Availability prober for services reachable only through a VPN or proxy
//! tunnel.
//!
//! A probe translates a connection descriptor (`vmess://`, `vless://`,
//! `trojan://`, `ss://`, `wireguard://`) into a tunnel configuration, starts a
//! tunnel engine with it, fetches a target URL through the tunnel while
//! tracing every round trip, checks the response against fail-if rules and
//! renders the outcome as Prometheus metrics.

pub mod auth;
pub mod client;
pub mod config;
pub mod config_store;
pub mod cookie_jar;
pub mod descriptor;
pub mod engine;
pub mod metrics;
pub mod probe;
pub mod rules;
pub mod serde_helpers;
pub mod server;
pub mod trace;
pub mod translate;
pub mod tunnel_config;

#[cfg(test)]
pub(crate) mod test_helpers;
