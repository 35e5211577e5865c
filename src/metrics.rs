// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! Per-probe metric registry rendered in the Prometheus text format.
//!
//! Every probe builds its own registry, so a scrape only ever shows the
//! outcome of the probe it triggered.

use crate::rules::{FailIfModule, FailIfRule};
use crate::trace::{Phase, PhaseDurations};
use prometheus::{Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder};
use std::collections::HashMap;
use std::time::Duration;

fn failure_help(module: FailIfModule) -> &'static str {
    match module {
        FailIfModule::Ssl => "Indicates if probe failed due to ssl",
        FailIfModule::BodyRegex => "Indicates if probe failed due to regex on body",
        FailIfModule::BodyJsonCel => "Indicates if probe failed due to CEL expression",
        FailIfModule::HeaderRegex => "Indicates if probe failed due to regex on header",
        FailIfModule::StatusCodeSet => "Indicates if probe failed due to status code",
    }
}

pub struct ProbeMetrics {
    registry: Registry,
    success: Gauge,
    duration: Gauge,
    phase_duration: GaugeVec,
    content_length: Gauge,
    body_length: Gauge,
    redirects: Gauge,
    ssl: Gauge,
    status_code: Gauge,
    failed_due: HashMap<FailIfModule, Gauge>,
}

impl ProbeMetrics {
    /// Register the fixed gauges plus one failure gauge per module that the
    /// given rules use.
    pub fn new(rules: &[FailIfRule]) -> prometheus::Result<Self> {
        let registry = Registry::new();

        let success = Gauge::with_opts(Opts::new(
            "tun_probe_success",
            "Displays whether or not the probe over tunnel was a success",
        ))?;
        let duration = Gauge::with_opts(Opts::new(
            "tun_probe_duration_seconds",
            "Returns how long the probe took to complete in seconds",
        ))?;
        let phase_duration = GaugeVec::new(
            Opts::new(
                "tun_probe_http_duration_seconds",
                "Duration of HTTP request by phase, summed over all traces",
            ),
            &["phase"],
        )?;
        let content_length = Gauge::with_opts(Opts::new(
            "tun_probe_http_content_length_bytes",
            "Length of HTTP content response in bytes",
        ))?;
        let body_length = Gauge::with_opts(Opts::new(
            "tun_probe_http_uncompressed_body_length_bytes",
            "Length of uncompressed response body in bytes",
        ))?;
        let redirects = Gauge::with_opts(Opts::new(
            "tun_probe_http_redirects",
            "The number of redirects",
        ))?;
        let ssl = Gauge::with_opts(Opts::new(
            "tun_probe_http_ssl",
            "Indicates if SSL was used for the final trace",
        ))?;
        let status_code = Gauge::with_opts(Opts::new(
            "tun_probe_http_status_code",
            "Response HTTP status code",
        ))?;

        for phase in Phase::ALL {
            phase_duration.with_label_values(&[phase.as_str()]);
        }

        registry.register(Box::new(success.clone()))?;
        registry.register(Box::new(duration.clone()))?;
        registry.register(Box::new(phase_duration.clone()))?;
        registry.register(Box::new(content_length.clone()))?;
        registry.register(Box::new(body_length.clone()))?;
        registry.register(Box::new(redirects.clone()))?;
        registry.register(Box::new(ssl.clone()))?;

        let mut failed_due = HashMap::new();
        for rule in rules {
            if failed_due.contains_key(&rule.module) {
                continue;
            }
            let gauge = Gauge::with_opts(Opts::new(
                rule.module.metric_name(),
                failure_help(rule.module),
            ))?;
            registry.register(Box::new(gauge.clone()))?;
            failed_due.insert(rule.module, gauge);
        }

        Ok(Self {
            registry,
            success,
            duration,
            phase_duration,
            content_length,
            body_length,
            redirects,
            ssl,
            status_code,
            failed_due,
        })
    }

    pub fn set_success(&self, success: bool) {
        self.success.set(if success { 1.0 } else { 0.0 });
    }

    pub fn set_duration(&self, elapsed: Duration) {
        self.duration.set(elapsed.as_secs_f64());
    }

    pub fn set_phases(&self, phases: &PhaseDurations) {
        for phase in Phase::ALL {
            self.phase_duration
                .with_label_values(&[phase.as_str()])
                .set(phases.get(phase).as_secs_f64());
        }
    }

    /// `None` is reported as -1, the conventional "unknown length".
    pub fn set_content_length(&self, length: Option<u64>) {
        self.content_length
            .set(length.map(|l| l as f64).unwrap_or(-1.0));
    }

    pub fn set_body_length(&self, bytes: u64) {
        self.body_length.set(bytes as f64);
    }

    pub fn set_redirects(&self, count: usize) {
        self.redirects.set(count as f64);
    }

    pub fn set_ssl(&self, used_tls: bool) {
        self.ssl.set(if used_tls { 1.0 } else { 0.0 });
    }

    /// The status gauge only appears once a response has been received.
    pub fn set_status_code(&self, status: u16) -> prometheus::Result<()> {
        match self.registry.register(Box::new(self.status_code.clone())) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(e),
        }
        self.status_code.set(f64::from(status));
        Ok(())
    }

    pub fn mark_failed(&self, module: FailIfModule) {
        if let Some(gauge) = self.failed_due.get(&module) {
            gauge.set(1.0);
        }
    }

    pub fn render(&self) -> prometheus::Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
