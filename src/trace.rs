// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! Per-round-trip timing capture and phase aggregation.
//!
//! A probe may perform several round trips (one per redirect). Each one opens
//! a new [`RoundTrace`]; connection hooks always update the most recently
//! opened trace. Aggregation turns the list into the five reported phases.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundTrace {
    pub init: Option<Instant>,
    pub dns_done: Option<Instant>,
    pub connect_start: Option<Instant>,
    pub connect_done: Option<Instant>,
    pub got_connection: Option<Instant>,
    pub tls_start: Option<Instant>,
    pub tls_done: Option<Instant>,
    pub first_byte: Option<Instant>,
    pub exit: Option<Instant>,
    pub used_tls: bool,
}

#[derive(Debug, Default)]
struct TraceState {
    traces: Vec<RoundTrace>,
    current: Option<usize>,
}

/// Shared, append-only trace list. Cloning shares the same underlying list.
#[derive(Debug, Clone, Default)]
pub struct TraceLog {
    state: Arc<Mutex<TraceState>>,
}

impl TraceLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start recording a new round trip; later hooks apply to it.
    pub fn open_round_trip(&self, used_tls: bool) {
        let mut state = self.state.lock();
        state.traces.push(RoundTrace {
            used_tls,
            ..Default::default()
        });
        state.current = Some(state.traces.len() - 1);
    }

    fn update(&self, f: impl FnOnce(&mut RoundTrace)) {
        let mut state = self.state.lock();
        if let Some(idx) = state.current {
            if let Some(trace) = state.traces.get_mut(idx) {
                f(trace);
            }
        }
    }

    pub fn dns_start(&self) {
        self.update(|t| t.init = Some(Instant::now()));
    }

    pub fn dns_done(&self) {
        self.update(|t| t.dns_done = Some(Instant::now()));
    }

    /// Without a resolve step, connection start doubles as the trace origin.
    pub fn connect_start(&self) {
        self.update(|t| {
            let now = Instant::now();
            t.connect_start = Some(now);
            if t.dns_done.is_none() {
                t.init = Some(now);
                t.dns_done = Some(now);
            }
        });
    }

    pub fn connect_done(&self) {
        self.update(|t| t.connect_done = Some(Instant::now()));
    }

    pub fn tls_start(&self) {
        self.update(|t| t.tls_start = Some(Instant::now()));
    }

    pub fn tls_done(&self) {
        self.update(|t| t.tls_done = Some(Instant::now()));
    }

    pub fn got_connection(&self) {
        self.update(|t| t.got_connection = Some(Instant::now()));
    }

    pub fn first_byte(&self) {
        self.update(|t| t.first_byte = Some(Instant::now()));
    }

    /// Mark the final round trip as fully consumed.
    pub fn finish(&self) {
        self.update(|t| t.exit = Some(Instant::now()));
    }

    pub fn snapshot(&self) -> Vec<RoundTrace> {
        self.state.lock().traces.clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().traces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Resolve,
    Connect,
    Tls,
    Processing,
    Transfer,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::Resolve,
        Phase::Connect,
        Phase::Tls,
        Phase::Processing,
        Phase::Transfer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Resolve => "resolve",
            Phase::Connect => "connect",
            Phase::Tls => "tls",
            Phase::Processing => "processing",
            Phase::Transfer => "transfer",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseDurations {
    pub resolve: Duration,
    pub connect: Duration,
    pub tls: Duration,
    pub processing: Duration,
    pub transfer: Duration,
}

impl PhaseDurations {
    pub fn get(&self, phase: Phase) -> Duration {
        match phase {
            Phase::Resolve => self.resolve,
            Phase::Connect => self.connect,
            Phase::Tls => self.tls,
            Phase::Processing => self.processing,
            Phase::Transfer => self.transfer,
        }
    }
}

fn span(later: Option<Instant>, earlier: Option<Instant>) -> Duration {
    match (later, earlier) {
        (Some(l), Some(e)) => l.saturating_duration_since(e),
        _ => Duration::ZERO,
    }
}

/// Sum phase durations over all traces.
///
/// The first trace never contributes to resolve time. A trace that never got
/// a connection contributes nothing further; missing first byte or exit stop
/// the accumulation at that point.
pub fn aggregate(traces: &[RoundTrace]) -> PhaseDurations {
    let mut out = PhaseDurations::default();
    for (i, t) in traces.iter().enumerate() {
        if i != 0 {
            out.resolve += span(t.dns_done, t.init);
        }
        if t.got_connection.is_none() {
            continue;
        }
        if t.used_tls {
            out.connect += span(t.connect_done, t.dns_done);
            out.tls += span(t.tls_done, t.tls_start);
        } else {
            out.connect += span(t.got_connection, t.dns_done);
        }
        if t.first_byte.is_none() {
            continue;
        }
        out.processing += span(t.first_byte, t.got_connection);
        if t.exit.is_none() {
            continue;
        }
        out.transfer += span(t.exit, t.first_byte);
    }
    out
}

/// Wall time from the first trace origin to the final exit, when both exist.
pub fn elapsed(traces: &[RoundTrace]) -> Option<Duration> {
    let start = traces.first()?.init?;
    let end = traces.last()?.exit?;
    Some(end.saturating_duration_since(start))
}
