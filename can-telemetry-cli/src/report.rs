//! Report generation
//!
//! Collects what happened during a replay and renders it as a text table or
//! JSON.

use anyhow::Result;
use can_telemetry_decoder::{
    DecodedSignal, DiagnosticSink, DispatchStats, LogSink, MessageDefinition, RecordingSink,
    SignalState, UnpackError, VehicleState,
};
use chrono::SecondsFormat;
use serde::Serialize;
use std::io::Write;

/// Sink used by the CLI: logs as it goes and keeps a record for the summary
pub struct CliSink {
    log: LogSink,
    record: RecordingSink,
}

impl CliSink {
    pub fn new(log: LogSink) -> Self {
        Self {
            log,
            record: RecordingSink::new(),
        }
    }

    pub fn record(&self) -> &RecordingSink {
        &self.record
    }
}

impl DiagnosticSink for CliSink {
    fn decoded(&mut self, message: &MessageDefinition, signals: &[DecodedSignal]) {
        self.log.decoded(message, signals);
        self.record.decoded(message, signals);
    }

    fn out_of_range(&mut self, message: &MessageDefinition, signal: &DecodedSignal) {
        self.log.out_of_range(message, signal);
        self.record.out_of_range(message, signal);
    }

    fn unpack_failed(&mut self, message: &MessageDefinition, error: &UnpackError) {
        self.log.unpack_failed(message, error);
        self.record.unpack_failed(message, error);
    }
}

#[derive(Debug, Serialize)]
pub struct FailureSummary {
    pub can_id: u32,
    pub count: u64,
    pub last_error: String,
}

#[derive(Debug, Serialize)]
pub struct OutOfRangeSummary {
    pub can_id: u32,
    pub signal: String,
    pub count: u64,
    pub last_value: f64,
}

/// Everything the report shows
#[derive(Debug, Serialize)]
pub struct RunSummary<'a> {
    pub logs: Vec<String>,
    pub parse_errors: usize,
    pub stats: DispatchStats,
    pub failures: Vec<FailureSummary>,
    pub out_of_range: Vec<OutOfRangeSummary>,
    /// Most recent rejection, e.g. "0x616: payload length 5 does not ..."
    pub last_failure: Option<String>,
    pub signals: Vec<&'a SignalState>,
}

impl<'a> RunSummary<'a> {
    pub fn new(
        logs: Vec<String>,
        parse_errors: usize,
        stats: DispatchStats,
        record: &RecordingSink,
        state: &'a VehicleState,
        show_unset: bool,
    ) -> Self {
        let failures = record
            .failure_records()
            .into_iter()
            .map(|f| FailureSummary {
                can_id: f.can_id,
                count: f.count,
                last_error: f.last_error.to_string(),
            })
            .collect();

        let out_of_range = record
            .out_of_range_records()
            .into_iter()
            .map(|r| OutOfRangeSummary {
                can_id: r.can_id,
                signal: r.signal.clone(),
                count: r.count,
                last_value: r.last_value,
            })
            .collect();

        let last_failure = record
            .last_failure()
            .map(|(can_id, error)| format!("0x{:03X}: {}", can_id, error));

        let signals = state
            .iter()
            .filter(|s| show_unset || s.has_been_decoded())
            .collect();

        Self {
            logs,
            parse_errors,
            stats,
            failures,
            out_of_range,
            last_failure,
            signals,
        }
    }
}

/// Render the summary as JSON
pub fn write_json<W: Write>(out: &mut W, summary: &RunSummary<'_>) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, summary)?;
    writeln!(out)?;
    Ok(())
}

/// Render the summary as an ASCII table
pub fn write_txt<W: Write>(out: &mut W, summary: &RunSummary<'_>) -> Result<()> {
    writeln!(out, "═══════════════════════════════════════════════")?;
    writeln!(out, "  CAN Telemetry Snapshot")?;
    writeln!(out, "═══════════════════════════════════════════════\n")?;

    for log in &summary.logs {
        writeln!(out, "Log: {}", log)?;
    }

    let stats = &summary.stats;
    writeln!(out, "\nFrames:")?;
    writeln!(out, "  Seen:         {}", stats.frames_seen)?;
    writeln!(out, "  Decoded:      {}", stats.decoded)?;
    writeln!(out, "  Ignored:      {}", stats.ignored)?;
    writeln!(out, "  Rejected:     {}", stats.rejected)?;
    writeln!(out, "  Out of range: {} signals", stats.out_of_range_signals)?;
    writeln!(out, "  Parse errors: {}", summary.parse_errors)?;

    if !summary.failures.is_empty() {
        writeln!(out, "\nRejected messages:")?;
        for failure in &summary.failures {
            writeln!(
                out,
                "  0x{:03X}  x{:<6} {}",
                failure.can_id, failure.count, failure.last_error
            )?;
        }
        if let Some(last) = &summary.last_failure {
            writeln!(out, "  Last: {}", last)?;
        }
    }

    if !summary.out_of_range.is_empty() {
        writeln!(out, "\nOut-of-range signals:")?;
        for record in &summary.out_of_range {
            writeln!(
                out,
                "  0x{:03X}  {:<24} x{:<6} last {:.3}",
                record.can_id, record.signal, record.count, record.last_value
            )?;
        }
    }

    writeln!(out, "\nSignals:")?;
    writeln!(
        out,
        "  {:<24} {:>14} {:<6} {:<10} {:>8}  {}",
        "NAME", "VALUE", "UNIT", "RANGE", "UPDATES", "LAST FRAME"
    )?;
    writeln!(out, "  {}", "-".repeat(90))?;
    for signal in &summary.signals {
        let value = signal
            .value
            .map(|v| format!("{:.3}", v))
            .unwrap_or_else(|| "-".to_string());
        let range = if signal.has_been_decoded() {
            signal.range.to_string()
        } else {
            "-".to_string()
        };
        let when = signal
            .timestamp
            .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Micros, true))
            .unwrap_or_default();
        writeln!(
            out,
            "  {:<24} {:>14} {:<6} {:<10} {:>8}  {}",
            signal.name,
            value,
            signal.unit.as_deref().unwrap_or(""),
            range,
            signal.update_count,
            when
        )?;
    }

    Ok(())
}
