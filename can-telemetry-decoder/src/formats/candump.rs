//! candump log parser
//!
//! Reads the text format written by `candump -l`:
//!
//! ```text
//! (1436509052.249713) vcan0 617#10270000E02E0000
//! (1436509052.449847) can1 615##1A5
//! ```
//!
//! `ID#DATA` is a classic frame, `ID##<flags>DATA` a CAN-FD frame (the single
//! flags nibble is skipped) and `ID#R` a remote frame, which carries no data
//! and is skipped. Identifier, flags and data must be plain hex digits, and
//! nothing may follow the `ID#DATA` token.

use crate::types::{CanFrame, DecoderError, Result, Timestamp, MAX_PAYLOAD_LEN};
use chrono::DateTime;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Parse one candump line
///
/// Returns `Ok(None)` for lines that hold no data frame (blank lines and
/// remote frames).
pub fn parse_line(line: &str) -> Result<Option<CanFrame>> {
    let mut parts = line.split_whitespace();

    let Some(timestamp) = parts.next() else {
        return Ok(None);
    };
    let timestamp = parse_timestamp(timestamp)
        .ok_or_else(|| DecoderError::LogParseError(format!("bad timestamp in '{}'", line)))?;

    let _interface = parts
        .next()
        .ok_or_else(|| DecoderError::LogParseError(format!("missing interface in '{}'", line)))?;

    let id_and_data = parts
        .next()
        .ok_or_else(|| DecoderError::LogParseError(format!("missing ID#DATA in '{}'", line)))?;

    if let Some(extra) = parts.next() {
        return Err(DecoderError::LogParseError(format!(
            "unexpected '{}' after ID#DATA in '{}'",
            extra, line
        )));
    }

    let (id, data, is_fd) = if let Some((id, rest)) = id_and_data.split_once("##") {
        // First character is the FD flags nibble
        let data = match rest.get(..1) {
            Some(flags) if is_hex(flags) => &rest[1..],
            _ => {
                return Err(DecoderError::LogParseError(format!(
                    "missing FD flags in '{}'",
                    line
                )))
            }
        };
        (id, data, true)
    } else if let Some((id, data)) = id_and_data.split_once('#') {
        (id, data, false)
    } else {
        return Err(DecoderError::LogParseError(format!(
            "expected ID#DATA in '{}'",
            line
        )));
    };

    if data.starts_with('R') {
        log::trace!("Skipping remote frame: {}", line);
        return Ok(None);
    }

    if id.is_empty() || !is_hex(id) {
        return Err(DecoderError::LogParseError(format!("bad CAN ID '{}'", id)));
    }
    let can_id = u32::from_str_radix(id, 16)
        .map_err(|e| DecoderError::LogParseError(format!("bad CAN ID '{}': {}", id, e)))?;

    let mut payload = [0u8; MAX_PAYLOAD_LEN];
    let len = parse_hex_payload(data, &mut payload)?;

    let mut frame = CanFrame::new(can_id, &payload[..len])?.with_timestamp(timestamp);
    frame.is_fd = is_fd;
    Ok(Some(frame))
}

/// `(seconds.fraction)` -> UTC timestamp
fn parse_timestamp(token: &str) -> Option<Timestamp> {
    let inner = token.strip_prefix('(')?.strip_suffix(')')?;
    let (secs, frac) = inner.split_once('.').unwrap_or((inner, "0"));

    let secs: i64 = secs.parse().ok()?;
    if frac.is_empty() || frac.len() > 9 || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // Right-pad the fraction to nanoseconds
    let nanos: u32 = frac.parse::<u32>().ok()? * 10u32.pow(9 - frac.len() as u32);

    DateTime::from_timestamp(secs, nanos)
}

/// Decode hex pairs into `out`, returning the byte count
fn parse_hex_payload(hex: &str, out: &mut [u8; MAX_PAYLOAD_LEN]) -> Result<usize> {
    if !is_hex(hex) {
        return Err(DecoderError::LogParseError(format!("bad hex data '{}'", hex)));
    }
    if hex.len() % 2 != 0 {
        return Err(DecoderError::LogParseError(format!(
            "odd number of hex digits in '{}'",
            hex
        )));
    }
    let len = hex.len() / 2;
    if len > MAX_PAYLOAD_LEN {
        return Err(DecoderError::LogParseError(format!(
            "{} data bytes exceed the {} byte maximum",
            len, MAX_PAYLOAD_LEN
        )));
    }

    for (i, byte) in out.iter_mut().take(len).enumerate() {
        let pair = hex
            .get(i * 2..i * 2 + 2)
            .ok_or_else(|| DecoderError::LogParseError(format!("bad hex data '{}'", hex)))?;
        *byte = u8::from_str_radix(pair, 16)
            .map_err(|e| DecoderError::LogParseError(format!("bad hex data '{}': {}", hex, e)))?;
    }
    Ok(len)
}

fn is_hex(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Iterator over the data frames of a candump log
pub struct CandumpReader<R> {
    lines: std::io::Lines<R>,
    line_number: usize,
}

impl CandumpReader<BufReader<File>> {
    /// Open a candump log file
    pub fn open(path: &Path) -> Result<Self> {
        log::info!("Opening candump log: {:?}", path);
        let file = File::open(path).map_err(|e| {
            DecoderError::LogParseError(format!("Failed to open log file {:?}: {}", path, e))
        })?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> CandumpReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_number: 0,
        }
    }
}

impl<R: BufRead> Iterator for CandumpReader<R> {
    type Item = Result<CanFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.line_number += 1;

            match parse_line(&line) {
                Ok(Some(frame)) => return Some(Ok(frame)),
                Ok(None) => continue,
                Err(DecoderError::LogParseError(msg)) => {
                    return Some(Err(DecoderError::LogParseError(format!(
                        "line {}: {}",
                        self.line_number, msg
                    ))))
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_classic_frame() {
        let frame = parse_line("(1436509052.249713) vcan0 617#10270000E02E0000")
            .unwrap()
            .unwrap();
        assert_eq!(frame.can_id, 0x617);
        assert_eq!(frame.payload(), &[0x10, 0x27, 0x00, 0x00, 0xE0, 0x2E, 0x00, 0x00]);
        assert!(!frame.is_fd);

        let ts = frame.timestamp.unwrap();
        assert_eq!(ts.timestamp(), 1_436_509_052);
        assert_eq!(ts.timestamp_subsec_micros(), 249_713);
    }

    #[test]
    fn test_parse_fd_frame() {
        let frame = parse_line("(0.5) can1 1A0##19C20407F96EA167B0102")
            .unwrap()
            .unwrap();
        assert_eq!(frame.can_id, 0x1A0);
        assert!(frame.is_fd);
        assert_eq!(frame.dlc(), 10);
        assert_eq!(frame.payload()[0], 0x9C);
        assert_eq!(frame.timestamp.unwrap().timestamp_subsec_millis(), 500);
    }

    #[test]
    fn test_short_and_empty_frames() {
        let frame = parse_line("(1.0) vcan0 17F#C7").unwrap().unwrap();
        assert_eq!(frame.payload(), &[0xC7]);

        let empty = parse_line("(1.0) vcan0 17F#").unwrap().unwrap();
        assert_eq!(empty.dlc(), 0);
    }

    #[test]
    fn test_skipped_lines() {
        assert!(parse_line("").unwrap().is_none());
        assert!(parse_line("   ").unwrap().is_none());
        assert!(parse_line("(1.0) vcan0 123#R").unwrap().is_none());
    }

    #[test]
    fn test_malformed_lines() {
        assert!(parse_line("1.0 vcan0 123#00").is_err());
        assert!(parse_line("(1.0) vcan0").is_err());
        assert!(parse_line("(1.0) vcan0 123-00").is_err());
        assert!(parse_line("(1.0) vcan0 XYZ#00").is_err());
        assert!(parse_line("(1.0) vcan0 123#0").is_err());
        assert!(parse_line("(1.0) vcan0 123#GG").is_err());
        assert!(parse_line("(1.0) vcan0 123##G00").is_err());
        assert!(parse_line("(1.0) vcan0 123##").is_err());
    }

    #[test]
    fn test_sign_characters_rejected() {
        assert!(parse_line("(1.0) vcan0 +617#+1+2").is_err());
        assert!(parse_line("(1.0) vcan0 617#+1+2").is_err());
        assert!(parse_line("(1.0) vcan0 617#-1").is_err());
        assert!(parse_line("(1.0) vcan0 #00").is_err());
    }

    #[test]
    fn test_trailing_tokens_rejected() {
        assert!(parse_line("(1.0) vcan0 617#0102 R").is_err());
        assert!(parse_line("(1.0) vcan0 617#0102   ").unwrap().is_some());
    }

    #[test]
    fn test_reader_reports_line_numbers() {
        let log = "(1.0) vcan0 615#0800000000000000\n\n(2.0) vcan0 616#zz\n(3.0) vcan0 617#00\n";
        let mut reader = CandumpReader::new(Cursor::new(log));

        assert_eq!(reader.next().unwrap().unwrap().can_id, 0x615);
        match reader.next().unwrap() {
            Err(DecoderError::LogParseError(msg)) => assert!(msg.starts_with("line 3:")),
            other => panic!("expected parse error, got {:?}", other),
        }
        assert_eq!(reader.next().unwrap().unwrap().can_id, 0x617);
        assert!(reader.next().is_none());
    }
}
