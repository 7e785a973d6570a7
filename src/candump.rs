//! Parser for `candump -l` style logs:
//!
//! ```text
//! (1436509053.850870) can0 126#A531FF0080FE0700
//! ```
//!
//! Only the ID and the payload length matter to identification; the payload
//! itself is kept for callers that want it.

use crate::fingerprint::MAX_PAYLOAD_LENGTH;
use crate::{ControlError, ControlResult};
use std::time::Duration;

/// Largest 29-bit extended identifier.
const MAX_EXTENDED_ID: u32 = 0x1FFF_FFFF;

/// One data frame from a log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedFrame {
    /// Capture time as logged
    pub timestamp: Duration,
    pub interface: String,
    pub id: u32,
    pub data: Vec<u8>,
}

impl LoggedFrame {
    /// Payload length, saturating at `u8::MAX`.
    pub fn len(&self) -> u8 {
        u8::try_from(self.data.len()).unwrap_or(u8::MAX)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

fn invalid(line: &str, what: &str) -> ControlError {
    ControlError::InvalidDataFormat(format!("{}: {:?}", what, line))
}

/// Parse one log line. Blank lines, `#` comments and remote frames yield
/// `Ok(None)`.
pub fn parse_candump_line(line: &str) -> ControlResult<Option<LoggedFrame>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut fields = line.split_whitespace();
    let (Some(ts), Some(interface), Some(frame), None) =
        (fields.next(), fields.next(), fields.next(), fields.next())
    else {
        return Err(invalid(line, "expected `(timestamp) interface id#data`"));
    };

    let timestamp = ts
        .strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
        .and_then(|t| t.parse::<f64>().ok())
        .and_then(|t| Duration::try_from_secs_f64(t).ok())
        .ok_or_else(|| invalid(line, "bad timestamp"))?;

    let (id, payload) = frame
        .split_once('#')
        .ok_or_else(|| invalid(line, "missing `#` separator"))?;
    let id = u32::from_str_radix(id, 16)
        .ok()
        .filter(|id| *id <= MAX_EXTENDED_ID)
        .ok_or_else(|| invalid(line, "bad identifier"))?;

    if payload.starts_with('R') || payload.starts_with('#') {
        // Remote and CAN FD frames carry no classic payload shape.
        return Ok(None);
    }

    let digits: String = payload.chars().filter(|c| *c != '.').collect();
    let data = hex::decode(digits)
        .map_err(|e| invalid(line, &format!("bad payload ({})", e)))?;
    if data.len() > usize::from(MAX_PAYLOAD_LENGTH) {
        return Err(invalid(line, "payload longer than 8 bytes"));
    }

    Ok(Some(LoggedFrame {
        timestamp,
        interface: interface.to_string(),
        id,
        data,
    }))
}

/// Parse a whole log, reporting the first bad line by number.
pub fn parse_candump(content: &str) -> ControlResult<Vec<LoggedFrame>> {
    let mut frames = Vec::new();
    for (number, line) in content.lines().enumerate() {
        match parse_candump_line(line) {
            Ok(Some(frame)) => frames.push(frame),
            Ok(None) => {}
            Err(ControlError::InvalidDataFormat(msg)) => {
                return Err(ControlError::InvalidDataFormat(format!(
                    "line {}: {}",
                    number + 1,
                    msg
                )))
            }
            Err(e) => return Err(e),
        }
    }
    Ok(frames)
}
