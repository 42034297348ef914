//! ELM327 response parsing
//!
//! An ELM327 reply is one or more CR-terminated lines followed by a `>`
//! prompt. With echo, spaces and headers disabled a positive Mode 01 answer
//! looks like `410C0D48`; with spaces enabled, `41 0C 0D 48`. Either form is
//! accepted.

use crate::error::ObdError;
use crate::mode;

/// Prompt byte terminating every adapter reply
pub(crate) const PROMPT: u8 = b'>';

/// Replies signalling that the adapter could not service the request
const ADAPTER_ERRORS: &[&str] = &[
    "?",
    "ERROR",
    "UNABLE TO CONNECT",
    "CAN ERROR",
    "BUS BUSY",
    "BUS ERROR",
    "DATA ERROR",
    "FB ERROR",
    "STOPPED",
    "BUFFER FULL",
];

/// Split a raw reply into its meaningful lines
pub(crate) fn lines(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(|c: char| c == '\r' || c == '\n' || c == PROMPT as char)
        .map(str::trim)
        .filter(|line| !line.is_empty())
}

/// Whether a line reports an adapter-level failure
fn adapter_error(line: &str) -> bool {
    let upper = line.to_ascii_uppercase();
    ADAPTER_ERRORS.iter().any(|err| {
        if *err == "?" {
            upper == "?"
        } else {
            upper.contains(err)
        }
    })
}

/// Decode a line of hex digits, ignoring embedded whitespace
fn hex_bytes(line: &str) -> Option<Vec<u8>> {
    let digits: Vec<u8> = line.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    if digits.is_empty() || digits.len() % 2 != 0 {
        return None;
    }
    digits
        .chunks(2)
        .map(|pair| {
            let pair = std::str::from_utf8(pair).ok()?;
            u8::from_str_radix(pair, 16).ok()
        })
        .collect()
}

/// Extract the data bytes answering a Mode 01 request for `pid`.
///
/// Returns `Ok(None)` for `NO DATA` or when no line carries a positive
/// response for `pid`.
pub(crate) fn parse_reply(request: &str, pid: u8, raw: &str) -> Result<Option<Vec<u8>>, ObdError> {
    let header = mode::CURRENT_DATA + mode::RESPONSE_OFFSET;
    for line in lines(raw) {
        let upper = line.to_ascii_uppercase();
        if upper == request || upper.starts_with("SEARCHING") {
            continue;
        }
        if upper.starts_with("BUS INIT") && !upper.contains("ERROR") {
            continue;
        }
        if upper.contains("NO DATA") {
            return Ok(None);
        }
        if adapter_error(&upper) {
            return Err(ObdError::Query(format!("adapter replied {line:?} to {request}")));
        }
        let bytes = hex_bytes(&upper)
            .ok_or_else(|| ObdError::Query(format!("unparsable reply {line:?} to {request}")))?;
        if bytes.len() >= 2 && bytes[0] == header && bytes[1] == pid {
            return Ok(Some(bytes[2..].to_vec()));
        }
    }
    Ok(None)
}

/// Whether an AT command was acknowledged
pub(crate) fn is_ok(raw: &str) -> bool {
    lines(raw).any(|line| line.eq_ignore_ascii_case("OK"))
}
