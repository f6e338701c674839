//! Response classifier.
//!
//! Maps one completed modem line onto a [`Response`].  Pure and stateless:
//! whether a bare `OK` belongs to the driver or the application is decided
//! later by the [`AckCorrelator`](super::correlator::AckCorrelator).
//!
//! Recognised forms, in priority order:
//!
//! | Line                         | Response                      |
//! |------------------------------|-------------------------------|
//! | `+AWS:<idx>,<len>`           | `Message`                     |
//! | `+AWS{SUB,PUB}OPEN=<i>,<e>`  | `Opened`                      |
//! | `+AWS{SUB,PUB}CLOSE=<i>,<e>` | `Closed`                      |
//! | `SEND OK` / `SEND FAIL`      | `SendResult`                  |
//! | `OK` / `ERROR`               | `Confirmation`                |
//! | empty                        | `Blank`                       |
//! | anything else                | `Other`                       |
//!
//! Numeric fields are parsed strictly; a malformed `+AWS` line classifies
//! as `Other` instead of producing a guessed index.

/// Notification / acknowledgement prefix.
pub const URC_PREFIX: &[u8] = b"+AWS";
/// Modem's "already open" error code, treated as success.
pub const ERR_ALREADY_OPEN: i32 = -2;

const SEND_OK: &[u8] = b"SEND OK";
const SEND_FAIL: &[u8] = b"SEND FAIL";
const OK: &[u8] = b"OK";
const ERROR: &[u8] = b"ERROR";

/// Subscribe vs publish topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicKind {
    Subscribe,
    Publish,
}

/// Outcome of the last payload transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    Ok,
    Failed,
}

/// Bare command confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Ok,
    Error,
}

/// A classified modem line.  Indices and lengths are raw; range checks
/// against the registries happen in the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    /// `<len>` raw payload bytes for subscribe slot `<index>` follow.
    Message { index: usize, len: usize },
    Opened { kind: TopicKind, index: usize, code: i32 },
    Closed { kind: TopicKind, index: usize, code: i32 },
    SendResult(SendStatus),
    Confirmation(Confirmation),
    Blank,
    Other,
}

impl Response {
    /// Open acknowledgement outcome: success, including "already open" left
    /// over from before a host reset.
    pub fn open_succeeded(code: i32) -> bool {
        code == 0 || code == ERR_ALREADY_OPEN
    }
}

/// Classify one line (terminator optional).
pub fn classify(line: &[u8]) -> Response {
    let line = trim_line_end(line);

    if let Some(rest) = line.strip_prefix(URC_PREFIX) {
        return classify_urc(rest).unwrap_or(Response::Other);
    }
    if line.starts_with(SEND_OK) {
        return Response::SendResult(SendStatus::Ok);
    }
    if line.starts_with(SEND_FAIL) {
        return Response::SendResult(SendStatus::Failed);
    }
    if line.starts_with(OK) {
        return Response::Confirmation(Confirmation::Ok);
    }
    if line.starts_with(ERROR) {
        return Response::Confirmation(Confirmation::Error);
    }
    if line.is_empty() {
        return Response::Blank;
    }
    Response::Other
}

/// Strip trailing CR / LF.
pub fn trim_line_end(mut line: &[u8]) -> &[u8] {
    while let [rest @ .., b'\r' | b'\n'] = line {
        line = rest;
    }
    line
}

// ── Internal ──────────────────────────────────────────────────

fn classify_urc(rest: &[u8]) -> Option<Response> {
    if let Some(fields) = rest.strip_prefix(b":") {
        let (index, len) = parse_pair(fields)?;
        return Some(Response::Message {
            index: usize::try_from(index).ok()?,
            len: usize::try_from(len).ok()?,
        });
    }

    let (kind, rest) = if let Some(r) = rest.strip_prefix(b"SUB") {
        (TopicKind::Subscribe, r)
    } else if let Some(r) = rest.strip_prefix(b"PUB") {
        (TopicKind::Publish, r)
    } else {
        return None;
    };

    if let Some(fields) = rest.strip_prefix(b"OPEN=") {
        let (index, code) = parse_pair(fields)?;
        let index = usize::try_from(index).ok()?;
        return Some(Response::Opened { kind, index, code });
    }
    if let Some(fields) = rest.strip_prefix(b"CLOSE=") {
        let (index, code) = parse_pair(fields)?;
        let index = usize::try_from(index).ok()?;
        return Some(Response::Closed { kind, index, code });
    }
    None
}

/// `<int>,<int>` with nothing after the second number.
fn parse_pair(fields: &[u8]) -> Option<(i32, i32)> {
    let comma = fields.iter().position(|&b| b == b',')?;
    let first = parse_int(&fields[..comma])?;
    let second = parse_int(&fields[comma + 1..])?;
    Some((first, second))
}

fn parse_int(field: &[u8]) -> Option<i32> {
    let text = core::str::from_utf8(field).ok()?.trim();
    if text.is_empty() {
        return None;
    }
    text.parse().ok()
}
