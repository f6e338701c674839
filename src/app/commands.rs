//! Outbound AT commands.
//!
//! Every pub/sub request the driver issues is one of these.  Each encodes
//! to a single CRLF-terminated line and is answered by a bare `OK` /
//! `ERROR` (counted by the acknowledgement correlator) plus, for the
//! topic commands, an `+AWS...` acknowledgement URC.

use core::fmt::Write;

use heapless::String;

use crate::config::MAX_COMMAND_LEN;
use crate::error::TopicError;
use crate::registry::TopicIndex;

/// Command prefix shared by the whole AWS command set.
pub const COMMAND_PREFIX: &str = "AT+AWS";

/// Encoded command line.
pub type CommandLine = String<MAX_COMMAND_LEN>;

/// Commands the driver sends to the modem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModemCommand<'a> {
    /// `SUBOPEN=<idx>,"<topic>"`
    SubscribeOpen { index: TopicIndex, topic: &'a str },
    /// `SUBCLOSE=<idx>`
    SubscribeClose { index: TopicIndex },
    /// `PUBOPEN=<idx>,"<topic>"`
    PublishOpen { index: TopicIndex, topic: &'a str },
    /// `PUBCLOSE=<idx>`
    PublishClose { index: TopicIndex },
    /// `PUBLISH=<idx>,<len>`; the payload follows the `>` prompt.
    Publish { index: TopicIndex, len: usize },
}

impl ModemCommand<'_> {
    /// Render the full command line, CRLF included.
    pub fn encode(&self) -> Result<CommandLine, TopicError> {
        let mut line = CommandLine::new();
        let written = match *self {
            Self::SubscribeOpen { index, topic } => {
                validate_topic(topic)?;
                write!(line, "{COMMAND_PREFIX}SUBOPEN={index},\"{topic}\"\r\n")
            }
            Self::SubscribeClose { index } => write!(line, "{COMMAND_PREFIX}SUBCLOSE={index}\r\n"),
            Self::PublishOpen { index, topic } => {
                validate_topic(topic)?;
                write!(line, "{COMMAND_PREFIX}PUBOPEN={index},\"{topic}\"\r\n")
            }
            Self::PublishClose { index } => write!(line, "{COMMAND_PREFIX}PUBCLOSE={index}\r\n"),
            Self::Publish { index, len } => write!(line, "{COMMAND_PREFIX}PUBLISH={index},{len}\r\n"),
        };
        written.map_err(|_| TopicError::NameTooLong)?;
        Ok(line)
    }
}

/// Topic names are quoted on the wire, so quotes and line terminators
/// would corrupt the command.
fn validate_topic(topic: &str) -> Result<(), TopicError> {
    if topic.is_empty() || topic.contains(['"', '\r', '\n']) {
        return Err(TopicError::InvalidName);
    }
    Ok(())
}
