//! Minimal STOMP 1.2 frame codec.
//!
//! Covers the frames a chat client needs. Header values are escaped per
//! STOMP 1.2 except on CONNECT and CONNECTED, where the protocol forbids
//! it. A WebSocket message holding only end-of-line bytes is a heart-beat
//! and decodes to `None`.

use std::fmt;
use std::time::Duration;

use super::error::RealtimeError;

/// Client and server commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Connect,
    Connected,
    Subscribe,
    Unsubscribe,
    Send,
    Message,
    Receipt,
    Error,
    Disconnect,
}

impl Command {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Connected => "CONNECTED",
            Self::Subscribe => "SUBSCRIBE",
            Self::Unsubscribe => "UNSUBSCRIBE",
            Self::Send => "SEND",
            Self::Message => "MESSAGE",
            Self::Receipt => "RECEIPT",
            Self::Error => "ERROR",
            Self::Disconnect => "DISCONNECT",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "CONNECT" | "STOMP" => Self::Connect,
            "CONNECTED" => Self::Connected,
            "SUBSCRIBE" => Self::Subscribe,
            "UNSUBSCRIBE" => Self::Unsubscribe,
            "SEND" => Self::Send,
            "MESSAGE" => Self::Message,
            "RECEIPT" => Self::Receipt,
            "ERROR" => Self::Error,
            "DISCONNECT" => Self::Disconnect,
            _ => return None,
        })
    }

    const fn escapes_headers(self) -> bool {
        !matches!(self, Self::Connect | Self::Connected)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single STOMP frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    pub const fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Value of the first header named `name`; repeated headers after the
    /// first are ignored.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// CONNECT frame carrying the bearer token and heart-beat offer.
    pub fn connect(host: &str, token: Option<&str>, heartbeat: Duration) -> Self {
        let beat = heartbeat.as_millis().to_string();
        let frame = Self::new(Command::Connect)
            .header("accept-version", "1.2")
            .header("host", host)
            .header("heart-beat", format!("{beat},{beat}"));
        match token {
            Some(token) => frame.header("Authorization", format!("Bearer {token}")),
            None => frame,
        }
    }

    pub fn subscribe(id: &str, destination: &str) -> Self {
        Self::new(Command::Subscribe)
            .header("id", id)
            .header("destination", destination)
            .header("ack", "auto")
    }

    pub fn unsubscribe(id: &str) -> Self {
        Self::new(Command::Unsubscribe).header("id", id)
    }

    pub fn send(destination: &str, body: impl Into<String>) -> Self {
        let body = body.into();
        Self::new(Command::Send)
            .header("destination", destination)
            .header("content-type", "application/json")
            .header("content-length", body.len().to_string())
            .body(body)
    }

    pub fn disconnect() -> Self {
        Self::new(Command::Disconnect)
    }

    /// Serialize to wire text, NUL-terminated.
    pub fn encode(&self) -> String {
        let escape = self.command.escapes_headers();
        let mut out = String::with_capacity(self.body.len() + 64);
        out.push_str(self.command.as_str());
        out.push('\n');
        for (name, value) in &self.headers {
            if escape {
                out.push_str(&escape_header(name));
                out.push(':');
                out.push_str(&escape_header(value));
            } else {
                out.push_str(name);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }

    /// Parse one frame. Heart-beats (bare EOLs) yield `Ok(None)`.
    pub fn decode(input: &str) -> Result<Option<Self>, RealtimeError> {
        let input = input.trim_start_matches(['\r', '\n']);
        if input.is_empty() {
            return Ok(None);
        }

        let (head, rest) = split_head(input)
            .ok_or_else(|| RealtimeError::Protocol("frame has no header terminator".into()))?;

        let mut lines = head.lines();
        let command_line = lines.next().unwrap_or_default().trim_end_matches('\r');
        let command = Command::parse(command_line)
            .ok_or_else(|| RealtimeError::Protocol(format!("unknown command {command_line:?}")))?;

        let unescape = command.escapes_headers();
        let mut headers = Vec::new();
        for line in lines {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| RealtimeError::Protocol(format!("malformed header {line:?}")))?;
            if unescape {
                headers.push((unescape_header(name)?, unescape_header(value)?));
            } else {
                headers.push((name.to_string(), value.to_string()));
            }
        }

        let mut frame = Self {
            command,
            headers,
            body: String::new(),
        };

        let body = match frame.get("content-length").map(str::parse::<usize>) {
            Some(Ok(len)) => rest
                .get(..len)
                .ok_or_else(|| RealtimeError::Protocol("body shorter than content-length".into()))?,
            Some(Err(_)) => {
                return Err(RealtimeError::Protocol("invalid content-length".into()));
            }
            None => rest.split('\0').next().unwrap_or_default(),
        };
        frame.body = body.to_string();
        Ok(Some(frame))
    }
}

/// Split at the blank line ending the header block, tolerating CRLF.
fn split_head(input: &str) -> Option<(&str, &str)> {
    let lf = input.find("\n\n").map(|i| (i, 2));
    let crlf = input.find("\r\n\r\n").map(|i| (i, 4));
    let (idx, sep) = match (lf, crlf) {
        (Some(a), Some(b)) => {
            if a.0 <= b.0 {
                a
            } else {
                b
            }
        }
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => {
            // Frame with no headers and no body, e.g. "DISCONNECT\n\0"
            let trimmed = input.trim_end_matches('\0').trim_end_matches(['\r', '\n']);
            return (!trimmed.contains('\n')).then_some((trimmed, ""));
        }
    };
    Some((&input[..idx], &input[idx + sep..]))
}

fn escape_header(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_header(value: &str) -> Result<String, RealtimeError> {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            other => {
                return Err(RealtimeError::Protocol(format!(
                    "invalid header escape \\{}",
                    other.map(String::from).unwrap_or_default()
                )));
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn send_frame_wire_format() {
        let wire = Frame::send("/app/chat.send", r#"{"a":1}"#).encode();
        assert_eq!(
            wire,
            "SEND\ndestination:/app/chat.send\ncontent-type:application/json\ncontent-length:7\n\n{\"a\":1}\0"
        );
    }

    #[test]
    fn connect_headers_are_not_escaped() {
        let wire = Frame::connect("localhost:8080", Some("a:b"), Duration::from_secs(10)).encode();
        assert!(wire.starts_with("CONNECT\naccept-version:1.2\n"));
        assert!(wire.contains("heart-beat:10000,10000\n"));
        assert!(wire.contains("Authorization:Bearer a:b\n"));
    }

    #[test]
    fn decodes_message_frame() {
        let wire = "MESSAGE\ndestination:/topic/chat/5\nmessage-id:7\nsubscription:sub-0\n\n{\"id\":1}\0";
        let frame = Frame::decode(wire).unwrap().unwrap();
        assert_eq!(frame.command, Command::Message);
        assert_eq!(frame.get("destination"), Some("/topic/chat/5"));
        assert_eq!(frame.body, "{\"id\":1}");
    }

    #[test]
    fn heartbeat_decodes_to_none() {
        assert!(Frame::decode("\n").unwrap().is_none());
        assert!(Frame::decode("\r\n").unwrap().is_none());
        assert!(Frame::decode("").unwrap().is_none());
    }

    #[test]
    fn leading_heartbeat_before_frame_is_skipped() {
        let frame = Frame::decode("\n\nRECEIPT\nreceipt-id:r1\n\n\0").unwrap().unwrap();
        assert_eq!(frame.command, Command::Receipt);
        assert_eq!(frame.get("receipt-id"), Some("r1"));
    }

    #[test]
    fn header_escaping_survives_the_wire() {
        let frame = Frame::new(Command::Send)
            .header("destination", "/app/x")
            .header("note", "a:b\\c\nd");
        let wire = frame.encode();
        assert!(wire.contains("note:a\\cb\\\\c\\nd\n"));
        assert_eq!(Frame::decode(&wire).unwrap().unwrap(), frame);
    }

    #[test]
    fn invalid_escape_is_a_protocol_error() {
        let err = Frame::decode("MESSAGE\nbad:\\t\n\n\0").unwrap_err();
        assert!(matches!(err, RealtimeError::Protocol(_)));
    }

    #[test]
    fn repeated_header_first_wins() {
        let frame = Frame::decode("MESSAGE\nfoo:1\nfoo:2\n\nx\0").unwrap().unwrap();
        assert_eq!(frame.get("foo"), Some("1"));
    }

    #[test]
    fn content_length_bounds_body() {
        let frame = Frame::decode("MESSAGE\ncontent-length:3\n\nab\0c\0").unwrap().unwrap();
        assert_eq!(frame.body, "ab\0");
    }

    #[test]
    fn crlf_line_endings_are_accepted() {
        let frame = Frame::decode("ERROR\r\nmessage:denied\r\n\r\nno\0").unwrap().unwrap();
        assert_eq!(frame.command, Command::Error);
        assert_eq!(frame.get("message"), Some("denied"));
        assert_eq!(frame.body, "no");
    }

    #[test]
    fn bare_command_frame() {
        let frame = Frame::decode("DISCONNECT\n\0").unwrap().unwrap();
        assert_eq!(frame.command, Command::Disconnect);
        assert!(frame.headers.is_empty());
    }

    #[test]
    fn unknown_command_is_rejected() {
        assert!(Frame::decode("HELLO\n\n\0").is_err());
    }
}
