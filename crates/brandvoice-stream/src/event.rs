/// Prefix that marks a line as carrying a payload.
pub const DATA_PREFIX: &str = "data: ";

/// Payload value that marks logical end of stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// One event of the `data: <text>` line protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamEvent<'a> {
    /// Text fragment to append, prefix removed. May be empty.
    Payload(&'a str),
    /// The `[DONE]` sentinel.
    Done,
}

/// Parses one line of the protocol.
///
/// Returns `None` for lines without the `data: ` prefix. A trailing `\r` is
/// dropped so CRLF transports parse the same as LF ones.
pub fn parse_line(line: &str) -> Option<StreamEvent<'_>> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let payload = line.strip_prefix(DATA_PREFIX)?;
    if payload == DONE_SENTINEL {
        Some(StreamEvent::Done)
    } else {
        Some(StreamEvent::Payload(payload))
    }
}

/// Splits one decoded chunk into protocol events.
///
/// Lines are split on `\n` within the chunk; the chunk's last line is used
/// even when it is not newline-terminated. Events after `Done` are not
/// returned.
pub fn chunk_events(text: &str) -> Vec<StreamEvent<'_>> {
    let mut events = Vec::new();
    for line in text.split('\n') {
        match parse_line(line) {
            Some(StreamEvent::Done) => {
                events.push(StreamEvent::Done);
                break;
            }
            Some(event) => events.push(event),
            None => {}
        }
    }
    events
}
