//! Squid logfile daemon line protocol
//!
//! Every line starts with a one byte command tag. Only `L` (append) is acted
//! on; rotation, truncation, flush and buffering commands are meaningless for
//! a database backend and are skipped.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, error};

use crate::db::{AccessLogStore, AppendRecord};

/// Command tag of an append line.
pub const APPEND_TAG: u8 = b'L';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `L`: payload with the tag position blanked out
    Append(String),
    /// Any other tag, kept for tracing only
    Other(u8),
    Empty,
}

impl Command {
    /// Decode one line without its terminator. The tag byte is overwritten
    /// with a space rather than sliced off so field splitting sees the same
    /// shape whatever follows the tag.
    pub fn parse(line: &[u8]) -> Self {
        match line.first() {
            None => Command::Empty,
            Some(&APPEND_TAG) => {
                let mut payload = line.to_vec();
                payload[0] = b' ';
                Command::Append(String::from_utf8_lossy(&payload).into_owned())
            }
            Some(&tag) => Command::Other(tag),
        }
    }
}

/// Counters for one run of the daemon.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub appended: u64,
    pub failed: u64,
    pub ignored: u64,
}

fn strip_line_ending(buf: &mut Vec<u8>) {
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
}

/// Read commands until end of input, inserting every append into `store`.
///
/// Per-record failures are logged with the offending values and never end
/// the loop. A read error is reported and treated as end of input.
pub async fn run<R>(mut input: R, store: &mut AccessLogStore) -> SessionStats
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = SessionStats::default();
    let mut line = Vec::new();

    loop {
        line.clear();
        match input.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                error!(error = %e, "Failed to read from input, stopping");
                break;
            }
        }
        strip_line_ending(&mut line);

        match Command::parse(&line) {
            Command::Append(payload) => {
                let record = AppendRecord::parse(&payload);
                match store.append(&record).await {
                    Ok(_) => stats.appended += 1,
                    Err(e) => {
                        stats.failed += 1;
                        error!(
                            error = %e,
                            table = store.table(),
                            values = ?record.values(),
                            "Failed to insert access log record"
                        );
                    }
                }
            }
            Command::Other(tag) => {
                stats.ignored += 1;
                debug!(tag = %char::from(tag), "Ignoring command");
            }
            Command::Empty => {
                stats.ignored += 1;
            }
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_keeps_tag_position_blank() {
        assert_eq!(
            Command::parse(b"L1 2 3"),
            Command::Append(" 1 2 3".to_string())
        );
        assert_eq!(Command::parse(b"L"), Command::Append(" ".to_string()));
    }

    #[test]
    fn other_tags_and_empty_lines() {
        assert_eq!(Command::parse(b"R"), Command::Other(b'R'));
        assert_eq!(Command::parse(b"l 1 2"), Command::Other(b'l'));
        assert_eq!(Command::parse(b" L"), Command::Other(b' '));
        assert_eq!(Command::parse(b""), Command::Empty);
    }

    #[test]
    fn invalid_utf8_is_replaced_not_rejected() {
        match Command::parse(b"L a \xff b") {
            Command::Append(payload) => assert_eq!(payload, "  a \u{fffd} b"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn line_endings_are_stripped() {
        let mut crlf = b"L x\r\n".to_vec();
        strip_line_ending(&mut crlf);
        assert_eq!(crlf, b"L x");

        let mut bare = b"L x".to_vec();
        strip_line_ending(&mut bare);
        assert_eq!(bare, b"L x");
    }
}
