//! Line codec
//!
//! Frames the text protocol for `FramedRead` / `FramedWrite`.
//!
//! Input lines end with `\n`; a trailing `\r` is stripped and invalid UTF-8
//! is replaced. Lines longer than `max_length` bytes are truncated at a char
//! boundary and the remainder, up to the next `\n`, is discarded.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::AppError;
use crate::message::ServerMessage;

#[derive(Debug, Clone)]
pub struct LineCodec {
    max_length: usize,
    /// Inside the tail of a line that was already emitted truncated
    discarding: bool,
}

impl LineCodec {
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            discarding: false,
        }
    }

    fn finish(&self, raw: &[u8]) -> String {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        let mut line = String::from_utf8_lossy(raw).into_owned();
        if line.len() > self.max_length {
            let mut end = self.max_length;
            while !line.is_char_boundary(end) {
                end -= 1;
            }
            line.truncate(end);
        }
        line
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = AppError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>, AppError> {
        loop {
            match buf.iter().position(|b| *b == b'\n') {
                Some(pos) => {
                    let line = buf.split_to(pos + 1);
                    if self.discarding {
                        self.discarding = false;
                        continue;
                    }
                    return Ok(Some(self.finish(&line[..pos])));
                }
                None if self.discarding => {
                    buf.clear();
                    return Ok(None);
                }
                None if buf.len() > self.max_length => {
                    let line = buf.split_to(buf.len());
                    self.discarding = true;
                    return Ok(Some(self.finish(&line)));
                }
                None => return Ok(None),
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>, AppError> {
        if let Some(line) = self.decode(buf)? {
            return Ok(Some(line));
        }
        if buf.is_empty() || self.discarding {
            buf.clear();
            self.discarding = false;
            return Ok(None);
        }
        // Unterminated last line
        let line = buf.split_to(buf.len());
        Ok(Some(self.finish(&line)))
    }
}

impl Encoder<ServerMessage> for LineCodec {
    type Error = AppError;

    fn encode(&mut self, msg: ServerMessage, dst: &mut BytesMut) -> Result<(), AppError> {
        let text = msg.to_string();
        dst.reserve(text.len() + 1);
        dst.extend_from_slice(text.as_bytes());
        if msg.ends_line() {
            dst.extend_from_slice(b"\n");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(codec: &mut LineCodec, input: &[u8]) -> Vec<String> {
        let mut buf = BytesMut::from(input);
        let mut lines = Vec::new();
        while let Some(line) = codec.decode(&mut buf).unwrap() {
            lines.push(line);
        }
        while let Some(line) = codec.decode_eof(&mut buf).unwrap() {
            lines.push(line);
        }
        lines
    }

    #[test]
    fn test_decode_lines() {
        let mut codec = LineCodec::new(64);
        assert_eq!(
            decode_all(&mut codec, b"hello\r\n/join dev\n\n"),
            vec!["hello", "/join dev", ""]
        );
    }

    #[test]
    fn test_partial_line_waits() {
        let mut codec = LineCodec::new(64);
        let mut buf = BytesMut::from(&b"hel"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);

        buf.extend_from_slice(b"lo\n");
        assert_eq!(codec.decode(&mut buf).unwrap(), Some("hello".to_string()));
    }

    #[test]
    fn test_eof_flushes_last_line() {
        let mut codec = LineCodec::new(64);
        assert_eq!(decode_all(&mut codec, b"a\nbye"), vec!["a", "bye"]);
    }

    #[test]
    fn test_long_line_truncated() {
        let mut codec = LineCodec::new(4);
        assert_eq!(
            decode_all(&mut codec, b"abcdefgh\nxy\n"),
            vec!["abcd", "xy"]
        );
    }

    #[test]
    fn test_long_line_split_across_reads() {
        let mut codec = LineCodec::new(4);
        let mut buf = BytesMut::from(&b"abcdef"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), Some("abcd".to_string()));

        buf.extend_from_slice(b"ghij\nok\n");
        assert_eq!(codec.decode(&mut buf).unwrap(), Some("ok".to_string()));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_truncation_respects_char_boundary() {
        let mut codec = LineCodec::new(4);
        // "aéé" is 5 bytes; cutting at 4 would split the second é
        assert_eq!(decode_all(&mut codec, "aéé\n".as_bytes()), vec!["aé"]);
    }

    #[test]
    fn test_encode() {
        let mut codec = LineCodec::new(64);
        let mut buf = BytesMut::new();
        codec.encode(ServerMessage::Goodbye, &mut buf).unwrap();
        codec.encode(ServerMessage::Prompt, &mut buf).unwrap();
        assert_eq!(&buf[..], b"Goodbye.\nEnter handle: ");
    }
}
