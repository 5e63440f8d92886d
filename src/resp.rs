//! RESP frame codec.
//!
//! Every value that crosses the wire is one of five frame shapes, each
//! introduced by a one-byte tag and terminated by CRLF. The decoder consumes
//! exactly the prefix that encoded the frame and reports how many bytes it
//! took, so callers can split pipelined requests out of a single read buffer.

use thiserror::Error;

/// Maximum array nesting accepted by the decoder.
const MAX_DEPTH: usize = 32;

#[derive(Error, Debug, PartialEq)]
pub enum RespError {
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("invalid frame tag {0:#04x}")]
    InvalidTag(u8),
    #[error("invalid length")]
    InvalidLength,
    #[error("invalid frame terminator")]
    InvalidTerminator,
    #[error("frame nesting too deep")]
    TooDeep,
    #[error("invalid UTF-8 sequence")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}

impl RespError {
    /// Renders the error as an encoded simple-error frame, ready to write
    /// back to the client.
    pub fn as_string(&self) -> String {
        RespValue::Error(format!("ERR {}", self)).encode()
    }
}

/// One unit of the wire protocol.
///
/// `NullBulkString` (`$-1\r\n`) is distinct from `BulkString(String::new())`
/// (`$0\r\n\r\n`): the former means "missing", the latter "present but
/// empty". Handlers pick which to emit; the codec serializes what it is
/// given.
#[derive(Debug, PartialEq, Clone)]
pub enum RespValue {
    SimpleString(String),
    Error(String),
    Integer(i64),
    BulkString(String),
    NullBulkString,
    Array(Vec<RespValue>),
    NullArray,
}

impl RespValue {
    /// Decodes one frame from the front of `input`.
    ///
    /// Returns the frame together with the number of bytes it occupied;
    /// trailing bytes are left untouched. `RespError::UnexpectedEof` means
    /// the buffer holds a truncated frame and more bytes should be read
    /// before retrying.
    pub fn decode(input: &[u8]) -> Result<(RespValue, usize), RespError> {
        decode_frame(input, 0)
    }

    /// Serializes the frame to its wire form.
    pub fn encode(&self) -> String {
        match self {
            RespValue::SimpleString(data) => format!("+{}\r\n", data),
            RespValue::Error(data) => format!("-{}\r\n", data),
            RespValue::Integer(value) => format!(":{}\r\n", value),
            RespValue::BulkString(data) => format!("${}\r\n{}\r\n", data.len(), data),
            RespValue::NullBulkString => "$-1\r\n".to_string(),
            RespValue::Array(elements) => {
                let mut encoded = format!("*{}\r\n", elements.len());
                for element in elements {
                    encoded.push_str(&element.encode());
                }
                encoded
            }
            RespValue::NullArray => "*-1\r\n".to_string(),
        }
    }

    /// Builds a request frame from a command name and its arguments: an
    /// array of bulk strings, the shape every client request takes.
    pub fn command<I, S>(parts: I) -> RespValue
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RespValue::Array(
            parts
                .into_iter()
                .map(|part| RespValue::BulkString(part.into()))
                .collect(),
        )
    }
}

fn decode_frame(input: &[u8], depth: usize) -> Result<(RespValue, usize), RespError> {
    if depth > MAX_DEPTH {
        return Err(RespError::TooDeep);
    }

    let Some(&tag) = input.first() else {
        return Err(RespError::UnexpectedEof);
    };
    let body = &input[1..];

    match tag {
        b'+' => {
            let (line, consumed) = read_line(body)?;
            Ok((RespValue::SimpleString(line.to_string()), consumed + 1))
        }
        b'-' => {
            let (line, consumed) = read_line(body)?;
            Ok((RespValue::Error(line.to_string()), consumed + 1))
        }
        b':' => {
            let (line, consumed) = read_line(body)?;
            let value = line.parse::<i64>().map_err(|_| RespError::InvalidLength)?;
            Ok((RespValue::Integer(value), consumed + 1))
        }
        b'$' => decode_bulk_string(body).map(|(frame, consumed)| (frame, consumed + 1)),
        b'*' => decode_array(body, depth).map(|(frame, consumed)| (frame, consumed + 1)),
        other => Err(RespError::InvalidTag(other)),
    }
}

fn decode_bulk_string(body: &[u8]) -> Result<(RespValue, usize), RespError> {
    let (length, header_consumed) = read_length(body)?;

    let Some(length) = length else {
        return Ok((RespValue::NullBulkString, header_consumed));
    };

    let payload_end = header_consumed + length;
    if body.len() < payload_end + 2 {
        return Err(RespError::UnexpectedEof);
    }
    if &body[payload_end..payload_end + 2] != b"\r\n" {
        return Err(RespError::InvalidTerminator);
    }

    let payload = std::str::from_utf8(&body[header_consumed..payload_end])?;
    Ok((RespValue::BulkString(payload.to_string()), payload_end + 2))
}

fn decode_array(body: &[u8], depth: usize) -> Result<(RespValue, usize), RespError> {
    let (count, header_consumed) = read_length(body)?;

    let Some(count) = count else {
        return Ok((RespValue::NullArray, header_consumed));
    };

    let mut elements = Vec::with_capacity(count);
    let mut consumed = header_consumed;

    for _ in 0..count {
        let (element, element_consumed) = decode_frame(&body[consumed..], depth + 1)?;
        elements.push(element);
        consumed += element_consumed;
    }

    Ok((RespValue::Array(elements), consumed))
}

/// Parses the `<len>\r\n` header of a bulk string or array. `None` stands for
/// the null sentinel length -1; any other negative length is malformed.
fn read_length(body: &[u8]) -> Result<(Option<usize>, usize), RespError> {
    let (line, consumed) = read_line(body)?;
    let length = line.parse::<i64>().map_err(|_| RespError::InvalidLength)?;

    match length {
        -1 => Ok((None, consumed)),
        len if len < 0 => Err(RespError::InvalidLength),
        len => Ok((Some(len as usize), consumed)),
    }
}

/// Reads up to the next CRLF, returning the line content and the bytes
/// consumed including the terminator. Bare CR or LF inside the line is
/// malformed.
fn read_line(body: &[u8]) -> Result<(&str, usize), RespError> {
    for (index, &byte) in body.iter().enumerate() {
        match byte {
            b'\r' => {
                return match body.get(index + 1) {
                    Some(b'\n') => Ok((std::str::from_utf8(&body[..index])?, index + 2)),
                    Some(_) => Err(RespError::InvalidTerminator),
                    None => Err(RespError::UnexpectedEof),
                };
            }
            b'\n' => return Err(RespError::InvalidTerminator),
            _ => {}
        }
    }

    Err(RespError::UnexpectedEof)
}

#[cfg(test)]
mod tests {
    use super::{RespError, RespValue};

    #[test]
    fn test_decode() {
        let test_cases: Vec<(&[u8], Result<(RespValue, usize), RespError>)> = vec![
            (b"+OK\r\n", Ok((RespValue::SimpleString("OK".to_string()), 5))),
            (b"+\r\n", Ok((RespValue::SimpleString(String::new()), 3))),
            (
                b"-ERR oops\r\n",
                Ok((RespValue::Error("ERR oops".to_string()), 11)),
            ),
            (b":1000\r\n", Ok((RespValue::Integer(1000), 7))),
            (b":-42\r\n", Ok((RespValue::Integer(-42), 6))),
            (
                b"$5\r\nmango\r\n",
                Ok((RespValue::BulkString("mango".to_string()), 11)),
            ),
            (b"$0\r\n\r\n", Ok((RespValue::BulkString(String::new()), 6))),
            (b"$-1\r\n", Ok((RespValue::NullBulkString, 5))),
            (b"*-1\r\n", Ok((RespValue::NullArray, 5))),
            (b"*0\r\n", Ok((RespValue::Array(Vec::new()), 4))),
            (
                b"*2\r\n$4\r\nECHO\r\n$3\r\nhey\r\n",
                Ok((
                    RespValue::Array(vec![
                        RespValue::BulkString("ECHO".to_string()),
                        RespValue::BulkString("hey".to_string()),
                    ]),
                    23,
                )),
            ),
            (
                b"*2\r\n*1\r\n:1\r\n+OK\r\n",
                Ok((
                    RespValue::Array(vec![
                        RespValue::Array(vec![RespValue::Integer(1)]),
                        RespValue::SimpleString("OK".to_string()),
                    ]),
                    17,
                )),
            ),
            (b"", Err(RespError::UnexpectedEof)),
            (b"+OK", Err(RespError::UnexpectedEof)),
            (b"+OK\r", Err(RespError::UnexpectedEof)),
            (b"$5\r\nman", Err(RespError::UnexpectedEof)),
            (b"*2\r\n$4\r\nECHO\r\n", Err(RespError::UnexpectedEof)),
            (b"?what\r\n", Err(RespError::InvalidTag(b'?'))),
            (b"$abc\r\n", Err(RespError::InvalidLength)),
            (b"$-2\r\n", Err(RespError::InvalidLength)),
            (b":ten\r\n", Err(RespError::InvalidLength)),
            (b"+bare\nnewline\r\n", Err(RespError::InvalidTerminator)),
            (b"$5\r\nmangoXX", Err(RespError::InvalidTerminator)),
        ];

        for (input, expected) in test_cases {
            assert_eq!(
                RespValue::decode(input),
                expected,
                "decoding {:?}",
                String::from_utf8_lossy(input)
            );
        }
    }

    #[test]
    fn test_decode_leaves_trailing_bytes() {
        let input = b"+PONG\r\n$3\r\nhey\r\n";
        let (frame, consumed) = RespValue::decode(input).unwrap();

        assert_eq!(frame, RespValue::SimpleString("PONG".to_string()));
        assert_eq!(&input[consumed..], b"$3\r\nhey\r\n");
    }

    #[test]
    fn test_decode_rejects_deep_nesting() {
        let mut input = Vec::new();
        for _ in 0..64 {
            input.extend_from_slice(b"*1\r\n");
        }
        input.extend_from_slice(b":1\r\n");

        assert_eq!(RespValue::decode(&input), Err(RespError::TooDeep));
    }

    #[test]
    fn test_encode() {
        let test_cases = vec![
            (RespValue::SimpleString("OK".to_string()), "+OK\r\n"),
            (RespValue::Error("ERR oops".to_string()), "-ERR oops\r\n"),
            (RespValue::Integer(-7), ":-7\r\n"),
            (RespValue::BulkString("mango".to_string()), "$5\r\nmango\r\n"),
            (RespValue::BulkString(String::new()), "$0\r\n\r\n"),
            (RespValue::NullBulkString, "$-1\r\n"),
            (RespValue::NullArray, "*-1\r\n"),
            (
                RespValue::Array(vec![
                    RespValue::BulkString("GET".to_string()),
                    RespValue::BulkString("mango".to_string()),
                ]),
                "*2\r\n$3\r\nGET\r\n$5\r\nmango\r\n",
            ),
        ];

        for (frame, expected) in test_cases {
            assert_eq!(frame.encode(), expected, "encoding {:?}", frame);
        }
    }

    #[test]
    fn test_round_trip() {
        let frames = vec![
            RespValue::SimpleString("PONG".to_string()),
            RespValue::Error("ERR EXEC without MULTI".to_string()),
            RespValue::Integer(i64::MIN),
            RespValue::Integer(i64::MAX),
            RespValue::BulkString("hello world".to_string()),
            RespValue::BulkString(String::new()),
            RespValue::NullBulkString,
            RespValue::NullArray,
            RespValue::Array(Vec::new()),
            RespValue::Array(vec![
                RespValue::Integer(1),
                RespValue::NullBulkString,
                RespValue::Array(vec![RespValue::SimpleString("nested".to_string())]),
            ]),
        ];

        for frame in frames {
            let encoded = frame.encode();
            let (decoded, consumed) = RespValue::decode(encoded.as_bytes()).unwrap();
            assert_eq!(decoded, frame, "round-tripping {:?}", frame);
            assert_eq!(consumed, encoded.len(), "consumed length for {:?}", frame);
        }
    }

    #[test]
    fn test_command_builder() {
        assert_eq!(
            RespValue::command(["SET", "mango", "apple"]).encode(),
            "*3\r\n$3\r\nSET\r\n$5\r\nmango\r\n$5\r\napple\r\n"
        );
    }
}
