//! RESP2 command encoder and reply decoder.
//!
//! Only the client half of the protocol lives here: commands go out as
//! arrays of bulk strings, replies come back as any RESP2 type.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};
use crate::types::Value;

/// Encode a command as a RESP2 array of bulk strings.
///
/// This is the only shape a Redis-compatible server accepts for commands.
///
/// # Example wire format
/// ```text
/// *3\r\n$3\r\nSET\r\n$3\r\nkey\r\n$5\r\nvalue\r\n
/// ```
pub fn encode_command(args: &[Bytes], buf: &mut BytesMut) {
    // *<count>\r\n
    buf.put_u8(b'*');
    buf.put_slice(args.len().to_string().as_bytes());
    buf.put_slice(b"\r\n");

    for arg in args {
        // $<len>\r\n<data>\r\n
        buf.put_u8(b'$');
        buf.put_slice(arg.len().to_string().as_bytes());
        buf.put_slice(b"\r\n");
        buf.put_slice(arg);
        buf.put_slice(b"\r\n");
    }
}

/// Decode one reply from the front of `buf`.
///
/// Returns `Ok(None)` and leaves `buf` untouched until the whole reply has
/// arrived. Error replies decode to [`Value::Error`] at any depth; the
/// connection turns a top-level one into [`Error::Server`].
pub fn decode_value(buf: &mut BytesMut) -> Result<Option<Value>> {
    match parse(&buf[..], 0)? {
        Some((value, end)) => {
            buf.advance(end);
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

/// Parse the reply starting at `pos`, returning it with the offset just past
/// its last byte.
fn parse(buf: &[u8], pos: usize) -> Result<Option<(Value, usize)>> {
    let kind = match buf.get(pos) {
        Some(&kind @ (b'+' | b'-' | b':' | b'$' | b'*')) => kind,
        Some(&other) => {
            return Err(Error::Protocol(format!(
                "unexpected reply type byte 0x{:02x}",
                other
            )))
        }
        None => return Ok(None),
    };
    let Some((header, body)) = line(buf, pos + 1) else {
        return Ok(None);
    };

    match kind {
        b'+' => Ok(Some((Value::Status(text(header)?), body))),
        b'-' => Ok(Some((Value::Error(text(header)?), body))),
        b':' => Ok(Some((Value::Integer(decimal(header)?), body))),
        b'$' => match length(header, "bulk string")? {
            None => Ok(Some((Value::Nil, body))),
            Some(len) => {
                let stop = body
                    .checked_add(len)
                    .and_then(|end| end.checked_add(2))
                    .ok_or_else(|| Error::Protocol("bulk string length overflow".into()))?;
                match buf.get(stop - 2..stop) {
                    None => Ok(None),
                    Some(b"\r\n") => Ok(Some((
                        Value::String(Bytes::copy_from_slice(&buf[body..stop - 2])),
                        stop,
                    ))),
                    Some(_) => Err(Error::Protocol("bulk string not terminated by CRLF".into())),
                }
            }
        },
        _ => match length(header, "array")? {
            None => Ok(Some((Value::Nil, body))),
            Some(count) => {
                let mut items = Vec::with_capacity(count.min(64));
                let mut next = body;
                for _ in 0..count {
                    match parse(buf, next)? {
                        Some((item, after)) => {
                            items.push(item);
                            next = after;
                        }
                        None => return Ok(None),
                    }
                }
                Ok(Some((Value::Array(items), next)))
            }
        },
    }
}

/// The bytes from `start` up to the next CRLF, and the offset after it.
fn line(buf: &[u8], start: usize) -> Option<(&[u8], usize)> {
    let rest = buf.get(start..)?;
    let end = rest.windows(2).position(|w| w == b"\r\n")?;
    Some((&rest[..end], start + end + 2))
}

fn text(raw: &[u8]) -> Result<String> {
    String::from_utf8(raw.to_vec()).map_err(|e| Error::Protocol(format!("invalid UTF-8: {}", e)))
}

fn decimal(raw: &[u8]) -> Result<i64> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| Error::Protocol(format!("invalid integer: {}", String::from_utf8_lossy(raw))))
}

/// A bulk or array length header. `-1` is the null reply.
fn length(raw: &[u8], what: &str) -> Result<Option<usize>> {
    match decimal(raw)? {
        -1 => Ok(None),
        n if n < 0 => Err(Error::Protocol(format!("negative {} length", what))),
        n => usize::try_from(n)
            .map(Some)
            .map_err(|_| Error::Protocol(format!("{} length too large", what))),
    }
}
