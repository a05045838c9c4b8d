//! Minimal gRPC-Web framing and protobuf codec for the user directory calls.
//!
//! Only length-delimited string fields are produced; decoding skips any field
//! it does not know so newer servers stay compatible.

use std::fmt;

/// Frame flag marking a data frame.
pub const FLAG_DATA: u8 = 0x00;
/// Frame flag bit marking a trailer frame.
pub const FLAG_TRAILER: u8 = 0x80;

const WIRE_VARINT: u64 = 0;
const WIRE_FIXED64: u64 = 1;
const WIRE_LEN: u64 = 2;
const WIRE_FIXED32: u64 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireError(pub String);

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for WireError {}

fn err(msg: impl Into<String>) -> WireError {
    WireError(msg.into())
}

pub fn put_varint(buf: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

fn take_varint(data: &[u8], pos: &mut usize) -> Result<u64, WireError> {
    let mut value = 0u64;
    for shift in (0..64).step_by(7) {
        let byte = *data.get(*pos).ok_or_else(|| err("truncated varint"))?;
        *pos += 1;
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(err("varint overflow"))
}

fn take_bytes<'a>(data: &'a [u8], pos: &mut usize, len: usize) -> Result<&'a [u8], WireError> {
    let end = pos
        .checked_add(len)
        .filter(|end| *end <= data.len())
        .ok_or_else(|| err("truncated field"))?;
    let bytes = &data[*pos..end];
    *pos = end;
    Ok(bytes)
}

/// Append a length-delimited string field.
pub fn put_string(buf: &mut Vec<u8>, field: u32, value: &str) {
    put_varint(buf, (u64::from(field) << 3) | WIRE_LEN);
    put_varint(buf, value.len() as u64);
    buf.extend_from_slice(value.as_bytes());
}

/// `TokenRequest { string access_token = 1; }`
pub fn encode_token_request(access_token: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(access_token.len() + 4);
    put_string(&mut buf, 1, access_token);
    buf
}

/// `UserResponse { string id = 1; string username = 2; string email = 3; }`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: String,
}

impl UserResponse {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for (field, value) in [(1, &self.id), (2, &self.username), (3, &self.email)] {
            if !value.is_empty() {
                put_string(&mut buf, field, value);
            }
        }
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut msg = Self::default();
        let mut pos = 0;
        while pos < data.len() {
            let tag = take_varint(data, &mut pos)?;
            let field = tag >> 3;
            match tag & 0x7 {
                WIRE_VARINT => {
                    take_varint(data, &mut pos)?;
                }
                WIRE_FIXED64 => {
                    take_bytes(data, &mut pos, 8)?;
                }
                WIRE_FIXED32 => {
                    take_bytes(data, &mut pos, 4)?;
                }
                WIRE_LEN => {
                    let len = take_varint(data, &mut pos)? as usize;
                    let bytes = take_bytes(data, &mut pos, len)?;
                    let slot = match field {
                        1 => &mut msg.id,
                        2 => &mut msg.username,
                        3 => &mut msg.email,
                        _ => continue,
                    };
                    *slot = String::from_utf8(bytes.to_vec())
                        .map_err(|_| err(format!("field {field} is not UTF-8")))?;
                }
                other => return Err(err(format!("unsupported wire type {other}"))),
            }
        }
        Ok(msg)
    }
}

/// One gRPC-Web frame: `[flag][u32 BE length][payload]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub flag: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn is_trailer(&self) -> bool {
        self.flag & FLAG_TRAILER != 0
    }
}

pub fn encode_frame(flag: u8, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(payload.len() + 5);
    buf.push(flag);
    buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buf.extend_from_slice(payload);
    buf
}

pub fn decode_frames(mut data: &[u8]) -> Result<Vec<Frame>, WireError> {
    let mut frames = Vec::new();
    while !data.is_empty() {
        if data.len() < 5 {
            return Err(err(format!("response too short: {} bytes", data.len())));
        }
        let len = u32::from_be_bytes([data[1], data[2], data[3], data[4]]) as usize;
        let rest = &data[5..];
        if rest.len() < len {
            return Err(err(format!(
                "frame incomplete: expected {len} bytes, got {}",
                rest.len()
            )));
        }
        frames.push(Frame {
            flag: data[0],
            payload: rest[..len].to_vec(),
        });
        data = &rest[len..];
    }
    Ok(frames)
}

/// Extract `(grpc-status, grpc-message)` from a trailer frame payload.
pub fn parse_trailer(payload: &[u8]) -> (Option<u32>, Option<String>) {
    let text = String::from_utf8_lossy(payload);
    let mut status = None;
    let mut message = None;
    for line in text.split("\r\n").flat_map(|l| l.split('\n')) {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        match name.trim().to_ascii_lowercase().as_str() {
            "grpc-status" => status = value.trim().parse().ok(),
            "grpc-message" => message = Some(value.trim().to_string()),
            _ => {}
        }
    }
    (status, message)
}
