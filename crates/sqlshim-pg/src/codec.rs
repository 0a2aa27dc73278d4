//! Codec for the PostgreSQL v3 wire protocol.
//!
//! Encoders append a complete frontend message to a growable buffer.
//! Decoders read backend message bodies through a bounds-checked [`Reader`],
//! so a truncated or malformed message becomes a protocol error instead of a panic.

use crate::error::{PgError, PgResult};
use crate::protocol::*;

/// Maximum size of a single backend message we'll accept (16 MB).
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

// ─── Encoding (Frontend → Server) ─────────────────────────────

/// Start a tagged message: writes the tag and a length placeholder.
/// Returns the offset of the length field for [`finish`].
fn begin(buf: &mut Vec<u8>, tag: u8) -> usize {
    buf.push(tag);
    let len_pos = buf.len();
    buf.extend_from_slice(&[0; 4]);
    len_pos
}

/// Patch the length field written by [`begin`] (length counts itself, not the tag).
fn finish(buf: &mut [u8], len_pos: usize) {
    let len = (buf.len() - len_pos) as i32;
    buf[len_pos..len_pos + 4].copy_from_slice(&len.to_be_bytes());
}

fn put_i16(buf: &mut Vec<u8>, value: i16) {
    buf.extend_from_slice(&value.to_be_bytes());
}

fn put_i32(buf: &mut Vec<u8>, value: i32) {
    buf.extend_from_slice(&value.to_be_bytes());
}

fn put_cstring(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(s.as_bytes());
    buf.push(0);
}

/// Encode a StartupMessage.
///
/// Format: Int32(len) Int32(196608=v3.0) { CString(param) CString(value) }* \0
pub fn encode_startup(buf: &mut Vec<u8>, user: &str, database: &str, params: &[(&str, &str)]) {
    let len_pos = buf.len();
    buf.extend_from_slice(&[0; 4]);
    put_i32(buf, PROTOCOL_VERSION);

    put_cstring(buf, "user");
    put_cstring(buf, user);
    put_cstring(buf, "database");
    put_cstring(buf, database);
    for (k, v) in params {
        put_cstring(buf, k);
        put_cstring(buf, v);
    }
    buf.push(0);

    finish(buf, len_pos);
}

/// Encode a PasswordMessage (cleartext or md5 response).
pub fn encode_password(buf: &mut Vec<u8>, password: &str) {
    let len_pos = begin(buf, b'p');
    put_cstring(buf, password);
    finish(buf, len_pos);
}

/// Encode a SASLInitialResponse message.
pub fn encode_sasl_initial(buf: &mut Vec<u8>, mechanism: &str, data: &[u8]) {
    let len_pos = begin(buf, b'p');
    put_cstring(buf, mechanism);
    put_i32(buf, data.len() as i32);
    buf.extend_from_slice(data);
    finish(buf, len_pos);
}

/// Encode a SASLResponse message (client-final-message).
pub fn encode_sasl_response(buf: &mut Vec<u8>, data: &[u8]) {
    let len_pos = begin(buf, b'p');
    buf.extend_from_slice(data);
    finish(buf, len_pos);
}

/// Encode a Simple Query message ('Q').
pub fn encode_query(buf: &mut Vec<u8>, sql: &str) {
    let len_pos = begin(buf, b'Q');
    put_cstring(buf, sql);
    finish(buf, len_pos);
}

/// Encode a Parse message ('P') for the extended query protocol.
pub fn encode_parse(buf: &mut Vec<u8>, stmt_name: &str, sql: &str, param_oids: &[u32]) {
    let len_pos = begin(buf, b'P');
    put_cstring(buf, stmt_name);
    put_cstring(buf, sql);
    put_i16(buf, param_oids.len() as i16);
    for &oid in param_oids {
        put_i32(buf, oid as i32);
    }
    finish(buf, len_pos);
}

/// Encode a Bind message ('B'). Every parameter and result column uses text format.
pub fn encode_bind(buf: &mut Vec<u8>, portal: &str, stmt_name: &str, params: &[Option<&[u8]>]) {
    let len_pos = begin(buf, b'B');
    put_cstring(buf, portal);
    put_cstring(buf, stmt_name);

    // zero parameter format codes: all text
    put_i16(buf, 0);

    put_i16(buf, params.len() as i16);
    for param in params {
        match param {
            Some(data) => {
                put_i32(buf, data.len() as i32);
                buf.extend_from_slice(data);
            }
            None => put_i32(buf, -1),
        }
    }

    // zero result format codes: all text
    put_i16(buf, 0);
    finish(buf, len_pos);
}

/// Encode a Describe message ('D').
pub fn encode_describe(buf: &mut Vec<u8>, target: Target, name: &str) {
    let len_pos = begin(buf, b'D');
    buf.push(target.as_byte());
    put_cstring(buf, name);
    finish(buf, len_pos);
}

/// Encode an Execute message ('E'). `max_rows == 0` fetches everything.
pub fn encode_execute(buf: &mut Vec<u8>, portal: &str, max_rows: i32) {
    let len_pos = begin(buf, b'E');
    put_cstring(buf, portal);
    put_i32(buf, max_rows);
    finish(buf, len_pos);
}

/// Encode a Close message ('C').
pub fn encode_close(buf: &mut Vec<u8>, target: Target, name: &str) {
    let len_pos = begin(buf, b'C');
    buf.push(target.as_byte());
    put_cstring(buf, name);
    finish(buf, len_pos);
}

/// Encode a Sync message ('S').
pub fn encode_sync(buf: &mut Vec<u8>) {
    let len_pos = begin(buf, b'S');
    finish(buf, len_pos);
}

/// Encode a Terminate message ('X').
pub fn encode_terminate(buf: &mut Vec<u8>) {
    let len_pos = begin(buf, b'X');
    finish(buf, len_pos);
}

// ─── Decoding (Server → Frontend) ─────────────────────────────

/// A decoded backend message header.
#[derive(Debug, Clone, Copy)]
pub struct MessageHeader {
    pub tag: BackendTag,
    /// Length including the 4-byte length field, excluding the tag byte.
    pub length: u32,
}

/// Try to read a message header from `buf`.
/// Returns None if not enough data is available.
pub fn decode_header(buf: &[u8]) -> Option<MessageHeader> {
    if buf.len() < 5 {
        return None;
    }
    let tag = BackendTag::from(buf[0]);
    let length = u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]);
    Some(MessageHeader { tag, length })
}

/// Total size (tag included) of the message at the front of `buf`, once the
/// whole message has arrived.
pub fn message_complete(buf: &[u8]) -> PgResult<Option<usize>> {
    let Some(header) = decode_header(buf) else {
        return Ok(None);
    };
    let total = 1 + header.length as usize;
    if header.length < 4 {
        return Err(PgError::Protocol(format!(
            "invalid message length {}",
            header.length
        )));
    }
    if total > MAX_MESSAGE_SIZE {
        return Err(PgError::BufferOverflow(total));
    }
    Ok((buf.len() >= total).then_some(total))
}

/// Bounds-checked cursor over a backend message body.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn bytes(&mut self, n: usize) -> PgResult<&'a [u8]> {
        if self.remaining() < n {
            return Err(PgError::Protocol(format!(
                "truncated message: wanted {} bytes, {} left",
                n,
                self.remaining()
            )));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn u8(&mut self) -> PgResult<u8> {
        Ok(self.bytes(1)?[0])
    }

    pub fn i16(&mut self) -> PgResult<i16> {
        let b = self.bytes(2)?;
        Ok(i16::from_be_bytes([b[0], b[1]]))
    }

    pub fn i32(&mut self) -> PgResult<i32> {
        let b = self.bytes(4)?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a NUL-terminated string.
    pub fn cstr(&mut self) -> PgResult<&'a str> {
        let rest = &self.buf[self.pos..];
        let end = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| PgError::Protocol("unterminated string".to_string()))?;
        let s = std::str::from_utf8(&rest[..end])
            .map_err(|_| PgError::Protocol("invalid UTF-8 in string".to_string()))?;
        self.pos += end + 1;
        Ok(s)
    }

    /// The unread tail of the body.
    pub fn rest(&mut self) -> &'a [u8] {
        let out = &self.buf[self.pos..];
        self.pos = self.buf.len();
        out
    }
}

/// A column descriptor from RowDescription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDesc {
    pub name: String,
    pub table_oid: u32,
    pub col_attr: i16,
    pub type_oid: u32,
    pub type_size: i16,
    pub type_modifier: i32,
    pub format_code: FormatCode,
}

/// Parse an ErrorResponse or NoticeResponse body into (field_type, value) pairs.
pub fn parse_error_fields(body: &[u8]) -> PgResult<Vec<(u8, String)>> {
    let mut reader = Reader::new(body);
    let mut fields = Vec::new();
    while reader.remaining() > 0 {
        let field_type = reader.u8()?;
        if field_type == 0 {
            break;
        }
        fields.push((field_type, reader.cstr()?.to_string()));
    }
    Ok(fields)
}

/// Build a [`PgError::Server`] from an ErrorResponse body.
pub fn parse_error(body: &[u8]) -> PgError {
    let fields = match parse_error_fields(body) {
        Ok(fields) => fields,
        Err(e) => return e,
    };
    let mut severity = String::new();
    let mut code = String::new();
    let mut message = String::new();
    for (field_type, value) in fields {
        match field_type {
            b'S' => severity = value,
            b'C' => code = value,
            b'M' => message = value,
            _ => {}
        }
    }
    PgError::Server { severity, code, message }
}

/// Parse a ParameterDescription body into parameter type OIDs.
pub fn parse_parameter_description(body: &[u8]) -> PgResult<Vec<u32>> {
    let mut reader = Reader::new(body);
    let count = reader.i16()?.max(0) as usize;
    (0..count).map(|_| Ok(reader.i32()? as u32)).collect()
}

/// Parse a RowDescription body into column descriptors.
pub fn parse_row_description(body: &[u8]) -> PgResult<Vec<ColumnDesc>> {
    let mut reader = Reader::new(body);
    let count = reader.i16()?.max(0) as usize;
    let mut columns = Vec::with_capacity(count);
    for _ in 0..count {
        columns.push(ColumnDesc {
            name: reader.cstr()?.to_string(),
            table_oid: reader.i32()? as u32,
            col_attr: reader.i16()?,
            type_oid: reader.i32()? as u32,
            type_size: reader.i16()?,
            type_modifier: reader.i32()?,
            format_code: FormatCode::from(reader.i16()?),
        });
    }
    Ok(columns)
}

/// Parse a DataRow body. `None` marks SQL NULL.
pub fn parse_data_row(body: &[u8]) -> PgResult<Vec<Option<&[u8]>>> {
    let mut reader = Reader::new(body);
    let count = reader.i16()?.max(0) as usize;
    let mut values = Vec::with_capacity(count);
    for _ in 0..count {
        let len = reader.i32()?;
        if len < 0 {
            values.push(None);
        } else {
            values.push(Some(reader.bytes(len as usize)?));
        }
    }
    Ok(values)
}

/// Parse a CommandComplete tag (e.g. `INSERT 0 3`, `SELECT 5`) into the
/// affected/returned row count. Tags without a count yield 0.
pub fn parse_command_complete(body: &[u8]) -> PgResult<u64> {
    let mut reader = Reader::new(body);
    let tag = reader.cstr()?;
    Ok(tag
        .rsplit(' ')
        .next()
        .and_then(|n| n.parse().ok())
        .unwrap_or(0))
}
