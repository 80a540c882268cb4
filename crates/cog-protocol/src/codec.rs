//! Binary field codec: [`MessageWriter`] appends fields, [`MessageReader`]
//! reads them back in the same order.
//!
//! The codec is deliberately schema-less. A payload is just a sequence of
//! fields; which fields, and in what order, is part of each call-id's
//! contract. Every `write_*` method has a matching `read_*` method and the
//! pair is byte-for-byte symmetric.
//!
//! ## Encodings
//!
//! - fixed-width integers and `f32`: little-endian
//! - `bool`: one byte, `0` or `1`
//! - packed unsigned: LEB128 (7 bits per byte, high bit = "more follows")
//! - packed signed: zigzag, then packed unsigned, so small negative numbers
//!   stay small
//! - text: packed byte length, then UTF-8
//! - vector: packed signed `x`, then packed signed `y`
//! - object reference: packed [`NetId`]

use crate::{NetId, ProtocolError, Vector2i};

/// Longest LEB128 encoding of a `u32`.
const MAX_PACKED_LEN: usize = 5;

// ---------------------------------------------------------------------------
// Lookup traits
// ---------------------------------------------------------------------------

/// Resolves network ids back into live entities.
///
/// The host owns the object table; the codec only asks it. Implemented by
/// the player registry.
pub trait NetObjectLookup {
    /// What a resolved reference yields (for players: their `PlayerId`).
    type Object;

    /// Returns the live object for `net_id`, or `None` if it is gone.
    fn resolve_net_object(&self, net_id: NetId) -> Option<Self::Object>;
}

/// Finds players by the forms a human types them in.
pub trait PlayerDirectory {
    /// Network id of the player occupying lobby slot `player_id`.
    fn net_id_by_player_id(&self, player_id: u8) -> Option<NetId>;

    /// Network id of the connected player whose name is exactly `name`.
    fn net_id_by_name(&self, name: &str) -> Option<NetId>;
}

// ---------------------------------------------------------------------------
// MessageWriter
// ---------------------------------------------------------------------------

/// Appends encoded fields to a growable byte buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageWriter {
    buf: Vec<u8>,
}

impl MessageWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_i8(&mut self, value: i8) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i16(&mut self, value: i16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.push(u8::from(value));
    }

    pub fn write_f32(&mut self, value: f32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Minimal-length LEB128.
    pub fn write_packed_u32(&mut self, mut value: u32) {
        loop {
            let low = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                self.buf.push(low);
                return;
            }
            self.buf.push(low | 0x80);
        }
    }

    /// Zigzag-mapped, then packed.
    pub fn write_packed_i32(&mut self, value: i32) {
        self.write_packed_u32(zigzag_encode(value));
    }

    pub fn write_str(&mut self, value: &str) {
        // Text longer than u32::MAX bytes can't exist in a frame anyway.
        self.write_packed_u32(value.len() as u32);
        self.buf.extend_from_slice(value.as_bytes());
    }

    pub fn write_vector(&mut self, value: Vector2i) {
        self.write_packed_i32(value.x);
        self.write_packed_i32(value.y);
    }

    /// Writes a reference to a networked object.
    pub fn write_net_id(&mut self, net_id: NetId) {
        self.write_packed_u32(net_id.0);
    }
}

// ---------------------------------------------------------------------------
// MessageReader
// ---------------------------------------------------------------------------

/// Reads fields sequentially from a borrowed payload.
#[derive(Debug, Clone)]
pub struct MessageReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> MessageReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    fn take(&mut self, needed: usize) -> Result<&'a [u8], ProtocolError> {
        let remaining = self.remaining();
        if needed > remaining {
            return Err(ProtocolError::Truncated { needed, remaining });
        }
        let bytes = &self.data[self.pos..self.pos + needed];
        self.pos += needed;
        Ok(bytes)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.take_array::<1>()?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, ProtocolError> {
        Ok(i8::from_le_bytes(self.take_array()?))
    }

    pub fn read_u16(&mut self) -> Result<u16, ProtocolError> {
        Ok(u16::from_le_bytes(self.take_array()?))
    }

    pub fn read_i16(&mut self) -> Result<i16, ProtocolError> {
        Ok(i16::from_le_bytes(self.take_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, ProtocolError> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, ProtocolError> {
        Ok(i32::from_le_bytes(self.take_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, ProtocolError> {
        Ok(u64::from_le_bytes(self.take_array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64, ProtocolError> {
        Ok(i64::from_le_bytes(self.take_array()?))
    }

    pub fn read_bool(&mut self) -> Result<bool, ProtocolError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(ProtocolError::InvalidBool(other)),
        }
    }

    pub fn read_f32(&mut self) -> Result<f32, ProtocolError> {
        Ok(f32::from_le_bytes(self.take_array()?))
    }

    pub fn read_packed_u32(&mut self) -> Result<u32, ProtocolError> {
        let mut value: u32 = 0;
        for index in 0..MAX_PACKED_LEN {
            let byte = self.read_u8()?;
            let bits = u32::from(byte & 0x7f);
            // The fifth byte may only carry the top 4 bits of a u32.
            if index == MAX_PACKED_LEN - 1 && bits > 0x0f {
                return Err(ProtocolError::VarintOverflow);
            }
            value |= bits << (7 * index);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(ProtocolError::VarintOverflow)
    }

    pub fn read_packed_i32(&mut self) -> Result<i32, ProtocolError> {
        Ok(zigzag_decode(self.read_packed_u32()?))
    }

    pub fn read_string(&mut self) -> Result<String, ProtocolError> {
        let len = self.read_packed_u32()? as usize;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| ProtocolError::InvalidText)
    }

    pub fn read_vector(&mut self) -> Result<Vector2i, ProtocolError> {
        let x = self
            .read_packed_i32()
            .map_err(|e| ProtocolError::MalformedVector(format!("x: {e}")))?;
        let y = self
            .read_packed_i32()
            .map_err(|e| ProtocolError::MalformedVector(format!("y: {e}")))?;
        Ok(Vector2i { x, y })
    }

    pub fn read_net_id(&mut self) -> Result<NetId, ProtocolError> {
        self.read_packed_u32().map(NetId)
    }

    /// Reads an object reference and resolves it to a live object.
    ///
    /// # Errors
    /// [`ProtocolError::StaleObjectReference`] if the lookup no longer
    /// knows the id. A reference is never decoded as "nothing".
    pub fn read_net_object<L: NetObjectLookup>(
        &mut self,
        lookup: &L,
    ) -> Result<L::Object, ProtocolError> {
        let net_id = self.read_net_id()?;
        lookup
            .resolve_net_object(net_id)
            .ok_or(ProtocolError::StaleObjectReference(net_id))
    }
}

fn zigzag_encode(value: i32) -> u32 {
    ((value << 1) ^ (value >> 31)) as u32
}

fn zigzag_decode(value: u32) -> i32 {
    ((value >> 1) as i32) ^ -((value & 1) as i32)
}
