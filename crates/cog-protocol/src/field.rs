//! The closed set of field types the manual console can write.
//!
//! Each [`FieldKind`] maps a type tag (`"int"`, `"player"`, ...) to a
//! parser, an encoder and a decoder. The table is fixed at compile time;
//! an unknown tag is rejected with [`ProtocolError::UnsupportedFieldType`]
//! instead of being looked up dynamically.

use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::{
    MessageReader, MessageWriter, NetId, NetObjectLookup, PlayerDirectory,
    ProtocolError, Vector2i,
};

/// A field type tag.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Byte,
    SByte,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    /// Packed (zigzag varint) `i32`.
    Packed,
    /// Packed (varint) `u32`.
    UPacked,
    Bool,
    Float,
    String,
    Player,
    Vector,
}

/// Tag → kind table, in the order `help` lists them.
const FIELD_TAGS: &[(&str, FieldKind)] = &[
    ("byte", FieldKind::Byte),
    ("sbyte", FieldKind::SByte),
    ("short", FieldKind::Short),
    ("ushort", FieldKind::UShort),
    ("int", FieldKind::Int),
    ("uint", FieldKind::UInt),
    ("long", FieldKind::Long),
    ("ulong", FieldKind::ULong),
    ("packed", FieldKind::Packed),
    ("upacked", FieldKind::UPacked),
    ("bool", FieldKind::Bool),
    ("float", FieldKind::Float),
    ("string", FieldKind::String),
    ("player", FieldKind::Player),
    ("vector", FieldKind::Vector),
];

impl FieldKind {
    /// Looks a type tag up in the fixed table (ASCII case-insensitive).
    pub fn from_tag(tag: &str) -> Result<Self, ProtocolError> {
        FIELD_TAGS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(tag))
            .map(|(_, kind)| *kind)
            .ok_or_else(|| ProtocolError::UnsupportedFieldType(tag.to_string()))
    }

    pub fn tag(self) -> &'static str {
        FIELD_TAGS
            .iter()
            .find(|(_, kind)| *kind == self)
            .map(|(name, _)| *name)
            .unwrap_or("unknown")
    }

    /// All tags, comma separated, for help text.
    pub fn tag_list() -> String {
        FIELD_TAGS
            .iter()
            .map(|(name, _)| *name)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Parses the whitespace-split arguments that follow the type tag.
    ///
    /// - `string` joins every argument with single spaces.
    /// - `vector` needs exactly two integers.
    /// - `player` tries a numeric player id first, then an exact name.
    /// - everything else parses the first argument only.
    pub fn parse<D: PlayerDirectory + ?Sized>(
        self,
        args: &[&str],
        players: &D,
    ) -> Result<FieldValue, ProtocolError> {
        match self {
            FieldKind::String => Ok(FieldValue::String(args.join(" "))),
            FieldKind::Vector => parse_vector(args),
            FieldKind::Player => {
                let input = args.join(" ");
                parse_player(&input, players).map(FieldValue::Player)
            }
            _ => {
                let input = args.first().copied().unwrap_or("");
                self.parse_scalar(input)
            }
        }
    }

    fn parse_scalar(self, input: &str) -> Result<FieldValue, ProtocolError> {
        let value = match self {
            FieldKind::Byte => scalar(input).map(FieldValue::Byte),
            FieldKind::SByte => scalar(input).map(FieldValue::SByte),
            FieldKind::Short => scalar(input).map(FieldValue::Short),
            FieldKind::UShort => scalar(input).map(FieldValue::UShort),
            FieldKind::Int => scalar(input).map(FieldValue::Int),
            FieldKind::UInt => scalar(input).map(FieldValue::UInt),
            FieldKind::Long => scalar(input).map(FieldValue::Long),
            FieldKind::ULong => scalar(input).map(FieldValue::ULong),
            FieldKind::Packed => scalar(input).map(FieldValue::Packed),
            FieldKind::UPacked => scalar(input).map(FieldValue::UPacked),
            FieldKind::Float => scalar(input).map(FieldValue::Float),
            FieldKind::Bool => parse_bool(input).map(FieldValue::Bool),
            // Multi-argument kinds never reach here.
            FieldKind::String | FieldKind::Player | FieldKind::Vector => None,
        };
        value.ok_or_else(|| ProtocolError::FieldParseFailure {
            kind: self,
            input: input.to_string(),
        })
    }

    /// Decodes one field of this kind. Player references are checked
    /// against `lookup` so a stale reference fails here.
    pub fn decode<L: NetObjectLookup + ?Sized>(
        self,
        reader: &mut MessageReader<'_>,
        lookup: &L,
    ) -> Result<FieldValue, ProtocolError> {
        Ok(match self {
            FieldKind::Byte => FieldValue::Byte(reader.read_u8()?),
            FieldKind::SByte => FieldValue::SByte(reader.read_i8()?),
            FieldKind::Short => FieldValue::Short(reader.read_i16()?),
            FieldKind::UShort => FieldValue::UShort(reader.read_u16()?),
            FieldKind::Int => FieldValue::Int(reader.read_i32()?),
            FieldKind::UInt => FieldValue::UInt(reader.read_u32()?),
            FieldKind::Long => FieldValue::Long(reader.read_i64()?),
            FieldKind::ULong => FieldValue::ULong(reader.read_u64()?),
            FieldKind::Packed => FieldValue::Packed(reader.read_packed_i32()?),
            FieldKind::UPacked => FieldValue::UPacked(reader.read_packed_u32()?),
            FieldKind::Bool => FieldValue::Bool(reader.read_bool()?),
            FieldKind::Float => FieldValue::Float(reader.read_f32()?),
            FieldKind::String => FieldValue::String(reader.read_string()?),
            FieldKind::Vector => FieldValue::Vector(reader.read_vector()?),
            FieldKind::Player => {
                let net_id = reader.read_net_id()?;
                if lookup.resolve_net_object(net_id).is_none() {
                    return Err(ProtocolError::StaleObjectReference(net_id));
                }
                FieldValue::Player(net_id)
            }
        })
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for FieldKind {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_tag(s)
    }
}

/// One typed field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Byte(u8),
    SByte(i8),
    Short(i16),
    UShort(u16),
    Int(i32),
    UInt(u32),
    Long(i64),
    ULong(u64),
    Packed(i32),
    UPacked(u32),
    Bool(bool),
    Float(f32),
    String(String),
    Player(NetId),
    Vector(Vector2i),
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Byte(_) => FieldKind::Byte,
            FieldValue::SByte(_) => FieldKind::SByte,
            FieldValue::Short(_) => FieldKind::Short,
            FieldValue::UShort(_) => FieldKind::UShort,
            FieldValue::Int(_) => FieldKind::Int,
            FieldValue::UInt(_) => FieldKind::UInt,
            FieldValue::Long(_) => FieldKind::Long,
            FieldValue::ULong(_) => FieldKind::ULong,
            FieldValue::Packed(_) => FieldKind::Packed,
            FieldValue::UPacked(_) => FieldKind::UPacked,
            FieldValue::Bool(_) => FieldKind::Bool,
            FieldValue::Float(_) => FieldKind::Float,
            FieldValue::String(_) => FieldKind::String,
            FieldValue::Player(_) => FieldKind::Player,
            FieldValue::Vector(_) => FieldKind::Vector,
        }
    }

    pub fn encode(&self, writer: &mut MessageWriter) {
        match self {
            FieldValue::Byte(v) => writer.write_u8(*v),
            FieldValue::SByte(v) => writer.write_i8(*v),
            FieldValue::Short(v) => writer.write_i16(*v),
            FieldValue::UShort(v) => writer.write_u16(*v),
            FieldValue::Int(v) => writer.write_i32(*v),
            FieldValue::UInt(v) => writer.write_u32(*v),
            FieldValue::Long(v) => writer.write_i64(*v),
            FieldValue::ULong(v) => writer.write_u64(*v),
            FieldValue::Packed(v) => writer.write_packed_i32(*v),
            FieldValue::UPacked(v) => writer.write_packed_u32(*v),
            FieldValue::Bool(v) => writer.write_bool(*v),
            FieldValue::Float(v) => writer.write_f32(*v),
            FieldValue::String(v) => writer.write_str(v),
            FieldValue::Player(v) => writer.write_net_id(*v),
            FieldValue::Vector(v) => writer.write_vector(*v),
        }
    }
}

fn scalar<T: FromStr>(input: &str) -> Option<T> {
    input.trim().parse().ok()
}

fn parse_bool(input: &str) -> Option<bool> {
    let input = input.trim();
    if input.eq_ignore_ascii_case("true") {
        Some(true)
    } else if input.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn parse_vector(args: &[&str]) -> Result<FieldValue, ProtocolError> {
    let [x, y] = args else {
        return Err(ProtocolError::MalformedVector(format!(
            "expected 2 components, got {}",
            args.len()
        )));
    };
    match (x.parse::<i32>(), y.parse::<i32>()) {
        (Ok(x), Ok(y)) => Ok(FieldValue::Vector(Vector2i { x, y })),
        _ => Err(ProtocolError::MalformedVector(format!("`{x} {y}`"))),
    }
}

fn parse_player<D: PlayerDirectory + ?Sized>(
    input: &str,
    players: &D,
) -> Result<NetId, ProtocolError> {
    let by_id = input
        .parse::<u8>()
        .ok()
        .and_then(|id| players.net_id_by_player_id(id));
    by_id
        .or_else(|| players.net_id_by_name(input))
        .ok_or_else(|| ProtocolError::PlayerResolutionFailure(input.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two players: slot 3 "Alice" (net 103), slot 4 "7" (net 104).
    struct Lobby;

    impl PlayerDirectory for Lobby {
        fn net_id_by_player_id(&self, player_id: u8) -> Option<NetId> {
            match player_id {
                3 => Some(NetId(103)),
                4 => Some(NetId(104)),
                _ => None,
            }
        }

        fn net_id_by_name(&self, name: &str) -> Option<NetId> {
            match name {
                "Alice" => Some(NetId(103)),
                "7" => Some(NetId(104)),
                _ => None,
            }
        }
    }

    impl NetObjectLookup for Lobby {
        type Object = ();

        fn resolve_net_object(&self, net_id: NetId) -> Option<()> {
            (net_id == NetId(103) || net_id == NetId(104)).then_some(())
        }
    }

    #[test]
    fn test_every_tag_resolves() {
        for (tag, kind) in FIELD_TAGS {
            assert_eq!(FieldKind::from_tag(tag).unwrap(), *kind);
            assert_eq!(kind.tag(), *tag);
        }
        assert_eq!("INT".parse::<FieldKind>().unwrap(), FieldKind::Int);
    }

    #[test]
    fn test_unknown_tag_rejected() {
        assert_eq!(
            FieldKind::from_tag("decimal").unwrap_err(),
            ProtocolError::UnsupportedFieldType("decimal".into())
        );
    }

    #[test]
    fn test_scalar_parsing() {
        assert_eq!(FieldKind::Byte.parse(&["255"], &Lobby).unwrap(), FieldValue::Byte(255));
        assert_eq!(FieldKind::SByte.parse(&["-128"], &Lobby).unwrap(), FieldValue::SByte(-128));
        assert_eq!(FieldKind::Bool.parse(&["True"], &Lobby).unwrap(), FieldValue::Bool(true));
        assert_eq!(FieldKind::Float.parse(&["-1.5"], &Lobby).unwrap(), FieldValue::Float(-1.5));
        assert_eq!(FieldKind::Packed.parse(&["-7"], &Lobby).unwrap(), FieldValue::Packed(-7));
    }

    #[test]
    fn test_scalar_out_of_range_fails() {
        let err = FieldKind::Byte.parse(&["256"], &Lobby).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::FieldParseFailure { kind: FieldKind::Byte, input: "256".into() }
        );
        assert!(FieldKind::UInt.parse(&["-1"], &Lobby).is_err());
        assert!(FieldKind::Bool.parse(&["yes"], &Lobby).is_err());
        assert!(FieldKind::Int.parse(&[], &Lobby).is_err());
    }

    #[test]
    fn test_string_joins_arguments() {
        assert_eq!(
            FieldKind::String.parse(&["hello", "world"], &Lobby).unwrap(),
            FieldValue::String("hello world".into())
        );
        assert_eq!(
            FieldKind::String.parse(&[], &Lobby).unwrap(),
            FieldValue::String(String::new())
        );
    }

    #[test]
    fn test_vector_needs_two_integers() {
        assert_eq!(
            FieldKind::Vector.parse(&["1", "-3"], &Lobby).unwrap(),
            FieldValue::Vector(Vector2i::new(1, -3))
        );
        assert!(matches!(
            FieldKind::Vector.parse(&["1"], &Lobby).unwrap_err(),
            ProtocolError::MalformedVector(_)
        ));
        assert!(matches!(
            FieldKind::Vector.parse(&["3", "-1.2"], &Lobby).unwrap_err(),
            ProtocolError::MalformedVector(_)
        ));
    }

    #[test]
    fn test_player_by_id_then_name() {
        assert_eq!(
            FieldKind::Player.parse(&["3"], &Lobby).unwrap(),
            FieldValue::Player(NetId(103))
        );
        assert_eq!(
            FieldKind::Player.parse(&["Alice"], &Lobby).unwrap(),
            FieldValue::Player(NetId(103))
        );
        // "7" is not an occupied slot, so the name lookup wins.
        assert_eq!(
            FieldKind::Player.parse(&["7"], &Lobby).unwrap(),
            FieldValue::Player(NetId(104))
        );
        assert_eq!(
            FieldKind::Player.parse(&["Bob"], &Lobby).unwrap_err(),
            ProtocolError::PlayerResolutionFailure("Bob".into())
        );
    }

    #[test]
    fn test_encode_then_decode_by_kind() {
        let values = vec![
            FieldValue::Byte(0),
            FieldValue::Short(i16::MAX),
            FieldValue::ULong(u64::MAX),
            FieldValue::UPacked(300),
            FieldValue::String(String::new()),
            FieldValue::Player(NetId(104)),
            FieldValue::Vector(Vector2i::ZERO),
        ];
        let mut w = MessageWriter::new();
        for v in &values {
            v.encode(&mut w);
        }
        let bytes = w.into_bytes();
        let mut r = MessageReader::new(&bytes);
        for v in &values {
            assert_eq!(&v.kind().decode(&mut r, &Lobby).unwrap(), v);
        }
        assert!(r.is_exhausted());
    }

    #[test]
    fn test_decode_stale_player() {
        let mut w = MessageWriter::new();
        FieldValue::Player(NetId(999)).encode(&mut w);
        let bytes = w.into_bytes();
        let mut r = MessageReader::new(&bytes);
        assert_eq!(
            FieldKind::Player.decode(&mut r, &Lobby).unwrap_err(),
            ProtocolError::StaleObjectReference(NetId(999))
        );
    }
}
