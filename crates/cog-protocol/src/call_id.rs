//! Call-id namespaces and the resolver that maps user or wire input onto them.
//!
//! The host game owns a fixed enumeration of remote calls ([`HostCall`]).
//! The extension defines its own, independent enumeration
//! ([`ExtensionCall`]). The two value sets overlap (both define `0`), so a
//! bare number is ambiguous until it has been resolved into a [`CallId`].
//!
//! # Resolution precedence
//!
//! Textual names: host symbols first (case-insensitive), then extension
//! symbols (case-sensitive).
//!
//! Numbers: host value set first, then the extension value set, then (only
//! when [`RawIdPolicy::Allow`]) an undeclared raw id. A number valid in both
//! enumerations therefore always resolves to the host call; extension calls
//! whose value collides are still reachable by name.
//!
//! Frames on the wire carry an explicit namespace byte, so receivers never
//! need the numeric precedence. See [`CallId::from_wire`].

use serde::{Deserialize, Serialize};

use std::fmt;

use crate::ProtocolError;

/// Declares a `u8`-valued call enumeration along with its lookup tables.
macro_rules! call_table {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $value:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[repr(u8)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant = $value ),+
        }

        impl $name {
            /// Every defined call, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// The numeric call-id value.
            pub fn value(self) -> u8 {
                self as u8
            }

            /// Looks up a call by numeric value. `None` for non-members.
            pub fn from_value(value: u8) -> Option<Self> {
                match value {
                    $( $value => Some(Self::$variant), )+
                    _ => None,
                }
            }

            /// The symbolic name, as typed on the manual console.
            pub fn name(self) -> &'static str {
                match self {
                    $( Self::$variant => stringify!($variant), )+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", self.name(), self.value())
            }
        }
    };
}

call_table! {
    /// Remote calls reserved by the base game.
    ///
    /// Values 30 and 39–43 are not part of the table; numerically they are
    /// non-members.
    pub enum HostCall {
        PlayAnimation = 0,
        CompleteTask = 1,
        SyncSettings = 2,
        SetInfected = 3,
        Exiled = 4,
        CheckName = 5,
        /// Fields: text name, bool "don't censor".
        SetName = 6,
        CheckColor = 7,
        SetColor = 8,
        SetHat = 9,
        SetSkin = 10,
        ReportDeadBody = 11,
        MurderPlayer = 12,
        SendChat = 13,
        StartMeeting = 14,
        SetScanner = 15,
        SendChatNote = 16,
        SetPet = 17,
        SetStartCounter = 18,
        EnterVent = 19,
        ExitVent = 20,
        SnapTo = 21,
        CloseMeeting = 22,
        VotingComplete = 23,
        CastVote = 24,
        ClearVote = 25,
        AddVote = 26,
        CloseDoorsOfType = 27,
        RepairSystem = 28,
        SetTasks = 29,
        ClimbLadder = 31,
        UsePlatform = 32,
        SendQuickChat = 33,
        BootFromVent = 34,
        UpdateSystem = 35,
        SetVisor = 36,
        SetNamePlate = 37,
        SetLevel = 38,
        SetRole = 44,
        ProtectPlayer = 45,
        Shapeshift = 46,
        CheckMurder = 47,
        CheckProtect = 48,
    }
}

call_table! {
    /// Remote calls defined by the extension. Each variant documents its
    /// field order; senders and receivers must agree on it exactly.
    pub enum ExtensionCall {
        /// Fields: `u8` player id, packed `i32` role id.
        SetCustomRole = 0,
        /// Fields: player reference, text tag.
        Mark = 1,
        /// Fields: player reference, text tag.
        RemoveMark = 2,
        /// Fields: player reference.
        Revive = 3,
        /// No fields.
        ClearSabotages = 4,
        /// Fields: player reference (owner of the body).
        CleanDeadBody = 5,
    }
}

impl HostCall {
    /// Case-insensitive symbol lookup.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|call| call.name().eq_ignore_ascii_case(name))
    }
}

impl ExtensionCall {
    /// Case-sensitive symbol lookup.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|call| call.name() == name)
    }
}

// ---------------------------------------------------------------------------
// CallNamespace / CallId
// ---------------------------------------------------------------------------

/// Which enumeration a call-id belongs to. Encoded as one byte in frames.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum CallNamespace {
    Host,
    Extension,
    /// An undeclared id whose payload shape the caller provides.
    Raw,
}

impl CallNamespace {
    pub fn to_byte(self) -> u8 {
        match self {
            Self::Host => 0,
            Self::Extension => 1,
            Self::Raw => 2,
        }
    }

    pub fn from_byte(byte: u8) -> Result<Self, ProtocolError> {
        match byte {
            0 => Ok(Self::Host),
            1 => Ok(Self::Extension),
            2 => Ok(Self::Raw),
            other => Err(ProtocolError::UnknownNamespace(other)),
        }
    }
}

impl fmt::Display for CallNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Host => "host",
            Self::Extension => "extension",
            Self::Raw => "raw",
        })
    }
}

/// A call-id resolved into exactly one namespace.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub enum CallId {
    Host(HostCall),
    Extension(ExtensionCall),
    Raw(u8),
}

impl CallId {
    pub fn namespace(self) -> CallNamespace {
        match self {
            Self::Host(_) => CallNamespace::Host,
            Self::Extension(_) => CallNamespace::Extension,
            Self::Raw(_) => CallNamespace::Raw,
        }
    }

    pub fn value(self) -> u8 {
        match self {
            Self::Host(call) => call.value(),
            Self::Extension(call) => call.value(),
            Self::Raw(value) => value,
        }
    }

    /// Resolves a (namespace, value) pair read off the wire.
    ///
    /// - Known host values resolve; unknown host values are a protocol
    ///   error, since the host table is fixed and a peer claiming otherwise
    ///   is misbehaving.
    /// - Unknown extension values return `Ok(None)`: a newer peer may know
    ///   calls we don't, and those are dropped silently.
    pub fn from_wire(
        namespace: CallNamespace,
        value: u8,
    ) -> Result<Option<Self>, ProtocolError> {
        match namespace {
            CallNamespace::Host => HostCall::from_value(value)
                .map(|call| Some(Self::Host(call)))
                .ok_or(ProtocolError::UnknownHostCall(value)),
            CallNamespace::Extension => {
                Ok(ExtensionCall::from_value(value).map(Self::Extension))
            }
            CallNamespace::Raw => Ok(Some(Self::Raw(value))),
        }
    }
}

impl From<HostCall> for CallId {
    fn from(call: HostCall) -> Self {
        Self::Host(call)
    }
}

impl From<ExtensionCall> for CallId {
    fn from(call: ExtensionCall) -> Self {
        Self::Extension(call)
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host(call) => write!(f, "host:{call}"),
            Self::Extension(call) => write!(f, "extension:{call}"),
            Self::Raw(value) => write!(f, "raw:{value}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Whether a number outside both enumerations may become a raw call-id.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RawIdPolicy {
    /// Non-members are unresolved.
    #[default]
    Reject,
    /// Non-members become [`CallId::Raw`]; the caller supplies the payload.
    Allow,
}

/// Resolves user-facing call-id input (names or numbers) into a [`CallId`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CallIdResolver {
    raw_ids: RawIdPolicy,
}

impl CallIdResolver {
    pub fn new(raw_ids: RawIdPolicy) -> Self {
        Self { raw_ids }
    }

    pub fn raw_ids(&self) -> RawIdPolicy {
        self.raw_ids
    }

    /// Resolves a name or decimal number.
    ///
    /// # Errors
    /// [`ProtocolError::UnresolvedCallId`] when nothing matches.
    pub fn resolve(&self, input: &str) -> Result<CallId, ProtocolError> {
        let input = input.trim();
        if let Ok(number) = input.parse::<i64>() {
            return self.resolve_number(number);
        }
        self.resolve_name(input)
    }

    /// Symbol lookup: host (case-insensitive), then extension (exact).
    pub fn resolve_name(&self, name: &str) -> Result<CallId, ProtocolError> {
        if let Some(call) = HostCall::from_name(name) {
            return Ok(CallId::Host(call));
        }
        if let Some(call) = ExtensionCall::from_name(name) {
            return Ok(CallId::Extension(call));
        }
        Err(ProtocolError::UnresolvedCallId(name.to_string()))
    }

    /// Numeric lookup: host, extension, then raw (policy permitting).
    pub fn resolve_number(&self, number: i64) -> Result<CallId, ProtocolError> {
        let Ok(value) = u8::try_from(number) else {
            return Err(ProtocolError::UnresolvedCallId(number.to_string()));
        };
        if let Some(call) = HostCall::from_value(value) {
            return Ok(CallId::Host(call));
        }
        if let Some(call) = ExtensionCall::from_value(value) {
            return Ok(CallId::Extension(call));
        }
        match self.raw_ids {
            RawIdPolicy::Allow => Ok(CallId::Raw(value)),
            RawIdPolicy::Reject => {
                Err(ProtocolError::UnresolvedCallId(number.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strict() -> CallIdResolver {
        CallIdResolver::new(RawIdPolicy::Reject)
    }

    fn manual() -> CallIdResolver {
        CallIdResolver::new(RawIdPolicy::Allow)
    }

    // =====================================================================
    // Tables
    // =====================================================================

    #[test]
    fn test_tables_round_trip_value_and_name() {
        for call in HostCall::ALL {
            assert_eq!(HostCall::from_value(call.value()), Some(*call));
            assert_eq!(HostCall::from_name(call.name()), Some(*call));
        }
        for call in ExtensionCall::ALL {
            assert_eq!(ExtensionCall::from_value(call.value()), Some(*call));
            assert_eq!(ExtensionCall::from_name(call.name()), Some(*call));
        }
    }

    #[test]
    fn test_host_gaps_are_non_members() {
        assert_eq!(HostCall::from_value(30), None);
        assert_eq!(HostCall::from_value(40), None);
        assert_eq!(HostCall::from_value(255), None);
    }

    #[test]
    fn test_both_tables_define_zero() {
        assert!(HostCall::from_value(0).is_some());
        assert!(ExtensionCall::from_value(0).is_some());
    }

    // =====================================================================
    // Numeric precedence
    // =====================================================================

    #[test]
    fn test_zero_resolves_to_host_first() {
        assert_eq!(
            strict().resolve("0").unwrap(),
            CallId::Host(HostCall::PlayAnimation)
        );
        assert_eq!(
            manual().resolve_number(0).unwrap(),
            CallId::Host(HostCall::PlayAnimation)
        );
    }

    #[test]
    fn test_colliding_extension_call_reachable_by_name() {
        assert_eq!(
            strict().resolve("SetCustomRole").unwrap(),
            CallId::Extension(ExtensionCall::SetCustomRole)
        );
    }

    #[test]
    fn test_non_member_rejected_without_raw_policy() {
        let err = strict().resolve("30").unwrap_err();
        assert_eq!(err, ProtocolError::UnresolvedCallId("30".into()));
    }

    #[test]
    fn test_non_member_becomes_raw_with_raw_policy() {
        assert_eq!(manual().resolve("30").unwrap(), CallId::Raw(30));
        assert_eq!(manual().resolve("200").unwrap(), CallId::Raw(200));
    }

    #[test]
    fn test_out_of_range_numbers_never_resolve() {
        assert!(manual().resolve("256").is_err());
        assert!(manual().resolve("-1").is_err());
    }

    // =====================================================================
    // Names
    // =====================================================================

    #[test]
    fn test_host_names_are_case_insensitive() {
        assert_eq!(
            strict().resolve("setname").unwrap(),
            CallId::Host(HostCall::SetName)
        );
        assert_eq!(
            strict().resolve("  MURDERPLAYER ").unwrap(),
            CallId::Host(HostCall::MurderPlayer)
        );
    }

    #[test]
    fn test_extension_names_are_case_sensitive() {
        assert_eq!(
            strict().resolve("Mark").unwrap(),
            CallId::Extension(ExtensionCall::Mark)
        );
        assert!(strict().resolve("mark").is_err());
    }

    #[test]
    fn test_unknown_name_is_error_even_with_raw_policy() {
        let err = manual().resolve("FlyToMoon").unwrap_err();
        assert_eq!(err, ProtocolError::UnresolvedCallId("FlyToMoon".into()));
        assert!(manual().resolve("").is_err());
    }

    // =====================================================================
    // Wire resolution
    // =====================================================================

    #[test]
    fn test_wire_resolution_uses_namespace() {
        assert_eq!(
            CallId::from_wire(CallNamespace::Extension, 0).unwrap(),
            Some(CallId::Extension(ExtensionCall::SetCustomRole))
        );
        assert_eq!(
            CallId::from_wire(CallNamespace::Host, 0).unwrap(),
            Some(CallId::Host(HostCall::PlayAnimation))
        );
    }

    #[test]
    fn test_wire_unknown_extension_is_ignored() {
        assert_eq!(CallId::from_wire(CallNamespace::Extension, 99).unwrap(), None);
    }

    #[test]
    fn test_wire_unknown_host_is_error() {
        assert_eq!(
            CallId::from_wire(CallNamespace::Host, 30).unwrap_err(),
            ProtocolError::UnknownHostCall(30)
        );
    }

    #[test]
    fn test_namespace_byte_round_trip() {
        for ns in [CallNamespace::Host, CallNamespace::Extension, CallNamespace::Raw] {
            assert_eq!(CallNamespace::from_byte(ns.to_byte()).unwrap(), ns);
        }
        assert_eq!(
            CallNamespace::from_byte(7).unwrap_err(),
            ProtocolError::UnknownNamespace(7)
        );
    }

    #[test]
    fn test_call_id_display() {
        assert_eq!(CallId::from(HostCall::SetName).to_string(), "host:SetName(6)");
        assert_eq!(CallId::from(ExtensionCall::Mark).to_string(), "extension:Mark(1)");
        assert_eq!(CallId::Raw(200).to_string(), "raw:200");
    }
}
