//! Versioned wire-format descriptors.
//!
//! The peer has shipped at least three incompatible monitor protocol
//! generations: the request-id width changed, the position of the
//! kind/status bytes in response headers changed, and the command code
//! table was renumbered. Everything generation-specific lives in one
//! [`ProtocolVersion`] value selected at connect time; the codec and the
//! client are parameterized by it and hardcode nothing.

/// Width of the request-id field on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdWidth {
    U8,
    U32,
}

impl IdWidth {
    /// Number of bytes the id occupies in a frame header.
    pub const fn bytes(self) -> usize {
        match self {
            IdWidth::U8 => 1,
            IdWidth::U32 => 4,
        }
    }

    /// Largest id value representable at this width.
    pub const fn max_id(self) -> u32 {
        match self {
            IdWidth::U8 => u8::MAX as u32,
            IdWidth::U32 => u32::MAX,
        }
    }
}

/// Physical layout of frame headers for one protocol generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireFormat {
    /// Version byte carried in every frame header.
    pub api_version: u8,
    /// Width of the request-id field.
    pub id_width: IdWidth,
    /// Responses carry KIND and STATUS before the request id (current
    /// generations) or after it (first generation).
    pub status_before_id: bool,
    /// Request id tagging unsolicited frames (state changes, checkpoint
    /// hits). Never allocated to a call.
    pub async_request_id: u32,
}

/// Command codes for one protocol generation.
///
/// Response kinds mirror the command code of the request they answer, so
/// this table doubles as the expected-response-kind table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSet {
    pub mem_get: u8,
    pub mem_set: u8,
    pub checkpoint_get: u8,
    pub checkpoint_set: u8,
    pub checkpoint_delete: u8,
    pub checkpoint_list: u8,
    pub checkpoint_toggle: u8,
    pub registers_get: u8,
    pub registers_set: u8,
    pub dump: u8,
    pub undump: u8,
    pub resource_get: u8,
    pub resource_set: u8,
    pub advance_instructions: u8,
    pub execute_until_return: u8,
    pub ping: u8,
    pub exit: u8,
    pub reset: u8,
    pub display_get: u8,
    pub palette_get: u8,
    pub info: u8,
    pub autostart: u8,
}

/// Response kinds that are not direct command replies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSet {
    /// The peer could not parse the request at all.
    pub invalid: u8,
    /// The CPU jammed on an illegal opcode.
    pub jam: u8,
    /// Execution stopped (breakpoint, step completion, user pause).
    pub stopped: u8,
    /// Execution resumed.
    pub resumed: u8,
}

/// One complete protocol generation: header layout plus code tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolVersion {
    pub name: &'static str,
    pub wire: WireFormat,
    pub commands: CommandSet,
    pub events: EventSet,
}

impl ProtocolVersion {
    /// First shipped generation: single-byte request ids placed before the
    /// kind/status bytes, and the original command numbering.
    pub fn v1() -> Self {
        Self {
            name: "v1",
            wire: WireFormat {
                api_version: 0x01,
                id_width: IdWidth::U8,
                status_before_id: false,
                async_request_id: 0xff,
            },
            commands: CommandSet {
                mem_get: 0x01,
                mem_set: 0x02,
                checkpoint_set: 0x11,
                checkpoint_get: 0x12,
                checkpoint_delete: 0x13,
                checkpoint_list: 0x14,
                checkpoint_toggle: 0x15,
                registers_get: 0x21,
                registers_set: 0x22,
                dump: 0x31,
                undump: 0x32,
                resource_get: 0x41,
                resource_set: 0x42,
                advance_instructions: 0x51,
                execute_until_return: 0x52,
                ping: 0x71,
                exit: 0x72,
                reset: 0x73,
                display_get: 0x81,
                palette_get: 0x82,
                info: 0x83,
                autostart: 0x84,
            },
            events: EventSet {
                invalid: 0x00,
                jam: 0x90,
                stopped: 0x91,
                resumed: 0x92,
            },
        }
    }

    /// Current generation: 4-byte request ids after the kind/status bytes.
    pub fn v2() -> Self {
        Self {
            name: "v2",
            wire: WireFormat {
                api_version: 0x02,
                id_width: IdWidth::U32,
                status_before_id: true,
                async_request_id: 0xffff_ffff,
            },
            commands: CommandSet {
                mem_get: 0x01,
                mem_set: 0x02,
                checkpoint_get: 0x11,
                checkpoint_set: 0x12,
                checkpoint_delete: 0x13,
                checkpoint_list: 0x14,
                checkpoint_toggle: 0x15,
                registers_get: 0x31,
                registers_set: 0x32,
                dump: 0x41,
                undump: 0x42,
                resource_get: 0x51,
                resource_set: 0x52,
                advance_instructions: 0x71,
                execute_until_return: 0x73,
                ping: 0x81,
                display_get: 0x84,
                info: 0x85,
                palette_get: 0x91,
                exit: 0xaa,
                reset: 0xcc,
                autostart: 0xdd,
            },
            events: EventSet {
                invalid: 0x00,
                jam: 0x61,
                stopped: 0x62,
                resumed: 0x63,
            },
        }
    }

    /// v2 header layout with the relocated display and palette codes.
    pub fn v3() -> Self {
        let mut version = Self::v2();
        version.name = "v3";
        version.wire.api_version = 0x03;
        version.commands.display_get = 0x92;
        version.commands.palette_get = 0x93;
        version
    }

    /// Look up a generation by its short name.
    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "v1" => Some(Self::v1()),
            "v2" => Some(Self::v2()),
            "v3" => Some(Self::v3()),
            _ => None,
        }
    }
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::v2()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generations_differ_where_history_says() {
        let v1 = ProtocolVersion::v1();
        let v2 = ProtocolVersion::v2();
        let v3 = ProtocolVersion::v3();

        assert_eq!(v1.wire.id_width, IdWidth::U8);
        assert_eq!(v2.wire.id_width, IdWidth::U32);
        assert!(!v1.wire.status_before_id);
        assert!(v2.wire.status_before_id);
        assert_ne!(v1.commands.registers_get, v2.commands.registers_get);
        assert_ne!(v2.commands.display_get, v3.commands.display_get);
        assert_eq!(v2.wire.id_width, v3.wire.id_width);
    }

    #[test]
    fn lookup_by_name() {
        assert_eq!(ProtocolVersion::by_name("v1").unwrap().name, "v1");
        assert_eq!(ProtocolVersion::by_name("v3").unwrap().wire.api_version, 3);
        assert!(ProtocolVersion::by_name("v9").is_none());
    }

    #[test]
    fn sentinel_is_unreachable_by_allocation_width() {
        for version in [ProtocolVersion::v1(), ProtocolVersion::v2()] {
            assert!(version.wire.async_request_id <= version.wire.id_width.max_id());
        }
    }
}
