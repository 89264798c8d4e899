//! Typed views over monitor request and response bodies.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// Memory space a memory or register operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MemSpace {
    Main,
    Drive8,
    Drive9,
    Drive10,
    Drive11,
}

impl MemSpace {
    pub fn code(self) -> u8 {
        match self {
            MemSpace::Main => 0,
            MemSpace::Drive8 => 1,
            MemSpace::Drive9 => 2,
            MemSpace::Drive10 => 3,
            MemSpace::Drive11 => 4,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(MemSpace::Main),
            1 => Some(MemSpace::Drive8),
            2 => Some(MemSpace::Drive9),
            3 => Some(MemSpace::Drive10),
            4 => Some(MemSpace::Drive11),
            _ => None,
        }
    }
}

impl Default for MemSpace {
    fn default() -> Self {
        MemSpace::Main
    }
}

impl FromStr for MemSpace {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "main" => Ok(MemSpace::Main),
            "drive8" => Ok(MemSpace::Drive8),
            "drive9" => Ok(MemSpace::Drive9),
            "drive10" => Ok(MemSpace::Drive10),
            "drive11" => Ok(MemSpace::Drive11),
            other => Err(format!(
                "unknown memspace '{other}' (expected main or drive8..drive11)"
            )),
        }
    }
}

/// Connection lifecycle snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionState {
    pub connected: bool,
    pub host: String,
    pub port: u16,
    pub running: bool,
}

/// CPU register identifiers as the peer numbers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RegisterId {
    A,
    X,
    Y,
    Pc,
    Sp,
    Flags,
}

impl RegisterId {
    pub fn code(self) -> u8 {
        match self {
            RegisterId::A => 0,
            RegisterId::X => 1,
            RegisterId::Y => 2,
            RegisterId::Pc => 3,
            RegisterId::Sp => 4,
            RegisterId::Flags => 5,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(RegisterId::A),
            1 => Some(RegisterId::X),
            2 => Some(RegisterId::Y),
            3 => Some(RegisterId::Pc),
            4 => Some(RegisterId::Sp),
            5 => Some(RegisterId::Flags),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RegisterId::A => "a",
            RegisterId::X => "x",
            RegisterId::Y => "y",
            RegisterId::Pc => "pc",
            RegisterId::Sp => "sp",
            RegisterId::Flags => "flags",
        }
    }
}

impl FromStr for RegisterId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "a" => Ok(RegisterId::A),
            "x" => Ok(RegisterId::X),
            "y" => Ok(RegisterId::Y),
            "pc" => Ok(RegisterId::Pc),
            "sp" => Ok(RegisterId::Sp),
            "flags" | "p" => Ok(RegisterId::Flags),
            other => Err(format!("unknown register '{other}'")),
        }
    }
}

/// Decoded 6502 status register bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusFlags {
    pub negative: bool,
    pub overflow: bool,
    pub brk: bool,
    pub decimal: bool,
    pub interrupt: bool,
    pub zero: bool,
    pub carry: bool,
}

impl StatusFlags {
    pub fn from_bits(bits: u8) -> Self {
        Self {
            negative: bits & 0x80 != 0,
            overflow: bits & 0x40 != 0,
            brk: bits & 0x10 != 0,
            decimal: bits & 0x08 != 0,
            interrupt: bits & 0x04 != 0,
            zero: bits & 0x02 != 0,
            carry: bits & 0x01 != 0,
        }
    }

    /// Re-encode; the unused bit 5 reads back as set, as on hardware.
    pub fn bits(self) -> u8 {
        let mut bits = 0x20;
        if self.negative {
            bits |= 0x80;
        }
        if self.overflow {
            bits |= 0x40;
        }
        if self.brk {
            bits |= 0x10;
        }
        if self.decimal {
            bits |= 0x08;
        }
        if self.interrupt {
            bits |= 0x04;
        }
        if self.zero {
            bits |= 0x02;
        }
        if self.carry {
            bits |= 0x01;
        }
        bits
    }
}

impl fmt::Display for StatusFlags {
    /// Monitor-style flag line, set bits uppercase: `Nv-BdIzC`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |set: bool, on: char, off: char| if set { on } else { off };
        write!(
            f,
            "{}{}-{}{}{}{}{}",
            flag(self.negative, 'N', 'n'),
            flag(self.overflow, 'V', 'v'),
            flag(self.brk, 'B', 'b'),
            flag(self.decimal, 'D', 'd'),
            flag(self.interrupt, 'I', 'i'),
            flag(self.zero, 'Z', 'z'),
            flag(self.carry, 'C', 'c'),
        )
    }
}

/// Full register file as returned by a registers-get operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Registers {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub sp: u8,
    pub pc: u16,
    pub flags: StatusFlags,
}

/// What a checkpoint triggers on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointKind {
    Exec,
    Load,
    Store,
    LoadStore,
}

impl CheckpointKind {
    const LOAD: u8 = 0x01;
    const STORE: u8 = 0x02;
    const EXEC: u8 = 0x04;

    /// Operation mask as sent on the wire.
    pub fn mask(self) -> u8 {
        match self {
            CheckpointKind::Exec => Self::EXEC,
            CheckpointKind::Load => Self::LOAD,
            CheckpointKind::Store => Self::STORE,
            CheckpointKind::LoadStore => Self::LOAD | Self::STORE,
        }
    }

    pub fn from_mask(mask: u8) -> Option<Self> {
        match mask {
            Self::EXEC => Some(CheckpointKind::Exec),
            Self::LOAD => Some(CheckpointKind::Load),
            Self::STORE => Some(CheckpointKind::Store),
            m if m == Self::LOAD | Self::STORE => Some(CheckpointKind::LoadStore),
            _ => None,
        }
    }
}

impl FromStr for CheckpointKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exec" => Ok(CheckpointKind::Exec),
            "load" => Ok(CheckpointKind::Load),
            "store" => Ok(CheckpointKind::Store),
            "loadstore" | "load-store" => Ok(CheckpointKind::LoadStore),
            other => Err(format!("unknown checkpoint kind '{other}'")),
        }
    }
}

/// A peer-side breakpoint or watchpoint, tracked locally by peer id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Checkpoint {
    pub id: u32,
    pub start: u16,
    pub end: u16,
    pub enabled: bool,
    pub temporary: bool,
    pub kind: CheckpointKind,
    pub hit_count: u32,
    pub ignore_count: u32,
}

/// Flags for creating a checkpoint.
#[derive(Debug, Clone, Copy)]
pub struct CheckpointOptions {
    /// Halt execution when the checkpoint fires (as opposed to tracing).
    pub stop: bool,
    pub enabled: bool,
    /// One-shot: the peer deletes it after the first hit.
    pub temporary: bool,
}

impl Default for CheckpointOptions {
    fn default() -> Self {
        Self {
            stop: true,
            enabled: true,
            temporary: false,
        }
    }
}

/// One rendered emulator display frame.
#[derive(Debug, Clone, Serialize)]
pub struct DisplayFrame {
    pub width: u16,
    pub height: u16,
    pub x_offset: u16,
    pub y_offset: u16,
    pub inner_width: u16,
    pub inner_height: u16,
    pub bits_per_pixel: u8,
    #[serde(skip)]
    pub pixels: Vec<u8>,
}

/// One palette slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaletteEntry {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memspace_codes_roundtrip() {
        for space in [
            MemSpace::Main,
            MemSpace::Drive8,
            MemSpace::Drive9,
            MemSpace::Drive10,
            MemSpace::Drive11,
        ] {
            assert_eq!(MemSpace::from_code(space.code()), Some(space));
        }
        assert_eq!(MemSpace::from_code(9), None);
    }

    #[test]
    fn status_flags_decode() {
        let flags = StatusFlags::from_bits(0b1010_0011);
        assert!(flags.negative);
        assert!(!flags.overflow);
        assert!(flags.zero);
        assert!(flags.carry);
        assert_eq!(flags.to_string(), "Nv-bdiZC");
        assert_eq!(flags.bits(), 0b1010_0011);
    }

    #[test]
    fn checkpoint_kind_masks() {
        assert_eq!(CheckpointKind::Exec.mask(), 0x04);
        assert_eq!(CheckpointKind::LoadStore.mask(), 0x03);
        assert_eq!(CheckpointKind::from_mask(0x02), Some(CheckpointKind::Store));
        assert_eq!(CheckpointKind::from_mask(0x07), None);
    }

    #[test]
    fn register_names_parse_back() {
        for reg in [
            RegisterId::A,
            RegisterId::X,
            RegisterId::Y,
            RegisterId::Pc,
            RegisterId::Sp,
            RegisterId::Flags,
        ] {
            assert_eq!(reg.name().parse::<RegisterId>().unwrap(), reg);
        }
        assert!("q".parse::<RegisterId>().is_err());
    }
}
