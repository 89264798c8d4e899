//! VIC-II register file interpretation.
//!
//! Takes the 47 bytes at $D000-$D02E as the monitor reads them and
//! produces a structured view: sprite coordinates with their ninth X
//! bits folded in, display mode from the ECM/BMM/MCM combination, and
//! the memory layout pointers from $D018.

use serde::Serialize;

use crate::error::{DecodeError, Result};

/// Number of VIC-II registers, $D000-$D02E.
pub const REGISTER_COUNT: usize = 47;

/// Base address of the register file.
pub const BASE_ADDRESS: u16 = 0xd000;

/// Display mode selected by the ECM/BMM/MCM bit combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScreenMode {
    StandardText,
    MulticolorText,
    Bitmap,
    MulticolorBitmap,
    ExtendedBackground,
    /// Bit combination the chip displays as blank.
    Invalid,
}

/// One hardware sprite's registers, folded into a single view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SpriteState {
    /// 9-bit X coordinate (MSB from $D010 folded in).
    pub x: u16,
    pub y: u8,
    pub enabled: bool,
    pub x_expand: bool,
    pub y_expand: bool,
    pub multicolor: bool,
    /// Drawn behind the playfield when set.
    pub behind_background: bool,
    pub color: u8,
}

/// Structured view of the whole register file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VicState {
    pub mode: ScreenMode,
    pub display_enabled: bool,
    /// 25-row window (as opposed to 24).
    pub rows_25: bool,
    /// 40-column window (as opposed to 38).
    pub columns_40: bool,
    pub x_scroll: u8,
    pub y_scroll: u8,
    /// Current raster line, 9 bits.
    pub raster: u16,
    /// Screen (video matrix) base, relative to the VIC bank.
    pub screen_base: u16,
    /// Character generator base, relative to the VIC bank.
    pub charset_base: u16,
    /// Bitmap base, relative to the VIC bank.
    pub bitmap_base: u16,
    pub border_color: u8,
    pub background_colors: [u8; 4],
    pub sprite_multicolors: [u8; 2],
    pub sprites: [SpriteState; 8],
    pub irq_status: u8,
    pub irq_mask: u8,
}

impl VicState {
    /// Interpret a register dump. `regs` must hold at least
    /// [`REGISTER_COUNT`] bytes starting at $D000.
    pub fn interpret(regs: &[u8]) -> Result<Self> {
        if regs.len() < REGISTER_COUNT {
            return Err(DecodeError::WrongLength {
                what: "VIC-II registers",
                expected: REGISTER_COUNT,
                got: regs.len(),
            });
        }

        let control1 = regs[0x11];
        let control2 = regs[0x16];
        let ecm = control1 & 0x40 != 0;
        let bmm = control1 & 0x20 != 0;
        let mcm = control2 & 0x10 != 0;

        let mode = match (ecm, bmm, mcm) {
            (false, false, false) => ScreenMode::StandardText,
            (false, false, true) => ScreenMode::MulticolorText,
            (false, true, false) => ScreenMode::Bitmap,
            (false, true, true) => ScreenMode::MulticolorBitmap,
            (true, false, false) => ScreenMode::ExtendedBackground,
            _ => ScreenMode::Invalid,
        };

        let x_msbs = regs[0x10];
        let mut sprites = [SpriteState {
            x: 0,
            y: 0,
            enabled: false,
            x_expand: false,
            y_expand: false,
            multicolor: false,
            behind_background: false,
            color: 0,
        }; 8];
        for (n, sprite) in sprites.iter_mut().enumerate() {
            let bit = 1u8 << n;
            sprite.x = regs[2 * n] as u16 | if x_msbs & bit != 0 { 0x100 } else { 0 };
            sprite.y = regs[2 * n + 1];
            sprite.enabled = regs[0x15] & bit != 0;
            sprite.y_expand = regs[0x17] & bit != 0;
            sprite.x_expand = regs[0x1d] & bit != 0;
            sprite.multicolor = regs[0x1c] & bit != 0;
            sprite.behind_background = regs[0x1b] & bit != 0;
            sprite.color = regs[0x27 + n] & 0x0f;
        }

        let memory = regs[0x18];

        Ok(Self {
            mode,
            display_enabled: control1 & 0x10 != 0,
            rows_25: control1 & 0x08 != 0,
            columns_40: control2 & 0x08 != 0,
            x_scroll: control2 & 0x07,
            y_scroll: control1 & 0x07,
            raster: regs[0x12] as u16 | if control1 & 0x80 != 0 { 0x100 } else { 0 },
            screen_base: ((memory >> 4) & 0x0f) as u16 * 0x0400,
            charset_base: ((memory >> 1) & 0x07) as u16 * 0x0800,
            bitmap_base: if memory & 0x08 != 0 { 0x2000 } else { 0x0000 },
            border_color: regs[0x20] & 0x0f,
            background_colors: [
                regs[0x21] & 0x0f,
                regs[0x22] & 0x0f,
                regs[0x23] & 0x0f,
                regs[0x24] & 0x0f,
            ],
            sprite_multicolors: [regs[0x25] & 0x0f, regs[0x26] & 0x0f],
            sprites,
            irq_status: regs[0x19],
            irq_mask: regs[0x1a],
        })
    }
}

/// Standard C64 color name for a 4-bit color index.
pub fn color_name(index: u8) -> &'static str {
    match index & 0x0f {
        0x0 => "black",
        0x1 => "white",
        0x2 => "red",
        0x3 => "cyan",
        0x4 => "purple",
        0x5 => "green",
        0x6 => "blue",
        0x7 => "yellow",
        0x8 => "orange",
        0x9 => "brown",
        0xa => "light red",
        0xb => "dark grey",
        0xc => "grey",
        0xd => "light green",
        0xe => "light blue",
        _ => "light grey",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn power_on_regs() -> [u8; REGISTER_COUNT] {
        let mut regs = [0u8; REGISTER_COUNT];
        regs[0x11] = 0x1b; // display on, 25 rows, y-scroll 3
        regs[0x16] = 0xc8; // 40 columns
        regs[0x18] = 0x15; // screen $0400, charset $1000
        regs[0x20] = 0x0e; // light blue border
        regs[0x21] = 0x06; // blue background
        regs
    }

    #[test]
    fn power_on_state_interprets() {
        let state = VicState::interpret(&power_on_regs()).unwrap();
        assert_eq!(state.mode, ScreenMode::StandardText);
        assert!(state.display_enabled);
        assert!(state.rows_25);
        assert!(state.columns_40);
        assert_eq!(state.y_scroll, 3);
        assert_eq!(state.screen_base, 0x0400);
        assert_eq!(state.charset_base, 0x1000);
        assert_eq!(state.border_color, 0x0e);
        assert_eq!(state.background_colors[0], 0x06);
        assert!(state.sprites.iter().all(|s| !s.enabled));
    }

    #[test]
    fn sprite_x_msb_folds_into_coordinate() {
        let mut regs = power_on_regs();
        regs[0x00] = 0x40; // sprite 0 x low
        regs[0x01] = 0x64; // sprite 0 y
        regs[0x10] = 0x01; // sprite 0 x msb
        regs[0x15] = 0x01; // sprite 0 enabled
        regs[0x27] = 0x07; // yellow

        let state = VicState::interpret(&regs).unwrap();
        let sprite = state.sprites[0];
        assert_eq!(sprite.x, 0x140);
        assert_eq!(sprite.y, 0x64);
        assert!(sprite.enabled);
        assert_eq!(sprite.color, 0x07);
        assert!(!state.sprites[1].enabled);
    }

    #[test]
    fn bitmap_mode_decodes_from_control_bits() {
        let mut regs = power_on_regs();
        regs[0x11] |= 0x20; // BMM
        let state = VicState::interpret(&regs).unwrap();
        assert_eq!(state.mode, ScreenMode::Bitmap);

        regs[0x16] |= 0x10; // + MCM
        let state = VicState::interpret(&regs).unwrap();
        assert_eq!(state.mode, ScreenMode::MulticolorBitmap);

        regs[0x11] |= 0x40; // + ECM: illegal combination
        let state = VicState::interpret(&regs).unwrap();
        assert_eq!(state.mode, ScreenMode::Invalid);
    }

    #[test]
    fn raster_msb_folds_in() {
        let mut regs = power_on_regs();
        regs[0x12] = 0x37;
        regs[0x11] |= 0x80;
        let state = VicState::interpret(&regs).unwrap();
        assert_eq!(state.raster, 0x137);
    }

    #[test]
    fn short_buffer_is_rejected() {
        let err = VicState::interpret(&[0u8; 10]).unwrap_err();
        assert!(matches!(err, DecodeError::WrongLength { got: 10, .. }));
    }

    #[test]
    fn color_names_cover_the_palette() {
        assert_eq!(color_name(0x0), "black");
        assert_eq!(color_name(0x6), "blue");
        assert_eq!(color_name(0x1f), "light grey");
    }
}
