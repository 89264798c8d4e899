//! PETSCII screen-code decoding.
//!
//! Screen RAM holds screen codes, not PETSCII character codes: letters
//! start at 1, the high bit selects reverse video, and the glyph set
//! depends on whether the machine is in the uppercase/graphics or the
//! lowercase character bank. Graphics glyphs without a sensible Unicode
//! counterpart decode to a middle dot.

/// Width of the standard text screen in characters.
pub const SCREEN_WIDTH: usize = 40;

/// Height of the standard text screen in characters.
pub const SCREEN_HEIGHT: usize = 25;

/// Default screen RAM location.
pub const SCREEN_BASE: u16 = 0x0400;

/// Decode one screen code to a character.
///
/// The high bit selects reverse video on hardware; the glyph itself is
/// unchanged, so it is masked off here.
pub fn screen_code_to_char(code: u8, lowercase: bool) -> char {
    let glyph = code & 0x7f;
    match glyph {
        0x00 => '@',
        0x01..=0x1a => {
            let letter = glyph - 1;
            if lowercase {
                (b'a' + letter) as char
            } else {
                (b'A' + letter) as char
            }
        }
        0x1b => '[',
        0x1c => '£',
        0x1d => ']',
        0x1e => '↑',
        0x1f => '←',
        // Punctuation and digits line up with ASCII.
        0x20..=0x3f => glyph as char,
        0x41..=0x5a if lowercase => glyph as char,
        _ => graphics_char(glyph),
    }
}

fn graphics_char(glyph: u8) -> char {
    match glyph {
        0x40 | 0x43 => '─',
        0x42 | 0x5d => '│',
        0x41 => '♠',
        0x51 => '●',
        0x53 => '♥',
        0x57 => '○',
        0x58 => '♣',
        0x5a => '♦',
        0x5b => '┼',
        0x60 => ' ',
        0x66 => '▒',
        0x6c => '▖',
        0x7b => '▘',
        0x7e => '▌',
        0x7f => '▚',
        _ => '·',
    }
}

/// Whether a screen code has its reverse-video bit set.
pub fn is_reverse(code: u8) -> bool {
    code & 0x80 != 0
}

/// Decode a screen RAM dump into text rows of [`SCREEN_WIDTH`] chars.
///
/// Any buffer length is accepted; a trailing partial row is kept, so a
/// sub-range read of screen RAM decodes too.
pub fn decode_screen(data: &[u8], lowercase: bool) -> Vec<String> {
    data.chunks(SCREEN_WIDTH)
        .map(|row| {
            row.iter()
                .map(|&code| screen_code_to_char(code, lowercase))
                .collect()
        })
        .collect()
}

/// Encode a string into screen codes for the uppercase/graphics bank.
///
/// Characters without a screen code become inverted question marks on
/// screen rather than being dropped, to keep offsets stable.
pub fn encode_screen(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '@' => 0x00,
            'a'..='z' => c as u8 - b'a' + 1,
            'A'..='Z' => c as u8 - b'A' + 1,
            '[' => 0x1b,
            '£' => 0x1c,
            ']' => 0x1d,
            '↑' => 0x1e,
            '←' => 0x1f,
            ' '..='?' => c as u8,
            _ => 0xbf,
        })
        .collect()
}
