//! Device glyph tables (code page 437 upper half)

/// What a native-glyph terminal shows for bytes 0x80..=0xFF
const CP437_HIGH: [char; 128] = [
    'Ç', 'ü', 'é', 'â', 'ä', 'à', 'å', 'ç', 'ê', 'ë', 'è', 'ï', 'î', 'ì', 'Ä', 'Å',
    'É', 'æ', 'Æ', 'ô', 'ö', 'ò', 'û', 'ù', 'ÿ', 'Ö', 'Ü', '¢', '£', '¥', '₧', 'ƒ',
    'á', 'í', 'ó', 'ú', 'ñ', 'Ñ', 'ª', 'º', '¿', '⌐', '¬', '½', '¼', '¡', '«', '»',
    '░', '▒', '▓', '│', '┤', '╡', '╢', '╖', '╕', '╣', '║', '╗', '╝', '╜', '╛', '┐',
    '└', '┴', '┬', '├', '─', '┼', '╞', '╟', '╚', '╔', '╩', '╦', '╠', '═', '╬', '╧',
    '╨', '╤', '╥', '╙', '╘', '╒', '╓', '╫', '╪', '┘', '┌', '█', '▄', '▌', '▐', '▀',
    'α', 'ß', 'Γ', 'π', 'Σ', 'σ', 'µ', 'τ', 'Φ', 'Θ', 'Ω', 'δ', '∞', 'φ', 'ε', '∩',
    '≡', '±', '≥', '≤', '⌠', '⌡', '÷', '≈', '°', '∙', '·', '√', 'ⁿ', '²', '■', ' ',
];

/// Plain ASCII stand-ins for the same bytes
const ASCII_HIGH: &[u8; 128] = b"\
CueaaaaceeeiiiAA\
EaAooouuyOUcLYPf\
aiounNao?--%%!<>\
###|++++++|+++++\
++++-++++++++=++\
+++++++++++#####\
aBGpSsutFOOd8fen\
=+><||/=o..vn2# ";

/// ASCII homoglyph for a device glyph code
pub fn homoglyph(code: u8) -> char {
    if code < 0x80 {
        return code as char;
    }
    ASCII_HIGH[(code - 0x80) as usize] as char
}

/// Native rendering of a device glyph code
pub fn native(code: u8) -> char {
    if code < 0x80 {
        return code as char;
    }
    CP437_HIGH[(code - 0x80) as usize]
}
