use anyhow::{anyhow, Result};
use global_hotkey::hotkey::Code;

/// Convert global_hotkey Code enum to macOS keycode
/// Returns None if the Code is not a letter or digit key
pub fn code_to_keycode(code: Code) -> Option<u16> {
    match code {
        Code::KeyA => Some(0),
        Code::KeyB => Some(11),
        Code::KeyC => Some(8),
        Code::KeyD => Some(2),
        Code::KeyE => Some(14),
        Code::KeyF => Some(3),
        Code::KeyG => Some(5),
        Code::KeyH => Some(4),
        Code::KeyI => Some(34),
        Code::KeyJ => Some(38),
        Code::KeyK => Some(40),
        Code::KeyL => Some(37),
        Code::KeyM => Some(46),
        Code::KeyN => Some(45),
        Code::KeyO => Some(31),
        Code::KeyP => Some(35),
        Code::KeyQ => Some(12),
        Code::KeyR => Some(15),
        Code::KeyS => Some(1),
        Code::KeyT => Some(17),
        Code::KeyU => Some(32),
        Code::KeyV => Some(9),
        Code::KeyW => Some(13),
        Code::KeyX => Some(7),
        Code::KeyY => Some(16),
        Code::KeyZ => Some(6),
        Code::Digit1 => Some(18),
        Code::Digit2 => Some(19),
        Code::Digit3 => Some(20),
        Code::Digit4 => Some(21),
        Code::Digit5 => Some(23),
        Code::Digit6 => Some(22),
        Code::Digit7 => Some(26),
        Code::Digit8 => Some(28),
        Code::Digit9 => Some(25),
        Code::Digit0 => Some(29),
        _ => None,
    }
}

/// Parse a single key name (A-Z or 0-9, case insensitive) to a Code
pub fn parse_key_string(key: &str) -> Result<Code> {
    let key_upper = key.trim().to_uppercase();
    let mut chars = key_upper.chars();
    let ch = match (chars.next(), chars.next()) {
        (Some(ch), None) => ch,
        _ => return Err(anyhow!("Key must be a single character, got '{}'", key)),
    };

    match ch {
        'A' => Ok(Code::KeyA),
        'B' => Ok(Code::KeyB),
        'C' => Ok(Code::KeyC),
        'D' => Ok(Code::KeyD),
        'E' => Ok(Code::KeyE),
        'F' => Ok(Code::KeyF),
        'G' => Ok(Code::KeyG),
        'H' => Ok(Code::KeyH),
        'I' => Ok(Code::KeyI),
        'J' => Ok(Code::KeyJ),
        'K' => Ok(Code::KeyK),
        'L' => Ok(Code::KeyL),
        'M' => Ok(Code::KeyM),
        'N' => Ok(Code::KeyN),
        'O' => Ok(Code::KeyO),
        'P' => Ok(Code::KeyP),
        'Q' => Ok(Code::KeyQ),
        'R' => Ok(Code::KeyR),
        'S' => Ok(Code::KeyS),
        'T' => Ok(Code::KeyT),
        'U' => Ok(Code::KeyU),
        'V' => Ok(Code::KeyV),
        'W' => Ok(Code::KeyW),
        'X' => Ok(Code::KeyX),
        'Y' => Ok(Code::KeyY),
        'Z' => Ok(Code::KeyZ),
        '0' => Ok(Code::Digit0),
        '1' => Ok(Code::Digit1),
        '2' => Ok(Code::Digit2),
        '3' => Ok(Code::Digit3),
        '4' => Ok(Code::Digit4),
        '5' => Ok(Code::Digit5),
        '6' => Ok(Code::Digit6),
        '7' => Ok(Code::Digit7),
        '8' => Ok(Code::Digit8),
        '9' => Ok(Code::Digit9),
        _ => Err(anyhow!("Key must be a letter A-Z or digit 0-9, got '{}'", key)),
    }
}

/// Parse a key name straight to its macOS keycode
pub fn key_string_to_keycode(key: &str) -> Result<u16> {
    let code = parse_key_string(key)?;
    code_to_keycode(code).ok_or_else(|| anyhow!("No macOS keycode for '{}'", key))
}

/// Label for a macOS keycode, used when a recorded key carries no characters
/// Based on HIToolbox/Events.h keycodes for US keyboard layout
pub fn keycode_label(keycode: u16) -> String {
    let label = match keycode {
        0 => "A",
        1 => "S",
        2 => "D",
        3 => "F",
        4 => "H",
        5 => "G",
        6 => "Z",
        7 => "X",
        8 => "C",
        9 => "V",
        11 => "B",
        12 => "Q",
        13 => "W",
        14 => "E",
        15 => "R",
        16 => "Y",
        17 => "T",
        18 => "1",
        19 => "2",
        20 => "3",
        21 => "4",
        22 => "6",
        23 => "5",
        24 => "=",
        25 => "9",
        26 => "7",
        27 => "-",
        28 => "8",
        29 => "0",
        30 => "]",
        31 => "O",
        32 => "U",
        33 => "[",
        34 => "I",
        35 => "P",
        36 => "Return",
        37 => "L",
        38 => "J",
        39 => "'",
        40 => "K",
        41 => ";",
        42 => "\\",
        43 => ",",
        44 => "/",
        45 => "N",
        46 => "M",
        47 => ".",
        48 => "Tab",
        49 => "Space",
        50 => "`",
        51 => "Delete",
        53 => "Esc",

        // Function keys
        122 => "F1",
        120 => "F2",
        99 => "F3",
        118 => "F4",
        96 => "F5",
        97 => "F6",
        98 => "F7",
        100 => "F8",
        101 => "F9",
        109 => "F10",
        103 => "F11",
        111 => "F12",

        // Arrows
        123 => "←",
        124 => "→",
        125 => "↓",
        126 => "↑",

        _ => return format!("Key{}", keycode),
    };
    label.to_string()
}
