//! Keycode taxonomy: a 32-bit keycode partitioned into disjoint ranges and
//! the pure functions that decode each range. No state is kept here.

/// An undecoded 32-bit keycode.
pub type Keycode = u32;

/// `0x0000_0000..=0x0000_00FF` — low 8 bits are the HID usage.
pub const BASIC_MIN: Keycode = 0x0000_0000;
/// Inclusive upper bound of the basic range.
pub const BASIC_MAX: Keycode = 0x0000_00FF;
/// `0x0000_0100..=0x0000_FFFF` — low 8 bits usage, next 8 bits modifier mask.
pub const MODIFIED_MIN: Keycode = 0x0000_0100;
/// Inclusive upper bound of the modified range.
pub const MODIFIED_MAX: Keycode = 0x0000_FFFF;
/// `0x0001_0000..=0x001F_FFFF` — value minus [`UNICODE_MIN`] is the codepoint.
pub const UNICODE_MIN: Keycode = 0x0001_0000;
/// Inclusive upper bound of the unicode range.
pub const UNICODE_MAX: Keycode = 0x001F_FFFF;
/// `0x0020_0000..=0x7FFF_FFFF` — value minus [`CUSTOM_MIN`] is the function id.
pub const CUSTOM_MIN: Keycode = 0x0020_0000;
/// Inclusive upper bound of the custom range.
pub const CUSTOM_MAX: Keycode = 0x7FFF_FFFF;

/// Modifier bit assigned to the left control key.
pub const MOD_LCTL: u8 = 1 << 7;
/// Modifier bit assigned to the left shift key.
pub const MOD_LSFT: u8 = 1 << 6;
/// Modifier bit assigned to the left alt key.
pub const MOD_LALT: u8 = 1 << 5;
/// Modifier bit assigned to the left GUI (super/meta) key.
pub const MOD_LGUI: u8 = 1 << 4;
/// Modifier bit assigned to the right control key.
pub const MOD_RCTL: u8 = 1 << 3;
/// Modifier bit assigned to the right shift key.
pub const MOD_RSFT: u8 = 1 << 2;
/// Modifier bit assigned to the right alt key.
pub const MOD_RALT: u8 = 1 << 1;
/// Modifier bit assigned to the right GUI (super/meta) key.
pub const MOD_RGUI: u8 = 1 << 0;

/// Which of the four disjoint ranges a keycode falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeycodeKind {
    /// `0x00..=0xFF`.
    Basic,
    /// `0x0100..=0xFFFF`.
    Modified,
    /// `0x1_0000..=0x1F_FFFF`.
    Unicode,
    /// `0x20_0000..=0x7FFF_FFFF`.
    Custom,
    /// Outside every defined range.
    #[default]
    Invalid,
}

/// Classify a keycode into one of [`KeycodeKind`]'s variants.
pub const fn kind(keycode: Keycode) -> KeycodeKind {
    if keycode <= BASIC_MAX {
        KeycodeKind::Basic
    } else if keycode <= MODIFIED_MAX {
        KeycodeKind::Modified
    } else if keycode >= UNICODE_MIN && keycode <= UNICODE_MAX {
        KeycodeKind::Unicode
    } else if keycode >= CUSTOM_MIN && keycode <= CUSTOM_MAX {
        KeycodeKind::Custom
    } else {
        KeycodeKind::Invalid
    }
}

/// The HID usage byte for a basic or modified keycode; 0 otherwise.
pub const fn basic(keycode: Keycode) -> u8 {
    if keycode > MODIFIED_MAX {
        0
    } else {
        (keycode & 0xFF) as u8
    }
}

/// The modifier bitmask for a modified keycode; 0 otherwise.
pub const fn modifiers(keycode: Keycode) -> u8 {
    if keycode <= BASIC_MAX || keycode > MODIFIED_MAX {
        0
    } else {
        ((keycode >> 8) & 0xFF) as u8
    }
}

/// The unicode codepoint for a unicode keycode; 0 otherwise.
pub const fn unicode(keycode: Keycode) -> u32 {
    if keycode < UNICODE_MIN || keycode > UNICODE_MAX {
        0
    } else {
        keycode - UNICODE_MIN
    }
}

/// The custom function id for a custom keycode; 0 otherwise.
pub const fn custom(keycode: Keycode) -> u32 {
    if keycode < CUSTOM_MIN || keycode > CUSTOM_MAX {
        0
    } else {
        keycode - CUSTOM_MIN
    }
}

/// `true` if `keycode` carries any modifier (i.e. its kind is `Modified`).
pub const fn has_modifiers(keycode: Keycode) -> bool {
    matches!(kind(keycode), KeycodeKind::Modified)
}

/// `true` if `keycode` is modified and `bit` is set in its modifier mask.
pub const fn has_mod(keycode: Keycode, bit: u8) -> bool {
    modifiers(keycode) & bit != 0
}

/// The fully decoded form of a keycode: its kind plus every field relevant
/// to that kind (fields irrelevant to the kind are left at 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeycodeInfo {
    /// Which range the keycode belongs to.
    pub kind: KeycodeKind,
    /// Valid for `Basic` and `Modified`.
    pub basic_key: u8,
    /// Valid for `Modified` only.
    pub modifiers: u8,
    /// Valid for `Unicode` only.
    pub unicode_cp: u32,
    /// Valid for `Custom` only.
    pub custom_func: u32,
}

/// Decode every field of a keycode in one call.
pub fn decode(keycode: Keycode) -> KeycodeInfo {
    let k = kind(keycode);
    let mut info = KeycodeInfo {
        kind: k,
        ..KeycodeInfo::default()
    };
    match k {
        KeycodeKind::Basic => info.basic_key = basic(keycode),
        KeycodeKind::Modified => {
            info.basic_key = basic(keycode);
            info.modifiers = modifiers(keycode);
        }
        KeycodeKind::Unicode => info.unicode_cp = unicode(keycode),
        KeycodeKind::Custom => info.custom_func = custom(keycode),
        KeycodeKind::Invalid => {}
    }
    info
}
