//! Font values carried inline as int32

/// Numeric font weight (100..=999)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FontWeight(pub i32);

impl FontWeight {
    /// 100
    pub const THIN: FontWeight = FontWeight(100);
    /// 200
    pub const EXTRA_LIGHT: FontWeight = FontWeight(200);
    /// 300
    pub const LIGHT: FontWeight = FontWeight(300);
    /// 400
    pub const NORMAL: FontWeight = FontWeight(400);
    /// 500
    pub const MEDIUM: FontWeight = FontWeight(500);
    /// 600
    pub const SEMI_BOLD: FontWeight = FontWeight(600);
    /// 700
    pub const BOLD: FontWeight = FontWeight(700);
    /// 800
    pub const EXTRA_BOLD: FontWeight = FontWeight(800);
    /// 900
    pub const BLACK: FontWeight = FontWeight(900);
    /// 950
    pub const EXTRA_BLACK: FontWeight = FontWeight(950);

    /// Parse a well-known weight name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        let weight = match name.to_ascii_lowercase().as_str() {
            "thin" => Self::THIN,
            "extralight" | "ultralight" => Self::EXTRA_LIGHT,
            "light" => Self::LIGHT,
            "normal" | "regular" => Self::NORMAL,
            "medium" => Self::MEDIUM,
            "semibold" | "demibold" => Self::SEMI_BOLD,
            "bold" => Self::BOLD,
            "extrabold" | "ultrabold" => Self::EXTRA_BOLD,
            "black" | "heavy" => Self::BLACK,
            "extrablack" | "ultrablack" => Self::EXTRA_BLACK,
            _ => return None,
        };
        Some(weight)
    }
}

/// Font slant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontStyle {
    /// Upright
    Normal,
    /// Synthesized slant
    Oblique,
    /// True italic face
    Italic,
}

impl FontStyle {
    /// Wire value
    pub fn to_i32(self) -> i32 {
        match self {
            FontStyle::Normal => 0,
            FontStyle::Oblique => 1,
            FontStyle::Italic => 2,
        }
    }

    /// From wire value; out-of-range values are `None`
    pub fn from_i32(v: i32) -> Option<Self> {
        match v {
            0 => Some(FontStyle::Normal),
            1 => Some(FontStyle::Oblique),
            2 => Some(FontStyle::Italic),
            _ => None,
        }
    }

    /// Parse a style name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "normal" => Some(FontStyle::Normal),
            "oblique" => Some(FontStyle::Oblique),
            "italic" => Some(FontStyle::Italic),
            _ => None,
        }
    }
}

/// Font width relative to normal (1 = ultra-condensed, 9 = ultra-expanded)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FontStretch(pub i32);

impl FontStretch {
    /// Normal width
    pub const NORMAL: FontStretch = FontStretch(5);

    const NAMES: [&'static str; 9] = [
        "ultracondensed",
        "extracondensed",
        "condensed",
        "semicondensed",
        "normal",
        "semiexpanded",
        "expanded",
        "extraexpanded",
        "ultraexpanded",
    ];

    /// Parse a stretch name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower == "medium" {
            return Some(Self::NORMAL);
        }
        Self::NAMES
            .iter()
            .position(|n| *n == lower)
            .map(|i| FontStretch(i as i32 + 1))
    }
}
