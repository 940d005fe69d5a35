//! Text to value conversion for built-in types
//!
//! Markup attributes arrive as strings. This module knows the textual forms
//! of every built-in value kind and of enumerations; member- and type-level
//! converters registered on descriptors take precedence and are applied by
//! the caller.

use super::time::TICKS_PER_SECOND;
use super::{
    Color, CornerRadius, Duration, EnumValue, FontStretch, FontStyle, FontWeight, GridLength,
    KeyTime, Matrix, Point, Rect, RepeatBehavior, Size, Thickness, TimeSpan, Value,
};
use crate::error::ConversionError;
use crate::types::{TypeCategory, TypeRef};
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use scenebridge_sdk::TypeTag;

/// Named colors as `(a, r, g, b)`
static NAMED_COLORS: Lazy<FxHashMap<&'static str, (u8, u8, u8, u8)>> = Lazy::new(|| {
    let mut m = FxHashMap::default();
    m.insert("transparent", (0x00, 0xFF, 0xFF, 0xFF));
    m.insert("black", (0xFF, 0x00, 0x00, 0x00));
    m.insert("white", (0xFF, 0xFF, 0xFF, 0xFF));
    m.insert("red", (0xFF, 0xFF, 0x00, 0x00));
    m.insert("green", (0xFF, 0x00, 0x80, 0x00));
    m.insert("lime", (0xFF, 0x00, 0xFF, 0x00));
    m.insert("blue", (0xFF, 0x00, 0x00, 0xFF));
    m.insert("navy", (0xFF, 0x00, 0x00, 0x80));
    m.insert("yellow", (0xFF, 0xFF, 0xFF, 0x00));
    m.insert("gray", (0xFF, 0x80, 0x80, 0x80));
    m.insert("grey", (0xFF, 0x80, 0x80, 0x80));
    m.insert("silver", (0xFF, 0xC0, 0xC0, 0xC0));
    m.insert("lightgray", (0xFF, 0xD3, 0xD3, 0xD3));
    m.insert("darkgray", (0xFF, 0xA9, 0xA9, 0xA9));
    m.insert("orange", (0xFF, 0xFF, 0xA5, 0x00));
    m.insert("purple", (0xFF, 0x80, 0x00, 0x80));
    m.insert("cyan", (0xFF, 0x00, 0xFF, 0xFF));
    m.insert("aqua", (0xFF, 0x00, 0xFF, 0xFF));
    m.insert("magenta", (0xFF, 0xFF, 0x00, 0xFF));
    m.insert("fuchsia", (0xFF, 0xFF, 0x00, 0xFF));
    m.insert("brown", (0xFF, 0xA5, 0x2A, 0x2A));
    m.insert("pink", (0xFF, 0xFF, 0xC0, 0xCB));
    m.insert("maroon", (0xFF, 0x80, 0x00, 0x00));
    m.insert("olive", (0xFF, 0x80, 0x80, 0x00));
    m.insert("teal", (0xFF, 0x00, 0x80, 0x80));
    m
});

/// Convert markup text to a value of `target`
pub fn parse_text(target: &TypeRef, text: &str) -> Result<Value, ConversionError> {
    let fail = || ConversionError::from_text(target.full_name(), text);
    let trimmed = text.trim();
    let value = match target.category() {
        TypeCategory::Any => Some(Value::String(text.to_string())),
        TypeCategory::Enum(_) => parse_enum(target, trimmed),
        TypeCategory::Value(tag) => parse_value_kind(*tag, trimmed, text),
        _ => None,
    };
    value.ok_or_else(fail)
}

fn parse_enum(target: &TypeRef, s: &str) -> Option<Value> {
    let value = match target.enum_value(s) {
        Some(v) => v,
        None => s.parse::<i32>().ok()?,
    };
    Some(Value::Enum(EnumValue { ty: target.clone(), value }))
}

fn parse_value_kind(tag: TypeTag, s: &str, raw: &str) -> Option<Value> {
    let value = match tag {
        TypeTag::STRING => Value::String(raw.to_string()),
        TypeTag::BOOL => Value::Bool(parse_bool(s)?),
        TypeTag::DOUBLE => Value::F64(parse_double(s)?),
        TypeTag::INT32 => Value::I32(s.parse().ok()?),
        TypeTag::INT64 => Value::I64(s.parse().ok()?),
        TypeTag::UINT64 => Value::U64(s.parse().ok()?),
        TypeTag::CHAR => {
            let mut chars = raw.chars();
            let c = chars.next()?;
            if chars.next().is_some() {
                return None;
            }
            Value::Char(c)
        }
        TypeTag::TIMESPAN => Value::TimeSpan(parse_timespan(s)?),
        TypeTag::DURATION => Value::Duration(parse_duration(s)?),
        TypeTag::KEY_TIME => Value::KeyTime(parse_key_time(s)?),
        TypeTag::REPEAT_BEHAVIOR => Value::RepeatBehavior(parse_repeat_behavior(s)?),
        TypeTag::COLOR => Value::Color(parse_color(s)?),
        TypeTag::POINT => match numbers(s)?.as_slice() {
            [x, y] => Value::Point(Point::new(*x, *y)),
            _ => return None,
        },
        TypeTag::SIZE => match numbers(s)?.as_slice() {
            [w, h] if *w >= 0.0 && *h >= 0.0 => Value::Size(Size::new(*w, *h)),
            _ => return None,
        },
        TypeTag::RECT => match numbers(s)?.as_slice() {
            [x, y, w, h] => Value::Rect(Rect::new(*x, *y, *w, *h)),
            _ => return None,
        },
        TypeTag::THICKNESS => match numbers(s)?.as_slice() {
            [u] => Value::Thickness(Thickness::uniform(*u)),
            [h, v] => Value::Thickness(Thickness::new(*h, *v, *h, *v)),
            [l, t, r, b] => Value::Thickness(Thickness::new(*l, *t, *r, *b)),
            _ => return None,
        },
        TypeTag::CORNER_RADIUS => match numbers(s)?.as_slice() {
            [u] => Value::CornerRadius(CornerRadius::uniform(*u)),
            [tl, tr, br, bl] => Value::CornerRadius(CornerRadius {
                top_left: *tl,
                top_right: *tr,
                bottom_right: *br,
                bottom_left: *bl,
            }),
            _ => return None,
        },
        TypeTag::MATRIX => {
            if s.eq_ignore_ascii_case("identity") {
                Value::Matrix(Matrix::IDENTITY)
            } else {
                match numbers(s)?.as_slice() {
                    [m11, m12, m21, m22, ox, oy] => Value::Matrix(Matrix {
                        m11: *m11,
                        m12: *m12,
                        m21: *m21,
                        m22: *m22,
                        offset_x: *ox,
                        offset_y: *oy,
                    }),
                    _ => return None,
                }
            }
        }
        TypeTag::GRID_LENGTH => Value::GridLength(parse_grid_length(s)?),
        TypeTag::FONT_WEIGHT => {
            let weight = FontWeight::from_name(s).or_else(|| s.parse().ok().map(FontWeight))?;
            Value::FontWeight(weight)
        }
        TypeTag::FONT_STYLE => Value::FontStyle(FontStyle::from_name(s)?),
        TypeTag::FONT_STRETCH => {
            let stretch = FontStretch::from_name(s).or_else(|| s.parse().ok().map(FontStretch))?;
            Value::FontStretch(stretch)
        }
        _ => return None,
    };
    Some(value)
}

fn parse_bool(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Doubles accept `Auto` (NaN) and the infinities by name
fn parse_double(s: &str) -> Option<f64> {
    if s.eq_ignore_ascii_case("auto") || s.eq_ignore_ascii_case("nan") {
        return Some(f64::NAN);
    }
    if s.eq_ignore_ascii_case("infinity") {
        return Some(f64::INFINITY);
    }
    if s.eq_ignore_ascii_case("-infinity") {
        return Some(f64::NEG_INFINITY);
    }
    if s.is_empty() || s.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
        return None;
    }
    s.parse().ok()
}

/// Numbers separated by commas and/or whitespace
fn numbers(s: &str) -> Option<Vec<f64>> {
    let parts: Vec<&str> = s
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .collect();
    if parts.is_empty() {
        return None;
    }
    parts.into_iter().map(parse_double).collect()
}

/// `[-][d.]hh:mm[:ss[.fffffff]]`, or a bare integer number of days
fn parse_timespan(s: &str) -> Option<TimeSpan> {
    let (negative, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };

    let ticks = match body.find(':') {
        None => {
            let days: i64 = body.parse().ok()?;
            days.checked_mul(86_400 * TICKS_PER_SECOND)?
        }
        Some(colon) => {
            let (days, clock) = match body[..colon].find('.') {
                Some(dot) => (body[..dot].parse::<i64>().ok()?, &body[dot + 1..]),
                None => (0, body),
            };
            let fields: Vec<&str> = clock.split(':').collect();
            let (hours, minutes, seconds) = match fields.as_slice() {
                [h, m] => (*h, *m, "0"),
                [h, m, s] => (*h, *m, *s),
                _ => return None,
            };
            let hours: i64 = hours.parse().ok()?;
            let minutes: i64 = minutes.parse().ok()?;
            let (whole, fraction) = match seconds.split_once('.') {
                Some((w, f)) => (w, f),
                None => (seconds, ""),
            };
            let whole: i64 = whole.parse().ok()?;
            if !(0..24).contains(&hours) || !(0..60).contains(&minutes) || !(0..60).contains(&whole) || days < 0 {
                return None;
            }
            let fraction_ticks = fraction_to_ticks(fraction)?;
            let seconds_total = days
                .checked_mul(86_400)?
                .checked_add(hours * 3_600 + minutes * 60 + whole)?;
            seconds_total
                .checked_mul(TICKS_PER_SECOND)?
                .checked_add(fraction_ticks)?
        }
    };

    Some(TimeSpan::from_ticks(if negative { -ticks } else { ticks }))
}

fn fraction_to_ticks(fraction: &str) -> Option<i64> {
    if fraction.is_empty() {
        return Some(0);
    }
    if fraction.len() > 7 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let digits: i64 = fraction.parse().ok()?;
    Some(digits * 10_i64.pow(7 - fraction.len() as u32))
}

fn parse_duration(s: &str) -> Option<Duration> {
    if s.eq_ignore_ascii_case("automatic") {
        Some(Duration::Automatic)
    } else if s.eq_ignore_ascii_case("forever") {
        Some(Duration::Forever)
    } else {
        parse_timespan(s).map(Duration::TimeSpan)
    }
}

fn parse_key_time(s: &str) -> Option<KeyTime> {
    if s.eq_ignore_ascii_case("uniform") {
        return Some(KeyTime::Uniform);
    }
    if s.eq_ignore_ascii_case("paced") {
        return Some(KeyTime::Paced);
    }
    if let Some(percent) = s.strip_suffix('%') {
        let p: f64 = percent.trim().parse().ok()?;
        if !(0.0..=100.0).contains(&p) {
            return None;
        }
        return Some(KeyTime::Percent(p / 100.0));
    }
    parse_timespan(s).map(KeyTime::TimeSpan)
}

fn parse_repeat_behavior(s: &str) -> Option<RepeatBehavior> {
    if s.eq_ignore_ascii_case("forever") {
        return Some(RepeatBehavior::Forever);
    }
    if let Some(count) = s.strip_suffix('x') {
        let n: f64 = count.trim().parse().ok()?;
        if !n.is_finite() || n < 0.0 {
            return None;
        }
        return Some(RepeatBehavior::Count(n));
    }
    parse_timespan(s).map(RepeatBehavior::Duration)
}

fn parse_color(s: &str) -> Option<Color> {
    if let Some(hex) = s.strip_prefix('#') {
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|n| n * 17);
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        let (a, r, g, b) = match hex.len() {
            3 => (0xFF, nibble(0)?, nibble(1)?, nibble(2)?),
            4 => (nibble(0)?, nibble(1)?, nibble(2)?, nibble(3)?),
            6 => (0xFF, byte(0)?, byte(2)?, byte(4)?),
            8 => (byte(0)?, byte(2)?, byte(4)?, byte(6)?),
            _ => return None,
        };
        return Some(Color::from_argb(a, r, g, b));
    }
    NAMED_COLORS
        .get(s.to_ascii_lowercase().as_str())
        .map(|&(a, r, g, b)| Color::from_argb(a, r, g, b))
}

fn parse_grid_length(s: &str) -> Option<GridLength> {
    if s.eq_ignore_ascii_case("auto") {
        return Some(GridLength::AUTO);
    }
    if let Some(weight) = s.strip_suffix('*') {
        if weight.is_empty() {
            return Some(GridLength::star(1.0));
        }
        return weight.parse().ok().map(GridLength::star);
    }
    let pixels = parse_double(s)?;
    if pixels.is_nan() {
        return None;
    }
    Some(GridLength::pixels(pixels))
}
