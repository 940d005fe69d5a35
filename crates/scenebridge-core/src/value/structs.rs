//! Fixed-layout struct values
//!
//! Each struct kind travels as a little-endian blob with a fixed size. A null
//! blob decodes to the type's default.
//!
//! | Kind           | Layout                                        | Size |
//! |----------------|-----------------------------------------------|------|
//! | Color          | r, g, b, a: f64 (0.0..=1.0)                    | 32   |
//! | Point          | x, y: f64                                     | 16   |
//! | Size           | width, height: f64                            | 16   |
//! | Rect           | x, y, width, height: f64                      | 32   |
//! | Thickness      | left, top, right, bottom: f64                 | 32   |
//! | CornerRadius   | top_left, top_right, bottom_right, bottom_left | 32   |
//! | Matrix         | m11, m12, m21, m22, offset_x, offset_y: f64   | 48   |
//! | GridLength     | value: f64, unit: i32, pad: 4                 | 16   |
//! | Duration       | kind: i32, pad: 4, ticks: i64                 | 16   |
//! | KeyTime        | kind: i32, pad: 4, percent: f64, ticks: i64   | 24   |
//! | RepeatBehavior | kind: i32, pad: 4, count: f64, ticks: i64     | 24   |

use super::time::{Duration, KeyTime, RepeatBehavior, TimeSpan};
use crate::error::{BridgeError, BridgeResult};
use scenebridge_sdk::TypeTag;

/// A struct kind with a fixed wire layout
pub(crate) trait BlobLayout: Sized + Default {
    /// Wire tag
    const TAG: TypeTag;
    /// Exact blob size in bytes
    const SIZE: usize;

    /// Append the layout to `out`
    fn write(&self, out: &mut BlobWriter);

    /// Read the layout; the blob length has already been checked
    fn read(reader: &mut BlobReader<'_>) -> Self;
}

/// Sequential little-endian writer
pub(crate) struct BlobWriter {
    bytes: Vec<u8>,
}

impl BlobWriter {
    fn with_capacity(size: usize) -> Self {
        Self { bytes: Vec::with_capacity(size) }
    }

    pub(crate) fn f64(&mut self, v: f64) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    pub(crate) fn i32(&mut self, v: i32) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    pub(crate) fn i64(&mut self, v: i64) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    pub(crate) fn pad(&mut self, n: usize) {
        self.bytes.extend(std::iter::repeat(0u8).take(n));
    }
}

/// Sequential little-endian reader
pub(crate) struct BlobReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> BlobReader<'a> {
    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut buf = [0u8; N];
        buf.copy_from_slice(&self.bytes[self.pos..self.pos + N]);
        self.pos += N;
        buf
    }

    pub(crate) fn f64(&mut self) -> f64 {
        f64::from_le_bytes(self.take::<8>())
    }

    pub(crate) fn i32(&mut self) -> i32 {
        i32::from_le_bytes(self.take::<4>())
    }

    pub(crate) fn i64(&mut self) -> i64 {
        i64::from_le_bytes(self.take::<8>())
    }

    pub(crate) fn skip(&mut self, n: usize) {
        self.pos += n;
    }
}

/// Encode a struct into a freshly allocated blob
pub(crate) fn encode_blob<T: BlobLayout>(value: &T) -> Box<[u8]> {
    let mut writer = BlobWriter::with_capacity(T::SIZE);
    value.write(&mut writer);
    debug_assert_eq!(writer.bytes.len(), T::SIZE);
    writer.bytes.into_boxed_slice()
}

/// Decode a struct from an optional blob; `None` yields the default
pub(crate) fn decode_blob<T: BlobLayout>(blob: Option<&[u8]>) -> BridgeResult<T> {
    let Some(bytes) = blob else {
        return Ok(T::default());
    };
    if bytes.len() != T::SIZE {
        return Err(BridgeError::Protocol(format!(
            "{} blob must be {} bytes, got {}",
            T::TAG.name(),
            T::SIZE,
            bytes.len()
        )));
    }
    let mut reader = BlobReader { bytes, pos: 0 };
    Ok(T::read(&mut reader))
}

// ============================================================================
// Geometry
// ============================================================================

/// ARGB color with components in `0.0..=1.0`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Color {
    /// Red
    pub r: f64,
    /// Green
    pub g: f64,
    /// Blue
    pub b: f64,
    /// Alpha
    pub a: f64,
}

impl Color {
    /// Build from 8-bit channels
    pub fn from_argb(a: u8, r: u8, g: u8, b: u8) -> Self {
        Color {
            r: f64::from(r) / 255.0,
            g: f64::from(g) / 255.0,
            b: f64::from(b) / 255.0,
            a: f64::from(a) / 255.0,
        }
    }

    /// Channels as 8-bit values (a, r, g, b)
    pub fn to_argb(self) -> (u8, u8, u8, u8) {
        let q = |c: f64| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        (q(self.a), q(self.r), q(self.g), q(self.b))
    }
}

impl BlobLayout for Color {
    const TAG: TypeTag = TypeTag::COLOR;
    const SIZE: usize = 32;

    fn write(&self, out: &mut BlobWriter) {
        out.f64(self.r);
        out.f64(self.g);
        out.f64(self.b);
        out.f64(self.a);
    }

    fn read(reader: &mut BlobReader<'_>) -> Self {
        Color {
            r: reader.f64(),
            g: reader.f64(),
            b: reader.f64(),
            a: reader.f64(),
        }
    }
}

/// 2D point
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
}

impl Point {
    /// Create a point
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }
}

impl BlobLayout for Point {
    const TAG: TypeTag = TypeTag::POINT;
    const SIZE: usize = 16;

    fn write(&self, out: &mut BlobWriter) {
        out.f64(self.x);
        out.f64(self.y);
    }

    fn read(reader: &mut BlobReader<'_>) -> Self {
        Point { x: reader.f64(), y: reader.f64() }
    }
}

/// 2D size
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    /// Width
    pub width: f64,
    /// Height
    pub height: f64,
}

impl Size {
    /// Create a size
    pub fn new(width: f64, height: f64) -> Self {
        Size { width, height }
    }
}

impl BlobLayout for Size {
    const TAG: TypeTag = TypeTag::SIZE;
    const SIZE: usize = 16;

    fn write(&self, out: &mut BlobWriter) {
        out.f64(self.width);
        out.f64(self.height);
    }

    fn read(reader: &mut BlobReader<'_>) -> Self {
        Size { width: reader.f64(), height: reader.f64() }
    }
}

/// Axis-aligned rectangle
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    /// Left edge
    pub x: f64,
    /// Top edge
    pub y: f64,
    /// Width
    pub width: f64,
    /// Height
    pub height: f64,
}

impl Rect {
    /// Create a rectangle
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Rect { x, y, width, height }
    }
}

impl BlobLayout for Rect {
    const TAG: TypeTag = TypeTag::RECT;
    const SIZE: usize = 32;

    fn write(&self, out: &mut BlobWriter) {
        out.f64(self.x);
        out.f64(self.y);
        out.f64(self.width);
        out.f64(self.height);
    }

    fn read(reader: &mut BlobReader<'_>) -> Self {
        Rect {
            x: reader.f64(),
            y: reader.f64(),
            width: reader.f64(),
            height: reader.f64(),
        }
    }
}

/// Per-edge thickness (margins, padding, borders)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Thickness {
    /// Left edge
    pub left: f64,
    /// Top edge
    pub top: f64,
    /// Right edge
    pub right: f64,
    /// Bottom edge
    pub bottom: f64,
}

impl Thickness {
    /// Same thickness on every edge
    pub fn uniform(v: f64) -> Self {
        Thickness { left: v, top: v, right: v, bottom: v }
    }

    /// Explicit edges
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Thickness { left, top, right, bottom }
    }
}

impl BlobLayout for Thickness {
    const TAG: TypeTag = TypeTag::THICKNESS;
    const SIZE: usize = 32;

    fn write(&self, out: &mut BlobWriter) {
        out.f64(self.left);
        out.f64(self.top);
        out.f64(self.right);
        out.f64(self.bottom);
    }

    fn read(reader: &mut BlobReader<'_>) -> Self {
        Thickness {
            left: reader.f64(),
            top: reader.f64(),
            right: reader.f64(),
            bottom: reader.f64(),
        }
    }
}

/// Corner radii, clockwise from the top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CornerRadius {
    /// Top-left radius
    pub top_left: f64,
    /// Top-right radius
    pub top_right: f64,
    /// Bottom-right radius
    pub bottom_right: f64,
    /// Bottom-left radius
    pub bottom_left: f64,
}

impl CornerRadius {
    /// Same radius on every corner
    pub fn uniform(v: f64) -> Self {
        CornerRadius { top_left: v, top_right: v, bottom_right: v, bottom_left: v }
    }
}

impl BlobLayout for CornerRadius {
    const TAG: TypeTag = TypeTag::CORNER_RADIUS;
    const SIZE: usize = 32;

    fn write(&self, out: &mut BlobWriter) {
        out.f64(self.top_left);
        out.f64(self.top_right);
        out.f64(self.bottom_right);
        out.f64(self.bottom_left);
    }

    fn read(reader: &mut BlobReader<'_>) -> Self {
        CornerRadius {
            top_left: reader.f64(),
            top_right: reader.f64(),
            bottom_right: reader.f64(),
            bottom_left: reader.f64(),
        }
    }
}

/// 2D affine transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    /// Row 1, column 1
    pub m11: f64,
    /// Row 1, column 2
    pub m12: f64,
    /// Row 2, column 1
    pub m21: f64,
    /// Row 2, column 2
    pub m22: f64,
    /// Horizontal translation
    pub offset_x: f64,
    /// Vertical translation
    pub offset_y: f64,
}

impl Matrix {
    /// The identity transform
    pub const IDENTITY: Matrix = Matrix {
        m11: 1.0,
        m12: 0.0,
        m21: 0.0,
        m22: 1.0,
        offset_x: 0.0,
        offset_y: 0.0,
    };
}

impl Default for Matrix {
    fn default() -> Self {
        Matrix::IDENTITY
    }
}

impl BlobLayout for Matrix {
    const TAG: TypeTag = TypeTag::MATRIX;
    const SIZE: usize = 48;

    fn write(&self, out: &mut BlobWriter) {
        out.f64(self.m11);
        out.f64(self.m12);
        out.f64(self.m21);
        out.f64(self.m22);
        out.f64(self.offset_x);
        out.f64(self.offset_y);
    }

    fn read(reader: &mut BlobReader<'_>) -> Self {
        Matrix {
            m11: reader.f64(),
            m12: reader.f64(),
            m21: reader.f64(),
            m22: reader.f64(),
            offset_x: reader.f64(),
            offset_y: reader.f64(),
        }
    }
}

/// Unit of a [`GridLength`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GridUnitType {
    /// Sized to content
    Auto,
    /// Fixed pixels
    #[default]
    Pixel,
    /// Weighted share of the remaining space
    Star,
}

/// Row or column length in a grid layout
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLength {
    /// Magnitude (ignored for `Auto`)
    pub value: f64,
    /// Unit
    pub unit: GridUnitType,
}

impl GridLength {
    /// Sized-to-content length
    pub const AUTO: GridLength = GridLength { value: 1.0, unit: GridUnitType::Auto };

    /// Fixed pixel length
    pub fn pixels(value: f64) -> Self {
        GridLength { value, unit: GridUnitType::Pixel }
    }

    /// Weighted length
    pub fn star(value: f64) -> Self {
        GridLength { value, unit: GridUnitType::Star }
    }
}

impl Default for GridLength {
    fn default() -> Self {
        GridLength::star(1.0)
    }
}

impl BlobLayout for GridLength {
    const TAG: TypeTag = TypeTag::GRID_LENGTH;
    const SIZE: usize = 16;

    fn write(&self, out: &mut BlobWriter) {
        out.f64(self.value);
        out.i32(match self.unit {
            GridUnitType::Auto => 0,
            GridUnitType::Pixel => 1,
            GridUnitType::Star => 2,
        });
        out.pad(4);
    }

    fn read(reader: &mut BlobReader<'_>) -> Self {
        let value = reader.f64();
        let unit = match reader.i32() {
            0 => GridUnitType::Auto,
            2 => GridUnitType::Star,
            _ => GridUnitType::Pixel,
        };
        reader.skip(4);
        GridLength { value, unit }
    }
}

// ============================================================================
// Timing
// ============================================================================

const DURATION_TIMESPAN: i32 = 0;
const DURATION_AUTOMATIC: i32 = 1;
const DURATION_FOREVER: i32 = 2;

impl BlobLayout for Duration {
    const TAG: TypeTag = TypeTag::DURATION;
    const SIZE: usize = 16;

    fn write(&self, out: &mut BlobWriter) {
        let (kind, ticks) = match self {
            Duration::TimeSpan(ts) => (DURATION_TIMESPAN, ts.ticks()),
            Duration::Automatic => (DURATION_AUTOMATIC, 0),
            Duration::Forever => (DURATION_FOREVER, 0),
        };
        out.i32(kind);
        out.pad(4);
        out.i64(ticks);
    }

    fn read(reader: &mut BlobReader<'_>) -> Self {
        let kind = reader.i32();
        reader.skip(4);
        let ticks = reader.i64();
        match kind {
            DURATION_TIMESPAN => Duration::TimeSpan(TimeSpan::from_ticks(ticks)),
            DURATION_FOREVER => Duration::Forever,
            _ => Duration::Automatic,
        }
    }
}

const KEYTIME_UNIFORM: i32 = 0;
const KEYTIME_PERCENT: i32 = 1;
const KEYTIME_TIMESPAN: i32 = 2;
const KEYTIME_PACED: i32 = 3;

impl BlobLayout for KeyTime {
    const TAG: TypeTag = TypeTag::KEY_TIME;
    const SIZE: usize = 24;

    fn write(&self, out: &mut BlobWriter) {
        let (kind, percent, ticks) = match self {
            KeyTime::Uniform => (KEYTIME_UNIFORM, 0.0, 0),
            KeyTime::Percent(p) => (KEYTIME_PERCENT, *p, 0),
            KeyTime::TimeSpan(ts) => (KEYTIME_TIMESPAN, 0.0, ts.ticks()),
            KeyTime::Paced => (KEYTIME_PACED, 0.0, 0),
        };
        out.i32(kind);
        out.pad(4);
        out.f64(percent);
        out.i64(ticks);
    }

    fn read(reader: &mut BlobReader<'_>) -> Self {
        let kind = reader.i32();
        reader.skip(4);
        let percent = reader.f64();
        let ticks = reader.i64();
        match kind {
            KEYTIME_PERCENT => KeyTime::Percent(percent),
            KEYTIME_TIMESPAN => KeyTime::TimeSpan(TimeSpan::from_ticks(ticks)),
            KEYTIME_PACED => KeyTime::Paced,
            _ => KeyTime::Uniform,
        }
    }
}

const REPEAT_COUNT: i32 = 0;
const REPEAT_DURATION: i32 = 1;
const REPEAT_FOREVER: i32 = 2;

impl BlobLayout for RepeatBehavior {
    const TAG: TypeTag = TypeTag::REPEAT_BEHAVIOR;
    const SIZE: usize = 24;

    fn write(&self, out: &mut BlobWriter) {
        let (kind, count, ticks) = match self {
            RepeatBehavior::Count(c) => (REPEAT_COUNT, *c, 0),
            RepeatBehavior::Duration(ts) => (REPEAT_DURATION, 0.0, ts.ticks()),
            RepeatBehavior::Forever => (REPEAT_FOREVER, 0.0, 0),
        };
        out.i32(kind);
        out.pad(4);
        out.f64(count);
        out.i64(ticks);
    }

    fn read(reader: &mut BlobReader<'_>) -> Self {
        let kind = reader.i32();
        reader.skip(4);
        let count = reader.f64();
        let ticks = reader.i64();
        match kind {
            REPEAT_DURATION => RepeatBehavior::Duration(TimeSpan::from_ticks(ticks)),
            REPEAT_FOREVER => RepeatBehavior::Forever,
            _ => RepeatBehavior::Count(count),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_blob_decodes_to_default() {
        assert_eq!(decode_blob::<Point>(None).unwrap(), Point::default());
        assert_eq!(decode_blob::<Duration>(None).unwrap(), Duration::Automatic);
        assert_eq!(decode_blob::<KeyTime>(None).unwrap(), KeyTime::Uniform);
        assert_eq!(
            decode_blob::<RepeatBehavior>(None).unwrap(),
            RepeatBehavior::Count(1.0)
        );
        assert_eq!(decode_blob::<Matrix>(None).unwrap(), Matrix::IDENTITY);
    }

    #[test]
    fn test_wrong_length_is_protocol_error() {
        let short = [0u8; 12];
        let err = decode_blob::<Rect>(Some(&short)).unwrap_err();
        assert!(matches!(err, BridgeError::Protocol(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_point_layout_is_little_endian() {
        let blob = encode_blob(&Point::new(1.0, -2.5));
        assert_eq!(blob.len(), 16);
        assert_eq!(&blob[0..8], &1.0f64.to_le_bytes());
        assert_eq!(&blob[8..16], &(-2.5f64).to_le_bytes());
    }

    #[test]
    fn test_duration_layout() {
        let blob = encode_blob(&Duration::TimeSpan(TimeSpan::from_seconds(2.0)));
        assert_eq!(blob.len(), 16);
        assert_eq!(&blob[0..4], &0i32.to_le_bytes());
        assert_eq!(&blob[8..16], &20_000_000i64.to_le_bytes());

        let forever = encode_blob(&Duration::Forever);
        assert_eq!(decode_blob::<Duration>(Some(&forever)).unwrap(), Duration::Forever);
    }

    #[test]
    fn test_key_time_percent_survives() {
        let blob = encode_blob(&KeyTime::Percent(0.25));
        assert_eq!(blob.len(), KeyTime::SIZE);
        assert_eq!(decode_blob::<KeyTime>(Some(&blob)).unwrap(), KeyTime::Percent(0.25));
    }

    #[test]
    fn test_color_from_argb() {
        let c = Color::from_argb(255, 255, 0, 51);
        assert_eq!(c.r, 1.0);
        assert_eq!(c.g, 0.0);
        assert!((c.b - 0.2).abs() < 1e-9);
        assert_eq!(c.to_argb(), (255, 255, 0, 51));
    }
}
