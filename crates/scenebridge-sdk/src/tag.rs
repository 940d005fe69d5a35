//! Type tags ("kinds") shared by the managed and native sides
//!
//! Built-in tags are fixed constants known to both sides. Tags for user types
//! are allocated by the native engine at registration time and always start at
//! [`TypeTag::FIRST_USER`].

use std::fmt;

/// Compact identifier of a managed type as seen by native code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TypeTag(pub u32);

impl TypeTag {
    // ========================================================================
    // Value kinds
    // ========================================================================

    /// No type; a null value with no declared type
    pub const INVALID: TypeTag = TypeTag(0);
    /// Boolean, inline
    pub const BOOL: TypeTag = TypeTag(1);
    /// 64-bit float, inline
    pub const DOUBLE: TypeTag = TypeTag(2);
    /// Unsigned 64-bit integer, inline
    pub const UINT64: TypeTag = TypeTag(3);
    /// Signed 32-bit integer, inline (also carries enums and fonts)
    pub const INT32: TypeTag = TypeTag(4);
    /// Owned string
    pub const STRING: TypeTag = TypeTag(5);
    /// Color blob
    pub const COLOR: TypeTag = TypeTag(6);
    /// Point blob
    pub const POINT: TypeTag = TypeTag(7);
    /// Rect blob
    pub const RECT: TypeTag = TypeTag(8);
    /// Repeat-behavior blob
    pub const REPEAT_BEHAVIOR: TypeTag = TypeTag(9);
    /// Duration blob
    pub const DURATION: TypeTag = TypeTag(10);
    /// Signed 64-bit integer, inline
    pub const INT64: TypeTag = TypeTag(11);
    /// Time span in 100ns ticks, inline as int64
    pub const TIMESPAN: TypeTag = TypeTag(12);
    /// Unicode scalar, inline as int32
    pub const CHAR: TypeTag = TypeTag(13);
    /// Key-time blob
    pub const KEY_TIME: TypeTag = TypeTag(14);
    /// Size blob
    pub const SIZE: TypeTag = TypeTag(15);
    /// Thickness blob
    pub const THICKNESS: TypeTag = TypeTag(16);
    /// Corner-radius blob
    pub const CORNER_RADIUS: TypeTag = TypeTag(17);
    /// Affine matrix blob
    pub const MATRIX: TypeTag = TypeTag(18);
    /// Grid-length blob
    pub const GRID_LENGTH: TypeTag = TypeTag(19);
    /// Font weight, inline as int32
    pub const FONT_WEIGHT: TypeTag = TypeTag(20);
    /// Font style, inline as int32
    pub const FONT_STYLE: TypeTag = TypeTag(21);
    /// Font stretch, inline as int32
    pub const FONT_STRETCH: TypeTag = TypeTag(22);
    /// Published managed value (handle-table id)
    pub const MANAGED: TypeTag = TypeTag(23);
    /// Native error record
    pub const NATIVE_ERROR: TypeTag = TypeTag(24);
    /// Root of the managed type lattice; never carried by a wire value
    pub const OBJECT: TypeTag = TypeTag(31);

    // ========================================================================
    // Object kinds
    // ========================================================================

    /// Base of every native object
    pub const DEPENDENCY_OBJECT: TypeTag = TypeTag(32);
    /// Abstract visual element
    pub const UI_ELEMENT: TypeTag = TypeTag(33);
    /// Abstract element with layout properties
    pub const FRAMEWORK_ELEMENT: TypeTag = TypeTag(34);
    /// Abstract container of child elements
    pub const PANEL: TypeTag = TypeTag(35);
    /// Absolute-positioning panel
    pub const CANVAS: TypeTag = TypeTag(36);
    /// Stacking panel
    pub const STACK_PANEL: TypeTag = TypeTag(37);
    /// Single-child decorator
    pub const BORDER: TypeTag = TypeTag(38);
    /// Text element
    pub const TEXT_BLOCK: TypeTag = TypeTag(39);
    /// Element with a single arbitrary content value
    pub const CONTENT_CONTROL: TypeTag = TypeTag(40);
    /// Abstract paint
    pub const BRUSH: TypeTag = TypeTag(41);
    /// Solid color paint
    pub const SOLID_COLOR_BRUSH: TypeTag = TypeTag(42);
    /// Abstract native collection
    pub const COLLECTION: TypeTag = TypeTag(43);
    /// Collection of visual elements
    pub const UI_ELEMENT_COLLECTION: TypeTag = TypeTag(44);
    /// Keyed resource collection
    pub const RESOURCE_DICTIONARY: TypeTag = TypeTag(45);
    /// Ordered-list interface
    pub const ILIST: TypeTag = TypeTag(46);
    /// Keyed-dictionary interface
    pub const IDICTIONARY: TypeTag = TypeTag(47);
    /// Rendering surface; exists only natively
    pub const SURFACE: TypeTag = TypeTag(48);
    /// Name scope; exists only natively
    pub const NAME_SCOPE: TypeTag = TypeTag(49);

    /// First tag the native engine may allocate for a user type
    pub const FIRST_USER: TypeTag = TypeTag(256);

    /// Raw tag value
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Check if the tag is one of the fixed built-in tags
    pub const fn is_builtin(self) -> bool {
        self.0 < Self::FIRST_USER.0
    }

    /// Check if the tag denotes a value kind (scalar, string, or blob)
    pub const fn is_value_kind(self) -> bool {
        self.0 <= Self::NATIVE_ERROR.0
    }

    /// Check if the tag carries its payload as a fixed-layout blob
    pub const fn is_blob_kind(self) -> bool {
        matches!(
            self,
            Self::COLOR
                | Self::POINT
                | Self::RECT
                | Self::REPEAT_BEHAVIOR
                | Self::DURATION
                | Self::KEY_TIME
                | Self::SIZE
                | Self::THICKNESS
                | Self::CORNER_RADIUS
                | Self::MATRIX
                | Self::GRID_LENGTH
        )
    }

    /// Short name for diagnostics
    pub fn name(self) -> &'static str {
        match self {
            Self::INVALID => "Invalid",
            Self::BOOL => "Bool",
            Self::DOUBLE => "Double",
            Self::UINT64 => "UInt64",
            Self::INT32 => "Int32",
            Self::STRING => "String",
            Self::COLOR => "Color",
            Self::POINT => "Point",
            Self::RECT => "Rect",
            Self::REPEAT_BEHAVIOR => "RepeatBehavior",
            Self::DURATION => "Duration",
            Self::INT64 => "Int64",
            Self::TIMESPAN => "TimeSpan",
            Self::CHAR => "Char",
            Self::KEY_TIME => "KeyTime",
            Self::SIZE => "Size",
            Self::THICKNESS => "Thickness",
            Self::CORNER_RADIUS => "CornerRadius",
            Self::MATRIX => "Matrix",
            Self::GRID_LENGTH => "GridLength",
            Self::FONT_WEIGHT => "FontWeight",
            Self::FONT_STYLE => "FontStyle",
            Self::FONT_STRETCH => "FontStretch",
            Self::MANAGED => "Managed",
            Self::NATIVE_ERROR => "NativeError",
            Self::OBJECT => "Object",
            Self::DEPENDENCY_OBJECT => "DependencyObject",
            Self::UI_ELEMENT => "UIElement",
            Self::FRAMEWORK_ELEMENT => "FrameworkElement",
            Self::PANEL => "Panel",
            Self::CANVAS => "Canvas",
            Self::STACK_PANEL => "StackPanel",
            Self::BORDER => "Border",
            Self::TEXT_BLOCK => "TextBlock",
            Self::CONTENT_CONTROL => "ContentControl",
            Self::BRUSH => "Brush",
            Self::SOLID_COLOR_BRUSH => "SolidColorBrush",
            Self::COLLECTION => "Collection",
            Self::UI_ELEMENT_COLLECTION => "UIElementCollection",
            Self::RESOURCE_DICTIONARY => "ResourceDictionary",
            Self::ILIST => "IList",
            Self::IDICTIONARY => "IDictionary",
            Self::SURFACE => "Surface",
            Self::NAME_SCOPE => "NameScope",
            _ if self.is_builtin() => "<reserved>",
            _ => "<user>",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_classification() {
        assert!(TypeTag::DOUBLE.is_value_kind());
        assert!(TypeTag::NATIVE_ERROR.is_value_kind());
        assert!(!TypeTag::CANVAS.is_value_kind());
        assert!(TypeTag::POINT.is_blob_kind());
        assert!(!TypeTag::INT32.is_blob_kind());
        assert!(TypeTag::CANVAS.is_builtin());
        assert!(!TypeTag(300).is_builtin());
    }

    #[test]
    fn test_tag_display() {
        assert_eq!(TypeTag::CANVAS.to_string(), "Canvas(36)");
        assert_eq!(TypeTag(400).to_string(), "<user>(400)");
    }
}
