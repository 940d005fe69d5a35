//! Built-in type catalog
//!
//! Built-in types have fixed tags that native code knows in advance. They are
//! pre-seeded into every registry and grouped in one module that documents
//! reach through the presentation namespace.

use super::descriptor::{AttachedDesc, ManagedType, PropertyDesc, TypeRef};
use super::module::Module;
use crate::object::NativeObject;
use once_cell::sync::Lazy;
use scenebridge_sdk::TypeTag;
use std::sync::Arc;

/// Name of the built-in module
pub const MODULE_NAME: &str = "SceneBridge";

/// Default document namespace for built-in element types
pub const PRESENTATION_XMLNS: &str = "http://schemas.microsoft.com/winfx/2006/xaml/presentation";

/// Document namespace for language directives (`x:Name`, `x:Key`)
pub const XAML_XMLNS: &str = "http://schemas.microsoft.com/winfx/2006/xaml";

const SYSTEM: &str = "System";
const CONTROLS: &str = "SceneBridge.Controls";
const MEDIA: &str = "SceneBridge.Media";

/// Every built-in type, by role
#[allow(missing_docs)]
pub struct BuiltinCatalog {
    // Value kinds
    pub object: TypeRef,
    pub boolean: TypeRef,
    pub double: TypeRef,
    pub int32: TypeRef,
    pub int64: TypeRef,
    pub uint64: TypeRef,
    pub string: TypeRef,
    pub char: TypeRef,
    pub timespan: TypeRef,
    pub color: TypeRef,
    pub point: TypeRef,
    pub size: TypeRef,
    pub rect: TypeRef,
    pub thickness: TypeRef,
    pub corner_radius: TypeRef,
    pub matrix: TypeRef,
    pub grid_length: TypeRef,
    pub duration: TypeRef,
    pub key_time: TypeRef,
    pub repeat_behavior: TypeRef,
    pub font_weight: TypeRef,
    pub font_style: TypeRef,
    pub font_stretch: TypeRef,

    // Enums
    pub visibility: TypeRef,
    pub horizontal_alignment: TypeRef,
    pub orientation: TypeRef,

    // Interfaces
    pub ilist: TypeRef,
    pub idictionary: TypeRef,

    // Object kinds
    pub dependency_object: TypeRef,
    pub brush: TypeRef,
    pub solid_color_brush: TypeRef,
    pub collection: TypeRef,
    pub ui_element_collection: TypeRef,
    pub resource_dictionary: TypeRef,
    pub ui_element: TypeRef,
    pub framework_element: TypeRef,
    pub panel: TypeRef,
    pub canvas: TypeRef,
    pub stack_panel: TypeRef,
    pub border: TypeRef,
    pub text_block: TypeRef,
    pub content_control: TypeRef,

    // Native-only
    pub surface: TypeRef,
    pub name_scope: TypeRef,

    all: Vec<TypeRef>,
}

impl BuiltinCatalog {
    /// Every built-in type
    pub fn all(&self) -> &[TypeRef] {
        &self.all
    }
}

static CATALOG: Lazy<BuiltinCatalog> = Lazy::new(build_catalog);

static MODULE: Lazy<Arc<Module>> = Lazy::new(|| {
    let mut module = Module::new(MODULE_NAME)
        .with_xmlns(PRESENTATION_XMLNS, CONTROLS)
        .with_xmlns(PRESENTATION_XMLNS, MEDIA);
    for ty in CATALOG.all() {
        module.add_type(ty);
    }
    Arc::new(module)
});

/// The built-in catalog
pub fn builtins() -> &'static BuiltinCatalog {
    &CATALOG
}

/// The built-in module
pub fn module() -> Arc<Module> {
    MODULE.clone()
}

fn value(name: &str, namespace: &str, tag: TypeTag) -> TypeRef {
    ManagedType::value_type(name, tag)
        .namespace(namespace)
        .module(MODULE_NAME)
        .build()
}

fn class(name: &str, namespace: &str, tag: TypeTag) -> super::descriptor::TypeBuilder {
    ManagedType::class(name)
        .namespace(namespace)
        .module(MODULE_NAME)
        .builtin(tag)
        .wrap(NativeObject::wrap)
}

fn abstract_class(name: &str, namespace: &str, tag: TypeTag) -> super::descriptor::TypeBuilder {
    ManagedType::abstract_class(name)
        .namespace(namespace)
        .module(MODULE_NAME)
        .builtin(tag)
}

fn build_catalog() -> BuiltinCatalog {
    let object = ManagedType::root("Object")
        .namespace(SYSTEM)
        .module(MODULE_NAME)
        .builtin(TypeTag::OBJECT)
        .build();
    let boolean = value("Boolean", SYSTEM, TypeTag::BOOL);
    let double = value("Double", SYSTEM, TypeTag::DOUBLE);
    let int32 = value("Int32", SYSTEM, TypeTag::INT32);
    let int64 = value("Int64", SYSTEM, TypeTag::INT64);
    let uint64 = value("UInt64", SYSTEM, TypeTag::UINT64);
    let string = value("String", SYSTEM, TypeTag::STRING);
    let char = value("Char", SYSTEM, TypeTag::CHAR);
    let timespan = value("TimeSpan", SYSTEM, TypeTag::TIMESPAN);
    let color = value("Color", MEDIA, TypeTag::COLOR);
    let point = value("Point", CONTROLS, TypeTag::POINT);
    let size = value("Size", CONTROLS, TypeTag::SIZE);
    let rect = value("Rect", CONTROLS, TypeTag::RECT);
    let thickness = value("Thickness", CONTROLS, TypeTag::THICKNESS);
    let corner_radius = value("CornerRadius", CONTROLS, TypeTag::CORNER_RADIUS);
    let matrix = value("Matrix", MEDIA, TypeTag::MATRIX);
    let grid_length = value("GridLength", CONTROLS, TypeTag::GRID_LENGTH);
    let duration = value("Duration", CONTROLS, TypeTag::DURATION);
    let key_time = value("KeyTime", MEDIA, TypeTag::KEY_TIME);
    let repeat_behavior = value("RepeatBehavior", MEDIA, TypeTag::REPEAT_BEHAVIOR);
    let font_weight = value("FontWeight", CONTROLS, TypeTag::FONT_WEIGHT);
    let font_style = value("FontStyle", CONTROLS, TypeTag::FONT_STYLE);
    let font_stretch = value("FontStretch", CONTROLS, TypeTag::FONT_STRETCH);

    let visibility = ManagedType::enumeration("Visibility")
        .namespace(CONTROLS)
        .module(MODULE_NAME)
        .member("Visible", 0)
        .member("Collapsed", 1)
        .build();
    let horizontal_alignment = ManagedType::enumeration("HorizontalAlignment")
        .namespace(CONTROLS)
        .module(MODULE_NAME)
        .member("Left", 0)
        .member("Center", 1)
        .member("Right", 2)
        .member("Stretch", 3)
        .build();
    let orientation = ManagedType::enumeration("Orientation")
        .namespace(CONTROLS)
        .module(MODULE_NAME)
        .member("Vertical", 0)
        .member("Horizontal", 1)
        .build();

    let ilist = ManagedType::interface("IList")
        .namespace(SYSTEM)
        .module(MODULE_NAME)
        .builtin(TypeTag::ILIST)
        .build();
    let idictionary = ManagedType::interface("IDictionary")
        .namespace(SYSTEM)
        .module(MODULE_NAME)
        .builtin(TypeTag::IDICTIONARY)
        .build();

    let dependency_object = class("DependencyObject", CONTROLS, TypeTag::DEPENDENCY_OBJECT).build();

    let brush = abstract_class("Brush", MEDIA, TypeTag::BRUSH)
        .base(&dependency_object)
        .property(PropertyDesc::native("Opacity", &double))
        .build();
    let solid_color_brush = class("SolidColorBrush", MEDIA, TypeTag::SOLID_COLOR_BRUSH)
        .base(&brush)
        .property(PropertyDesc::native("Color", &color))
        .build();

    let collection = abstract_class("Collection", CONTROLS, TypeTag::COLLECTION)
        .base(&dependency_object)
        .implements(&ilist)
        .build();
    let ui_element_collection = class("UIElementCollection", CONTROLS, TypeTag::UI_ELEMENT_COLLECTION)
        .base(&collection)
        .build();
    let resource_dictionary = class("ResourceDictionary", CONTROLS, TypeTag::RESOURCE_DICTIONARY)
        .base(&dependency_object)
        .implements(&idictionary)
        .build();

    let ui_element = abstract_class("UIElement", CONTROLS, TypeTag::UI_ELEMENT)
        .base(&dependency_object)
        .property(PropertyDesc::native("Opacity", &double))
        .property(PropertyDesc::native("Visibility", &visibility))
        .event("MouseLeftButtonDown")
        .event("MouseEnter")
        .build();
    let framework_element = abstract_class("FrameworkElement", CONTROLS, TypeTag::FRAMEWORK_ELEMENT)
        .base(&ui_element)
        .property(PropertyDesc::native("Name", &string))
        .property(PropertyDesc::native("Width", &double))
        .property(PropertyDesc::native("Height", &double))
        .property(PropertyDesc::native("Margin", &thickness))
        .property(PropertyDesc::native("HorizontalAlignment", &horizontal_alignment))
        .property(PropertyDesc::native("Resources", &resource_dictionary))
        .property(PropertyDesc::native("Tag", &object))
        .event("Loaded")
        .event("SizeChanged")
        .build();
    let panel = abstract_class("Panel", CONTROLS, TypeTag::PANEL)
        .base(&framework_element)
        .property(PropertyDesc::native("Children", &ui_element_collection))
        .property(PropertyDesc::native("Background", &brush))
        .content_property("Children")
        .build();
    let canvas = class("Canvas", CONTROLS, TypeTag::CANVAS)
        .base(&panel)
        .attached(AttachedDesc::new("Left", &double))
        .attached(AttachedDesc::new("Top", &double))
        .attached(AttachedDesc::new("ZIndex", &int32))
        .build();
    let stack_panel = class("StackPanel", CONTROLS, TypeTag::STACK_PANEL)
        .base(&panel)
        .property(PropertyDesc::native("Orientation", &orientation))
        .build();
    let border = class("Border", CONTROLS, TypeTag::BORDER)
        .base(&framework_element)
        .property(PropertyDesc::native("Child", &ui_element))
        .property(PropertyDesc::native("Background", &brush))
        .property(PropertyDesc::native("BorderBrush", &brush))
        .property(PropertyDesc::native("BorderThickness", &thickness))
        .property(PropertyDesc::native("CornerRadius", &corner_radius))
        .content_property("Child")
        .build();
    let text_block = class("TextBlock", CONTROLS, TypeTag::TEXT_BLOCK)
        .base(&framework_element)
        .property(PropertyDesc::native("Text", &string))
        .property(PropertyDesc::native("FontSize", &double))
        .property(PropertyDesc::native("FontWeight", &font_weight))
        .property(PropertyDesc::native("FontStyle", &font_style))
        .property(PropertyDesc::native("FontStretch", &font_stretch))
        .property(PropertyDesc::native("Foreground", &brush))
        .content_property("Text")
        .build();
    let content_control = class("ContentControl", CONTROLS, TypeTag::CONTENT_CONTROL)
        .base(&framework_element)
        .property(PropertyDesc::native("Content", &object))
        .build();

    let surface = ManagedType::native_only("Surface")
        .namespace(CONTROLS)
        .module(MODULE_NAME)
        .builtin(TypeTag::SURFACE)
        .build();
    let name_scope = ManagedType::native_only("NameScope")
        .namespace(CONTROLS)
        .module(MODULE_NAME)
        .builtin(TypeTag::NAME_SCOPE)
        .build();

    let all = vec![
        object.clone(),
        boolean.clone(),
        double.clone(),
        int32.clone(),
        int64.clone(),
        uint64.clone(),
        string.clone(),
        char.clone(),
        timespan.clone(),
        color.clone(),
        point.clone(),
        size.clone(),
        rect.clone(),
        thickness.clone(),
        corner_radius.clone(),
        matrix.clone(),
        grid_length.clone(),
        duration.clone(),
        key_time.clone(),
        repeat_behavior.clone(),
        font_weight.clone(),
        font_style.clone(),
        font_stretch.clone(),
        visibility.clone(),
        horizontal_alignment.clone(),
        orientation.clone(),
        ilist.clone(),
        idictionary.clone(),
        dependency_object.clone(),
        brush.clone(),
        solid_color_brush.clone(),
        collection.clone(),
        ui_element_collection.clone(),
        resource_dictionary.clone(),
        ui_element.clone(),
        framework_element.clone(),
        panel.clone(),
        canvas.clone(),
        stack_panel.clone(),
        border.clone(),
        text_block.clone(),
        content_control.clone(),
        surface.clone(),
        name_scope.clone(),
    ];

    BuiltinCatalog {
        object,
        boolean,
        double,
        int32,
        int64,
        uint64,
        string,
        char,
        timespan,
        color,
        point,
        size,
        rect,
        thickness,
        corner_radius,
        matrix,
        grid_length,
        duration,
        key_time,
        repeat_behavior,
        font_weight,
        font_style,
        font_stretch,
        visibility,
        horizontal_alignment,
        orientation,
        ilist,
        idictionary,
        dependency_object,
        brush,
        solid_color_brush,
        collection,
        ui_element_collection,
        resource_dictionary,
        ui_element,
        framework_element,
        panel,
        canvas,
        stack_panel,
        border,
        text_block,
        content_control,
        surface,
        name_scope,
        all,
    }
}
