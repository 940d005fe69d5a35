//! Document builder integration tests
//!
//! Feeds the builder the callback sequence a markup parser would produce for
//! a small dashboard document and checks the resulting live graph:
//!
//! ```xml
//! <d:Dashboard xmlns:d="urn:demo" x:Name="root" Orientation="Horizontal">
//!   <d:Dashboard.Resources>
//!     <SolidColorBrush x:Key="warn" Color="#FFFF0000"/>
//!   </d:Dashboard.Resources>
//!   <d:Gauge x:Name="rpm" Value="0.75" Caption="RPM" Canvas.Left="4" Loaded="OnGaugeLoaded"/>
//!   <TextBlock Text="Engine" Foreground="{StaticResource warn}"/>
//! </d:Dashboard>
//! ```

mod common;

use common::{demo_module, gauge_type, handle_of, Gauge};
use scenebridge_core::types::builtins::{self, PRESENTATION_XMLNS};
use scenebridge_core::types::PropertyDesc;
use scenebridge_core::value::Color;
use scenebridge_core::{
    headless, BuildError, ConversionError, DocumentBuilder, ManagedObject, ManagedType, ModuleSet,
    NativeObject, ObjectRef, ReferenceMode, TypeRef, Value,
};
use scenebridge_sdk::{NativeHandle, TypeTag, WireValue};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const DEMO_XMLNS: &str = "urn:demo";

fn dashboard_type(loaded_sender: Arc<AtomicU64>) -> TypeRef {
    ManagedType::class("Dashboard")
        .namespace("Demo")
        .module("demo")
        .base(&builtins::builtins().stack_panel)
        .wrap(NativeObject::wrap)
        .method("OnGaugeLoaded", move |_this, sender, _args| {
            loaded_sender.store(sender.handle().as_u64(), Ordering::SeqCst);
            Ok(())
        })
        .build()
}

struct Built {
    engine: Arc<scenebridge_core::HeadlessEngine>,
    bridge: Arc<scenebridge_core::Bridge>,
    root: ObjectRef,
    gauge: NativeHandle,
    text: NativeHandle,
    brush: NativeHandle,
    loaded_sender: Arc<AtomicU64>,
}

fn build_dashboard() -> Built {
    let (engine, bridge) = headless::connect();
    let loaded_sender = Arc::new(AtomicU64::new(0));
    let resolver = ModuleSet::new().with_module(demo_module(&[gauge_type(), dashboard_type(loaded_sender.clone())]));
    let mut builder = DocumentBuilder::new(bridge.clone(), Arc::new(resolver));

    builder.import_namespace("d", DEMO_XMLNS).unwrap();

    let root = handle_of(&builder.create_object(DEMO_XMLNS, "Dashboard").unwrap());
    builder.set_property(root, "x:Name", WireValue::string("root")).unwrap();
    builder.set_property(root, "Orientation", WireValue::string("Horizontal")).unwrap();

    let brush = builder.create_object(PRESENTATION_XMLNS, "SolidColorBrush").unwrap();
    builder.set_property(handle_of(&brush), "x:Key", WireValue::string("warn")).unwrap();
    builder.set_property(handle_of(&brush), "Color", WireValue::string("#FFFF0000")).unwrap();
    builder.set_property(root, "Resources", brush.clone()).unwrap();

    let gauge = builder.create_object(DEMO_XMLNS, "Gauge").unwrap();
    let g = handle_of(&gauge);
    builder.set_property(g, "x:Name", WireValue::string("rpm")).unwrap();
    builder.set_property(g, "Value", WireValue::string("0.75")).unwrap();
    builder.set_property(g, "Caption", WireValue::string("RPM")).unwrap();
    builder.set_property(g, "Canvas.Left", WireValue::string("4")).unwrap();
    builder.set_property(g, "Loaded", WireValue::string("OnGaugeLoaded")).unwrap();
    assert_eq!(builder.get_content_property_name(root).unwrap().as_deref(), Some("Children"));
    builder.add_child(root, gauge.clone()).unwrap();

    let text = builder.create_object("", "TextBlock").unwrap();
    let t = handle_of(&text);
    builder.set_property(t, "Text", WireValue::string("Engine")).unwrap();
    builder
        .set_property(t, "Foreground", WireValue::string("{StaticResource warn}"))
        .unwrap();
    builder.add_child(root, text.clone()).unwrap();

    assert!(builder.find_name("rpm").is_some());
    let root = builder.finish().unwrap().unwrap();
    Built {
        engine,
        bridge,
        root,
        gauge: g,
        text: t,
        brush: handle_of(&brush),
        loaded_sender,
    }
}

// ===== Graph Shape =====

#[test]
fn test_children_in_document_order() {
    let built = build_dashboard();
    let bridge = &built.bridge;
    assert_eq!(built.root.managed_type().name(), "Dashboard");

    let children = bridge.get_value(&built.root, "Children").unwrap();
    let items = bridge.collection_items(children.as_object().unwrap()).unwrap();
    let order: Vec<NativeHandle> = items.iter().map(|v| v.as_object().unwrap().handle()).collect();
    assert_eq!(order, vec![built.gauge, built.text]);
}

#[test]
fn test_values_converted_from_text() {
    let built = build_dashboard();
    let bridge = &built.bridge;

    match bridge.get_value(&built.root, "Orientation").unwrap() {
        Value::Enum(e) => assert_eq!(e.name(), Some("Horizontal")),
        other => panic!("expected an enum member, got {:?}", other),
    }

    let gauge = bridge.lookup(built.gauge).unwrap();
    assert_eq!(bridge.get_value(&gauge, "Value").unwrap(), Value::F64(0.75));
    assert_eq!(
        bridge.get_attached(&builtins::builtins().canvas, "Left", &gauge).unwrap(),
        Value::F64(4.0)
    );

    let brush = bridge.lookup(built.brush).unwrap();
    assert_eq!(
        bridge.get_value(&brush, "Color").unwrap(),
        Value::Color(Color::from_argb(0xFF, 0xFF, 0x00, 0x00))
    );
    let text = bridge.lookup(built.text).unwrap();
    let foreground = bridge.get_value(&text, "Foreground").unwrap();
    assert!(Arc::ptr_eq(foreground.as_object().unwrap(), &brush));
}

#[test]
fn test_resources_land_in_native_dictionary() {
    let built = build_dashboard();
    let bridge = &built.bridge;
    let resources = bridge.get_value(&built.root, "Resources").unwrap();
    let resources = resources.as_object().unwrap();
    assert_eq!(resources.managed_type().name(), "ResourceDictionary");

    let warn = bridge.dictionary_get(resources, "warn").unwrap().unwrap();
    assert_eq!(warn.as_object().unwrap().handle(), built.brush);
    assert!(bridge.dictionary_get(resources, "missing").unwrap().is_none());
}

// ===== Wrapper State =====

#[test]
fn test_child_wrapper_keeps_managed_state() {
    let built = build_dashboard();
    let bridge = &built.bridge;

    assert_eq!(bridge.identity().mode(built.gauge), Some(ReferenceMode::Strong));
    let gauge = bridge.lookup(built.gauge).unwrap();
    assert!(gauge.downcast_ref::<Gauge>().is_some());
    assert_eq!(gauge.peer().local("Caption"), Some(Value::String("RPM".into())));
    assert_eq!(bridge.get_value(&gauge, "Name").unwrap(), Value::String("rpm".into()));
}

#[test]
fn test_handler_runs_on_top_level_object() {
    let built = build_dashboard();
    let raised = built
        .engine
        .raise_event(built.gauge, "Loaded", WireValue::null(TypeTag::INVALID));
    assert_eq!(raised, 1);
    assert_eq!(built.loaded_sender.load(Ordering::SeqCst), built.gauge.as_u64());
    assert!(built.engine.reported_errors().is_empty());
}

#[test]
fn test_dropping_root_releases_graph() {
    let built = build_dashboard();
    let Built { engine, bridge, root, .. } = built;
    assert!(engine.live_objects() >= 6);

    drop(root);
    assert_eq!(engine.live_objects(), 0);
    assert!(bridge.identity().is_empty());
}

// ===== Recoverable Errors =====

#[test]
fn test_parser_can_skip_bad_nodes() {
    let (_engine, bridge) = headless::connect();
    let mut builder = DocumentBuilder::new(bridge.clone(), Arc::new(ModuleSet::new()));

    let err = builder.import_namespace("m", "clr-namespace:Demo;assembly=missing").unwrap_err();
    assert!(matches!(err, BuildError::UnknownModule(ref m) if m == "missing"));
    let err = builder.import_namespace("m", "clr-namespace:;assembly=demo").unwrap_err();
    assert!(matches!(err, BuildError::InvalidNamespace(_)));

    let panel = handle_of(&builder.create_object("", "StackPanel").unwrap());
    assert!(builder.create_object("", "Widget").is_err());
    let err = builder.set_property(panel, "Orientation", WireValue::string("Diagonal")).unwrap_err();
    assert!(matches!(err, BuildError::Conversion(_)));
    let text = builder.create_object("", "TextBlock").unwrap();
    builder.add_child(panel, text.clone()).unwrap();

    assert!(!builder.is_poisoned());
    let root = builder.finish().unwrap().unwrap();
    let children = bridge.get_value(&root, "Children").unwrap();
    let items = bridge.collection_items(children.as_object().unwrap()).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].as_object().unwrap().handle(), handle_of(&text));
}

#[test]
fn test_member_converter_takes_precedence() {
    let b = builtins::builtins();
    let level = PropertyDesc::local("Level", &b.double).with_converter(|text| match text {
        "full" => Ok(Value::F64(1.0)),
        other => Err(ConversionError::from_text("Level", other)),
    });
    let meter = ManagedType::class("Meter")
        .namespace("Demo")
        .module("demo")
        .base(&b.framework_element)
        .property(level)
        .wrap(NativeObject::wrap)
        .build();
    let (_engine, bridge) = headless::connect();
    let resolver = ModuleSet::new().with_module(demo_module(&[meter]));
    let mut builder = DocumentBuilder::new(bridge.clone(), Arc::new(resolver));

    let m = handle_of(&builder.create_object(DEMO_XMLNS, "Meter").unwrap());
    builder.set_property(m, "Level", WireValue::string("full")).unwrap();
    let err = builder.set_property(m, "Level", WireValue::string("0.5")).unwrap_err();
    assert!(matches!(err, BuildError::Conversion(_)));

    let meter = bridge.lookup(m).unwrap();
    assert_eq!(bridge.get_value(&meter, "Level").unwrap(), Value::F64(1.0));
}

#[test]
fn test_failed_constructor_leaves_no_native_object() {
    let brittle = ManagedType::class("Brittle")
        .namespace("Demo")
        .module("demo")
        .base(&builtins::builtins().border)
        .wrap(|_peer| panic!("constructor failed"))
        .build();
    let (engine, bridge) = headless::connect();
    let resolver = ModuleSet::new().with_module(demo_module(&[brittle]));
    let mut builder = DocumentBuilder::new(bridge.clone(), Arc::new(resolver));

    let err = builder.create_object(DEMO_XMLNS, "Brittle").unwrap_err();
    assert!(matches!(err, BuildError::ConstructorFailed(ref name) if name == "Demo.Brittle"));
    assert_eq!(engine.live_objects(), 0);

    builder.create_object("", "Border").unwrap();
    assert_eq!(engine.live_objects(), 1);
}
