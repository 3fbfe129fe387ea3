//! Presets and runtime configuration from disk into a live graph.

use std::sync::Arc;

use kestrel_config::{
    ConfigError, ConnectionSpec, GraphPreset, GraphSection, InstanceSpec, RuntimeConfig,
    ValidationError, factory_presets,
};
use kestrel_core::{CapabilityError, GraphError, GraphManager, InstanceState};
use kestrel_registry::{builtin_registry, ids};
use tempfile::TempDir;

fn graph() -> GraphManager {
    GraphManager::new(Arc::new(builtin_registry()))
}

#[test]
fn preset_save_load_instantiate() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("nested").join("chain.toml");
    let preset = GraphPreset::new("chain")
        .with_description("two passthroughs")
        .with_instance(InstanceSpec::new("a", "passthrough"))
        .with_instance(InstanceSpec::new("b", "0x0001"))
        .with_connection(ConnectionSpec::new("host", "a.0"))
        .with_connection(ConnectionSpec::new("a.0", "b.0").with_capacity(64))
        .with_connection(ConnectionSpec::new("b.0", "host"));
    preset.save(&path).unwrap();

    let loaded = GraphPreset::load(&path).unwrap();
    assert_eq!(loaded, preset);

    let mut graph = graph();
    let built = loaded.instantiate(&mut graph, 256).unwrap();
    assert_eq!(built.instances.len(), 2);
    assert_eq!(built.connections.len(), 3);
    let (a, b) = (built.id("a").unwrap(), built.id("b").unwrap());
    assert_eq!(built.name_of(b), Some("b"));
    assert_eq!(graph.state(a).unwrap(), InstanceState::Connected);
    assert_eq!(graph.state(b).unwrap(), InstanceState::Connected);
    assert_eq!(graph.topological_order(), vec![a, b]);
    assert_eq!(
        graph.connection(built.connections[1]).unwrap().buffer().unwrap().capacity(),
        64
    );
}

#[test]
fn every_factory_preset_builds_and_ticks() {
    for preset in factory_presets() {
        let mut graph = graph();
        preset
            .instantiate(&mut graph, 256)
            .unwrap_or_else(|e| panic!("{}: {e}", preset.name));
        let started = graph.start_graph().unwrap();
        assert_eq!(started.len(), preset.instances.len(), "{}", preset.name);
        let report = graph.tick();
        assert_eq!(report.promoted, preset.instances.len());
    }
}

#[test]
fn invalid_preset_leaves_graph_untouched() {
    let preset = GraphPreset::new("bad")
        .with_instance(InstanceSpec::new("src", "pattern"))
        .with_connection(ConnectionSpec::new("src.0", "nowhere.0"));
    let mut graph = graph();
    let err = preset.instantiate(&mut graph, 256).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::Validation(ValidationError::UnknownInstance(ref name)) if name == "nowhere"
    ));
    assert!(graph.is_empty());
}

#[test]
fn failed_instantiation_rolls_back() {
    let preset = GraphPreset::new("rejects")
        .with_instance(InstanceSpec::new("pass", "passthrough"))
        .with_instance(InstanceSpec::new("mix", "mixer").with_override(0, 0x1080))
        .with_connection(ConnectionSpec::new("host", "pass.0"))
        .with_connection(ConnectionSpec::new("pass.0", "mix.0"))
        .with_connection(ConnectionSpec::new("mix.0", "host"));
    let mut graph = graph();
    let err = preset.instantiate(&mut graph, 256).unwrap_err();
    match err {
        ConfigError::Instantiate { instance, source } => {
            assert_eq!(instance, "mix");
            assert!(matches!(source, CapabilityError::InvalidConfig(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(graph.is_empty());
    assert_eq!(graph.instance_count(ids::PASSTHROUGH), 0);
}

#[test]
fn memory_budget_applies_to_presets() {
    let config = RuntimeConfig {
        graph: GraphSection {
            memory_pool_bytes: 300,
            ..GraphSection::default()
        },
        ..RuntimeConfig::default()
    };
    let mut graph = config.graph_manager(Arc::new(builtin_registry()));
    let preset = GraphPreset::new("hungry")
        .with_instance(InstanceSpec::new("pass", "passthrough"))
        .with_connection(ConnectionSpec::new("host", "pass.0"))
        .with_connection(ConnectionSpec::new("pass.0", "host"));
    let err = preset.instantiate(&mut graph, 256).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::Connect {
            source: GraphError::OutOfMemory { requested: 256 },
            ..
        }
    ));
    assert_eq!(graph.connection_count(), 0);
    assert!(graph.is_empty());
}

#[test]
fn runtime_config_save_load() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("runtime.toml");
    let mut config = RuntimeConfig::default();
    config.scheduler.mailbox_capacity = 8;
    config.graph.memory_pool_bytes = 1 << 16;
    config.tasks.audio = 10;
    config.save(&path).unwrap();

    assert_eq!(RuntimeConfig::load(&path).unwrap(), config);
    assert!(matches!(
        RuntimeConfig::load(dir.path().join("missing.toml")),
        Err(ConfigError::ReadFile { .. })
    ));
}
