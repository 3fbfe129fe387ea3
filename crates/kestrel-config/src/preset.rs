//! Graph preset file format and instantiation.

use std::collections::BTreeMap;
use std::path::Path;

use kestrel_core::{ConnectionId, GraphManager, InstanceId};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::validation::{EndpointRef, validate_preset};

/// A graph described by name: instances, then the connections between them.
///
/// # TOML Format
///
/// ```toml
/// name = "tone-tap"
/// description = "Sawtooth into a splitter, one side metered"
///
/// [[instances]]
/// name = "src"
/// capability = "pattern"
/// overrides = [{ index = 1, value = 16 }]
///
/// [[instances]]
/// name = "split"
/// capability = "0x0013"
///
/// [[connections]]
/// from = "src.0"
/// to = "split.0"
/// capacity = 128
///
/// [[connections]]
/// from = "split.0"
/// to = "host"
/// ```
///
/// `from` names an output, `to` an input; `"host"` is the device side.
/// Connections without a capacity use the runtime's default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct GraphPreset {
    /// Name of the preset.
    pub name: String,

    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Instances, created in this order.
    #[serde(default)]
    pub instances: Vec<InstanceSpec>,

    /// Connections, made in this order.
    #[serde(default)]
    pub connections: Vec<ConnectionSpec>,
}

/// One `[[instances]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct InstanceSpec {
    /// Name used by connection endpoints.
    pub name: String,
    /// Capability name, decimal id or `0x` hex id.
    pub capability: String,
    /// Config word overrides.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overrides: Vec<ConfigOverride>,
}

/// Replaces config word `index`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConfigOverride {
    /// Word index.
    pub index: usize,
    /// New value.
    pub value: u32,
}

/// One `[[connections]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConnectionSpec {
    /// `"instance.output"` or `"host"`.
    pub from: String,
    /// `"instance.input"` or `"host"`.
    pub to: String,
    /// Buffer capacity in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<usize>,
}

impl InstanceSpec {
    /// Instance of `capability` with default configuration.
    pub fn new(name: impl Into<String>, capability: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capability: capability.into(),
            overrides: Vec::new(),
        }
    }

    /// Adds a config override.
    pub fn with_override(mut self, index: usize, value: u32) -> Self {
        self.overrides.push(ConfigOverride { index, value });
        self
    }

    /// Overrides as the graph manager takes them.
    pub fn override_pairs(&self) -> Vec<(usize, u32)> {
        self.overrides.iter().map(|o| (o.index, o.value)).collect()
    }
}

impl ConnectionSpec {
    /// Connection using the default capacity.
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            capacity: None,
        }
    }

    /// Sets the buffer capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }
}

/// Ids assigned when a preset was instantiated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresetGraph {
    /// Instance ids by preset name.
    pub instances: BTreeMap<String, InstanceId>,
    /// Connection ids in preset order.
    pub connections: Vec<ConnectionId>,
}

impl PresetGraph {
    /// Id of the instance called `name`.
    pub fn id(&self, name: &str) -> Option<InstanceId> {
        self.instances.get(name).copied()
    }

    /// Preset name of instance `id`.
    pub fn name_of(&self, id: InstanceId) -> Option<&str> {
        self.instances
            .iter()
            .find(|&(_, &candidate)| candidate == id)
            .map(|(name, _)| name.as_str())
    }
}

impl GraphPreset {
    /// Create a new empty preset.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            instances: Vec::new(),
            connections: Vec::new(),
        }
    }

    /// Create a preset with a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add an instance.
    pub fn with_instance(mut self, instance: InstanceSpec) -> Self {
        self.instances.push(instance);
        self
    }

    /// Add a connection.
    pub fn with_connection(mut self, connection: ConnectionSpec) -> Self {
        self.connections.push(connection);
        self
    }

    /// Load a preset from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        Self::from_toml(&content)
    }

    /// Load a preset from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Save the preset to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))
    }

    /// Convert the preset to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Instance spec called `name`.
    pub fn instance(&self, name: &str) -> Option<&InstanceSpec> {
        self.instances.iter().find(|i| i.name == name)
    }

    /// Validates the preset against the graph's registry, then creates every
    /// instance and connection in file order.
    ///
    /// On failure everything this call created is removed again, so the
    /// graph is left as it was.
    pub fn instantiate(
        &self,
        graph: &mut GraphManager,
        default_capacity: usize,
    ) -> Result<PresetGraph, ConfigError> {
        validate_preset(self, graph.registry(), default_capacity)?;

        let mut built = PresetGraph::default();
        if let Err(e) = self.build_into(graph, default_capacity, &mut built) {
            rollback(graph, &built);
            return Err(e);
        }
        Ok(built)
    }

    fn build_into(
        &self,
        graph: &mut GraphManager,
        default_capacity: usize,
        built: &mut PresetGraph,
    ) -> Result<(), ConfigError> {
        for spec in &self.instances {
            let cap = kestrel_registry::resolve(graph.registry(), &spec.capability)
                .map(|d| d.id)
                .ok_or_else(|| crate::ValidationError::UnknownCapability(spec.capability.clone()))?;
            let id = graph
                .create(cap, &spec.override_pairs())
                .map_err(|source| ConfigError::Instantiate {
                    instance: spec.name.clone(),
                    source,
                })?;
            built.instances.insert(spec.name.clone(), id);
        }

        for spec in &self.connections {
            let capacity = spec.capacity.unwrap_or(default_capacity);
            let from = EndpointRef::parse(&spec.from)?;
            let to = EndpointRef::parse(&spec.to)?;
            let lookup = |name: &str| {
                built
                    .id(name)
                    .ok_or_else(|| crate::ValidationError::UnknownInstance(name.to_string()))
            };
            let result = match (&from, &to) {
                (EndpointRef::Host, EndpointRef::Instance { name, index }) => {
                    graph.connect_host_input(lookup(name)?, *index, capacity)
                }
                (EndpointRef::Instance { name, index }, EndpointRef::Host) => {
                    graph.connect_host_output(lookup(name)?, *index, capacity)
                }
                (
                    EndpointRef::Instance {
                        name: src,
                        index: out,
                    },
                    EndpointRef::Instance {
                        name: dst,
                        index: input,
                    },
                ) => graph.connect_capabilities(lookup(src)?, *out, lookup(dst)?, *input, capacity),
                (EndpointRef::Host, EndpointRef::Host) => {
                    return Err(crate::ValidationError::HostToHost.into());
                }
            };
            let id = result.map_err(|source| ConfigError::Connect {
                from: spec.from.clone(),
                to: spec.to.clone(),
                source,
            })?;
            built.connections.push(id);
        }
        Ok(())
    }
}

fn rollback(graph: &mut GraphManager, built: &PresetGraph) {
    for &id in built.connections.iter().rev() {
        let _ = graph.disconnect(id);
    }
    for &id in built.instances.values() {
        let _ = graph.destroy(id);
    }
}
