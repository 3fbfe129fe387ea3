//! Preset validation.
//!
//! [`validate_preset`] checks a [`GraphPreset`] against a capability registry
//! without touching a graph: capability references, instance names, endpoint
//! syntax and ranges, connection direction, buffer capacities, and that the
//! instance-to-instance connections form no cycle. Every problem found is
//! reported, not just the first.
//!
//! # Example
//!
//! ```rust
//! use kestrel_config::{ConnectionSpec, GraphPreset, InstanceSpec, validate_preset};
//! use kestrel_registry::builtin_registry;
//!
//! let preset = GraphPreset::new("tap")
//!     .with_instance(InstanceSpec::new("src", "pattern"))
//!     .with_connection(ConnectionSpec::new("src.0", "host"));
//! validate_preset(&preset, &builtin_registry(), 256).expect("valid preset");
//! ```

use std::collections::{BTreeMap, BTreeSet, HashSet};

use kestrel_core::{CapabilityDescriptor, CapabilityRegistry, Endpoint, SampleSize};
use thiserror::Error;

use crate::preset::GraphPreset;

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The capability reference matches nothing in the registry.
    #[error("unknown capability: {0}")]
    UnknownCapability(String),

    /// Two instances share a name.
    #[error("duplicate instance name: {0}")]
    DuplicateInstance(String),

    /// An endpoint refers to an instance the preset does not declare.
    #[error("unknown instance: {0}")]
    UnknownInstance(String),

    /// An endpoint string is not `"host"` or `"name.index"`.
    #[error("invalid endpoint '{endpoint}': {reason}")]
    BadEndpoint {
        /// The endpoint as written.
        endpoint: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The endpoint index exceeds the capability's layout.
    #[error("endpoint '{endpoint}' out of range: capability has {count} {kind}(s)")]
    EndpointOutOfRange {
        /// The endpoint as written.
        endpoint: String,
        /// `"input"` or `"output"`.
        kind: &'static str,
        /// How many the capability has.
        count: usize,
    },

    /// The same endpoint appears in two connections.
    #[error("endpoint '{0}' is connected more than once")]
    EndpointReused(String),

    /// A connection has the host on both sides.
    #[error("a connection cannot run from host to host")]
    HostToHost,

    /// A mandatory endpoint is never connected, so the instance could never
    /// start.
    #[error("instance '{instance}' leaves mandatory {endpoint} unconnected")]
    Unconnected {
        /// Instance name.
        instance: String,
        /// The endpoint.
        endpoint: String,
    },

    /// Buffer capacity is zero or not a whole number of samples.
    #[error("connection {from} -> {to}: capacity {capacity} is not a non-zero multiple of {sample_size}")]
    InvalidCapacity {
        /// Source endpoint.
        from: String,
        /// Sink endpoint.
        to: String,
        /// Capacity in bytes.
        capacity: usize,
        /// Required granularity.
        sample_size: SampleSize,
    },

    /// The two sides use different sample sizes.
    #[error("connection {from} -> {to}: producer emits {source} samples, consumer expects {sink}")]
    FormatMismatch {
        /// Source endpoint.
        from: String,
        /// Sink endpoint.
        to: String,
        /// Producer granularity.
        source: SampleSize,
        /// Consumer granularity.
        sink: SampleSize,
    },

    /// The connection closes a cycle.
    #[error("connection {from} -> {to} would create a cycle")]
    Cycle {
        /// Source endpoint.
        from: String,
        /// Sink endpoint.
        to: String,
    },

    /// A runtime configuration limit is unusable.
    #[error("invalid runtime configuration: {0}")]
    InvalidRuntime(String),

    /// Multiple validation errors.
    #[error("multiple validation errors: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

impl ValidationError {
    /// `Ok` for no errors, the error itself for one, [`Multiple`](Self::Multiple)
    /// otherwise.
    pub fn collect(mut errors: Vec<ValidationError>) -> ValidationResult<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ValidationError::Multiple(errors)),
        }
    }

    /// The individual errors.
    pub fn errors(&self) -> Vec<&ValidationError> {
        match self {
            ValidationError::Multiple(errors) => errors.iter().collect(),
            other => vec![other],
        }
    }
}

/// A parsed connection endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EndpointRef {
    /// The device side.
    Host,
    /// Endpoint `index` of the instance called `name`.
    Instance {
        /// Instance name.
        name: String,
        /// Endpoint index.
        index: usize,
    },
}

impl EndpointRef {
    /// Parses `"host"` or `"name.index"`.
    pub fn parse(text: &str) -> ValidationResult<Self> {
        let bad = |reason: &str| ValidationError::BadEndpoint {
            endpoint: text.to_string(),
            reason: reason.to_string(),
        };
        let text = text.trim();
        if text == "host" {
            return Ok(Self::Host);
        }
        let (name, index) = text
            .rsplit_once('.')
            .ok_or_else(|| bad("expected \"host\" or \"instance.index\""))?;
        if name.is_empty() {
            return Err(bad("missing instance name"));
        }
        let index = index
            .parse::<usize>()
            .map_err(|_| bad("endpoint index is not a number"))?;
        Ok(Self::Instance {
            name: name.to_string(),
            index,
        })
    }
}

impl std::fmt::Display for EndpointRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Host => write!(f, "host"),
            Self::Instance { name, index } => write!(f, "{name}.{index}"),
        }
    }
}

/// Validates `preset` against `registry`. Connections without a capacity
/// are checked with `default_capacity`.
pub fn validate_preset(
    preset: &GraphPreset,
    registry: &CapabilityRegistry,
    default_capacity: usize,
) -> ValidationResult<()> {
    let mut errors = Vec::new();

    let mut descriptors: BTreeMap<&str, &CapabilityDescriptor> = BTreeMap::new();
    let mut names = BTreeSet::new();
    for spec in &preset.instances {
        if !names.insert(spec.name.as_str()) {
            errors.push(ValidationError::DuplicateInstance(spec.name.clone()));
            continue;
        }
        match kestrel_registry::resolve(registry, &spec.capability) {
            Some(descriptor) => {
                descriptors.insert(spec.name.as_str(), descriptor);
            }
            None => errors.push(ValidationError::UnknownCapability(spec.capability.clone())),
        }
    }

    let mut used: HashSet<(String, Endpoint)> = HashSet::new();
    let mut edges: Vec<(String, String)> = Vec::new();
    for conn in &preset.connections {
        let from = EndpointRef::parse(&conn.from);
        let to = EndpointRef::parse(&conn.to);
        let (from, to) = match (from, to) {
            (Ok(from), Ok(to)) => (from, to),
            (from, to) => {
                errors.extend(from.err());
                errors.extend(to.err());
                continue;
            }
        };
        if from == EndpointRef::Host && to == EndpointRef::Host {
            errors.push(ValidationError::HostToHost);
            continue;
        }

        let source = check_side(&from, true, &descriptors, &names, &mut used, &mut errors);
        let sink = check_side(&to, false, &descriptors, &names, &mut used, &mut errors);

        let capacity = conn.capacity.unwrap_or(default_capacity);
        let granularity = source.or(sink);
        if let (Some(source), Some(sink)) = (source, sink)
            && source != sink
        {
            errors.push(ValidationError::FormatMismatch {
                from: conn.from.clone(),
                to: conn.to.clone(),
                source,
                sink,
            });
        } else if let Some(sample_size) = granularity
            && (capacity == 0 || !sample_size.is_aligned(capacity))
        {
            errors.push(ValidationError::InvalidCapacity {
                from: conn.from.clone(),
                to: conn.to.clone(),
                capacity,
                sample_size,
            });
        }

        if let (EndpointRef::Instance { name: src, .. }, EndpointRef::Instance { name: dst, .. }) =
            (&from, &to)
            && descriptors.contains_key(src.as_str())
            && descriptors.contains_key(dst.as_str())
        {
            if src == dst || reaches(dst, src, &edges) {
                errors.push(ValidationError::Cycle {
                    from: conn.from.clone(),
                    to: conn.to.clone(),
                });
            } else {
                edges.push((src.clone(), dst.clone()));
            }
        }
    }

    for spec in &preset.instances {
        let Some(descriptor) = descriptors.get(spec.name.as_str()) else {
            continue;
        };
        let layout = descriptor.layout;
        let mandatory = (0..layout.mandatory_inputs)
            .map(Endpoint::Input)
            .chain((0..layout.mandatory_outputs).map(Endpoint::Output));
        for endpoint in mandatory {
            if !used.contains(&(spec.name.clone(), endpoint)) {
                errors.push(ValidationError::Unconnected {
                    instance: spec.name.clone(),
                    endpoint: endpoint.to_string(),
                });
            }
        }
    }

    ValidationError::collect(errors)
}

/// Checks one side of a connection and returns its sample size when known.
fn check_side(
    side: &EndpointRef,
    is_source: bool,
    descriptors: &BTreeMap<&str, &CapabilityDescriptor>,
    names: &BTreeSet<&str>,
    used: &mut HashSet<(String, Endpoint)>,
    errors: &mut Vec<ValidationError>,
) -> Option<SampleSize> {
    let EndpointRef::Instance { name, index } = side else {
        return None;
    };
    let Some(descriptor) = descriptors.get(name.as_str()) else {
        if !names.contains(name.as_str()) {
            errors.push(ValidationError::UnknownInstance(name.clone()));
        }
        return None;
    };
    let (endpoint, kind, count) = if is_source {
        (Endpoint::Output(*index), "output", descriptor.layout.outputs)
    } else {
        (Endpoint::Input(*index), "input", descriptor.layout.inputs)
    };
    if *index >= count {
        errors.push(ValidationError::EndpointOutOfRange {
            endpoint: side.to_string(),
            kind,
            count,
        });
        return None;
    }
    if !used.insert((name.clone(), endpoint)) {
        errors.push(ValidationError::EndpointReused(side.to_string()));
    }
    Some(descriptor.sample_size)
}

fn reaches(from: &str, to: &str, edges: &[(String, String)]) -> bool {
    let mut stack = vec![from];
    let mut seen = BTreeSet::new();
    while let Some(node) = stack.pop() {
        if node == to {
            return true;
        }
        if seen.insert(node) {
            stack.extend(
                edges
                    .iter()
                    .filter(|(a, _)| a == node)
                    .map(|(_, b)| b.as_str()),
            );
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preset::{ConnectionSpec, InstanceSpec};
    use kestrel_registry::builtin_registry;

    fn check(preset: &GraphPreset) -> Vec<ValidationError> {
        match validate_preset(preset, &builtin_registry(), 256) {
            Ok(()) => Vec::new(),
            Err(e) => e.errors().into_iter().cloned().collect(),
        }
    }

    fn chain() -> GraphPreset {
        GraphPreset::new("chain")
            .with_instance(InstanceSpec::new("a", "passthrough"))
            .with_instance(InstanceSpec::new("b", "passthrough"))
            .with_connection(ConnectionSpec::new("host", "a.0"))
            .with_connection(ConnectionSpec::new("a.0", "b.0"))
            .with_connection(ConnectionSpec::new("b.0", "host"))
    }

    #[test]
    fn test_parse_endpoints() {
        assert_eq!(EndpointRef::parse("host").unwrap(), EndpointRef::Host);
        assert_eq!(
            EndpointRef::parse("mix.main.2").unwrap(),
            EndpointRef::Instance {
                name: "mix.main".into(),
                index: 2
            }
        );
        assert!(EndpointRef::parse("mix").is_err());
        assert!(EndpointRef::parse(".0").is_err());
        assert!(EndpointRef::parse("mix.x").is_err());
        assert_eq!(EndpointRef::parse("mix.1").unwrap().to_string(), "mix.1");
    }

    #[test]
    fn test_valid_chain() {
        assert!(check(&chain()).is_empty());
    }

    #[test]
    fn test_unknown_capability_and_duplicate_name() {
        let preset = GraphPreset::new("bad")
            .with_instance(InstanceSpec::new("x", "reverb"))
            .with_instance(InstanceSpec::new("y", "mixer"))
            .with_instance(InstanceSpec::new("y", "mixer"))
            .with_connection(ConnectionSpec::new("host", "y.0"));
        let errors = check(&preset);
        assert!(errors.contains(&ValidationError::UnknownCapability("reverb".into())));
        assert!(errors.contains(&ValidationError::DuplicateInstance("y".into())));
    }

    #[test]
    fn test_endpoint_problems() {
        let preset = chain()
            .with_connection(ConnectionSpec::new("a.3", "host"))
            .with_connection(ConnectionSpec::new("host", "a.0"))
            .with_connection(ConnectionSpec::new("ghost.0", "host"))
            .with_connection(ConnectionSpec::new("host", "host"));
        let errors = check(&preset);
        assert!(errors.iter().any(|e| matches!(
            e,
            ValidationError::EndpointOutOfRange { kind: "output", count: 1, .. }
        )));
        assert!(errors.contains(&ValidationError::EndpointReused("a.0".into())));
        assert!(errors.contains(&ValidationError::UnknownInstance("ghost".into())));
        assert!(errors.contains(&ValidationError::HostToHost));
    }

    #[test]
    fn test_capacity_alignment() {
        let preset = GraphPreset::new("odd")
            .with_instance(InstanceSpec::new("p", "passthrough"))
            .with_connection(ConnectionSpec::new("host", "p.0").with_capacity(63))
            .with_connection(ConnectionSpec::new("p.0", "host").with_capacity(0));
        let errors = check(&preset);
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| matches!(
            e,
            ValidationError::InvalidCapacity {
                sample_size: SampleSize::Bits16,
                ..
            }
        )));
    }

    #[test]
    fn test_cycle_detected() {
        let preset = GraphPreset::new("loop")
            .with_instance(InstanceSpec::new("a", "mixer"))
            .with_instance(InstanceSpec::new("b", "splitter"))
            .with_connection(ConnectionSpec::new("a.0", "b.0"))
            .with_connection(ConnectionSpec::new("b.0", "a.0"))
            .with_connection(ConnectionSpec::new("b.1", "host"));
        let errors = check(&preset);
        assert_eq!(
            errors,
            vec![ValidationError::Cycle {
                from: "b.0".into(),
                to: "a.0".into()
            }]
        );
    }

    #[test]
    fn test_unconnected_mandatory_endpoint() {
        let preset = GraphPreset::new("dangling").with_instance(InstanceSpec::new("src", "pattern"));
        assert_eq!(
            check(&preset),
            vec![ValidationError::Unconnected {
                instance: "src".into(),
                endpoint: Endpoint::Output(0).to_string(),
            }]
        );
    }

    #[test]
    fn test_multiple_display_joins_messages() {
        let err = ValidationError::Multiple(vec![
            ValidationError::HostToHost,
            ValidationError::UnknownInstance("q".into()),
        ]);
        assert_eq!(
            err.to_string(),
            "multiple validation errors: a connection cannot run from host to host; unknown instance: q"
        );
        assert_eq!(ValidationError::collect(Vec::new()), Ok(()));
    }
}
