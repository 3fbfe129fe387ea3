//! Built-in capability table for kestrel.
//!
//! The graph manager only knows capabilities through a
//! [`CapabilityRegistry`]. This crate assembles the table of built-in classes
//! from `kestrel-capabilities` and adds the metadata a host needs to present
//! them: a category per class and lookup by name or raw id.
//!
//! # Example
//!
//! ```rust
//! use kestrel_registry::{CapabilityCategory, builtin_registry, capabilities_in};
//!
//! let registry = builtin_registry();
//! let mixer = registry.find("mixer").unwrap();
//! assert_eq!(mixer.id.0, 0x000A);
//!
//! for entry in capabilities_in(CapabilityCategory::Routing) {
//!     println!("{}: {}", entry.descriptor.name, entry.descriptor.description);
//! }
//! ```
//!
//! # no_std Support
//!
//! This crate is `no_std` compatible. Disable the default `std` feature:
//!
//! ```toml
//! [dependencies]
//! kestrel-registry = { version = "0.1", default-features = false }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

use kestrel_capabilities::{meter, mixer, passthrough, pattern, splitter};
use kestrel_core::{CapabilityDescriptor, CapabilityId, CapabilityRegistry, RegistryBuilder};

/// Class ids of the built-in capabilities.
pub mod ids {
    use kestrel_core::CapabilityId;

    /// [`kestrel_capabilities::Passthrough`]
    pub const PASSTHROUGH: CapabilityId = kestrel_capabilities::passthrough::PASSTHROUGH_ID;
    /// [`kestrel_capabilities::Mixer`]
    pub const MIXER: CapabilityId = kestrel_capabilities::mixer::MIXER_ID;
    /// [`kestrel_capabilities::Splitter`]
    pub const SPLITTER: CapabilityId = kestrel_capabilities::splitter::SPLITTER_ID;
    /// [`kestrel_capabilities::PatternSource`]
    pub const PATTERN: CapabilityId = kestrel_capabilities::pattern::PATTERN_ID;
    /// [`kestrel_capabilities::PeakMeter`]
    pub const PEAK_METER: CapabilityId = kestrel_capabilities::meter::PEAK_METER_ID;
}

/// Grouping used when listing capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityCategory {
    /// Combines several streams (mixer)
    Mixing,
    /// Moves streams around without changing them (passthrough, splitter)
    Routing,
    /// Produces audio from nothing (pattern source)
    Source,
    /// Consumes audio and reports on it (meters)
    Analysis,
}

impl CapabilityCategory {
    /// Human-readable name.
    pub const fn name(&self) -> &'static str {
        match self {
            CapabilityCategory::Mixing => "Mixing",
            CapabilityCategory::Routing => "Routing",
            CapabilityCategory::Source => "Source",
            CapabilityCategory::Analysis => "Analysis",
        }
    }

    /// One-line description.
    pub const fn description(&self) -> &'static str {
        match self {
            CapabilityCategory::Mixing => "Operators that combine several streams into one",
            CapabilityCategory::Routing => "Copies, splits and other data movement",
            CapabilityCategory::Source => "Generators with no inputs",
            CapabilityCategory::Analysis => "Sinks that measure the stream they consume",
        }
    }
}

/// A built-in descriptor with its category.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinEntry {
    /// What the graph manager instantiates.
    pub descriptor: CapabilityDescriptor,
    /// Listing group.
    pub category: CapabilityCategory,
}

/// Every built-in capability, in registration order.
pub const BUILTINS: &[BuiltinEntry] = &[
    BuiltinEntry {
        descriptor: passthrough::DESCRIPTOR,
        category: CapabilityCategory::Routing,
    },
    BuiltinEntry {
        descriptor: mixer::DESCRIPTOR,
        category: CapabilityCategory::Mixing,
    },
    BuiltinEntry {
        descriptor: splitter::DESCRIPTOR,
        category: CapabilityCategory::Routing,
    },
    BuiltinEntry {
        descriptor: pattern::DESCRIPTOR,
        category: CapabilityCategory::Source,
    },
    BuiltinEntry {
        descriptor: meter::DESCRIPTOR,
        category: CapabilityCategory::Analysis,
    },
];

/// Adds every built-in to `builder`.
///
/// Hosts with their own capabilities call this first and then register
/// theirs on the same builder.
pub fn register_builtins(builder: &mut RegistryBuilder) -> Result<(), kestrel_core::RegistryError> {
    for entry in BUILTINS {
        builder.register(entry.descriptor)?;
    }
    Ok(())
}

/// Registry holding only the built-ins.
pub fn builtin_registry() -> CapabilityRegistry {
    let mut builder = CapabilityRegistry::builder();
    // Ids and names in BUILTINS are distinct, so registration cannot fail.
    let _ = register_builtins(&mut builder);
    builder.build()
}

/// Built-in entry for `id`.
pub fn builtin(id: CapabilityId) -> Option<&'static BuiltinEntry> {
    BUILTINS.iter().find(|e| e.descriptor.id == id)
}

/// Category of a built-in capability.
pub fn category_of(id: CapabilityId) -> Option<CapabilityCategory> {
    builtin(id).map(|e| e.category)
}

/// Built-ins in `category`.
pub fn capabilities_in(category: CapabilityCategory) -> impl Iterator<Item = &'static BuiltinEntry> {
    BUILTINS.iter().filter(move |e| e.category == category)
}

/// Resolves a capability reference: a registered name or a numeric id
/// (`"10"`, `"0x000A"`).
pub fn resolve<'r>(registry: &'r CapabilityRegistry, reference: &str) -> Option<&'r CapabilityDescriptor> {
    if let Some(descriptor) = registry.find(reference) {
        return Some(descriptor);
    }
    let raw = match reference
        .strip_prefix("0x")
        .or_else(|| reference.strip_prefix("0X"))
    {
        Some(hex) => u16::from_str_radix(hex, 16).ok()?,
        None => reference.parse().ok()?,
    };
    registry.get(CapabilityId(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_creation() {
        let registry = builtin_registry();
        assert_eq!(registry.len(), BUILTINS.len());
    }

    #[test]
    fn test_builtin_ids() {
        let registry = builtin_registry();
        assert_eq!(registry.get(ids::MIXER).unwrap().name, "mixer");
        assert_eq!(registry.get(ids::PASSTHROUGH).unwrap().name, "passthrough");
        assert_eq!(registry.get(ids::SPLITTER).unwrap().name, "splitter");
        assert_eq!(registry.get(ids::PATTERN).unwrap().name, "pattern");
        assert_eq!(registry.get(ids::PEAK_METER).unwrap().name, "peak_meter");
    }

    #[test]
    fn test_mixer_defaults() {
        let registry = builtin_registry();
        let mixer = registry.get(CapabilityId(0x000A)).unwrap();
        assert_eq!(mixer.default_config, &[0x0000_2080]);
        assert_eq!(mixer.layout.mandatory_inputs, 1);
    }

    #[test]
    fn test_categories() {
        assert_eq!(category_of(ids::MIXER), Some(CapabilityCategory::Mixing));
        assert_eq!(category_of(CapabilityId(0x7777)), None);
        let routing: Vec<_> = capabilities_in(CapabilityCategory::Routing)
            .map(|e| e.descriptor.name)
            .collect();
        assert_eq!(routing, vec!["passthrough", "splitter"]);
        assert_eq!(CapabilityCategory::Analysis.name(), "Analysis");
    }

    #[test]
    fn test_resolve_by_name_or_id() {
        let registry = builtin_registry();
        assert_eq!(resolve(&registry, "mixer").unwrap().id, ids::MIXER);
        assert_eq!(resolve(&registry, "0x000A").unwrap().id, ids::MIXER);
        assert_eq!(resolve(&registry, "10").unwrap().id, ids::MIXER);
        assert_eq!(resolve(&registry, "0x0101").unwrap().id, ids::PEAK_METER);
        assert!(resolve(&registry, "reverb").is_none());
        assert!(resolve(&registry, "0xZZ").is_none());
    }

    #[test]
    fn test_host_capabilities_extend_builtins() {
        let mut builder = CapabilityRegistry::builder();
        register_builtins(&mut builder).unwrap();
        let mut custom = passthrough::DESCRIPTOR;
        custom.id = CapabilityId(0x4000);
        custom.name = "custom_copy";
        builder.register(custom).unwrap();
        assert_eq!(builder.build().len(), BUILTINS.len() + 1);

        let mut builder = CapabilityRegistry::builder();
        register_builtins(&mut builder).unwrap();
        assert!(register_builtins(&mut builder).is_err());
    }
}
