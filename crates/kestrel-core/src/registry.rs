//! Capability registration table.
//!
//! Built once with a [`RegistryBuilder`] and read-only afterwards. New
//! capability classes are added by registering another descriptor; nothing in
//! the graph or the scheduler changes.
//!
//! ```rust
//! use kestrel_core::CapabilityRegistry;
//!
//! let registry = CapabilityRegistry::builder().build();
//! assert!(registry.is_empty());
//! ```

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use crate::capability::{CapabilityDescriptor, CapabilityId};

/// Errors raised while building a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    /// Two descriptors share an id.
    DuplicateId(CapabilityId),
    /// Two descriptors share a name.
    DuplicateName(&'static str),
}

impl core::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::DuplicateId(id) => write!(f, "capability id {id} registered twice"),
            Self::DuplicateName(name) => write!(f, "capability name '{name}' registered twice"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for RegistryError {}

/// Collects descriptors before freezing them into a [`CapabilityRegistry`].
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    entries: Vec<CapabilityDescriptor>,
}

impl RegistryBuilder {
    /// Empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a descriptor. Ids and names must be unique.
    pub fn register(&mut self, descriptor: CapabilityDescriptor) -> Result<&mut Self, RegistryError> {
        if self.entries.iter().any(|d| d.id == descriptor.id) {
            return Err(RegistryError::DuplicateId(descriptor.id));
        }
        if self.entries.iter().any(|d| d.name == descriptor.name) {
            return Err(RegistryError::DuplicateName(descriptor.name));
        }
        self.entries.push(descriptor);
        Ok(self)
    }

    /// Freezes the table.
    pub fn build(self) -> CapabilityRegistry {
        CapabilityRegistry {
            entries: self.entries,
        }
    }
}

/// Immutable `CapabilityId -> CapabilityDescriptor` table.
#[derive(Debug, Clone)]
pub struct CapabilityRegistry {
    entries: Vec<CapabilityDescriptor>,
}

impl CapabilityRegistry {
    /// Starts a new table.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Descriptor registered under `id`.
    pub fn get(&self, id: CapabilityId) -> Option<&CapabilityDescriptor> {
        self.entries.iter().find(|d| d.id == id)
    }

    /// Descriptor registered under `name`.
    pub fn find(&self, name: &str) -> Option<&CapabilityDescriptor> {
        self.entries.iter().find(|d| d.name == name)
    }

    /// All descriptors, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &CapabilityDescriptor> {
        self.entries.iter()
    }

    /// Number of registered classes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
