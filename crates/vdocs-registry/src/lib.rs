//! Source registry and version resolution for vdocs.
//!
//! The registry is the authoritative list of tenants and, per tenant, the
//! documentation versions that exist and where each version's content lives.
//! It is loaded from a descriptor file (YAML, TOML or JSON), validated as a
//! whole, and published through a [`RegistryHandle`] so that a reload swaps
//! the complete snapshot atomically.
//!
//! [`VersionResolver`] maps a tenant plus an optional requested version onto
//! a concrete [`Version`], choosing the effective default when no version was
//! requested.
//!
//! # Example
//!
//! ```ignore
//! use vdocs_registry::{RegistryHandle, SemverOrdering, VersionResolver};
//!
//! let handle = RegistryHandle::load("registry.yaml")?;
//! let resolver = VersionResolver::new(SemverOrdering);
//! let resolved = resolver.resolve(&handle.snapshot(), "acme", None)?;
//! println!("{} -> {}", resolved.version_id, resolved.storage_location);
//! ```

mod descriptor;
mod ordering;
mod registry;
mod resolver;
mod validate;

pub use descriptor::DescriptorFormat;
pub use ordering::{LexicographicOrdering, SemverOrdering, VersionOrdering};
pub use registry::{
    Registry, RegistryError, RegistryHandle, RegistrySwap, StalePair, Tenant, Version,
};
pub use resolver::{ResolveError, ResolvedVersion, VersionResolver};
pub use validate::ValidationIssue;
