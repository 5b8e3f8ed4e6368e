//! Conversion between wire records and storage records.
//!
//! The four inventory kinds form a containment chain
//! (Project → Stack → Role → VirtualMachine). Each kind has a wire record
//! (see [`crate::wire`]) and a storage record defined here. All four storage
//! records implement [`Entity`], so handlers and the persistence gateway are
//! written once, generically, and never inspect a concrete kind.
//!
//! Conversions are pure: [`to_storage`] takes the scoping chain the caller
//! already resolved, [`to_wire`] drops everything the protocol boundary does
//! not carry (ids, audit timestamps).

mod project;
mod role;
mod stack;
mod virtual_machine;

pub use project::ProjectRecord;
pub use role::RoleRecord;
pub use stack::StackRecord;
pub use virtual_machine::VirtualMachineRecord;

use crate::error::{InventoryError, Result};
use crate::store::Filter;
use chrono::{DateTime, Utc};
use std::fmt;

/// The four inventory kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Project,
    Stack,
    Role,
    VirtualMachine,
}

impl EntityKind {
    /// Human-readable name used in logs and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Project => "project",
            EntityKind::Stack => "stack",
            EntityKind::Role => "role",
            EntityKind::VirtualMachine => "virtual machine",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A semantic column shared by the inventory tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    Project,
    Stack,
    Role,
    Hostname,
    ParentRole,
}

impl Field {
    /// Column name in storage. Also used as the field name in errors.
    pub fn column(&self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Project => "project",
            Field::Stack => "stack",
            Field::Role => "role",
            Field::Hostname => "hostname",
            Field::ParentRole => "parent_role",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// Parent identifiers qualifying a child record.
///
/// Empty strings mean "not known". Values a wire record declares itself
/// always take precedence over the scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    pub project: String,
    pub stack: String,
    pub role: String,
}

impl Scope {
    pub fn project(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            ..Self::default()
        }
    }

    pub fn stack(project: impl Into<String>, stack: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            stack: stack.into(),
            ..Self::default()
        }
    }
}

/// Parent a wire record declares, used to derive its [`Scope`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentRef {
    Project {
        name: String,
    },
    Stack {
        project: String,
        name: String,
    },
    Role {
        project: String,
        stack: String,
        name: String,
    },
}

/// A record another record points at, which must exist when written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Field holding the reference.
    pub field: Field,
    pub kind: EntityKind,
    pub key: Filter,
}

/// Identifier and audit columns every storage record carries.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordMeta {
    /// Autogenerated row id; zero until persisted.
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set when the record is logically deleted.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl RecordMeta {
    /// Metadata for a record that has not been written yet.
    pub fn unsaved() -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

impl Default for RecordMeta {
    fn default() -> Self {
        Self::unsaved()
    }
}

/// Shared conversion contract implemented by every storage record.
pub trait Entity: Clone + Send + Sync + Sized + 'static {
    /// The record's representation at the protocol boundary.
    type Wire: Clone + Send + Sync + 'static;

    const KIND: EntityKind;
    const TABLE: &'static str;
    /// Semantic columns, in storage order.
    const COLUMNS: &'static [Field];
    /// Natural key. The first field identifies the record within the rest.
    const KEY: &'static [Field];
    /// Columns that must be non-empty once the scope has been applied.
    const REQUIRED: &'static [Field];

    /// Build a storage record from a wire record and its resolved scope.
    fn to_storage(wire: &Self::Wire, scope: &Scope) -> Result<Self>;

    /// Project the wire-visible fields back out.
    fn to_wire(&self) -> Self::Wire;

    /// Parent the wire record declares, if the kind has one.
    fn parent(wire: &Self::Wire) -> Option<ParentRef>;

    fn meta(&self) -> &RecordMeta;

    fn meta_mut(&mut self) -> &mut RecordMeta;

    /// Value of a semantic column. Columns the kind lacks read as empty.
    fn field(&self, field: Field) -> &str;

    /// Rebuild a record from its metadata and its column values in
    /// [`Entity::COLUMNS`] order.
    fn from_columns(meta: RecordMeta, values: Vec<String>) -> Self;

    /// Other records this one points at.
    fn references(&self) -> Vec<Reference> {
        Vec::new()
    }

    /// Fail fast on a required column left empty.
    fn validate(&self) -> Result<()> {
        for field in Self::REQUIRED {
            if self.field(*field).trim().is_empty() {
                return Err(InventoryError::validation(
                    field.column(),
                    format!("{} requires a {}", Self::KIND, field),
                ));
            }
        }
        Ok(())
    }

    /// Natural key values, in [`Entity::KEY`] order.
    fn key_values(&self) -> Vec<(Field, &str)> {
        Self::KEY.iter().map(|f| (*f, self.field(*f))).collect()
    }

    /// Natural key rendered for logs and error messages.
    fn display_key(&self) -> String {
        Self::KEY
            .iter()
            .rev()
            .map(|f| self.field(*f))
            .filter(|v| !v.is_empty())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Convert a wire record into its storage record.
pub fn to_storage<E: Entity>(wire: &E::Wire, scope: &Scope) -> Result<E> {
    E::to_storage(wire, scope)
}

/// Convert a storage record into its wire record.
pub fn to_wire<E: Entity>(record: &E) -> E::Wire {
    record.to_wire()
}

/// Pick the declared value, falling back to the derived one.
pub(crate) fn declared_or(declared: &str, derived: &str) -> String {
    if declared.trim().is_empty() {
        derived.to_string()
    } else {
        declared.to_string()
    }
}

/// Pull the next column value, tolerating short rows.
pub(crate) fn next_column(values: &mut std::vec::IntoIter<String>) -> String {
    values.next().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_value_wins() {
        assert_eq!(declared_or("core", "edge"), "core");
        assert_eq!(declared_or("", "edge"), "edge");
        assert_eq!(declared_or("  ", "edge"), "edge");
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(EntityKind::VirtualMachine.to_string(), "virtual machine");
        assert_eq!(Field::ParentRole.to_string(), "parent_role");
    }

    #[test]
    fn test_unsaved_meta() {
        let meta = RecordMeta::unsaved();
        assert_eq!(meta.id, 0);
        assert!(!meta.is_deleted());
    }
}
