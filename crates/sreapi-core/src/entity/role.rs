//! Role storage record.

use super::{
    declared_or, next_column, Entity, EntityKind, Field, ParentRef, RecordMeta, Reference, Scope,
};
use crate::error::{InventoryError, Result};
use crate::store::Filter;
use crate::wire::Role;

/// A stored role, owned by a stack.
#[derive(Debug, Clone, PartialEq)]
pub struct RoleRecord {
    pub meta: RecordMeta,
    pub name: String,
    pub stack: String,
    pub project: String,
    /// Name of the role this one specialises; empty when unset.
    pub parent_role: String,
}

impl Entity for RoleRecord {
    type Wire = Role;

    const KIND: EntityKind = EntityKind::Role;
    const TABLE: &'static str = "roles";
    const COLUMNS: &'static [Field] = &[Field::Name, Field::Stack, Field::Project, Field::ParentRole];
    const KEY: &'static [Field] = &[Field::Name, Field::Stack, Field::Project];
    const REQUIRED: &'static [Field] = &[Field::Name, Field::Stack, Field::Project];

    fn to_storage(wire: &Role, scope: &Scope) -> Result<Self> {
        let record = Self {
            meta: RecordMeta::unsaved(),
            name: wire.name.clone(),
            stack: declared_or(&wire.stack, &scope.stack),
            project: declared_or(&wire.project, &scope.project),
            parent_role: wire.parent_role.clone(),
        };
        record.validate()?;
        if record.parent_role == record.name {
            return Err(InventoryError::validation(
                Field::ParentRole.column(),
                "a role cannot be its own parent",
            ));
        }
        Ok(record)
    }

    fn to_wire(&self) -> Role {
        Role {
            name: self.name.clone(),
            stack: self.stack.clone(),
            project: self.project.clone(),
            parent_role: self.parent_role.clone(),
        }
    }

    fn parent(wire: &Role) -> Option<ParentRef> {
        if wire.stack.is_empty() {
            return None;
        }
        Some(ParentRef::Stack {
            project: wire.project.clone(),
            name: wire.stack.clone(),
        })
    }

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn field(&self, field: Field) -> &str {
        match field {
            Field::Name => &self.name,
            Field::Stack => &self.stack,
            Field::Project => &self.project,
            Field::ParentRole => &self.parent_role,
            _ => "",
        }
    }

    fn from_columns(meta: RecordMeta, values: Vec<String>) -> Self {
        let mut values = values.into_iter();
        Self {
            meta,
            name: next_column(&mut values),
            stack: next_column(&mut values),
            project: next_column(&mut values),
            parent_role: next_column(&mut values),
        }
    }

    fn references(&self) -> Vec<Reference> {
        if self.parent_role.trim().is_empty() {
            return Vec::new();
        }
        vec![Reference {
            field: Field::ParentRole,
            kind: EntityKind::Role,
            key: Filter::new().name(&self.parent_role).project(&self.project),
        }]
    }
}
