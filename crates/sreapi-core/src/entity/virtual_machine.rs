//! Virtual machine storage record.

use super::{declared_or, next_column, Entity, EntityKind, Field, ParentRef, RecordMeta, Scope};
use crate::error::Result;
use crate::wire::VirtualMachine;

/// A stored virtual machine. The hostname is unique across the store.
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualMachineRecord {
    pub meta: RecordMeta,
    pub hostname: String,
    pub project: String,
    pub stack: String,
    pub role: String,
}

impl Entity for VirtualMachineRecord {
    type Wire = VirtualMachine;

    const KIND: EntityKind = EntityKind::VirtualMachine;
    const TABLE: &'static str = "virtual_machines";
    const COLUMNS: &'static [Field] = &[Field::Hostname, Field::Project, Field::Stack, Field::Role];
    const KEY: &'static [Field] = &[Field::Hostname];
    const REQUIRED: &'static [Field] = &[Field::Hostname, Field::Project, Field::Role];

    fn to_storage(wire: &VirtualMachine, scope: &Scope) -> Result<Self> {
        let record = Self {
            meta: RecordMeta::unsaved(),
            hostname: wire.hostname.clone(),
            project: declared_or(&wire.project, &scope.project),
            stack: declared_or(&wire.stack, &scope.stack),
            role: declared_or(&wire.role, &scope.role),
        };
        record.validate()?;
        Ok(record)
    }

    fn to_wire(&self) -> VirtualMachine {
        VirtualMachine {
            hostname: self.hostname.clone(),
            project: self.project.clone(),
            role: self.role.clone(),
            stack: self.stack.clone(),
        }
    }

    fn parent(wire: &VirtualMachine) -> Option<ParentRef> {
        if wire.role.is_empty() {
            return None;
        }
        Some(ParentRef::Role {
            project: wire.project.clone(),
            stack: wire.stack.clone(),
            name: wire.role.clone(),
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
            Field::Hostname => &self.hostname,
            Field::Project => &self.project,
            Field::Stack => &self.stack,
            Field::Role => &self.role,
            _ => "",
        }
    }

    fn from_columns(meta: RecordMeta, values: Vec<String>) -> Self {
        let mut values = values.into_iter();
        Self {
            meta,
            hostname: next_column(&mut values),
            project: next_column(&mut values),
            stack: next_column(&mut values),
            role: next_column(&mut values),
        }
    }
}
