//! Stack storage record.

use super::{declared_or, next_column, Entity, EntityKind, Field, ParentRef, RecordMeta, Scope};
use crate::error::Result;
use crate::wire::Stack;

/// A stored stack, owned by a project.
#[derive(Debug, Clone, PartialEq)]
pub struct StackRecord {
    pub meta: RecordMeta,
    pub name: String,
    pub project: String,
}

impl Entity for StackRecord {
    type Wire = Stack;

    const KIND: EntityKind = EntityKind::Stack;
    const TABLE: &'static str = "stacks";
    const COLUMNS: &'static [Field] = &[Field::Name, Field::Project];
    const KEY: &'static [Field] = &[Field::Name, Field::Project];
    const REQUIRED: &'static [Field] = &[Field::Name, Field::Project];

    fn to_storage(wire: &Stack, scope: &Scope) -> Result<Self> {
        let record = Self {
            meta: RecordMeta::unsaved(),
            name: wire.name.clone(),
            project: declared_or(&wire.project, &scope.project),
        };
        record.validate()?;
        Ok(record)
    }

    fn to_wire(&self) -> Stack {
        Stack {
            name: self.name.clone(),
            project: self.project.clone(),
        }
    }

    fn parent(wire: &Stack) -> Option<ParentRef> {
        if wire.project.is_empty() {
            return None;
        }
        Some(ParentRef::Project {
            name: wire.project.clone(),
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
            Field::Project => &self.project,
            _ => "",
        }
    }

    fn from_columns(meta: RecordMeta, values: Vec<String>) -> Self {
        let mut values = values.into_iter();
        Self {
            meta,
            name: next_column(&mut values),
            project: next_column(&mut values),
        }
    }
}
