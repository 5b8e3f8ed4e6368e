//! Project storage record.

use super::{next_column, Entity, EntityKind, Field, ParentRef, RecordMeta, Scope};
use crate::error::Result;
use crate::wire::Project;

/// A stored project.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectRecord {
    pub meta: RecordMeta,
    pub name: String,
}

impl Entity for ProjectRecord {
    type Wire = Project;

    const KIND: EntityKind = EntityKind::Project;
    const TABLE: &'static str = "projects";
    const COLUMNS: &'static [Field] = &[Field::Name];
    const KEY: &'static [Field] = &[Field::Name];
    const REQUIRED: &'static [Field] = &[Field::Name];

    fn to_storage(wire: &Project, _scope: &Scope) -> Result<Self> {
        let record = Self {
            meta: RecordMeta::unsaved(),
            name: wire.name.clone(),
        };
        record.validate()?;
        Ok(record)
    }

    fn to_wire(&self) -> Project {
        Project {
            name: self.name.clone(),
        }
    }

    fn parent(_wire: &Project) -> Option<ParentRef> {
        None
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
            _ => "",
        }
    }

    fn from_columns(meta: RecordMeta, values: Vec<String>) -> Self {
        let mut values = values.into_iter();
        Self {
            meta,
            name: next_column(&mut values),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{to_storage, to_wire};
    use crate::error::InventoryError;

    #[test]
    fn test_round_trip() {
        let wire = Project {
            name: "core".into(),
        };
        let record: ProjectRecord = to_storage(&wire, &Scope::default()).unwrap();
        assert_eq!(record.meta.id, 0);
        assert_eq!(to_wire(&record), wire);
    }

    #[test]
    fn test_missing_name_fails() {
        let err = ProjectRecord::to_storage(&Project::default(), &Scope::default()).unwrap_err();
        assert!(matches!(err, InventoryError::Validation { ref field, .. } if field == "name"));
    }
}
