//! Filters and natural keys.

use crate::entity::{Entity, Field};
use crate::error::{InventoryError, Result};

/// Exact-match conditions on the semantic columns, ANDed together.
///
/// Absent fields impose no condition. The builder methods skip empty
/// strings, so a proto3 default never turns into a match on `''`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    pub name: Option<String>,
    pub project: Option<String>,
    pub stack: Option<String>,
    pub role: Option<String>,
    pub hostname: Option<String>,
    pub parent_role: Option<String>,
}

/// Order in which terms are rendered and bound: outermost scope first.
const TERM_ORDER: [Field; 6] = [
    Field::Project,
    Field::Stack,
    Field::Role,
    Field::Name,
    Field::Hostname,
    Field::ParentRole,
];

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a filter from `(field, value)` pairs, e.g. a record's key.
    pub fn from_terms<'a>(terms: impl IntoIterator<Item = (Field, &'a str)>) -> Self {
        terms
            .into_iter()
            .fold(Self::new(), |filter, (field, value)| filter.with(field, value))
    }

    /// Set one field. Blank values leave it absent.
    pub fn with(mut self, field: Field, value: impl AsRef<str>) -> Self {
        let value = value.as_ref();
        if value.trim().is_empty() {
            return self;
        }
        *self.slot(field) = Some(value.to_string());
        self
    }

    pub fn name(self, value: impl AsRef<str>) -> Self {
        self.with(Field::Name, value)
    }

    pub fn project(self, value: impl AsRef<str>) -> Self {
        self.with(Field::Project, value)
    }

    pub fn stack(self, value: impl AsRef<str>) -> Self {
        self.with(Field::Stack, value)
    }

    pub fn role(self, value: impl AsRef<str>) -> Self {
        self.with(Field::Role, value)
    }

    pub fn hostname(self, value: impl AsRef<str>) -> Self {
        self.with(Field::Hostname, value)
    }

    /// Value set for a field, if any.
    pub fn get(&self, field: Field) -> Option<&str> {
        match field {
            Field::Name => self.name.as_deref(),
            Field::Project => self.project.as_deref(),
            Field::Stack => self.stack.as_deref(),
            Field::Role => self.role.as_deref(),
            Field::Hostname => self.hostname.as_deref(),
            Field::ParentRole => self.parent_role.as_deref(),
        }
    }

    fn slot(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::Name => &mut self.name,
            Field::Project => &mut self.project,
            Field::Stack => &mut self.stack,
            Field::Role => &mut self.role,
            Field::Hostname => &mut self.hostname,
            Field::ParentRole => &mut self.parent_role,
        }
    }

    /// The set fields, outermost scope first.
    pub fn terms(&self) -> Vec<(Field, &str)> {
        TERM_ORDER
            .iter()
            .filter_map(|field| self.get(*field).map(|value| (*field, value)))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.terms().is_empty()
    }

    /// Values joined with `/`, for logs and error messages.
    pub fn describe(&self) -> String {
        self.terms()
            .into_iter()
            .map(|(_, value)| value)
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Reject filter fields the entity kind does not have.
pub fn validate_filter<E: Entity>(filter: &Filter) -> Result<()> {
    for (field, _) in filter.terms() {
        if !E::COLUMNS.contains(&field) {
            return Err(InventoryError::validation(
                field.column(),
                format!("{} has no {} field", E::KIND, field),
            ));
        }
    }
    Ok(())
}

/// A key must satisfy [`validate_filter`] and carry the identifying field.
pub fn validate_key<E: Entity>(key: &Filter) -> Result<()> {
    validate_filter::<E>(key)?;
    if let Some(field) = E::KEY.first() {
        if key.get(*field).is_none() {
            return Err(InventoryError::validation(
                field.column(),
                format!("{} key requires a {}", E::KIND, field),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{ProjectRecord, RoleRecord, VirtualMachineRecord};

    #[test]
    fn test_builder_skips_blank_values() {
        let filter = Filter::new().project("core").stack("").role("   ");
        assert_eq!(filter.project.as_deref(), Some("core"));
        assert!(filter.stack.is_none());
        assert!(filter.role.is_none());
        assert!(!filter.is_empty());
        assert!(Filter::new().name("").is_empty());
    }

    #[test]
    fn test_terms_outermost_first() {
        let filter = Filter::new().name("frontend").stack("web").project("core");
        let fields: Vec<Field> = filter.terms().into_iter().map(|(f, _)| f).collect();
        assert_eq!(fields, vec![Field::Project, Field::Stack, Field::Name]);
        assert_eq!(filter.describe(), "core/web/frontend");
    }

    #[test]
    fn test_from_terms() {
        let filter = Filter::from_terms([(Field::Hostname, "web01"), (Field::Project, "")]);
        assert_eq!(filter, Filter::new().hostname("web01"));
    }

    #[test]
    fn test_unknown_filter_field_rejected() {
        let filter = Filter::new().hostname("web01");
        let err = validate_filter::<ProjectRecord>(&filter).unwrap_err();
        assert!(matches!(err, InventoryError::Validation { ref field, .. } if field == "hostname"));

        assert!(validate_filter::<VirtualMachineRecord>(&filter).is_ok());
    }

    #[test]
    fn test_key_requires_identifying_field() {
        let scope_only = Filter::new().project("core").stack("web");
        let err = validate_key::<RoleRecord>(&scope_only).unwrap_err();
        assert!(matches!(err, InventoryError::Validation { ref field, .. } if field == "name"));

        assert!(validate_key::<RoleRecord>(&scope_only.name("frontend")).is_ok());
        assert!(validate_key::<VirtualMachineRecord>(&Filter::new().name("web01")).is_err());
    }
}
