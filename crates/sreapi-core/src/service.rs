//! Service handlers shared by both protocol surfaces.
//!
//! [`Inventory`] validates keys and filters, derives the scoping chain of a
//! record from its declared parents, calls the persistence gateway and maps
//! the results back to wire records. It is synchronous; the server runs it
//! on the blocking pool under each request's [`RequestContext`].

use crate::context::RequestContext;
use crate::entity::{
    Entity, EntityKind, ParentRef, ProjectRecord, Reference, RoleRecord, Scope, StackRecord,
    VirtualMachineRecord,
};
use crate::error::{InventoryError, Result};
use crate::store::{validate_filter, validate_key, Filter, PersistenceGateway};
use tracing::{debug, info};

/// Inventory operations over a persistence gateway.
pub struct Inventory<G> {
    gateway: G,
}

impl<G: PersistenceGateway> Inventory<G> {
    pub fn new(gateway: G) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Records of kind `E` matching `filter`, in arrival order.
    pub fn list<E: Entity>(&self, ctx: &RequestContext, filter: &Filter) -> Result<Vec<E::Wire>> {
        validate_filter::<E>(filter)?;
        let records = self.gateway.list::<E>(ctx, filter)?;
        debug!(
            "Listed {} {} record(s) matching [{}]",
            records.len(),
            E::KIND,
            filter.describe()
        );
        Ok(records.iter().map(E::to_wire).collect())
    }

    pub fn get<E: Entity>(&self, ctx: &RequestContext, key: &Filter) -> Result<E::Wire> {
        validate_key::<E>(key)?;
        let record = self.gateway.get::<E>(ctx, key)?;
        Ok(record.to_wire())
    }

    /// Store a new record. Returns it as stored, with derived scope applied.
    pub fn create<E: Entity>(&self, ctx: &RequestContext, wire: &E::Wire) -> Result<E::Wire> {
        let record = self.prepare::<E>(ctx, wire)?;
        let stored = self.gateway.create(ctx, &record)?;
        info!("Created {}: {}", E::KIND, stored.display_key());
        Ok(stored.to_wire())
    }

    /// Replace the record addressed by `key` with `wire`, which may rename it.
    pub fn update<E: Entity>(
        &self,
        ctx: &RequestContext,
        key: &Filter,
        wire: &E::Wire,
    ) -> Result<E::Wire> {
        validate_key::<E>(key)?;
        let record = self.prepare::<E>(ctx, wire)?;
        let stored = self.gateway.update(ctx, key, &record)?;
        info!(
            "Updated {}: {} -> {}",
            E::KIND,
            key.describe(),
            stored.display_key()
        );
        Ok(stored.to_wire())
    }

    /// Delete the record addressed by `key`. Deleting nothing succeeds.
    pub fn delete<E: Entity>(&self, ctx: &RequestContext, key: &Filter) -> Result<usize> {
        validate_key::<E>(key)?;
        let removed = self.gateway.delete::<E>(ctx, key)?;
        if removed > 0 {
            info!("Deleted {}: {}", E::KIND, key.describe());
        } else {
            debug!("Delete of absent {} {} ignored", E::KIND, key.describe());
        }
        Ok(removed)
    }

    /// Scope, map and check a wire record before it is written.
    fn prepare<E: Entity>(&self, ctx: &RequestContext, wire: &E::Wire) -> Result<E> {
        let scope = self.resolve_scope::<E>(ctx, wire)?;
        let record = E::to_storage(wire, &scope)?;
        for reference in record.references() {
            self.check_reference(ctx, &reference)?;
        }
        Ok(record)
    }

    /// Derive the scoping chain from the parent a record declares.
    ///
    /// A stored parent contributes the scope fields the record left empty.
    /// A missing parent is tolerated: the hierarchy is logical, so the
    /// declared values are used as they are.
    pub fn resolve_scope<E: Entity>(&self, ctx: &RequestContext, wire: &E::Wire) -> Result<Scope> {
        let Some(parent) = E::parent(wire) else {
            return Ok(Scope::default());
        };

        let scope = match parent {
            ParentRef::Project { name } => {
                self.lookup::<ProjectRecord>(ctx, &Filter::new().name(&name))?;
                Scope::project(name)
            }
            ParentRef::Stack { project, name } => {
                let key = Filter::new().name(&name).project(&project);
                match self.lookup::<StackRecord>(ctx, &key)? {
                    Some(stack) => Scope::stack(stack.project, stack.name),
                    None => Scope::stack(project, name),
                }
            }
            ParentRef::Role {
                project,
                stack,
                name,
            } => {
                let key = Filter::new().name(&name).project(&project).stack(&stack);
                match self.lookup::<RoleRecord>(ctx, &key)? {
                    Some(role) => Scope {
                        project: role.project,
                        stack: role.stack,
                        role: role.name,
                    },
                    None => Scope {
                        project,
                        stack,
                        role: name,
                    },
                }
            }
        };

        Ok(scope)
    }

    fn lookup<P: Entity>(&self, ctx: &RequestContext, key: &Filter) -> Result<Option<P>> {
        match self.gateway.get::<P>(ctx, key) {
            Ok(parent) => Ok(Some(parent)),
            Err(InventoryError::NotFound { .. }) => {
                debug!("No stored {} {}, keeping declared scope", P::KIND, key.describe());
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn check_reference(&self, ctx: &RequestContext, reference: &Reference) -> Result<()> {
        let found = match reference.kind {
            EntityKind::Project => self.lookup::<ProjectRecord>(ctx, &reference.key)?.is_some(),
            EntityKind::Stack => self.lookup::<StackRecord>(ctx, &reference.key)?.is_some(),
            EntityKind::Role => self.lookup::<RoleRecord>(ctx, &reference.key)?.is_some(),
            EntityKind::VirtualMachine => self
                .lookup::<VirtualMachineRecord>(ctx, &reference.key)?
                .is_some(),
        };

        if found {
            Ok(())
        } else {
            Err(InventoryError::validation(
                reference.field.column(),
                format!(
                    "{} {} does not exist",
                    reference.kind,
                    reference.key.describe()
                ),
            ))
        }
    }
}
