//! Persistence gateway trait.

use super::Filter;
use crate::context::RequestContext;
use crate::entity::Entity;
use crate::error::Result;

/// Storage backend for the inventory.
///
/// Every method is generic over the entity kind, so one implementation
/// serves all four tables. Implementations must bind filter values as
/// parameters, check `ctx` before doing any I/O, and only ever return live
/// (not deleted) records.
pub trait PersistenceGateway: Send + Sync + 'static {
    /// Records matching every set filter field, in arrival order.
    fn list<E: Entity>(&self, ctx: &RequestContext, filter: &Filter) -> Result<Vec<E>>;

    /// First record in arrival order matching `key`, or `NotFound`.
    fn get<E: Entity>(&self, ctx: &RequestContext, key: &Filter) -> Result<E>;

    /// Persist a new record, or `Conflict` if its natural key is taken.
    /// Returns the record with its storage metadata filled in.
    fn create<E: Entity>(&self, ctx: &RequestContext, record: &E) -> Result<E>;

    /// Replace the semantic fields of the record matching `key`.
    fn update<E: Entity>(&self, ctx: &RequestContext, key: &Filter, record: &E) -> Result<E>;

    /// Logically delete the record matching `key`. Zero matches is not an
    /// error; the number of records removed is returned.
    fn delete<E: Entity>(&self, ctx: &RequestContext, key: &Filter) -> Result<usize>;
}
