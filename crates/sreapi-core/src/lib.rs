//! sreapi Core - inventory model and persistence for the sreapi service.
//!
//! This crate holds everything below the protocol layer: the wire messages
//! both surfaces speak, the mapping between wire and storage records, the
//! persistence gateway and the [`Inventory`] handlers that tie them together.
//! It can be used directly without any network server.
//!
//! # Example
//!
//! ```rust,ignore
//! use sreapi_core::{Filter, Inventory, RequestContext, SqliteGateway, VirtualMachineRecord};
//! use sreapi_core::wire::VirtualMachine;
//! use std::time::Duration;
//!
//! let inventory = Inventory::new(SqliteGateway::open("inventory.db")?);
//! let ctx = RequestContext::with_timeout(Duration::from_secs(1));
//!
//! let vm = VirtualMachine {
//!     hostname: "web01".into(),
//!     project: "core".into(),
//!     role: "frontend".into(),
//!     ..Default::default()
//! };
//! inventory.create::<VirtualMachineRecord>(&ctx, &vm)?;
//! let found = inventory.list::<VirtualMachineRecord>(&ctx, &Filter::new().project("core"))?;
//! ```

pub mod config;
pub mod context;
pub mod entity;
pub mod error;
pub mod service;
pub mod store;
pub mod wire;

// Re-export commonly used types
pub use config::{ApiConfig, ProtocolConfig, StorageConfig};
pub use context::{CancellationToken, RequestContext};
pub use entity::{
    to_storage, to_wire, Entity, EntityKind, Field, ProjectRecord, RecordMeta, RoleRecord, Scope,
    StackRecord, VirtualMachineRecord,
};
pub use error::{InventoryError, Result};
pub use service::Inventory;
pub use store::{Filter, PersistenceGateway, SqliteGateway};
