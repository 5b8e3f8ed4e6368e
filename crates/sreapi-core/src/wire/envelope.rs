//! Traits over the request and response messages.
//!
//! Every response carries the same envelope (`api`, `success`, `error`)
//! around a kind-specific payload. These traits let the protocol layers
//! build any kind's response from one generic code path.

use crate::error::InventoryError;
use crate::store::Filter;

/// A response message with the common envelope.
pub trait Reply: Default {
    /// Set the envelope fields.
    fn stamp(&mut self, api: &str, success: bool, error: String);

    /// A successful response with an empty payload.
    fn ok(api: &str) -> Self {
        let mut reply = Self::default();
        reply.stamp(api, true, String::new());
        reply
    }

    /// A failed response carrying the caller-safe error text.
    fn failure(api: &str, err: &InventoryError) -> Self {
        let mut reply = Self::default();
        reply.stamp(api, false, err.public_message());
        reply
    }
}

/// A response carrying a list of wire records.
pub trait ListReply<W>: Reply {
    fn with_items(items: Vec<W>) -> Self;
}

/// A response carrying one wire record.
pub trait GetReply<W>: Reply {
    fn with_item(item: W) -> Self;
}

/// A request carrying a wire record to write.
pub trait ItemRequest<W> {
    fn api(&self) -> &str;

    fn take_item(self) -> Option<W>;
}

/// A request that addresses records by key or filter fields.
pub trait KeyedRequest {
    fn key(&self) -> Filter;
}
