//! Wire records and request/response messages.
//!
//! These types are the protocol boundary for both surfaces: they are
//! `prost` messages for the binary RPC server and `serde` types for the
//! JSON gateway, so a JSON request decodes into exactly the message the RPC
//! handler receives. Absent JSON fields take their protobuf defaults.

mod envelope;

pub use envelope::{GetReply, ItemRequest, KeyedRequest, ListReply, Reply};

use serde::{Deserialize, Serialize};

// ============================================================================
// Records
// ============================================================================

/// A project, the root of the hierarchy.
#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct Project {
    #[prost(string, tag = "1")]
    pub name: String,
}

/// A stack inside a project.
#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct Stack {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub project: String,
}

/// A role inside a stack, optionally specialising another role.
#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct Role {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub stack: String,
    #[prost(string, tag = "3")]
    pub project: String,
    #[prost(string, tag = "4")]
    pub parent_role: String,
}

/// A virtual machine, identified by hostname.
#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualMachine {
    #[prost(string, tag = "1")]
    pub hostname: String,
    #[prost(string, tag = "2")]
    pub project: String,
    #[prost(string, tag = "3")]
    pub role: String,
    #[prost(string, tag = "4")]
    pub stack: String,
}

// ============================================================================
// Requests shared by every kind
// ============================================================================

/// List filter. Empty fields are ignored; the rest are ANDed.
///
/// Unknown keys are rejected when decoding JSON or a query string, so a
/// misspelt filter never silently matches everything.
#[derive(Clone, PartialEq, Eq, ::prost::Message, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ListRequest {
    #[prost(string, tag = "1")]
    pub api: String,
    #[prost(string, tag = "2")]
    pub project: String,
    #[prost(string, tag = "3")]
    pub stack: String,
    #[prost(string, tag = "4")]
    pub role: String,
    #[prost(string, tag = "5")]
    pub hostname: String,
    #[prost(string, tag = "6")]
    pub name: String,
}

/// Natural key of a single record, for Get and Delete.
#[derive(Clone, PartialEq, Eq, ::prost::Message, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KeyRequest {
    #[prost(string, tag = "1")]
    pub api: String,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(string, tag = "3")]
    pub project: String,
    #[prost(string, tag = "4")]
    pub stack: String,
    #[prost(string, tag = "5")]
    pub hostname: String,
}

/// Outcome of Create, Update and Delete.
#[derive(Clone, PartialEq, Eq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct MutationResponse {
    #[prost(string, tag = "1")]
    pub api: String,
    #[prost(bool, tag = "2")]
    pub success: bool,
    #[prost(string, tag = "3")]
    pub error: String,
}

// ============================================================================
// Per-kind requests and responses
// ============================================================================

/// Declares the Create/Update requests and List/Get responses of one kind.
macro_rules! entity_messages {
    ($wire:ident, $create:ident, $update:ident, $list:ident, $get:ident) => {
        #[doc = concat!("Create request carrying a new [`", stringify!($wire), "`].")]
        #[derive(Clone, PartialEq, Eq, ::prost::Message, Serialize, Deserialize)]
        #[serde(default)]
        pub struct $create {
            #[prost(string, tag = "1")]
            pub api: String,
            #[prost(message, optional, tag = "2")]
            pub item: Option<$wire>,
        }

        #[doc = concat!("Update request: the key fields address the stored [`", stringify!($wire), "`], `item` replaces it.")]
        #[derive(Clone, PartialEq, Eq, ::prost::Message, Serialize, Deserialize)]
        #[serde(default)]
        pub struct $update {
            #[prost(string, tag = "1")]
            pub api: String,
            #[prost(string, tag = "2")]
            pub name: String,
            #[prost(string, tag = "3")]
            pub project: String,
            #[prost(string, tag = "4")]
            pub stack: String,
            #[prost(string, tag = "5")]
            pub hostname: String,
            #[prost(message, optional, tag = "6")]
            pub item: Option<$wire>,
        }

        #[doc = concat!("List response carrying [`", stringify!($wire), "`] records in arrival order.")]
        #[derive(Clone, PartialEq, Eq, ::prost::Message, Serialize, Deserialize)]
        #[serde(default)]
        pub struct $list {
            #[prost(string, tag = "1")]
            pub api: String,
            #[prost(bool, tag = "2")]
            pub success: bool,
            #[prost(string, tag = "3")]
            pub error: String,
            #[prost(message, repeated, tag = "4")]
            pub items: Vec<$wire>,
        }

        #[doc = concat!("Get response carrying one [`", stringify!($wire), "`].")]
        #[derive(Clone, PartialEq, Eq, ::prost::Message, Serialize, Deserialize)]
        #[serde(default)]
        pub struct $get {
            #[prost(string, tag = "1")]
            pub api: String,
            #[prost(bool, tag = "2")]
            pub success: bool,
            #[prost(string, tag = "3")]
            pub error: String,
            #[prost(message, optional, tag = "4")]
            pub item: Option<$wire>,
        }

        impl ItemRequest<$wire> for $create {
            fn api(&self) -> &str {
                &self.api
            }

            fn take_item(self) -> Option<$wire> {
                self.item
            }
        }

        impl ItemRequest<$wire> for $update {
            fn api(&self) -> &str {
                &self.api
            }

            fn take_item(self) -> Option<$wire> {
                self.item
            }
        }

        impl KeyedRequest for $update {
            fn key(&self) -> crate::store::Filter {
                crate::store::Filter::new()
                    .name(&self.name)
                    .project(&self.project)
                    .stack(&self.stack)
                    .hostname(&self.hostname)
            }
        }

        impl Reply for $list {
            fn stamp(&mut self, api: &str, success: bool, error: String) {
                self.api = api.to_string();
                self.success = success;
                self.error = error;
            }
        }

        impl ListReply<$wire> for $list {
            fn with_items(items: Vec<$wire>) -> Self {
                Self {
                    items,
                    ..Self::default()
                }
            }
        }

        impl Reply for $get {
            fn stamp(&mut self, api: &str, success: bool, error: String) {
                self.api = api.to_string();
                self.success = success;
                self.error = error;
            }
        }

        impl GetReply<$wire> for $get {
            fn with_item(item: $wire) -> Self {
                Self {
                    item: Some(item),
                    ..Self::default()
                }
            }
        }
    };
}

entity_messages!(
    Project,
    CreateProjectRequest,
    UpdateProjectRequest,
    ListProjectResponse,
    GetProjectResponse
);
entity_messages!(
    Stack,
    CreateStackRequest,
    UpdateStackRequest,
    ListStackResponse,
    GetStackResponse
);
entity_messages!(
    Role,
    CreateRoleRequest,
    UpdateRoleRequest,
    ListRoleResponse,
    GetRoleResponse
);
entity_messages!(
    VirtualMachine,
    CreateVirtualMachineRequest,
    UpdateVirtualMachineRequest,
    ListVirtualMachineResponse,
    GetVirtualMachineResponse
);

impl Reply for MutationResponse {
    fn stamp(&mut self, api: &str, success: bool, error: String) {
        self.api = api.to_string();
        self.success = success;
        self.error = error;
    }
}

impl KeyedRequest for ListRequest {
    fn key(&self) -> crate::store::Filter {
        crate::store::Filter::new()
            .name(&self.name)
            .project(&self.project)
            .stack(&self.stack)
            .role(&self.role)
            .hostname(&self.hostname)
    }
}

impl KeyedRequest for KeyRequest {
    fn key(&self) -> crate::store::Filter {
        crate::store::Filter::new()
            .name(&self.name)
            .project(&self.project)
            .stack(&self.stack)
            .hostname(&self.hostname)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn test_json_defaults_missing_fields() {
        let req: CreateVirtualMachineRequest =
            serde_json::from_str(r#"{"item":{"hostname":"web01"}}"#).unwrap();
        assert_eq!(req.api, "");
        let vm = req.item.unwrap();
        assert_eq!(vm.hostname, "web01");
        assert_eq!(vm.project, "");
    }

    #[test]
    fn test_vm_field_tags_match_legacy_layout() {
        // hostname, project, role were fields 1..3 before stack existed.
        let vm = VirtualMachine {
            hostname: "web01".into(),
            project: "core".into(),
            role: "frontend".into(),
            stack: String::new(),
        };
        let bytes = vm.encode_to_vec();
        assert_eq!(bytes[0], 0x0a);
        let decoded = VirtualMachine::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded, vm);
    }

    #[test]
    fn test_list_request_filter_skips_empty_fields() {
        let req = ListRequest {
            project: "core".into(),
            role: "frontend".into(),
            ..Default::default()
        };
        let filter = req.key();
        assert_eq!(filter.project.as_deref(), Some("core"));
        assert_eq!(filter.role.as_deref(), Some("frontend"));
        assert!(filter.stack.is_none());
        assert!(filter.hostname.is_none());
    }

    #[test]
    fn test_list_request_filters_by_name() {
        let req = ListRequest {
            name: "frontend".into(),
            ..Default::default()
        };
        assert_eq!(req.key().name.as_deref(), Some("frontend"));
    }

    #[test]
    fn test_unknown_filter_key_rejected() {
        let err = serde_json::from_str::<ListRequest>(r#"{"nmae":"frontend"}"#).unwrap_err();
        assert!(err.to_string().contains("nmae"));
        assert!(serde_json::from_str::<KeyRequest>(r#"{"host":"web01"}"#).is_err());
    }

    #[test]
    fn test_stamp_sets_envelope() {
        let mut resp = GetProjectResponse::with_item(Project {
            name: "core".into(),
        });
        resp.stamp("v1", true, String::new());
        assert_eq!(resp.api, "v1");
        assert!(resp.success);
        assert_eq!(resp.item.unwrap().name, "core");
    }
}
