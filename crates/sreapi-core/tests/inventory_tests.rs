//! Integration tests for the Inventory public interface.
//!
//! These run the handlers against an on-disk SQLite database and check the
//! behaviour callers rely on: round trips, filter composition, delete
//! idempotence and the not-found contract.

use sreapi_core::wire::{Project, Role, Stack, VirtualMachine};
use sreapi_core::{
    Filter, Inventory, InventoryError, ProjectRecord, RequestContext, RoleRecord, SqliteGateway,
    StackRecord, VirtualMachineRecord,
};
use std::time::Duration;
use tempfile::TempDir;

fn ctx() -> RequestContext {
    RequestContext::with_timeout(Duration::from_secs(5))
}

fn create_test_inventory() -> (Inventory<SqliteGateway>, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let gateway = SqliteGateway::open(temp_dir.path().join("inventory.db")).unwrap();
    (Inventory::new(gateway), temp_dir)
}

fn vm(hostname: &str, project: &str, role: &str) -> VirtualMachine {
    VirtualMachine {
        hostname: hostname.into(),
        project: project.into(),
        role: role.into(),
        stack: String::new(),
    }
}

fn hostnames(items: &[VirtualMachine]) -> Vec<&str> {
    items.iter().map(|vm| vm.hostname.as_str()).collect()
}

#[test]
fn test_create_then_get_vm() {
    let (inventory, _temp) = create_test_inventory();
    inventory
        .create::<VirtualMachineRecord>(&ctx(), &vm("web01", "core", "frontend"))
        .unwrap();

    let fetched = inventory
        .get::<VirtualMachineRecord>(&ctx(), &Filter::new().hostname("web01"))
        .unwrap();
    assert_eq!(fetched.hostname, "web01");
    assert_eq!(fetched.project, "core");
    assert_eq!(fetched.role, "frontend");
}

#[test]
fn test_list_by_project_and_role_keeps_insertion_order() {
    let (inventory, _temp) = create_test_inventory();
    for item in [
        vm("web02", "core", "frontend"),
        vm("db01", "core", "database"),
        vm("web01", "core", "frontend"),
    ] {
        inventory
            .create::<VirtualMachineRecord>(&ctx(), &item)
            .unwrap();
    }

    let items = inventory
        .list::<VirtualMachineRecord>(&ctx(), &Filter::new().project("core").role("frontend"))
        .unwrap();
    assert_eq!(hostnames(&items), vec!["web02", "web01"]);
}

#[test]
fn test_filter_composition_is_subset_and_intersection() {
    let (inventory, _temp) = create_test_inventory();
    for item in [
        vm("web01", "core", "frontend"),
        vm("web02", "edge", "frontend"),
        vm("db01", "core", "database"),
        vm("db02", "edge", "database"),
    ] {
        inventory
            .create::<VirtualMachineRecord>(&ctx(), &item)
            .unwrap();
    }

    let all = inventory
        .list::<VirtualMachineRecord>(&ctx(), &Filter::new())
        .unwrap();
    let core = inventory
        .list::<VirtualMachineRecord>(&ctx(), &Filter::new().project("core"))
        .unwrap();
    let expected: Vec<VirtualMachine> = all
        .iter()
        .filter(|vm| vm.project == "core")
        .cloned()
        .collect();
    assert_eq!(core, expected);

    let frontend = inventory
        .list::<VirtualMachineRecord>(&ctx(), &Filter::new().role("frontend"))
        .unwrap();
    let both = inventory
        .list::<VirtualMachineRecord>(&ctx(), &Filter::new().project("core").role("frontend"))
        .unwrap();
    let intersection: Vec<VirtualMachine> = core
        .iter()
        .filter(|vm| frontend.contains(vm))
        .cloned()
        .collect();
    assert_eq!(both, intersection);
    assert_eq!(hostnames(&both), vec!["web01"]);
}

#[test]
fn test_rename_moves_the_key() {
    let (inventory, _temp) = create_test_inventory();
    inventory
        .create::<VirtualMachineRecord>(&ctx(), &vm("web01", "core", "frontend"))
        .unwrap();

    inventory
        .update::<VirtualMachineRecord>(
            &ctx(),
            &Filter::new().hostname("web01"),
            &vm("web02", "core", "frontend"),
        )
        .unwrap();

    let old = inventory.get::<VirtualMachineRecord>(&ctx(), &Filter::new().hostname("web01"));
    assert!(matches!(old, Err(InventoryError::NotFound { .. })));

    let new = inventory
        .get::<VirtualMachineRecord>(&ctx(), &Filter::new().hostname("web02"))
        .unwrap();
    assert_eq!(new, vm("web02", "core", "frontend"));
}

#[test]
fn test_delete_twice_is_idempotent() {
    let (inventory, _temp) = create_test_inventory();
    inventory
        .create::<VirtualMachineRecord>(&ctx(), &vm("web01", "core", "frontend"))
        .unwrap();
    inventory
        .create::<VirtualMachineRecord>(&ctx(), &vm("web02", "core", "frontend"))
        .unwrap();

    let key = Filter::new().hostname("web01");
    assert_eq!(
        inventory
            .delete::<VirtualMachineRecord>(&ctx(), &key)
            .unwrap(),
        1
    );
    let after_first = inventory
        .list::<VirtualMachineRecord>(&ctx(), &Filter::new())
        .unwrap();

    assert_eq!(
        inventory
            .delete::<VirtualMachineRecord>(&ctx(), &key)
            .unwrap(),
        0
    );
    let after_second = inventory
        .list::<VirtualMachineRecord>(&ctx(), &Filter::new())
        .unwrap();
    assert_eq!(after_first, after_second);
    assert_eq!(hostnames(&after_second), vec!["web02"]);
}

#[test]
fn test_get_missing_is_not_found_for_every_kind() {
    let (inventory, _temp) = create_test_inventory();
    let key = Filter::new().name("ghost");

    assert!(matches!(
        inventory.get::<ProjectRecord>(&ctx(), &key),
        Err(InventoryError::NotFound { .. })
    ));
    assert!(matches!(
        inventory.get::<StackRecord>(&ctx(), &key),
        Err(InventoryError::NotFound { .. })
    ));
    assert!(matches!(
        inventory.get::<RoleRecord>(&ctx(), &key),
        Err(InventoryError::NotFound { .. })
    ));
    assert!(matches!(
        inventory.get::<VirtualMachineRecord>(&ctx(), &Filter::new().hostname("ghost")),
        Err(InventoryError::NotFound { .. })
    ));
}

#[test]
fn test_duplicate_create_conflicts() {
    let (inventory, _temp) = create_test_inventory();
    let project = Project {
        name: "core".into(),
    };
    inventory
        .create::<ProjectRecord>(&ctx(), &project)
        .unwrap();
    let err = inventory
        .create::<ProjectRecord>(&ctx(), &project)
        .unwrap_err();
    assert!(matches!(err, InventoryError::Conflict { .. }));
    assert_eq!(err.public_message(), "project already exists: core");
}

#[test]
fn test_same_stack_name_in_two_projects() {
    let (inventory, _temp) = create_test_inventory();
    for project in ["core", "edge"] {
        inventory
            .create::<StackRecord>(
                &ctx(),
                &Stack {
                    name: "web".into(),
                    project: project.into(),
                },
            )
            .unwrap();
    }

    let edge = inventory
        .get::<StackRecord>(&ctx(), &Filter::new().name("web").project("edge"))
        .unwrap();
    assert_eq!(edge.project, "edge");

    let stacks = inventory
        .list::<StackRecord>(&ctx(), &Filter::new().name("web"))
        .unwrap();
    assert_eq!(stacks.len(), 2);
}

#[test]
fn test_full_hierarchy_round_trip() {
    let (inventory, _temp) = create_test_inventory();
    let ctx = ctx();

    inventory
        .create::<ProjectRecord>(&ctx, &Project { name: "core".into() })
        .unwrap();
    inventory
        .create::<StackRecord>(
            &ctx,
            &Stack {
                name: "web".into(),
                project: "core".into(),
            },
        )
        .unwrap();
    let role = Role {
        name: "frontend".into(),
        stack: "web".into(),
        project: "core".into(),
        parent_role: String::new(),
    };
    assert_eq!(
        inventory.create::<RoleRecord>(&ctx, &role).unwrap(),
        role
    );

    let stored = inventory
        .create::<VirtualMachineRecord>(&ctx, &vm("web01", "core", "frontend"))
        .unwrap();
    assert_eq!(stored.stack, "web");

    let by_stack = inventory
        .list::<VirtualMachineRecord>(&ctx, &Filter::new().stack("web"))
        .unwrap();
    assert_eq!(hostnames(&by_stack), vec!["web01"]);
}

#[test]
fn test_expired_deadline_is_reported() {
    let (inventory, _temp) = create_test_inventory();
    let ctx = RequestContext::with_timeout(Duration::ZERO);
    std::thread::sleep(Duration::from_millis(5));

    let err = inventory
        .list::<ProjectRecord>(&ctx, &Filter::new())
        .unwrap_err();
    assert!(matches!(err, InventoryError::DeadlineExceeded));
}
