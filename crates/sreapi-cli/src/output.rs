//! One-line renderings of wire records.

use sreapi_core::wire::{Project, Role, Stack, VirtualMachine};

/// A record printed as a single tab-separated line.
pub trait Line {
    fn line(&self) -> String;
}

impl Line for Project {
    fn line(&self) -> String {
        self.name.clone()
    }
}

impl Line for Stack {
    fn line(&self) -> String {
        format!("{}\tproject={}", self.name, self.project)
    }
}

impl Line for Role {
    fn line(&self) -> String {
        let mut line = format!(
            "{}\tproject={}\tstack={}",
            self.name, self.project, self.stack
        );
        if !self.parent_role.is_empty() {
            line.push_str("\tparent=");
            line.push_str(&self.parent_role);
        }
        line
    }
}

impl Line for VirtualMachine {
    fn line(&self) -> String {
        format!(
            "{}\tproject={}\tstack={}\trole={}",
            self.hostname, self.project, self.stack, self.role
        )
    }
}

pub fn print_all<W: Line>(items: &[W]) {
    for item in items {
        println!("{}", item.line());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vm_line() {
        let vm = VirtualMachine {
            hostname: "web01".into(),
            project: "core".into(),
            role: "frontend".into(),
            stack: "web".into(),
        };
        assert_eq!(vm.line(), "web01\tproject=core\tstack=web\trole=frontend");
    }

    #[test]
    fn test_role_line_shows_parent_only_when_set() {
        let mut role = Role {
            name: "frontend".into(),
            stack: "web".into(),
            project: "core".into(),
            parent_role: String::new(),
        };
        assert_eq!(role.line(), "frontend\tproject=core\tstack=web");

        role.parent_role = "base".into();
        assert!(role.line().ends_with("\tparent=base"));
    }
}
