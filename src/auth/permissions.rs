//! Role gates for the supplemented services
//!
//! Each protected operation names the roles allowed to invoke it. Unknown
//! operations are blocked.

use std::str::FromStr;

use crate::db::schemas::{Labelled, Role};
use crate::types::AgroError;

impl FromStr for Role {
    type Err = AgroError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::from_label(s).ok_or_else(|| {
            AgroError::Validation(format!(
                "Rol inválido '{}'. Valores aceptados: {}.",
                s,
                Role::accepted()
            ))
        })
    }
}

const ADMIN: &[Role] = &[Role::Administrator];
const ADMIN_SUPERVISOR: &[Role] = &[Role::Administrator, Role::Supervisor];
const ANY: &[Role] = &[Role::Administrator, Role::Supervisor, Role::Farmer];

/// Roles allowed to run `operation`; `None` for unknown operations
pub fn required_roles(operation: &str) -> Option<&'static [Role]> {
    match operation {
        "user.create" | "user.list" | "user.deactivate" => Some(ADMIN),
        // Non-admins may still read or edit their own account
        "user.get" | "user.update" => Some(ADMIN),

        "supply.list" | "supply.get" => Some(ANY),
        "supply.create" | "supply.update" | "supply.delete" => Some(ADMIN),

        "activity.create" | "activity.list" | "activity.get" | "activity.update" => {
            Some(ADMIN_SUPERVISOR)
        }
        "activity.delete" => Some(ADMIN),

        _ => None,
    }
}

/// Check if an operation is allowed for the given role
pub fn is_operation_allowed(operation: &str, role: Role) -> bool {
    match required_roles(operation) {
        Some(roles) => roles.contains(&role),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parses_from_label() {
        assert_eq!("Agricultor".parse::<Role>().unwrap(), Role::Farmer);
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn test_farmer_cannot_manage_supplies() {
        assert!(is_operation_allowed("supply.list", Role::Farmer));
        assert!(!is_operation_allowed("supply.create", Role::Farmer));
        assert!(is_operation_allowed("supply.create", Role::Administrator));
    }

    #[test]
    fn test_activity_gates() {
        assert!(is_operation_allowed("activity.update", Role::Supervisor));
        assert!(!is_operation_allowed("activity.delete", Role::Supervisor));
        assert!(!is_operation_allowed("activity.list", Role::Farmer));
    }

    #[test]
    fn test_unknown_operations_blocked() {
        assert!(!is_operation_allowed("crop.purge", Role::Administrator));
    }
}
