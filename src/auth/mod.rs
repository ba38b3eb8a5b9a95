//! Authentication and authorization for the account-bound services
//!
//! Provides:
//! - HTTP Basic credential decoding
//! - Password hashing with Argon2 and the complexity rule
//! - Role gates per operation
//!
//! The crop family is unauthenticated and never touches this module.

pub mod basic;
pub mod password;
pub mod permissions;

pub use basic::{parse_basic_header, BasicCredentials};
pub use password::{check_password_strength, hash_password, verify_password};
pub use permissions::{is_operation_allowed, required_roles};

use bson::oid::ObjectId;
use tracing::warn;

use crate::db::schemas::Role;
use crate::types::{AgroError, Result};

/// Identity established for one request
#[derive(Debug, Clone, PartialEq)]
pub struct Principal {
    pub id: ObjectId,
    pub nombre: String,
    pub rol: Role,
}

impl Principal {
    /// Fail with [`AgroError::Forbidden`] unless the role may run `operation`
    pub fn authorize(&self, operation: &str) -> Result<()> {
        if is_operation_allowed(operation, self.rol) {
            return Ok(());
        }
        warn!("Role {} denied for {} (user {})", self.rol, operation, self.id);
        Err(AgroError::Forbidden(format!(
            "El rol '{}' no tiene permiso para esta operación.",
            self.rol
        )))
    }

    /// Admins may act on anyone; other roles only on themselves
    pub fn authorize_self_or(&self, operation: &str, target: ObjectId) -> Result<()> {
        if self.id == target {
            return Ok(());
        }
        self.authorize(operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(rol: Role) -> Principal {
        Principal {
            id: ObjectId::new(),
            nombre: "Ana".into(),
            rol,
        }
    }

    #[test]
    fn test_authorize_maps_to_forbidden() {
        let farmer = principal(Role::Farmer);
        assert!(matches!(
            farmer.authorize("supply.create"),
            Err(AgroError::Forbidden(_))
        ));
        assert!(farmer.authorize("supply.list").is_ok());
    }

    #[test]
    fn test_self_access() {
        let farmer = principal(Role::Farmer);
        assert!(farmer.authorize_self_or("user.update", farmer.id).is_ok());
        assert!(farmer.authorize_self_or("user.update", ObjectId::new()).is_err());
    }
}
