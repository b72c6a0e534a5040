use serde::{Deserialize, Serialize};

use crate::db_types::Role;

/// The verified identity behind a request. Built once by the policy layer, then passed down explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: i64,
    pub role: Role,
}

impl Actor {
    pub fn new(id: i64, role: Role) -> Self {
        Self { id, role }
    }

    pub fn customer(id: i64) -> Self {
        Self::new(id, Role::Customer)
    }

    pub fn merchant(id: i64) -> Self {
        Self::new(id, Role::Merchant)
    }

    pub fn driver(id: i64) -> Self {
        Self::new(id, Role::Driver)
    }

    pub fn admin(id: i64) -> Self {
        Self::new(id, Role::Admin)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn has_role(&self, roles: &[Role]) -> bool {
        roles.contains(&self.role)
    }
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} #{}", self.role, self.id)
    }
}
