use serde::{Deserialize, Serialize};

use crate::{
    error::{CoreError, CoreResult},
    model::Role,
};

/// Who a resource is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    #[default]
    Everyone,
    StudentsAndAdmins,
    AlumniAndAdmins,
}

impl Audience {
    pub fn admits(&self, role: Role) -> bool {
        match (self, role) {
            (_, Role::Admin) => true,
            (Audience::Everyone, _) => true,
            (Audience::StudentsAndAdmins, Role::Student) => true,
            (Audience::AlumniAndAdmins, Role::Alumni) => true,
            _ => false,
        }
    }
}

/// Post visibility.
pub fn can_view(role: Role, audience: Audience) -> bool {
    audience.admits(role)
}

pub(crate) fn require(role: Role, audience: Audience, action: &str) -> CoreResult<()> {
    if audience.admits(role) {
        Ok(())
    } else {
        Err(CoreError::unauthorized(format!("{role} profiles cannot {action}")))
    }
}
