use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    access::Audience,
    error::{CoreError, CoreResult},
    model::Profile,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProfileFilter {
    pub audience: Audience,
}

impl ProfileFilter {
    pub fn audience(audience: Audience) -> Self {
        Self { audience }
    }
}

/// Read-only view of user profiles. Nothing in this crate writes profiles.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn get_profile(&self, id: Uuid) -> CoreResult<Option<Profile>>;

    async fn list_profiles(&self, filter: ProfileFilter) -> CoreResult<Vec<Profile>>;
}

pub(crate) async fn require_profile(directory: &dyn Directory, id: Uuid) -> CoreResult<Profile> {
    directory
        .get_profile(id)
        .await?
        .ok_or(CoreError::not_found("profile", id))
}

#[derive(Debug, Clone)]
pub struct SqliteDirectory {
    db_pool: SqlitePool,
}

impl SqliteDirectory {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl Directory for SqliteDirectory {
    async fn get_profile(&self, id: Uuid) -> CoreResult<Option<Profile>> {
        Ok(
            sqlx::query_as("SELECT id,role,display_name FROM profiles WHERE id=?")
                .bind(id.to_string())
                .fetch_optional(&self.db_pool)
                .await?,
        )
    }

    async fn list_profiles(&self, filter: ProfileFilter) -> CoreResult<Vec<Profile>> {
        let profiles: Vec<Profile> =
            sqlx::query_as("SELECT id,role,display_name FROM profiles ORDER BY display_name, id")
                .fetch_all(&self.db_pool)
                .await?;

        Ok(profiles
            .into_iter()
            .filter(|profile| filter.audience.admits(profile.role))
            .collect())
    }
}
