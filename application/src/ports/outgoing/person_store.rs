use crate::error::AppResult;
use domain::person::{Person, PersonId};
use std::sync::Arc;

#[async_trait::async_trait]
pub trait PersonStorePort: Send + Sync {
    async fn get_person(&self, id: PersonId) -> AppResult<Option<Person>>;

    async fn list_persons(&self) -> AppResult<Vec<Person>>;

    /// Refresh the cached `watched_tiles_count` and `active_projects_count`
    /// from the project and junction tables.
    async fn recompute_person_totals(&self, id: PersonId) -> AppResult<()>;
}

pub type DynPersonStorePort = Arc<dyn PersonStorePort>;
