use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::instrument;

use domain::person::{Person, PersonId};
use domain::project::ProjectState;
use pixel_hawk_application::error::{AppError, AppResult};
use pixel_hawk_application::ports::outgoing::person_store::PersonStorePort;

use super::utils::SqliteExecutor;

pub struct SqlitePersonStoreAdapter {
    pool: SqlitePool,
    executor: SqliteExecutor,
}

impl SqlitePersonStoreAdapter {
    #[must_use]
    pub fn new(pool: SqlitePool, query_timeout_secs: u64) -> Self {
        Self {
            pool,
            executor: SqliteExecutor::new(query_timeout_secs),
        }
    }
}

fn person_from_row(row: &SqliteRow) -> AppResult<Person> {
    let get = |column: &str| -> AppResult<i64> {
        row.try_get(column).map_err(|e| AppError::Store {
            message: format!("Corrupt person row, column {column}: {e}"),
        })
    };
    Ok(Person {
        id: PersonId::new(get("id")?),
        name: row.try_get("name").map_err(|e| AppError::Store {
            message: format!("Corrupt person row, column name: {e}"),
        })?,
        chat_handle: row.try_get("chat_handle").map_err(|e| AppError::Store {
            message: format!("Corrupt person row, column chat_handle: {e}"),
        })?,
        access_mask: get("access_mask")?,
        watched_tiles_count: get("watched_tiles_count")?,
        active_projects_count: get("active_projects_count")?,
    })
}

#[async_trait::async_trait]
impl PersonStorePort for SqlitePersonStoreAdapter {
    #[instrument(skip(self))]
    async fn get_person(&self, id: PersonId) -> AppResult<Option<Person>> {
        let row = self
            .executor
            .execute_with_timeout(
                || {
                    sqlx::query(
                        "SELECT id, name, chat_handle, access_mask, watched_tiles_count, \
                                active_projects_count \
                         FROM person WHERE id = ?",
                    )
                    .bind(id.as_i64())
                    .fetch_optional(&self.pool)
                },
                &format!("Failed to get person {id}"),
            )
            .await?;
        row.as_ref().map(person_from_row).transpose()
    }

    #[instrument(skip(self))]
    async fn list_persons(&self) -> AppResult<Vec<Person>> {
        let rows = self
            .executor
            .execute_with_timeout(
                || {
                    sqlx::query(
                        "SELECT id, name, chat_handle, access_mask, watched_tiles_count, \
                                active_projects_count \
                         FROM person ORDER BY id",
                    )
                    .fetch_all(&self.pool)
                },
                "Failed to list persons",
            )
            .await?;
        rows.iter().map(person_from_row).collect()
    }

    /// Both cached counts in one statement: `active_projects_count` from
    /// the project table, `watched_tiles_count` as the distinct tiles of
    /// this person's ACTIVE projects.
    #[instrument(skip(self))]
    async fn recompute_person_totals(&self, id: PersonId) -> AppResult<()> {
        self.executor
            .execute_with_timeout(
                || {
                    sqlx::query(
                        "UPDATE person SET \
                             active_projects_count = ( \
                                 SELECT COUNT(*) FROM project p \
                                 WHERE p.person_id = person.id AND p.state = ?1), \
                             watched_tiles_count = ( \
                                 SELECT COUNT(DISTINCT tp.tile_id) FROM tile_project tp \
                                 JOIN project p ON p.id = tp.project_id \
                                 WHERE p.person_id = person.id AND p.state = ?1) \
                         WHERE person.id = ?2",
                    )
                    .bind(ProjectState::Active.as_i64())
                    .bind(id.as_i64())
                    .execute(&self.pool)
                },
                &format!("Failed to recompute totals of person {id}"),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::indexing_slicing)]

    use super::*;
    use crate::outgoing::sqlite_sqlx::pool::open_in_memory;
    use domain::coords::TileCoord;

    async fn seed(pool: &SqlitePool) {
        sqlx::query(
            "INSERT INTO person (id, name, chat_handle, access_mask) \
             VALUES (1, 'liz', '@liz', 3), (2, 'ada', NULL, 0)",
        )
        .execute(pool)
        .await
        .unwrap();
        // liz: one ACTIVE project on two tiles, one PASSIVE on a third
        for (id, state) in [(10, ProjectState::Active), (20, ProjectState::Passive)] {
            sqlx::query(
                "INSERT INTO project (id, person_id, name, state, x, y, w, h, first_seen) \
                 VALUES (?, 1, ?, ?, 0, 0, 10, 10, 1000)",
            )
            .bind(id)
            .bind(format!("p{id}"))
            .bind(state.as_i64())
            .execute(pool)
            .await
            .unwrap();
        }
        for (tile, project) in [
            (TileCoord::new(0, 0), 10),
            (TileCoord::new(1, 0), 10),
            (TileCoord::new(2, 0), 20),
        ] {
            sqlx::query("INSERT OR IGNORE INTO tile (id, x, y) VALUES (?, ?, ?)")
                .bind(tile.tile_id())
                .bind(i64::from(tile.x))
                .bind(i64::from(tile.y))
                .execute(pool)
                .await
                .unwrap();
            sqlx::query("INSERT INTO tile_project (tile_id, project_id) VALUES (?, ?)")
                .bind(tile.tile_id())
                .bind(project)
                .execute(pool)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn get_and_list_round_trip() {
        let pool = open_in_memory().await.unwrap();
        seed(&pool).await;
        let store = SqlitePersonStoreAdapter::new(pool, 5);

        let liz = store.get_person(PersonId::new(1)).await.unwrap().unwrap();
        assert_eq!(liz.name, "liz");
        assert_eq!(liz.chat_handle.as_deref(), Some("@liz"));
        assert_eq!(liz.access_mask, 3);

        let all = store.list_persons().await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[1].chat_handle.is_none());

        assert!(store.get_person(PersonId::new(9)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn recompute_counts_only_active_projects() {
        let pool = open_in_memory().await.unwrap();
        seed(&pool).await;
        let store = SqlitePersonStoreAdapter::new(pool, 5);

        store.recompute_person_totals(PersonId::new(1)).await.unwrap();
        let liz = store.get_person(PersonId::new(1)).await.unwrap().unwrap();
        // the PASSIVE project contributes to neither count
        assert_eq!(liz.active_projects_count, 1);
        assert_eq!(liz.watched_tiles_count, 2);

        store.recompute_person_totals(PersonId::new(2)).await.unwrap();
        let ada = store.get_person(PersonId::new(2)).await.unwrap().unwrap();
        assert_eq!(ada.active_projects_count, 0);
        assert_eq!(ada.watched_tiles_count, 0);
    }
}
