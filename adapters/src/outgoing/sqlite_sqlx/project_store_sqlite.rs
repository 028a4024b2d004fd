use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::instrument;

use domain::coords::{Rect, TileCoord};
use domain::person::PersonId;
use domain::project::{Project, ProjectId, ProjectState, ProjectStats, Streak};
use pixel_hawk_application::error::{AppError, AppResult};
use pixel_hawk_application::ports::outgoing::project_store::{DiffCommit, ProjectStorePort};

use super::utils::{SqliteExecutor, begin_transaction, commit_transaction};

pub struct SqliteProjectStoreAdapter {
    pool: SqlitePool,
    executor: SqliteExecutor,
}

impl SqliteProjectStoreAdapter {
    #[must_use]
    pub fn new(pool: SqlitePool, query_timeout_secs: u64) -> Self {
        Self {
            pool,
            executor: SqliteExecutor::new(query_timeout_secs),
        }
    }
}

fn column_error(column: &str, error: impl std::fmt::Display) -> AppError {
    AppError::Store {
        message: format!("Corrupt project row, column {column}: {error}"),
    }
}

fn project_from_row(row: &SqliteRow) -> AppResult<Project> {
    let int = |column: &str| -> AppResult<i64> {
        row.try_get(column).map_err(|e| column_error(column, e))
    };
    let dim = |column: &str| -> AppResult<u32> {
        u32::try_from(int(column)?).map_err(|e| column_error(column, e))
    };

    Ok(Project {
        id: ProjectId::new(int("id")?),
        owner: PersonId::new(int("person_id")?),
        name: row.try_get("name").map_err(|e| column_error("name", e))?,
        state: ProjectState::from_i64(int("state")?)?,
        rect: Rect::new(dim("x")?, dim("y")?, dim("w")?, dim("h")?)?,
        stats: ProjectStats {
            max_completion_percent: row
                .try_get("max_completion_percent")
                .map_err(|e| column_error("max_completion_percent", e))?,
            total_progress: int("total_progress")?,
            total_regress: int("total_regress")?,
            largest_regress_pixels: int("largest_regress_pixels")?,
            largest_regress_at: row
                .try_get("largest_regress_at")
                .map_err(|e| column_error("largest_regress_at", e))?,
            streak: Streak::from_i64(int("streak")?)?,
            first_seen: int("first_seen")?,
            last_log_message: row
                .try_get("last_log_message")
                .map_err(|e| column_error("last_log_message", e))?,
        },
    })
}

const PROJECT_SELECT: &str = "SELECT id, person_id, name, state, x, y, w, h, \
     max_completion_percent, total_progress, total_regress, largest_regress_pixels, \
     largest_regress_at, streak, first_seen, last_log_message FROM project";

#[async_trait::async_trait]
impl ProjectStorePort for SqliteProjectStoreAdapter {
    #[instrument(skip(self))]
    async fn get_project(&self, id: ProjectId) -> AppResult<Option<Project>> {
        let sql = format!("{PROJECT_SELECT} WHERE id = ?");
        let row = self
            .executor
            .execute_with_timeout(
                || sqlx::query(&sql).bind(id.as_i64()).fetch_optional(&self.pool),
                &format!("Failed to get project {id}"),
            )
            .await?;
        row.as_ref().map(project_from_row).transpose()
    }

    #[instrument(skip(self))]
    async fn lookup_overlapping_projects(&self, tile: TileCoord) -> AppResult<Vec<Project>> {
        let sql = format!(
            "{PROJECT_SELECT} WHERE state != ? AND id IN \
             (SELECT project_id FROM tile_project WHERE tile_id = ?) \
             ORDER BY first_seen ASC, id ASC"
        );
        let rows = self
            .executor
            .execute_with_timeout(
                || {
                    sqlx::query(&sql)
                        .bind(ProjectState::Inactive.as_i64())
                        .bind(tile.tile_id())
                        .fetch_all(&self.pool)
                },
                &format!("Failed to look up projects on tile {tile}"),
            )
            .await?;
        rows.iter().map(project_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn recent_deltas(&self, id: ProjectId, limit: u32) -> AppResult<Vec<(i64, i64)>> {
        let rows = self
            .executor
            .execute_with_timeout(
                || {
                    sqlx::query(
                        "SELECT delta_progress, delta_regress FROM history_change \
                         WHERE project_id = ? ORDER BY created_at DESC, id DESC LIMIT ?",
                    )
                    .bind(id.as_i64())
                    .bind(i64::from(limit))
                    .fetch_all(&self.pool)
                },
                &format!("Failed to read recent history of project {id}"),
            )
            .await?;
        rows.iter()
            .map(|row| {
                let progress: i64 = row
                    .try_get("delta_progress")
                    .map_err(|e| column_error("delta_progress", e))?;
                let regress: i64 = row
                    .try_get("delta_regress")
                    .map_err(|e| column_error("delta_regress", e))?;
                Ok((progress, regress))
            })
            .collect()
    }

    /// Stats accumulation and the history append commit together or not
    /// at all. All expressions read the pre-update row, so
    /// `largest_regress_at` can compare against the old maximum.
    #[instrument(skip(self, commit), fields(project = %commit.change.project_id))]
    async fn commit_diff(&self, commit: &DiffCommit) -> AppResult<()> {
        let change = &commit.change;
        let mut tx = begin_transaction(&self.pool).await?;

        let updated = sqlx::query(
            "UPDATE project SET \
                 total_progress = total_progress + ?1, \
                 total_regress = total_regress + ?2, \
                 max_completion_percent = MAX(max_completion_percent, ?3), \
                 largest_regress_at = CASE \
                     WHEN ?2 > largest_regress_pixels THEN ?4 \
                     ELSE largest_regress_at END, \
                 largest_regress_pixels = MAX(largest_regress_pixels, ?2), \
                 streak = ?5, \
                 last_log_message = ?6 \
             WHERE id = ?7",
        )
        .bind(change.delta_progress)
        .bind(change.delta_regress)
        .bind(change.completion_percent)
        .bind(change.created_at)
        .bind(commit.streak.as_i64())
        .bind(&commit.last_log_message)
        .bind(change.project_id.as_i64())
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Store {
            message: format!("Failed to update stats of project {}: {e}", change.project_id),
        })?;

        if updated.rows_affected() != 1 {
            return Err(AppError::Store {
                message: format!("Project {} vanished mid-commit", change.project_id),
            });
        }

        sqlx::query(
            "INSERT INTO history_change \
                 (project_id, created_at, status, pixels_remaining, completion_percent, \
                  delta_progress, delta_regress) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(change.project_id.as_i64())
        .bind(change.created_at)
        .bind(change.status.as_i64())
        .bind(change.pixels_remaining)
        .bind(change.completion_percent)
        .bind(change.delta_progress)
        .bind(change.delta_regress)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Store {
            message: format!(
                "Failed to append history for project {}: {e}",
                change.project_id
            ),
        })?;

        commit_transaction(tx).await
    }
}
