use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::instrument;

use domain::coords::TileCoord;
use domain::project::{ProjectId, ProjectState};
use domain::tile::{Heat, TileRecord};
use pixel_hawk_application::error::{AppError, AppResult};
use pixel_hawk_application::ports::outgoing::tile_store::TileStorePort;

use super::utils::{SqliteExecutor, begin_transaction, commit_transaction};

pub struct SqliteTileStoreAdapter {
    pool: SqlitePool,
    executor: SqliteExecutor,
}

impl SqliteTileStoreAdapter {
    #[must_use]
    pub fn new(pool: SqlitePool, query_timeout_secs: u64) -> Self {
        Self {
            pool,
            executor: SqliteExecutor::new(query_timeout_secs),
        }
    }
}

fn tile_from_row(row: &SqliteRow) -> AppResult<TileRecord> {
    let read = |column: &str| -> AppResult<i64> {
        row.try_get(column).map_err(|e| AppError::Store {
            message: format!("Corrupt tile row, column {column}: {e}"),
        })
    };
    let x = u32::try_from(read("x")?).map_err(|e| AppError::Store {
        message: format!("Corrupt tile row, column x: {e}"),
    })?;
    let y = u32::try_from(read("y")?).map_err(|e| AppError::Store {
        message: format!("Corrupt tile row, column y: {e}"),
    })?;
    let heat = u16::try_from(read("heat")?).map_err(|e| AppError::Store {
        message: format!("Corrupt tile row, column heat: {e}"),
    })?;
    Ok(TileRecord {
        coord: TileCoord::new(x, y),
        heat: Heat(heat),
        last_checked: read("last_checked")?,
        last_update: read("last_update")?,
        etag: row.try_get("etag").map_err(|e| AppError::Store {
            message: format!("Corrupt tile row, column etag: {e}"),
        })?,
    })
}

#[async_trait::async_trait]
impl TileStorePort for SqliteTileStoreAdapter {
    #[instrument(skip(self))]
    async fn get_tile(&self, id: i64) -> AppResult<Option<TileRecord>> {
        let row = self
            .executor
            .execute_with_timeout(
                || {
                    sqlx::query(
                        "SELECT id, x, y, heat, last_checked, last_update, etag \
                         FROM tile WHERE id = ?",
                    )
                    .bind(id)
                    .fetch_optional(&self.pool)
                },
                &format!("Failed to get tile {id}"),
            )
            .await?;
        row.as_ref().map(tile_from_row).transpose()
    }

    #[instrument(skip(self, record), fields(tile = %record.coord))]
    async fn upsert_tile(&self, record: &TileRecord) -> AppResult<()> {
        self.executor
            .execute_with_timeout(
                || {
                    sqlx::query(
                        r"
                        INSERT INTO tile (id, x, y, heat, last_checked, last_update, etag)
                        VALUES (?, ?, ?, ?, ?, ?, ?)
                        ON CONFLICT (id) DO UPDATE SET
                            heat = excluded.heat,
                            last_checked = excluded.last_checked,
                            last_update = excluded.last_update,
                            etag = excluded.etag
                        ",
                    )
                    .bind(record.id())
                    .bind(i64::from(record.coord.x))
                    .bind(i64::from(record.coord.y))
                    .bind(record.heat.as_i64())
                    .bind(record.last_checked)
                    .bind(record.last_update)
                    .bind(&record.etag)
                    .execute(&self.pool)
                },
                &format!("Failed to upsert tile {}", record.coord),
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn touch_checked(&self, id: i64, checked_at: i64) -> AppResult<()> {
        self.executor
            .execute_with_timeout(
                || {
                    sqlx::query("UPDATE tile SET last_checked = ? WHERE id = ?")
                        .bind(checked_at)
                        .bind(id)
                        .execute(&self.pool)
                },
                &format!("Failed to touch tile {id}"),
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn set_tile_heat(&self, id: i64, heat: Heat) -> AppResult<()> {
        self.executor
            .execute_with_timeout(
                || {
                    sqlx::query("UPDATE tile SET heat = ? WHERE id = ?")
                        .bind(heat.as_i64())
                        .bind(id)
                        .execute(&self.pool)
                },
                &format!("Failed to set heat of tile {id}"),
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self, updates), fields(updates = updates.len()))]
    async fn apply_heat_updates(&self, updates: &[(i64, Heat)]) -> AppResult<()> {
        let mut tx = begin_transaction(&self.pool).await?;
        for &(id, heat) in updates {
            sqlx::query("UPDATE tile SET heat = ? WHERE id = ?")
                .bind(heat.as_i64())
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::Store {
                    message: format!("Failed to move tile {id} to {heat}: {e}"),
                })?;
        }
        commit_transaction(tx).await
    }

    #[instrument(skip(self))]
    async fn occupied_buckets(&self) -> AppResult<Vec<Heat>> {
        let rows = self
            .executor
            .execute_with_timeout(
                || {
                    sqlx::query("SELECT DISTINCT heat FROM tile WHERE heat > 0 ORDER BY heat")
                        .fetch_all(&self.pool)
                },
                "Failed to list occupied buckets",
            )
            .await?;
        rows.iter()
            .map(|row| {
                let heat: i64 = row.try_get("heat").map_err(|e| AppError::Store {
                    message: format!("Corrupt heat value: {e}"),
                })?;
                u16::try_from(heat).map(Heat).map_err(|e| AppError::Store {
                    message: format!("Corrupt heat value: {e}"),
                })
            })
            .collect()
    }

    #[instrument(skip(self))]
    async fn bucket_counts(&self) -> AppResult<Vec<(Heat, i64)>> {
        let rows = self
            .executor
            .execute_with_timeout(
                || {
                    sqlx::query(
                        "SELECT heat, COUNT(*) AS tiles FROM tile WHERE heat > 0 \
                         GROUP BY heat ORDER BY heat",
                    )
                    .fetch_all(&self.pool)
                },
                "Failed to count bucket occupancy",
            )
            .await?;
        rows.iter()
            .map(|row| {
                let heat: i64 = row.try_get("heat").map_err(|e| AppError::Store {
                    message: format!("Corrupt heat value: {e}"),
                })?;
                let tiles: i64 = row.try_get("tiles").map_err(|e| AppError::Store {
                    message: format!("Corrupt count value: {e}"),
                })?;
                u16::try_from(heat)
                    .map(|h| (Heat(h), tiles))
                    .map_err(|e| AppError::Store {
                        message: format!("Corrupt heat value: {e}"),
                    })
            })
            .collect()
    }

    #[instrument(skip(self))]
    async fn select_burning(&self) -> AppResult<Option<TileRecord>> {
        let row = self
            .executor
            .execute_with_timeout(
                || {
                    sqlx::query(
                        "SELECT t.id AS id, t.x AS x, t.y AS y, t.heat AS heat, \
                                t.last_checked AS last_checked, t.last_update AS last_update, \
                                t.etag AS etag \
                         FROM tile t \
                         JOIN tile_project tp ON tp.tile_id = t.id \
                         JOIN project p ON p.id = tp.project_id \
                         WHERE t.heat = 999 AND p.state != ? \
                         ORDER BY p.first_seen ASC, t.id ASC \
                         LIMIT 1",
                    )
                    .bind(ProjectState::Inactive.as_i64())
                    .fetch_optional(&self.pool)
                },
                "Failed to select a burning tile",
            )
            .await?;
        row.as_ref().map(tile_from_row).transpose()
    }

    #[instrument(skip(self))]
    async fn select_in_bucket(&self, heat: Heat) -> AppResult<Option<TileRecord>> {
        let row = self
            .executor
            .execute_with_timeout(
                || {
                    sqlx::query(
                        "SELECT id, x, y, heat, last_checked, last_update, etag \
                         FROM tile WHERE heat = ? \
                         ORDER BY last_checked ASC, id ASC LIMIT 1",
                    )
                    .bind(heat.as_i64())
                    .fetch_optional(&self.pool)
                },
                &format!("Failed to select from {heat}"),
            )
            .await?;
        row.as_ref().map(tile_from_row).transpose()
    }

    #[instrument(skip(self))]
    async fn tiles_by_recency(&self) -> AppResult<Vec<TileRecord>> {
        let rows = self
            .executor
            .execute_with_timeout(
                || {
                    sqlx::query(
                        "SELECT id, x, y, heat, last_checked, last_update, etag \
                         FROM tile WHERE heat > 0 AND heat != 999 \
                         ORDER BY last_update DESC, id ASC",
                    )
                    .fetch_all(&self.pool)
                },
                "Failed to list tiles by recency",
            )
            .await?;
        rows.iter().map(tile_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn register_tile_project(
        &self,
        tile: TileCoord,
        project: ProjectId,
    ) -> AppResult<()> {
        tile.validate_bounds()?;
        let mut tx = begin_transaction(&self.pool).await?;

        sqlx::query("INSERT OR IGNORE INTO tile (id, x, y) VALUES (?, ?, ?)")
            .bind(tile.tile_id())
            .bind(i64::from(tile.x))
            .bind(i64::from(tile.y))
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Store {
                message: format!("Failed to create tile {tile}: {e}"),
            })?;

        sqlx::query("INSERT OR IGNORE INTO tile_project (tile_id, project_id) VALUES (?, ?)")
            .bind(tile.tile_id())
            .bind(project.as_i64())
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Store {
                message: format!("Failed to link tile {tile} to project {project}: {e}"),
            })?;

        // revive a dormant tile: straight back to burning when it was
        // never fetched, otherwise into the hottest bucket until the next
        // redistribution settles it
        sqlx::query(
            "UPDATE tile SET heat = CASE WHEN last_checked = 0 THEN 999 ELSE 1 END \
             WHERE id = ? AND heat = 0",
        )
        .bind(tile.tile_id())
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Store {
            message: format!("Failed to revive tile {tile}: {e}"),
        })?;

        commit_transaction(tx).await
    }

    #[instrument(skip(self))]
    async fn unregister_tile_project(
        &self,
        tile: TileCoord,
        project: ProjectId,
    ) -> AppResult<()> {
        let mut tx = begin_transaction(&self.pool).await?;

        sqlx::query("DELETE FROM tile_project WHERE tile_id = ? AND project_id = ?")
            .bind(tile.tile_id())
            .bind(project.as_i64())
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Store {
                message: format!("Failed to unlink tile {tile} from project {project}: {e}"),
            })?;

        sqlx::query(
            "UPDATE tile SET heat = 0 WHERE id = ? AND NOT EXISTS ( \
                 SELECT 1 FROM tile_project tp \
                 JOIN project p ON p.id = tp.project_id \
                 WHERE tp.tile_id = tile.id AND p.state != ?)",
        )
        .bind(tile.tile_id())
        .bind(ProjectState::Inactive.as_i64())
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Store {
            message: format!("Failed to demote tile {tile}: {e}"),
        })?;

        commit_transaction(tx).await
    }

    #[instrument(skip(self))]
    async fn demote_orphan_tiles(&self) -> AppResult<u64> {
        let result = self
            .executor
            .execute_with_timeout(
                || {
                    sqlx::query(
                        "UPDATE tile SET heat = 0 WHERE heat > 0 AND NOT EXISTS ( \
                             SELECT 1 FROM tile_project tp \
                             JOIN project p ON p.id = tp.project_id \
                             WHERE tp.tile_id = tile.id AND p.state != ?)",
                    )
                    .bind(ProjectState::Inactive.as_i64())
                    .execute(&self.pool)
                },
                "Failed to demote orphaned tiles",
            )
            .await?;
        Ok(result.rows_affected())
    }
}
