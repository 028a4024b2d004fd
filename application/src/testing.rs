//! In-memory port fakes shared by the unit tests.

#![allow(clippy::unwrap_used)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use domain::coords::TileCoord;
use domain::project::ProjectId;
use domain::tile::{Heat, TileRecord};

use crate::error::AppResult;
use crate::ports::outgoing::tile_store::TileStorePort;

/// In-memory stand-in for the SQLite tile store, modelling just the
/// scheduling queries. The burning pick uses smallest tile id in place of
/// the oldest-project join.
#[derive(Default)]
pub struct MemoryTileStore {
    pub tiles: Mutex<BTreeMap<i64, TileRecord>>,
}

impl MemoryTileStore {
    pub fn seed(records: Vec<TileRecord>) -> Arc<Self> {
        let store = Self::default();
        {
            let mut tiles = store.tiles.lock().unwrap();
            for record in records {
                tiles.insert(record.id(), record);
            }
        }
        Arc::new(store)
    }
}

#[async_trait::async_trait]
impl TileStorePort for MemoryTileStore {
    async fn get_tile(&self, id: i64) -> AppResult<Option<TileRecord>> {
        Ok(self.tiles.lock().unwrap().get(&id).cloned())
    }

    async fn upsert_tile(&self, record: &TileRecord) -> AppResult<()> {
        self.tiles
            .lock()
            .unwrap()
            .insert(record.id(), record.clone());
        Ok(())
    }

    async fn touch_checked(&self, id: i64, checked_at: i64) -> AppResult<()> {
        if let Some(tile) = self.tiles.lock().unwrap().get_mut(&id) {
            tile.last_checked = checked_at;
        }
        Ok(())
    }

    async fn set_tile_heat(&self, id: i64, heat: Heat) -> AppResult<()> {
        if let Some(tile) = self.tiles.lock().unwrap().get_mut(&id) {
            tile.heat = heat;
        }
        Ok(())
    }

    async fn apply_heat_updates(&self, updates: &[(i64, Heat)]) -> AppResult<()> {
        let mut tiles = self.tiles.lock().unwrap();
        for &(id, heat) in updates {
            if let Some(tile) = tiles.get_mut(&id) {
                tile.heat = heat;
            }
        }
        Ok(())
    }

    async fn occupied_buckets(&self) -> AppResult<Vec<Heat>> {
        let mut heats: Vec<Heat> = self
            .tiles
            .lock()
            .unwrap()
            .values()
            .map(|tile| tile.heat)
            .filter(|heat| !heat.is_inactive())
            .collect();
        heats.sort_unstable();
        heats.dedup();
        Ok(heats)
    }

    async fn bucket_counts(&self) -> AppResult<Vec<(Heat, i64)>> {
        let mut counts: BTreeMap<Heat, i64> = BTreeMap::new();
        for tile in self.tiles.lock().unwrap().values() {
            if !tile.heat.is_inactive() {
                *counts.entry(tile.heat).or_default() += 1;
            }
        }
        Ok(counts.into_iter().collect())
    }

    async fn select_burning(&self) -> AppResult<Option<TileRecord>> {
        Ok(self
            .tiles
            .lock()
            .unwrap()
            .values()
            .filter(|tile| tile.heat.is_burning())
            .min_by_key(|tile| tile.id())
            .cloned())
    }

    async fn select_in_bucket(&self, heat: Heat) -> AppResult<Option<TileRecord>> {
        Ok(self
            .tiles
            .lock()
            .unwrap()
            .values()
            .filter(|tile| tile.heat == heat)
            .min_by_key(|tile| (tile.last_checked, tile.id()))
            .cloned())
    }

    async fn tiles_by_recency(&self) -> AppResult<Vec<TileRecord>> {
        let mut tiles: Vec<TileRecord> = self
            .tiles
            .lock()
            .unwrap()
            .values()
            .filter(|tile| !tile.heat.is_inactive() && !tile.heat.is_burning())
            .cloned()
            .collect();
        tiles.sort_by_key(|tile| (std::cmp::Reverse(tile.last_update), tile.id()));
        Ok(tiles)
    }

    async fn register_tile_project(
        &self,
        _tile: TileCoord,
        _project: ProjectId,
    ) -> AppResult<()> {
        Ok(())
    }

    async fn unregister_tile_project(
        &self,
        _tile: TileCoord,
        _project: ProjectId,
    ) -> AppResult<()> {
        Ok(())
    }

    async fn demote_orphan_tiles(&self) -> AppResult<u64> {
        Ok(0)
    }
}
