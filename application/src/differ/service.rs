use time::OffsetDateTime;
use tracing::{debug, instrument, warn};

use domain::coords::{Rect, TILE_SIZE};
use domain::error::DomainError;
use domain::history::HistoryChange;
use domain::palette::PaletteImage;
use domain::project::{Project, Streak};

use crate::differ::compare::{DiffCounts, compare};
use crate::error::{AppError, AppResult};
use crate::ports::outgoing::palette_codec::DynPaletteCodecPort;
use crate::ports::outgoing::person_store::DynPersonStorePort;
use crate::ports::outgoing::project_images::DynProjectImagePort;
use crate::ports::outgoing::project_store::{DiffCommit, DynProjectStorePort};
use crate::ports::outgoing::tile_cache::DynTileCachePort;

/// History rows (including the one being committed) that feed the streak
/// classification.
const STREAK_WINDOW: u32 = 5;

#[derive(Debug, Clone)]
pub enum DiffOutcome {
    /// The project could not be diffed; logged and ignored.
    Skipped { reason: String },
    /// Deltas were zero; nothing written.
    NoChange,
    Committed { counts: DiffCounts },
}

/// Runs one project diff: assemble the current view over the project's
/// rectangle, compare against target and previous snapshot, persist.
pub struct DiffService {
    project_store: DynProjectStorePort,
    person_store: DynPersonStorePort,
    images: DynProjectImagePort,
    cache: DynTileCachePort,
    codec: DynPaletteCodecPort,
}

impl DiffService {
    #[must_use]
    pub fn new(
        project_store: DynProjectStorePort,
        person_store: DynPersonStorePort,
        images: DynProjectImagePort,
        cache: DynTileCachePort,
        codec: DynPaletteCodecPort,
    ) -> Self {
        Self {
            project_store,
            person_store,
            images,
            cache,
            codec,
        }
    }

    #[instrument(skip(self, project), fields(project = %project.id))]
    pub async fn run(&self, project: &Project) -> AppResult<DiffOutcome> {
        let position = project.rect.position();

        let Some(target_bytes) = self.images.load_target(project.owner, position).await?
        else {
            return Ok(DiffOutcome::Skipped {
                reason: format!("target image missing for project {}", project.id),
            });
        };
        let target = match self.codec.decode_png(&target_bytes) {
            Ok(target) => target,
            Err(AppError::Domain(DomainError::PaletteViolation(message))) => {
                return Ok(DiffOutcome::Skipped {
                    reason: format!("target of project {} violates the palette: {message}", project.id),
                });
            }
            Err(error) => {
                return Ok(DiffOutcome::Skipped {
                    reason: format!("target of project {} unreadable: {error}", project.id),
                });
            }
        };
        if target.size() != project.rect.size() {
            return Ok(DiffOutcome::Skipped {
                reason: format!(
                    "target of project {} is {}x{}, rectangle says {}x{}",
                    project.id,
                    target.width(),
                    target.height(),
                    project.rect.w,
                    project.rect.h
                ),
            });
        }

        let current = self.assemble_current(&project.rect).await?;
        let previous = self.load_previous(project).await?;

        let counts = compare(&target, &current, &previous);
        if counts.is_noop() {
            debug!("project {} unchanged by this tile", project.id);
            return Ok(DiffOutcome::NoChange);
        }

        self.commit(project, &current, counts).await?;
        Ok(DiffOutcome::Committed { counts })
    }

    /// Paste every cached overlapping tile into a rectangle-sized canvas.
    /// Uncached tiles stay transparent.
    async fn assemble_current(&self, rect: &Rect) -> AppResult<PaletteImage> {
        let mut canvas = PaletteImage::blank(rect.w, rect.h);
        for tile in rect.tiles() {
            let Some(clip) = rect.clip_to_tile(tile) else {
                continue;
            };
            let Some(bytes) = self.cache.read_tile(tile).await? else {
                debug!("tile {tile} not cached yet; leaving it transparent");
                continue;
            };
            match self.codec.decode_png(&bytes) {
                Ok(image) if image.width() == TILE_SIZE && image.height() == TILE_SIZE => {
                    canvas.paste(
                        &image,
                        clip.tile_x,
                        clip.tile_y,
                        clip.rect_x,
                        clip.rect_y,
                        clip.w,
                        clip.h,
                    );
                }
                Ok(image) => {
                    warn!(
                        "cached tile {tile} is {}x{}; treating it as blank",
                        image.width(),
                        image.height()
                    );
                }
                Err(error) => {
                    warn!("cached tile {tile} unreadable ({error}); treating it as blank");
                }
            }
        }
        Ok(canvas)
    }

    /// The previous snapshot, or a blank canvas when there is none to
    /// trust. A snapshot file for a project with no committed history is
    /// debris from a commit that never landed (the snapshot is staged
    /// before the store transaction); it is ignored here and overwritten
    /// by the next successful commit.
    async fn load_previous(&self, project: &Project) -> AppResult<PaletteImage> {
        let never_committed = self
            .project_store
            .recent_deltas(project.id, 1)
            .await?
            .is_empty();
        if never_committed {
            return Ok(PaletteImage::blank(project.rect.w, project.rect.h));
        }

        let position = project.rect.position();
        match self.images.load_snapshot(project.owner, position).await? {
            None => Ok(PaletteImage::blank(project.rect.w, project.rect.h)),
            Some(bytes) => match self.codec.decode_png(&bytes) {
                Ok(snapshot) if snapshot.size() == project.rect.size() => Ok(snapshot),
                Ok(_) | Err(_) => {
                    warn!(
                        "snapshot of project {} unusable; diffing against blank",
                        project.id
                    );
                    Ok(PaletteImage::blank(project.rect.w, project.rect.h))
                }
            },
        }
    }

    async fn commit(
        &self,
        project: &Project,
        current: &PaletteImage,
        counts: DiffCounts,
    ) -> AppResult<()> {
        let now = OffsetDateTime::now_utc().unix_timestamp();

        let mut window = vec![(counts.delta_progress, counts.delta_regress)];
        window.extend(
            self.project_store
                .recent_deltas(project.id, STREAK_WINDOW - 1)
                .await?,
        );
        let streak = Streak::classify(&window);

        let owner_name = self
            .person_store
            .get_person(project.owner)
            .await?
            .map_or_else(|| format!("person {}", project.owner), |person| person.name);
        let message = format!(
            "{owner_name}'s {}: {:.1}% [+{}/\u{2212}{}]",
            project.name,
            counts.completion_percent() * 100.0,
            counts.delta_progress,
            counts.delta_regress
        );

        let commit = DiffCommit {
            change: HistoryChange {
                project_id: project.id,
                created_at: now,
                status: counts.status(),
                pixels_remaining: counts.pixels_remaining(),
                completion_percent: counts.completion_percent(),
                delta_progress: counts.delta_progress,
                delta_regress: counts.delta_regress,
            },
            streak,
            last_log_message: message,
        };

        // the snapshot is staged before the store transaction: a crash
        // between the two leaves a snapshot that load_previous discards
        // (no history row refers to it yet), so replaying the diff
        // converges instead of violating the exists-iff-history rule
        let snapshot_bytes = self.codec.encode_png(current)?;
        self.images
            .store_snapshot(project.owner, project.rect.position(), &snapshot_bytes)
            .await?;
        self.project_store.commit_diff(&commit).await?;

        debug!(
            "project {} committed [+{}/-{}] at {:.1}%",
            project.id,
            counts.delta_progress,
            counts.delta_regress,
            counts.completion_percent() * 100.0
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic, clippy::indexing_slicing)]

    use super::*;
    use crate::ports::outgoing::palette_codec::PaletteCodecPort;
    use crate::ports::outgoing::person_store::PersonStorePort;
    use crate::ports::outgoing::project_images::ProjectImagePort;
    use crate::ports::outgoing::project_store::ProjectStorePort;
    use crate::ports::outgoing::tile_cache::TileCachePort;
    use domain::coords::{CanvasPosition, TileCoord};
    use domain::person::{Person, PersonId};
    use domain::project::{ProjectId, ProjectState, ProjectStats};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Codec over raw index buffers: first 8 bytes carry the dimensions.
    struct RawCodec;

    impl PaletteCodecPort for RawCodec {
        fn decode_png(&self, bytes: &[u8]) -> AppResult<PaletteImage> {
            let (header, pixels) = bytes.split_at(8);
            let width = u32::from_le_bytes(header[0..4].try_into().unwrap());
            let height = u32::from_le_bytes(header[4..8].try_into().unwrap());
            Ok(PaletteImage::from_pixels(width, height, pixels.to_vec())?)
        }

        fn encode_png(&self, image: &PaletteImage) -> AppResult<Vec<u8>> {
            let mut bytes = Vec::with_capacity(8 + image.pixels().len());
            bytes.extend_from_slice(&image.width().to_le_bytes());
            bytes.extend_from_slice(&image.height().to_le_bytes());
            bytes.extend_from_slice(image.pixels());
            Ok(bytes)
        }
    }

    fn raw_image(width: u32, height: u32, pixels: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&width.to_le_bytes());
        bytes.extend_from_slice(&height.to_le_bytes());
        bytes.extend_from_slice(pixels);
        bytes
    }

    #[derive(Default)]
    struct FakeImages {
        targets: Mutex<HashMap<String, Vec<u8>>>,
        snapshots: Mutex<HashMap<String, Vec<u8>>>,
    }

    #[async_trait::async_trait]
    impl ProjectImagePort for FakeImages {
        async fn load_target(
            &self,
            _owner: PersonId,
            position: CanvasPosition,
        ) -> AppResult<Option<Vec<u8>>> {
            Ok(self.targets.lock().unwrap().get(&position.to_string()).cloned())
        }

        async fn load_snapshot(
            &self,
            _owner: PersonId,
            position: CanvasPosition,
        ) -> AppResult<Option<Vec<u8>>> {
            Ok(self
                .snapshots
                .lock()
                .unwrap()
                .get(&position.to_string())
                .cloned())
        }

        async fn store_snapshot(
            &self,
            _owner: PersonId,
            position: CanvasPosition,
            bytes: &[u8],
        ) -> AppResult<()> {
            self.snapshots
                .lock()
                .unwrap()
                .insert(position.to_string(), bytes.to_vec());
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeTiles {
        tiles: Mutex<HashMap<i64, Vec<u8>>>,
    }

    #[async_trait::async_trait]
    impl TileCachePort for FakeTiles {
        async fn read_tile(&self, coord: TileCoord) -> AppResult<Option<Vec<u8>>> {
            Ok(self.tiles.lock().unwrap().get(&coord.tile_id()).cloned())
        }

        async fn write_tile(&self, coord: TileCoord, bytes: &[u8]) -> AppResult<()> {
            self.tiles
                .lock()
                .unwrap()
                .insert(coord.tile_id(), bytes.to_vec());
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeProjects {
        commits: Mutex<Vec<DiffCommit>>,
        deltas: Mutex<Vec<(i64, i64)>>,
    }

    #[async_trait::async_trait]
    impl ProjectStorePort for FakeProjects {
        async fn get_project(&self, _id: ProjectId) -> AppResult<Option<Project>> {
            Ok(None)
        }

        async fn lookup_overlapping_projects(
            &self,
            _tile: TileCoord,
        ) -> AppResult<Vec<Project>> {
            Ok(Vec::new())
        }

        async fn recent_deltas(
            &self,
            _id: ProjectId,
            limit: u32,
        ) -> AppResult<Vec<(i64, i64)>> {
            let deltas = self.deltas.lock().unwrap();
            Ok(deltas.iter().take(limit as usize).copied().collect())
        }

        async fn commit_diff(&self, commit: &DiffCommit) -> AppResult<()> {
            self.deltas.lock().unwrap().insert(
                0,
                (commit.change.delta_progress, commit.change.delta_regress),
            );
            self.commits.lock().unwrap().push(commit.clone());
            Ok(())
        }
    }

    struct FakePersons;

    #[async_trait::async_trait]
    impl PersonStorePort for FakePersons {
        async fn get_person(&self, id: PersonId) -> AppResult<Option<Person>> {
            Ok(Some(Person {
                id,
                name: "liz".to_string(),
                chat_handle: None,
                access_mask: 0,
                watched_tiles_count: 0,
                active_projects_count: 0,
            }))
        }

        async fn list_persons(&self) -> AppResult<Vec<Person>> {
            Ok(Vec::new())
        }

        async fn recompute_person_totals(&self, _id: PersonId) -> AppResult<()> {
            Ok(())
        }
    }

    fn project(rect: Rect) -> Project {
        Project {
            id: ProjectId::new(1234),
            owner: PersonId::new(7),
            name: "lighthouse".to_string(),
            state: ProjectState::Active,
            rect,
            stats: ProjectStats::fresh(1_690_000_000),
        }
    }

    struct Harness {
        service: DiffService,
        projects: Arc<FakeProjects>,
        images: Arc<FakeImages>,
        tiles: Arc<FakeTiles>,
    }

    fn harness() -> Harness {
        let projects = Arc::new(FakeProjects::default());
        let images = Arc::new(FakeImages::default());
        let tiles = Arc::new(FakeTiles::default());
        let service = DiffService::new(
            projects.clone(),
            Arc::new(FakePersons),
            images.clone(),
            tiles.clone(),
            Arc::new(RawCodec),
        );
        Harness {
            service,
            projects,
            images,
            tiles,
        }
    }

    /// 10x10 rectangle at the canvas origin inside tile (0, 0).
    fn small_rect() -> Rect {
        Rect::new(0, 0, 10, 10).unwrap()
    }

    fn full_tile(index: u8) -> Vec<u8> {
        raw_image(
            TILE_SIZE,
            TILE_SIZE,
            &vec![index; (TILE_SIZE * TILE_SIZE) as usize],
        )
    }

    #[tokio::test]
    async fn missing_target_skips() {
        let h = harness();
        let outcome = h.service.run(&project(small_rect())).await.unwrap();
        assert!(matches!(outcome, DiffOutcome::Skipped { .. }));
        assert!(h.projects.commits.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn first_diff_synthesizes_a_blank_snapshot() {
        let h = harness();
        let rect = small_rect();
        h.images
            .targets
            .lock()
            .unwrap()
            .insert(rect.position().to_string(), raw_image(10, 10, &[3; 100]));
        h.tiles
            .tiles
            .lock()
            .unwrap()
            .insert(TileCoord::new(0, 0).tile_id(), full_tile(3));

        let outcome = h.service.run(&project(rect)).await.unwrap();
        let DiffOutcome::Committed { counts } = outcome else {
            panic!("expected a commit, got {outcome:?}");
        };
        assert_eq!(counts.delta_progress, 100);
        assert_eq!(counts.delta_regress, 0);
        assert_eq!(counts.status(), domain::history::DiffStatus::Complete);

        // snapshot now mirrors the diffed canvas
        assert!(
            h.images
                .snapshots
                .lock()
                .unwrap()
                .contains_key(&rect.position().to_string())
        );
    }

    #[tokio::test]
    async fn uncached_tiles_read_as_transparent() {
        let h = harness();
        let rect = small_rect();
        h.images
            .targets
            .lock()
            .unwrap()
            .insert(rect.position().to_string(), raw_image(10, 10, &[3; 100]));
        // no tile cached at all: nothing matches, nothing changed

        let outcome = h.service.run(&project(rect)).await.unwrap();
        assert!(matches!(outcome, DiffOutcome::NoChange));
    }

    #[tokio::test]
    async fn identical_rerun_is_a_noop() {
        let h = harness();
        let rect = small_rect();
        h.images
            .targets
            .lock()
            .unwrap()
            .insert(rect.position().to_string(), raw_image(10, 10, &[3; 100]));
        h.tiles
            .tiles
            .lock()
            .unwrap()
            .insert(TileCoord::new(0, 0).tile_id(), full_tile(3));

        let first = h.service.run(&project(rect)).await.unwrap();
        assert!(matches!(first, DiffOutcome::Committed { .. }));

        let second = h.service.run(&project(rect)).await.unwrap();
        assert!(matches!(second, DiffOutcome::NoChange));
        assert_eq!(h.projects.commits.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn regress_classifies_the_streak() {
        let h = harness();
        let rect = small_rect();
        h.images
            .targets
            .lock()
            .unwrap()
            .insert(rect.position().to_string(), raw_image(10, 10, &[3; 100]));
        // previous snapshot: everything matched, backed by an earlier
        // regress event so the snapshot is trusted
        h.projects.deltas.lock().unwrap().push((0, 5));
        h.images.snapshots.lock().unwrap().insert(
            rect.position().to_string(),
            raw_image(10, 10, &[3; 100]),
        );
        // canvas now holds a different color
        h.tiles
            .tiles
            .lock()
            .unwrap()
            .insert(TileCoord::new(0, 0).tile_id(), full_tile(9));

        let outcome = h.service.run(&project(rect)).await.unwrap();
        let DiffOutcome::Committed { counts } = outcome else {
            panic!("expected a commit");
        };
        assert_eq!(counts.delta_regress, 100);
        assert_eq!(counts.delta_progress, 0);

        let commits = h.projects.commits.lock().unwrap();
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].streak, Streak::Regress);
        assert_eq!(commits[0].change.status, domain::history::DiffStatus::NotStarted);
        assert!(commits[0].last_log_message.contains("liz's lighthouse"));
        assert!(commits[0].last_log_message.contains("[+0/\u{2212}100]"));
    }

    #[tokio::test]
    async fn mixed_window_classifies_mixed() {
        let h = harness();
        let rect = small_rect();
        h.images
            .targets
            .lock()
            .unwrap()
            .insert(rect.position().to_string(), raw_image(10, 10, &[3; 100]));
        h.tiles
            .tiles
            .lock()
            .unwrap()
            .insert(TileCoord::new(0, 0).tile_id(), full_tile(3));
        // an earlier regress event sits in the window
        h.projects.deltas.lock().unwrap().push((0, 12));

        h.service.run(&project(rect)).await.unwrap();
        let commits = h.projects.commits.lock().unwrap();
        assert_eq!(commits[0].streak, Streak::Mixed);
    }

    #[tokio::test]
    async fn snapshot_without_history_is_treated_as_absent() {
        let h = harness();
        let rect = small_rect();
        h.images
            .targets
            .lock()
            .unwrap()
            .insert(rect.position().to_string(), raw_image(10, 10, &[3; 100]));
        h.tiles
            .tiles
            .lock()
            .unwrap()
            .insert(TileCoord::new(0, 0).tile_id(), full_tile(3));
        // a fully-matching snapshot left by a commit that never landed;
        // no history row backs it
        h.images.snapshots.lock().unwrap().insert(
            rect.position().to_string(),
            raw_image(10, 10, &[3; 100]),
        );

        // the replayed diff ignores the debris and commits the progress
        let outcome = h.service.run(&project(rect)).await.unwrap();
        let DiffOutcome::Committed { counts } = outcome else {
            panic!("expected a commit, got {outcome:?}");
        };
        assert_eq!(counts.delta_progress, 100);
        assert_eq!(h.projects.commits.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn dimension_mismatch_skips() {
        let h = harness();
        let rect = small_rect();
        h.images
            .targets
            .lock()
            .unwrap()
            .insert(rect.position().to_string(), raw_image(4, 4, &[3; 16]));

        let outcome = h.service.run(&project(rect)).await.unwrap();
        assert!(matches!(outcome, DiffOutcome::Skipped { .. }));
    }
}
