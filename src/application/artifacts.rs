//! In-memory index of rendered artifacts.
//!
//! The index answers cache lookups and drives retention without listing the
//! renders directory on every request. It is rebuilt from a directory scan at
//! startup; a small JSON sidecar remembers which cache key produced each file
//! so hits survive restarts.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use metrics::counter;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::{fs, sync::Mutex};
use tracing::{debug, info, warn};

use crate::domain::artifact::{RenderedArtifact, parse_artifact_filename};
use crate::domain::composition::CompositionKind;
use crate::util::lock::{rw_read, rw_write};

pub(crate) const METRIC_RETENTION_DELETED: &str = "framehouse_retention_deleted_total";

const TARGET: &str = "application::artifacts";
const MANIFEST_FILENAME: &str = ".framehouse-index.json";
const MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct IndexKey {
    composition_id: String,
    kind: CompositionKind,
}

impl IndexKey {
    fn new(composition_id: &str, kind: CompositionKind) -> Self {
        Self {
            composition_id: composition_id.to_string(),
            kind,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Manifest {
    version: u32,
    /// Artifact filename -> cache key.
    entries: BTreeMap<String, String>,
}

/// Outcome of one retention pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PruneReport {
    pub composition_id: String,
    pub kind: CompositionKind,
    pub kept: usize,
    pub deleted: Vec<String>,
    pub failed: Vec<String>,
}

/// A file in the renders directory, whether or not the index tracks it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderFile {
    pub filename: String,
    pub kind: CompositionKind,
    pub size: u64,
    pub created: OffsetDateTime,
    pub modified: OffsetDateTime,
}

pub struct ArtifactIndex {
    dir: PathBuf,
    records: RwLock<HashMap<IndexKey, Vec<RenderedArtifact>>>,
    persist_lock: Mutex<()>,
}

impl ArtifactIndex {
    /// Build the index from whatever is already in `dir`. A missing directory yields an empty index.
    pub async fn open(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let dir = std::path::absolute(&dir).unwrap_or(dir);
        let manifest = load_manifest(&dir).await;

        let mut records: HashMap<IndexKey, Vec<RenderedArtifact>> = HashMap::new();
        let mut tracked = 0usize;
        for file in scan_dir(&dir).await {
            let Some((composition_id, kind)) = parse_artifact_filename(&file.filename) else {
                continue;
            };
            let cache_key = manifest.entries.get(&file.filename).cloned();
            records
                .entry(IndexKey::new(&composition_id, kind))
                .or_default()
                .push(RenderedArtifact {
                    composition_id,
                    kind,
                    path: dir.join(&file.filename),
                    filename: file.filename,
                    created: file.created,
                    modified: file.modified,
                    cache_key,
                });
            tracked += 1;
        }

        info!(
            target = "application::artifacts",
            op = "artifacts::open",
            dir = %dir.display(),
            tracked,
            keyed = manifest.entries.len(),
            "Artifact index loaded"
        );

        Self {
            dir,
            records: RwLock::new(records),
            persist_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, filename: &str) -> PathBuf {
        self.dir.join(filename)
    }

    /// Number of artifacts currently tracked.
    pub fn tracked(&self) -> usize {
        rw_read(&self.records, TARGET, "tracked")
            .values()
            .map(Vec::len)
            .sum()
    }

    /// Most recent artifact rendered for exactly this composition, kind and cache key.
    ///
    /// Records whose file has disappeared are dropped on the way. Never errors:
    /// anything unreadable counts as a miss.
    pub async fn find_cached(
        &self,
        composition_id: &str,
        kind: CompositionKind,
        cache_key: &str,
    ) -> Option<RenderedArtifact> {
        let key = IndexKey::new(composition_id, kind);
        let mut candidates: Vec<RenderedArtifact> = {
            let guard = rw_read(&self.records, TARGET, "find_cached");
            guard
                .get(&key)
                .map(|records| {
                    records
                        .iter()
                        .filter(|record| record.cache_key.as_deref() == Some(cache_key))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        };
        candidates.sort_by(newest_first);

        let mut vanished = Vec::new();
        let mut hit = None;
        for candidate in candidates {
            match fs::metadata(&candidate.path).await {
                Ok(metadata) if metadata.is_file() => {
                    hit = Some(candidate);
                    break;
                }
                Ok(_) => vanished.push(candidate.filename),
                Err(err) if err.kind() == ErrorKind::NotFound => vanished.push(candidate.filename),
                Err(err) => {
                    warn!(
                        target = "application::artifacts",
                        op = "artifacts::find_cached",
                        path = %candidate.path.display(),
                        error = %err,
                        "Skipping unreadable cached artifact"
                    );
                }
            }
        }

        if !vanished.is_empty() {
            debug!(
                target = "application::artifacts",
                op = "artifacts::find_cached",
                composition_id,
                evicted = vanished.len(),
                "Evicted artifacts missing from disk"
            );
            self.forget(&vanished);
            self.persist().await;
        }

        hit
    }

    /// Start tracking a freshly rendered artifact.
    pub async fn record(&self, artifact: RenderedArtifact) {
        {
            let mut guard = rw_write(&self.records, TARGET, "record");
            let records = guard
                .entry(IndexKey::new(&artifact.composition_id, artifact.kind))
                .or_default();
            records.retain(|record| record.filename != artifact.filename);
            records.push(artifact);
        }
        self.persist().await;
    }

    /// Keep the `keep` most recently modified artifacts of one composition and kind; delete the rest.
    ///
    /// Deletion failures are logged and the file stays tracked. Nothing here
    /// is reported as an error to the caller.
    pub async fn prune(
        &self,
        composition_id: &str,
        kind: CompositionKind,
        keep: usize,
    ) -> PruneReport {
        let key = IndexKey::new(composition_id, kind);
        let snapshot: Vec<RenderedArtifact> = rw_read(&self.records, TARGET, "prune")
            .get(&key)
            .cloned()
            .unwrap_or_default();
        let seen: HashSet<String> = snapshot
            .iter()
            .map(|record| record.filename.clone())
            .collect();

        let mut live = Vec::with_capacity(snapshot.len());
        for mut record in snapshot {
            match fs::metadata(&record.path).await {
                Ok(metadata) => {
                    if let Ok(modified) = metadata.modified() {
                        record.modified = OffsetDateTime::from(modified);
                    }
                    live.push(record);
                }
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => {
                    warn!(
                        target = "application::artifacts",
                        op = "artifacts::prune",
                        path = %record.path.display(),
                        error = %err,
                        "Failed to stat artifact; keeping it"
                    );
                    live.push(record);
                }
            }
        }
        live.sort_by(newest_first);

        let excess = if live.len() > keep {
            live.split_off(keep)
        } else {
            Vec::new()
        };

        let mut retained = live;
        let mut deleted = Vec::new();
        let mut failed = Vec::new();
        for record in excess {
            match fs::remove_file(&record.path).await {
                Ok(()) => deleted.push(record.filename),
                Err(err) if err.kind() == ErrorKind::NotFound => deleted.push(record.filename),
                Err(err) => {
                    warn!(
                        target = "application::artifacts",
                        op = "artifacts::prune",
                        path = %record.path.display(),
                        error = %err,
                        "Failed to delete superseded artifact"
                    );
                    failed.push(record.filename.clone());
                    retained.push(record);
                }
            }
        }

        let kept = retained.len() - failed.len();
        {
            let mut guard = rw_write(&self.records, TARGET, "prune");
            let mut next = retained;
            if let Some(current) = guard.remove(&key) {
                // Keep anything recorded while the pass was running.
                next.extend(
                    current
                        .into_iter()
                        .filter(|record| !seen.contains(&record.filename)),
                );
            }
            if !next.is_empty() {
                guard.insert(key, next);
            }
        }

        if !deleted.is_empty() {
            counter!(METRIC_RETENTION_DELETED).increment(deleted.len() as u64);
            info!(
                target = "application::artifacts",
                op = "artifacts::prune",
                composition_id,
                kind = kind.as_str(),
                keep,
                deleted = deleted.len(),
                failed = failed.len(),
                "Pruned superseded artifacts"
            );
            self.persist().await;
        }

        PruneReport {
            composition_id: composition_id.to_string(),
            kind,
            kept,
            deleted,
            failed,
        }
    }

    /// Apply [`ArtifactIndex::prune`] to every tracked composition and kind.
    pub async fn prune_all(&self, keep: usize) -> Vec<PruneReport> {
        let mut keys: Vec<IndexKey> = rw_read(&self.records, TARGET, "prune_all")
            .keys()
            .cloned()
            .collect();
        keys.sort_by(|left, right| {
            left.composition_id
                .cmp(&right.composition_id)
                .then_with(|| left.kind.as_str().cmp(right.kind.as_str()))
        });

        let mut reports = Vec::with_capacity(keys.len());
        for key in keys {
            reports.push(self.prune(&key.composition_id, key.kind, keep).await);
        }
        reports
    }

    /// Delete one artifact file and stop tracking it. Returns `false` when no such file existed.
    pub async fn remove(&self, filename: &str) -> io::Result<bool> {
        let removed = match fs::remove_file(self.path_for(filename)).await {
            Ok(()) => true,
            Err(err) if err.kind() == ErrorKind::NotFound => false,
            Err(err) => return Err(err),
        };

        if self.forget(&[filename.to_string()]) {
            self.persist().await;
        }
        Ok(removed)
    }

    /// Every artifact-like file in the renders directory, newest first.
    pub async fn list_files(&self) -> Vec<RenderFile> {
        let mut files = scan_dir(&self.dir).await;
        files.sort_by(|left, right| {
            right
                .modified
                .cmp(&left.modified)
                .then_with(|| right.filename.cmp(&left.filename))
        });
        files
    }

    fn forget(&self, filenames: &[String]) -> bool {
        let mut guard = rw_write(&self.records, TARGET, "forget");
        let mut changed = false;
        for records in guard.values_mut() {
            let before = records.len();
            records.retain(|record| !filenames.contains(&record.filename));
            changed |= records.len() != before;
        }
        guard.retain(|_, records| !records.is_empty());
        changed
    }

    async fn persist(&self) {
        let _serialized = self.persist_lock.lock().await;
        let manifest = {
            let guard = rw_read(&self.records, TARGET, "persist");
            Manifest {
                version: MANIFEST_VERSION,
                entries: guard
                    .values()
                    .flatten()
                    .filter_map(|record| {
                        record
                            .cache_key
                            .as_ref()
                            .map(|key| (record.filename.clone(), key.clone()))
                    })
                    .collect(),
            }
        };

        let dir = self.dir.clone();
        let outcome = tokio::task::spawn_blocking(move || write_manifest(&dir, &manifest)).await;
        let error = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(err)) => err.to_string(),
            Err(err) => err.to_string(),
        };
        warn!(
            target = "application::artifacts",
            op = "artifacts::persist",
            dir = %self.dir.display(),
            error = %error,
            "Failed to write artifact manifest; cache keys will be lost on restart"
        );
    }
}

fn newest_first(left: &RenderedArtifact, right: &RenderedArtifact) -> Ordering {
    right
        .modified
        .cmp(&left.modified)
        .then_with(|| right.filename.cmp(&left.filename))
}

async fn scan_dir(dir: &Path) -> Vec<RenderFile> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Vec::new(),
        Err(err) => {
            warn!(
                target = "application::artifacts",
                op = "artifacts::scan",
                dir = %dir.display(),
                error = %err,
                "Failed to list renders directory"
            );
            return Vec::new();
        }
    };

    let mut files = Vec::new();
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(err) => {
                warn!(
                    target = "application::artifacts",
                    op = "artifacts::scan",
                    dir = %dir.display(),
                    error = %err,
                    "Renders directory listing interrupted"
                );
                break;
            }
        };

        let Ok(filename) = entry.file_name().into_string() else {
            continue;
        };
        if filename.starts_with('.') {
            continue;
        }
        let Some(kind) = Path::new(&filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(CompositionKind::from_extension)
        else {
            continue;
        };
        let Ok(metadata) = entry.metadata().await else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }

        let modified = metadata
            .modified()
            .map(OffsetDateTime::from)
            .unwrap_or(OffsetDateTime::UNIX_EPOCH);
        let created = metadata
            .created()
            .map(OffsetDateTime::from)
            .unwrap_or(modified);

        files.push(RenderFile {
            filename,
            kind,
            size: metadata.len(),
            created,
            modified,
        });
    }
    files
}

async fn load_manifest(dir: &Path) -> Manifest {
    let path = dir.join(MANIFEST_FILENAME);
    let bytes = match fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Manifest::default(),
        Err(err) => {
            warn!(
                target = "application::artifacts",
                op = "artifacts::load_manifest",
                path = %path.display(),
                error = %err,
                "Failed to read artifact manifest; starting without cache keys"
            );
            return Manifest::default();
        }
    };

    match serde_json::from_slice::<Manifest>(&bytes) {
        Ok(manifest) if manifest.version == MANIFEST_VERSION => manifest,
        Ok(manifest) => {
            warn!(
                target = "application::artifacts",
                op = "artifacts::load_manifest",
                version = manifest.version,
                "Ignoring artifact manifest with unknown version"
            );
            Manifest::default()
        }
        Err(err) => {
            warn!(
                target = "application::artifacts",
                op = "artifacts::load_manifest",
                path = %path.display(),
                error = %err,
                "Ignoring corrupt artifact manifest"
            );
            Manifest::default()
        }
    }
}

fn write_manifest(dir: &Path, manifest: &Manifest) -> io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let body = serde_json::to_vec_pretty(manifest).map_err(io::Error::other)?;
    let mut file = tempfile::Builder::new()
        .prefix(".framehouse-index")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    file.write_all(&body)?;
    file.flush()?;
    file.persist(dir.join(MANIFEST_FILENAME))
        .map_err(|err| err.error)?;
    Ok(())
}
