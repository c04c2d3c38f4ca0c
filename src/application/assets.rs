//! Discovery of media assets under the public directory.

use std::cmp::Ordering;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use framehouse_api_types::{AssetEntry, AssetGroups, AssetUsage, FileTreeNode, UsageSummary};
use time::OffsetDateTime;
use tokio::fs;
use tracing::warn;
use url::Url;
use walkdir::WalkDir;

use crate::util::bytes::format_size;

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov", "mkv"];
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif", "svg"];
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "m4a", "aac"];

const VIDEOS_DIR: &str = "videos";
const BACKDROPS_DIR: &str = "backdrops";
const AVATARS_DIR: &str = "avatars";

/// Enumerates files in the public directory, both as a tree and as categorized lists.
#[derive(Debug, Clone)]
pub struct AssetIndexer {
    public_dir: PathBuf,
    base_url: Url,
}

impl AssetIndexer {
    pub fn new(public_dir: impl Into<PathBuf>, base_url: &str) -> Result<Self, url::ParseError> {
        let mut base = base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        Ok(Self {
            public_dir: public_dir.into(),
            base_url: Url::parse(&base)?,
        })
    }

    pub fn public_dir(&self) -> &Path {
        &self.public_dir
    }

    /// Absolute URL of a file given its path relative to the public directory.
    pub fn public_url(&self, relative: &str) -> String {
        self.base_url
            .join(&format!("public/{}", relative.trim_start_matches('/')))
            .map(String::from)
            .unwrap_or_else(|_| format!("{}public/{relative}", self.base_url))
    }

    /// Recursive tree of the public directory: directories first, then files, each alphabetical.
    pub async fn build_tree(&self) -> Vec<FileTreeNode> {
        let root = self.public_dir.clone();
        match tokio::task::spawn_blocking(move || tree_level(&root, "")).await {
            Ok(tree) => tree,
            Err(err) => {
                warn!(
                    target = "application::assets",
                    op = "assets::build_tree",
                    error = %err,
                    "Public tree walk aborted"
                );
                Vec::new()
            }
        }
    }

    /// Flat, alphabetical listing of one directory filtered by extension.
    ///
    /// `subdir` is relative to the public directory; an empty string lists the
    /// public root itself.
    pub async fn list_category(&self, subdir: &str, allowed: &[&str]) -> Vec<AssetEntry> {
        let dir = if subdir.is_empty() {
            self.public_dir.clone()
        } else {
            self.public_dir.join(subdir)
        };

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(err) => {
                warn!(
                    target = "application::assets",
                    op = "assets::list_category",
                    dir = %dir.display(),
                    error = %err,
                    "Failed to list asset directory"
                );
                return Vec::new();
            }
        };

        let mut assets = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            let Some(extension) = extension_of(&name) else {
                continue;
            };
            if !allowed.contains(&extension.as_str()) {
                continue;
            }
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }

            let path = if subdir.is_empty() {
                name.clone()
            } else {
                format!("{}/{name}", subdir.trim_matches('/'))
            };
            assets.push(AssetEntry {
                url: self.public_url(&path),
                size: metadata.len(),
                size_formatted: format_size(metadata.len()),
                modified: metadata
                    .modified()
                    .map(OffsetDateTime::from)
                    .unwrap_or(OffsetDateTime::UNIX_EPOCH),
                name,
                path,
                extension,
            });
        }

        assets.sort_by(|left, right| left.name.cmp(&right.name));
        assets
    }

    /// Categorized listings plus storage usage.
    pub async fn catalog(&self) -> (AssetGroups, AssetUsage) {
        let root_media: Vec<&str> = VIDEO_EXTENSIONS
            .iter()
            .chain(IMAGE_EXTENSIONS)
            .chain(AUDIO_EXTENSIONS)
            .copied()
            .collect();

        let groups = AssetGroups {
            videos: self.list_category(VIDEOS_DIR, VIDEO_EXTENSIONS).await,
            backdrops: self.list_category(BACKDROPS_DIR, IMAGE_EXTENSIONS).await,
            avatars: self.list_category(AVATARS_DIR, IMAGE_EXTENSIONS).await,
            other: self.list_category("", &root_media).await,
        };

        let root = self.public_dir.clone();
        let usage = match tokio::task::spawn_blocking(move || usage(&root)).await {
            Ok(usage) => usage,
            Err(err) => {
                warn!(
                    target = "application::assets",
                    op = "assets::usage",
                    error = %err,
                    "Usage walk aborted"
                );
                AssetUsage::default()
            }
        };

        (groups, usage)
    }
}

fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

fn tree_level(dir: &Path, prefix: &str) -> Vec<FileTreeNode> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            if err.kind() != ErrorKind::NotFound {
                warn!(
                    target = "application::assets",
                    op = "assets::build_tree",
                    dir = %dir.display(),
                    error = %err,
                    "Skipping unreadable directory"
                );
            }
            return Vec::new();
        }
    };

    let mut nodes = Vec::new();
    for entry in entries.flatten() {
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}/{name}")
        };
        let Ok(metadata) = entry.metadata() else {
            continue;
        };

        if metadata.is_dir() {
            let children = tree_level(&entry.path(), &path);
            nodes.push(FileTreeNode::Directory {
                name,
                path,
                children,
            });
        } else if metadata.is_file() {
            nodes.push(FileTreeNode::File {
                name,
                path,
                size: metadata.len(),
                modified: metadata
                    .modified()
                    .map(OffsetDateTime::from)
                    .unwrap_or(OffsetDateTime::UNIX_EPOCH),
            });
        }
    }

    nodes.sort_by(|left, right| match (left.is_directory(), right.is_directory()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => left.name().cmp(right.name()),
    });
    nodes
}

#[derive(Default)]
struct Tally {
    files: u64,
    bytes: u64,
}

impl Tally {
    fn add(&mut self, bytes: u64) {
        self.files += 1;
        self.bytes += bytes;
    }

    fn summary(&self) -> UsageSummary {
        UsageSummary {
            files: self.files,
            bytes: self.bytes,
            size: format_size(self.bytes),
        }
    }
}

/// Walk the whole public tree; files under a category directory count there, everything else is `other`.
fn usage(root: &Path) -> AssetUsage {
    let mut videos = Tally::default();
    let mut backdrops = Tally::default();
    let mut avatars = Tally::default();
    let mut other = Tally::default();
    let mut total = Tally::default();

    let walker = WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_entry(|entry| !entry.file_name().to_string_lossy().starts_with('.'));
    for entry in walker.flatten() {
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        let bytes = metadata.len();
        total.add(bytes);

        let top = entry
            .path()
            .strip_prefix(root)
            .ok()
            .and_then(|relative| relative.components().next())
            .map(|component| component.as_os_str().to_string_lossy().into_owned());
        let in_subdir = entry.depth() > 1;
        match top.as_deref() {
            Some(VIDEOS_DIR) if in_subdir => videos.add(bytes),
            Some(BACKDROPS_DIR) if in_subdir => backdrops.add(bytes),
            Some(AVATARS_DIR) if in_subdir => avatars.add(bytes),
            _ => other.add(bytes),
        }
    }

    AssetUsage {
        videos: videos.summary(),
        backdrops: backdrops.summary(),
        avatars: avatars.summary(),
        other: other.summary(),
        total: total.summary(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, bytes: usize) {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("mkdir");
        }
        std::fs::write(path, vec![0u8; bytes]).expect("write");
    }

    fn indexer(root: &Path) -> AssetIndexer {
        AssetIndexer::new(root, "http://localhost:3000").expect("indexer")
    }

    #[tokio::test]
    async fn missing_public_dir_is_empty() {
        let dir = TempDir::new().expect("temp dir");
        let indexer = indexer(&dir.path().join("nope"));
        assert!(indexer.build_tree().await.is_empty());
        let (groups, usage) = indexer.catalog().await;
        assert!(groups.videos.is_empty() && groups.other.is_empty());
        assert_eq!(usage.total.files, 0);
        assert_eq!(usage.total.size, "0 B");
    }

    #[tokio::test]
    async fn tree_lists_directories_first() {
        let dir = TempDir::new().expect("temp dir");
        write(dir.path(), "b.png", 1);
        write(dir.path(), "a.png", 1);
        write(dir.path(), "videos/clip.mp4", 1);
        write(dir.path(), ".hidden", 1);

        let tree = indexer(dir.path()).build_tree().await;
        let names: Vec<&str> = tree.iter().map(FileTreeNode::name).collect();
        assert_eq!(names, vec!["videos", "a.png", "b.png"]);
        match &tree[0] {
            FileTreeNode::Directory { children, path, .. } => {
                assert_eq!(path, "videos");
                assert_eq!(children[0].name(), "clip.mp4");
            }
            other => panic!("expected directory, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn catalog_filters_and_builds_urls() {
        let dir = TempDir::new().expect("temp dir");
        write(dir.path(), "videos/b.MP4", 2048);
        write(dir.path(), "videos/a.webm", 10);
        write(dir.path(), "videos/notes.txt", 10);
        write(dir.path(), "avatars/face.png", 5);
        write(dir.path(), "uploaded_abc.png", 7);
        write(dir.path(), "theme.mp3", 3);
        write(dir.path(), "readme.md", 4);

        let (groups, usage) = indexer(dir.path()).catalog().await;

        let videos: Vec<&str> = groups.videos.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(videos, vec!["a.webm", "b.MP4"]);
        assert_eq!(groups.videos[1].extension, "mp4");
        assert_eq!(groups.videos[1].size_formatted, "2 KiB");
        assert_eq!(groups.videos[1].path, "videos/b.MP4");
        assert_eq!(
            groups.videos[1].url,
            "http://localhost:3000/public/videos/b.MP4"
        );
        assert!(groups.backdrops.is_empty());
        assert_eq!(groups.avatars.len(), 1);

        let other: Vec<&str> = groups.other.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(other, vec!["theme.mp3", "uploaded_abc.png"]);

        assert_eq!(usage.videos.files, 3);
        assert_eq!(usage.videos.bytes, 2068);
        assert_eq!(usage.avatars.files, 1);
        assert_eq!(usage.other.files, 3);
        assert_eq!(usage.total.files, 7);
        assert_eq!(usage.total.bytes, 2048 + 10 + 10 + 5 + 7 + 3 + 4);
    }
}
