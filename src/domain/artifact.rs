//! Rendered artifacts and their on-disk naming scheme.

use std::path::PathBuf;

use time::{
    Duration, OffsetDateTime, UtcOffset, format_description::BorrowedFormatItem,
    macros::format_description,
};

use super::composition::CompositionKind;

/// ISO-8601 with `:` and `.` replaced by `-` so the stamp is filename-safe.
const FILENAME_TIMESTAMP: &[BorrowedFormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]-[minute]-[second]-[subsecond digits:3]Z"
);

/// A rendered file tracked by the artifact index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedArtifact {
    pub composition_id: String,
    pub kind: CompositionKind,
    pub filename: String,
    pub path: PathBuf,
    pub created: OffsetDateTime,
    pub modified: OffsetDateTime,
    /// Key of the request that produced the file; `None` for files found on disk without one.
    pub cache_key: Option<String>,
}

/// Build `{composition_id}_{timestamp}.{ext}` for a render started at `at`.
pub fn artifact_filename(composition_id: &str, kind: CompositionKind, at: OffsetDateTime) -> String {
    let stamp = at
        .to_offset(UtcOffset::UTC)
        .format(FILENAME_TIMESTAMP)
        .unwrap_or_else(|_| at.unix_timestamp().to_string());
    format!("{composition_id}_{stamp}.{}", kind.extension())
}

/// Timestamp one millisecond after `at`, used to step past a taken filename.
pub fn next_filename_instant(at: OffsetDateTime) -> OffsetDateTime {
    at + Duration::milliseconds(1)
}

/// Recover the composition id and kind from an artifact filename.
///
/// Composition ids may themselves contain `_`; the timestamp never does, so
/// the split happens at the last underscore.
pub fn parse_artifact_filename(filename: &str) -> Option<(String, CompositionKind)> {
    let (stem, extension) = filename.rsplit_once('.')?;
    let kind = CompositionKind::from_extension(extension)?;
    let (composition_id, stamp) = stem.rsplit_once('_')?;
    if composition_id.is_empty() || !stamp.starts_with(|ch: char| ch.is_ascii_digit()) {
        return None;
    }
    Some((composition_id.to_string(), kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn filename_replaces_colons_and_dots() {
        let at = datetime!(2026-10-18 09:30:12.345 UTC);
        assert_eq!(
            artifact_filename("Intro", CompositionKind::Still, at),
            "Intro_2026-10-18T09-30-12-345Z.png"
        );
    }

    #[test]
    fn filename_is_always_utc() {
        let at = datetime!(2026-10-18 11:30:12.345 +02:00);
        assert_eq!(
            artifact_filename("Outro", CompositionKind::Video, at),
            "Outro_2026-10-18T09-30-12-345Z.mp4"
        );
    }

    #[test]
    fn parse_handles_underscored_ids() {
        assert_eq!(
            parse_artifact_filename("lower_third_2026-10-18T09-30-12-345Z.mp4"),
            Some(("lower_third".to_string(), CompositionKind::Video))
        );
        assert_eq!(parse_artifact_filename("notes.txt"), None);
        assert_eq!(parse_artifact_filename("uploaded_abc.png"), None);
        assert_eq!(parse_artifact_filename("_2026-10-18T09-30-12-345Z.png"), None);
    }

    #[test]
    fn next_instant_changes_the_name() {
        let at = datetime!(2026-10-18 09:30:12.345 UTC);
        let next = next_filename_instant(at);
        assert_ne!(
            artifact_filename("Intro", CompositionKind::Still, at),
            artifact_filename("Intro", CompositionKind::Still, next)
        );
    }
}
