//! Destination naming for downloaded tracks.
//!
//! Names come from a caller-supplied preferred name (or the hit title),
//! sanitized for common filesystems and truncated, with the audio extension
//! appended last.

use std::path::{Path, PathBuf};

use super::format::AudioFormat;

/// Maximum length, in characters, of the sanitized base name.
pub const MAX_BASE_NAME_CHARS: usize = 100;

/// Suffix for in-progress transfers; never left behind on failure.
pub const PARTIAL_SUFFIX: &str = ".part";

/// Fallback base name when sanitizing leaves nothing usable.
const FALLBACK_BASE_NAME: &str = "track";

/// Sanitizes a name for filesystem safety.
///
/// Replaces `< > : " / \ | ? *` and control characters with `_`, collapses
/// whitespace runs to a single space, trims, and truncates to
/// [`MAX_BASE_NAME_CHARS`] characters.
///
/// ```
/// use trackfetch_core::fetch::sanitize_filename;
///
/// assert_eq!(sanitize_filename("A/B:C*D"), "A_B_C_D");
/// ```
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_whitespace() => ' ',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    let truncated: String = collapsed.chars().take(MAX_BASE_NAME_CHARS).collect();
    let trimmed = truncated.trim();

    // "." and ".." would escape or alias the output directory.
    if trimmed.is_empty() || trimmed.chars().all(|c| c == '.') {
        return FALLBACK_BASE_NAME.to_string();
    }
    trimmed.to_string()
}

/// Builds the final file name: sanitized base plus the format extension.
///
/// If the sanitized base already ends in a supported audio extension it is
/// kept as-is.
///
/// ```
/// use trackfetch_core::fetch::{AudioFormat, destination_filename};
///
/// assert_eq!(destination_filename("A/B:C*D", AudioFormat::M4a), "A_B_C_D.m4a");
/// assert_eq!(destination_filename("song.flac", AudioFormat::Mp3), "song.flac");
/// ```
#[must_use]
pub fn destination_filename(base_name: &str, format: AudioFormat) -> String {
    let base = sanitize_filename(base_name);
    if AudioFormat::from_suffix(&base).is_some() {
        base
    } else {
        format!("{base}{}", format.extension())
    }
}

/// Picks the audio format for a transfer.
///
/// Declared content kind first, then the URL suffix, then the default.
#[must_use]
pub fn infer_format(content_type: Option<&str>, url: &str) -> AudioFormat {
    content_type
        .and_then(AudioFormat::from_content_type)
        .or_else(|| AudioFormat::from_url(url))
        .unwrap_or(AudioFormat::DEFAULT)
}

/// Resolves a path in `dir` that does not exist yet.
///
/// `song.mp3`, then `song_2.mp3`, `song_3.mp3`, ... A name is also skipped
/// while its `.part` working file exists, so two workers never share one.
pub(crate) fn resolve_unique_path(dir: &Path, filename: &str) -> PathBuf {
    let is_free = |path: &Path| !path.exists() && !partial_path(path).exists();

    let base_path = dir.join(filename);
    if is_free(&base_path) {
        return base_path;
    }

    let (stem, ext) = match filename.rfind('.') {
        Some(pos) if pos > 0 => (&filename[..pos], &filename[pos..]),
        _ => (filename, ""),
    };

    for i in 2..1000 {
        let candidate = dir.join(format!("{stem}_{i}{ext}"));
        if is_free(&candidate) {
            return candidate;
        }
    }

    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    dir.join(format!("{stem}_{timestamp}{ext}"))
}

/// Working-file path for a final destination.
pub(crate) fn partial_path(final_path: &Path) -> PathBuf {
    let mut name = final_path
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(PARTIAL_SUFFIX);
    final_path.with_file_name(name)
}

/// Deletes leftover `.part` working files in `dir`; returns how many were removed.
///
/// # Errors
///
/// Returns the IO error if `dir` cannot be listed. Individual files that
/// vanish or cannot be removed are logged and skipped.
pub async fn remove_partial_files(dir: &Path) -> std::io::Result<usize> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut removed = 0;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_partial = path
            .file_name()
            .is_some_and(|name| name.to_string_lossy().ends_with(PARTIAL_SUFFIX));
        if !is_partial {
            continue;
        }
        match tokio::fs::remove_file(&path).await {
            Ok(()) => removed += 1,
            Err(error) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %error,
                    "could not remove working file"
                );
            }
        }
    }

    Ok(removed)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_replaces_unsafe_characters() {
        assert_eq!(sanitize_filename("A/B:C*D"), "A_B_C_D");
        assert_eq!(sanitize_filename("a<b>c\"d|e?f\\g"), "a_b_c_d_e_f_g");
    }

    #[test]
    fn test_sanitize_collapses_whitespace() {
        assert_eq!(sanitize_filename("  01_Song \t  - \n Artist  "), "01_Song - Artist");
        assert_eq!(sanitize_filename("Rowdy\tBaby\r\nDhanush"), "Rowdy Baby Dhanush");
    }

    #[test]
    fn test_sanitize_replaces_non_whitespace_controls() {
        assert_eq!(sanitize_filename("Song\u{7}Title\u{0}"), "Song_Title_");
    }

    #[test]
    fn test_sanitize_truncates_to_100_chars() {
        let long = "x".repeat(250);
        assert_eq!(sanitize_filename(&long).chars().count(), 100);

        let multibyte = "é".repeat(150);
        assert_eq!(sanitize_filename(&multibyte).chars().count(), 100);
    }

    #[test]
    fn test_sanitize_empty_and_dot_names_fall_back() {
        assert_eq!(sanitize_filename(""), "track");
        assert_eq!(sanitize_filename("   "), "track");
        assert_eq!(sanitize_filename(".."), "track");
    }

    #[test]
    fn test_destination_filename_appends_extension_after_truncation() {
        let name = destination_filename(&"y".repeat(300), AudioFormat::Mp3);
        assert_eq!(name.len(), 104);
        assert!(name.ends_with(".mp3"));
    }

    #[test]
    fn test_destination_filename_keeps_existing_audio_extension() {
        assert_eq!(
            destination_filename("Track.MP3", AudioFormat::Flac),
            "Track.MP3"
        );
    }

    #[test]
    fn test_infer_format_precedence() {
        assert_eq!(
            infer_format(Some("audio/mp4"), "https://cdn.example.com/x.mp3"),
            AudioFormat::M4a
        );
        assert_eq!(
            infer_format(Some("application/octet-stream"), "https://cdn.example.com/x.wav"),
            AudioFormat::Wav
        );
        assert_eq!(
            infer_format(None, "https://cdn.example.com/download?id=4"),
            AudioFormat::Mp3
        );
    }

    #[test]
    fn test_resolve_unique_path_adds_suffix() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("song.mp3"), b"x").unwrap();
        let path = resolve_unique_path(dir.path(), "song.mp3");
        assert_eq!(path, dir.path().join("song_2.mp3"));
    }

    #[test]
    fn test_resolve_unique_path_skips_names_with_working_file() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("song.mp3.part"), b"x").unwrap();
        let path = resolve_unique_path(dir.path(), "song.mp3");
        assert_eq!(path, dir.path().join("song_2.mp3"));
    }

    #[test]
    fn test_partial_path_appends_suffix() {
        let path = partial_path(Path::new("/out/song.mp3"));
        assert_eq!(path, PathBuf::from("/out/song.mp3.part"));
    }

    #[tokio::test]
    async fn test_remove_partial_files_only_touches_working_files() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.mp3.part"), b"x").unwrap();
        std::fs::write(dir.path().join("b.m4a.part"), b"x").unwrap();
        std::fs::write(dir.path().join("keep.mp3"), b"x").unwrap();

        let removed = remove_partial_files(dir.path()).await.unwrap();

        assert_eq!(removed, 2);
        assert!(dir.path().join("keep.mp3").exists());
        assert!(!dir.path().join("a.mp3.part").exists());
    }
}
