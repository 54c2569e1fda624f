//! Audio container formats recognised by the fetch pipeline.

use std::fmt;

use serde::Serialize;
use url::Url;

/// An audio format the pipeline knows how to name on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Mp3,
    M4a,
    Wav,
    Flac,
    Aac,
}

impl AudioFormat {
    /// Every supported format, in preference order.
    pub const ALL: [Self; 5] = [Self::Mp3, Self::M4a, Self::Wav, Self::Flac, Self::Aac];

    /// Format used when nothing else identifies the content.
    pub const DEFAULT: Self = Self::Mp3;

    /// File extension including the leading dot.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp3 => ".mp3",
            Self::M4a => ".m4a",
            Self::Wav => ".wav",
            Self::Flac => ".flac",
            Self::Aac => ".aac",
        }
    }

    /// Maps a Content-Type header value to a format.
    ///
    /// Parameters (`; charset=...`) are ignored and matching is case-insensitive.
    #[must_use]
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();

        match mime.as_str() {
            "audio/mpeg" | "audio/mp3" | "audio/mpeg3" | "audio/x-mpeg-3" => Some(Self::Mp3),
            "audio/mp4" | "audio/m4a" | "audio/x-m4a" => Some(Self::M4a),
            "audio/wav" | "audio/x-wav" | "audio/wave" => Some(Self::Wav),
            "audio/flac" | "audio/x-flac" => Some(Self::Flac),
            "audio/aac" | "audio/x-aac" => Some(Self::Aac),
            _ => None,
        }
    }

    /// Maps a path or file name suffix (`song.MP3`) to a format.
    #[must_use]
    pub fn from_suffix(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|format| lower.ends_with(format.extension()))
    }

    /// Maps a URL to a format by its last path segment, then by the whole
    /// string.
    ///
    /// Both `https://cdn.example.com/a.mp3?token=x` and
    /// `https://cdn.example.com/get?file=a.mp3` are recognised.
    #[must_use]
    pub fn from_url(url: &str) -> Option<Self> {
        Url::parse(url)
            .ok()
            .and_then(|parsed| {
                parsed
                    .path_segments()
                    .and_then(|mut segments| segments.next_back())
                    .and_then(Self::from_suffix)
            })
            .or_else(|| Self::from_suffix(url.trim()))
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension().trim_start_matches('.'))
    }
}

/// Returns true when a declared content kind looks like audio.
///
/// Deliberately loose: catalog CDNs label tracks as `audio/*`,
/// `application/mpeg`, `video/mp4` and similar.
#[must_use]
pub fn is_audio_content_type(content_type: &str) -> bool {
    let lower = content_type.to_ascii_lowercase();
    ["audio", "mpeg", "mp3", "mp4"]
        .iter()
        .any(|marker| lower.contains(marker))
}
