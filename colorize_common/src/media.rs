//! Classifies input files by extension.

use std::path::Path;

use crate::error::ColorizeError;

pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];
pub const VIDEO_EXTENSIONS: [&str; 4] = ["mp4", "mov", "avi", "mkv"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Case-insensitive suffix match. Anything unrecognized is an explicit
    /// [`ColorizeError::UnsupportedFormat`].
    pub fn from_path(path: &Path) -> Result<Self, ColorizeError> {
        let ext = path
            .extension()
            .and_then(|os_str| os_str.to_str())
            .map(str::to_ascii_lowercase)
            .ok_or_else(|| ColorizeError::UnsupportedFormat(path.to_path_buf()))?;

        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Ok(MediaKind::Image)
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Ok(MediaKind::Video)
        } else {
            Err(ColorizeError::UnsupportedFormat(path.to_path_buf()))
        }
    }

    /// Like [`MediaKind::from_path`], but also rejects the other kind.
    pub fn expect(path: &Path, kind: MediaKind) -> Result<(), ColorizeError> {
        if MediaKind::from_path(path)? == kind {
            Ok(())
        } else {
            Err(ColorizeError::UnsupportedFormat(path.to_path_buf()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_case_insensitively() {
        assert_eq!(MediaKind::from_path(Path::new("a.JPG")).unwrap(), MediaKind::Image);
        assert_eq!(MediaKind::from_path(Path::new("b.Png")).unwrap(), MediaKind::Image);
        assert_eq!(MediaKind::from_path(Path::new("dir/c.MkV")).unwrap(), MediaKind::Video);
        assert_eq!(MediaKind::from_path(Path::new("d.mov")).unwrap(), MediaKind::Video);
    }

    #[test]
    fn uses_last_suffix_only() {
        // A dotted stem must not be mistaken for the extension.
        assert_eq!(
            MediaKind::from_path(Path::new("holiday.2019.mp4")).unwrap(),
            MediaKind::Video
        );
    }

    #[test]
    fn unknown_or_missing_extension_is_explicit() {
        for name in ["clip.webm", "notes.txt", "README"] {
            let err = MediaKind::from_path(Path::new(name)).unwrap_err();
            assert!(matches!(err, ColorizeError::UnsupportedFormat(p) if p == Path::new(name)));
        }
    }

    #[test]
    fn expect_rejects_other_kind() {
        assert!(MediaKind::expect(Path::new("x.png"), MediaKind::Image).is_ok());
        assert!(MediaKind::expect(Path::new("x.png"), MediaKind::Video).is_err());
    }
}
