//! Fetches YouTube videos with `yt-dlp` so they can go through the same video
//! pipeline as local files.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use colorize_common::ColorizeError;
use sha2::{Digest, Sha256};

/// Highest quality single file that carries both video and audio.
const PROGRESSIVE_FORMAT: &str =
    "best[vcodec!=none][acodec!=none][ext=mp4]/best[vcodec!=none][acodec!=none]";

const YOUTUBE_HOSTS: [&str; 2] = ["youtube.com", "youtu.be"];

/// Downloads each URL at most once. Results are cached in memory for the
/// session and on disk under `cache_dir`.
#[derive(Debug)]
pub struct YoutubeDownloader {
    cache_dir: PathBuf,
    program: PathBuf,
    cache: HashMap<String, PathBuf>,
}

impl YoutubeDownloader {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            program: PathBuf::from("yt-dlp"),
            cache: HashMap::new(),
        }
    }

    /// Overrides the downloader executable.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Local path of the downloaded video for `url`.
    pub fn fetch(&mut self, url: &str) -> Result<PathBuf, ColorizeError> {
        validate_url(url)?;

        if let Some(path) = self.cache.get(url).filter(|path| path.exists()) {
            log::info!("Reusing download of {url}: {path:?}");
            return Ok(path.clone());
        }

        let target = cache_path(&self.cache_dir, url);
        if target.exists() {
            log::info!("Found earlier download of {url}: {target:?}");
        } else {
            std::fs::create_dir_all(&self.cache_dir)?;
            self.download(url, &target)?;
        }
        self.cache.insert(url.to_string(), target.clone());
        Ok(target)
    }

    fn download(&self, url: &str, target: &Path) -> Result<(), ColorizeError> {
        let partial = target.with_extension("download");
        log::info!("Downloading {url} with {:?}", self.program);

        let output = Command::new(&self.program)
            .args(["--no-playlist", "--quiet", "--no-warnings", "-f", PROGRESSIVE_FORMAT, "-o"])
            .arg(&partial)
            .arg(url)
            .output()
            .map_err(|e| ColorizeError::Network(format!("failed to run {:?}: {e}", self.program)))?;

        if !output.status.success() {
            let _ = std::fs::remove_file(&partial);
            return Err(ColorizeError::Network(format!(
                "could not download {url}: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        if !partial.exists() {
            return Err(ColorizeError::Network(format!(
                "download of {url} produced no file"
            )));
        }
        std::fs::rename(&partial, target)?;
        Ok(())
    }
}

/// On-disk location for `url`, stable across runs and builds.
pub fn cache_path(cache_dir: &Path, url: &str) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(url.trim().as_bytes());
    cache_dir.join(format!("yt-{:x}.mp4", hasher.finalize()))
}

/// Accepts `http(s)` links on a YouTube host.
pub fn validate_url(url: &str) -> Result<(), ColorizeError> {
    let invalid = || ColorizeError::Network(format!("not a YouTube link: {url:?}"));

    let url = url.trim();
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(invalid)?;
    let authority = rest
        .split(|c| matches!(c, '/' | '?' | '#'))
        .next()
        .unwrap_or_default();
    let host = authority
        .rsplit('@')
        .next()
        .and_then(|h| h.split(':').next())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let known = YOUTUBE_HOSTS
        .iter()
        .any(|known| host == *known || host.ends_with(&format!(".{known}")));
    if !known || rest.len() <= authority.len() + 1 {
        return Err(invalid());
    }
    Ok(())
}
