pub mod clipboard;
pub mod format;
pub mod select;
pub mod url;
pub mod ytdlp;

use std::fmt;
use std::fs;
use std::path;

use which::which;
use toml;
use log;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

const CONFIG_PATH : &'static str = "tubefetch.toml";

#[derive(Debug)]
pub enum Error {
    /// Nothing usable was found in the clipboard.
    EmptyClipboard,
    /// The URL failed validation.
    InvalidUrl(String),
    /// A required executable could not be located.
    ToolNotFound(String),
    /// The metadata query failed, carries the tool's stderr.
    Extraction(String),
    /// The download process failed.
    Download(String),
    /// Filtering left no video formats to choose from.
    NoSuitableFormats,
    /// An explicit format id that the media does not offer.
    UnknownFormat(String),
    /// A playlist query returned no entries.
    EmptyPlaylist,
}

impl fmt::Display for Error {
    fn fmt(&self, f : &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyClipboard => write!(f, "no URL found in clipboard"),
            Self::InvalidUrl(url) => write!(f, "not a valid URL: {}", url),
            Self::ToolNotFound(tool) => write!(f, "cannot find executable: {}", tool),
            Self::Extraction(msg) => write!(f, "failed to fetch media information: {}", msg),
            Self::Download(msg) => write!(f, "download failed: {}", msg),
            Self::NoSuitableFormats => write!(f, "no suitable formats found"),
            Self::UnknownFormat(id) => write!(f, "format not available: {}", id),
            Self::EmptyPlaylist => write!(f, "no videos found in the playlist"),
        }
    }
}

impl std::error::Error for Error {}

pub fn find_config(key : &str) -> Option<String> {
    let file = fs::read_to_string(CONFIG_PATH).ok()?;
    let value = file.parse::<toml::Table>().ok()?;
    let toml_value = value.get(key)?.as_str()?;
    return Some(toml_value.to_owned());
}

/// Looks up an executable, first through the config file and then through
/// each of the candidate names in `PATH`.
pub fn find_tool(config_key : &str, candidates : &[&str]) -> Option<path::PathBuf> {
    if let Some(config_path) = find_config(config_key) {
        match fs::exists(&config_path) {
            Ok(exists) => if exists {
                return Some(config_path.into())
            },
            Err(msg) => log::error!("{}", msg),
        }
        log::warn!("installation does not exist at: {}\n\
                    looking for installation in PATH", config_path);
    }
    for (i, candidate) in candidates.iter().enumerate() {
        if let Ok(tool_path) = which(candidate) {
            return Some(tool_path);
        }
        if let Some(next) = candidates.get(i + 1) {
            log::warn!("cannot find executable to `{}`, falling back to `{}`...", candidate, next);
        }
    }
    return None;
}

/// Everything the commands need to know about the environment, resolved
/// once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub ytdlp_path : path::PathBuf,
    pub ffmpeg_path : Option<path::PathBuf>,
    pub output_dir : Option<path::PathBuf>,
}

impl Settings {
    pub fn load() -> Result<Self> {
        let Some(ytdlp_path) = find_tool("yt-dlp", &["yt-dlp", "youtube-dl"]) else {
            log::info!("make sure `yt-dlp` or `youtube-dl` is in your PATH\n\
                        alternatively, add `yt-dlp = <path>` to your `{}`", CONFIG_PATH);
            return Err(Box::new(Error::ToolNotFound("yt-dlp".to_owned())));
        };
        let ffmpeg_path = find_tool("ffmpeg", &["ffmpeg"]);
        if ffmpeg_path.is_none() {
            log::warn!("cannot find executable to `ffmpeg`, merging audio and video may fail");
        }
        Ok(Self {
            ytdlp_path,
            ffmpeg_path,
            output_dir : find_config("output-dir").map(path::PathBuf::from),
        })
    }

    /// Picks the output directory: the command line wins, then the config
    /// file, then the given fallback.
    pub fn output_dir_or(&self, cli : Option<&path::Path>, fallback : &str) -> path::PathBuf {
        cli.map(path::Path::to_path_buf)
            .or_else(|| self.output_dir.clone())
            .unwrap_or_else(|| path::PathBuf::from(fallback))
    }
}
