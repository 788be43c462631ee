use std::io::{self, BufRead, BufReader, Read};
use std::path;
use std::process;

use log;
use sanitise_file_name as sfn;
use serde::{Deserialize, Deserializer};

use crate::common;
use crate::common::format::{self, FormatDescriptor};

/// Metadata for a single video, or a playlist when `entries` is present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaInfo {
    #[serde(default)]
    pub title : Option<String>,
    #[serde(default)]
    pub duration : Option<f64>,
    #[serde(default)]
    pub uploader : Option<String>,
    #[serde(default)]
    pub webpage_url : Option<String>,
    #[serde(default)]
    pub url : Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub formats : Vec<FormatDescriptor>,
    /// Unavailable playlist entries come through as `None`.
    #[serde(default)]
    pub entries : Option<Vec<Option<MediaInfo>>>,
}

fn null_as_default<'de, D, T>(de : D) -> Result<T, D::Error>
where
    D : Deserializer<'de>,
    T : Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(de)?.unwrap_or_default())
}

impl MediaInfo {
    pub fn title_or(&self, default : &str) -> String {
        self.title.clone().unwrap_or_else(|| default.to_owned())
    }

    /// The link to hand back to the extractor when downloading this item.
    pub fn source_url(&self) -> Option<&str> {
        self.webpage_url.as_deref().or(self.url.as_deref())
    }

    pub fn available_entries(&self) -> impl Iterator<Item = &MediaInfo> {
        self.entries.iter().flatten().flatten()
    }
}

/// Everything needed to run a single download.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadRequest {
    pub url : String,
    /// Format selection expression, e.g. `137+bestaudio/137`.
    pub expression : String,
    /// Output path template, may contain `%(ext)s` and friends.
    pub template : String,
    pub merge_format : Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Progress {
    pub percent : Option<f64>,
    pub total_bytes : Option<u64>,
    pub filename : Option<String>,
}

const PROGRESS_PREFIX : &'static str = "tubefetch-progress|";

const PROGRESS_TEMPLATE : &'static str = "download:tubefetch-progress|\
    %(progress.downloaded_bytes)s|%(progress.total_bytes)s|\
    %(progress.total_bytes_estimate)s|%(progress.filename)s";

fn parse_number(field : &str) -> Option<f64> {
    field.trim().parse::<f64>().ok().filter(|x| x.is_finite())
}

/// Reads one of the machine-readable lines requested through
/// `--progress-template`. Fields the extractor does not know are `NA`.
pub fn parse_progress(line : &str) -> Option<Progress> {
    let fields = line.trim_end().strip_prefix(PROGRESS_PREFIX)?;
    let mut fields = fields.splitn(4, '|');
    let downloaded = parse_number(fields.next()?);
    let total = parse_number(fields.next()?);
    let estimate = parse_number(fields.next()?);
    let filename = fields.next().filter(|x| !x.is_empty() && *x != "NA");
    let total = total.or(estimate).filter(|x| *x > 0.0);
    let percent = match (downloaded, total) {
        (Some(done), Some(total)) => Some((done / total * 100.0).min(100.0)),
        _ => None,
    };
    Some(Progress {
        percent,
        total_bytes : total.map(|x| x as u64),
        filename : filename.map(str::to_owned),
    })
}

/// `Downloading: 42.0% of 1.5MB - video.mp4`
pub fn format_progress(progress : &Progress) -> String {
    let percent = progress.percent.map_or("?%".to_owned(), |x| format!("{:.1}%", x));
    format!("Downloading: {} of {} - {}",
        percent,
        format::format_size(progress.total_bytes),
        progress.filename.as_deref().unwrap_or("Unknown"),
    )
}

/// Bytes reserved after the file stem for what the extractor appends, such
/// as `.f137.mp4.part` while a download is in flight.
const SUFFIX_RESERVE : usize = 32;

/// Joins a directory and a file stem into an `-o` template ending in
/// `.%(ext)s`. Both parts have `%` escaped so only the extension is expanded.
pub fn output_template(output_dir : &path::Path, stem : &str) -> String {
    let stem = sfn::sanitise_with_options(stem, &sfn::Options {
        reserve_extra : SUFFIX_RESERVE,
        ..sfn::Options::DEFAULT
    });
    let dir = output_dir.to_string_lossy().replace('%', "%%");
    let file_name = format!("{}.%(ext)s", stem.replace('%', "%%"));
    path::Path::new(&dir).join(file_name).to_string_lossy().into_owned()
}

// lines are decoded lossily, file names in progress lines need not be UTF-8
fn stream_progress<R : Read>(
    stdout : R,
    on_progress : &mut dyn FnMut(&Progress),
) -> io::Result<()> {
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(());
        }
        let line = String::from_utf8_lossy(&buf);
        match parse_progress(&line) {
            Some(progress) => on_progress(&progress),
            None => log::debug!("{}", line.trim_end()),
        }
    }
}

/// The external program doing the actual extraction and downloading.
pub trait Extractor {
    /// Queries metadata without downloading anything.
    fn fetch_info(&self, url : &str, playlist : bool) -> common::Result<MediaInfo>;

    /// Downloads and muxes, reporting progress as it goes.
    fn download(
        &self,
        request : &DownloadRequest,
        on_progress : &mut dyn FnMut(&Progress),
    ) -> common::Result<()>;
}

#[derive(Debug, Clone)]
pub struct YtDlp {
    path : path::PathBuf,
    ffmpeg_path : Option<path::PathBuf>,
}

impl YtDlp {
    pub fn new(settings : &common::Settings) -> Self {
        Self {
            path : settings.ytdlp_path.clone(),
            ffmpeg_path : settings.ffmpeg_path.clone(),
        }
    }

    fn command(&self) -> process::Command {
        let mut proc = process::Command::new(&self.path);
        if let Some(ffmpeg_path) = &self.ffmpeg_path {
            proc.arg("--ffmpeg-location").arg(ffmpeg_path);
        }
        proc
    }
}

impl Extractor for YtDlp {
    fn fetch_info(&self, url : &str, playlist : bool) -> common::Result<MediaInfo> {
        let mut proc = self.command();
        proc.args(["-J", "--no-warnings"]);
        proc.arg(if playlist { "--yes-playlist" } else { "--no-playlist" });
        if playlist {
            // keep going when some of the entries are unavailable
            proc.arg("--ignore-errors");
        }
        proc.arg(url);
        proc.stdin(process::Stdio::null());
        log::debug!("running process with args: {:?}", proc.get_args());
        let output = proc.output()?;
        if !output.status.success() && (!playlist || output.stdout.is_empty()) {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Box::new(common::Error::Extraction(stderr.trim().to_owned())));
        }
        let info = serde_json::from_slice::<MediaInfo>(&output.stdout)?;
        Ok(info)
    }

    fn download(
        &self,
        request : &DownloadRequest,
        on_progress : &mut dyn FnMut(&Progress),
    ) -> common::Result<()> {
        let mut proc = self.command();
        proc.args(["--no-playlist", "--newline", "--progress-template", PROGRESS_TEMPLATE]);
        proc.args(["-f", request.expression.as_str()]);
        if let Some(merge_format) = &request.merge_format {
            proc.args(["--merge-output-format", merge_format.as_str()]);
        }
        proc.args(["-o", request.template.as_str()]);
        proc.arg(&request.url);
        proc.stdin(process::Stdio::null());
        proc.stdout(process::Stdio::piped());
        proc.stderr(process::Stdio::inherit()); // errors go straight to the user
        log::debug!("running process with args: {:?}", proc.get_args());
        let mut child = proc.spawn()?;
        let streamed = match child.stdout.take() {
            Some(stdout) => stream_progress(stdout, on_progress),
            None => Ok(()),
        };
        // always reap the child, even if reading its output failed
        let status = child.wait()?;
        streamed?;
        if !status.success() {
            return Err(Box::new(common::Error::Download(format!("yt-dlp exited with {}", status))));
        }
        Ok(())
    }
}
