use crate::common;
use crate::common::format::{self, Selection};
use crate::common::select;
use crate::common::url::{self, UrlMatcher};
use crate::common::ytdlp::{self, DownloadRequest, Extractor, YtDlp};

use std::fs;
use std::io::{self, BufRead, Write};
use std::path;

use log;

/// Used when no format is picked, leaving the choice to the extractor.
const DEFAULT_EXPRESSION : &'static str = "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best";
const MERGE_FORMAT : &'static str = "mp4";

/// How the format gets chosen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pick<'a> {
    /// Ask the user.
    Interactive,
    /// Let the extractor take the best it can find.
    Best,
    /// Use this format id.
    Explicit(&'a str),
}

#[derive(Debug, PartialEq)]
pub enum Outcome {
    Downloaded(Selection),
    Cancelled,
}

pub fn run(
    settings : &common::Settings,
    url : Option<&str>,
    output_dir : Option<&path::Path>,
    pick : Pick,
) -> common::Result<()> {
    let url = match url {
        Some(url) => url.to_owned(),
        None => {
            let url = common::clipboard::read_url()?;
            log::info!("found URL in clipboard: {}", url);
            url
        },
    };
    let output_dir = settings.output_dir_or(output_dir, ".");
    let extractor = YtDlp::new(settings);
    let stdin = io::stdin();
    let outcome = download_video(
        &extractor, &url, &output_dir, pick, &mut stdin.lock(), &mut io::stdout(),
    )?;
    if outcome == Outcome::Cancelled {
        log::info!("download cancelled");
    }
    Ok(())
}

/// Builds the output template `{dir}/{title} - {label}.%(ext)s`.
pub fn output_template(output_dir : &path::Path, title : &str, label : &str) -> String {
    ytdlp::output_template(output_dir, &format!("{} - {}", title, label))
}

pub fn format_expression(selection : &Selection) -> String {
    match &selection.format_id {
        Some(id) => format!("{}+bestaudio/{}", id, id),
        None => DEFAULT_EXPRESSION.to_owned(),
    }
}

pub fn download_video<E : Extractor, R : BufRead, W : Write>(
    extractor : &E,
    url : &str,
    output_dir : &path::Path,
    pick : Pick,
    input : &mut R,
    output : &mut W,
) -> common::Result<Outcome> {
    let url = url::clean_url(url);
    if !UrlMatcher::new().is_web_url(&url) {
        return Err(Box::new(common::Error::InvalidUrl(url)));
    }
    log::info!("fetching video information...");
    let info = extractor.fetch_info(&url, false)?;
    let title = info.title_or("Untitled");
    writeln!(output, "Title: {}", title)?;
    match info.duration {
        Some(duration) => writeln!(output, "Duration: {:.0} seconds", duration)?,
        None => writeln!(output, "Duration: Unknown")?,
    }
    writeln!(output, "Uploader: {}", info.uploader.as_deref().unwrap_or("Unknown"))?;
    let ranked = format::rank(&info.formats);
    if ranked.is_empty() {
        return Err(Box::new(common::Error::NoSuitableFormats));
    }
    let selection = match pick {
        Pick::Explicit(format_id) => Selection::explicit(&info.formats, format_id, info.duration)?,
        Pick::Best => Selection::inferred(&info.formats, info.duration),
        Pick::Interactive => match select::choose(&ranked, info.duration, input, output)? {
            Some(format) => Selection::of(format, info.duration),
            None => return Ok(Outcome::Cancelled),
        },
    };
    fs::create_dir_all(output_dir)?;
    let request = DownloadRequest {
        url : info.source_url().unwrap_or(&url).to_owned(),
        expression : format_expression(&selection),
        template : output_template(output_dir, &title, &selection.label),
        merge_format : Some(MERGE_FORMAT.to_owned()),
    };
    log::info!("starting download: {} ({}, about {})",
        title, selection.label, format::format_size(selection.estimated_size));
    extractor.download(&request, &mut |progress : &ytdlp::Progress| {
        // progress lines are best-effort, a closed stdout must not abort the download
        let _ = writeln!(output, "{}", ytdlp::format_progress(progress));
    })?;
    log::info!("download completed successfully, saved to: {}", output_dir.display());
    Ok(Outcome::Downloaded(selection))
}
