use crate::common;
use crate::common::select;
use crate::common::url::{self, UrlMatcher};
use crate::common::ytdlp::{self, DownloadRequest, Extractor, MediaInfo, YtDlp};

use std::fs;
use std::io::{self, BufRead, Write};
use std::path;

use log;

const PLAYLIST_EXPRESSION : &'static str =
    "bestvideo[ext=mp4]+bestaudio[ext=m4a]/bestvideo[height<=1080]+bestaudio/best[height<=1080]";
const MERGE_FORMAT : &'static str = "mp4";
const DEFAULT_OUTPUT_DIR : &'static str = "playlist_results";

#[derive(Debug, PartialEq)]
pub enum Outcome {
    Cancelled,
    Completed { downloaded : usize, failed : usize },
}

pub fn run(settings : &common::Settings, output_dir : Option<&path::Path>) -> common::Result<()> {
    let url = common::clipboard::read_url()?;
    log::info!("found URL in clipboard: {}", url);
    let output_dir = settings.output_dir_or(output_dir, DEFAULT_OUTPUT_DIR);
    let extractor = YtDlp::new(settings);
    let stdin = io::stdin();
    let outcome = download_playlist(&extractor, &url, &output_dir, &mut stdin.lock(), &mut io::stdout())?;
    match outcome {
        Outcome::Cancelled => println!("Download cancelled."),
        Outcome::Completed { downloaded, failed } => {
            if failed > 0 {
                log::warn!("{} of {} videos could not be downloaded", failed, downloaded + failed);
            }
        },
    }
    Ok(())
}

/// `{dir}/{index:02} - {title}.%(ext)s`, with `index` counting from 1.
pub fn entry_template(output_dir : &path::Path, index : usize, title : &str) -> String {
    ytdlp::output_template(output_dir, &format!("{:02} - {}", index, title))
}

fn print_summary<W : Write>(info : &MediaInfo, output : &mut W) -> io::Result<usize> {
    let count = info.available_entries().count();
    writeln!(output, "\nPlaylist Information:")?;
    writeln!(output, "Title: {}", info.title_or("Unknown Playlist"))?;
    writeln!(output, "Uploader: {}", info.uploader.as_deref().unwrap_or("Unknown"))?;
    writeln!(output, "Video Count: {}", count)?;
    Ok(count)
}

fn download_entry<E : Extractor, W : Write>(
    extractor : &E,
    entry : &MediaInfo,
    template : String,
    output : &mut W,
) -> common::Result<()> {
    let Some(entry_url) = entry.source_url() else {
        return Err(Box::new(common::Error::Download("entry has no URL".to_owned())));
    };
    let request = DownloadRequest {
        url : entry_url.to_owned(),
        expression : PLAYLIST_EXPRESSION.to_owned(),
        template,
        merge_format : Some(MERGE_FORMAT.to_owned()),
    };
    extractor.download(&request, &mut |progress : &ytdlp::Progress| {
        let _ = writeln!(output, "{}", ytdlp::format_progress(progress));
    })
}

/// Downloads every available entry of a playlist after asking for
/// confirmation. Entries fail independently of each other.
pub fn download_playlist<E : Extractor, R : BufRead, W : Write>(
    extractor : &E,
    url : &str,
    output_dir : &path::Path,
    input : &mut R,
    output : &mut W,
) -> common::Result<Outcome> {
    let url = url::clean_url(url);
    if !UrlMatcher::new().is_playlist_url(&url) {
        log::info!("please copy a valid YouTube playlist URL to your clipboard\n\
                    example: https://www.youtube.com/playlist?list=...");
        return Err(Box::new(common::Error::InvalidUrl(url)));
    }
    log::info!("fetching playlist information...");
    let info = extractor.fetch_info(&url, true)?;
    let Some(entries) = &info.entries else {
        return Err(Box::new(common::Error::EmptyPlaylist));
    };
    let count = print_summary(&info, output)?;
    if count == 0 {
        return Err(Box::new(common::Error::EmptyPlaylist));
    }
    let question = format!("\nDo you want to download all {} videos in highest quality?", count);
    if !select::confirm(&question, input, output)? {
        return Ok(Outcome::Cancelled);
    }
    fs::create_dir_all(output_dir)?;
    log::info!("downloading to: {}", fs::canonicalize(output_dir)?.display());
    let mut downloaded = 0;
    let mut failed = 0;
    for (i, entry) in entries.iter().enumerate() {
        // numbering follows the playlist, unavailable entries keep their slot
        let index = i + 1;
        let Some(entry) = entry else {
            log::warn!("skipping unavailable video #{}", index);
            continue;
        };
        let title = entry.title_or("Untitled");
        log::info!("task [{} / {}] {}", index, entries.len(), title);
        let template = entry_template(output_dir, index, &title);
        match download_entry(extractor, entry, template, output) {
            Ok(()) => downloaded += 1,
            Err(err) => {
                log::warn!("failed to download '{}', skipping: {}", title, err);
                failed += 1;
            },
        }
    }
    log::info!("playlist download completed: {} downloaded, {} failed", downloaded, failed);
    Ok(Outcome::Completed { downloaded, failed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ytdlp::Progress;
    use std::cell::RefCell;
    use std::io::Cursor;

    const URL : &'static str = "https://www.youtube.com/playlist?list=PL123";

    struct FakeExtractor {
        info : MediaInfo,
        failing : &'static str,
        requests : RefCell<Vec<DownloadRequest>>,
    }

    impl Extractor for FakeExtractor {
        fn fetch_info(&self, _url : &str, playlist : bool) -> common::Result<MediaInfo> {
            assert!(playlist);
            Ok(self.info.clone())
        }

        fn download(
            &self,
            request : &DownloadRequest,
            on_progress : &mut dyn FnMut(&Progress),
        ) -> common::Result<()> {
            self.requests.borrow_mut().push(request.clone());
            if request.url == self.failing {
                return Err(Box::new(common::Error::Download("simulated".to_owned())));
            }
            on_progress(&Progress { percent : Some(50.0), total_bytes : None, filename : None });
            Ok(())
        }
    }

    fn entry(n : usize) -> Option<MediaInfo> {
        Some(MediaInfo {
            title : Some(format!("Video {}", n)),
            url : Some(format!("https://youtu.be/{}", n)),
            ..Default::default()
        })
    }

    fn fake(entries : Option<Vec<Option<MediaInfo>>>, failing : &'static str) -> FakeExtractor {
        FakeExtractor {
            info : MediaInfo {
                title : Some("Mix".to_owned()),
                uploader : Some("someone".to_owned()),
                entries,
                ..Default::default()
            },
            failing,
            requests : RefCell::new(Vec::new()),
        }
    }

    fn run_with(extractor : &FakeExtractor, url : &str, answers : &str) -> (common::Result<Outcome>, String, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mut input = Cursor::new(answers.as_bytes().to_vec());
        let mut output = Vec::new();
        let result = download_playlist(extractor, url, dir.path(), &mut input, &mut output);
        (result, String::from_utf8(output).unwrap(), dir)
    }

    #[test]
    fn failing_entry_does_not_stop_the_rest() {
        let extractor = fake(Some(vec![entry(1), entry(2), None, entry(4)]), "https://youtu.be/2");
        let (result, output, dir) = run_with(&extractor, URL, "y\n");
        assert_eq!(result.unwrap(), Outcome::Completed { downloaded : 2, failed : 1 });
        assert!(output.contains("Video Count: 3"));
        let requests = extractor.requests.borrow();
        let urls = requests.iter().map(|x| x.url.as_str()).collect::<Vec<_>>();
        assert_eq!(urls, ["https://youtu.be/1", "https://youtu.be/2", "https://youtu.be/4"]);
        let expected = dir.path().join("04 - Video 4.%(ext)s");
        assert_eq!(requests[2].template, expected.to_string_lossy());
        assert_eq!(requests[0].expression, PLAYLIST_EXPRESSION);
    }

    #[test]
    fn declining_cancels() {
        let extractor = fake(Some(vec![entry(1)]), "");
        let (result, output, _dir) = run_with(&extractor, URL, "n\n");
        assert_eq!(result.unwrap(), Outcome::Cancelled);
        assert!(output.contains("(y/N)"));
        assert!(extractor.requests.borrow().is_empty());
    }

    #[test]
    fn rejects_single_video_links() {
        let extractor = fake(Some(vec![entry(1)]), "");
        let (result, _, _dir) = run_with(&extractor, "https://www.youtube.com/watch?v=abc", "y\n");
        assert!(result.is_err());
    }

    #[test]
    fn missing_entries_is_an_error() {
        let extractor = fake(None, "");
        let (result, _, _dir) = run_with(&extractor, URL, "y\n");
        assert_eq!(result.unwrap_err().to_string(), "no videos found in the playlist");
        let extractor = fake(Some(vec![None, None]), "");
        let (result, _, _dir) = run_with(&extractor, URL, "y\n");
        assert!(result.is_err());
    }

    #[test]
    fn entry_numbers_are_zero_padded() {
        let template = entry_template(path::Path::new("out"), 7, "Intro");
        assert_eq!(template, path::Path::new("out").join("07 - Intro.%(ext)s").to_string_lossy());
    }

    #[test]
    fn long_entry_titles_fit_in_a_file_name() {
        let template = entry_template(path::Path::new("out"), 1, &"日本語のタイトル".repeat(20));
        let part_file = template.replace("%(ext)s", "f137.mp4.part");
        let name = path::Path::new(&part_file).file_name().unwrap().to_str().unwrap();
        assert!(name.len() <= 255, "{} bytes", name.len());
        assert!(name.starts_with("01 - "));
    }
}
