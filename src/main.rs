mod common;
mod cmd_playlist;
mod cmd_video;

use std::path;
use std::process;

use clap::{Parser, Subcommand};
use colog;

/// Video downloader built on top of `yt-dlp`.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command : Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Downloads a single video, asking which quality to fetch.
    ///
    /// The URL is taken from the clipboard unless `--url` is given.
    Video {
        /// Directory to save the video into (defaults to the working
        /// directory, or `output-dir` in `tubefetch.toml`).
        output_dir : Option<path::PathBuf>,
        /// URL of the video, instead of reading the clipboard.
        #[arg(short, long)]
        url : Option<String>,
        /// Download this format id without asking.
        #[arg(short, long, group = "pick")]
        format : Option<String>,
        /// Let `yt-dlp` pick the best quality without asking.
        #[arg(short, long, group = "pick")]
        yes : bool,
    },
    /// Downloads every video of the playlist whose URL is in the clipboard,
    /// in the highest quality up to 1080p.
    Playlist {
        /// Directory to save the videos into (defaults to `playlist_results`).
        output_dir : Option<path::PathBuf>,
    },
}

fn main() {
    colog::init();
    let cli = Cli::parse();
    let result = common::Settings::load().and_then(|settings| match &cli.command {
        Commands::Video { output_dir, url, format, yes } => {
            let pick = match (format, yes) {
                (Some(format_id), _) => cmd_video::Pick::Explicit(format_id),
                (None, true) => cmd_video::Pick::Best,
                (None, false) => cmd_video::Pick::Interactive,
            };
            cmd_video::run(&settings, url.as_deref(), output_dir.as_deref(), pick)
        },
        Commands::Playlist { output_dir }
            => cmd_playlist::run(&settings, output_dir.as_deref()),
    });
    if let Err(msg) = result {
        log::error!("fatal error encountered: {}", msg);
        process::exit(1);
    }
}
