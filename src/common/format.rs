use std::cmp;

use serde::{Deserialize, Deserializer};

use crate::common;

/// One downloadable stream variant, as reported by the extractor.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FormatDescriptor {
    pub format_id : String,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub height : Option<u32>,
    #[serde(default)]
    pub ext : String,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub filesize : Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub filesize_approx : Option<u64>,
    #[serde(default)]
    pub tbr : Option<f64>,
    #[serde(default)]
    pub vbr : Option<f64>,
    #[serde(default)]
    pub fps : Option<f64>,
    #[serde(default)]
    pub vcodec : Option<String>,
}

// some extractors report sizes and heights as floats
fn lenient_u64<'de, D : Deserializer<'de>>(de : D) -> Result<Option<u64>, D::Error> {
    let value = Option::<f64>::deserialize(de)?;
    Ok(value.filter(|x| x.is_finite() && *x >= 0.0).map(|x| x as u64))
}

fn lenient_u32<'de, D : Deserializer<'de>>(de : D) -> Result<Option<u32>, D::Error> {
    let value = Option::<f64>::deserialize(de)?;
    Ok(value.filter(|x| x.is_finite() && *x >= 0.0).map(|x| x as u32))
}

/// Containers that only ever hold previews or storyboards.
const PREVIEW_EXTS : &'static [&'static str] = &["mhtml"];

pub fn is_video_format(format : &FormatDescriptor) -> bool {
    format.height.is_some() && !PREVIEW_EXTS.contains(&format.ext.as_str())
}

fn rank_order(a : &FormatDescriptor, b : &FormatDescriptor) -> cmp::Ordering {
    a.height.unwrap_or(0).cmp(&b.height.unwrap_or(0))
        .then_with(|| a.tbr.unwrap_or(0.0).total_cmp(&b.tbr.unwrap_or(0.0)))
        .then_with(|| a.filesize.unwrap_or(0).cmp(&b.filesize.unwrap_or(0)))
}

/// Drops audio-only and preview streams, then orders the rest from the
/// highest quality down. Equal entries keep their original order.
pub fn rank(formats : &[FormatDescriptor]) -> Vec<&FormatDescriptor> {
    let mut ranked = formats.iter()
            .filter(|x| is_video_format(x))
            .collect::<Vec<_>>();
    ranked.sort_by(|a, b| rank_order(b, a));
    ranked
}

type SizeStrategy = fn(&FormatDescriptor, Option<f64>) -> Option<u64>;

fn exact_size(format : &FormatDescriptor, _ : Option<f64>) -> Option<u64> { format.filesize }
fn approx_size(format : &FormatDescriptor, _ : Option<f64>) -> Option<u64> { format.filesize_approx }

fn bitrate_size(format : &FormatDescriptor, duration : Option<f64>) -> Option<u64> {
    let tbr = format.tbr?;
    let duration = duration?;
    Some((tbr * 1000.0 * duration / 8.0) as u64)
}

const SIZE_STRATEGIES : &'static [SizeStrategy] = &[exact_size, approx_size, bitrate_size];

/// Best guess at the number of bytes a format will take up. Only good
/// enough for display.
pub fn estimate_size(format : &FormatDescriptor, duration : Option<f64>) -> Option<u64> {
    SIZE_STRATEGIES.iter().find_map(|strategy| strategy(format, duration))
}

pub fn format_size(size : Option<u64>) -> String {
    let Some(size) = size else {
        return "Unknown".to_owned();
    };
    let mut value = size as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if value < 1024.0 {
            return format!("{:.1}{}", value, unit);
        }
        value /= 1024.0;
    }
    format!("{:.1}TB", value)
}

/// Formats a rate given in bits per second.
pub fn format_bitrate(bits_per_second : Option<f64>) -> String {
    match bits_per_second {
        Some(bps) => format!("{:.1}kbps", bps / 1000.0),
        None => "Unknown".to_owned(),
    }
}

pub fn format_fps(fps : Option<f64>) -> String {
    match fps {
        Some(fps) => format!("{:.0}", fps),
        None => "N/A".to_owned(),
    }
}

pub fn quality_label(height : Option<u32>) -> String {
    let Some(height) = height else {
        return "Unknown".to_owned();
    };
    let label = match height {
        0..=480 => "SD",
        481..=720 => "HD",
        721..=1080 => "FHD",
        1081..=1440 => "QHD",
        1441..=2160 => "4K",
        2161..=4320 => "8K",
        _ => return format!("{}p", height),
    };
    label.to_owned()
}

fn best_order(a : &&FormatDescriptor, b : &&FormatDescriptor) -> cmp::Ordering {
    a.height.unwrap_or(0).cmp(&b.height.unwrap_or(0))
        .then_with(|| a.tbr.unwrap_or(0.0).total_cmp(&b.tbr.unwrap_or(0.0)))
}

/// Guesses which format the extractor will settle on when left to its own
/// devices, so the result can be labelled before downloading.
pub fn infer_best(formats : &[FormatDescriptor]) -> Option<&FormatDescriptor> {
    let has_video = |x : &&FormatDescriptor| {
        x.height.is_some() && x.vcodec.as_deref().map_or(false, |codec| codec != "none")
    };
    // `max_by` keeps the last of equal elements, reversing makes the first win
    formats.iter()
        .filter(has_video)
        .rev()
        .max_by(best_order)
        .or_else(|| formats.iter().rev().max_by(best_order))
}

/// What will be downloaded, and how to describe it.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// `None` leaves the choice to the extractor's own format expression.
    pub format_id : Option<String>,
    pub label : String,
    pub estimated_size : Option<u64>,
}

impl Selection {
    pub fn of(format : &FormatDescriptor, duration : Option<f64>) -> Self {
        Self {
            format_id : Some(format.format_id.clone()),
            label : quality_label(format.height),
            estimated_size : estimate_size(format, duration),
        }
    }

    /// Describes the extractor's default choice without pinning a format.
    pub fn inferred(formats : &[FormatDescriptor], duration : Option<f64>) -> Self {
        let best = infer_best(formats);
        Self {
            format_id : None,
            label : quality_label(best.and_then(|x| x.height)),
            estimated_size : best.and_then(|x| estimate_size(x, duration)),
        }
    }

    /// Looks up an explicitly requested format id.
    pub fn explicit(
        formats : &[FormatDescriptor],
        format_id : &str,
        duration : Option<f64>,
    ) -> common::Result<Self> {
        match formats.iter().find(|x| x.format_id == format_id) {
            Some(format) => Ok(Self::of(format, duration)),
            None => Err(Box::new(common::Error::UnknownFormat(format_id.to_owned()))),
        }
    }
}

/// A single menu line: `index. heightp | size | bitrate | fps | ext`.
pub fn describe(index : usize, format : &FormatDescriptor, duration : Option<f64>) -> String {
    let height = format.height.map_or("?".to_owned(), |x| x.to_string());
    format!("{}. {}p | {} | {} | {} | {}",
        index,
        height,
        format_size(estimate_size(format, duration)),
        format_bitrate(format.tbr.or(format.vbr).map(|x| x * 1000.0)),
        format_fps(format.fps),
        format.ext,
    )
}
