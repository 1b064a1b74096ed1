//! Subtitle payload pipeline: `bytes → text → cues`
//!
//! Every step is a pure function so the network path only has to chain them.

use flate2::read::GzDecoder;
use regex::Regex;
use std::io::Read;
use std::sync::LazyLock;

use crate::error::ResolveError;
use crate::models::{SubFormat, SubtitleCue};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Minimum comma-separated fields of an ASS `Dialogue:` line
const ASS_DIALOGUE_FIELDS: usize = 10;

static ASS_OVERRIDE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^}]*\}").expect("valid override regex"));

static MARKUP_TAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));

pub fn is_gzip(bytes: &[u8]) -> bool {
    bytes.starts_with(&GZIP_MAGIC)
}

/// Gunzip when the payload carries the gzip magic; pass through otherwise
pub fn decompress(bytes: &[u8]) -> Result<Vec<u8>, ResolveError> {
    if !is_gzip(bytes) {
        return Ok(bytes.to_vec());
    }
    let mut out = Vec::new();
    GzDecoder::new(bytes)
        .read_to_end(&mut out)
        .map_err(|e| ResolveError::Parse(format!("corrupt gzip subtitle payload: {}", e)))?;
    Ok(out)
}

/// Lossy UTF-8 decode without a byte-order mark
pub fn decode_text(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    text.strip_prefix('\u{feff}').unwrap_or(&text).to_string()
}

/// Whole pipeline from downloaded bytes to SRT text
pub fn payload_to_srt(bytes: &[u8], format: SubFormat) -> Result<String, ResolveError> {
    let text = decode_text(&decompress(bytes)?);
    Ok(to_srt(&text, format))
}

/// Convert presentation-timed formats to SRT; others pass through
pub fn to_srt(content: &str, format: SubFormat) -> String {
    match format {
        SubFormat::Ass => ass_to_srt(content),
        SubFormat::Srt | SubFormat::WebVtt | SubFormat::Sub => content.to_string(),
    }
}

/// ASS/SSA dialogue lines → numbered SRT blocks
///
/// Content without any usable dialogue line is returned unchanged.
pub fn ass_to_srt(content: &str) -> String {
    let mut out = String::new();
    let mut counter = 1;

    for line in content.lines() {
        let Some(dialogue) = line.trim().strip_prefix("Dialogue:") else {
            continue;
        };
        // Layer,Start,End,Style,Name,MarginL,MarginR,MarginV,Effect,Text
        let fields: Vec<&str> = dialogue.trim().splitn(ASS_DIALOGUE_FIELDS, ',').collect();
        if fields.len() < ASS_DIALOGUE_FIELDS {
            continue;
        }
        let text = clean_ass_text(fields[9]);
        if text.is_empty() {
            continue;
        }

        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            counter,
            ass_time_to_srt(fields[1]),
            ass_time_to_srt(fields[2]),
            text
        ));
        counter += 1;
    }

    if out.is_empty() {
        content.to_string()
    } else {
        out
    }
}

/// `H:MM:SS.cc` → `HH:MM:SS,mmm`
///
/// The fraction is read as a decimal, so `.5`, `.50` and `.500` all mean
/// half a second; digits past milliseconds are dropped.
pub fn ass_time_to_srt(time: &str) -> String {
    let parts: Vec<&str> = time.trim().split(':').collect();
    if parts.len() != 3 {
        return "00:00:00,000".to_string();
    }
    let (secs, fraction) = parts[2].split_once('.').unwrap_or((parts[2], ""));
    let hours: u64 = parts[0].parse().unwrap_or(0);
    let minutes: u64 = parts[1].parse().unwrap_or(0);
    let seconds: u64 = secs.parse().unwrap_or(0);
    let millis: String = fraction
        .chars()
        .filter(char::is_ascii_digit)
        .chain(std::iter::repeat('0'))
        .take(3)
        .collect();
    format!("{:02}:{:02}:{:02},{}", hours, minutes, seconds, millis)
}

fn clean_ass_text(text: &str) -> String {
    ASS_OVERRIDE_REGEX
        .replace_all(text, "")
        .replace("\\N", "\n")
        .replace("\\n", "\n")
        .replace("\\h", " ")
        .trim()
        .to_string()
}

/// Seconds → `HH:MM:SS,mmm`
pub fn format_timestamp(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    format!(
        "{:02}:{:02}:{:02},{:03}",
        total_ms / 3_600_000,
        (total_ms % 3_600_000) / 60_000,
        (total_ms % 60_000) / 1000,
        total_ms % 1000
    )
}

/// `HH:MM:SS,mmm` (or `.mmm`, or `MM:SS.mmm`) → seconds
pub fn parse_timestamp(stamp: &str) -> Option<f64> {
    let stamp = stamp.trim().replace(',', ".");
    let parts: Vec<&str> = stamp.split(':').collect();
    let (h, m, s) = match parts.as_slice() {
        [h, m, s] => (h.parse::<f64>().ok()?, m.parse::<f64>().ok()?, s.parse::<f64>().ok()?),
        [m, s] => (0.0, m.parse::<f64>().ok()?, s.parse::<f64>().ok()?),
        _ => return None,
    };
    Some(h * 3600.0 + m * 60.0 + s)
}

/// Parse SRT (or WebVTT) text into cues sorted by start time
///
/// Markup tags are stripped from cue text; malformed blocks are skipped.
pub fn parse_srt(text: &str) -> Vec<SubtitleCue> {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");

    let mut cues: Vec<SubtitleCue> = normalized
        .split("\n\n")
        .filter_map(|block| {
            let mut lines = block.lines().skip_while(|l| !l.contains("-->"));
            let timing = lines.next()?;
            let (start, end) = timing.split_once("-->")?;
            // WebVTT settings may follow the end time
            let end = end.split_whitespace().next()?;
            let start = parse_timestamp(start)?;
            let end = parse_timestamp(end)?;

            let raw = lines.collect::<Vec<_>>().join("\n");
            let body = MARKUP_TAG_REGEX.replace_all(&raw, "").into_owned();
            Some(SubtitleCue::new(start, end, body.trim()))
        })
        .collect();

    cues.sort_by(|a, b| a.start.total_cmp(&b.start));
    cues
}
