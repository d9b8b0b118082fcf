//! Output formatting for CLI

use avplayer_core::{PlayerEvent, PlayerId, PlayerSnapshot};
use console::style;
use serde::Serialize;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Text,
        }
    }
}

/// One JSON object per line, tagged with the player id
#[derive(Serialize)]
struct TaggedEvent<'a> {
    id: PlayerId,
    #[serde(flatten)]
    event: &'a PlayerEvent,
}

fn millis(value: i64) -> String {
    format!("{}.{:03}s", value / 1000, (value % 1000).abs())
}

pub fn print_event(id: PlayerId, event: &PlayerEvent, format: OutputFormat) {
    if format == OutputFormat::Json {
        match serde_json::to_string(&TaggedEvent { id, event }) {
            Ok(line) => println!("{line}"),
            Err(e) => eprintln!("unserializable event: {e}"),
        }
        return;
    }

    let tag = style(format!("[{id}]")).dim();
    let name = style(event.name());
    match event {
        PlayerEvent::MediaInfo { duration, tracks, source } => {
            let duration = if *duration == 0 { "live".to_string() } else { millis(*duration) };
            println!("{tag} {} {source} ({duration})", name.green().bold());
            for (key, track) in tracks.iter().flatten() {
                println!(
                    "      {key:>5} {:?} {} {}",
                    track.kind,
                    track.language.as_deref().unwrap_or("-"),
                    track.format.as_deref().unwrap_or("-"),
                );
            }
        }
        PlayerEvent::VideoSize { width, height } => println!("{tag} {} {width}x{height}", name.cyan()),
        PlayerEvent::Position { value } => println!("{tag} {} {}", name.dim(), millis(*value)),
        PlayerEvent::Buffer { begin, end } => {
            println!("{tag} {} {} .. {}", name.dim(), millis(*begin), millis(*end))
        }
        PlayerEvent::Loading { value } => println!("{tag} {} {value}", name.yellow()),
        PlayerEvent::SeekEnd | PlayerEvent::Finished => println!("{tag} {}", name.green()),
        PlayerEvent::Error { value } => println!("{tag} {} {value}", name.red().bold()),
    }
}

pub fn print_summary(snapshot: &PlayerSnapshot, format: OutputFormat) {
    if format == OutputFormat::Json {
        if let Ok(line) = serde_json::to_string(snapshot) {
            println!("{line}");
        }
        return;
    }
    let frames = &snapshot.frames;
    println!("\n{}", style("Summary:").bold());
    println!("  State: {:?}", snapshot.state);
    println!("  Generation: {}", snapshot.generation);
    println!(
        "  Frames: {} copied, {} presented, {} skipped busy, {} failed",
        frames.copies_started, frames.presented, frames.skipped_busy, frames.copies_failed
    );
}

/// Format output based on selected format
pub fn format_output<T: Serialize>(data: &T, format: OutputFormat) -> anyhow::Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string(data)?,
        OutputFormat::Text => serde_json::to_string_pretty(data)?,
    })
}
