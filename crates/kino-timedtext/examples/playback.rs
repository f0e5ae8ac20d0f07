//! Timed text playback example
//!
//! Sets up two caption tracks, lets the engine pick one, then plays through a
//! seek and a layout switch while printing what reaches the surface.
//!
//! Run with: cargo run -p kino-timedtext --example playback

use kino_timedtext::{
    Cue, LayoutMode, LoadedTrack, MemoryTrackLoader, RecordingSurface, RenderInstruction, StyleDescriptor,
    TimedText, TrackDescriptor,
};
use std::collections::HashMap;
use std::sync::Arc;

fn english() -> LoadedTrack {
    let mut styles = HashMap::new();
    styles.insert("shout".to_string(), StyleDescriptor::new().with("color", "yellow"));

    LoadedTrack {
        cues: vec![
            Cue::new("1", 0.0, 3.0, "Welcome to Purple Squirrel Media!"),
            Cue::new("2", 3.5, 7.0, "This video demonstrates"),
            Cue::new("3", 5.0, 9.0, "[music]").with_style("shout"),
            Cue::new("4", 90.0, 95.0, "This caption appears at 1:30."),
        ],
        styles,
    }
}

fn print_log(surface: &RecordingSurface) {
    for instruction in surface.take_instructions() {
        match instruction {
            RenderInstruction::Add { cue_id, content, style, .. } => {
                println!("  + {} {:?} {}", cue_id, style.placement, content);
            }
            RenderInstruction::Remove { handle, removal } => {
                println!("  - handle {} {:?}", handle.0, removal);
            }
            RenderInstruction::Restyle { style } => {
                println!("  ~ restyle {:?}", style);
            }
        }
    }
}

#[tokio::main]
async fn main() {
    println!("Kino Timed Text - Playback Example");
    println!("==========================================\n");

    let loader = MemoryTrackLoader::new().with_track("en/SUB", english());
    let discovery = Arc::new(vec![
        TrackDescriptor::new("fr", "SUB").with_label("Français"),
        TrackDescriptor::new("en", "SUB").with_label("English"),
    ]);
    let surface = RecordingSurface::new();

    let timed_text = TimedText::builder(Arc::new(loader), discovery)
        .surface(surface.clone())
        .build()
        .await;

    let enabled = timed_text.setup_sources().await;
    println!("Enabled tracks: {:?}\n", enabled);

    for t in [1.0, 4.0, 6.0, 8.0, 92.0, 2.0] {
        println!("t = {:>5.1}s", t);
        timed_text.tick(t).await;
        print_log(&surface);
    }

    println!("\nSwitching layout to below...");
    timed_text.select_layout(LayoutMode::Below).await;
    print_log(&surface);

    println!("\nPreferences: {:?}", timed_text.preferences().await);
}
