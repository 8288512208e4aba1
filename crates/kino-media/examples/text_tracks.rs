//! Text track example
//!
//! Demonstrates caption/subtitle exclusivity, cue lookup and the list events
//! a UI would listen to.
//!
//! Run with: cargo run -p kino-media --example text_tracks

use kino_media::tracks::{TextTrack, TextTrackList};
use kino_media::{ListEvent, TextCue, TextTrackKind, TextTrackMode};
use std::sync::Arc;

fn main() {
    println!("Kino Media - Text Track Example");
    println!("==========================================\n");

    let tracks = TextTrackList::new();
    let _sub = tracks.subscribe(|event| match event {
        ListEvent::ModeChange { item, .. } => {
            println!("  [mode-change] {} -> {}", item.id, item.mode());
        }
        ListEvent::Change { current, .. } => {
            let current = current.as_ref().map_or("none", |t| t.id.as_str());
            println!("  [change] selected: {}", current);
        }
        other => println!("  [{}]", other.name()),
    });

    let english = Arc::new(
        TextTrack::new("subs-en", TextTrackKind::Subtitles, "English", "en").with_default(true),
    );
    let spanish = Arc::new(TextTrack::new("subs-es", TextTrackKind::Subtitles, "Español", "es"));
    let chapters = Arc::new(TextTrack::new("chapters", TextTrackKind::Chapters, "Chapters", "en"));

    println!("Adding tracks (the default subtitle track is shown):");
    tracks.add(english.clone(), None);
    tracks.add(spanish.clone(), None);
    tracks.add(chapters.clone(), None);

    english.add_cue(TextCue::new("1", 0.0, 3.0, "Welcome to Purple Squirrel Media!"));
    english.add_cue(TextCue::new("2", 3.5, 7.0, "This video demonstrates our player."));
    spanish.add_cue(TextCue::new("1", 0.0, 3.0, "¡Bienvenidos!"));

    println!("\nShowing Spanish subtitles (English is hidden automatically):");
    tracks.set_mode(&spanish, TextTrackMode::Showing, None);

    println!("\nShowing chapters (a separate group, subtitles stay on):");
    tracks.set_mode(&chapters, TextTrackMode::Showing, None);

    println!("\nCurrently showing:");
    for track in tracks.iter().filter(|t| t.mode() == TextTrackMode::Showing) {
        println!("  {} ({}, {})", track.label, track.kind, track.language);
    }

    println!("\nActive cues at 1.5s:");
    for track in tracks.iter() {
        for cue in track.active_cues(1.5) {
            println!("  {}: {}", track.id, cue.text);
        }
    }
}
