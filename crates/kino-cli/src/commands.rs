//! CLI command implementations

use crate::element::HeadlessElement;
use crate::engine::{ManifestEngineFactory, Presentation};
use crate::output::{format_rows, format_value, OutputFormat};
use anyhow::Context;
use kino_media::loader::{default_loaders, LoaderDeps};
use kino_media::{
    HttpSourceProbe, MediaContext, MediaPlayer, PlayerConfig, ResolveOutcome, Source,
    SourceSelector, Trigger,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tabled::Tabled;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// How long `inspect` waits for the engine to report its levels
const LEVELS_TIMEOUT: Duration = Duration::from_secs(10);

/// `SRC` or `SRC;TYPE`
fn parse_source(arg: &str) -> Source {
    match arg.rsplit_once(';') {
        Some((src, mime)) if !mime.is_empty() => Source::new(src, mime.trim().to_ascii_lowercase()),
        _ => Source::from(arg),
    }
}

#[derive(Debug, Serialize)]
struct ResolveReport {
    source: String,
    #[serde(rename = "type")]
    mime: String,
    loader: String,
    media_type: String,
    candidates: usize,
}

/// Run source selection against the default loader set
pub async fn resolve(sources: &[String], config: PlayerConfig, format: OutputFormat) -> anyhow::Result<()> {
    let candidates: Vec<Source> = sources.iter().map(|s| parse_source(s)).collect();
    info!(count = candidates.len(), "Resolving sources");

    // Embed loaders need a frame channel; nothing is rendered here
    let (frame, _frame_rx) = mpsc::unbounded_channel();
    let adaptive = Arc::new(ManifestEngineFactory::default());
    let deps = LoaderDeps {
        hls_engine: Some(adaptive.clone()),
        dash_engine: Some(adaptive),
        embed_frame: Some(frame),
    };
    let loaders = default_loaders(&config, deps);
    let probe = Arc::new(HttpSourceProbe::new(config.probe_timeout())?);
    let ctx = Arc::new(MediaContext::new(config)?);
    let selector = SourceSelector::new(ctx.clone(), loaders, probe);

    let trigger = Trigger::new("cli-resolve");
    let report = match selector.resolve(candidates.clone(), Some(&trigger)).await {
        ResolveOutcome::Resolved { source, loader, .. } => ResolveReport {
            mime: source.mime.clone(),
            source: source.src,
            loader: loader.map_or_else(|| "none".to_string(), |l| l.name().to_string()),
            media_type: ctx.store.media_type.get().to_string(),
            candidates: candidates.len(),
        },
        ResolveOutcome::Superseded => anyhow::bail!("resolution was superseded"),
    };

    println!("{}", format_value(&report, format));
    Ok(())
}

#[derive(Debug, Serialize, Tabled)]
struct QualityRow {
    index: usize,
    id: String,
    resolution: String,
    bitrate: u64,
    codec: String,
    selected: bool,
}

#[derive(Debug, Serialize, Tabled)]
struct AudioRow {
    index: usize,
    id: String,
    label: String,
    language: String,
    kind: String,
    selected: bool,
}

#[derive(Debug, Serialize, Tabled)]
struct TextRow {
    id: String,
    label: String,
    language: String,
    kind: String,
    mode: String,
}

#[derive(Debug, Serialize)]
struct InspectSummary {
    manifest: String,
    stream_type: String,
    duration: f64,
    auto_quality: bool,
    switch_policy: String,
}

/// Load a playlist through the adaptive bridge and print the synchronized tracks
pub async fn inspect(
    manifest: &str,
    quality: Option<&str>,
    config: PlayerConfig,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let presentation = Presentation::load(manifest).await?;
    let factory = Arc::new(ManifestEngineFactory::new(presentation));
    let player = MediaPlayer::builder()
        .config(config)
        .deps(LoaderDeps {
            hls_engine: Some(factory.clone()),
            ..Default::default()
        })
        .build(Arc::new(HeadlessElement::default()))?;

    player
        .set_source(Source::new(manifest, "application/x-mpegurl"))
        .await?
        .context("no provider could play the manifest")?;

    let mut can_play = player.store().can_play.subscribe();
    tokio::time::timeout(LEVELS_TIMEOUT, can_play.wait_for(|ready| *ready))
        .await
        .context("timed out waiting for engine levels")??;

    let ctx = player.context();
    if let Some(choice) = quality {
        let trigger = Trigger::new("cli-quality");
        if choice.eq_ignore_ascii_case("auto") {
            ctx.qualities.auto_select(Some(&trigger));
        } else {
            let index: usize = choice
                .parse()
                .with_context(|| format!("invalid quality '{}', expected an index or 'auto'", choice))?;
            let item = ctx
                .qualities
                .get(index)
                .with_context(|| format!("no quality at index {}", index))?;
            ctx.qualities.select(&item, true, Some(&trigger));
        }
        // Let the engine's switch event come back through the bridge
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let summary = InspectSummary {
        manifest: manifest.to_string(),
        stream_type: ctx.store.stream_type.get().to_string(),
        duration: ctx.store.duration.get(),
        auto_quality: ctx.qualities.auto(),
        switch_policy: ctx.qualities.switch_policy().to_string(),
    };
    let qualities: Vec<QualityRow> = ctx
        .qualities
        .iter()
        .enumerate()
        .map(|(index, q)| QualityRow {
            index,
            id: q.id.clone(),
            resolution: q.resolution().to_string(),
            bitrate: q.bitrate,
            codec: q.codec.clone().unwrap_or_default(),
            selected: ctx.qualities.selected_index() == Some(index),
        })
        .collect();
    let audio: Vec<AudioRow> = ctx
        .audio_tracks
        .iter()
        .enumerate()
        .map(|(index, t)| AudioRow {
            index,
            id: t.id.clone(),
            label: t.label.clone(),
            language: t.language.clone(),
            kind: t.kind.clone(),
            selected: ctx.audio_tracks.selected_index() == Some(index),
        })
        .collect();
    let text: Vec<TextRow> = ctx
        .text_tracks
        .iter()
        .map(|t| TextRow {
            id: t.id.clone(),
            label: t.label.clone(),
            language: t.language.clone(),
            kind: t.kind.to_string(),
            mode: t.mode().to_string(),
        })
        .collect();
    let commands = factory.engine().map(|e| e.commands()).unwrap_or_default();

    if format == OutputFormat::Json {
        let report = serde_json::json!({
            "summary": summary,
            "qualities": qualities,
            "audio_tracks": audio,
            "text_tracks": text,
            "engine_commands": commands,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}\n", format_value(&summary, format));
        println!("{}\n", format_rows("Qualities", &qualities, format));
        println!("{}\n", format_rows("Audio tracks", &audio, format));
        println!("{}\n", format_rows("Text tracks", &text, format));
        println!("Engine commands:");
        for command in &commands {
            println!("  {}", command);
        }
    }

    player.destroy().await;
    debug!("Inspection finished");
    Ok(())
}

/// Print the effective configuration
pub fn config(config: &PlayerConfig, format: OutputFormat) -> anyhow::Result<()> {
    config.validate()?;
    match format {
        OutputFormat::Json | OutputFormat::Table => println!("{}", serde_json::to_string_pretty(config)?),
        OutputFormat::Text => println!("{}", format_value(config, format)),
    }
    Ok(())
}
