//! Sprite sheet generator.
//!
//! Redraws a character in the style of a reference image, then renders and
//! verifies every pose and writes the results as PNG files.
//!
//! ```bash
//! cargo run -p sprite -- --reference style.png --race elf --class archer --weapon bow
//! ```

mod cli;

use anyhow::{bail, Context, Result};
use clap::Parser;
use sprite_core::export;
use sprite_core::{
    Attribute, GeminiModel, ImageData, PipelineConfig, PoseEventKind, PoseStatus, SessionError,
    SpriteSession, Verification,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sprite=info,sprite_core=info,gemini=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let spec = cli.character();

    if cli.list_poses {
        println!("Character: {}", spec.describe());
        for attribute in Attribute::all() {
            let selection = spec.get(*attribute);
            let marker = if selection.is_custom() { " (custom)" } else { "" };
            println!(
                "  {attribute}: {selection}{marker} [presets: {}]",
                attribute.presets().join(", ")
            );
        }
        println!("Poses:");
        for pose in sprite_core::poses::catalog(&spec) {
            println!("  {:<12} {}", pose.id, pose.label);
        }
        return Ok(());
    }

    // Check for API key
    if std::env::var("GEMINI_API_KEY").is_err() {
        eprintln!("Error: GEMINI_API_KEY environment variable not set.");
        eprintln!("Please set it in .env file or with: export GEMINI_API_KEY=your_key_here");
        std::process::exit(1);
    }

    let config = cli.apply(PipelineConfig::from_env()?);
    let model = GeminiModel::from_env(&config).context("failed to create Gemini client")?;

    let shutdown = CancellationToken::new();
    setup_shutdown_signal(shutdown.clone());

    let mut session = SpriteSession::with_shutdown(Arc::new(model), config, shutdown.clone());
    session.set_spec(spec);

    let catalog = session.poses();
    for id in &cli.poses {
        if !catalog.iter().any(|pose| &pose.id == id) {
            bail!("unknown pose '{id}' (see --list-poses)");
        }
    }

    let Some(reference_path) = cli.reference.as_ref() else {
        bail!("--reference is required");
    };
    let reference = ImageData::from_path(reference_path)
        .await
        .with_context(|| format!("cannot use {} as a reference", reference_path.display()))?;
    session.set_reference(reference);

    println!("Generating concept: {}", session.spec().describe());
    let concept = match session.synthesize_concept().await {
        Ok(concept) => concept.clone(),
        Err(SessionError::Cancelled) => {
            println!("Cancelled.");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    let path = export::write_image(&cli.out, "Concept", &concept).await?;
    println!("Concept written to {}", path.display());

    if cli.concept_only {
        return Ok(());
    }

    let launched = if cli.poses.is_empty() {
        session.generate_all()?
    } else {
        session.generate_selected(|pose| cli.poses.contains(&pose.id))?
    };
    println!("Generating {launched} pose(s)...");

    let labels: HashMap<String, String> = catalog
        .into_iter()
        .map(|pose| (pose.id, pose.label))
        .collect();

    while let Some(event) = session.next_event().await {
        let label = labels
            .get(&event.pose_id)
            .map(String::as_str)
            .unwrap_or(event.pose_id.as_str());

        match event.kind {
            PoseEventKind::Status(PoseStatus::Retrying { attempt, max }) => {
                println!("  {label}: retrying ({attempt}/{max})");
            }
            PoseEventKind::Status(_) => {}
            PoseEventKind::Finished(Some(result)) => {
                let note = match result.verification {
                    Verification::Verified => "verified",
                    Verification::Unverified => "unverified, verifier unavailable",
                    Verification::Unconfirmed => "unconfirmed, best effort",
                };
                println!("  {label}: done ({note}, {} attempt(s))", result.attempts);
            }
            PoseEventKind::Finished(None) => {
                println!("  {label}: failed, no image after every attempt");
            }
        }
    }

    if shutdown.is_cancelled() {
        println!("Cancelled; exporting finished poses.");
    }

    match session.export(&cli.out).await {
        Ok(written) => println!("Wrote {} pose(s) to {}", written.len(), cli.out.display()),
        Err(SessionError::Export(export::ExportError::Empty)) => println!("No poses to export."),
        Err(e) => return Err(e.into()),
    }

    Ok(())
}

/// Cancel `shutdown` on Ctrl+C.
fn setup_shutdown_signal(shutdown: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Received Ctrl+C, cancelling generation...");
                shutdown.cancel();
            }
            Err(e) => tracing::error!(error = %e, "failed to install Ctrl+C handler"),
        }
    });
}
