use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::{Parser, Subcommand};
use shape_morph_core::{
    parse_script, MorphConfig, MorphSequencer, SvgStage, TimedAnimator, TriggerPolicy,
};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> shape_morph_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play {
            config,
            events,
            gap_ms,
            policy,
            output,
        } => run_play(config.as_ref(), &events, gap_ms, policy, output.as_ref()).await,
        Commands::Config => print_default_config(),
    }
}

async fn run_play(
    config_path: Option<&PathBuf>,
    events: &str,
    gap_ms: u64,
    policy: Option<PolicyArg>,
    output: Option<&PathBuf>,
) -> shape_morph_core::Result<()> {
    let mut config = match config_path {
        Some(path) => MorphConfig::load(path)?,
        None => MorphConfig::default(),
    };
    if let Some(policy) = policy {
        config.policy = policy.into();
    }
    let script = parse_script(events)?;
    tracing::info!(events = script.len(), gap_ms, policy = ?config.policy, "replaying pointer events");

    let stage = Arc::new(SvgStage::new(config.canvas.clone(), config.geometry.clone()));
    let animator = Arc::new(TimedAnimator::new(
        stage.clone(),
        config.fade.frame_interval(),
    ));
    let sequencer = Arc::new(MorphSequencer::new(animator, stage.clone(), &config)?);

    let (tx, rx) = mpsc::channel(script.len().max(1));
    let attachment = sequencer.attach(rx);
    for event in script {
        tracing::debug!(%event, "pointer event");
        if tx.send(event).await.is_err() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(gap_ms)).await;
    }
    drop(tx);
    attachment.join().await?;

    let kind = sequencer.current_kind()?;
    tracing::info!(%kind, "morphs settled");
    let svg = stage.render_svg()?;
    sequencer.dispose();

    match output {
        Some(path) => {
            std::fs::write(path, &svg)?;
            tracing::info!(?path, "wrote svg snapshot");
        }
        None => print!("{svg}"),
    }
    Ok(())
}

fn print_default_config() -> shape_morph_core::Result<()> {
    println!("{}", MorphConfig::default().to_json_pretty()?);
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Circle/rectangle morphing demo", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay pointer events against a morphing shape and print the final SVG.
    Play {
        /// JSON configuration file; defaults are used when omitted.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Comma separated pointer events (down, up, enter, leave).
        #[arg(short, long, default_value = "enter,down,up,leave")]
        events: String,
        /// Pause between consecutive events in milliseconds.
        #[arg(long, default_value_t = 100)]
        gap_ms: u64,
        /// Overrides the reentrant trigger policy from the configuration.
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,
        /// Write the SVG snapshot here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the default configuration as JSON.
    Config,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PolicyArg {
    Debounce,
    Coalesce,
}

impl From<PolicyArg> for TriggerPolicy {
    fn from(value: PolicyArg) -> Self {
        match value {
            PolicyArg::Debounce => TriggerPolicy::Debounce,
            PolicyArg::Coalesce => TriggerPolicy::Coalesce,
        }
    }
}
