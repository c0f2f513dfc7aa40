use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use panel_core::{
    ControlIndex, Dispatcher, HttpTransport, PanelController, PanelEvent, PanelLayout,
    PulseOutcome, RepeatReport,
};
use shared::domain::{CommandArg, CommandId, ControlMode};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod render;

use config::load_settings;
use render::render_panel;

#[derive(Parser, Debug)]
#[command(about = "Command-line remote for a networked amplifier")]
struct Args {
    /// Base URL of the device, e.g. http://192.168.1.40
    #[arg(long, global = true)]
    device_url: Option<String>,
    /// Panel layout TOML; the stock amplifier layout is used otherwise.
    #[arg(long, global = true)]
    layout: Option<PathBuf>,
    /// Print the panel as JSON instead of text.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: RemoteCommand,
}

#[derive(Subcommand, Debug)]
enum RemoteCommand {
    /// Synchronise with the device and print the panel.
    Status,
    /// Press and release a control.
    Press { command: String, arg: Option<String> },
    /// Hold a repeating control down.
    Hold {
        command: String,
        #[arg(long, default_value_t = 1000)]
        ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings()?;
    if let Some(url) = args.device_url {
        settings.device_url = url;
    }
    if let Some(path) = args.layout {
        settings.layout_path = Some(path);
    }

    let layout = match &settings.layout_path {
        Some(path) => PanelLayout::load(path)
            .with_context(|| format!("failed to load layout {}", path.display()))?,
        None => PanelLayout::default(),
    };
    let transport = HttpTransport::with_timeout(&settings.device_url, settings.request_timeout)
        .with_context(|| format!("invalid device url {}", settings.device_url))?;
    let device = transport.base_url().to_string();
    let dispatcher = Dispatcher::with_first_repeat_delay(
        Arc::new(transport),
        layout.into_panel(),
        settings.repeat_delay,
    );
    let controller = PanelController::new(dispatcher);

    if let PulseOutcome::Completed(status) = controller.dispatcher().refresh().await {
        info!(%device, on = status.ok, "remote: synchronised");
    }

    match args.command {
        RemoteCommand::Status => {}
        RemoteCommand::Press { command, arg } => {
            let index = locate(&controller, &command, arg.as_deref()).await?;
            // A tap on a repeating control is held short of the first repeat.
            let hold_for = match control_mode(&controller, index).await {
                Some(ControlMode::Repeating) => settings.repeat_delay / 2,
                _ => Duration::ZERO,
            };
            press_and_release(&controller, index, hold_for).await?;
        }
        RemoteCommand::Hold { command, ms } => {
            let index = locate(&controller, &command, None).await?;
            if control_mode(&controller, index).await != Some(ControlMode::Repeating) {
                bail!("{command} is not a repeating control");
            }
            let mut events = controller.dispatcher().subscribe_events();
            press_and_release(&controller, index, Duration::from_millis(ms)).await?;
            let report = stopped_report(&mut events).unwrap_or_default();
            println!(
                "{command}: {} requests, {} failed",
                report.requests, report.failures
            );
        }
    }

    let panel = controller.dispatcher().snapshot().await;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&panel)?);
    } else {
        print!("{}", render_panel(&panel));
    }
    Ok(())
}

async fn locate(controller: &PanelController, command: &str, arg: Option<&str>) -> Result<ControlIndex> {
    let command_id = CommandId::from(command);
    let arg = arg.map(CommandArg::from);
    controller
        .dispatcher()
        .snapshot()
        .await
        .find(&command_id, arg.as_ref())
        .with_context(|| match &arg {
            Some(arg) => format!("no control for {command} {arg} in layout"),
            None => format!("no control for {command} in layout"),
        })
}

async fn control_mode(controller: &PanelController, index: ControlIndex) -> Option<ControlMode> {
    controller
        .dispatcher()
        .snapshot()
        .await
        .control(index)
        .map(|control| control.descriptor.mode)
}

async fn press_and_release(
    controller: &PanelController,
    index: ControlIndex,
    hold_for: Duration,
) -> Result<()> {
    let Some(task) = controller.press(index).await else {
        bail!("control is disabled; is the amplifier switched on?");
    };
    if !hold_for.is_zero() {
        tokio::time::sleep(hold_for).await;
    }
    controller.release(index).await;
    if let Err(error) = task.await {
        warn!(%error, "remote: command task failed");
    }
    Ok(())
}

fn stopped_report(events: &mut tokio::sync::broadcast::Receiver<PanelEvent>) -> Option<RepeatReport> {
    let mut report = None;
    while let Ok(event) = events.try_recv() {
        if let PanelEvent::RepeatStopped { report: stopped, .. } = event {
            report = Some(stopped);
        }
    }
    report
}
