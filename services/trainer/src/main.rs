use anyhow::{Context, Result};
use callflow_core::notification::Notification;
use callflow_core::retriever::FlowClient;
use callflow_core::session::{ControllerConfig, SessionSnapshot};
use callflow_core::shell::{ShellCommand, ShellUpdate, TrainerShell};
use callflow_core::wizard::Wizard;
use callflow_trainer::config::{Config, MICROPHONE_CHANNEL_CAPACITY};
use callflow_trainer::convai_adapter::{ConvaiAgent, ConvaiConnector};
use callflow_trainer::microphone::CpalMicrophone;
use callflow_trainer::render;
use clap::Parser;
use convai_realtime::types::audio::DEFAULT_PCM16_SAMPLE_RATE;
use tokio::io::AsyncBufReadExt;
use tokio::sync::{mpsc, watch};
use tracing_subscriber::fmt::time::ChronoLocal;

type Shell = TrainerShell<
    ConvaiAgent<ConvaiConnector>,
    CpalMicrophone,
    mpsc::UnboundedSender<Notification>,
>;

#[derive(Parser)]
#[command(version, about = "Practice a patient phone call and review the training framework built from it")]
struct Cli {
    /// Microphone to capture from, defaults to the system input
    #[arg(long)]
    input_device: Option<String>,
    /// Speaker the agent is played on, defaults to the system output
    #[arg(long)]
    output_device: Option<String>,
    /// List the available audio devices and exit
    #[arg(long)]
    list_devices: bool,
    /// Skip the call and show the training framework of an earlier conversation
    #[arg(long, value_name = "CONVERSATION_ID")]
    session: Option<String>,
}

/// Prints the updates and returns `false` once the user asked to quit.
fn show(shell: &Shell, updates: Vec<ShellUpdate>) -> bool {
    for update in updates {
        match update {
            ShellUpdate::Step(step) => println!("{}", render::step_screen(step)),
            ShellUpdate::Retrieval => println!("{}", render::retrieval(shell.retrieval())),
            ShellUpdate::Hint(hint) => println!("{}", render::hint(&hint)),
            ShellUpdate::Quit => return false,
        }
    }
    true
}

fn show_snapshot(snapshots: &mut watch::Receiver<SessionSnapshot>, last: &mut SessionSnapshot) {
    let snapshot = snapshots.borrow_and_update().clone();
    if snapshot != *last {
        println!("{}", render::session(&snapshot));
        *last = snapshot;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load application configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Configuration loaded successfully. Starting call trainer...");

    // --- 3. Parse Command-Line Arguments ---
    let args = Cli::parse();

    if args.list_devices {
        let inputs = convai_realtime_utils::device::get_available_inputs()
            .context("Failed to list input devices")?;
        let outputs = convai_realtime_utils::device::get_available_outputs()
            .context("Failed to list output devices")?;
        println!("Input devices:\n{}\nOutput devices:\n{}", inputs, outputs);
        return Ok(());
    }

    // --- 4. Wire the shell to the voice agent, microphone and UI ---
    let flows = FlowClient::new(&config.flows_base_url).context("Invalid FLOWS_BASE_URL")?;
    tracing::info!("Training frameworks are fetched from {}", flows.base_url());

    let (agent_tx, mut agent_rx) = mpsc::unbounded_channel();
    let (notify_tx, mut notify_rx) = mpsc::unbounded_channel();
    let (fetch_tx, mut fetch_rx) = mpsc::unbounded_channel();

    let agent = ConvaiAgent::new(
        ConvaiConnector::new(config.convai_base_url.clone(), config.api_key.clone()),
        agent_tx,
    )
    .with_playback(args.output_device.clone());
    let microphone = CpalMicrophone::new(
        args.input_device.clone(),
        DEFAULT_PCM16_SAMPLE_RATE,
        MICROPHONE_CHANNEL_CAPACITY,
    );
    let controller_config =
        ControllerConfig::new(&config.agent_id).with_start_timeout(config.start_timeout);
    let wizard = match args.session.as_deref() {
        Some(conversation_id) => Wizard::for_conversation(conversation_id),
        None => Wizard::new(),
    };
    let mut shell: Shell = TrainerShell::new(
        agent,
        microphone,
        notify_tx,
        controller_config,
        flows,
        wizard,
        fetch_tx,
    );
    let mut snapshots = shell.subscribe();
    let mut last_snapshot = SessionSnapshot::default();

    let updates = shell.open();
    show(&shell, updates);

    // --- 5. Run the wizard ---
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    'wizard: loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read from stdin")? else {
                    break;
                };
                // Starting a call can wait on the agent; keep status and
                // notifications flowing and Ctrl-C responsive meanwhile.
                let command = shell.handle_command(ShellCommand::parse(&line));
                tokio::pin!(command);
                let updates = loop {
                    tokio::select! {
                        updates = &mut command => break updates,
                        Some(notification) = notify_rx.recv() => {
                            println!("{}", render::notification(&notification));
                        }
                        Ok(()) = snapshots.changed() => {
                            show_snapshot(&mut snapshots, &mut last_snapshot);
                        }
                        _ = tokio::signal::ctrl_c() => {
                            tracing::info!("Received Ctrl-C, shutting down...");
                            break 'wizard;
                        }
                    }
                };
                if !show(&shell, updates) {
                    break;
                }
            }
            Some(event) = agent_rx.recv() => {
                let updates = shell.handle_agent_event(event);
                show(&shell, updates);
            }
            Some(notification) = notify_rx.recv() => {
                println!("{}", render::notification(&notification));
            }
            Some(outcome) = fetch_rx.recv() => {
                let updates = shell.fetch_finished(outcome);
                show(&shell, updates);
            }
            Ok(()) = snapshots.changed() => {
                show_snapshot(&mut snapshots, &mut last_snapshot);
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl-C, shutting down...");
                break;
            }
        }
    }

    shell.shutdown().await;
    tracing::info!("Shutting down...");
    Ok(())
}
