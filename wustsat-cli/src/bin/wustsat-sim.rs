use std::{path::PathBuf, process::ExitCode, sync::Arc};

use clap::{Parser, Subcommand, ValueEnum};
use wustsat_dbc::CanDatabase;
use wustsat_node::{
    devices::{DeviceProfile, LoraControlListener, ObcStatusPublisher, LORA_PROFILE, OBC_PROFILE},
    PostStartHook, SimulatedNode, SocketCanTransport,
};

#[derive(Parser, Debug)]
#[command(version, about = "Simulator for the WUST-Sat CAN bus")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a simulated module node until interrupted
    Run {
        /// The module to simulate
        module: ModuleArg,
        /// CAN interface to join
        #[clap(long, short, default_value = "vcan0")]
        channel: String,
        /// Directory holding the module EDS files
        #[clap(long, default_value = "eds")]
        od_dir: PathBuf,
    },
    /// Generate the CAN database file
    Dbc {
        /// Output path
        #[clap(long, short, default_value = "wust-sat.dbc")]
        output: PathBuf,
        /// Include modules which are not yet active
        #[clap(long)]
        include_inactive: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModuleArg {
    Obc,
    Lora,
}

impl ModuleArg {
    fn device(self) -> (&'static DeviceProfile, Arc<dyn PostStartHook>) {
        match self {
            ModuleArg::Obc => {
                let hook: Arc<dyn PostStartHook> = Arc::new(ObcStatusPublisher::default());
                (&OBC_PROFILE, hook)
            }
            ModuleArg::Lora => {
                let hook: Arc<dyn PostStartHook> = Arc::new(LoraControlListener::new());
                (&LORA_PROFILE, hook)
            }
        }
    }
}

async fn run_module(module: ModuleArg, channel: String, od_dir: PathBuf) -> ExitCode {
    let (profile, hook) = module.device();
    let config = match profile.node_config(&od_dir, channel) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid {} device profile: {e}", profile.name);
            return ExitCode::FAILURE;
        }
    };

    let node = SimulatedNode::new(config, Arc::new(SocketCanTransport::new()), hook);
    if let Err(e) = node.start().await {
        log::error!("Failed to start {} node: {e}", profile.name);
        node.stop().await;
        return ExitCode::FAILURE;
    }

    log::info!("{} node running, press Ctrl+C to stop", profile.name);
    node.run().await;
    node.stop().await;
    ExitCode::SUCCESS
}

fn generate_dbc(output: PathBuf, include_inactive: bool) -> ExitCode {
    let db = match CanDatabase::create(include_inactive) {
        Ok(db) => db,
        Err(e) => {
            log::error!("Failed to build CAN database: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = db.save(&output) {
        log::error!("{e}");
        return ExitCode::FAILURE;
    }

    let info = db.info();
    log::info!("DBC version: {}", info.dbc_version);
    log::info!("Total messages: {}", info.total_messages);
    for (sender, messages) in &info.messages_by_sender {
        log::info!("  {sender}: {} messages", messages.len());
    }
    for (name, id) in &info.message_ids {
        log::info!("  {name}: {id}");
    }
    ExitCode::SUCCESS
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize the logger
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Command::Run {
            module,
            channel,
            od_dir,
        } => run_module(module, channel, od_dir).await,
        Command::Dbc {
            output,
            include_inactive,
        } => generate_dbc(output, include_inactive),
    }
}
