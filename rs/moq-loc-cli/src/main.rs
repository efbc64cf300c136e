mod log;
mod run;
mod synthetic;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use moq_loc::PublishConfig;

use crate::log::Log;
use run::*;

#[derive(Parser, Clone)]
#[command(name = "moq-loc", version, about)]
pub struct Cli {
	#[command(flatten)]
	log: Log,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Clone)]
pub enum Command {
	/// Publish a test pattern and render it in the same process.
	Loopback {
		#[command(flatten)]
		source: SourceArgs,
	},

	/// Publish a test pattern, writing objects to stdout.
	Publish {
		#[command(flatten)]
		source: SourceArgs,
	},

	/// Read objects from stdin and render them, printing the render counters as JSON on exit.
	Subscribe,
}

#[derive(Args, Clone)]
pub struct SourceArgs {
	/// Load the publish configuration from a TOML file, ignoring the flags below.
	#[arg(long = "config", value_name = "PATH")]
	file: Option<PathBuf>,

	#[command(flatten)]
	config: PublishConfig,

	/// Stop capturing after this long, ex. `10s`.
	#[arg(long, value_parser = humantime::parse_duration)]
	duration: Option<Duration>,

	/// The number of frames between keyframes, in addition to the keyframe at every restart.
	#[arg(long, default_value_t = 30)]
	gop: u64,
}

impl SourceArgs {
	fn config(&self) -> anyhow::Result<PublishConfig> {
		match &self.file {
			Some(path) => PublishConfig::load(path),
			None => Ok(self.config.clone()),
		}
	}
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();
	cli.log.init();

	match cli.command {
		Command::Loopback { source } => loopback(source).await,
		Command::Publish { source } => publish(source, tokio::io::stdout()).await,
		Command::Subscribe => subscribe(tokio::io::stdin()).await,
	}
}
