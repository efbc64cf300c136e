use clap::Args;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

#[derive(Args, Clone, Debug)]
pub struct Log {
	/// The default log level; `RUST_LOG` directives take precedence.
	#[arg(long = "log-level", env = "MOQ_LOG_LEVEL", default_value = "info")]
	pub level: tracing::Level,
}

impl Log {
	pub fn level(&self) -> LevelFilter {
		LevelFilter::from_level(self.level)
	}

	/// Install the global subscriber, logging to stderr so stdout stays free for media.
	pub fn init(&self) {
		let filter = EnvFilter::builder()
			.with_default_directive(self.level().into())
			.from_env_lossy()
			.add_directive("tokio=info".parse().unwrap());

		let fmt_layer = tracing_subscriber::fmt::layer()
			.with_writer(std::io::stderr)
			.with_filter(filter);

		tracing_subscriber::registry().with(fmt_layer).init();
	}
}
