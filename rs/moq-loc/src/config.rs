use std::{fmt, path::Path, str::FromStr, time::Duration};

use anyhow::Context;
use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::{Track, TrackName};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum LatencyMode {
	Quality,
	#[default]
	Realtime,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Acceleration {
	NoPreference,
	PreferHardware,
	#[default]
	PreferSoftware,
}

/// The H.264 bitstream format produced by the encoder.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum BitstreamFormat {
	/// Length-prefixed NALs, with SPS/PPS delivered out-of-band as the decoder configuration.
	#[default]
	Avc,
	/// Start-code delimited NALs with inline SPS/PPS.
	AnnexB,
}

/// The fixed configuration every encoder session is created with.
#[derive(Args, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct EncoderConfig {
	/// The codec string, ex. `avc1.42E01E` for H.264 constrained baseline.
	#[arg(long, env = "MOQ_LOC_CODEC", default_value = "avc1.42E01E")]
	pub codec: String,

	#[arg(long, env = "MOQ_LOC_WIDTH", default_value_t = 640)]
	pub width: u32,

	#[arg(long, env = "MOQ_LOC_HEIGHT", default_value_t = 480)]
	pub height: u32,

	/// The target bitrate in bits per second.
	#[arg(long, env = "MOQ_LOC_BITRATE", default_value_t = 1_000_000)]
	pub bitrate: u64,

	#[arg(long, env = "MOQ_LOC_FRAMERATE", default_value_t = 30)]
	pub framerate: u32,

	#[arg(long, value_enum, default_value_t = LatencyMode::Realtime)]
	pub latency_mode: LatencyMode,

	#[arg(long, value_enum, default_value_t = Acceleration::PreferSoftware)]
	pub acceleration: Acceleration,

	#[arg(long, value_enum, default_value_t = BitstreamFormat::Avc)]
	pub format: BitstreamFormat,
}

impl Default for EncoderConfig {
	fn default() -> Self {
		Self {
			codec: "avc1.42E01E".to_string(),
			width: 640,
			height: 480,
			bitrate: 1_000_000,
			framerate: 30,
			latency_mode: LatencyMode::default(),
			acceleration: Acceleration::default(),
			format: BitstreamFormat::default(),
		}
	}
}

impl EncoderConfig {
	/// The nominal time between frames.
	pub fn frame_interval(&self) -> Duration {
		Duration::from_secs(1) / self.framerate.max(1)
	}
}

#[derive(Args, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TrackConfig {
	#[arg(long = "track-namespace", env = "MOQ_LOC_NAMESPACE", default_value = "moqtail")]
	pub namespace: String,

	#[arg(long = "track-name", env = "MOQ_LOC_TRACK", default_value = "demo")]
	pub name: String,

	#[arg(long = "track-priority", default_value_t = 1)]
	pub priority: u8,
}

impl Default for TrackConfig {
	fn default() -> Self {
		Self {
			namespace: "moqtail".to_string(),
			name: "demo".to_string(),
			priority: 1,
		}
	}
}

impl TrackConfig {
	pub fn name(&self) -> TrackName {
		TrackName::new(self.namespace.as_str(), self.name.as_str())
	}

	pub fn track(&self) -> Track {
		Track::new(self.name()).with_priority(self.priority)
	}
}

/// What to do when the transport sink falls behind the publisher.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum QueuePolicy {
	/// Queue everything; memory grows until the sink catches up.
	#[default]
	Unbounded,

	/// Once more than `max_objects` are queued, discard whole groups older than the newest one.
	DropGroups { max_objects: usize },
}

impl FromStr for QueuePolicy {
	type Err = anyhow::Error;

	/// Parses either `unbounded` or a maximum number of queued objects.
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"unbounded" => Ok(Self::Unbounded),
			max => {
				let max_objects = max.parse().context("expected `unbounded` or a number of objects")?;
				Ok(Self::DropGroups { max_objects })
			}
		}
	}
}

impl fmt::Display for QueuePolicy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Unbounded => write!(f, "unbounded"),
			Self::DropGroups { max_objects } => write!(f, "{max_objects}"),
		}
	}
}

#[derive(Args, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PublishConfig {
	#[command(flatten)]
	pub encoder: EncoderConfig,

	#[command(flatten)]
	pub track: TrackConfig,

	/// How often the encoder is torn down and recreated, bounding the length of a group.
	#[arg(long, env = "MOQ_LOC_RESTART_INTERVAL", default_value = "2s", value_parser = humantime::parse_duration)]
	#[serde(with = "humantime_serde")]
	pub restart_interval: Duration,

	/// The number of encoded chunks buffered between the encoder and the sequencer.
	#[arg(long, default_value_t = 64)]
	pub output_capacity: usize,

	/// Either `unbounded` or the maximum number of queued objects before old groups are dropped.
	#[arg(long = "queue", default_value = "unbounded")]
	pub queue: QueuePolicy,
}

impl Default for PublishConfig {
	fn default() -> Self {
		Self {
			encoder: EncoderConfig::default(),
			track: TrackConfig::default(),
			restart_interval: Duration::from_secs(2),
			output_capacity: 64,
			queue: QueuePolicy::default(),
		}
	}
}

impl PublishConfig {
	/// Load the configuration from a TOML file.
	pub fn load(path: &Path) -> anyhow::Result<Self> {
		let contents = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
		let config = toml::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))?;
		Ok(config)
	}
}
