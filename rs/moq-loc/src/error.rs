use std::sync::Arc;

use crate::coding::DecodeError;
use crate::model::{ExtensionKind, TimeOverflow, TrackName};

/// How far an error reaches, and whether it is reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
	/// Contained to one encoder or decoder session and recovered automatically.
	Session,

	/// Aborts the pipeline and is returned to the caller.
	Pipeline,

	/// Aborts setup before any session is created.
	Setup,

	/// The stream ended or the peer went away.
	Ended,
}

#[derive(Debug, thiserror::Error, Clone)]
pub enum Error {
	#[error("closed")]
	Closed,

	#[error("cancelled")]
	Cancel,

	#[error("decode error: {0}")]
	Decode(#[from] DecodeError),

	#[error("engine error: {0}")]
	Engine(#[from] EngineError),

	#[error("{0} unavailable")]
	Unavailable(&'static str),

	#[error("unexpected track: expected={expected} got={got}")]
	WrongTrack { expected: TrackName, got: TrackName },

	#[error("missing extension: {0:?}")]
	MissingExtension(ExtensionKind),

	#[error("capture error: {0}")]
	Capture(Arc<anyhow::Error>),

	#[error("transport error: {0}")]
	Transport(Arc<std::io::Error>),

	#[error("timestamp overflow")]
	TimeOverflow(#[from] TimeOverflow),
}

impl Error {
	pub fn severity(&self) -> Severity {
		match self {
			Self::Engine(_) => Severity::Session,
			Self::Decode(_)
			| Self::WrongTrack { .. }
			| Self::MissingExtension(_)
			| Self::Capture(_)
			| Self::TimeOverflow(_) => Severity::Pipeline,
			Self::Unavailable(_) => Severity::Setup,
			Self::Closed | Self::Cancel | Self::Transport(_) => Severity::Ended,
		}
	}
}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		Self::Transport(Arc::new(err))
	}
}

pub type Result<T> = std::result::Result<T, Error>;

/// An error reported by an encoder or decoder engine.
///
/// Engines are external, so this wraps whatever they report.
#[derive(Debug, thiserror::Error, Clone)]
#[error("{0:#}")]
pub struct EngineError(Arc<anyhow::Error>);

impl EngineError {
	pub fn msg(msg: &'static str) -> Self {
		Self(Arc::new(anyhow::Error::msg(msg)))
	}
}

impl From<anyhow::Error> for EngineError {
	fn from(err: anyhow::Error) -> Self {
		Self(Arc::new(err))
	}
}
