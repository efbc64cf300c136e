use moq_loc::transport::{self, ObjectReader, ObjectWriter};
use moq_loc::{Publisher, RenderStats, Subscriber, forward};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::synthetic::{LogRenderer, RawDecoder, RawFactory, TestPattern};
use crate::SourceArgs;

pub async fn loopback(source: SourceArgs) -> anyhow::Result<()> {
	let config = source.config()?;
	let track = config.track.track();

	let capture = TestPattern::new(&config.encoder, source.duration);
	let objects = Publisher::new(config, RawFactory::new(source.gop)).setup(capture)?;

	let (mut sink, stream) = transport::channel();
	let subscription = Subscriber::new(track.name.clone()).setup(stream, RawDecoder::default(), LogRenderer::default())?;

	tokio::select! {
		res = forward(objects, &mut sink) => res?,
		_ = tokio::signal::ctrl_c() => tracing::info!("interrupted"),
	}

	// The subscriber drains whatever was already forwarded.
	drop(sink);

	let stats = subscription.closed().await?;
	print_stats(&stats)
}

pub async fn publish<W: AsyncWrite + Unpin + Send>(source: SourceArgs, output: W) -> anyhow::Result<()> {
	let config = source.config()?;
	let track = config.track.track();

	let capture = TestPattern::new(&config.encoder, source.duration);
	let objects = Publisher::new(config, RawFactory::new(source.gop)).setup(capture)?;

	let mut writer = ObjectWriter::new(output, track);

	tokio::select! {
		res = forward(objects, &mut writer) => res?,
		_ = tokio::signal::ctrl_c() => tracing::info!("interrupted"),
	}

	Ok(())
}

pub async fn subscribe<R: AsyncRead + Unpin + Send + 'static>(input: R) -> anyhow::Result<()> {
	let mut reader = ObjectReader::new(input);
	let track = reader.track().await?.clone();

	let subscription = Subscriber::new(track.name).setup(reader, RawDecoder::default(), LogRenderer::default())?;

	let stats = tokio::select! {
		res = subscription.closed() => res?,
		_ = tokio::signal::ctrl_c() => {
			tracing::info!("interrupted");
			return Ok(());
		}
	};

	print_stats(&stats)
}

fn print_stats(stats: &RenderStats) -> anyhow::Result<()> {
	tracing::info!(rendered = stats.rendered, decode_errors = stats.decode_errors, "finished");
	println!("{}", serde_json::to_string(stats)?);
	Ok(())
}
