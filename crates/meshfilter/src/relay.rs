//! The relay loop: bus in, pipeline, bus out.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use meshfilter_core::{
    ExemptNodeSet, KeyRegistry, Pipeline, PipelineError, Policy, Snapshot, TracingRejectSink,
};

use crate::bus::Bus;
use crate::config::RelayConfig;
use crate::error::Result;
use crate::reject_log::JsonLinesRejectLog;
use crate::report::StatsReporter;

/// Owns one pipeline and its reporter for the lifetime of the service.
#[derive(Debug)]
pub struct Relay {
    pipeline: Arc<Pipeline>,
    reporter: StatsReporter,
    input_pattern: String,
    stats_interval: Option<Duration>,
}

impl Relay {
    pub fn new(pipeline: Pipeline, input_pattern: impl Into<String>, every_messages: u64) -> Self {
        let reporter = StatsReporter::new(Arc::clone(pipeline.recorder()), every_messages);
        Self {
            pipeline: Arc::new(pipeline),
            reporter,
            input_pattern: input_pattern.into(),
            stats_interval: None,
        }
    }

    /// Also log a summary on a timer.
    pub fn with_stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = Some(interval);
        self
    }

    /// Build the pipeline and relay described by a validated config.
    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        config.validate()?;

        let keys = KeyRegistry::from_config(
            config.decryption.use_default_key,
            &config.decryption.channel_keys,
        );
        if keys.is_empty() {
            tracing::warn!("no decryption keys configured, encrypted messages will be rejected");
        }
        let exempt = ExemptNodeSet::from_entries(&config.filter.exempt_nodes);
        if !exempt.is_empty() {
            tracing::info!(count = exempt.len(), "exempt nodes configured");
        }
        if config.filter.allow_no_bitfield {
            tracing::info!("forwarding packets without a bitfield");
        }

        let mut pipeline = Pipeline::new(
            keys,
            Policy::new(exempt, config.filter.allow_no_bitfield),
            config.topic_mapper()?,
        );
        pipeline = match &config.reject_log {
            Some(path) => pipeline.with_reject_sink(Arc::new(JsonLinesRejectLog::open(path)?)),
            None => pipeline.with_reject_sink(Arc::new(TracingRejectSink)),
        };

        let mut relay = Self::new(pipeline, &config.topics.input, config.stats.every_messages);
        if config.stats.show_stats {
            relay = relay.with_stats_interval(Duration::from_secs(config.stats.interval_secs));
        }
        Ok(relay)
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    /// Run until the bus closes or Ctrl-C.
    pub async fn run(&self, bus: &dyn Bus) -> Result<Snapshot> {
        self.run_until(bus, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutting down");
        })
        .await
    }

    /// Run until the bus closes or `shutdown` completes. Returns the final
    /// counters.
    pub async fn run_until<F>(&self, bus: &dyn Bus, shutdown: F) -> Result<Snapshot>
    where
        F: Future<Output = ()>,
    {
        bus.subscribe(&self.input_pattern).await?;
        tracing::info!(
            input = %self.input_pattern,
            output = %self.pipeline.topics().output_prefix(),
            "relay started"
        );

        let ticker = self
            .stats_interval
            .map(|interval| self.reporter.spawn_interval(interval));

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                message = bus.recv() => match message {
                    Some(message) => self.handle(bus, message.topic, message.payload).await,
                    None => {
                        tracing::info!("bus closed");
                        break;
                    }
                },
            }
        }

        if let Some(ticker) = ticker {
            ticker.abort();
        }
        Ok(self.reporter.log_final())
    }

    async fn handle(&self, bus: &dyn Bus, topic: String, payload: bytes::Bytes) {
        match self.pipeline.process(payload, &topic) {
            Ok(decision) => {
                if let Some(publish) = decision.publish {
                    if let Err(e) = bus.publish(&publish.topic, publish.payload).await {
                        tracing::error!(topic = %publish.topic, error = %e, "publish failed");
                    }
                }
            }
            Err(PipelineError::Parse(e)) => {
                tracing::warn!(topic = %topic, error = %e, "dropping unparseable message");
            }
            Err(e @ PipelineError::TopicMapping { .. }) => {
                tracing::error!(topic = %topic, error = %e, "dropping message");
            }
        }
        self.reporter.after_message();
    }
}
