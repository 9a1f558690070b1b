//! The action layer: `metadata`, `stats` and `process`.
//!
//! Each action resolves its source, then either drains it for a one-shot
//! engine inspection or builds a pipeline and pipes the stream through it.
//! Engine calls run on tokio's blocking pool. A failure at any stage ends the
//! invocation and is returned unchanged.
//!
//! [`ImageService::call`] is the by-name surface used by remote callers: it
//! takes the action name, its primary parameter and a side-channel `meta`
//! object, all as JSON.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::ServiceError;
use crate::fetch::Fetch;
use crate::imaging::{EngineError, ImageEngine, ImageMetadata, ImageStats, OperationRegistry};
use crate::materialize::drain;
use crate::pipeline::{ProcessOutcome, build};
use crate::source::{SourceDescriptor, resolve};
use crate::steps::{StepInstruction, parse_steps};

/// Optional namespace callers may put in front of action names.
const ACTION_NAMESPACE: &str = "sharp.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Metadata,
    Stats,
    Process,
}

impl Action {
    pub fn name(self) -> &'static str {
        match self {
            Action::Metadata => "metadata",
            Action::Stats => "stats",
            Action::Process => "process",
        }
    }
}

impl FromStr for Action {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix(ACTION_NAMESPACE).unwrap_or(s) {
            "metadata" => Ok(Action::Metadata),
            "stats" => Ok(Action::Stats),
            "process" => Ok(Action::Process),
            other => Err(ServiceError::Validation(format!("unknown action '{other}'"))),
        }
    }
}

/// A by-name invocation.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionRequest {
    pub action: String,
    pub params: Value,
    #[serde(default)]
    pub meta: Map<String, Value>,
}

pub enum ActionResponse {
    Metadata(ImageMetadata),
    Stats(ImageStats),
    Process(ProcessOutcome),
}

/// Read the step list out of a request's `meta`.
fn meta_steps(meta: &Map<String, Value>) -> Result<Vec<StepInstruction>, ServiceError> {
    match meta.get("steps") {
        Some(Value::Array(entries)) => Ok(parse_steps(entries)?),
        Some(_) => Err(ServiceError::Validation("meta.steps must be an array".to_string())),
        None => Err(ServiceError::Validation("meta.steps is required".to_string())),
    }
}

pub struct ImageService<E, F> {
    engine: Arc<E>,
    fetcher: F,
    registry: OperationRegistry,
}

impl<E: ImageEngine, F: Fetch> ImageService<E, F> {
    pub fn new(engine: E, fetcher: F) -> Self {
        Self::with_registry(engine, fetcher, OperationRegistry::standard())
    }

    pub fn with_registry(engine: E, fetcher: F, registry: OperationRegistry) -> Self {
        Self {
            engine: Arc::new(engine),
            fetcher,
            registry,
        }
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    /// Materialize `source` and hand the bytes to `inspect` on the blocking pool.
    async fn inspect<T, I>(&self, source: SourceDescriptor, inspect: I) -> Result<T, ServiceError>
    where
        T: Send + 'static,
        I: FnOnce(&E, &[u8]) -> Result<T, EngineError> + Send + 'static,
    {
        let stream = resolve(source, &self.fetcher).await?;
        let bytes = drain(stream).await?;
        let engine = Arc::clone(&self.engine);
        let result = tokio::task::spawn_blocking(move || inspect(&engine, &bytes))
            .await
            .map_err(|e| EngineError::ProcessingFailed(e.to_string()))??;
        Ok(result)
    }

    pub async fn metadata(&self, source: SourceDescriptor) -> Result<ImageMetadata, ServiceError> {
        let metadata = self.inspect(source, |engine, bytes| engine.metadata(bytes)).await?;
        info!(
            format = %metadata.format,
            width = metadata.width,
            height = metadata.height,
            "metadata read"
        );
        Ok(metadata)
    }

    pub async fn stats(&self, source: SourceDescriptor) -> Result<ImageStats, ServiceError> {
        let stats = self.inspect(source, |engine, bytes| engine.stats(bytes)).await?;
        info!(channels = stats.channels.len(), "stats computed");
        Ok(stats)
    }

    /// Build the pipeline first, then resolve and pipe the source through it.
    pub async fn process(
        &self,
        source: SourceDescriptor,
        steps: &[StepInstruction],
    ) -> Result<ProcessOutcome, ServiceError> {
        let pipeline = build(steps, &self.registry)?;
        let stream = resolve(source, &self.fetcher).await?;
        let outcome = pipeline.pipe(stream, Arc::clone(&self.engine)).await?;
        match &outcome {
            ProcessOutcome::File(info) => {
                info!(format = %info.format, size = info.size, "processed to file")
            }
            ProcessOutcome::Stream(output) => debug!(
                format = output.format.map(|f| f.name()).unwrap_or("input"),
                "processing to stream"
            ),
        }
        Ok(outcome)
    }

    /// Dispatch a by-name request.
    pub async fn call(&self, request: ActionRequest) -> Result<ActionResponse, ServiceError> {
        let action: Action = request.action.parse()?;
        debug!(action = action.name(), "dispatching action");

        if !(request.params.is_string() || request.params.is_object()) {
            return Err(ServiceError::Validation(
                "params must be a path string or a source object".to_string(),
            ));
        }
        let source = SourceDescriptor::try_from(request.params)?;

        match action {
            Action::Metadata => self.metadata(source).await.map(ActionResponse::Metadata),
            Action::Stats => self.stats(source).await.map(ActionResponse::Stats),
            Action::Process => {
                let steps = meta_steps(&request.meta)?;
                self.process(source, &steps).await.map(ActionResponse::Process)
            }
        }
    }
}
