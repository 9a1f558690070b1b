//! Pipeline construction and execution.
//!
//! [`build`] turns step instructions into typed operations in one pass and
//! records every `toFile` target. [`BuiltPipeline::pipe`] then connects an
//! input stream to the engine. Nothing is read from the input until building
//! has succeeded.

use bytes::Bytes;
use futures_util::{StreamExt, stream};
use serde_json::Value;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::error::ServiceError;
use crate::imaging::{
    EngineError, ImageEngine, Operation, OperationRegistry, OutputFormat, OutputInfo, TO_FILE,
    requested_format,
};
use crate::materialize::drain;
use crate::source::ByteStream;
use crate::steps::StepInstruction;

/// Ordered operations to apply to one input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    operations: Vec<Operation>,
}

impl Pipeline {
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Format chosen by the pipeline itself, if any.
    pub fn output_format(&self) -> Option<OutputFormat> {
        requested_format(&self.operations).map(|p| p.format)
    }
}

/// Result of building: a live stream pipeline or one ending in file writes.
#[derive(Debug, Clone, PartialEq)]
pub enum BuiltPipeline {
    Stream(Pipeline),
    ToFile {
        pipeline: Pipeline,
        targets: Vec<PathBuf>,
    },
}

/// Encoded output of a stream pipeline.
pub struct ProcessedStream {
    /// Known only when the pipeline selected a format.
    pub format: Option<OutputFormat>,
    pub stream: ByteStream,
}

/// What piping produced.
pub enum ProcessOutcome {
    Stream(ProcessedStream),
    File(OutputInfo),
}

fn target_path(args: &[Value]) -> Result<PathBuf, EngineError> {
    match args.first() {
        Some(Value::String(path)) => Ok(PathBuf::from(path)),
        _ => Err(EngineError::InvalidArguments {
            operation: TO_FILE.to_string(),
            reason: "expected a file path".to_string(),
        }),
    }
}

/// Apply every step, in list order, to a fresh pipeline.
pub fn build(
    steps: &[StepInstruction],
    registry: &OperationRegistry,
) -> Result<BuiltPipeline, EngineError> {
    let mut operations = Vec::with_capacity(steps.len());
    let mut targets = Vec::new();

    for step in steps {
        if step.name() == TO_FILE {
            targets.push(target_path(step.args())?);
            continue;
        }
        operations.push(registry.construct(step.name(), step.args())?);
    }

    debug!(
        operations = operations.len(),
        targets = targets.len(),
        "pipeline built"
    );
    let pipeline = Pipeline { operations };
    Ok(if targets.is_empty() {
        BuiltPipeline::Stream(pipeline)
    } else {
        BuiltPipeline::ToFile { pipeline, targets }
    })
}

async fn encode_on_pool<E: ImageEngine>(
    input: ByteStream,
    operations: Vec<Operation>,
    engine: Arc<E>,
) -> io::Result<Bytes> {
    let bytes = drain(input).await?;
    let encoded = tokio::task::spawn_blocking(move || engine.encode(&bytes, &operations))
        .await
        .map_err(io::Error::other)?
        .map_err(io::Error::other)?;
    Ok(Bytes::from(encoded))
}

impl BuiltPipeline {
    /// Connect `input` to the engine.
    ///
    /// Stream pipelines return immediately; the input is read and encoded on
    /// the first poll of the output, so engine failures arrive as stream
    /// errors. The whole input is buffered before decoding since the
    /// decoders need the complete image. File pipelines write every target with the full operation
    /// list and report the last write.
    pub async fn pipe<E: ImageEngine>(
        self,
        input: ByteStream,
        engine: Arc<E>,
    ) -> Result<ProcessOutcome, ServiceError> {
        match self {
            BuiltPipeline::Stream(pipeline) => {
                let format = pipeline.output_format();
                let output = stream::once(encode_on_pool(input, pipeline.operations, engine));
                Ok(ProcessOutcome::Stream(ProcessedStream {
                    format,
                    stream: output.boxed(),
                }))
            }
            BuiltPipeline::ToFile { pipeline, targets } => {
                let bytes = drain(input).await?;
                let operations = Arc::new(pipeline.operations);
                let mut last = None;
                for target in targets {
                    let engine = Arc::clone(&engine);
                    let bytes = bytes.clone();
                    let operations = Arc::clone(&operations);
                    debug!(path = %target.display(), "writing output file");
                    let info = tokio::task::spawn_blocking(move || {
                        engine.write_file(&bytes, &operations, &target)
                    })
                    .await
                    .map_err(|e| EngineError::ProcessingFailed(e.to_string()))??;
                    last = Some(info);
                }
                last.map(ProcessOutcome::File).ok_or_else(|| {
                    ServiceError::Engine(EngineError::ProcessingFailed(
                        "no output target".to_string(),
                    ))
                })
            }
        }
    }
}
