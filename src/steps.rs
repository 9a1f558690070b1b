//! Wire shape of processing steps.
//!
//! `meta.steps` is a JSON array. Each entry is either a bare operation name
//! (`"greyscale"`) or an array headed by the name and followed by positional
//! arguments (`["resize", 200, 100]`).

use serde_json::Value;
use tracing::debug;

use crate::imaging::EngineError;

/// One step of a processing request.
#[derive(Debug, Clone, PartialEq)]
pub enum StepInstruction {
    Bare(String),
    WithArgs { name: String, args: Vec<Value> },
}

impl StepInstruction {
    pub fn name(&self) -> &str {
        match self {
            StepInstruction::Bare(name) => name,
            StepInstruction::WithArgs { name, .. } => name,
        }
    }

    pub fn args(&self) -> &[Value] {
        match self {
            StepInstruction::Bare(_) => &[],
            StepInstruction::WithArgs { args, .. } => args,
        }
    }
}

/// Parse the entries of a steps array.
///
/// Entries that are neither strings nor arrays are skipped. An array whose
/// head is not a string names no operation and fails the whole list.
pub fn parse_steps(entries: &[Value]) -> Result<Vec<StepInstruction>, EngineError> {
    let mut steps = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        match entry {
            Value::String(name) => steps.push(StepInstruction::Bare(name.clone())),
            Value::Array(items) => match items.split_first() {
                Some((Value::String(name), args)) => steps.push(StepInstruction::WithArgs {
                    name: name.clone(),
                    args: args.to_vec(),
                }),
                Some((head, _)) => return Err(EngineError::UnknownOperation(head.to_string())),
                None => return Err(EngineError::UnknownOperation("[]".to_string())),
            },
            other => debug!(index, entry = %other, "skipping malformed step"),
        }
    }
    Ok(steps)
}
