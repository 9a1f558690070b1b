//! Operation registry: step names to typed [`Operation`]s.
//!
//! Each constructor takes the positional JSON arguments of a step and either
//! returns a typed operation or an [`EngineError::InvalidArguments`]. Unknown
//! names fail with [`EngineError::UnknownOperation`].
//!
//! | Name | Arguments |
//! |---|---|
//! | `resize` | `width?, height?, options?` or `{width, height, fit, kernel, background, withoutEnlargement}` |
//! | `rotate` | `angle?, {background}?` |
//! | `flip`, `flop`, `negate` | none |
//! | `greyscale`, `grayscale` | none |
//! | `blur` | `sigma?` |
//! | `sharpen` | `sigma?` or `{sigma}` |
//! | `extract` | `{left, top, width, height}` |
//! | `jpeg`, `png`, `webp`, `tiff`, `avif` | `options?` |
//! | `toFormat` | `format, options?` |

use super::backend::EngineError;
use super::params::{
    Background, Fit, FormatParams, Kernel, Operation, OutputFormat, Quality, Region, ResizeParams,
};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Constructor for one operation name.
pub type Constructor = fn(&[Value]) -> Result<Operation, EngineError>;

/// Name of the terminal write operation, handled by the pipeline builder.
pub const TO_FILE: &str = "toFile";

/// Maps operation names to constructors.
#[derive(Clone)]
pub struct OperationRegistry {
    constructors: HashMap<&'static str, Constructor>,
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl OperationRegistry {
    /// Create a registry with no operations.
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Registry with every operation the bundled engine understands.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register("resize", resize);
        registry.register("rotate", rotate);
        registry.register("flip", |args| no_args("flip", args, Operation::Flip));
        registry.register("flop", |args| no_args("flop", args, Operation::Flop));
        registry.register("negate", |args| no_args("negate", args, Operation::Negate));
        registry.register("greyscale", |_| Ok(Operation::Greyscale));
        registry.register("grayscale", |_| Ok(Operation::Greyscale));
        registry.register("blur", blur);
        registry.register("sharpen", sharpen);
        registry.register("extract", extract);
        registry.register("jpeg", |args| format_op(OutputFormat::Jpeg, args.first()));
        registry.register("png", |args| format_op(OutputFormat::Png, args.first()));
        registry.register("webp", |args| format_op(OutputFormat::Webp, args.first()));
        registry.register("tiff", |args| format_op(OutputFormat::Tiff, args.first()));
        registry.register("avif", |args| format_op(OutputFormat::Avif, args.first()));
        registry.register("toFormat", to_format);
        registry
    }

    /// Register (or replace) a constructor.
    pub fn register(&mut self, name: &'static str, constructor: Constructor) {
        self.constructors.insert(name, constructor);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Build the operation `name` from its positional arguments.
    pub fn construct(&self, name: &str, args: &[Value]) -> Result<Operation, EngineError> {
        let constructor = self
            .constructors
            .get(name)
            .ok_or_else(|| EngineError::UnknownOperation(name.to_string()))?;
        constructor(args)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.constructors.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

fn invalid(operation: &str, reason: impl Into<String>) -> EngineError {
    EngineError::InvalidArguments {
        operation: operation.to_string(),
        reason: reason.into(),
    }
}

fn no_args(operation: &str, args: &[Value], op: Operation) -> Result<Operation, EngineError> {
    // flip(true) is accepted as a no-op flag
    match args.first() {
        None | Some(Value::Null) | Some(Value::Bool(true)) => Ok(op),
        Some(other) => Err(invalid(operation, format!("unexpected argument {other}"))),
    }
}

/// Read an optional non-negative integer, treating `null` as absent.
fn opt_u32(operation: &str, field: &str, value: Option<&Value>) -> Result<Option<u32>, EngineError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| invalid(operation, format!("{field} must be a positive integer"))),
    }
}

fn opt_f32(operation: &str, field: &str, value: Option<&Value>) -> Result<Option<f32>, EngineError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_f64()
            .map(|n| Some(n as f32))
            .ok_or_else(|| invalid(operation, format!("{field} must be a number"))),
    }
}

fn opt_object<'a>(
    operation: &str,
    value: Option<&'a Value>,
) -> Result<Option<&'a Map<String, Value>>, EngineError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(other) => Err(invalid(operation, format!("expected an options object, got {other}"))),
    }
}

/// Parse `{r, g, b, alpha}` (alpha 0–1) or a `#rrggbb[aa]` hex string.
fn background(operation: &str, value: &Value) -> Result<Background, EngineError> {
    match value {
        Value::Object(map) => {
            let channel = |key: &str| -> Result<u8, EngineError> {
                match map.get(key) {
                    None => Ok(0),
                    Some(v) => v
                        .as_u64()
                        .filter(|n| *n <= 255)
                        .map(|n| n as u8)
                        .ok_or_else(|| invalid(operation, format!("background.{key} must be 0-255"))),
                }
            };
            let alpha = match map.get("alpha") {
                None => 255,
                Some(v) => v
                    .as_f64()
                    .filter(|a| (0.0..=1.0).contains(a))
                    .map(|a| (a * 255.0).round() as u8)
                    .ok_or_else(|| invalid(operation, "background.alpha must be 0-1"))?,
            };
            Ok(Background([channel("r")?, channel("g")?, channel("b")?, alpha]))
        }
        Value::String(hex) => parse_hex_color(hex)
            .ok_or_else(|| invalid(operation, format!("invalid background colour {hex:?}"))),
        other => Err(invalid(operation, format!("invalid background {other}"))),
    }
}

fn parse_hex_color(hex: &str) -> Option<Background> {
    let digits = hex.strip_prefix('#')?;
    if !digits.is_ascii() || !(digits.len() == 6 || digits.len() == 8) {
        return None;
    }
    let byte = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
    let alpha = if digits.len() == 8 { byte(6)? } else { 255 };
    Some(Background([byte(0)?, byte(2)?, byte(4)?, alpha]))
}

fn resize(args: &[Value]) -> Result<Operation, EngineError> {
    const OP: &str = "resize";
    let mut params = ResizeParams::default();

    // resize({width, height, ...}) is equivalent to resize(width, height, {...})
    let options = match args.first() {
        Some(Value::Object(map)) => {
            params.width = opt_u32(OP, "width", map.get("width"))?;
            params.height = opt_u32(OP, "height", map.get("height"))?;
            Some(map)
        }
        first => {
            params.width = opt_u32(OP, "width", first)?;
            params.height = opt_u32(OP, "height", args.get(1))?;
            opt_object(OP, args.get(2))?
        }
    };

    if let Some(options) = options {
        if let Some(fit) = options.get("fit").and_then(Value::as_str) {
            params.fit = Fit::from_name(fit).ok_or_else(|| invalid(OP, format!("unknown fit {fit:?}")))?;
        }
        if let Some(kernel) = options.get("kernel").and_then(Value::as_str) {
            params.kernel = Kernel::from_name(kernel)
                .ok_or_else(|| invalid(OP, format!("unknown kernel {kernel:?}")))?;
        }
        if let Some(bg) = options.get("background") {
            params.background = background(OP, bg)?;
        }
        if let Some(flag) = options.get("withoutEnlargement") {
            params.without_enlargement = flag
                .as_bool()
                .ok_or_else(|| invalid(OP, "withoutEnlargement must be a boolean"))?;
        }
    }

    if params.width == Some(0) || params.height == Some(0) {
        return Err(invalid(OP, "width and height must be non-zero"));
    }
    Ok(Operation::Resize(params))
}

fn rotate(args: &[Value]) -> Result<Operation, EngineError> {
    const OP: &str = "rotate";
    let angle = match args.first() {
        None | Some(Value::Null) => None,
        Some(v) => Some(
            v.as_i64()
                .or_else(|| v.as_f64().filter(|a| a.fract() == 0.0).map(|a| a as i64))
                .ok_or_else(|| invalid(OP, "angle must be an integer number of degrees"))?,
        ),
    };
    let background = match opt_object(OP, args.get(1))?.and_then(|o| o.get("background")) {
        Some(bg) => background(OP, bg)?,
        None => Background::default(),
    };
    Ok(Operation::Rotate { angle, background })
}

fn blur(args: &[Value]) -> Result<Operation, EngineError> {
    match opt_f32("blur", "sigma", args.first())? {
        Some(sigma) if !(0.3..=1000.0).contains(&sigma) => {
            Err(invalid("blur", "sigma must be between 0.3 and 1000"))
        }
        sigma => Ok(Operation::Blur(sigma)),
    }
}

fn sharpen(args: &[Value]) -> Result<Operation, EngineError> {
    let sigma = match args.first() {
        Some(Value::Object(map)) => opt_f32("sharpen", "sigma", map.get("sigma"))?,
        first => opt_f32("sharpen", "sigma", first)?,
    };
    let sigma = sigma.unwrap_or(1.0);
    if sigma <= 0.0 {
        return Err(invalid("sharpen", "sigma must be positive"));
    }
    Ok(Operation::Sharpen { sigma })
}

fn extract(args: &[Value]) -> Result<Operation, EngineError> {
    const OP: &str = "extract";
    let map = opt_object(OP, args.first())?
        .ok_or_else(|| invalid(OP, "expected {left, top, width, height}"))?;
    let field = |name: &str| {
        opt_u32(OP, name, map.get(name))?.ok_or_else(|| invalid(OP, format!("missing {name}")))
    };
    let region = Region {
        left: field("left")?,
        top: field("top")?,
        width: field("width")?,
        height: field("height")?,
    };
    if region.width == 0 || region.height == 0 {
        return Err(invalid(OP, "width and height must be non-zero"));
    }
    Ok(Operation::Extract(region))
}

fn format_op(format: OutputFormat, options: Option<&Value>) -> Result<Operation, EngineError> {
    let op = format.name();
    let mut params = FormatParams::new(format);
    if let Some(options) = opt_object(op, options)? {
        if let Some(quality) = opt_u32(op, "quality", options.get("quality"))? {
            params.quality = Quality::new(quality);
        }
        if let Some(level) = opt_u32(op, "compressionLevel", options.get("compressionLevel"))? {
            if level > 9 {
                return Err(invalid(op, "compressionLevel must be 0-9"));
            }
            params.compression_level = level as u8;
        }
    }
    Ok(Operation::Format(params))
}

fn to_format(args: &[Value]) -> Result<Operation, EngineError> {
    let name = args
        .first()
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("toFormat", "expected a format name"))?;
    let format = OutputFormat::from_name(name)
        .ok_or_else(|| EngineError::UnsupportedFormat(name.to_string()))?;
    format_op(format, args.get(1))
}
