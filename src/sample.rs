use std::fmt;
use std::time::Instant;

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Length of every generated field value inside a structured payload.
pub const DOCUMENT_FIELD_LEN: usize = 10;

/// A single timed store operation.
///
/// Variants are declared in lexicographic order of their serialized names so
/// the derived `Ord` matches the name order used for deterministic scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Delete,
    Get,
    GetJson,
    Set,
    SetJson,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Delete => "delete",
            OperationKind::Get => "get",
            OperationKind::GetJson => "get_json",
            OperationKind::Set => "set",
            OperationKind::SetJson => "set_json",
        }
    }

    pub fn is_write(&self) -> bool {
        matches!(self, OperationKind::Set | OperationKind::SetJson)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape of the values stored under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ValueCategory {
    /// Flat strings, sized in bytes.
    #[serde(rename = "string")]
    Scalar,
    /// JSON documents, sized in top-level fields.
    #[serde(rename = "json")]
    Structured,
}

impl ValueCategory {
    pub const ALL: [ValueCategory; 2] = [ValueCategory::Scalar, ValueCategory::Structured];

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueCategory::Scalar => "string",
            ValueCategory::Structured => "json",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            ValueCategory::Scalar => "bytes",
            ValueCategory::Structured => "fields",
        }
    }

    /// Operations timed per iteration, in call order: write, read back, delete.
    pub fn cycle(&self) -> [OperationKind; 3] {
        match self {
            ValueCategory::Scalar => [OperationKind::Set, OperationKind::Get, OperationKind::Delete],
            ValueCategory::Structured => [
                OperationKind::SetJson,
                OperationKind::GetJson,
                OperationKind::Delete,
            ],
        }
    }
}

impl fmt::Display for ValueCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload size along the axis measurements are grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SizeDescriptor {
    pub category: ValueCategory,
    pub size: u64,
}

impl SizeDescriptor {
    pub fn new(category: ValueCategory, size: u64) -> Self {
        Self { category, size }
    }
}

impl fmt::Display for SizeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.category, self.size, self.category.unit())
    }
}

/// One elapsed-time measurement in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DurationSample {
    pub kind: OperationKind,
    pub size: SizeDescriptor,
    pub millis: f64,
}

/// Value written by write-like operations.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(String),
    Document(Value),
}

impl Payload {
    /// Random alphanumeric string of exactly `len` bytes.
    pub fn random_text<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Self {
        Payload::Text(random_string(len, rng))
    }

    /// Object with `fields` entries named `field_0..field_{n-1}`.
    pub fn random_document<R: Rng + ?Sized>(fields: usize, rng: &mut R) -> Self {
        let mut map = Map::with_capacity(fields);
        for i in 0..fields {
            map.insert(
                format!("field_{}", i),
                Value::String(random_string(DOCUMENT_FIELD_LEN, rng)),
            );
        }
        Payload::Document(Value::Object(map))
    }

    pub fn generate<R: Rng + ?Sized>(size: SizeDescriptor, rng: &mut R) -> Self {
        match size.category {
            ValueCategory::Scalar => Payload::random_text(size.size as usize, rng),
            ValueCategory::Structured => Payload::random_document(size.size as usize, rng),
        }
    }
}

fn random_string<R: Rng + ?Sized>(len: usize, rng: &mut R) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Produces one distinct key per iteration inside a pairing's namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyTemplate {
    prefix: String,
    scope: String,
}

impl KeyTemplate {
    pub fn new(prefix: impl Into<String>, size: SizeDescriptor) -> Self {
        Self {
            prefix: prefix.into(),
            scope: format!("{}:{}", size.category, size.size),
        }
    }

    /// Separate namespace for untimed warm-up calls.
    pub fn warmup(&self) -> Self {
        Self {
            prefix: self.prefix.clone(),
            scope: format!("warmup:{}", self.scope),
        }
    }

    pub fn key(&self, iteration: usize) -> String {
        format!("{}:{}:{}", self.prefix, self.scope, iteration)
    }
}

/// Records the elapsed time into its sink when dropped, on every exit path.
pub struct ScopedTimer<'a> {
    kind: OperationKind,
    size: SizeDescriptor,
    start: Instant,
    sink: &'a mut Vec<DurationSample>,
}

impl<'a> ScopedTimer<'a> {
    pub fn start(
        kind: OperationKind,
        size: SizeDescriptor,
        sink: &'a mut Vec<DurationSample>,
    ) -> Self {
        Self {
            kind,
            size,
            start: Instant::now(),
            sink,
        }
    }
}

impl Drop for ScopedTimer<'_> {
    fn drop(&mut self) {
        let millis = self.start.elapsed().as_secs_f64() * 1000.0;
        self.sink.push(DurationSample {
            kind: self.kind,
            size: self.size,
            millis,
        });
    }
}
