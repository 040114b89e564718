use crate::error::{ErrorKind, ServiceError};
use serde::Serialize;
use std::io::{self, Write};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}

/// Result of one command, rendered as a single JSON line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub row: u64,
    pub ok: bool,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Outcome {
    pub fn success(row: u64, status: u16, data: serde_json::Value) -> Self {
        Self {
            row,
            ok: true,
            status,
            data: Some(data),
            error: None,
        }
    }

    /// Renders a service failure. Causes attached to unexpected errors are never exposed.
    pub fn failure(row: u64, err: &ServiceError) -> Self {
        Self {
            row,
            ok: false,
            status: err.http_status(),
            data: None,
            error: Some(ErrorBody {
                kind: err.kind(),
                message: err.to_string(),
            }),
        }
    }
}

/// Writes outcomes as JSON lines.
pub struct OutcomeWriter<W: Write> {
    writer: W,
}

impl<W: Write> OutcomeWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn write(&mut self, outcome: &Outcome) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, outcome)?;
        self.writer.write_all(b"\n")
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}
