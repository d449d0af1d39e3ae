//! Newline-delimited JSON framing over [`MatchService`].
//!
//! One request object per input line, selected by its `op` field:
//!
//! ```text
//! {"op":"add_vector","user_id":"u1","vector":[0.5,-1,1,0,0,1,0.2,0.7]}
//! {"op":"bulk_load","user_vectors":[{"user_id":"u1","vector":[...]}]}
//! {"op":"query","vector":[...],"top_k":10}
//! {"op":"clear"}
//! {"op":"stats"}
//! ```
//!
//! Every request produces exactly one response line, `{"ok":true,"result":..}`
//! or `{"ok":false,"error":{"code":..,"message":..}}`. A bad line never stops
//! the loop.

use std::io::{BufRead, Write};

use prefmatch_core::{AnnEngine, MatchError, MatchResult};
use prefmatch_service::{AddVectorRequest, BulkLoadRequest, MatchService, QueryRequest};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// One decoded request line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    AddVector(AddVectorRequest),
    BulkLoad(BulkLoadRequest),
    Query(QueryRequest),
    Clear,
    Stats,
}

impl Request {
    #[must_use]
    pub const fn op(&self) -> &'static str {
        match self {
            Self::AddVector(_) => "add_vector",
            Self::BulkLoad(_) => "bulk_load",
            Self::Query(_) => "query",
            Self::Clear => "clear",
            Self::Stats => "stats",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    /// Whether resubmitting a corrected request can succeed.
    pub client_error: bool,
}

impl From<&MatchError> for ErrorBody {
    fn from(err: &MatchError) -> Self {
        Self {
            code: err.code().to_owned(),
            message: err.to_string(),
            client_error: err.is_client_error(),
        }
    }
}

/// Response line envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Envelope {
    fn success(result: Value) -> Self {
        Self {
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    fn failure(err: &MatchError) -> Self {
        Self {
            ok: false,
            result: None,
            error: Some(ErrorBody::from(err)),
        }
    }
}

/// Counters for one [`serve`] session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServeSummary {
    pub requests: u64,
    pub errors: u64,
}

/// Decode a request line.
///
/// # Errors
///
/// Returns `MatchError::Protocol` for malformed JSON or an unknown `op`.
pub fn decode_request(line: &str) -> MatchResult<Request> {
    serde_json::from_str(line).map_err(|e| MatchError::Protocol {
        detail: e.to_string(),
    })
}

/// Execute one decoded request.
///
/// # Errors
///
/// Propagates the service error for the request.
pub fn dispatch<E: AnnEngine>(service: &MatchService<E>, request: Request) -> MatchResult<Value> {
    match request {
        Request::AddVector(req) => to_value(&service.add_vector(req)?),
        Request::BulkLoad(req) => to_value(&service.bulk_load(req)?),
        Request::Query(req) => to_value(&service.query(&req)?),
        Request::Clear => to_value(&service.clear()),
        Request::Stats => to_value(&service.stats()),
    }
}

/// Handle one raw input line and return the response envelope.
pub fn handle_line<E: AnnEngine>(service: &MatchService<E>, line: &str) -> Envelope {
    let outcome = decode_request(line).and_then(|request| {
        let op = request.op();
        debug!(target: "prefmatch.service", op, "request received");
        dispatch(service, request)
    });
    match outcome {
        Ok(result) => Envelope::success(result),
        Err(err) => {
            warn!(
                target: "prefmatch.service",
                code = err.code(),
                error = %err,
                "request failed"
            );
            Envelope::failure(&err)
        }
    }
}

/// Serve requests from `reader` until EOF, writing one response per line.
///
/// Blank lines are ignored.
///
/// # Errors
///
/// Returns `MatchError::Io` if reading input or writing output fails.
pub fn serve<E, R, W>(service: &MatchService<E>, reader: R, mut writer: W) -> MatchResult<ServeSummary>
where
    E: AnnEngine,
    R: BufRead,
    W: Write,
{
    let mut summary = ServeSummary::default();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let envelope = handle_line(service, &line);
        summary.requests += 1;
        if !envelope.ok {
            summary.errors += 1;
        }
        let encoded = serde_json::to_string(&envelope).map_err(|e| MatchError::Protocol {
            detail: format!("failed to encode response: {e}"),
        })?;
        writeln!(writer, "{encoded}")?;
        writer.flush()?;
    }
    Ok(summary)
}

fn to_value<T: Serialize>(value: &T) -> MatchResult<Value> {
    serde_json::to_value(value).map_err(|e| MatchError::Protocol {
        detail: format!("failed to encode response: {e}"),
    })
}
