//! Status envelopes shared by every operation.
//!
//! Every fallible operation in this crate resolves to an [`ApiResponse`],
//! both on the success path and on the error path. The envelope carries the
//! numeric status and a message with a human readable description looked up
//! from a fixed table, so callers can serialize it straight into an HTTP
//! response without re-deriving anything.
//!
//! The description table is consumed as a pure function: [`describe`] maps a
//! numeric code to its text and falls back to the `428` entry for codes it
//! does not know about.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Look up the canonical description for a status code.
///
/// Unknown codes fall back to the `428 Precondition Required` text, which is
/// the catch-all for "the request cannot proceed as issued".
pub fn describe(code: u16) -> &'static str {
    match code {
        200 => "OK: The request has succeeded.",
        201 => "Created: The request has succeeded and a new resource has been created.",
        202 => "Accepted: The request has been received but not yet acted upon.",
        204 => "No Content: The request has succeeded, there is no content to send.",
        304 => "Not Modified: There was nothing to do for the given request.",
        400 => "Bad Request: The request cannot be fulfilled, check the path and data supplied.",
        401 => "Unauthorized: Authentication is required, supply a valid token.",
        403 => "Forbidden: You do not have permission to access the requested resource.",
        404 => "Not Found: The requested resource could not be found.",
        405 => "Method Not Allowed: The request method is not supported by the target resource.",
        406 => "Not Acceptable: The requested format cannot be produced.",
        409 => "Conflict: The request conflicts with the current state of the resource.",
        412 => "Precondition Failed: The content hash supplied is stale.",
        422 => "Unprocessable Entity: The request was well-formed but could not be processed.",
        428 => "Precondition Required: The request cannot proceed as issued.",
        500 => "Internal Server Error: The server encountered an unexpected condition.",
        501 => "Not Implemented: The requested operation is not supported for this namespace.",
        502 => "Bad Gateway: Received an invalid response from the upstream server.",
        503 => "Service Unavailable: The upstream server is currently unavailable.",
        _ => "Precondition Required: The request cannot proceed as issued.",
    }
}

/// The message half of a status envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusMessage {
    /// Human readable text for the status code.
    pub description: String,
}

/// A structured status envelope: `{code, message: {description}}`.
///
/// Used as both the success value of write operations and the error value of
/// every operation, so errors stay values at the operation boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("{}: {}", code, message.description)]
pub struct ApiResponse {
    /// Numeric status, HTTP-shaped.
    pub code: u16,
    /// Message payload with the looked-up description.
    pub message: StatusMessage,
}

impl ApiResponse {
    /// Build an envelope for a status code with its canonical description.
    pub fn new(code: u16) -> Self {
        Self {
            code,
            message: StatusMessage {
                description: describe(code).to_string(),
            },
        }
    }

    /// Build an envelope with a caller-supplied description.
    pub fn with_description(code: u16, description: impl Into<String>) -> Self {
        Self {
            code,
            message: StatusMessage {
                description: description.into(),
            },
        }
    }

    /// Whether the code is in the success range (2xx) or the no-op 304.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code) || self.code == 304
    }
}

/// Result alias used by all fallible operations.
pub type ApiResult<T> = Result<T, ApiResponse>;
