//! Wire types for the line protocol.
//!
//! ```text
//! → {"id": 1, "method": "base_branch", "params": {"branch": "feature/x"}}
//! ← {"id": 1, "result": {"remote": "origin", "branch": "main", "resolved": true}}
//! ← {"id": 2, "error": {"code": -32601, "message": "Method not found: rebase"}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::git::GitError;
use crate::styling::strip_ansi;

/// The line wasn't valid JSON, or wasn't a request object.
pub const PARSE_ERROR: i32 = -32700;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
/// The request was well-formed but the operation couldn't produce an answer.
pub const OPERATION_FAILED: i32 = -32000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Method {
    CurrentBranch,
    BaseBranch,
    DiffStat,
    Shutdown,
}

#[derive(Debug, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct Response {
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Response {
    pub fn new(id: Value, result: Result<Value, RpcError>) -> Self {
        match result {
            Ok(value) => Self {
                id,
                result: Some(value),
                error: None,
            },
            Err(error) => Self {
                id,
                result: None,
                error: Some(error),
            },
        }
    }

    /// One protocol line, without the trailing newline.
    pub fn to_line(&self) -> String {
        // Only non-string map keys fail to serialize, and Value has none.
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"id":null,"error":{"code":-32000,"message":"response serialization failed"}}"#
                .to_string()
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

impl RpcError {
    pub fn new(code: i32, message: impl AsRef<str>) -> Self {
        Self {
            code,
            message: strip_ansi(message.as_ref()).trim().to_string(),
        }
    }

    pub fn invalid_params(message: impl AsRef<str>) -> Self {
        Self::new(INVALID_PARAMS, message)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(METHOD_NOT_FOUND, format!("Method not found: {method}"))
    }

    /// Classify an operation error: bad input is the caller's fault, anything
    /// else is an operation failure.
    pub fn from_error(err: &anyhow::Error) -> Self {
        match err.downcast_ref::<GitError>() {
            Some(GitError::InvalidName { .. } | GitError::NotADirectory { .. }) => {
                Self::new(INVALID_PARAMS, err.to_string())
            }
            _ => Self::new(OPERATION_FAILED, format!("{err:#}")),
        }
    }
}

impl From<GitError> for RpcError {
    fn from(err: GitError) -> Self {
        Self::from_error(&err.into())
    }
}
