//! Line-oriented request/response loop (`branchwise serve`)
//!
//! Reads one JSON request per line and writes one JSON response per line,
//! flushing after each. A malformed request gets an error response; it never
//! ends the loop. The loop ends on EOF or a `shutdown` request.

mod handlers;
pub mod protocol;

use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::Context as _;
use serde_json::Value;

use crate::config::Config;
use handlers::Context;
use protocol::{Method, PARSE_ERROR, Request, Response, RpcError};

/// Whether the loop keeps reading after a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

pub struct Server {
    config: Config,
    default_dir: PathBuf,
}

impl Server {
    /// `default_dir` is used for requests without a `workdir` param.
    pub fn new(config: Config, default_dir: PathBuf) -> Self {
        Self {
            config,
            default_dir,
        }
    }

    /// Serve requests from `reader` until EOF or `shutdown`.
    ///
    /// Only I/O errors on the streams themselves end the loop with an error.
    pub fn serve(&self, reader: impl BufRead, mut writer: impl Write) -> anyhow::Result<()> {
        log::debug!("Serving requests (default workdir {})", self.default_dir.display());

        for line in reader.lines() {
            let line = line.context("Failed to read request")?;
            if line.trim().is_empty() {
                continue;
            }

            let (response, flow) = self.handle_line(&line);
            writeln!(writer, "{}", response.to_line()).context("Failed to write response")?;
            writer.flush().context("Failed to flush response")?;

            if flow == Flow::Stop {
                log::debug!("Shutdown requested");
                break;
            }
        }

        Ok(())
    }

    fn handle_line(&self, line: &str) -> (Response, Flow) {
        let request: Request = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                log::debug!("Unparseable request: {e}");
                let error = RpcError::new(PARSE_ERROR, format!("Parse error: {e}"));
                return (Response::new(Value::Null, Err(error)), Flow::Continue);
            }
        };

        log::debug!("→ {} (id {})", request.method, request.id);
        let flow = match request.method.parse() {
            Ok(Method::Shutdown) => Flow::Stop,
            _ => Flow::Continue,
        };
        let result = self.dispatch(&request.method, request.params);
        if let Err(error) = &result {
            log::debug!("← {} error {}: {}", request.method, error.code, error.message);
        }

        (Response::new(request.id, result), flow)
    }

    fn dispatch(&self, method: &str, params: Option<Value>) -> handlers::DispatchResult {
        let ctx = Context {
            config: &self.config,
            default_dir: self.default_dir.clone(),
        };

        match method.parse::<Method>() {
            Ok(Method::CurrentBranch) => handlers::current_branch(&ctx, params),
            Ok(Method::BaseBranch) => handlers::base_branch(&ctx, params),
            Ok(Method::DiffStat) => handlers::diff_stat(&ctx, params),
            Ok(Method::Shutdown) => Ok(Value::Null),
            Err(_) => Err(RpcError::method_not_found(method)),
        }
    }
}
