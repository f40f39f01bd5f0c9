//! Method handlers for the line protocol.
//!
//! Every name that arrives in params is validated before it reaches git, and
//! every name the resolver returns is validated again before it goes back out.

use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{Value, json};

use super::protocol::{OPERATION_FAILED, RpcError};
use crate::config::Config;
use crate::git::{BranchResolver, GitError, Repository};
use crate::validate::{validate_branch_name, validate_remote_name};

pub type DispatchResult = Result<Value, RpcError>;

/// Shared by every handler: where to run.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct WorkdirParams {
    workdir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct BaseBranchParams {
    workdir: Option<PathBuf>,
    branch: Option<String>,
    remote: Option<String>,
    fallback: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct DiffStatParams {
    workdir: Option<PathBuf>,
    base: Option<String>,
    head: Option<String>,
}

/// Per-loop context handed to each handler.
pub struct Context<'a> {
    pub config: &'a Config,
    /// Directory used when a request doesn't name one.
    pub default_dir: PathBuf,
}

impl Context<'_> {
    fn resolver(&self, workdir: Option<PathBuf>) -> Result<BranchResolver, RpcError> {
        let dir = workdir.unwrap_or_else(|| self.default_dir.clone());
        let repo = Repository::open(dir)
            .map_err(|e| RpcError::from_error(&e))?
            .with_timeout(self.config.command_timeout());
        Ok(BranchResolver::new(repo))
    }

    fn remote_or_default(&self, remote: Option<String>) -> Result<String, RpcError> {
        let remote = remote.unwrap_or_else(|| self.config.default_remote.clone());
        validate_remote_name(&remote)?;
        Ok(remote)
    }
}

fn parse_params<T>(params: Option<Value>) -> Result<T, RpcError>
where
    T: for<'de> Deserialize<'de> + Default,
{
    match params {
        None | Some(Value::Null) => Ok(T::default()),
        Some(value) => serde_json::from_value(value)
            .map_err(|e| RpcError::invalid_params(format!("Invalid params: {e}"))),
    }
}

pub fn current_branch(ctx: &Context<'_>, params: Option<Value>) -> DispatchResult {
    let params: WorkdirParams = parse_params(params)?;
    let branch = ctx.resolver(params.workdir)?.current_branch();
    Ok(json!({ "branch": branch }))
}

pub fn base_branch(ctx: &Context<'_>, params: Option<Value>) -> DispatchResult {
    let params: BaseBranchParams = parse_params(params)?;
    let resolver = ctx.resolver(params.workdir)?;
    let remote = ctx.remote_or_default(params.remote)?;
    if let Some(fallback) = &params.fallback {
        validate_branch_name(fallback)?;
    }

    let branch = branch_or_current(&resolver, params.branch, "resolve a base branch")?;

    match resolver.base_branch(&branch, &remote) {
        Some(base) => {
            let base = base.validate()?;
            Ok(json!({ "remote": base.remote, "branch": base.branch, "resolved": true }))
        }
        None => match params.fallback {
            Some(fallback) => {
                log::debug!("Base of {branch} unresolved; caller fallback {remote}/{fallback}");
                Ok(json!({ "remote": remote, "branch": fallback, "resolved": false }))
            }
            None => Ok(Value::Null),
        },
    }
}

pub fn diff_stat(ctx: &Context<'_>, params: Option<Value>) -> DispatchResult {
    let params: DiffStatParams = parse_params(params)?;
    let resolver = ctx.resolver(params.workdir)?;
    let remote = ctx.remote_or_default(None)?;

    let report = resolver
        .diff_stat(params.base.as_deref(), params.head.as_deref(), &remote)
        .map_err(|e| RpcError::from_error(&e))?;
    serde_json::to_value(report).map_err(|e| RpcError::new(OPERATION_FAILED, e.to_string()))
}

/// The requested branch, validated, or the checked-out branch.
fn branch_or_current(
    resolver: &BranchResolver,
    requested: Option<String>,
    action: &str,
) -> Result<String, RpcError> {
    match requested {
        Some(branch) => {
            validate_branch_name(&branch)?;
            Ok(branch)
        }
        None => resolver.current_branch().ok_or_else(|| {
            GitError::DetachedHead {
                action: Some(action.into()),
            }
            .into()
        }),
    }
}
