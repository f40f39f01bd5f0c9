use std::io::Write;
use std::path::Path;
use std::process;

use anyhow::Context;
use clap::Parser;

use branchwise::config::Config;
use branchwise::git::{BranchResolver, GitError, Repository};
use branchwise::server::Server;
use branchwise::styling::{eprintln, error_message, println};
use branchwise::validate::{validate_branch_name, validate_remote_name};

mod cli;

use cli::{Cli, Commands, ConfigCommand, OutputFormat};

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        // GitError's Display is already a styled message.
        if let Some(err) = e.downcast_ref::<GitError>() {
            eprintln!("{err}");
        } else {
            eprintln!("{}", error_message(format!("{e:#}")));
        }
        process::exit(1);
    }
}

/// Logs go to stderr; stdout carries data and the `serve` protocol.
fn init_logging(verbose: u8) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    match verbose {
        0 => {}
        1 => {
            builder.filter_level(log::LevelFilter::Debug);
        }
        _ => {
            builder.filter_level(log::LevelFilter::Trace);
        }
    }
    builder
        .format_timestamp(None)
        .target(env_logger::Target::Stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    let dir = config.working_dir(cli.directory.as_deref());

    let Some(command) = cli.command else {
        return Ok(());
    };

    match command {
        Commands::CurrentBranch => {
            let branch = resolver(&dir, &config)?
                .repository()
                .require_current_branch("print the current branch")?;
            println!("{branch}");
        }
        Commands::BaseBranch {
            branch,
            remote,
            format,
        } => {
            let resolver = resolver(&dir, &config)?;
            let remote = remote.unwrap_or_else(|| config.default_remote.clone());
            validate_remote_name(&remote)?;
            let branch = match branch {
                Some(branch) => validate_branch_name(&branch)?.to_string(),
                None => resolver
                    .repository()
                    .require_current_branch("resolve a base branch")?,
            };

            let base = resolver
                .base_branch(&branch, &remote)
                .ok_or(GitError::BaseBranchUnresolved { branch })?
                .validate()?;
            match format {
                OutputFormat::Text => println!("{base}"),
                OutputFormat::Json => println!("{}", serde_json::to_string(&base)?),
            }
        }
        Commands::DiffStat { base, head, format } => {
            let report = resolver(&dir, &config)?.diff_stat(
                base.as_deref(),
                head.as_deref(),
                &config.default_remote,
            )?;
            match format {
                OutputFormat::Text => println!("{report}"),
                OutputFormat::Json => println!("{}", serde_json::to_string(&report)?),
            }
        }
        Commands::Serve => {
            let stdin = std::io::stdin();
            let stdout = std::io::stdout();
            Server::new(config, dir).serve(stdin.lock(), stdout.lock())?;
        }
        Commands::Config {
            action: ConfigCommand::Show,
        } => {
            let rendered = config.to_toml()?;
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(rendered.as_bytes())
                .context("Failed to write config")?;
        }
    }

    Ok(())
}

fn resolver(dir: &Path, config: &Config) -> anyhow::Result<BranchResolver> {
    let repo = Repository::open(dir)?.with_timeout(config.command_timeout());
    Ok(BranchResolver::new(repo))
}
