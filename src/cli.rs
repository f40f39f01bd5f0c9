use std::path::PathBuf;

use clap::builder::styling::{AnsiColor, Color, Styles};
use clap::{Parser, Subcommand, ValueEnum};

fn help_styles() -> Styles {
    Styles::styled()
        .header(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .usage(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .literal(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Cyan))),
        )
        .placeholder(anstyle::Style::new().fg_color(Some(Color::Ansi(AnsiColor::Cyan))))
        .error(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    /// `remote/branch`
    #[default]
    Text,
    /// JSON object
    Json,
}

#[derive(Parser)]
#[command(name = "branchwise")]
#[command(about = "Find the branch a branch was created from", long_about = None)]
#[command(version)]
#[command(disable_help_subcommand = true)]
#[command(styles = help_styles())]
#[command(arg_required_else_help = true)]
#[command(after_long_help = "\
Examples

  branchwise current-branch
  branchwise base-branch                 # Base of the checked-out branch
  branchwise base-branch feature/x --format json
  branchwise diff-stat                   # Changes since the base branch
  branchwise serve                       # JSON requests on stdin, one per line")]
pub(crate) struct Cli {
    /// Working directory for this command
    #[arg(
        short = 'C',
        global = true,
        value_name = "path",
        display_order = 100,
        help_heading = "Global Options"
    )]
    pub directory: Option<PathBuf>,

    /// User config file path
    #[arg(
        long,
        global = true,
        value_name = "path",
        display_order = 101,
        help_heading = "Global Options"
    )]
    pub config: Option<PathBuf>,

    /// Log git commands (-v), or everything (-vv)
    #[arg(
        long,
        short = 'v',
        global = true,
        action = clap::ArgAction::Count,
        display_order = 102,
        help_heading = "Global Options"
    )]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Print the checked-out branch
    ///
    /// Fails when HEAD is detached.
    CurrentBranch,

    /// Print the branch a branch was created from
    ///
    /// Uses the reflog, then tracking configuration, then merge-base analysis
    /// over local and remote branches. Fails instead of guessing when the
    /// evidence is inconclusive.
    BaseBranch {
        /// Branch to resolve (default: the checked-out branch)
        branch: Option<String>,

        /// Remote used to qualify the answer (default: `default-remote` from config)
        #[arg(long)]
        remote: Option<String>,

        /// Output format
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Summarize changes since the base branch
    DiffStat {
        /// Base revision (default: the resolved base branch)
        #[arg(long)]
        base: Option<String>,

        /// Head branch (default: the checked-out branch)
        #[arg(long)]
        head: Option<String>,

        /// Output format
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Answer JSON requests on stdin, one per line
    ///
    /// Methods: current_branch, base_branch, diff_stat, shutdown.
    Serve,

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Subcommand)]
pub(crate) enum ConfigCommand {
    /// Print the effective configuration as TOML
    Show,
}
