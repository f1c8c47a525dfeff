//! CLI definitions using clap derive API

use clap::builder::{Styles, styling::AnsiColor};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Overrides;

/// locpatch - localization patch engine
///
/// Applies a versioned localization rule set to an upstream source tree,
/// reports drift, and records build provenance.
#[derive(Parser, Debug)]
#[command(
    name = "locpatch",
    author,
    version,
    styles = Styles::styled()
        .header(AnsiColor::Green.on_default().bold())
        .usage(AnsiColor::Green.on_default().bold())
        .literal(AnsiColor::Cyan.on_default().bold())
        .placeholder(AnsiColor::Cyan.on_default()),
    about = "Localization patch engine and build provenance recorder",
    long_about = "locpatch applies a versioned set of exact-text localization rules to an \
                  upstream source tree before it is compiled. Rules that no longer match \
                  exactly once are reported instead of guessed at, the patched tree is \
                  verified to still lex the same way, and every run is recorded.",
    after_help = "\x1b[1m\x1b[32mExamples:\x1b[0m\n    \
                  locpatch apply --rules zh-CN.json --root ./zed --commit 1a2b3c --backend linux-x86_64\n    \
                  locpatch check --rules zh-CN.json --root ./zed --commit 1a2b3c\n    \
                  locpatch lint --rules zh-CN.json\n\n\
                  \x1b[1m\x1b[32mExit codes:\x1b[0m\n    \
                  0 clean or degraded, 2 blocking, 1 error"
)]
pub struct Cli {
    /// Configuration file (defaults to locpatch.yaml in the tree root)
    #[arg(long, short = 'c', global = true, env = "LOCPATCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Only print errors and the final result
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Patch a source tree and record provenance
    Apply(ApplyArgs),

    /// Resolve and classify without writing anything
    Check(CheckArgs),

    /// Flag risky rules in a rule set
    Lint(LintArgs),

    /// Show version information
    Version,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Options shared by commands that run the engine
#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
    /// Rule set document (JSON or YAML)
    #[arg(long, short = 'r', value_name = "FILE")]
    pub rules: PathBuf,

    /// Upstream source tree root
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub root: PathBuf,

    /// Upstream commit identifier the tree is checked out at
    #[arg(long, value_name = "ID")]
    pub commit: String,

    /// Worker threads (defaults to available parallelism)
    #[arg(long, short = 'j', env = "LOCPATCH_CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// Per-file I/O timeout in milliseconds, 0 disables
    #[arg(long, value_name = "MS", env = "LOCPATCH_TIMEOUT_MS")]
    pub timeout_ms: Option<u64>,

    /// Extra glob of tree paths to skip (repeatable)
    #[arg(long, value_name = "GLOB")]
    pub exclude: Vec<String>,

    /// Rules without an explicit `mandatory` field are optional
    #[arg(long)]
    pub optional_by_default: bool,

    /// Print the report as JSON instead of text
    #[arg(long)]
    pub json: bool,
}

impl EngineArgs {
    pub fn overrides(&self, output_dir: Option<PathBuf>) -> Overrides {
        Overrides {
            concurrency: self.concurrency,
            io_timeout_ms: self.timeout_ms,
            default_mandatory: self.optional_by_default.then_some(false),
            output_dir,
            exclude: self.exclude.clone(),
        }
    }
}

/// Arguments for the apply command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Patch in place:\n    locpatch apply -r zh-CN.json --root ./zed --commit 1a2b3c --backend linux-x86_64\n\n\
                  Patch a copy, leaving the checkout untouched:\n    locpatch apply -r zh-CN.json --root ./zed --out ./zed-zh --commit 1a2b3c --backend macos-arm64\n\n\
                  Preview without writing:\n    locpatch apply -r zh-CN.json --root ./zed --commit 1a2b3c --backend linux-x86_64 --dry-run")]
pub struct ApplyArgs {
    #[command(flatten)]
    pub engine: EngineArgs,

    /// Build backend / target identifier recorded in provenance
    #[arg(long, value_name = "ID")]
    pub backend: String,

    /// Copy the tree to this empty directory and patch the copy
    #[arg(long, value_name = "DIR")]
    pub out: Option<PathBuf>,

    /// Directory for reports and provenance (default: <tree>/.locpatch)
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Resolve and classify without writing files, reports or provenance
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the check command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Check whether a rule set still applies:\n    locpatch check -r zh-CN.json --root ./zed --commit 1a2b3c")]
pub struct CheckArgs {
    #[command(flatten)]
    pub engine: EngineArgs,
}

/// Arguments for the lint command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Lint a rule set:\n    locpatch lint -r zh-CN.json\n\n\
                  Lint the rules that can touch one file:\n    locpatch lint -r zh-CN.json --path crates/zed/src/main.rs")]
pub struct LintArgs {
    /// Rule set document (JSON or YAML)
    #[arg(long, short = 'r', value_name = "FILE")]
    pub rules: PathBuf,

    /// Lint only the rule with this key
    #[arg(long, value_name = "KEY", conflicts_with = "path")]
    pub key: Option<String>,

    /// Lint only rules whose scope admits this tree-relative path
    #[arg(long, value_name = "PATH")]
    pub path: Option<String>,

    /// Print findings as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for completions command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Generate bash completions:\n    locpatch completions --shell bash > ~/.bash_completion.d/locpatch\n\n\
                  Generate zsh completions:\n    locpatch completions --shell zsh > ~/.zfunc/_locpatch\n\n\
                  Generate fish completions:\n    locpatch completions --shell fish > ~/.config/fish/completions/locpatch.fish\n\n\
                  Generate PowerShell completions:\n    locpatch completions --shell powershell")]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(long, value_enum)]
    pub shell: clap_complete::Shell,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_cli_parsing_apply() {
        let cli = Cli::try_parse_from([
            "locpatch", "apply", "--rules", "zh.json", "--root", "zed", "--commit", "1a2b3c",
            "--backend", "linux-x86_64",
        ])
        .unwrap();
        match cli.command {
            Commands::Apply(args) => {
                assert_eq!(args.engine.rules, PathBuf::from("zh.json"));
                assert_eq!(args.engine.root, PathBuf::from("zed"));
                assert_eq!(args.engine.commit, "1a2b3c");
                assert_eq!(args.backend, "linux-x86_64");
                assert!(!args.dry_run);
                assert!(args.out.is_none());
            }
            _ => panic!("Expected Apply command"),
        }
    }

    #[test]
    fn test_cli_parsing_apply_requires_commit() {
        let result = Cli::try_parse_from(["locpatch", "apply", "--rules", "zh.json", "--backend", "x"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parsing_check_defaults_root() {
        let cli = Cli::try_parse_from(["locpatch", "check", "-r", "zh.yaml", "--commit", "abc"]).unwrap();
        match cli.command {
            Commands::Check(args) => assert_eq!(args.engine.root, PathBuf::from(".")),
            _ => panic!("Expected Check command"),
        }
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::try_parse_from(["locpatch", "lint", "-r", "zh.yaml", "-v", "--config", "l.yaml"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("l.yaml")));
    }

    #[test]
    fn test_completions_shell_is_validated_by_clap() {
        let cli = Cli::try_parse_from(["locpatch", "completions", "--shell", "zsh"]).unwrap();
        let Commands::Completions(args) = cli.command else {
            panic!("Expected Completions command");
        };
        assert_eq!(args.shell, clap_complete::Shell::Zsh);
        assert!(Cli::try_parse_from(["locpatch", "completions", "--shell", "tcsh"]).is_err());
    }

    #[test]
    fn test_lint_key_conflicts_with_path() {
        let result = Cli::try_parse_from([
            "locpatch", "lint", "-r", "zh.yaml", "--key", "greet", "--path", "src/main.rs",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_overrides_from_args() {
        let cli = Cli::try_parse_from([
            "locpatch", "check", "-r", "zh.yaml", "--commit", "abc", "-j", "3", "--timeout-ms", "0",
            "--exclude", "docs/**", "--optional-by-default",
        ])
        .unwrap();
        let Commands::Check(args) = cli.command else {
            panic!("Expected Check command");
        };
        let overrides = args.engine.overrides(None);
        assert_eq!(overrides.concurrency, Some(3));
        assert_eq!(overrides.io_timeout_ms, Some(0));
        assert_eq!(overrides.default_mandatory, Some(false));
        assert_eq!(overrides.exclude, vec!["docs/**"]);
    }

    #[test]
    #[serial]
    fn test_env_fills_unset_flags() {
        // SAFETY: serialized with the other environment-mutating tests.
        unsafe {
            std::env::set_var("LOCPATCH_CONCURRENCY", "5");
        }
        let from_env = Cli::try_parse_from(["locpatch", "check", "-r", "zh.yaml", "--commit", "abc"]);
        let from_flag =
            Cli::try_parse_from(["locpatch", "check", "-r", "zh.yaml", "--commit", "abc", "-j", "2"]);
        unsafe {
            std::env::remove_var("LOCPATCH_CONCURRENCY");
        }

        let Commands::Check(args) = from_env.unwrap().command else {
            panic!("Expected Check command");
        };
        assert_eq!(args.engine.concurrency, Some(5));
        let Commands::Check(args) = from_flag.unwrap().command else {
            panic!("Expected Check command");
        };
        assert_eq!(args.engine.concurrency, Some(2));
    }
}
