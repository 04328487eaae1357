//! CLI command definitions using clap

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fmt;
use std::path::PathBuf;

/// formprobe: run the Customer Service Center form suite
#[derive(Parser, Debug)]
#[command(name = "formprobe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Log line format
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormatArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the suite
    Run(RunArgs),

    /// List the suite's cases in declaration order
    List(ListArgs),

    /// Print the effective configuration as YAML
    Config(ConfigArgs),
}

/// Where the suite runs
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Target {
    /// The in-memory replica of the application
    #[default]
    Builtin,
    /// A served copy of the application, driven through Chromium
    Url(String),
}

impl Target {
    /// Parse `builtin` or an `http(s)://` / `file://` URL
    pub fn parse(value: &str) -> Result<Self, String> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("builtin") {
            return Ok(Self::Builtin);
        }
        if ["http://", "https://", "file://"]
            .iter()
            .any(|scheme| value.starts_with(scheme))
        {
            let mut url = value.to_string();
            if !url.ends_with('/') {
                url.push('/');
            }
            return Ok(Self::Url(url));
        }
        Err(format!(
            "expected `builtin` or an http(s):// or file:// URL, got `{value}`"
        ))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Builtin => f.write_str("builtin"),
            Self::Url(url) => f.write_str(url),
        }
    }
}

/// Settings shared by `run` and `config`; flags win over the config file
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// YAML config file
    #[arg(short, long, env = "FORMPROBE_CONFIG")]
    pub config: Option<PathBuf>,

    /// `builtin` or the base URL of a served application
    #[arg(short, long, env = "FORMPROBE_BASE_URL", default_value = "builtin", value_parser = Target::parse)]
    pub target: Target,

    /// Retry budget for queries and assertions, in milliseconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Fixture directory
    #[arg(long)]
    pub fixtures: Option<PathBuf>,

    /// Number of parallel cases (0 = one per CPU)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Stop at the first failing case
    #[arg(long)]
    pub fail_fast: bool,
}

/// Arguments for the run command
#[derive(Parser, Debug, Clone, Default)]
pub struct RunArgs {
    /// Config sources and overrides
    #[command(flatten)]
    pub overrides: ConfigOverrides,

    /// Only run cases whose name contains this
    #[arg(short, long)]
    pub filter: Option<String>,

    /// Run the cases in reverse declaration order
    #[arg(long)]
    pub reverse: bool,

    /// Write a JUnit XML report here
    #[arg(long)]
    pub junit: Option<PathBuf>,

    /// Write a JSON report here
    #[arg(long)]
    pub json: Option<PathBuf>,
}

/// Arguments for the list command
#[derive(Parser, Debug, Clone, Default)]
pub struct ListArgs {
    /// Only list cases whose name contains this
    #[arg(short, long)]
    pub filter: Option<String>,
}

/// Arguments for the config command
#[derive(Parser, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Config sources and overrides
    #[command(flatten)]
    pub overrides: ConfigOverrides,
}

/// Color argument for CLI
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

/// Log format argument for CLI
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormatArg {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

impl From<LogFormatArg> for crate::logging::LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => Self::Text,
            LogFormatArg::Json => Self::Json,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    mod cli_tests {
        use super::*;

        #[test]
        fn test_parse_run_command() {
            let cli = Cli::parse_from(["formprobe", "run"]);
            if let Commands::Run(args) = cli.command {
                assert!(args.filter.is_none());
                assert!(!args.reverse);
                assert!(!args.overrides.fail_fast);
            } else {
                panic!("expected Run command");
            }
        }

        #[test]
        fn test_parse_run_with_filter_and_reports() {
            let cli = Cli::parse_from([
                "formprobe",
                "run",
                "--filter",
                "2.",
                "--junit",
                "out.xml",
                "--json",
                "out.json",
            ]);
            if let Commands::Run(args) = cli.command {
                assert_eq!(args.filter.as_deref(), Some("2."));
                assert_eq!(args.junit, Some(PathBuf::from("out.xml")));
                assert_eq!(args.json, Some(PathBuf::from("out.json")));
            } else {
                panic!("expected Run command");
            }
        }

        #[test]
        fn test_parse_overrides() {
            let cli = Cli::parse_from([
                "formprobe",
                "run",
                "-j",
                "4",
                "--timeout",
                "1500",
                "--fail-fast",
                "--fixtures",
                "data",
            ]);
            if let Commands::Run(args) = cli.command {
                assert_eq!(args.overrides.jobs, Some(4));
                assert_eq!(args.overrides.timeout, Some(1500));
                assert!(args.overrides.fail_fast);
                assert_eq!(args.overrides.fixtures, Some(PathBuf::from("data")));
            } else {
                panic!("expected Run command");
            }
        }

        #[test]
        fn test_parse_list_command() {
            let cli = Cli::parse_from(["formprobe", "list", "-f", "7."]);
            if let Commands::List(args) = cli.command {
                assert_eq!(args.filter.as_deref(), Some("7."));
            } else {
                panic!("expected List command");
            }
        }

        #[test]
        fn test_global_flags() {
            let cli = Cli::parse_from(["formprobe", "config", "-vv", "--color", "never", "--log-format", "json"]);
            assert_eq!(cli.verbose, 2);
            assert_eq!(cli.color, ColorArg::Never);
            assert_eq!(cli.log_format, LogFormatArg::Json);
            assert!(matches!(cli.command, Commands::Config(_)));
        }

        #[test]
        fn test_bad_target_rejected() {
            let result = Cli::try_parse_from(["formprobe", "run", "--target", "ftp://example.com"]);
            assert!(result.is_err());
        }
    }

    mod target_tests {
        use super::*;

        #[test]
        fn test_builtin() {
            assert_eq!(Target::parse("builtin").unwrap(), Target::Builtin);
            assert_eq!(Target::parse(" BUILTIN ").unwrap(), Target::Builtin);
            assert_eq!(Target::Builtin.to_string(), "builtin");
        }

        #[test]
        fn test_url_gets_trailing_slash() {
            assert_eq!(
                Target::parse("http://localhost:8080").unwrap(),
                Target::Url("http://localhost:8080/".into())
            );
            assert_eq!(
                Target::parse("file:///srv/csc/").unwrap(),
                Target::Url("file:///srv/csc/".into())
            );
        }

        #[test]
        fn test_rejects_other_values() {
            assert!(Target::parse("localhost").is_err());
            assert!(Target::parse("").is_err());
        }
    }

    mod conversion_tests {
        use super::*;
        use crate::config::ColorChoice;
        use crate::logging::LogFormat;

        #[test]
        fn test_color_conversion() {
            assert_eq!(ColorChoice::from(ColorArg::Always), ColorChoice::Always);
            assert_eq!(ColorChoice::from(ColorArg::Never), ColorChoice::Never);
            assert_eq!(ColorChoice::from(ColorArg::Auto), ColorChoice::Auto);
        }

        #[test]
        fn test_log_format_conversion() {
            assert_eq!(LogFormat::from(LogFormatArg::Json), LogFormat::Json);
            assert_eq!(LogFormat::from(LogFormatArg::Text), LogFormat::Text);
        }
    }
}
