use std::path::PathBuf;

use prefmatch_core::{MatchError, MatchResult};

pub const USAGE: &str = "\
usage: prefmatch [--config <path>] [--load <snapshot.json>] [--refresh]
                 [--verbose | --quiet] [--no-color]

Reads newline-delimited JSON requests on stdin and writes one JSON response
per line to stdout.

ops: add_vector, bulk_load, query, clear, stats";

/// Parsed command-line flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliInput {
    pub config_path: Option<PathBuf>,
    /// Snapshot (`{"user_vectors": [...]}`) bulk-loaded before serving.
    pub load_path: Option<PathBuf>,
    /// Re-read `load_path` on the configured refresh interval.
    pub refresh: bool,
    pub verbose: bool,
    pub quiet: bool,
    pub no_color: bool,
    pub help: bool,
    pub version: bool,
}

/// Parse prefmatch CLI args (without the program name).
///
/// # Errors
///
/// Returns `MatchError::InvalidConfig` for unknown flags, missing flag
/// values, or `--refresh` without `--load`.
pub fn parse_cli_args<I, S>(args: I) -> MatchResult<CliInput>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let tokens: Vec<String> = args.into_iter().map(Into::into).collect();
    let mut input = CliInput::default();
    let mut idx = 0;

    while idx < tokens.len() {
        let flag = tokens[idx].as_str();
        match flag {
            "--config" | "-c" => {
                input.config_path = Some(PathBuf::from(expect_value(&tokens, idx, flag)?));
                idx += 2;
            }
            "--load" => {
                input.load_path = Some(PathBuf::from(expect_value(&tokens, idx, flag)?));
                idx += 2;
            }
            "--refresh" => {
                input.refresh = true;
                idx += 1;
            }
            "--verbose" | "-v" => {
                input.verbose = true;
                idx += 1;
            }
            "--quiet" | "-q" => {
                input.quiet = true;
                idx += 1;
            }
            "--no-color" => {
                input.no_color = true;
                idx += 1;
            }
            "--help" | "-h" => {
                input.help = true;
                idx += 1;
            }
            "--version" | "-V" => {
                input.version = true;
                idx += 1;
            }
            _ => {
                return Err(MatchError::InvalidConfig {
                    field: "cli.flag".into(),
                    value: flag.into(),
                    reason: "unsupported flag (see --help)".into(),
                });
            }
        }
    }

    if input.refresh && input.load_path.is_none() {
        return Err(MatchError::InvalidConfig {
            field: "cli.flag".into(),
            value: "--refresh".into(),
            reason: "--refresh needs a snapshot file given with --load".into(),
        });
    }

    Ok(input)
}

fn expect_value<'a>(tokens: &'a [String], idx: usize, flag: &str) -> MatchResult<&'a str> {
    tokens
        .get(idx + 1)
        .map(String::as_str)
        .filter(|value| !value.starts_with("--"))
        .ok_or_else(|| MatchError::InvalidConfig {
            field: "cli.flag".into(),
            value: flag.into(),
            reason: "missing value".into(),
        })
}
