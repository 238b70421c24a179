//! Clap command definition.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgMatches, Command};

use stacktester_executor::MAX_API_VERSION;

/// Build the command-line interface.
pub fn build_cli() -> Command {
    Command::new("stacktester")
        .about("Runs a stack-machine instruction stream against the in-memory store")
        .arg(
            Arg::new("prefix")
                .help("Key prefix of the root instruction stream")
                .required(true),
        )
        .arg(
            Arg::new("api_version")
                .help("Client API version the stream was generated for")
                .value_parser(value_parser!(u32))
                .required(true),
        )
        .arg(
            Arg::new("cluster")
                .help("Snapshot file holding the keyspace, loaded before and written after the run")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("Configuration file with [tester] and [store] sections")
                .value_parser(value_parser!(PathBuf)),
        )
}

/// Parsed command-line arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    /// Root instruction prefix
    pub prefix: Vec<u8>,
    /// Requested API version
    pub api_version: u32,
    /// Snapshot file standing in for a cluster file
    pub cluster: Option<PathBuf>,
    /// Configuration file
    pub config: Option<PathBuf>,
}

impl Invocation {
    /// Extract an invocation from parsed arguments.
    ///
    /// # Errors
    ///
    /// Fails when the API version is newer than this build supports.
    pub fn from_matches(matches: &ArgMatches) -> Result<Self> {
        let prefix = matches
            .get_one::<String>("prefix")
            .context("missing prefix argument")?
            .clone()
            .into_bytes();
        let api_version = *matches
            .get_one::<u32>("api_version")
            .context("missing API version argument")?;
        if api_version > MAX_API_VERSION {
            bail!(
                "API version {} is not supported (maximum {})",
                api_version,
                MAX_API_VERSION
            );
        }

        Ok(Invocation {
            prefix,
            api_version,
            cluster: matches.get_one::<PathBuf>("cluster").cloned(),
            config: matches.get_one::<PathBuf>("config").cloned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Invocation> {
        let matches = build_cli().try_get_matches_from(args)?;
        Invocation::from_matches(&matches)
    }

    #[test]
    fn test_positional_arguments() {
        let inv = parse(&["stacktester", "test_spec", "510", "keys.snap"]).unwrap();
        assert_eq!(inv.prefix, b"test_spec".to_vec());
        assert_eq!(inv.api_version, 510);
        assert_eq!(inv.cluster, Some(PathBuf::from("keys.snap")));
        assert_eq!(inv.config, None);
    }

    #[test]
    fn test_config_flag() {
        let inv = parse(&["stacktester", "--config", "t.toml", "p", "500"]).unwrap();
        assert_eq!(inv.config, Some(PathBuf::from("t.toml")));
        assert_eq!(inv.cluster, None);
    }

    #[test]
    fn test_rejects_newer_api_version() {
        let err = parse(&["stacktester", "p", "520"]).unwrap_err();
        assert!(err.to_string().contains("not supported"));
    }

    #[test]
    fn test_rejects_non_numeric_api_version() {
        assert!(parse(&["stacktester", "p", "latest"]).is_err());
    }
}
