use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;

use crate::pipeline::Pipeline;
use crate::worker::{CommandStore, FileNaming, HttpFetcher, Worker};

/// Server settings, read once at startup from flags or the environment.
#[derive(Debug, Clone, Args)]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "PINNER_ADDR", default_value = "0.0.0.0:5050")]
    pub addr: String,

    /// Bearer token clients must present
    #[arg(long, env = "PINNER_API_TOKEN", hide_env_values = true)]
    pub api_token: String,

    /// Bearer token sent when downloading sources
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub fetch_token: Option<String>,

    /// Directory that holds downloads while they are being stored
    #[arg(long, env = "IPFS_DIRECTORY", default_value_os_t = std::env::temp_dir())]
    pub directory: PathBuf,

    /// Program that registers a file and prints its identifier
    #[arg(long, env = "PINNER_STORE_BIN", default_value = "ipfs")]
    pub store_bin: String,

    /// Arguments passed before the file path
    #[arg(
        long = "store-arg",
        default_values = ["add", "--quieter"],
        allow_hyphen_values = true
    )]
    pub store_args: Vec<String>,

    /// Maximum concurrent jobs per batch or connection (unbounded if unset)
    #[arg(long, env = "PINNER_CONCURRENCY", value_parser = clap::value_parser!(u32).range(1..))]
    pub concurrency: Option<u32>,

    /// How stored files are named
    #[arg(long, value_enum, default_value_t = FileNaming::ContentDisposition)]
    pub file_naming: FileNaming,
}

impl Config {
    /// Worker wired to the HTTP fetcher and the store command.
    pub fn worker(&self) -> Worker {
        let fetcher = HttpFetcher::new(
            self.directory.clone(),
            self.fetch_token.clone(),
            self.file_naming,
        );
        let store = CommandStore::new(self.store_bin.clone(), self.store_args.clone());
        Worker::new(Arc::new(fetcher), Arc::new(store))
    }

    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(self.worker(), self.concurrency.map(|n| n as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        config: Config,
    }

    #[test]
    fn test_defaults() {
        let cli = TestCli::try_parse_from(["pinner", "--api-token", "t0ken"]).unwrap();
        let config = cli.config;

        assert_eq!(config.api_token, "t0ken");
        assert_eq!(config.store_bin, "ipfs");
        assert_eq!(config.store_args, vec!["add", "--quieter"]);
        assert_eq!(config.file_naming, FileNaming::ContentDisposition);
    }

    #[test]
    fn test_overrides() {
        let cli = TestCli::try_parse_from([
            "pinner",
            "--api-token",
            "t0ken",
            "--store-bin",
            "cat",
            "--store-arg",
            "-u",
            "--concurrency",
            "4",
            "--file-naming",
            "job-name",
        ])
        .unwrap();
        let config = cli.config;

        assert_eq!(config.store_args, vec!["-u"]);
        assert_eq!(config.concurrency, Some(4));
        assert_eq!(config.file_naming, FileNaming::JobName);
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        assert!(
            TestCli::try_parse_from(["pinner", "--api-token", "t", "--concurrency", "0"]).is_err()
        );
    }
}
