use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use hoard_catalog::Layout;

use super::{download, evict, rebuild, verify};

#[derive(Clone, Debug, Parser)]
#[command(name = "hoard", version = env!("CARGO_PKG_VERSION"), about, long_about = None, propagate_version = true)]
pub struct App {
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    #[command(alias = "dl", name = "download", about = "Download every pending asset into the mirror")]
    Download(download::DownloadArg),
    #[command(alias = "v", name = "verify", about = "Re-verify recorded archives against their digests")]
    Verify(verify::VerifyArg),
    #[command(alias = "rm", name = "evict", about = "Forget ledger entries so they are fetched again")]
    Evict(evict::EvictArg),
    #[command(name = "rebuild", about = "Record verified archives already on disk")]
    Rebuild(rebuild::RebuildArg),
}

/// Destination directory shared by every command.
#[derive(Clone, Debug, Args)]
pub struct DestArg {
    /// Mirror root: archives, ledger and reports live here.
    #[arg(long, short, env = "HOARD_DEST", default_value = "downloaded_assets")]
    pub dest: PathBuf,
}

impl DestArg {
    pub fn layout(&self) -> Layout { Layout::new(&self.dest) }
}

impl App {
    pub async fn run(self) -> Result<ExitCode> {
        match self.cmd {
            Commands::Download(arg) => download::run(arg).await,
            Commands::Verify(arg) => verify::run(arg),
            Commands::Evict(arg) => evict::run(arg),
            Commands::Rebuild(arg) => rebuild::run(arg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_is_well_formed() { App::command().debug_assert(); }

    #[test]
    fn download_flags() {
        let app = App::try_parse_from([
            "hoard", "dl", "--dest", "/m", "-c", "3d", "-c", "surface", "-j", "8", "--token", "abc",
        ])
        .unwrap();
        let Commands::Download(arg) = app.cmd else { panic!("expected download") };
        assert_eq!(arg.dest.dest, PathBuf::from("/m"));
        assert_eq!(arg.categories, vec!["3d", "surface"]);
        assert_eq!(arg.concurrency, Some(8));
        assert_eq!(arg.token.as_deref(), Some("abc"));
        assert_eq!(arg.metadata, PathBuf::from("asset_metadata.json"));
    }

    #[test]
    fn evict_needs_an_id() {
        assert!(App::try_parse_from(["hoard", "evict", "--dest", "/m"]).is_err());
        let app = App::try_parse_from(["hoard", "rm", "--dest", "/m", "a", "b"]).unwrap();
        let Commands::Evict(arg) = app.cmd else { panic!("expected evict") };
        assert_eq!(arg.ids, vec!["a", "b"]);
    }

    #[test]
    fn verify_evict_flag() {
        let app = App::try_parse_from(["hoard", "verify", "--dest", "/m", "--evict"]).unwrap();
        let Commands::Verify(arg) = app.cmd else { panic!("expected verify") };
        assert!(arg.evict);
        assert!(arg.metadata.is_none());
    }
}
