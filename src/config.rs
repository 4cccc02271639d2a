use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::Cli;
use crate::javap::{Javap, VERBOSE_FLAG};

pub const JAVAP_ENV: &str = "CLASS_INVENTORY_JAVAP";

#[derive(Debug, Clone)]
pub struct InventoryConfig {
    pub root: PathBuf,
    pub extension: String,
    pub javap: PathBuf,
    pub javap_args: Vec<String>,
    pub timeout: Option<Duration>,
    pub jobs: usize,
    pub output: PathBuf,
    pub log: PathBuf,
    pub append_log: bool,
}

impl InventoryConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let root = std::path::absolute(&cli.root)
            .with_context(|| format!("Failed to resolve scan root: {}", cli.root.display()))?;

        let javap_args = if cli.javap_args.is_empty() {
            vec![VERBOSE_FLAG.to_string()]
        } else {
            cli.javap_args.clone()
        };

        let extension = cli.extension.trim_start_matches('.').to_string();
        if extension.is_empty() {
            anyhow::bail!("--extension must not be empty");
        }

        Ok(Self {
            root,
            extension,
            javap: resolve_javap_path(cli),
            javap_args,
            timeout: (cli.timeout > 0).then(|| Duration::from_secs(cli.timeout)),
            jobs: cli.jobs.unwrap_or(0),
            output: cli.output.clone(),
            log: cli.log.clone(),
            append_log: cli.append_log,
        })
    }

    pub fn javap(&self) -> Javap {
        Javap::new(self.javap.clone())
            .with_args(self.javap_args.clone())
            .with_timeout(self.timeout)
    }
}

pub fn resolve_javap_path(cli: &Cli) -> PathBuf {
    let env_value = env::var_os(JAVAP_ENV).map(PathBuf::from);
    let java_home = env::var_os("JAVA_HOME").map(PathBuf::from);
    pick_javap_path(cli.javap.clone(), env_value, java_home.as_deref())
}

/// Flag, then `CLASS_INVENTORY_JAVAP`, then `$JAVA_HOME/bin/javap`, then
/// `javap` from `PATH`.
fn pick_javap_path(
    flag: Option<PathBuf>,
    env_value: Option<PathBuf>,
    java_home: Option<&Path>,
) -> PathBuf {
    if let Some(p) = flag {
        return p;
    }

    if let Some(p) = env_value.filter(|p| !p.as_os_str().is_empty()) {
        return p;
    }

    if let Some(home) = java_home {
        let candidate = home.join("bin").join(javap_file_name());
        if candidate.is_file() {
            return candidate;
        }
    }

    PathBuf::from("javap")
}

fn javap_file_name() -> &'static str {
    if cfg!(windows) { "javap.exe" } else { "javap" }
}
