use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "class-inventory")]
#[command(about = "Inventory methods, fields and referenced types of compiled Java classes via javap")]
pub struct Cli {
    /// Directory scanned recursively for class files
    #[arg(value_name = "ROOT")]
    pub root: PathBuf,

    #[arg(long, value_name = "FILE")]
    pub javap: Option<PathBuf>,

    /// Arguments placed before the class file path (default: -v)
    #[arg(long = "javap-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub javap_args: Vec<String>,

    #[arg(short = 'o', long, value_name = "FILE", default_value = "class_info.json")]
    pub output: PathBuf,

    #[arg(long, value_name = "FILE", default_value = "javap_output.log")]
    pub log: PathBuf,

    #[arg(long)]
    pub append_log: bool,

    #[arg(short = 'j', long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Per-class timeout in seconds, 0 disables
    #[arg(long, value_name = "SECS", default_value_t = 60)]
    pub timeout: u64,

    #[arg(long, value_name = "EXT", default_value = "class")]
    pub extension: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_historical_file_names() {
        let cli = Cli::parse_from(["class-inventory", "build/classes"]);
        assert_eq!(cli.root, PathBuf::from("build/classes"));
        assert_eq!(cli.output, PathBuf::from("class_info.json"));
        assert_eq!(cli.log, PathBuf::from("javap_output.log"));
        assert_eq!(cli.timeout, 60);
        assert_eq!(cli.extension, "class");
        assert!(cli.javap_args.is_empty());
        assert!(!cli.append_log);
    }

    #[test]
    fn javap_args_accept_leading_hyphens() {
        let cli = Cli::parse_from([
            "class-inventory",
            "--javap-arg",
            "-v",
            "--javap-arg",
            "-private",
            "-j",
            "4",
            "out",
        ]);
        assert_eq!(cli.javap_args, vec!["-v", "-private"]);
        assert_eq!(cli.jobs, Some(4));
        assert_eq!(cli.root, PathBuf::from("out"));
    }
}
