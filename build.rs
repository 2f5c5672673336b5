// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn path_arg(id: &'static str, long: &'static str, help: &'static str) -> Arg {
    Arg::new(id).long(long).value_name("DIR").help(help)
}

fn flag(id: &'static str, long: &'static str, help: &'static str) -> Arg {
    Arg::new(id).long(long).action(ArgAction::SetTrue).help(help)
}

fn build_cli() -> Command {
    Command::new("debsync")
        .version(env!("CARGO_PKG_VERSION"))
        .author("debsync Contributors")
        .about("Bandwidth-limited partial mirror of Debian/Ubuntu repositories")
        .arg(
            Arg::new("sources")
                .required(true)
                .help("Sources list describing what to mirror (deb <url> <dist> <components...>)"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("TOML settings file"),
        )
        .arg(path_arg("mirror_root", "mirror-root", "Root of the published mirror"))
        .arg(path_arg("work_root", "work-root", "Root of the staging area"))
        .arg(
            Arg::new("bwlimit")
                .long("bwlimit")
                .value_name("KBPS")
                .help("Aggregate bandwidth limit in KB/s"),
        )
        .arg(
            Arg::new("jobs")
                .short('j')
                .long("jobs")
                .help("Number of sources mirrored concurrently"),
        )
        .arg(
            Arg::new("arch")
                .short('a')
                .long("arch")
                .value_name("ARCH")
                .action(ArgAction::Append)
                .help("Architecture for sources without an arch= option (repeatable)"),
        )
        .arg(
            Arg::new("http_timeout")
                .long("http-timeout")
                .value_name("SECS")
                .help("Per-request timeout for HTTP sources, in seconds"),
        )
        .arg(flag("dry_run", "dry-run", "Fetch and report, but neither prune nor publish"))
        .arg(flag(
            "prune_empty_dirs",
            "prune-empty-dirs",
            "Remove directories left empty after pruning",
        ))
        .arg(flag("verbose", "verbose", "Debug logging").short('v'))
        .arg(flag("quiet", "quiet", "Only log warnings and errors").short('q'))
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    if let Err(e) = fs::write(man_dir.join("debsync.1"), buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
