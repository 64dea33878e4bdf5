// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn revision_args(cmd: Command) -> Command {
    cmd.arg(Arg::new("package").required(true).help("Package name"))
        .arg(
            Arg::new("revision")
                .short('r')
                .long("revision")
                .required(true)
                .help("New revision (e.g. 42, or x1 for a local revision)"),
        )
        .arg(
            Arg::new("old_revision")
                .short('o')
                .long("old-revision")
                .help("Previously installed revision, if any"),
        )
        .arg(
            Arg::new("instance_key")
                .long("instance-key")
                .help("Parallel-install instance key"),
        )
        .arg(
            Arg::new("hidden")
                .long("hidden")
                .action(ArgAction::SetTrue)
                .help("Per-user data lives in the hidden layout"),
        )
}

fn build_cli() -> Command {
    Command::new("snapdata")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Snapdata Contributors")
        .about("Migrate package data across revisions and layouts")
        .subcommand_required(false)
        .arg(
            Arg::new("base_dir")
                .long("base-dir")
                .global(true)
                .default_value("/var/snap")
                .help("System data root"),
        )
        .arg(
            Arg::new("home_root")
                .long("home-root")
                .global(true)
                .default_value("/home")
                .help("Directory holding regular users' homes"),
        )
        .arg(
            Arg::new("root_home")
                .long("root-home")
                .global(true)
                .default_value("/root")
                .help("Home directory of the root user"),
        )
        .subcommand(revision_args(
            Command::new("copy-forward").about("Copy data of the old revision forward to the new one"),
        ))
        .subcommand(revision_args(
            Command::new("undo-copy-forward")
                .about("Undo a copy-forward and restore the old revision's data"),
        ))
        .subcommand(
            Command::new("clear-trash")
                .about("Discard trashed data of a revision once its transition is committed")
                .arg(Arg::new("package").required(true).help("Package name"))
                .arg(
                    Arg::new("revision")
                        .short('r')
                        .long("revision")
                        .required(true)
                        .help("Revision whose trashed data to discard"),
                )
                .arg(
                    Arg::new("instance_key")
                        .long("instance-key")
                        .help("Parallel-install instance key"),
                ),
        )
        .subcommand(
            Command::new("hide")
                .about("Move every user's data to ~/.snap/data")
                .arg(Arg::new("package").required(true).help("Package instance name")),
        )
        .subcommand(
            Command::new("unhide")
                .about("Move every user's data back to ~/snap")
                .arg(Arg::new("package").required(true).help("Package instance name")),
        )
        .subcommand(
            Command::new("status")
                .about("Show each user's data layout for a package")
                .arg(Arg::new("package").required(true).help("Package instance name")),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory
    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    // Generate main man page
    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();
    man.render(&mut buffer).expect("Failed to render man page");

    let man_path = man_dir.join("snapdata.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");

    println!("cargo:warning=Man page generated at {}", man_path.display());
}
