// src/main.rs

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use snapdata::layout::{DEFAULT_BASE_DIR, DEFAULT_HOME_ROOT, DEFAULT_ROOT_HOME};
use snapdata::{
    DataLayout, DataMigrator, HiddenLayoutMigrator, LayoutMode, PackageRevision, RealFs, Revision,
    SystemUsers,
};
use tracing::info;

#[derive(Parser)]
#[command(name = "snapdata")]
#[command(author, version, about = "Migrate package data across revisions and layouts", long_about = None)]
struct Cli {
    #[command(flatten)]
    layout: LayoutArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct LayoutArgs {
    /// System data root
    #[arg(long, global = true, default_value = DEFAULT_BASE_DIR)]
    base_dir: String,

    /// Directory holding regular users' homes
    #[arg(long, global = true, default_value = DEFAULT_HOME_ROOT)]
    home_root: String,

    /// Home directory of the root user
    #[arg(long, global = true, default_value = DEFAULT_ROOT_HOME)]
    root_home: String,
}

#[derive(Args)]
struct RevisionArgs {
    /// Package name
    package: String,

    /// New revision (e.g. 42, or x1 for a local revision)
    #[arg(short, long)]
    revision: Revision,

    /// Previously installed revision, if any
    #[arg(short, long)]
    old_revision: Option<Revision>,

    /// Parallel-install instance key
    #[arg(long)]
    instance_key: Option<String>,

    /// Per-user data lives in the hidden layout
    #[arg(long)]
    hidden: bool,
}

impl RevisionArgs {
    fn package_at(&self, revision: Revision) -> PackageRevision {
        let pkg = PackageRevision::new(&self.package, revision);
        match &self.instance_key {
            Some(key) => pkg.with_instance_key(key),
            None => pkg,
        }
    }

    fn new_package(&self) -> PackageRevision {
        self.package_at(self.revision)
    }

    fn old_package(&self) -> Option<PackageRevision> {
        self.old_revision.map(|rev| self.package_at(rev))
    }

    fn mode(&self) -> LayoutMode {
        if self.hidden {
            LayoutMode::PostMigrationHidden
        } else {
            LayoutMode::Exposed
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Copy data of the old revision forward to the new one
    CopyForward(RevisionArgs),
    /// Undo a copy-forward and restore the old revision's data
    UndoCopyForward(RevisionArgs),
    /// Discard trashed data of a revision once its transition is committed
    ClearTrash {
        /// Package name
        package: String,
        /// Revision whose trashed data to discard
        #[arg(short, long)]
        revision: Revision,
        /// Parallel-install instance key
        #[arg(long)]
        instance_key: Option<String>,
    },
    /// Move every user's data to ~/.snap/data
    Hide {
        /// Package instance name
        package: String,
    },
    /// Move every user's data back to ~/snap
    Unhide {
        /// Package instance name
        package: String,
    },
    /// Show each user's data layout for a package
    Status {
        /// Package instance name
        package: String,
    },
}

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let layout = DataLayout::new(
        &cli.layout.base_dir,
        &cli.layout.home_root,
        &cli.layout.root_home,
    );
    let users = SystemUsers::new(layout.clone());
    let fs = RealFs;

    match cli.command {
        Some(Commands::CopyForward(args)) => {
            let new = args.new_package();
            let old = args.old_package();
            info!("Copying data forward for {}", new);
            DataMigrator::new(&layout, &users, &fs)
                .with_mode(args.mode())
                .copy_forward(&new, old.as_ref())?;
            println!("Data ready for {}", new);
            Ok(())
        }
        Some(Commands::UndoCopyForward(args)) => {
            let new = args.new_package();
            let old = args.old_package();
            info!("Undoing data copy for {}", new);
            DataMigrator::new(&layout, &users, &fs)
                .with_mode(args.mode())
                .undo_copy_forward(&new, old.as_ref())?;
            match old {
                Some(old) => println!("Restored data of {}", old),
                None => println!("Removed data created for {}", new),
            }
            Ok(())
        }
        Some(Commands::ClearTrash {
            package,
            revision,
            instance_key,
        }) => {
            let mut pkg = PackageRevision::new(package, revision);
            pkg.instance_key = instance_key;
            DataMigrator::new(&layout, &users, &fs).clear_trash(&pkg);
            println!("Cleared trashed data of {}", pkg);
            Ok(())
        }
        Some(Commands::Hide { package }) => {
            info!("Hiding data of {}", package);
            HiddenLayoutMigrator::new(&layout, &users, &fs).hide(&package)?;
            println!("Moved {} data to the hidden layout", package);
            Ok(())
        }
        Some(Commands::Unhide { package }) => {
            info!("Unhiding data of {}", package);
            HiddenLayoutMigrator::new(&layout, &users, &fs).unhide(&package)?;
            println!("Moved {} data back to the exposed layout", package);
            Ok(())
        }
        Some(Commands::Status { package }) => {
            let modes = HiddenLayoutMigrator::new(&layout, &users, &fs).layout_modes(&package)?;
            if modes.is_empty() {
                println!("No users with package data.");
            } else {
                println!("Data layout of {}:", package);
                for (user, mode) in &modes {
                    let mode = mode.map(|m| m.as_str()).unwrap_or("none");
                    println!("  {} ({}): {}", user.name, user.home.display(), mode);
                }
                println!("\nTotal: {} user(s)", modes.len());
            }
            Ok(())
        }
        None => {
            // No command provided, show help
            println!("Snapdata v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'snapdata --help' for usage information");
            Ok(())
        }
    }
}
