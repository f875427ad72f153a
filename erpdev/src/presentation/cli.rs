use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about = "erpdev: inspect and edit ERP archives", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Where an edit is written; the input archive unless `--out` is given.
#[derive(Args, Clone)]
pub struct SaveTarget {
    /// write the edited archive here instead of overwriting the input
    #[arg(long)]
    pub out: Option<PathBuf>,
    /// zero the manifest timestamp for reproducible output
    #[arg(long)]
    pub deterministic: bool,
}

#[derive(Subcommand)]
pub enum FragmentCommands {
    /// Append a copy of the last fragment to a resource
    Add {
        archive: PathBuf,
        identifier: String,
        #[command(flatten)]
        save: SaveTarget,
    },
    /// Remove the last fragment of a resource
    Rm {
        archive: PathBuf,
        identifier: String,
        #[command(flatten)]
        save: SaveTarget,
    },
}

#[derive(Subcommand)]
pub enum Commands {
    /// List resources in archive order
    List {
        archive: PathBuf,
        /// also print every fragment with codec, sizes and offset
        #[arg(long)]
        long: bool,
    },

    /// Show container metadata, totals and duplicate identifiers
    Info { archive: PathBuf },

    /// Verify archive integrity against the tail digests
    Verify { archive: PathBuf },

    /// Export resource payloads into a directory tree
    Export {
        archive: PathBuf,
        dest: PathBuf,
        /// only export resources whose file name ends with this suffix
        #[arg(long)]
        filter: Option<String>,
    },

    /// Import payloads from a previously exported directory tree
    Import {
        archive: PathBuf,
        src: PathBuf,
        /// force compression on (true) or off (false) for imported fragments
        #[arg(long)]
        compress: Option<bool>,
        #[command(flatten)]
        save: SaveTarget,
    },

    /// Change a resource's display name
    Rename {
        archive: PathBuf,
        identifier: String,
        new_name: String,
        #[command(flatten)]
        save: SaveTarget,
    },

    /// Change a resource's identifier
    Repath {
        archive: PathBuf,
        identifier: String,
        new_identifier: String,
        /// allow the new identifier to already exist
        #[arg(long)]
        force: bool,
        #[command(flatten)]
        save: SaveTarget,
    },

    /// Change a resource's type tag
    SetType {
        archive: PathBuf,
        identifier: String,
        new_type: String,
        #[command(flatten)]
        save: SaveTarget,
    },

    /// Copy a resource under a new identifier
    Duplicate {
        archive: PathBuf,
        identifier: String,
        new_identifier: String,
        #[command(flatten)]
        save: SaveTarget,
    },

    #[command(subcommand)]
    /// Add or remove fragments
    Fragment(FragmentCommands),

    /// Replace a substring in every identifier
    ReplaceAll {
        archive: PathBuf,
        find: String,
        replace: String,
        #[command(flatten)]
        save: SaveTarget,
    },

    /// Swap driver clothing between two driver/team pairs
    SwapDriver {
        archive: PathBuf,
        #[arg(long)]
        src_driver: String,
        #[arg(long)]
        src_team: String,
        #[arg(long)]
        dest_driver: String,
        #[arg(long)]
        dest_team: String,
        #[command(flatten)]
        save: SaveTarget,
    },

    /// Retarget a track archive from miami to shanghai
    Transform {
        archive: PathBuf,
        #[command(flatten)]
        save: SaveTarget,
    },
}
