pub mod handlers;

use crate::presentation::cli::{Cli, Commands, FragmentCommands};
use clap::Parser;
use erp_core::DriverClothesSwap;
use erp_core::error::Result;

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::List { archive, long } => handlers::handle_list(archive, long),
        Commands::Info { archive } => handlers::handle_info(archive),
        Commands::Verify { archive } => handlers::handle_verify(archive),
        Commands::Export {
            archive,
            dest,
            filter,
        } => handlers::handle_export(archive, dest, filter),
        Commands::Import {
            archive,
            src,
            compress,
            save,
        } => handlers::handle_import(archive, src, compress, save),
        Commands::Rename {
            archive,
            identifier,
            new_name,
            save,
        } => handlers::handle_rename(archive, identifier, new_name, save),
        Commands::Repath {
            archive,
            identifier,
            new_identifier,
            force,
            save,
        } => handlers::handle_repath(archive, identifier, new_identifier, force, save),
        Commands::SetType {
            archive,
            identifier,
            new_type,
            save,
        } => handlers::handle_set_type(archive, identifier, new_type, save),
        Commands::Duplicate {
            archive,
            identifier,
            new_identifier,
            save,
        } => handlers::handle_duplicate(archive, identifier, new_identifier, save),
        Commands::Fragment(cmd) => match cmd {
            FragmentCommands::Add {
                archive,
                identifier,
                save,
            } => handlers::handle_fragment_add(archive, identifier, save),
            FragmentCommands::Rm {
                archive,
                identifier,
                save,
            } => handlers::handle_fragment_rm(archive, identifier, save),
        },
        Commands::ReplaceAll {
            archive,
            find,
            replace,
            save,
        } => handlers::handle_replace_all(archive, find, replace, save),
        Commands::SwapDriver {
            archive,
            src_driver,
            src_team,
            dest_driver,
            dest_team,
            save,
        } => handlers::handle_swap_driver(
            archive,
            DriverClothesSwap {
                src_driver,
                src_team,
                dest_driver,
                dest_team,
            },
            save,
        ),
        Commands::Transform { archive, save } => handlers::handle_transform(archive, save),
    }
}
