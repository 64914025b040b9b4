//! tabletd Admin CLI
//!
//! Offline management of a server's catalog and inspection of tablet
//! metadata. Run it while the server is stopped.

use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tabletd::catalog::{TabletCatalog, TabletDescriptor};
use tabletd::fs_manager::FsManager;
use tabletd::metadata::{FsMetadataStore, MasterBlock, MetadataStore};
use tabletd::schema::{key_value_schema, twitter_demo_schema};

/// tabletd Admin
#[derive(Parser, Debug)]
#[command(name = "tabletd-admin")]
#[command(about = "Manage the tablet catalog of a tabletd data directory")]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./tabletd_data")]
    data_dir: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Add a tablet to the catalog
    AddTablet {
        /// Tablet id
        #[arg(long)]
        id: String,

        /// First superblock id
        #[arg(long)]
        block_a: String,

        /// Second superblock id
        #[arg(long)]
        block_b: String,

        /// Schema of the new tablet
        #[arg(long, value_enum, default_value_t = SchemaArg::KeyValue)]
        schema: SchemaArg,
    },

    /// Remove a tablet from the catalog (its files are left in place)
    RemoveTablet {
        /// Tablet id
        #[arg(long)]
        id: String,
    },

    /// List the tablets in the catalog
    List,

    /// Print the persisted metadata of a tablet
    ShowMetadata {
        /// Tablet id
        #[arg(long)]
        id: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SchemaArg {
    KeyValue,
    Twitter,
}

fn main() {
    let args = Args::parse();
    let fs = FsManager::new(&args.data_dir);

    if let Err(e) = run(&fs, args.command) {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}

fn run(fs: &FsManager, command: Commands) -> tabletd::Result<()> {
    let mut catalog = TabletCatalog::load(&fs.catalog_path())?;

    match command {
        Commands::AddTablet {
            id,
            block_a,
            block_b,
            schema,
        } => {
            let schema = match schema {
                SchemaArg::KeyValue => key_value_schema(),
                SchemaArg::Twitter => twitter_demo_schema(),
            };
            catalog.add(TabletDescriptor::new(
                MasterBlock::new(&id, block_a, block_b),
                schema,
            ))?;
            catalog.save()?;
            println!("Added tablet {}", id);
        }
        Commands::RemoveTablet { id } => {
            catalog.remove(&id)?;
            catalog.save()?;
            println!("Removed tablet {}", id);
        }
        Commands::List => {
            if catalog.is_empty() {
                println!("(no tablets)");
            }
            for tablet in catalog.tablets() {
                println!(
                    "{}\tblocks={},{}\tcolumns={}",
                    tablet.tablet_id(),
                    tablet.master_block.block_a(),
                    tablet.master_block.block_b(),
                    tablet.schema.columns().len()
                );
            }
        }
        Commands::ShowMetadata { id } => {
            let descriptor = catalog
                .get(&id)
                .ok_or_else(|| tabletd::TabletError::NotFound(format!("tablet {}", id)))?;
            let store = FsMetadataStore::new(fs.clone());
            match store.load(&descriptor.master_block)? {
                Some(metadata) => {
                    println!("tablet_id:        {}", metadata.tablet_id());
                    println!("superblock_seq:   {}", metadata.superblock_seq());
                    println!("last_durable_lsn: {}", metadata.last_durable_lsn());
                    println!("rowsets:          {:?}", metadata.rowsets());
                    for column in metadata.schema().columns() {
                        println!(
                            "column:           {} {:?}{}",
                            column.name,
                            column.data_type,
                            if column.nullable { " NULL" } else { "" }
                        );
                    }
                }
                None => println!("tablet {} has no metadata yet", id),
            }
        }
    }

    Ok(())
}
