//! Sylva CLI - Command-line interface for Sylva
//!
//! Imports source documents into the project's tree store, and browses,
//! reroots, edits and deletes the stored trees.

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "sylva")]
#[command(author = "Sylva Contributors")]
#[command(version)]
#[command(about = "Graph-backed storage for phylogenetic trees", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Project directory holding the .sylva store
    #[arg(short, long, global = true, default_value = ".")]
    path: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a tree store in the project directory
    Init,

    /// Import a JSON source document and its trees
    Import {
        /// Source document to import
        file: PathBuf,

        /// Identifier of the source study
        #[arg(short, long)]
        source_id: String,

        /// Where the source lives ("local" or a known remote)
        #[arg(short, long, default_value = "local")]
        location: String,

        /// Replace the source if it already exists
        #[arg(long)]
        overwrite: bool,
    },

    /// List stored sources
    Sources {
        #[arg(short, long, default_value = "local")]
        location: String,

        /// Source ids to leave out
        #[arg(long)]
        exclude: Vec<String>,
    },

    /// List stored trees grouped by source
    Trees {
        #[arg(short, long, default_value = "local")]
        location: String,
    },

    /// Print a stored tree, or part of it
    Show {
        tree_id: String,

        #[arg(short, long, default_value = "local")]
        location: String,

        /// Start at this node instead of the root
        #[arg(short, long)]
        node: Option<u32>,

        /// Maximum number of nodes to fetch
        #[arg(short, long)]
        max_nodes: Option<usize>,

        /// Print Newick instead of an outline
        #[arg(long)]
        newick: bool,

        /// Include branch lengths in Newick output
        #[arg(long)]
        lengths: bool,
    },

    /// Reroot a tree so the given node hangs below the new root
    Reroot {
        tree_id: String,

        /// Node to reroot at
        #[arg(short, long)]
        node: u32,

        #[arg(short, long, default_value = "local")]
        location: String,
    },

    /// Designate (or clear) the ingroup of a tree
    Ingroup {
        tree_id: String,

        /// Base node of the ingroup clade
        #[arg(short, long)]
        node: Option<u32>,

        #[arg(short, long, default_value = "local")]
        location: String,

        /// Remove the ingroup designation instead
        #[arg(long)]
        clear: bool,
    },

    /// Delete a tree
    DeleteTree {
        tree_id: String,

        #[arg(short, long, default_value = "local")]
        location: String,
    },

    /// Delete a source and all of its trees
    DeleteSource {
        source_id: String,

        #[arg(short, long, default_value = "local")]
        location: String,
    },

    /// Find trees by taxon name, ott id or tree property
    Search {
        query: String,

        /// Which tip names to match against
        #[arg(short, long, value_enum, default_value = "mapped")]
        field: Field,

        /// Require an exact name match
        #[arg(long)]
        exact: bool,

        /// Treat the query as an ott id
        #[arg(long, conflicts_with_all = ["exact", "property"])]
        ott_id: bool,

        /// Search this tree property instead of tip names
        #[arg(long)]
        property: Option<String>,
    },

    /// Find sources by a searchable property
    SearchSources {
        /// Property short name (e.g. curator, year)
        property: String,

        query: String,
    },

    /// Show metadata for a source, tree or node
    Metadata {
        #[command(subcommand)]
        target: MetadataTarget,
    },

    /// Set or remove source properties
    EditSource {
        source_id: String,

        #[arg(short, long, default_value = "local")]
        location: String,

        /// KEY=VALUE pairs to set
        #[arg(long = "set")]
        set: Vec<String>,

        /// Keys to remove
        #[arg(long = "unset")]
        unset: Vec<String>,
    },

    /// Set or remove tree properties
    EditTree {
        tree_id: String,

        #[arg(short, long, default_value = "local")]
        location: String,

        /// KEY=VALUE pairs to set
        #[arg(long = "set")]
        set: Vec<String>,

        /// Keys to remove
        #[arg(long = "unset")]
        unset: Vec<String>,
    },

    /// Manage known remote locations
    Remote {
        #[command(subcommand)]
        action: RemoteAction,
    },

    /// Check the store's structural and index invariants
    Verify,
}

#[derive(Subcommand)]
enum MetadataTarget {
    Source {
        source_id: String,
        #[arg(short, long, default_value = "local")]
        location: String,
    },
    Tree {
        tree_id: String,
        #[arg(short, long, default_value = "local")]
        location: String,
    },
    Otu {
        tree_id: String,
        #[arg(short, long)]
        node: u32,
        #[arg(short, long, default_value = "local")]
        location: String,
    },
}

#[derive(Subcommand)]
enum RemoteAction {
    /// Register a remote location
    Add { name: String },
    /// List known remote locations
    List,
}

#[derive(Clone, Copy, ValueEnum)]
enum Field {
    Original,
    Mapped,
    Folded,
}

impl From<Field> for sylva_graph::TaxonField {
    fn from(field: Field) -> Self {
        match field {
            Field::Original => Self::Original,
            Field::Mapped => Self::Mapped,
            Field::Folded => Self::MappedFolded,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(tracing_subscriber::EnvFilter::new(filter))
        .init();

    let project = cli.path.as_path();
    let result = match cli.command {
        Commands::Init => commands::init(project),
        Commands::Import {
            file,
            source_id,
            location,
            overwrite,
        } => commands::import(project, &file, &source_id, &location, overwrite),
        Commands::Sources { location, exclude } => commands::sources(project, &location, &exclude),
        Commands::Trees { location } => commands::trees(project, &location),
        Commands::Show {
            tree_id,
            location,
            node,
            max_nodes,
            newick,
            lengths,
        } => commands::show(
            project,
            &tree_id,
            &location,
            node,
            max_nodes,
            newick.then_some(lengths),
        ),
        Commands::Reroot {
            tree_id,
            node,
            location,
        } => commands::reroot(project, &tree_id, &location, node),
        Commands::Ingroup {
            tree_id,
            node,
            location,
            clear,
        } => commands::ingroup(project, &tree_id, &location, node, clear),
        Commands::DeleteTree { tree_id, location } => commands::delete_tree(project, &tree_id, &location),
        Commands::DeleteSource { source_id, location } => {
            commands::delete_source(project, &source_id, &location)
        }
        Commands::Search {
            query,
            field,
            exact,
            ott_id,
            property,
        } => match (property, ott_id) {
            (Some(property), _) => commands::search_trees(project, &property, &query),
            (None, true) => commands::search_ott_id(project, &query),
            (None, false) => commands::search_taxon(project, &query, field.into(), exact),
        },
        Commands::SearchSources { property, query } => commands::search_sources(project, &property, &query),
        Commands::Metadata { target } => match target {
            MetadataTarget::Source { source_id, location } => {
                commands::source_metadata(project, &source_id, &location)
            }
            MetadataTarget::Tree { tree_id, location } => commands::tree_metadata(project, &tree_id, &location),
            MetadataTarget::Otu {
                tree_id,
                node,
                location,
            } => commands::otu_metadata(project, &tree_id, &location, node),
        },
        Commands::EditSource {
            source_id,
            location,
            set,
            unset,
        } => commands::edit_source(project, &source_id, &location, &set, &unset),
        Commands::EditTree {
            tree_id,
            location,
            set,
            unset,
        } => commands::edit_tree(project, &tree_id, &location, &set, &unset),
        Commands::Remote { action } => match action {
            RemoteAction::Add { name } => commands::remote_add(project, &name),
            RemoteAction::List => commands::remote_list(project),
        },
        Commands::Verify => commands::verify(project),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}
