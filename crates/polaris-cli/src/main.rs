//! Polaris admin CLI.
//!
//! No CLI ships as part of the core engine; this is a thin wrapper that
//! invokes `GraphStore`/`VectorStore` operations directly against the same
//! on-disk stores a running agent would use. Nothing here talks to an LLM
//! or an embedding model — extraction and ingestion stay behind the
//! library's own entry points.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;
use polaris_core::graph::GraphStore;
use polaris_core::vector::VectorStore;
use polaris_core::Config;

#[derive(Parser)]
#[command(name = "polaris")]
#[command(author)]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Admin CLI for the Polaris graph/vector stores")]
struct Cli {
    /// User id to operate on.
    #[arg(long, global = true, default_value = "default")]
    user: String,

    /// Data root (defaults to the same `POLARIS_DATA_ROOT` the engine reads).
    #[arg(long, global = true)]
    data_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show node/edge counts and vector collection sizes.
    Stats,

    /// List nodes sitting in the staging mirror, awaiting review.
    StagingList,

    /// Promote staged nodes (and their edges) into the canonical graph.
    StagingCommit {
        /// Node ids to promote; omit to commit everything staged.
        node_ids: Vec<String>,
    },

    /// Discard everything in the staging mirror without promoting it.
    StagingClear,

    /// Re-run singleton merge/id-canonicalization healing.
    SelfHeal,

    /// Wipe the graph and vector stores for the given user. Irreversible.
    ClearAll {
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    let data_root = cli.data_root.unwrap_or(config.data_root.clone());

    let graph = GraphStore::open(data_root.join("brain.db"))?;
    let vectors = VectorStore::open(data_root.join("chroma"), config.vector_dimension)?;

    match cli.command {
        Commands::Stats => run_stats(&graph, &vectors, &cli.user),
        Commands::StagingList => run_staging_list(&graph, &cli.user),
        Commands::StagingCommit { node_ids } => run_staging_commit(&graph, &cli.user, node_ids),
        Commands::StagingClear => run_staging_clear(&graph, &cli.user),
        Commands::SelfHeal => run_self_heal(&graph),
        Commands::ClearAll { yes } => run_clear_all(&graph, &vectors, &cli.user, yes),
    }
}

fn run_stats(graph: &GraphStore, vectors: &VectorStore, user_id: &str) -> anyhow::Result<()> {
    let graph_stats = graph.get_stats(user_id)?;
    let vector_stats = vectors.get_stats();

    println!("{}", "Graph".bold());
    println!("  total nodes: {}", graph_stats.total_nodes);
    println!("  total edges: {}", graph_stats.total_edges);
    for (node_type, count) in &graph_stats.nodes_by_type {
        println!("  {node_type}: {count}");
    }

    println!("{}", "Vectors".bold());
    println!("  documents:  {}", vector_stats.documents);
    println!("  concepts:   {}", vector_stats.concepts);
    println!("  experiences:{}", vector_stats.experiences);
    if let Some(dim) = vector_stats.dimension {
        println!("  dimension:  {dim}");
    }

    Ok(())
}

fn run_staging_list(graph: &GraphStore, user_id: &str) -> anyhow::Result<()> {
    let staged = graph.get_staging(user_id)?;
    if staged.nodes.is_empty() {
        println!("staging is empty");
        return Ok(());
    }
    for node in &staged.nodes {
        println!(
            "{} [{}] {} — {}",
            node.id.dimmed(),
            node.node_type,
            node.name.bold(),
            node.content
        );
    }
    println!(
        "\n{} staged node(s), {} staged edge(s)",
        staged.nodes.len(),
        staged.links.len()
    );
    Ok(())
}

fn run_staging_commit(graph: &GraphStore, user_id: &str, node_ids: Vec<String>) -> anyhow::Result<()> {
    let filter = if node_ids.is_empty() { None } else { Some(node_ids.as_slice()) };
    let committed = graph.commit_staging(user_id, filter)?;
    println!("committed {committed} node(s)");
    Ok(())
}

fn run_staging_clear(graph: &GraphStore, user_id: &str) -> anyhow::Result<()> {
    graph.clear_staging(user_id)?;
    println!("staging cleared");
    Ok(())
}

fn run_self_heal(graph: &GraphStore) -> anyhow::Result<()> {
    graph.self_heal()?;
    println!("self-heal pass complete");
    Ok(())
}

fn run_clear_all(graph: &GraphStore, vectors: &VectorStore, user_id: &str, yes: bool) -> anyhow::Result<()> {
    if !yes {
        print!("This permanently deletes all graph and vector data for user '{user_id}'. Type the user id to confirm: ");
        use std::io::Write;
        std::io::stdout().flush()?;
        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        if input.trim() != user_id {
            println!("aborted");
            return Ok(());
        }
    }
    graph.clear_all(user_id)?;
    vectors.clear_all()?;
    println!("cleared all data for user '{user_id}'");
    Ok(())
}
