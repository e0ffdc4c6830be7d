//! CLI command implementations.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::path::Path;
use std::time::{Duration, Instant};
use sylva_core::{SourceDocument, TreeNode};
use sylva_graph::{
    Location, Metadata, NodeId, PropertyChanges, PropertyValue, RerootOutcome, StoreConfig, TaxonField,
    TreeEngine, BREADCRUMB_ATTR, CONFIG_DIR, INCOMPLETE_ATTR, INGROUP_ATTR, NODE_ID_ATTR,
};
use tracing::debug;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

fn open(project: &Path) -> Result<TreeEngine> {
    if !project.join(CONFIG_DIR).exists() {
        return Err(format!(
            "no tree store in {} (run `sylva init` first)",
            project.display()
        )
        .into());
    }
    let config = StoreConfig::load(project)?;
    debug!("Opening tree store at {}", config.data_path(project).display());
    let engine = TreeEngine::open(config.data_path(project), config)?;
    Ok(engine)
}

fn tree_root(engine: &TreeEngine, tree_id: &str, location: &str) -> Result<NodeId> {
    Ok(engine.browser().require_tree(tree_id, &Location::parse(location))?)
}

/// Resolves a node number given on the command line, checking that it
/// belongs to the tree rooted at `root`.
fn node_in_tree(engine: &TreeEngine, root: NodeId, node: u32) -> Result<NodeId> {
    let id = NodeId::new(node as usize);
    if engine.browser().root_of(id)? != root {
        return Err(format!("node {} is not part of this tree", node).into());
    }
    Ok(id)
}

fn print_metadata(metadata: &Metadata) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(metadata)?);
    Ok(())
}

/// Prints one line per tree root: tree id, source and location.
fn print_trees(engine: &TreeEngine, roots: &[NodeId], query: &str) -> Result<()> {
    if roots.is_empty() {
        println!("No trees found for \"{}\"", query);
        return Ok(());
    }

    println!("Found {} trees:\n", roots.len());
    let browser = engine.browser();
    for root in roots {
        let record = engine.state().tree_root(*root)?;
        println!(
            "  {} {} {}",
            record.tree_id.cyan(),
            record.source_id.yellow(),
            format!("({})", record.location).dimmed()
        );
        let tips = browser.descendant_tips(*root)?.len();
        println!("    {} tips", tips.to_string().dimmed());
    }
    Ok(())
}

/// Builds property edits from `KEY=VALUE` pairs and bare keys to remove.
/// Values that parse as JSON keep their type; anything else is text.
pub fn parse_changes(set: &[String], unset: &[String]) -> Result<PropertyChanges> {
    let mut changes = PropertyChanges::new();
    for pair in set {
        let (key, raw) = pair
            .split_once('=')
            .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", pair))?;
        let json = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        let value = PropertyValue::from_json(&json)
            .ok_or_else(|| format!("unsupported value for '{}': {}", key, raw))?;
        changes.insert(key.to_string(), Some(value));
    }
    for key in unset {
        changes.insert(key.clone(), None);
    }
    if changes.is_empty() {
        return Err("nothing to change (use --set or --unset)".into());
    }
    Ok(changes)
}

/// Initialize a tree store in a directory.
pub fn init(project: &Path) -> Result<()> {
    let config_path = StoreConfig::config_path(project);

    if config_path.exists() {
        println!("{} Already initialized", "✓".green());
        return Ok(());
    }

    StoreConfig::default().save(project)?;

    println!("{} Initialized Sylva in {}", "✓".green(), project.display());
    println!("  Run {} to add a source", "sylva import".cyan());

    Ok(())
}

/// Import a source document.
pub fn import(project: &Path, file: &Path, source_id: &str, location: &str, overwrite: bool) -> Result<()> {
    let mut engine = open(project)?;
    let location = Location::parse(location);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner.set_message(format!("Reading {}...", file.display()));

    let started = Instant::now();
    let doc = SourceDocument::from_path(file)?;
    spinner.set_message(format!("Importing {} trees...", doc.present_tree_count()));
    let report = engine.add_source(&doc, source_id, location.clone(), overwrite);

    spinner.finish_and_clear();
    let report = report?;

    println!(
        "{} Imported {} ({}) with {} trees in {}ms",
        "✓".green(),
        source_id.cyan(),
        location,
        report.trees.len().to_string().cyan(),
        started.elapsed().as_millis()
    );
    for (tree_id, root) in &report.trees {
        println!("  {} {}", tree_id, format!("(root {})", root.index()).dimmed());
    }

    if !report.skipped.is_empty() {
        println!(
            "\n{} skipped empty tree slots at positions {:?}",
            "⚠".yellow(),
            report.skipped
        );
    }

    Ok(())
}

/// List sources at a location.
pub fn sources(project: &Path, location: &str, exclude: &[String]) -> Result<()> {
    let engine = open(project)?;
    let ids = engine.browser().source_ids(&Location::parse(location), exclude);

    if ids.is_empty() {
        println!("No sources at {}", location);
        return Ok(());
    }
    for id in ids {
        println!("  {}", id.cyan());
    }
    Ok(())
}

/// List trees grouped by source.
pub fn trees(project: &Path, location: &str) -> Result<()> {
    let engine = open(project)?;
    let pairs = engine.browser().source_tree_pairs(&Location::parse(location))?;

    if pairs.is_empty() {
        println!("No sources at {}", location);
        return Ok(());
    }
    for (source_id, tree_ids) in pairs {
        println!("{} {}", source_id.cyan().bold(), format!("({} trees)", tree_ids.len()).dimmed());
        for tree_id in tree_ids {
            println!("  {}", tree_id);
        }
    }
    Ok(())
}

fn print_outline(node: &TreeNode, depth: usize) {
    let name = node.name.as_deref().unwrap_or("·");
    let flag = |key: &str| node.attributes.get(key).and_then(Value::as_bool).unwrap_or(false);

    let mut line = format!("{}{}", "  ".repeat(depth), name);
    if let Some(id) = node.attributes.get(NODE_ID_ATTR).and_then(Value::as_u64) {
        line.push_str(&format!(" [{}]", id).dimmed().to_string());
    }
    if flag(INGROUP_ATTR) {
        line.push_str(&" ingroup".green().to_string());
    }
    if flag(INCOMPLETE_ATTR) {
        line.push_str(&" …".yellow().to_string());
    }

    if flag(BREADCRUMB_ATTR) {
        println!("{}", line.dimmed());
    } else {
        println!("{}", line);
    }
    for child in &node.children {
        print_outline(child, depth + 1);
    }
}

/// Print a tree or one of its clades. `newick` carries the branch-length
/// switch when Newick output was requested.
pub fn show(
    project: &Path,
    tree_id: &str,
    location: &str,
    node: Option<u32>,
    max_nodes: Option<usize>,
    newick: Option<bool>,
) -> Result<()> {
    let engine = open(project)?;
    let root = tree_root(&engine, tree_id, location)?;
    let start = match node {
        Some(node) => node_in_tree(&engine, root, node)?,
        None => root,
    };

    let tree = engine.browser().subtree(start, max_nodes)?;
    match newick {
        Some(lengths) => println!("{}", tree.to_newick(lengths)),
        None => {
            let record = engine.state().tree_root(root)?;
            println!("{} {}", record.tree_id.cyan().bold(), format!("({})", record.source_id).dimmed());
            print_outline(tree.root(), 0);
        }
    }
    Ok(())
}

/// Reroot a tree.
pub fn reroot(project: &Path, tree_id: &str, location: &str, node: u32) -> Result<()> {
    let mut engine = open(project)?;
    let root = tree_root(&engine, tree_id, location)?;
    let node = node_in_tree(&engine, root, node)?;

    match engine.reroot_tree(node)? {
        RerootOutcome::AlreadyRoot(root) => {
            println!("{} Node {} is already the root", "✓".green(), root.index());
        }
        RerootOutcome::Rerooted { old_root, new_root } => {
            println!(
                "{} Rerooted {} (root {} -> {})",
                "✓".green(),
                tree_id.cyan(),
                old_root.index(),
                new_root.index().to_string().cyan()
            );
        }
        RerootOutcome::Unsupported(_) => {
            println!(
                "{} Cannot reroot at node {}: the root is bifurcating with no collapsible child",
                "⚠".yellow(),
                node.index()
            );
        }
    }
    Ok(())
}

/// Designate or clear the ingroup.
pub fn ingroup(project: &Path, tree_id: &str, location: &str, node: Option<u32>, clear: bool) -> Result<()> {
    let mut engine = open(project)?;
    let root = tree_root(&engine, tree_id, location)?;

    if clear {
        engine.clear_ingroup(root)?;
        println!("{} Cleared the ingroup of {}", "✓".green(), tree_id.cyan());
        return Ok(());
    }

    let node = node.ok_or("--node is required unless --clear is given")?;
    let node = node_in_tree(&engine, root, node)?;
    engine.designate_ingroup(node)?;
    println!(
        "{} Ingroup of {} set at node {}",
        "✓".green(),
        tree_id.cyan(),
        node.index()
    );
    Ok(())
}

/// Delete one tree.
pub fn delete_tree(project: &Path, tree_id: &str, location: &str) -> Result<()> {
    let mut engine = open(project)?;
    let root = tree_root(&engine, tree_id, location)?;
    let removed = engine.delete_tree(root)?;
    println!("{} Deleted {} ({} nodes)", "✓".green(), tree_id.cyan(), removed);
    Ok(())
}

/// Delete a source and its trees.
pub fn delete_source(project: &Path, source_id: &str, location: &str) -> Result<()> {
    let mut engine = open(project)?;
    let source = engine.browser().require_source(source_id, &Location::parse(location))?;
    let trees = engine.delete_source(source)?;
    println!("{} Deleted {} and {} trees", "✓".green(), source_id.cyan(), trees);
    Ok(())
}

/// Search trees by tip name.
pub fn search_taxon(project: &Path, query: &str, field: TaxonField, exact: bool) -> Result<()> {
    let engine = open(project)?;
    let browser = engine.browser();
    let roots = if exact {
        browser.trees_with_taxon(field, query)
    } else {
        browser.search_taxon(field, query)
    };
    print_trees(&engine, &roots, query)
}

/// Search trees by mapped ott id.
pub fn search_ott_id(project: &Path, query: &str) -> Result<()> {
    let ott_id: i64 = query
        .parse()
        .map_err(|_| format!("'{}' is not an ott id", query))?;
    let engine = open(project)?;
    let roots = engine.browser().trees_with_ott_id(ott_id);
    print_trees(&engine, &roots, query)
}

/// Search trees by a searchable tree property.
pub fn search_trees(project: &Path, property: &str, query: &str) -> Result<()> {
    let engine = open(project)?;
    let roots = engine.browser().search_trees(property, query)?;
    print_trees(&engine, &roots, query)
}

/// Search sources by a searchable property.
pub fn search_sources(project: &Path, property: &str, query: &str) -> Result<()> {
    let engine = open(project)?;
    let hits = engine.browser().search_sources(property, query)?;

    if hits.is_empty() {
        println!("No sources found for \"{}\"", query);
        return Ok(());
    }

    println!("Found {} sources:\n", hits.len());
    for source in hits {
        let meta = engine.state().source_meta(source)?;
        let value = meta
            .properties
            .iter()
            .find(|(key, _)| key.as_str() != property)
            .map(|(key, value)| format!("{}: {}", key, value))
            .unwrap_or_default();
        println!(
            "  {} {} {}",
            meta.source_id.cyan(),
            format!("({})", meta.location).dimmed(),
            value.dimmed()
        );
    }
    Ok(())
}

pub fn source_metadata(project: &Path, source_id: &str, location: &str) -> Result<()> {
    let engine = open(project)?;
    let browser = engine.browser();
    let source = browser.require_source(source_id, &Location::parse(location))?;
    print_metadata(&browser.source_metadata(source)?)
}

pub fn tree_metadata(project: &Path, tree_id: &str, location: &str) -> Result<()> {
    let engine = open(project)?;
    let root = tree_root(&engine, tree_id, location)?;
    print_metadata(&engine.browser().tree_metadata(root)?)
}

pub fn otu_metadata(project: &Path, tree_id: &str, location: &str, node: u32) -> Result<()> {
    let engine = open(project)?;
    let root = tree_root(&engine, tree_id, location)?;
    let node = node_in_tree(&engine, root, node)?;
    print_metadata(&engine.browser().otu_metadata(node)?)
}

/// Edit source properties.
pub fn edit_source(project: &Path, source_id: &str, location: &str, set: &[String], unset: &[String]) -> Result<()> {
    let changes = parse_changes(set, unset)?;
    let mut engine = open(project)?;
    let source = engine.browser().require_source(source_id, &Location::parse(location))?;
    engine.update_source_properties(source, &changes)?;
    println!("{} Updated {} properties on {}", "✓".green(), changes.len(), source_id.cyan());
    Ok(())
}

/// Edit tree properties.
pub fn edit_tree(project: &Path, tree_id: &str, location: &str, set: &[String], unset: &[String]) -> Result<()> {
    let changes = parse_changes(set, unset)?;
    let mut engine = open(project)?;
    let root = tree_root(&engine, tree_id, location)?;
    engine.update_tree_properties(root, &changes)?;
    println!("{} Updated {} properties on {}", "✓".green(), changes.len(), tree_id.cyan());
    Ok(())
}

/// Register a remote location in the project config.
pub fn remote_add(project: &Path, name: &str) -> Result<()> {
    if Location::parse(name).is_local() {
        return Err(format!("'{}' is reserved for the local location", name).into());
    }
    let mut config = StoreConfig::load(project)?;
    if config.known_remotes.contains(name) {
        println!("{} {} is already known", "✓".green(), name.cyan());
        return Ok(());
    }
    config.known_remotes = config.known_remotes.with_remote(name);
    config.save(project)?;
    println!("{} Added remote {}", "✓".green(), name.cyan());
    Ok(())
}

/// List known remote locations.
pub fn remote_list(project: &Path) -> Result<()> {
    let config = StoreConfig::load(project)?;
    println!("  {} {}", Location::Local.to_string().cyan(), "(always available)".dimmed());
    for name in config.known_remotes.names() {
        println!("  {}", name);
    }
    Ok(())
}

/// Check every invariant and print store statistics.
pub fn verify(project: &Path) -> Result<()> {
    let engine = open(project)?;
    engine.verify()?;
    let stats = engine.stats();

    println!("{}", "Sylva Status".cyan().bold());
    println!();
    println!("  {} {}", "Sources:".dimmed(), stats.sources);
    println!("  {} {}", "Trees:".dimmed(), stats.trees);
    println!("  {} {}", "Nodes:".dimmed(), stats.node_count);
    println!("  {} {}", "Edges:".dimmed(), stats.edge_count);
    println!("{} All invariants hold", "✓".green());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_changes_keeps_json_types() {
        let changes = parse_changes(&strings(&["ot:studyYear=2010", "ot:curatorName=Jane Doe"]), &[]).unwrap();
        assert_eq!(changes["ot:studyYear"], Some(PropertyValue::Int(2010)));
        assert_eq!(changes["ot:curatorName"], Some(PropertyValue::from("Jane Doe")));
    }

    #[test]
    fn test_parse_changes_unset_and_errors() {
        let changes = parse_changes(&[], &strings(&["ot:tag"])).unwrap();
        assert_eq!(changes["ot:tag"], None);

        assert!(parse_changes(&strings(&["no-equals-sign"]), &[]).is_err());
        assert!(parse_changes(&[], &[]).is_err());
    }
}
