//! End-to-end checks of the engine's guarantees.

use sylva_core::{attrs, SourceDocument, Tree, TreeNode};
use sylva_graph::{
    EdgeKind, GraphError, IndexName, Location, NodeId, RerootOutcome, StoreConfig, TaxonField,
    TreeEngine,
};

fn engine() -> TreeEngine {
    TreeEngine::in_memory(StoreConfig::default()).unwrap()
}

fn tree(id: &str, root: TreeNode) -> Tree {
    Tree::new(root.with_attribute(attrs::TREE_ID, id))
}

// ((A,B)X,(C,D)Y,E)R
fn five_taxa() -> TreeNode {
    TreeNode::named("R")
        .with_child(
            TreeNode::named("X")
                .with_child(TreeNode::named("A"))
                .with_child(TreeNode::named("B")),
        )
        .with_child(
            TreeNode::named("Y")
                .with_child(TreeNode::named("C"))
                .with_child(TreeNode::named("D")),
        )
        .with_child(TreeNode::named("E"))
}

fn find(engine: &TreeEngine, root: NodeId, name: &str) -> NodeId {
    let state = engine.state();
    state
        .tree_nodes(root)
        .into_iter()
        .find(|n| state.tree_data(*n).unwrap().name.as_deref() == Some(name))
        .unwrap()
}

fn leaf_set(engine: &TreeEngine, root: NodeId) -> Vec<String> {
    let browser = engine.browser();
    let mut names: Vec<String> = browser
        .descendant_tips(root)
        .unwrap()
        .into_iter()
        .filter_map(|n| engine.state().tree_data(n).unwrap().name.clone())
        .collect();
    names.sort();
    names
}

#[test]
fn round_trip_preserves_names_and_order() {
    let mut engine = engine();
    let original = tree("t1", five_taxa());
    let doc = SourceDocument::new().with_tree(original.clone());
    let root = engine.add_source(&doc, "s", Location::Local, false).unwrap().trees[0].1;

    let fetched = engine.browser().subtree(root, None).unwrap();
    let names = |t: &Tree| -> Vec<Option<String>> { t.preorder().map(|n| n.name.clone()).collect() };
    assert_eq!(names(&fetched), names(&original));
    assert_eq!(fetched.to_newick(false), original.to_newick(false));
}

#[test]
fn tree_ids_are_unique() {
    let mut engine = engine();
    let doc = SourceDocument::new().with_tree(tree("t1", five_taxa()));
    let report = engine.add_source(&doc, "s", Location::Local, false).unwrap();
    let root = report.trees[0].1;
    assert_eq!(engine.browser().require_tree("s_t1", &Location::Local).unwrap(), root);

    let again = engine.add_tree(&tree("t1", five_taxa()), "s_t1", report.source);
    assert!(matches!(again, Err(GraphError::UnsupportedOperation(_))));

    let duplicate_source = engine.add_source(&doc, "s", Location::Local, false);
    assert!(matches!(duplicate_source, Err(GraphError::UnsupportedOperation(_))));
    engine.verify().unwrap();
}

#[test]
fn reroot_at_root_is_identity() {
    let mut engine = engine();
    let doc = SourceDocument::new().with_tree(tree("t1", five_taxa()));
    let root = engine.add_source(&doc, "s", Location::Local, false).unwrap().trees[0].1;
    let edges = engine.state().edge_count();

    let outcome = engine.reroot_tree(root).unwrap();
    assert_eq!(outcome, RerootOutcome::AlreadyRoot(root));
    assert_eq!(outcome.root(), root);
    assert_eq!(engine.state().edge_count(), edges);
}

#[test]
fn reroot_and_back_preserves_leaf_set() {
    let mut engine = engine();
    let doc = SourceDocument::new().with_tree(tree("t1", five_taxa()));
    let root = engine.add_source(&doc, "s", Location::Local, false).unwrap().trees[0].1;
    let leaves = leaf_set(&engine, root);
    let e = find(&engine, root, "E");
    let c = find(&engine, root, "C");

    let first = engine.reroot_tree(c).unwrap();
    assert!(first.changed());
    let moved = first.root();
    assert_eq!(leaf_set(&engine, moved), leaves);
    engine.verify().unwrap();

    // E hung from the original root
    let back = engine.reroot_tree(e).unwrap();
    let restored = back.root();
    assert_eq!(leaf_set(&engine, restored), leaves);
    assert_eq!(leaf_set(&engine, restored).len(), 5);
    assert_eq!(
        engine.browser().require_tree("s_t1", &Location::Local).unwrap(),
        restored
    );
    engine.verify().unwrap();
}

#[test]
fn reroot_below_single_child_root_keeps_tips() {
    let mut engine = engine();
    // ((A,B,C)X)R
    let single = TreeNode::named("R").with_child(
        TreeNode::named("X")
            .with_child(TreeNode::named("A"))
            .with_child(TreeNode::named("B"))
            .with_child(TreeNode::named("C")),
    );
    let doc = SourceDocument::new().with_tree(tree("t1", single));
    let root = engine.add_source(&doc, "s", Location::Local, false).unwrap().trees[0].1;
    assert_eq!(leaf_set(&engine, root), vec!["A", "B", "C"]);

    let a = find(&engine, root, "A");
    let new_root = engine.reroot_tree(a).unwrap().root();
    assert_eq!(leaf_set(&engine, new_root), vec!["A", "B", "C"]);
    assert!(!engine.state().contains(root));
    engine.verify().unwrap();
}

#[test]
fn reroot_keeps_source_tree_order() {
    let mut engine = engine();
    let doc = SourceDocument::new()
        .with_tree(tree("t1", five_taxa()))
        .with_tree(tree("t2", five_taxa()));
    let report = engine.add_source(&doc, "s", Location::Local, false).unwrap();
    let before = engine.browser().tree_ids(report.source).unwrap();
    assert_eq!(before, vec!["s_t1", "s_t2"]);

    let c = find(&engine, report.trees[0].1, "C");
    assert!(engine.reroot_tree(c).unwrap().changed());
    assert_eq!(engine.browser().tree_ids(report.source).unwrap(), before);
    engine.verify().unwrap();
}

#[test]
fn unsupported_tritomy_is_a_noop() {
    let mut engine = engine();
    // (L,(A,B)X)R: the only other child of the root is a leaf
    let doc = SourceDocument::new().with_tree(tree(
        "t1",
        TreeNode::named("R")
            .with_child(TreeNode::named("L"))
            .with_child(
                TreeNode::named("X")
                    .with_child(TreeNode::named("A"))
                    .with_child(TreeNode::named("B")),
            ),
    ));
    let root = engine.add_source(&doc, "s", Location::Local, false).unwrap().trees[0].1;
    let before = engine.browser().subtree(root, None).unwrap();
    let x = find(&engine, root, "X");

    let outcome = engine.reroot_tree(x).unwrap();
    assert_eq!(outcome.root(), root);
    assert!(!outcome.changed());
    assert_eq!(engine.browser().subtree(root, None).unwrap(), before);
}

#[test]
fn ingroup_designation_is_idempotent() {
    let mut engine = engine();
    let doc = SourceDocument::new().with_tree(tree("t1", five_taxa()));
    let root = engine.add_source(&doc, "s", Location::Local, false).unwrap().trees[0].1;
    let x = find(&engine, root, "X");
    let y = find(&engine, root, "Y");

    let marked = |engine: &TreeEngine| -> Vec<String> {
        let state = engine.state();
        let mut names: Vec<String> = state
            .tree_nodes(root)
            .into_iter()
            .filter(|n| state.tree_data(*n).unwrap().within_ingroup)
            .filter_map(|n| state.tree_data(n).unwrap().name.clone())
            .collect();
        names.sort();
        names
    };

    engine.designate_ingroup(x).unwrap();
    let once = marked(&engine);
    engine.designate_ingroup(x).unwrap();
    assert_eq!(marked(&engine), once);
    assert_eq!(once, vec!["A", "B", "X"]);

    engine.designate_ingroup(y).unwrap();
    assert_eq!(marked(&engine), vec!["C", "D", "Y"]);
    engine.verify().unwrap();
}

#[test]
fn deletion_leaves_no_trace() {
    let mut engine = engine();
    let doc = SourceDocument::new()
        .with_tree(tree("t1", five_taxa()))
        .with_tree(tree("t2", TreeNode::named("R2").with_child(TreeNode::named("A"))));
    let report = engine.add_source(&doc, "s", Location::Local, false).unwrap();
    let root = report.trees[0].1;
    let doomed = engine.state().tree_nodes(root);

    engine.delete_tree(root).unwrap();
    let state = engine.state();
    for node in &doomed {
        assert!(!state.contains(*node));
        assert!(!state.indexes().references(*node));
    }
    for edge in state.edges() {
        assert!(state.contains(edge.source) && state.contains(edge.target));
    }
    assert!(engine.browser().trees_with_taxon(TaxonField::Mapped, "E").is_empty());
    // "A" is still a tip of t2
    assert_eq!(
        engine.browser().trees_with_taxon(TaxonField::Mapped, "A"),
        vec![report.trees[1].1]
    );
    engine.verify().unwrap();

    engine.delete_source(report.source).unwrap();
    assert_eq!(engine.stats().node_count, 0);
    assert_eq!(engine.stats().edge_count, 0);
    for index in IndexName::ALL {
        assert!(engine.state().indexes().index(index).unwrap().is_empty());
    }
}

#[test]
fn taxon_index_fans_out() {
    let mut engine = engine();
    let doc = SourceDocument::new()
        .with_tree(tree(
            "apes",
            TreeNode::named("R")
                .with_child(TreeNode::named("Homo_sapiens"))
                .with_child(TreeNode::named("Pan_troglodytes")),
        ))
        .with_tree(tree(
            "cats",
            TreeNode::named("R")
                .with_child(TreeNode::named("Felis_catus"))
                .with_child(TreeNode::named("Panthera_leo")),
        ));
    let report = engine.add_source(&doc, "s", Location::Local, false).unwrap();
    let apes = report.trees[0].1;

    let browser = engine.browser();
    assert_eq!(browser.trees_with_taxon(TaxonField::Mapped, "Homo_sapiens"), vec![apes]);
    assert_eq!(browser.trees_with_taxon(TaxonField::Mapped, "Pan_troglodytes"), vec![apes]);
    assert_eq!(browser.search_taxon(TaxonField::Mapped, "troglodytes"), vec![apes]);
}

#[test]
fn local_and_remote_copies_link_once() {
    let mut engine = engine();
    let doc = SourceDocument::new().with_tree(tree("t1", five_taxa()));
    let local = engine.add_source(&doc, "s", Location::Local, false).unwrap().source;
    let remote = engine
        .add_source(&doc, "s", Location::remote("remote"), false)
        .unwrap()
        .source;

    let links = engine
        .state()
        .edges_of(local, Some(EdgeKind::IsLocalCopyOf), petgraph::Direction::Outgoing);
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].target, remote);
    assert_eq!(engine.browser().known_source_copies("s").unwrap().len(), 2);

    // re-importing the remote copy relinks the untouched local source
    engine
        .add_source(&doc, "s", Location::remote("remote"), true)
        .unwrap();
    let links = engine
        .state()
        .edges_of(local, Some(EdgeKind::IsLocalCopyOf), petgraph::Direction::Outgoing);
    assert_eq!(links.len(), 1);
    engine.verify().unwrap();
}
