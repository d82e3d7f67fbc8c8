use super::*;

fn leaf(id: usize, name: &str, parent: Option<usize>) -> TaxonomyNode {
    TaxonomyNode {
        id: NodeId(id),
        parent: parent.map(NodeId),
        children: None,
        name: Some(name.to_string()),
        leaves: vec![NodeId(id)],
        n_cells: 1,
        height: 0.0,
        profile: vec![0.0, 1.0],
    }
}

fn internal(id: usize, children: [usize; 2], parent: Option<usize>) -> TaxonomyNode {
    TaxonomyNode {
        id: NodeId(id),
        parent: parent.map(NodeId),
        children: Some([NodeId(children[0]), NodeId(children[1])]),
        name: None,
        leaves: Vec::new(),
        n_cells: 2,
        height: 0.5,
        profile: vec![0.0, 1.0],
    }
}

fn three_leaf_nodes() -> Vec<TaxonomyNode> {
    vec![
        leaf(0, "A", Some(3)),
        leaf(1, "B", Some(3)),
        leaf(2, "C", Some(4)),
        internal(3, [0, 1], Some(4)),
        internal(4, [3, 2], None),
    ]
}

#[test]
fn test_valid_tree() {
    let t = Taxonomy::from_nodes(three_leaf_nodes(), NodeId(4)).unwrap();
    assert_eq!(t.n_leaves(), 3);
    assert_eq!(t.internal_nodes().count(), 2);
    assert_eq!(t.depth(NodeId(4)), 0);
    assert_eq!(t.depth(NodeId(0)), 2);
    assert_eq!(t.find_leaf("C"), Some(NodeId(2)));
    assert_eq!(NodeId(3).to_string(), "Node3");
}

#[test]
fn test_two_roots_rejected() {
    let mut nodes = three_leaf_nodes();
    nodes[2].parent = None;
    nodes[4].children = Some([NodeId(3), NodeId(3)]);
    assert!(Taxonomy::from_nodes(nodes, NodeId(4)).is_err());
}

#[test]
fn test_dangling_parent_rejected() {
    let mut nodes = three_leaf_nodes();
    nodes[0].parent = Some(NodeId(4));
    let err = Taxonomy::from_nodes(nodes, NodeId(4)).unwrap_err();
    assert!(matches!(err, ReferenceError::InvalidTaxonomy(_)));
}

#[test]
fn test_unnamed_leaf_rejected() {
    let mut nodes = three_leaf_nodes();
    nodes[1].name = None;
    assert!(Taxonomy::from_nodes(nodes, NodeId(4)).is_err());
}

#[test]
fn test_single_leaf_tree() {
    let t = Taxonomy::from_nodes(vec![leaf(0, "only", None)], NodeId(0)).unwrap();
    assert_eq!(t.n_leaves(), 1);
    assert!(t.node(t.root()).is_leaf());
}
