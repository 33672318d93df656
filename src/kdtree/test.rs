use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::kdtree::{
    KdTree, KdTreeBuilder, Node, NodeId, Range, RangeQuery, Subtree, ValidationError,
};
use crate::KdTreeError;

fn points() -> Vec<[f64; 2]> {
    vec![
        [3., 6.],
        [17., 15.],
        [13., 15.],
        [6., 12.],
        [9., 1.],
        [2., 7.],
        [10., 19.],
    ]
}

/// Payloads are the index of each point in [`points`].
fn make_index() -> KdTree<usize> {
    KdTree::build(
        points()
            .into_iter()
            .enumerate()
            .map(|(i, p)| Node::new(p, i)),
    )
    .unwrap()
}

fn id_of(tree: &KdTree<usize>, coords: [f64; 2]) -> NodeId {
    tree.find(&coords).unwrap().unwrap()
}

fn payloads(tree: &KdTree<usize>, ids: &[NodeId]) -> Vec<usize> {
    let mut payloads: Vec<usize> = ids
        .iter()
        .map(|id| *tree.get(*id).unwrap().payload())
        .collect();
    payloads.sort();
    payloads
}

fn subtree_payloads(tree: &KdTree<usize>, top: NodeId) -> Vec<usize> {
    let inner = tree.read();
    let mut payloads: Vec<usize> = inner
        .post_order(top.key)
        .into_iter()
        .map(|key| *inner.store[key].payload())
        .collect();
    payloads.sort();
    payloads
}

#[test]
fn builds_by_lower_median() {
    let tree = make_index();
    tree.validate().unwrap();
    assert_eq!(tree.size(), 7);
    assert_eq!(tree.dimensions(), Some(2));

    let root = tree.root().unwrap();
    {
        let node = tree.get(root).unwrap();
        assert_eq!(node.coords(), &[6., 12.]);
        assert_eq!(node.axis(), 0);
    }

    let (left, right) = tree.children(root).unwrap();
    assert_eq!(subtree_payloads(&tree, left.unwrap()), vec![0, 5]);
    assert_eq!(subtree_payloads(&tree, right.unwrap()), vec![1, 2, 4, 6]);
    assert_eq!(tree.get(left.unwrap()).unwrap().axis(), 1);
    assert_eq!(tree.get(right.unwrap()).unwrap().axis(), 1);
    assert_eq!(tree.depth(), 4);
}

#[test]
fn traverses_in_post_order() {
    let tree = make_index();
    let mut visited = vec![];
    tree.traverse(|_, node| visited.push(*node.payload()));
    // (2,7) (3,6) (9,1) (13,15) (10,19) (17,15) (6,12)
    assert_eq!(visited, vec![5, 0, 4, 2, 6, 1, 3]);

    let nodes = tree.node_list();
    assert_eq!(nodes.len(), tree.size());
    assert_eq!(payloads(&tree, &nodes), (0..7).collect::<Vec<_>>());
}

#[test]
fn finds_exact_points() {
    let tree = make_index();

    let id = tree.find(&[6., 12.]).unwrap().unwrap();
    assert_eq!(*tree.get(id).unwrap().payload(), 3);
    assert_eq!(tree.find(&[6., 13.]).unwrap(), None);
    assert_eq!(
        tree.find(&[6., 12., 0.]),
        Err(KdTreeError::DimensionMismatch {
            expected: 2,
            found: 3
        })
    );

    for (i, p) in points().iter().enumerate() {
        let id = tree.find(p).unwrap().unwrap();
        assert_eq!(*tree.get(id).unwrap().payload(), i);
    }
}

#[test]
fn negative_zero_equals_zero() {
    let tree = KdTree::<()>::new();
    let id = tree.insert(Node::new([-0., 1.], ())).unwrap();
    assert_eq!(tree.find(&[0., 1.]).unwrap(), Some(id));
}

#[test]
fn neighbouring_floats_are_distinct() {
    let tree = KdTree::<()>::new();
    let id = tree.insert(Node::new([1., 2.], ())).unwrap();
    let next_up = f64::from_bits(1.0f64.to_bits() + 1);
    assert_eq!(tree.find(&[next_up, 2.]).unwrap(), None);
    assert_eq!(tree.find(&[1., 2.]).unwrap(), Some(id));

    let other = tree.insert(Node::new([next_up, 2.], ())).unwrap();
    assert_ne!(other, id);
    assert_eq!(tree.find(&[next_up, 2.]).unwrap(), Some(other));
    assert_eq!(tree.find(&[1., 2.]).unwrap(), Some(id));
}

#[test]
fn rejects_nan_coordinates() {
    let tree = make_index();
    assert_eq!(
        tree.insert(Node::new([f64::NAN, 1.], 7)),
        Err(KdTreeError::NanCoordinate { axis: 0 })
    );
    assert_eq!(tree.size(), 7);

    let empty = KdTree::<()>::new();
    assert_eq!(
        empty.insert(Node::new([0., f64::NAN], ())),
        Err(KdTreeError::NanCoordinate { axis: 1 })
    );
    assert!(empty.is_empty());
    assert_eq!(empty.dimensions(), None);

    assert!(matches!(
        KdTree::<i32>::build([Node::new([1., 1.], 0), Node::new([f64::NAN, 2.], 1)]),
        Err(KdTreeError::NanCoordinate { axis: 0 })
    ));
    tree.validate().unwrap();
}

#[test]
fn range_search() {
    let tree = make_index();

    let query = RangeQuery::new()
        .with(0, Range::new(2., 9.))
        .with(1, Range::new(5., 13.));
    let result = tree.find_range(&query).unwrap();
    // (3,6) (6,12) (2,7); (9,1) is below the y range
    assert_eq!(payloads(&tree, &result), vec![0, 3, 5]);

    let all = tree.find_range(&RangeQuery::new()).unwrap();
    assert_eq!(all.len(), 7);

    let query = RangeQuery::new().with(1, Range::at_least(15.));
    let result = tree.find_range(&query).unwrap();
    assert_eq!(payloads(&tree, &result), vec![1, 2, 6]);

    let query = RangeQuery::new()
        .with(0, Range::at_most(6.))
        .with(1, Range::unbounded());
    let result = tree.find_range(&query).unwrap();
    assert_eq!(payloads(&tree, &result), vec![0, 3, 5]);

    let disjoint = RangeQuery::new().with(0, Range::new(100., 200.));
    assert!(tree.find_range(&disjoint).unwrap().is_empty());
}

#[test]
fn range_search_matches_brute_force() {
    let tree = make_index();
    let points = points();

    for min_x in [0., 3., 6., 9.5] {
        for max_y in [1., 7., 15., 30.] {
            let query = RangeQuery::new()
                .with(0, Range::new(min_x, 17.))
                .with(1, Range::new(1., max_y));
            let result = tree.find_range(&query).unwrap();

            let expected: Vec<usize> = (0..points.len())
                .filter(|i| query.matches(&points[*i]))
                .collect();
            assert_eq!(payloads(&tree, &result), expected, "{query:?}");
        }
    }
}

#[test]
fn range_on_missing_axis() {
    let tree = make_index();
    let query = RangeQuery::new().with(2, Range::new(0., 1.));
    assert_eq!(
        tree.find_range(&query),
        Err(KdTreeError::AxisOutOfRange {
            axis: 2,
            dimensions: 2
        })
    );
}

#[test]
fn empty_tree() {
    let tree = KdTree::<(), f32>::default();
    assert!(tree.is_empty());
    assert_eq!(tree.size(), 0);
    assert_eq!(tree.depth(), 0);
    assert_eq!(tree.root(), None);
    assert_eq!(tree.dimensions(), None);
    assert!(tree.node_list().is_empty());
    assert!(tree.validate().is_ok());

    assert_eq!(tree.find(&[1., 2., 3.]).unwrap(), None);
    let query = RangeQuery::new().with(7, Range::new(0., 1.));
    assert!(tree.find_range(&query).unwrap().is_empty());

    tree.balance();
    assert!(tree.is_empty());
}

#[test]
fn insert_fixes_dimensions() {
    let tree = KdTree::<()>::new();
    let first = tree.insert(Node::new([0., 0.], ())).unwrap();
    assert_eq!(tree.size(), 1);
    assert_eq!(tree.root(), Some(first));
    assert_eq!(tree.dimensions(), Some(2));

    assert_eq!(
        tree.insert(Node::new([0., 0., 0.], ())),
        Err(KdTreeError::DimensionMismatch {
            expected: 2,
            found: 3
        })
    );
    assert_eq!(
        tree.insert(Node::new(Vec::<f64>::new(), ())),
        Err(KdTreeError::ZeroDimensions)
    );
    assert_eq!(tree.size(), 1);
}

#[test]
fn insert_attaches_a_leaf() {
    let tree = make_index();
    let id = tree.insert(Node::new([8., 8.], 7)).unwrap();

    // right of (6,12), left of (17,15) on y, left of (9,1) on x
    assert_eq!(tree.parent(id).unwrap(), Some(id_of(&tree, [9., 1.])));
    assert_eq!(
        tree.children(id_of(&tree, [9., 1.])).unwrap(),
        (Some(id), None)
    );
    assert_eq!(tree.get(id).unwrap().axis(), 1);
    assert!(tree.get(id).unwrap().is_leaf());
    assert_eq!(tree.size(), 8);
    tree.validate().unwrap();
}

#[test]
fn duplicates_are_kept() {
    let tree = KdTree::<u8>::new();
    let a = tree.insert(Node::new([1., 1.], 0)).unwrap();
    let b = tree.insert(Node::new([1., 1.], 1)).unwrap();
    assert_ne!(a, b);
    assert_eq!(tree.size(), 2);
    tree.validate().unwrap();

    let found = tree.find(&[1., 1.]).unwrap().unwrap();
    assert!(found == a || found == b);

    let query = RangeQuery::new().with(0, Range::new(1., 1.));
    assert_eq!(tree.find_range(&query).unwrap().len(), 2);

    tree.remove(a).unwrap();
    assert_eq!(tree.find(&[1., 1.]).unwrap(), Some(b));
}

#[test]
fn remove_leaf() {
    let tree = make_index();
    let leaf = id_of(&tree, [2., 7.]);

    let removed = tree.remove(leaf).unwrap();
    assert_eq!(removed, Node::new([2., 7.], 5));
    assert_eq!(tree.size(), 6);
    assert_eq!(tree.find(&[2., 7.]).unwrap(), None);
    assert!(tree.get(id_of(&tree, [3., 6.])).unwrap().is_leaf());
    tree.validate().unwrap();
}

#[test]
fn remove_interior_node() {
    let tree = make_index();
    let root = tree.root().unwrap();

    tree.remove(id_of(&tree, [3., 6.])).unwrap();
    tree.validate().unwrap();
    assert_eq!(tree.size(), 6);

    // its only child is re-inserted from the root
    let orphan = id_of(&tree, [2., 7.]);
    assert_eq!(tree.children(root).unwrap().0, Some(orphan));
    assert_eq!(tree.get(orphan).unwrap().axis(), 1);
}

#[test]
fn remove_root_with_two_children() {
    let tree = make_index();
    let root = tree.root().unwrap();

    tree.remove(root).unwrap();
    tree.validate().unwrap();
    assert_eq!(tree.size(), 6);

    // right child promoted, keeping its axis
    let promoted = id_of(&tree, [17., 15.]);
    assert_eq!(tree.root(), Some(promoted));
    assert_eq!(tree.parent(promoted).unwrap(), None);
    assert_eq!(tree.get(promoted).unwrap().axis(), 1);

    // left subtree re-inserted children first: (2,7) then (3,6)
    let low = id_of(&tree, [9., 1.]);
    let first = id_of(&tree, [2., 7.]);
    let second = id_of(&tree, [3., 6.]);
    assert_eq!(tree.parent(first).unwrap(), Some(low));
    assert_eq!(tree.parent(second).unwrap(), Some(first));
    assert_eq!(tree.get(second).unwrap().axis(), 0);

    for (i, p) in points().iter().enumerate().filter(|(i, _)| *i != 3) {
        let id = tree.find(p).unwrap().unwrap();
        assert_eq!(*tree.get(id).unwrap().payload(), i);
    }
}

#[test]
fn remove_root_with_one_child_then_none() {
    let tree = KdTree::<&str>::new();
    let a = tree.insert(Node::new([0., 0.], "a")).unwrap();
    let b = tree.insert(Node::new([1., 1.], "b")).unwrap();

    tree.remove(a).unwrap();
    assert_eq!(tree.root(), Some(b));
    assert_eq!(tree.parent(b).unwrap(), None);
    assert_eq!(tree.get(b).unwrap().axis(), 1);
    tree.validate().unwrap();

    let last = tree.remove(b).unwrap();
    assert_eq!(last.payload, "b");
    assert!(tree.is_empty());
    assert_eq!(tree.dimensions(), None);
    tree.validate().unwrap();

    // the dimension is pending again
    let c = tree.insert(Node::new([1., 2., 3.], "c")).unwrap();
    assert_eq!(tree.dimensions(), Some(3));
    assert_eq!(tree.root(), Some(c));
}

#[test]
fn stale_and_foreign_handles() {
    let tree = make_index();
    let id = id_of(&tree, [9., 1.]);
    tree.remove(id).unwrap();

    assert!(!tree.contains(id));
    assert!(tree.get(id).is_none());
    assert!(tree.payload_mut(id).is_none());
    assert_eq!(tree.remove(id), Err(KdTreeError::NotAMember));
    assert_eq!(tree.parent(id), Err(KdTreeError::NotAMember));
    assert_eq!(tree.root_of(id), Err(KdTreeError::NotAMember));

    // the storage slot gets reused, the handle stays dead
    let again = tree.insert(Node::new([9., 1.], 4)).unwrap();
    assert_ne!(again, id);
    assert!(!tree.contains(id));
    assert!(tree.contains(again));

    let other = make_index();
    let foreign = other.root().unwrap();
    assert_ne!(foreign.tree(), tree.id());
    assert_eq!(tree.remove(foreign), Err(KdTreeError::NotAMember));
    assert_eq!(tree.size(), 7);
    assert_eq!(other.size(), 7);
}

#[test]
fn root_of_every_node() {
    let tree = make_index();
    let root = tree.root().unwrap();
    for id in tree.node_list() {
        assert_eq!(tree.root_of(id).unwrap(), root);
    }
    assert_eq!(tree.subtree_size(root).unwrap(), 7);
}

#[test]
fn displays_nodes() {
    let tree = make_index();
    let root = tree.root().unwrap();
    assert_eq!(tree.get(root).unwrap().to_string(), "[ ( 6 12 ): axis = 0 ]");
    let leaf = id_of(&tree, [13., 15.]);
    assert_eq!(tree.get(leaf).unwrap().to_string(), "[ ( 13 15 ): axis = 1 ]");
}

#[test]
fn payloads_are_mutable() {
    let tree = make_index();
    let id = id_of(&tree, [10., 19.]);
    *tree.payload_mut(id).unwrap() += 100;
    assert_eq!(*tree.get(id).unwrap().payload(), 106);
}

#[test]
fn validate_reports_axis_progression() {
    let tree = make_index();
    let root = tree.root().unwrap();
    tree.write().store[root.key].set_axis(1);

    let err = tree.validate().unwrap_err();
    assert!(
        matches!(
            err,
            KdTreeError::Invalid(ValidationError::AxisProgression { .. })
        ),
        "{err}"
    );
    assert_eq!(
        err.to_string(),
        "child [ ( 17 15 ): axis = 1 ] axis isn't parent axis + 1 (0)"
    );
}

#[test]
fn validate_reports_split_violation() {
    let tree = make_index();
    let root = tree.root().unwrap();
    {
        let mut inner = tree.write();
        let node = &mut inner.store[root.key];
        std::mem::swap(&mut node.left, &mut node.right);
    }

    assert_eq!(
        tree.validate(),
        Err(KdTreeError::Invalid(ValidationError::RightOfAncestor {
            node: "[ ( 17 15 ): axis = 1 ]".to_string(),
            ancestor: "[ ( 6 12 ): axis = 0 ]".to_string(),
            axis: 0,
        }))
    );
}

#[test]
fn validate_reports_broken_links() {
    let tree = make_index();
    let child = id_of(&tree, [2., 7.]);
    tree.write().store[child.key].parent = None;
    assert_eq!(
        tree.validate(),
        Err(KdTreeError::Invalid(ValidationError::MissingParent {
            child: "[ ( 2 7 ): axis = 0 ]".to_string(),
            parent: "[ ( 3 6 ): axis = 1 ]".to_string(),
        }))
    );

    let tree = make_index();
    let root = tree.root().unwrap();
    tree.write().store[root.key].left = None;
    assert_eq!(
        tree.validate(),
        Err(KdTreeError::Invalid(ValidationError::Unreachable {
            stored: 7,
            reachable: 5,
        }))
    );
}

#[test]
fn graft_adopts_every_node() {
    let tree = make_index();

    let mut builder = KdTreeBuilder::<usize>::new();
    for (i, p) in [[1., 1.], [20., 20.], [7., 7.]].into_iter().enumerate() {
        builder.add(p, 100 + i).unwrap();
    }
    let subtree = builder.finish_subtree();
    let old = subtree.node_list();

    let adopted = tree.graft(subtree).unwrap();
    assert_eq!(adopted.len(), 3);
    assert_eq!(adopted.iter().map(|(o, _)| *o).collect::<Vec<_>>(), old);
    assert_eq!(tree.size(), 10);
    tree.validate().unwrap();

    for (old, new) in adopted {
        assert!(!tree.contains(old));
        assert_eq!(new.tree(), tree.id());
        let coords = tree.get(new).unwrap().coords().to_vec();
        assert_eq!(tree.find(&coords).unwrap(), Some(new));
    }
}

#[test]
fn graft_into_empty_tree() {
    let tree = KdTree::<usize>::new();
    let adopted = tree.graft(make_index().into_subtree()).unwrap();
    assert_eq!(adopted.len(), 7);
    assert_eq!(tree.dimensions(), Some(2));
    tree.validate().unwrap();

    // (2,7) is salvaged first and becomes the root
    assert_eq!(tree.root(), Some(adopted[0].1));
    assert_eq!(tree.get(adopted[0].1).unwrap().coords(), &[2., 7.]);

    assert!(tree.graft(Default::default()).unwrap().is_empty());
    assert_eq!(tree.size(), 7);
}

#[test]
fn graft_rejects_other_dimensions() {
    let tree = make_index();
    let mut builder = KdTreeBuilder::<usize>::new();
    builder.add([1., 2., 3.], 0).unwrap();

    assert_eq!(
        tree.graft(builder.finish_subtree()),
        Err(KdTreeError::DimensionMismatch {
            expected: 2,
            found: 3
        })
    );
    assert_eq!(tree.size(), 7);
}

#[test]
fn balance_keeps_handles() {
    let tree = KdTree::<usize>::new();
    let ids: Vec<NodeId> = (0..15)
        .map(|i| tree.insert(Node::new([i as f64, i as f64], i)).unwrap())
        .collect();
    assert_eq!(tree.depth(), 15);

    tree.balance();
    tree.validate().unwrap();
    assert_eq!(tree.depth(), 5);
    assert_eq!(tree.size(), 15);

    for (i, id) in ids.into_iter().enumerate() {
        assert!(tree.contains(id));
        assert_eq!(*tree.get(id).unwrap().payload(), i);
        assert_eq!(tree.find(&[i as f64, i as f64]).unwrap(), Some(id));
    }
}

#[test]
fn clones_do_not_share_handles() {
    let tree = make_index();
    let id = id_of(&tree, [13., 15.]);
    let copy = KdTree::from(tree.read().clone());

    assert_ne!(copy.id(), tree.id());
    assert!(!copy.contains(id));
    assert!(copy.get(id).is_none());
    assert_eq!(copy.remove(id), Err(KdTreeError::NotAMember));
    assert_eq!(copy.size(), 7);
    assert_eq!(tree.size(), 7);

    let copied = copy.find(&[13., 15.]).unwrap().unwrap();
    assert_ne!(copied, id);
    assert_eq!(copied.tree(), copy.id());
    copy.validate().unwrap();
}

#[test]
fn nested_reads_while_a_writer_waits() {
    let tree = Arc::new(make_index());
    let root = tree.root().unwrap();
    let node = tree.get(root).unwrap();

    let writer = {
        let tree = Arc::clone(&tree);
        thread::spawn(move || tree.insert(Node::new([8., 8.], 7)).unwrap())
    };
    // give the writer time to queue behind the guard
    thread::sleep(Duration::from_millis(100));

    assert_eq!(tree.find(node.coords()).unwrap(), Some(root));
    assert_eq!(tree.size(), 7);
    let mut members = 0;
    tree.traverse(|id, _| {
        assert!(tree.contains(id));
        assert_eq!(tree.root_of(id).unwrap(), root);
        members += 1;
    });
    assert_eq!(members, 7);
    drop(node);

    let inserted = writer.join().unwrap();
    assert_eq!(tree.size(), 8);
    assert!(tree.contains(inserted));
}

#[test]
fn id_follows_the_locked_tree() {
    let tree = make_index();
    let old = tree.id();
    assert_eq!(tree.root().unwrap().tree(), old);

    *tree.write() = Subtree::new();
    assert_ne!(tree.id(), old);
    assert!(tree.is_empty());

    let id = tree.insert(Node::new([1., 1.], 0)).unwrap();
    assert_eq!(id.tree(), tree.id());
}
