use tracing::debug;

/// The scene-graph capability the viewer builds on.
pub trait SceneGraph {
    type Node;

    fn add_child(&mut self, parent: &Self::Node, child: Self::Node);
}

/// Adds every present child to `parent`, skipping holes.
///
/// Loaders yield `None` for parts that failed to build; the scene graph itself
/// never sees them. Returns how many children were attached.
pub fn attach_children<G, I>(graph: &mut G, parent: &G::Node, children: I) -> usize
where
    G: SceneGraph,
    I: IntoIterator<Item = Option<G::Node>>,
{
    let mut attached = 0;
    let mut skipped = 0;
    for child in children {
        match child {
            Some(node) => {
                graph.add_child(parent, node);
                attached += 1;
            }
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        debug!(attached, skipped, "skipped empty scene children");
    }
    attached
}

#[cfg(test)]
mod tests {
    use super::{SceneGraph, attach_children};

    #[derive(Default)]
    struct EdgeList(Vec<(u32, u32)>);

    impl SceneGraph for EdgeList {
        type Node = u32;

        fn add_child(&mut self, parent: &u32, child: u32) {
            self.0.push((*parent, child));
        }
    }

    #[test]
    fn skips_missing_children() {
        let mut g = EdgeList::default();
        let n = attach_children(&mut g, &0, [Some(1), None, Some(2), None]);
        assert_eq!(n, 2);
        assert_eq!(g.0, vec![(0, 1), (0, 2)]);
    }
}
