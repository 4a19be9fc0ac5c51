//! Capability interfaces for plot components and the tree that aggregates
//! them into flat per-capability lists.
//!
//! Each node caches the ids of every drawable, resizable and scrollable node
//! in its subtree (itself first, then its children in insertion order). The
//! caches are rebuilt explicitly, walking from the changed node up to the
//! root, whenever a node is added or removed. Per-frame work then iterates a
//! flat list instead of recursing through the tree.

use crate::plot::PlotError;
use crate::program::LineTarget;

/// Pixel rectangle a plot renders into, origin at the top-left of the target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Visible portion of a viewport after scrolling containers clip it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl ClipRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Something that issues draw calls each frame.
pub trait Drawable<T: LineTarget> {
    fn draw(&mut self, target: &mut T) -> Result<(), PlotError>;
}

/// Something that reacts to its layout rectangle changing.
pub trait Resizable {
    fn resize(&mut self, viewport: Viewport);
}

/// Something that reacts to scrolling by restricting what it draws.
pub trait Scrollable {
    fn scroll(&mut self, clip: Option<ClipRect>);
}

/// Which per-frame lists a node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub draw: bool,
    pub resize: bool,
    pub scroll: bool,
}

impl Capabilities {
    pub const NONE: Self = Self {
        draw: false,
        resize: false,
        scroll: false,
    };

    pub const ALL: Self = Self {
        draw: true,
        resize: true,
        scroll: true,
    };
}

/// Payload stored in a [`DrawTree`].
pub trait Component {
    fn capabilities(&self) -> Capabilities;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DrawTreeError {
    #[error("node {0:?} is not part of the tree")]
    UnknownNode(NodeId),
    #[error("the root node cannot be removed")]
    RemoveRoot,
}

#[derive(Debug, Default, Clone)]
struct FlatLists {
    draw: Vec<NodeId>,
    resize: Vec<NodeId>,
    scroll: Vec<NodeId>,
}

#[derive(Debug)]
struct Node<N> {
    item: N,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    lists: FlatLists,
}

#[derive(Debug)]
pub struct DrawTree<N> {
    nodes: Vec<Option<Node<N>>>,
    root: NodeId,
}

impl<N: Component> DrawTree<N> {
    pub fn new(root: N) -> Self {
        let mut tree = Self {
            nodes: vec![Some(Node {
                item: root,
                parent: None,
                children: Vec::new(),
                lists: FlatLists::default(),
            })],
            root: NodeId(0),
        };
        tree.rebuild_from(tree.root);
        tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Attaches `item` under `parent` and refreshes the ancestor lists.
    pub fn add(&mut self, parent: NodeId, item: N) -> Result<NodeId, DrawTreeError> {
        self.node(parent)?;
        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(Node {
            item,
            parent: Some(parent),
            children: Vec::new(),
            lists: FlatLists::default(),
        }));
        if let Some(Some(node)) = self.nodes.get_mut(parent.0) {
            node.children.push(id);
        }
        self.rebuild_from(id);
        Ok(id)
    }

    /// Detaches `id` and its whole subtree, returning the removed items
    /// (the node itself first).
    pub fn remove(&mut self, id: NodeId) -> Result<Vec<N>, DrawTreeError> {
        if id == self.root {
            return Err(DrawTreeError::RemoveRoot);
        }
        let parent = self.node(id)?.parent;

        let mut removed = Vec::new();
        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            if let Some(node) = self.nodes.get_mut(next.0).and_then(Option::take) {
                pending.extend(node.children.iter().rev());
                removed.push(node.item);
            }
        }

        if let Some(parent) = parent {
            if let Some(Some(node)) = self.nodes.get_mut(parent.0) {
                node.children.retain(|child| *child != id);
            }
            self.rebuild_from(parent);
        }
        Ok(removed)
    }

    pub fn get(&self, id: NodeId) -> Option<&N> {
        self.nodes.get(id.0)?.as_ref().map(|node| &node.item)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut N> {
        self.nodes.get_mut(id.0)?.as_mut().map(|node| &mut node.item)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    /// Every drawable node at or below `id`.
    pub fn draw_list(&self, id: NodeId) -> &[NodeId] {
        self.node(id)
            .map(|node| node.lists.draw.as_slice())
            .unwrap_or(&[])
    }

    pub fn resize_list(&self, id: NodeId) -> &[NodeId] {
        self.node(id)
            .map(|node| node.lists.resize.as_slice())
            .unwrap_or(&[])
    }

    pub fn scroll_list(&self, id: NodeId) -> &[NodeId] {
        self.node(id)
            .map(|node| node.lists.scroll.as_slice())
            .unwrap_or(&[])
    }

    /// Number of live nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn node(&self, id: NodeId) -> Result<&Node<N>, DrawTreeError> {
        self.nodes
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(DrawTreeError::UnknownNode(id))
    }

    fn rebuild_from(&mut self, start: NodeId) {
        let mut cursor = Some(start);
        while let Some(id) = cursor {
            let Some(node) = self.nodes.get(id.0).and_then(Option::as_ref) else {
                break;
            };
            let capabilities = node.item.capabilities();
            let mut lists = FlatLists::default();
            if capabilities.draw {
                lists.draw.push(id);
            }
            if capabilities.resize {
                lists.resize.push(id);
            }
            if capabilities.scroll {
                lists.scroll.push(id);
            }
            for child in &node.children {
                if let Some(child) = self.nodes.get(child.0).and_then(Option::as_ref) {
                    lists.draw.extend_from_slice(&child.lists.draw);
                    lists.resize.extend_from_slice(&child.lists.resize);
                    lists.scroll.extend_from_slice(&child.lists.scroll);
                }
            }
            let parent = node.parent;
            if let Some(Some(node)) = self.nodes.get_mut(id.0) {
                node.lists = lists;
            }
            cursor = parent;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Item(&'static str, Capabilities);

    impl Component for Item {
        fn capabilities(&self) -> Capabilities {
            self.1
        }
    }

    fn drawable(name: &'static str) -> Item {
        Item(
            name,
            Capabilities {
                draw: true,
                ..Capabilities::NONE
            },
        )
    }

    #[test]
    fn lists_aggregate_descendants_in_insertion_order() {
        let mut tree = DrawTree::new(Item("root", Capabilities::NONE));
        let root = tree.root();
        let body = tree.add(root, Item("body", Capabilities::ALL)).expect("add");
        let first = tree.add(body, drawable("first")).expect("add");
        let second = tree.add(body, drawable("second")).expect("add");

        assert_eq!(tree.draw_list(root), &[body, first, second]);
        assert_eq!(tree.resize_list(root), &[body]);
        assert_eq!(tree.scroll_list(body), &[body]);
        assert_eq!(tree.draw_list(first), &[first]);
    }

    #[test]
    fn removing_a_subtree_refreshes_ancestors() {
        let mut tree = DrawTree::new(Item("root", Capabilities::NONE));
        let root = tree.root();
        let body = tree.add(root, drawable("body")).expect("add");
        let leaf = tree.add(body, drawable("leaf")).expect("add");
        let other = tree.add(root, drawable("other")).expect("add");

        let removed = tree.remove(body).expect("remove");
        assert_eq!(removed.len(), 2);
        assert_eq!(removed[0].0, "body");
        assert_eq!(tree.draw_list(root), &[other]);
        assert!(tree.get(leaf).is_none());
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn adding_under_an_unknown_node_fails() {
        let mut tree = DrawTree::new(Item("root", Capabilities::NONE));
        let root = tree.root();
        let child = tree.add(root, drawable("child")).expect("add");
        tree.remove(child).expect("remove");
        assert_eq!(
            tree.add(child, drawable("orphan")),
            Err(DrawTreeError::UnknownNode(child))
        );
        assert_eq!(tree.remove(root), Err(DrawTreeError::RemoveRoot));
    }

    #[test]
    fn empty_viewport_is_detected() {
        assert!(Viewport::new(0.0, 0.0, 0.0, 10.0).is_empty());
        assert!(!Viewport::new(0.0, 0.0, 5.0, 10.0).is_empty());
    }
}
