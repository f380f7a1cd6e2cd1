//! Widget tree storage.
//!
//! Widgets live in an arena. Parents hold child indices and children hold a
//! parent index, so the back-reference never implies ownership. A uid index
//! covering the whole tree enforces uid uniqueness at insertion time.

use std::collections::HashMap;
use std::mem;

use crate::domain::{FormArea, Widget, WidgetKind, WidgetView};

use super::error::FormError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct NodeId(usize);

#[derive(Debug)]
struct Node {
    widget: Widget,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Attribute equality test applied during traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetFilter<'a> {
    Uid(&'a str),
    Name(&'a str),
    Area(&'a str),
    Kind(WidgetKind),
}

impl WidgetFilter<'_> {
    pub fn matches(&self, widget: &Widget) -> bool {
        match self {
            WidgetFilter::Uid(uid) => widget.uid() == *uid,
            WidgetFilter::Name(name) => widget.name() == *name,
            WidgetFilter::Area(area) => widget.form_area() == *area,
            WidgetFilter::Kind(kind) => widget.kind() == *kind,
        }
    }
}

#[derive(Debug, Default)]
pub struct WidgetTree {
    nodes: Vec<Option<Node>>,
    roots: Vec<NodeId>,
    index: HashMap<String, NodeId>,
}

impl WidgetTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of widgets reachable from the top-level list.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, uid: &str) -> bool {
        self.index.contains_key(uid)
    }

    /// Add a top-level widget, keeping the list sorted by weight.
    pub fn add(&mut self, widget: Widget) -> Result<(), FormError> {
        self.check_insertable(&widget)?;
        let id = self.alloc(widget, None);
        self.roots.push(id);
        self.sort_siblings(None);
        Ok(())
    }

    /// Add a widget under an existing container.
    pub fn add_child(&mut self, parent_uid: &str, widget: Widget) -> Result<(), FormError> {
        let parent = self.id_of(parent_uid)?;
        if !self.node(parent).widget.is_container() {
            return Err(FormError::configuration(format!(
                "widget `{parent_uid}` is not a container"
            )));
        }
        self.check_insertable(&widget)?;
        let id = self.alloc(widget, Some(parent));
        self.node_mut(parent).children.push(id);
        self.sort_siblings(Some(parent));
        Ok(())
    }

    /// Depth-first, pre-order flattening of the tree.
    ///
    /// With a step, widgets tagged for a different step are left out. With a
    /// filter, only matching widgets are returned, but the children of a
    /// non-matching widget are still visited.
    pub fn all(&self, step: Option<u32>, filter: Option<WidgetFilter<'_>>) -> Vec<&Widget> {
        let mut out = Vec::new();
        for &root in &self.roots {
            self.walk(root, &mut |node| {
                let in_step = match (step, node.widget.form_step()) {
                    (Some(step), Some(tagged)) => step == tagged,
                    _ => true,
                };
                if in_step && filter.is_none_or(|f| f.matches(&node.widget)) {
                    out.push(&node.widget);
                }
            });
        }
        out
    }

    /// Serializable views in traversal order, each carrying its parent uid.
    pub fn views(&self, step: Option<u32>) -> Vec<WidgetView> {
        let mut out = Vec::new();
        for &root in &self.roots {
            self.walk(root, &mut |node| {
                let in_step = match (step, node.widget.form_step()) {
                    (Some(step), Some(tagged)) => step == tagged,
                    _ => true,
                };
                if in_step {
                    let parent = node.parent.map(|id| self.node(id).widget.uid());
                    out.push(node.widget.view(parent));
                }
            });
        }
        out
    }

    pub fn top_level(&self) -> impl Iterator<Item = &Widget> {
        self.roots.iter().map(|&id| &self.node(id).widget)
    }

    pub fn get(&self, uid: &str) -> Result<&Widget, FormError> {
        let id = self.id_of(uid)?;
        Ok(&self.node(id).widget)
    }

    pub fn get_mut(&mut self, uid: &str) -> Result<&mut Widget, FormError> {
        let id = self.id_of(uid)?;
        Ok(&mut self.node_mut(id).widget)
    }

    pub fn parent_of(&self, uid: &str) -> Result<Option<&str>, FormError> {
        let id = self.id_of(uid)?;
        Ok(self
            .node(id)
            .parent
            .map(|parent| self.node(parent).widget.uid()))
    }

    /// Detach a widget, together with its subtree, and hand it back.
    pub fn remove(&mut self, uid: &str) -> Result<Widget, FormError> {
        let id = self.id_of(uid)?;
        self.node_mut(id).widget.clear_rules();

        match self.node(id).parent {
            Some(parent) => self.node_mut(parent).children.retain(|&child| child != id),
            None => self.roots.retain(|&root| root != id),
        }

        Ok(self.release(id))
    }

    /// Swap `source_uid` for `replacement` at the same position.
    ///
    /// The replacement takes over the source's area, and its weight when it
    /// has none of its own, and records the source uid in `replaces`.
    pub fn replace(&mut self, source_uid: &str, mut replacement: Widget) -> Result<(), FormError> {
        let source = self.id_of(source_uid)?;
        if replacement.uid() != source_uid && self.contains(replacement.uid()) {
            return Err(duplicate_uid(replacement.uid()));
        }

        let current = &self.node(source).widget;
        if replacement.weight() == 0 && current.weight() != 0 {
            replacement.set_weight(current.weight());
        }
        replacement.set_form_area(current.form_area().to_string());
        replacement.set_replaces(source_uid);

        let parent = self.node(source).parent;
        let position = self
            .siblings(parent)
            .iter()
            .position(|&id| id == source)
            .unwrap_or(0);

        self.remove(source_uid)?;

        let id = self.alloc(replacement, parent);
        let siblings = self.siblings_mut(parent);
        let position = position.min(siblings.len());
        siblings.insert(position, id);
        self.sort_siblings(parent);
        Ok(())
    }

    /// Drop every widget.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.roots.clear();
        self.index.clear();
    }

    fn check_insertable(&self, widget: &Widget) -> Result<(), FormError> {
        widget
            .form_area()
            .parse::<FormArea>()
            .map_err(|_| {
                FormError::configuration(format!(
                    "invalid form area `{}` for widget `{}`",
                    widget.form_area(),
                    widget.uid()
                ))
            })?;
        if self.contains(widget.uid()) {
            return Err(duplicate_uid(widget.uid()));
        }
        Ok(())
    }

    fn alloc(&mut self, widget: Widget, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.index.insert(widget.uid().to_string(), id);
        self.nodes.push(Some(Node {
            widget,
            parent,
            children: Vec::new(),
        }));
        id
    }

    fn release(&mut self, id: NodeId) -> Widget {
        let node = self.nodes[id.0]
            .take()
            .unwrap_or_else(|| unreachable!("released node {id:?} twice"));
        for &child in &node.children {
            self.release(child);
        }
        self.index.remove(node.widget.uid());
        node.widget
    }

    fn walk<'a>(&'a self, id: NodeId, visit: &mut dyn FnMut(&'a Node)) {
        let node = self.node(id);
        visit(node);
        for &child in &node.children {
            self.walk(child, visit);
        }
    }

    fn sort_siblings(&mut self, parent: Option<NodeId>) {
        let mut siblings = mem::take(self.siblings_mut(parent));
        siblings.sort_by_key(|&id| self.node(id).widget.weight());
        *self.siblings_mut(parent) = siblings;
    }

    fn siblings(&self, parent: Option<NodeId>) -> &Vec<NodeId> {
        match parent {
            Some(parent) => &self.node(parent).children,
            None => &self.roots,
        }
    }

    fn siblings_mut(&mut self, parent: Option<NodeId>) -> &mut Vec<NodeId> {
        match parent {
            Some(parent) => &mut self.node_mut(parent).children,
            None => &mut self.roots,
        }
    }

    fn id_of(&self, uid: &str) -> Result<NodeId, FormError> {
        self.index
            .get(uid)
            .copied()
            .ok_or_else(|| FormError::widget_not_found(uid))
    }

    // Ids only come from the index or from live parent/child links, both of
    // which are cleared together with the slot.
    fn node(&self, id: NodeId) -> &Node {
        self.nodes[id.0]
            .as_ref()
            .unwrap_or_else(|| unreachable!("dangling widget node {id:?}"))
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes[id.0]
            .as_mut()
            .unwrap_or_else(|| unreachable!("dangling widget node {id:?}"))
    }
}

fn duplicate_uid(uid: &str) -> FormError {
    FormError::configuration(format!("widget `{uid}` is already added"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Required;

    fn uids(widgets: &[&Widget]) -> Vec<String> {
        widgets.iter().map(|w| w.uid().to_string()).collect()
    }

    #[test]
    fn add_orders_by_weight_and_keeps_ties_stable() {
        let mut tree = WidgetTree::new();
        tree.add(Widget::input("c").with_weight(30)).expect("add");
        tree.add(Widget::input("a").with_weight(10)).expect("add");
        tree.add(Widget::input("b").with_weight(20)).expect("add");
        tree.add(Widget::input("a2").with_weight(10)).expect("add");

        assert_eq!(uids(&tree.all(None, None)), ["a", "a2", "b", "c"]);
    }

    #[test]
    fn add_rejects_duplicates_and_unknown_areas() {
        let mut tree = WidgetTree::new();
        tree.add(Widget::input("email")).expect("add");

        let dup = tree.add(Widget::input("email")).expect_err("duplicate");
        assert!(matches!(dup, FormError::Configuration { .. }));

        let area = tree
            .add(Widget::input("x").with_form_area("sidebar"))
            .expect_err("bad area");
        assert!(matches!(area, FormError::Configuration { .. }));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn traversal_is_preorder_and_descends_into_filtered_out_containers() {
        let mut tree = WidgetTree::new();
        tree.add(Widget::container("box").with_weight(1)).expect("add");
        tree.add_child("box", Widget::input("inner_b").with_weight(2))
            .expect("child");
        tree.add_child("box", Widget::input("inner_a").with_weight(1))
            .expect("child");
        tree.add(Widget::input("after").with_weight(2)).expect("add");

        assert_eq!(
            uids(&tree.all(None, None)),
            ["box", "inner_a", "inner_b", "after"]
        );
        let inputs = tree.all(None, Some(WidgetFilter::Kind(WidgetKind::Input)));
        assert_eq!(uids(&inputs), ["inner_a", "inner_b", "after"]);
        assert_eq!(tree.parent_of("inner_a").expect("known"), Some("box"));
    }

    #[test]
    fn step_tagged_widgets_are_filtered_by_step() {
        let mut tree = WidgetTree::new();
        tree.add(Widget::input("always")).expect("add");
        tree.add(Widget::button("back").with_form_step(2)).expect("add");

        assert_eq!(uids(&tree.all(Some(1), None)), ["always"]);
        assert_eq!(uids(&tree.all(Some(2), None)), ["always", "back"]);
        assert_eq!(tree.all(None, None).len(), 2);
    }

    #[test]
    fn children_only_go_into_containers() {
        let mut tree = WidgetTree::new();
        tree.add(Widget::input("plain")).expect("add");
        let err = tree
            .add_child("plain", Widget::input("x"))
            .expect_err("not a container");
        assert!(matches!(err, FormError::Configuration { .. }));
        assert!(tree.add_child("ghost", Widget::input("x")).is_err());
    }

    #[test]
    fn remove_detaches_subtree_and_clears_rules() {
        let mut tree = WidgetTree::new();
        tree.add(Widget::container("box")).expect("add");
        tree.add_child("box", Widget::input("inner").with_rule(Required))
            .expect("child");
        tree.add(Widget::input("keep")).expect("add");

        let inner = tree.remove("inner").expect("removed");
        assert_eq!(inner.rule_count(), 0);
        assert_eq!(uids(&tree.all(None, None)), ["box", "keep"]);

        tree.add_child("box", Widget::input("inner2")).expect("child");
        tree.remove("box").expect("removed");
        assert!(!tree.contains("inner2"));
        assert_eq!(uids(&tree.all(None, None)), ["keep"]);

        let missing = tree.remove("box").expect_err("gone");
        assert!(missing.is_widget_not_found());
    }

    #[test]
    fn replace_swaps_in_place() {
        let mut tree = WidgetTree::new();
        tree.add(Widget::input("a").with_weight(10)).expect("add");
        tree.add(Widget::input("b").with_weight(10).with_form_area("header"))
            .expect("add");
        tree.add(Widget::input("c").with_weight(10)).expect("add");

        tree.replace("b", Widget::input("b2")).expect("replace");

        assert_eq!(uids(&tree.all(None, None)), ["a", "b2", "c"]);
        let b2 = tree.get("b2").expect("present");
        assert_eq!(b2.weight(), 10);
        assert_eq!(b2.form_area(), "header");
        assert_eq!(b2.replaces(), Some("b"));
        assert!(!tree.contains("b"));
    }

    #[test]
    fn replace_inside_container_stays_there() {
        let mut tree = WidgetTree::new();
        tree.add(Widget::container("box")).expect("add");
        tree.add_child("box", Widget::input("old").with_weight(5))
            .expect("child");
        tree.replace("old", Widget::input("new").with_weight(7))
            .expect("replace");

        assert_eq!(tree.parent_of("new").expect("known"), Some("box"));
        assert_eq!(tree.get("new").expect("present").weight(), 7);
    }

    #[test]
    fn replace_rejects_taken_uid() {
        let mut tree = WidgetTree::new();
        tree.add(Widget::input("a")).expect("add");
        tree.add(Widget::input("b")).expect("add");
        assert!(tree.replace("a", Widget::input("b")).is_err());
        assert!(tree.contains("a"));
    }

    #[test]
    fn clear_empties_the_tree() {
        let mut tree = WidgetTree::new();
        tree.add(Widget::container("box")).expect("add");
        tree.add_child("box", Widget::input("x")).expect("child");
        tree.clear();
        assert!(tree.is_empty());
        assert!(tree.all(None, None).is_empty());
        tree.add(Widget::input("x")).expect("uid is free again");
    }
}
