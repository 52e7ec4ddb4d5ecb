//! Depth-first traversal of a decoded [`Message`] tree.
//!
//! The walker visits groups and segments in document order with an explicit stack
//! ([`Structures`]), so callers stop early with `find` / `break` and nothing recurses.
//! It is the only place segment ordinals are computed from the tree, which keeps them
//! aligned with the segment ordinals the [position translator](crate::position) counts
//! in the raw text.
//!
//! ## Public API summary
//!
//! | Need | Use |
//! |------|-----|
//! | All nodes in order | [`Structures`] |
//! | All segments with ordinal and location | [`segments`] |
//! | Segment N (1-based) | [`segment_at`] |
//! | Ordinal of a segment node | [`ordinal_of`] |
//! | Leaf values of one segment with declared types | [`primitives`] |
//!
//! ## Ordinals
//!
//! Ordinal N is the N-th segment in document order. The decoder drops empty segments,
//! so every segment in the tree counts. [`ordinal_of`] matches by node identity, not by
//! content: two identical `NTE` segments still have different ordinals.

use crate::model::{Group, Location, Message, Segment, Structure};

/// One node produced by [`Structures`].
#[derive(Debug, Clone)]
pub enum Node<'m> {
    Group {
        group: &'m Group,
        location: Location,
    },
    Segment {
        segment: &'m Segment,
        parent: &'m Group,
        location: Location,
    },
}

/// Lazy pre-order iterator over every group and segment under the root.
pub struct Structures<'m> {
    /// (group, its location, index of the next child to visit)
    stack: Vec<(&'m Group, Location, usize)>,
}

impl<'m> Structures<'m> {
    pub fn new(message: &'m Message) -> Self {
        Structures { stack: vec![(&message.root, Location::default(), 0)] }
    }
}

impl<'m> Iterator for Structures<'m> {
    type Item = Node<'m>;

    fn next(&mut self) -> Option<Node<'m>> {
        loop {
            let (group, location, next) = self.stack.last_mut()?;
            let group: &'m Group = *group;
            let Some(child) = group.children.get(*next) else {
                self.stack.pop();
                continue;
            };
            *next += 1;
            let child_location = location.child(child.name(), child.rep());
            return Some(match child {
                Structure::Segment(segment) => Node::Segment {
                    segment,
                    parent: group,
                    location: child_location,
                },
                Structure::Group(g) => {
                    self.stack.push((g, child_location.clone(), 0));
                    Node::Group { group: g, location: child_location }
                }
            });
        }
    }
}

/// A segment node with its parent group, location and 1-based ordinal.
#[derive(Debug, Clone)]
pub struct SegmentRef<'m> {
    pub segment: &'m Segment,
    pub parent: &'m Group,
    pub location: Location,
    pub ordinal: u32,
}

/// Segments in document order.
pub fn segments(message: &Message) -> impl Iterator<Item = SegmentRef<'_>> {
    Structures::new(message)
        .filter_map(|node| match node {
            Node::Segment { segment, parent, location } => Some((segment, parent, location)),
            Node::Group { .. } => None,
        })
        .zip(1u32..)
        .map(|((segment, parent, location), ordinal)| SegmentRef { segment, parent, location, ordinal })
}

/// The segment with 1-based `ordinal`, or `None` past the end (or for 0).
pub fn segment_at(message: &Message, ordinal: u32) -> Option<SegmentRef<'_>> {
    if ordinal == 0 {
        return None;
    }
    segments(message).find(|s| s.ordinal == ordinal)
}

/// Ordinal of `segment`, which must be a node of `message` (identity, not equality).
pub fn ordinal_of(message: &Message, segment: &Segment) -> Option<u32> {
    segments(message)
        .find(|s| std::ptr::eq(s.segment, segment))
        .map(|s| s.ordinal)
}

/// One non-empty leaf value of a segment.
#[derive(Debug, Clone, PartialEq)]
pub struct Primitive<'m> {
    pub field: u32,
    pub repetition: u32,
    pub component: u32,
    pub subcomponent: u32,
    pub value: &'m str,
    /// Primitive type declared by the schema, `None` when undeclared or generic.
    pub data_type: Option<&'m str>,
}

/// Non-empty leaf values of `segment` in text order, with their declared primitive types.
pub fn primitives<'m>(message: &'m Message, segment: &'m Segment) -> Vec<Primitive<'m>> {
    let mut out = Vec::new();
    for (f, field) in (1u32..).zip(&segment.fields) {
        for (r, rep) in (0u32..).zip(&field.reps) {
            for (c, comp) in (1u32..).zip(&rep.components) {
                for (sc, value) in (1u32..).zip(&comp.subcomponents) {
                    if value.is_empty() {
                        continue;
                    }
                    out.push(Primitive {
                        field: f,
                        repetition: r,
                        component: c,
                        subcomponent: sc,
                        value: value.as_str(),
                        data_type: declared_type(message, &segment.name, f, c, sc),
                    });
                }
            }
        }
    }
    out
}

/// Primitive type at field/component/subcomponent of segment `code`.
///
/// A primitive field only has a type at component 1 / subcomponent 1; a primitive
/// component only at subcomponent 1.
pub fn declared_type<'m>(
    message: &'m Message,
    code: &str,
    field: u32,
    component: u32,
    subcomponent: u32,
) -> Option<&'m str> {
    let field_type = message.segment_def(code)?.field(field)?.data_type.as_str();
    let Some(composite) = message.composite(field_type) else {
        return (component == 1 && subcomponent == 1).then_some(field_type);
    };
    let component_type = composite.component(component)?.data_type.as_str();
    match message.composite(component_type) {
        Some(inner) => inner.component(subcomponent).map(|e| e.data_type.as_str()),
        None => (subcomponent == 1).then_some(component_type),
    }
}
