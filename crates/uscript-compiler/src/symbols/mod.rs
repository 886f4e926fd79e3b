//! Per-class symbol tables.
//!
//! - Property table: every variable, parameter, return value and local.
//! - Node arena: the class node (index 0) and its states, functions and
//!   operators, linked by index.
//! - Enumerations declared by the class.
//!
//! Cross-class resolution goes through the [`ClassTable`] trait so the same
//! lookups serve the compiler (which holds its own class out of the set)
//! and the decompiler (which reads the set directly).

mod lookup;
mod node;

pub use lookup::ClassTable;
pub(crate) use lookup::same_signature;
pub use node::{CodeRange, NodeFlags, NodeKind, OperatorKind, StackNode};

use bitflags::bitflags;
use uscript_core::{ClassId, EnumDef, NodeIndex, PropIndex, Property, Span};

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
    pub struct ClassFlags: u8 {
        const INTRINSIC = 1 << 0;
        const ABSTRACT = 1 << 1;
        /// `#decompile` was seen; the driver logs decompiled output.
        const DECOMPILE = 1 << 2;
    }
}

/// Everything pass 0 learns about a class.
#[derive(Debug, Clone, Default)]
pub struct ClassSymbols {
    pub name: String,
    pub parent: Option<ClassId>,
    pub flags: ClassFlags,
    pub properties: Vec<Property>,
    /// Instance variables in declaration order.
    pub instance_vars: Vec<PropIndex>,
    /// Class-static variables in declaration order.
    pub static_vars: Vec<PropIndex>,
    pub enums: Vec<EnumDef>,
    pub nodes: Vec<StackNode>,
    /// Bytes used by instance variables, including inherited ones.
    pub instance_size: u16,
    pub static_size: u16,
}

impl ClassSymbols {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        let name = name.into();
        Self {
            nodes: vec![StackNode::new(name.clone(), NodeKind::Class, span)],
            name,
            ..Self::default()
        }
    }

    #[inline]
    pub fn node(&self, index: NodeIndex) -> Option<&StackNode> {
        self.nodes.get(index.index())
    }

    #[inline]
    pub fn node_mut(&mut self, index: NodeIndex) -> Option<&mut StackNode> {
        self.nodes.get_mut(index.index())
    }

    #[inline]
    pub fn prop(&self, index: PropIndex) -> &Property {
        &self.properties[index.index()]
    }

    pub fn add_property(&mut self, prop: Property) -> PropIndex {
        let index = PropIndex(self.properties.len() as u32);
        self.properties.push(prop);
        index
    }

    /// Append a node under `outer`. `None` when the arena is full.
    pub fn add_node(&mut self, mut node: StackNode, outer: NodeIndex) -> Option<NodeIndex> {
        let index = NodeIndex(u16::try_from(self.nodes.len()).ok()?);
        node.outer = Some(outer);
        self.nodes.push(node);
        self.nodes.get_mut(outer.index())?.children.push(index);
        Some(index)
    }

    /// Direct child of `outer` named `name` that satisfies `pred`.
    pub fn child(&self, outer: NodeIndex, name: &str, pred: impl Fn(&StackNode) -> bool) -> Option<NodeIndex> {
        self.node(outer)?
            .children
            .iter()
            .copied()
            .find(|&c| self.node(c).is_some_and(|n| n.is_named(name) && pred(n)))
    }

    /// Parameter, return value or local of `node` named `name`.
    pub fn find_frame_var(&self, node: NodeIndex, name: &str) -> Option<PropIndex> {
        self.node(node)?
            .frame()
            .find(|&p| self.prop(p).name.eq_ignore_ascii_case(name))
    }

    /// Frame property of `node` whose storage covers `offset`.
    pub fn frame_var_at(&self, node: NodeIndex, offset: u16) -> Option<&Property> {
        self.node(node)?.frame().map(|p| self.prop(p)).find(|p| p.contains(offset))
    }

    pub fn own_enum(&self, name: &str) -> Option<&EnumDef> {
        self.enums.iter().find(|e| e.name.eq_ignore_ascii_case(name))
    }

    /// Parameter types of a callable node, in order.
    pub fn param_props(&self, node: NodeIndex) -> Vec<Property> {
        self.node(node)
            .map(|n| n.params.iter().map(|&p| self.prop(p).clone()).collect())
            .unwrap_or_default()
    }

    pub fn return_prop(&self, node: NodeIndex) -> Option<&Property> {
        self.node(node)?.return_prop.map(|p| self.prop(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uscript_core::{Bin, PropType, PropertyFlags};

    #[test]
    fn class_node_is_index_zero() {
        let symbols = ClassSymbols::new("Actor", Span::default());
        let class = symbols.node(NodeIndex::CLASS).unwrap();
        assert_eq!(class.kind, NodeKind::Class);
        assert_eq!(class.name, "Actor");
    }

    #[test]
    fn add_node_links_children() {
        let mut symbols = ClassSymbols::new("Actor", Span::default());
        let idle = symbols
            .add_node(StackNode::new("Idle", NodeKind::State, Span::default()), NodeIndex::CLASS)
            .unwrap();
        let touch = symbols.add_node(StackNode::new("Touch", NodeKind::Function, Span::default()), idle).unwrap();
        assert_eq!(symbols.child(NodeIndex::CLASS, "idle", |n| n.kind == NodeKind::State), Some(idle));
        assert_eq!(symbols.child(idle, "TOUCH", |_| true), Some(touch));
        assert_eq!(symbols.node(touch).unwrap().outer, Some(idle));
    }

    #[test]
    fn frame_lookup_by_name_and_offset() {
        let mut symbols = ClassSymbols::new("Actor", Span::default());
        let func = symbols
            .add_node(StackNode::new("Move", NodeKind::Function, Span::default()), NodeIndex::CLASS)
            .unwrap();
        let mut delta = Property::new("Delta", PropType::Vector).with_bin(Bin::Frame).with_flags(PropertyFlags::PARM);
        delta.offset = 0;
        let mut count = Property::new("Count", PropType::Int).with_bin(Bin::Frame);
        count.offset = 12;
        let delta = symbols.add_property(delta);
        let count = symbols.add_property(count);
        let node = symbols.node_mut(func).unwrap();
        node.params.push(delta);
        node.locals.push(count);

        assert_eq!(symbols.find_frame_var(func, "count"), Some(count));
        assert_eq!(symbols.frame_var_at(func, 8).map(|p| p.name.as_str()), Some("Delta"));
        assert_eq!(symbols.frame_var_at(func, 12).map(|p| p.name.as_str()), Some("Count"));
        assert!(symbols.frame_var_at(func, 16).is_none());
    }
}
