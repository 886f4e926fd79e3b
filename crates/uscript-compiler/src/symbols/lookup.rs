//! Name resolution across the class hierarchy.

use uscript_core::{Bin, ClassId, EnumDef, NodeIndex, NodeRef, Property};

use super::{ClassSymbols, NodeKind, OperatorKind, StackNode};
use crate::conversion::{ClassHierarchy, same_type};

/// Guard against a malformed (cyclic) parent chain.
const MAX_DEPTH: usize = 256;

/// Read access to the symbol tables of every class in a build.
///
/// Implementors supply the three required methods; every resolution rule
/// lives in the provided methods so the compiler and decompiler agree.
pub trait ClassTable {
    fn symbols(&self, class: ClassId) -> &ClassSymbols;
    fn find_class(&self, name: &str) -> Option<ClassId>;
    fn class_count(&self) -> usize;

    fn class_name(&self, class: ClassId) -> &str {
        &self.symbols(class).name
    }

    /// `class` followed by its ancestors, nearest first.
    fn ancestry(&self, class: ClassId) -> Vec<ClassId> {
        let mut chain = vec![class];
        let mut current = class;
        while let Some(parent) = self.symbols(current).parent {
            if chain.contains(&parent) || chain.len() >= MAX_DEPTH {
                break;
            }
            chain.push(parent);
            current = parent;
        }
        chain
    }

    fn is_child_of(&self, class: ClassId, ancestor: ClassId) -> bool {
        self.ancestry(class).contains(&ancestor)
    }

    fn node(&self, node: NodeRef) -> Option<&StackNode> {
        self.symbols(node.class).node(node.node)
    }

    fn params(&self, node: NodeRef) -> Vec<Property> {
        self.symbols(node.class).param_props(node.node)
    }

    fn return_value(&self, node: NodeRef) -> Option<Property> {
        self.symbols(node.class).return_prop(node.node).cloned()
    }

    // =========================================
    // Variables and types
    // =========================================

    /// Instance or static variable visible from `class`.
    fn find_member_variable(&self, class: ClassId, name: &str) -> Option<Property> {
        self.ancestry(class).into_iter().find_map(|c| {
            let symbols = self.symbols(c);
            symbols
                .instance_vars
                .iter()
                .chain(symbols.static_vars.iter())
                .map(|&p| symbols.prop(p))
                .find(|p| p.name.eq_ignore_ascii_case(name))
                .cloned()
        })
    }

    /// Variable in `bin` of `class`'s chain whose storage covers `offset`.
    fn member_variable_at(&self, class: ClassId, bin: Bin, offset: u16) -> Option<&Property> {
        self.ancestry(class).into_iter().find_map(|c| {
            let symbols = self.symbols(c);
            let list = if bin == Bin::Static { &symbols.static_vars } else { &symbols.instance_vars };
            list.iter().map(|&p| symbols.prop(p)).find(|p| p.contains(offset))
        })
    }

    /// Enumeration by name: the class chain first, then every class.
    fn find_enum(&self, from: ClassId, name: &str) -> Option<&EnumDef> {
        if let Some(def) = self.ancestry(from).into_iter().find_map(|c| self.symbols(c).own_enum(name)) {
            return Some(def);
        }
        (0..self.class_count() as u32).find_map(|i| self.symbols(ClassId(i)).own_enum(name))
    }

    // =========================================
    // Callables
    // =========================================

    /// Function visible from class-level code of `class`.
    fn find_class_function(&self, class: ClassId, name: &str) -> Option<NodeRef> {
        self.ancestry(class).into_iter().find_map(|c| {
            self.symbols(c)
                .child(NodeIndex::CLASS, name, |n| n.kind == NodeKind::Function)
                .map(|node| NodeRef::new(c, node))
        })
    }

    /// Function visible from code in `state` (or class level when `None`):
    /// the state and the states it overrides, then the class chain.
    fn find_function(&self, class: ClassId, state: Option<NodeIndex>, name: &str) -> Option<NodeRef> {
        let mut current = state.map(|s| NodeRef::new(class, s));
        let mut guard = 0;
        while let Some(state_ref) = current {
            let symbols = self.symbols(state_ref.class);
            if let Some(node) = symbols.child(state_ref.node, name, |n| n.kind == NodeKind::Function) {
                return Some(NodeRef::new(state_ref.class, node));
            }
            current = symbols.node(state_ref.node).and_then(|n| n.parent_item);
            guard += 1;
            if guard > MAX_DEPTH {
                break;
            }
        }
        self.find_class_function(class, name)
    }

    /// State named `name` declared by `class` or an ancestor.
    fn find_state(&self, class: ClassId, name: &str) -> Option<NodeRef> {
        self.ancestry(class).into_iter().find_map(|c| {
            self.symbols(c)
                .child(NodeIndex::CLASS, name, |n| n.kind == NodeKind::State)
                .map(|node| NodeRef::new(c, node))
        })
    }

    /// Every operator of `kind` named `name` visible from `class`.
    ///
    /// A declaration in a derived class hides an ancestor's declaration with
    /// the same parameter types.
    fn collect_operators(&self, class: ClassId, name: &str, kind: OperatorKind) -> Vec<NodeRef> {
        let mut found: Vec<NodeRef> = Vec::new();
        for c in self.ancestry(class) {
            let symbols = self.symbols(c);
            let Some(class_node) = symbols.node(NodeIndex::CLASS) else {
                continue;
            };
            for &child in &class_node.children {
                let Some(node) = symbols.node(child) else { continue };
                if node.kind.operator_kind() != Some(kind) || !node.is_named(name) {
                    continue;
                }
                let candidate = NodeRef::new(c, child);
                let params = self.params(candidate);
                let hidden = found.iter().any(|&f| same_signature(&self.params(f), &params));
                if !hidden {
                    found.push(candidate);
                }
            }
        }
        found
    }

    /// Node bound to native entry `index`, searching `from`'s chain first.
    fn find_native(&self, from: ClassId, index: u16) -> Option<NodeRef> {
        let native = |c: ClassId| {
            self.symbols(c)
                .nodes
                .iter()
                .position(|n| n.native_index == Some(index))
                .map(|i| NodeRef::new(c, NodeIndex(i as u16)))
        };
        self.ancestry(from)
            .into_iter()
            .find_map(native)
            .or_else(|| (0..self.class_count() as u32).map(ClassId).find_map(native))
    }
}

/// Parameter lists match in type and passing mode.
pub(crate) fn same_signature(a: &[Property], b: &[Property]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|(x, y)| {
            same_type(&x.ty, &y.ty) && x.array_dim == y.array_dim && x.is_out() == y.is_out()
        })
}

impl<T: ClassTable + ?Sized> ClassHierarchy for T {
    fn parent_name(&self, class: &str) -> Option<&str> {
        let id = self.find_class(class)?;
        let parent = self.symbols(id).parent?;
        Some(self.class_name(parent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::NodeFlags;
    use uscript_core::{PropType, PropertyFlags, Span};

    /// Minimal table over a `Vec`, for lookup tests.
    struct Classes(Vec<ClassSymbols>);

    impl ClassTable for Classes {
        fn symbols(&self, class: ClassId) -> &ClassSymbols {
            &self.0[class.index()]
        }

        fn find_class(&self, name: &str) -> Option<ClassId> {
            self.0.iter().position(|c| c.name.eq_ignore_ascii_case(name)).map(|i| ClassId(i as u32))
        }

        fn class_count(&self) -> usize {
            self.0.len()
        }
    }

    fn function(symbols: &mut ClassSymbols, outer: NodeIndex, name: &str) -> NodeIndex {
        symbols.add_node(StackNode::new(name, NodeKind::Function, Span::default()), outer).unwrap()
    }

    fn operator(symbols: &mut ClassSymbols, name: &str, params: &[PropType]) -> NodeIndex {
        let node = symbols
            .add_node(StackNode::new(name, NodeKind::Operator { precedence: 16 }, Span::default()), NodeIndex::CLASS)
            .unwrap();
        for ty in params {
            let prop = symbols.add_property(Property::value(ty.clone()).with_flags(PropertyFlags::PARM));
            symbols.node_mut(node).unwrap().params.push(prop);
        }
        node
    }

    fn hierarchy() -> Classes {
        let mut object = ClassSymbols::new("Object", Span::default());
        operator(&mut object, "+", &[PropType::Int, PropType::Int]);
        operator(&mut object, "+", &[PropType::Float, PropType::Float]);
        function(&mut object, NodeIndex::CLASS, "Log");

        let mut actor = ClassSymbols::new("Actor", Span::default());
        actor.parent = Some(ClassId(0));
        operator(&mut actor, "+", &[PropType::Int, PropType::Int]);
        function(&mut actor, NodeIndex::CLASS, "Touch");
        let idle = actor
            .add_node(StackNode::new("Idle", NodeKind::State, Span::default()), NodeIndex::CLASS)
            .unwrap();
        function(&mut actor, idle, "Touch");

        let mut pawn = ClassSymbols::new("Pawn", Span::default());
        pawn.parent = Some(ClassId(1));
        let mut idle = StackNode::new("Idle", NodeKind::State, Span::default());
        idle.parent_item = Some(NodeRef::new(ClassId(1), NodeIndex(3)));
        idle.flags |= NodeFlags::AUTO;
        pawn.add_node(idle, NodeIndex::CLASS).unwrap();

        Classes(vec![object, actor, pawn])
    }

    #[test]
    fn ancestry_is_nearest_first() {
        let classes = hierarchy();
        assert_eq!(classes.ancestry(ClassId(2)), vec![ClassId(2), ClassId(1), ClassId(0)]);
        assert!(classes.is_child_of(ClassId(2), ClassId(0)));
        assert!(!classes.is_child_of(ClassId(0), ClassId(2)));
        assert_eq!(classes.parent_name("pawn"), Some("Actor"));
    }

    #[test]
    fn state_functions_shadow_class_functions() {
        let classes = hierarchy();
        let in_state = classes.find_function(ClassId(2), Some(NodeIndex(1)), "touch").unwrap();
        assert_eq!(in_state, NodeRef::new(ClassId(1), NodeIndex(4)));
        let class_level = classes.find_function(ClassId(2), None, "touch").unwrap();
        assert_eq!(class_level, NodeRef::new(ClassId(1), NodeIndex(2)));
        assert_eq!(classes.find_function(ClassId(2), None, "Log").map(|r| r.class), Some(ClassId(0)));
        assert!(classes.find_function(ClassId(2), None, "Missing").is_none());
    }

    #[test]
    fn derived_operators_hide_identical_signatures() {
        let classes = hierarchy();
        let ops = classes.collect_operators(ClassId(2), "+", OperatorKind::Binary);
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].class, ClassId(1));
        assert_eq!(ops[1].class, ClassId(0));
        assert!(classes.collect_operators(ClassId(2), "+", OperatorKind::Pre).is_empty());
    }
}
