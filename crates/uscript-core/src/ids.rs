//! Arena indices.
//!
//! Classes live in a `Vec` inside the unit set, call-stack nodes live in a
//! per-class `Vec`, properties live in a per-class table. These newtypes keep
//! the three index spaces apart.

use std::fmt;

/// Index of a class inside a compilation unit set.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct ClassId(pub u32);

impl ClassId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of a call-stack node inside its owning class. Node 0 is the class itself.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Default)]
pub struct NodeIndex(pub u16);

impl NodeIndex {
    /// The class node every class owns.
    pub const CLASS: NodeIndex = NodeIndex(0);

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of a property in its owning class's property table.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct PropIndex(pub u32);

impl PropIndex {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A node addressed across classes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NodeRef {
    pub class: ClassId,
    pub node: NodeIndex,
}

impl NodeRef {
    pub fn new(class: ClassId, node: NodeIndex) -> Self {
        Self { class, node }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.class.0, self.node.0)
    }
}
