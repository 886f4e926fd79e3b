//! Bytecode back to source.
//!
//! The decompiler reads a compiled class from the unit set and prints
//! source that compiles to the same code and name pool: declarations come
//! from the symbol tables, bodies from the bytecode. Output is
//! normalized: one declaration per line, four-space indentation, `for`
//! loops as `while`.

mod expr;
mod stmt;

use std::fmt::Write as _;

use thiserror::Error;
use tracing::debug;
use uscript_core::{Bin, ClassId, NodeIndex, NodeRef, Property, PropertyFlags};

use crate::bytecode::OpCode;
use crate::symbols::{ClassFlags, ClassSymbols, ClassTable, NodeFlags, NodeKind, StackNode};
use crate::unit_set::{ClassStatus, CompilationUnitSet};

use expr::CodeReader;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecompileError {
    #[error("class '{0}' is not compiled")]
    NotCompiled(String),

    #[error("'{name}' has no compiled code")]
    NoCode { name: String },

    #[error("code ends unexpectedly at offset {at}")]
    Truncated { at: usize },

    #[error("unknown opcode {byte:#04x} at offset {at}")]
    UnknownOpcode { byte: u8, at: usize },

    #[error("unexpected {op:?} at offset {at}")]
    Unexpected { op: OpCode, at: usize },

    #[error("name index {index} is not in the name pool")]
    UnknownName { index: u16 },

    #[error("unknown conversion {byte:#04x} at offset {at}")]
    UnknownCast { byte: u8, at: usize },

    #[error("no variable at offset {offset} (code offset {at})")]
    UnknownVariable { offset: u16, at: usize },

    #[error("cannot resolve {name} at offset {at}")]
    UnknownFunction { name: String, at: usize },

    #[error("jump at {at} to {target} does not form a statement")]
    UnstructuredJump { at: u16, target: u16 },

    #[error("label '{name}' does not fall on a statement")]
    MisplacedLabel { name: String },

    #[error("code does not end with its implicit return")]
    MissingEnd,
}

pub(crate) type Result<T> = std::result::Result<T, DecompileError>;

/// Prints one class of a [`CompilationUnitSet`] back as source.
pub struct Decompiler<'a> {
    set: &'a CompilationUnitSet,
    class: ClassId,
}

impl<'a> Decompiler<'a> {
    pub fn new(set: &'a CompilationUnitSet, class: ClassId) -> Self {
        Self { set, class }
    }

    fn compiled(&self) -> Result<&'a ClassSymbols> {
        let unit = self
            .set
            .unit(self.class)
            .ok_or_else(|| DecompileError::NotCompiled(format!("#{}", self.class.index())))?;
        if unit.status() != ClassStatus::Compiled {
            return Err(DecompileError::NotCompiled(unit.name().to_string()));
        }
        Ok(unit.symbols())
    }

    /// Source of the whole class.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn decompile_class(&self) -> Result<String> {
        let symbols = self.compiled()?;
        let mut out = String::new();

        if symbols.flags.contains(ClassFlags::DECOMPILE) {
            out.push_str("#decompile\n");
        }
        let _ = write!(out, "class {}", symbols.name);
        if let Some(parent) = symbols.parent {
            let _ = write!(out, " expands {}", self.set.class_name(parent));
        }
        if symbols.flags.contains(ClassFlags::INTRINSIC) {
            out.push_str(" intrinsic");
        }
        if symbols.flags.contains(ClassFlags::ABSTRACT) {
            out.push_str(" abstract");
        }
        out.push_str(";\n");

        for def in &symbols.enums {
            let _ = write!(out, "\nenum {}\n{{\n", def.name);
            let tags: Vec<String> = def.tags.iter().map(|t| format!("    {t}")).collect();
            out.push_str(&tags.join(",\n"));
            out.push_str("\n};\n");
        }

        let vars: Vec<&Property> = symbols
            .instance_vars
            .iter()
            .chain(symbols.static_vars.iter())
            .map(|&p| symbols.prop(p))
            .collect();
        if !vars.is_empty() {
            out.push('\n');
        }
        for prop in vars {
            let keyword = if prop.bin == Bin::Static { "static var" } else { "var" };
            let qualifier = if prop.flags.contains(PropertyFlags::CONST) { "const " } else { "" };
            let _ = writeln!(out, "{keyword} {qualifier}{};", declarator(prop));
        }

        let class_node = symbols.node(NodeIndex::CLASS).ok_or(DecompileError::MissingEnd)?;
        for &child in &class_node.children {
            out.push('\n');
            let Some(node) = symbols.node(child) else { continue };
            if node.kind == NodeKind::State {
                self.state(&mut out, symbols, child, node)?;
            } else {
                self.callable(&mut out, symbols, child, node, 0)?;
            }
        }

        debug!(class = %symbols.name, bytes = out.len(), "decompiled class");
        Ok(out)
    }

    /// Source of one function, operator or state.
    pub fn decompile_callable(&self, node: NodeIndex) -> Result<String> {
        let symbols = self.compiled()?;
        let stack = symbols.node(node).ok_or_else(|| DecompileError::NoCode {
            name: format!("node {}", node.index()),
        })?;
        let mut out = String::new();
        match stack.kind {
            NodeKind::State => self.state(&mut out, symbols, node, stack)?,
            NodeKind::Class => {
                return Err(DecompileError::NoCode {
                    name: stack.name.clone(),
                });
            }
            _ => self.callable(&mut out, symbols, node, stack, 0)?,
        }
        Ok(out)
    }

    fn state(&self, out: &mut String, symbols: &ClassSymbols, index: NodeIndex, node: &StackNode) -> Result<()> {
        let auto = if node.flags.contains(NodeFlags::AUTO) { "auto " } else { "" };
        let _ = write!(out, "{auto}state {}\n{{\n", node.name);
        for (i, &child) in node.children.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            if let Some(function) = symbols.node(child) {
                self.callable(out, symbols, child, function, 1)?;
            }
        }
        if node.code.is_some() {
            if !node.children.is_empty() {
                out.push('\n');
            }
            for line in self.body(index, Some(index), None, 1, true)? {
                out.push_str(&line);
                out.push('\n');
            }
        }
        out.push_str("}\n");
        Ok(())
    }

    fn callable(
        &self,
        out: &mut String,
        symbols: &ClassSymbols,
        index: NodeIndex,
        node: &StackNode,
        indent: usize,
    ) -> Result<()> {
        let pad = "    ".repeat(indent);
        let _ = writeln!(out, "{pad}{}", signature(symbols, node));
        if node.flags.contains(NodeFlags::INTRINSIC) {
            return Ok(());
        }
        if node.code.is_none() {
            return Err(DecompileError::NoCode { name: node.name.clone() });
        }

        let _ = writeln!(out, "{pad}{{");
        for &local in &node.locals {
            let _ = writeln!(out, "{pad}    local {};", declarator(symbols.prop(local)));
        }
        let state = node
            .outer
            .filter(|&o| symbols.node(o).is_some_and(|n| n.kind == NodeKind::State));
        let lines = self.body(index, state, symbols.return_prop(index), indent + 1, false)?;
        if !node.locals.is_empty() && !lines.is_empty() {
            out.push('\n');
        }
        for line in lines {
            out.push_str(&line);
            out.push('\n');
        }
        let _ = writeln!(out, "{pad}}}");
        Ok(())
    }

    fn body(
        &self,
        node: NodeIndex,
        state: Option<NodeIndex>,
        ret: Option<&Property>,
        indent: usize,
        state_code: bool,
    ) -> Result<Vec<String>> {
        let unit = self
            .set
            .unit(self.class)
            .ok_or_else(|| DecompileError::NotCompiled(format!("#{}", self.class.index())))?;
        let code = self
            .set
            .callable_code(NodeRef::new(self.class, node))
            .ok_or_else(|| DecompileError::NoCode {
                name: self
                    .set
                    .node(NodeRef::new(self.class, node))
                    .map_or_else(String::new, |n| n.name.clone()),
            })?;
        let reader = CodeReader {
            set: self.set,
            class: self.class,
            node,
            state,
            code,
            names: &unit.code().names,
        };
        let body = reader.decode_body(ret)?;
        stmt::render(&body, indent, state_code)
    }
}

/// `Type Name` with its `[N]` suffix.
fn declarator(prop: &Property) -> String {
    if prop.is_array() {
        format!("{} {}[{}]", prop.ty, prop.name, prop.array_dim)
    } else {
        format!("{} {}", prop.ty, prop.name)
    }
}

fn signature(symbols: &ClassSymbols, node: &StackNode) -> String {
    let mut words: Vec<String> = Vec::new();
    for (flag, word) in [
        (NodeFlags::FINAL, "final"),
        (NodeFlags::PRIVATE, "private"),
        (NodeFlags::STATIC, "static"),
        (NodeFlags::LATENT, "latent"),
        (NodeFlags::ITERATOR, "iterator"),
        (NodeFlags::SIMULATED, "simulated"),
    ] {
        if node.flags.contains(flag) {
            words.push(word.to_string());
        }
    }
    if node.flags.contains(NodeFlags::INTRINSIC) {
        words.push(match node.native_index {
            Some(index) => format!("intrinsic({index})"),
            None => "intrinsic".to_string(),
        });
    }
    words.push(match node.kind {
        NodeKind::Operator { precedence } => format!("operator({precedence})"),
        NodeKind::PreOperator => "preoperator".to_string(),
        NodeKind::PostOperator => "postoperator".to_string(),
        _ if node.flags.contains(NodeFlags::EVENT) => "event".to_string(),
        _ => "function".to_string(),
    });
    if let Some(ret) = node.return_prop {
        words.push(symbols.prop(ret).ty.to_string());
    }

    let params: Vec<String> = node
        .params
        .iter()
        .map(|&p| {
            let prop = symbols.prop(p);
            let mut text = String::new();
            for (flag, word) in [
                (PropertyFlags::OUT_PARM, "out "),
                (PropertyFlags::OPTIONAL_PARM, "optional "),
                (PropertyFlags::COERCE_PARM, "coerce "),
                (PropertyFlags::CONST, "const "),
            ] {
                if prop.flags.contains(flag) {
                    text.push_str(word);
                }
            }
            text.push_str(&declarator(prop));
            text
        })
        .collect();
    let mut text = words.join(" ");
    let _ = write!(text, " {}({})", node.name, params.join(", "));
    if node.flags.contains(NodeFlags::INTRINSIC) {
        text.push(';');
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompilerConfig;
    use crate::sink::NullHost;

    fn build(classes: &[(&str, &str)]) -> CompilationUnitSet {
        let mut set = CompilationUnitSet::new(CompilerConfig::default());
        for (name, source) in classes {
            set.add_class(name, *source).unwrap();
        }
        let report = set.compile_all(&mut NullHost, &mut Vec::new()).unwrap();
        assert!(report.failed.is_empty(), "{:?}", report.failed);
        set
    }

    const OBJECT: &str = "class Object;
intrinsic(100) static operator(20) int + (int A, int B);
intrinsic(101) static operator(16) int * (int A, int B);
intrinsic(102) static operator(24) bool < (int A, int B);
intrinsic(103) static operator(24) bool == (int A, int B);
intrinsic(104) static preoperator bool ! (bool A);
intrinsic(105) static postoperator int ++ (out int A);
intrinsic(106) static operator(20) float + (float A, float B);
";

    fn round_trip(source: &str) -> String {
        let set = build(&[("Object", OBJECT), ("Test", source)]);
        let id = set.find_class("Test").unwrap();
        assert!(set.verify_round_trip(id).unwrap(), "{}", set.decompile(id).unwrap());
        set.decompile(id).unwrap()
    }

    #[test]
    fn declarations_are_reprinted() {
        let text = round_trip(
            "class Test expands Object abstract;
enum EMode { M_Off, M_On };
var const int Count;
var float Weights[4];
static var EMode Mode;
final function int Sum(int A, optional out int B) { return A + B; }
event Touched() {}
",
        );
        assert!(text.contains("class Test expands Object abstract;"));
        assert!(text.contains("enum EMode\n{\n    M_Off,\n    M_On\n};"));
        assert!(text.contains("var const int Count;"));
        assert!(text.contains("var float Weights[4];"));
        assert!(text.contains("static var EMode Mode;"));
        assert!(text.contains("final function int Sum(int A, optional out int B)"));
        assert!(text.contains("return A + B;"));
        assert!(text.contains("event Touched()"));
    }

    #[test]
    fn control_flow_survives() {
        let text = round_trip(
            "class Test expands Object;
function int Loop(int N)
{
    local int I, Total;
    for (I = 0; I < N; I++)
    {
        if (I == 3)
            Total = Total + 1;
        else if (I == 7)
            break;
        Total = Total + I;
    }
    do
    {
        Total = Total * 2;
    } until (Total < 0)
    switch (N)
    {
        case 1:
            Total = 1;
            break;
        default:
            Total = 0;
    }
    return Total;
}
",
        );
        assert!(text.contains("local int I;"));
        assert!(text.contains("while (I < N)"));
        assert!(text.contains("else if (I == 7)"));
        assert!(text.contains("} until (Total < 0);"));
        assert!(text.contains("switch (N)"));
        assert!(text.contains("case 1:"));
        assert!(text.contains("default:"));
    }

    #[test]
    fn empty_else_branches_keep_their_jump() {
        let text = round_trip(
            "class Test expands Object;
function T()
{
    local int I;
    if (I < 1) { } else { }
    if (I < 1) { I++; } else { }
    if (I == 2) { }
}
",
        );
        assert_eq!(text.matches("else").count(), 2, "{text}");
        assert!(text.contains("if (I == 2)"));
    }

    #[test]
    fn casts_qualifiers_and_constants_survive() {
        let text = round_trip(
            "class Test expands Object;
enum EMode { M_Off, M_On };
var int Count;
var EMode Mode;
function Bump() { Count = Count + 1; }
function int T(Object O)
{
    local Test Other;
    local float F;
    local int I;
    local string S;
    local vector V;
    local rotator R;
    Other = Test(O);
    I = int(F);
    I = Default.Count;
    Global.Bump();
    V = vect(1.0, 2.5, 3.0);
    R = rot(1, 2, 3);
    S = \"say \\\"hi\\\"\\n\";
    switch (Mode)
    {
        case M_On:
            I = 1;
            break;
        case M_Off:
            I = 2;
    }
    return I;
}
",
        );
        assert!(text.contains("Other = Test(O);"));
        assert!(text.contains("I = Default.Count;"));
        assert!(text.contains("Global.Bump();"));
        assert!(text.contains("rot(1, 2, 3)"));
        assert!(text.contains(r#"S = "say \"hi\"\n";"#));
        assert!(text.contains("switch (Mode)"));
        assert!(text.contains("case M_On:"));
    }

    #[test]
    fn state_code_and_labels() {
        let text = round_trip(
            "class Test expands Object;
var int Ticks;
auto state Idle
{
    function Bump() { Ticks = 0; }
Begin:
    Ticks = Ticks + 1;
    if (!(Ticks < 10))
        goto Begin;
    goto ('Begin');
}
",
        );
        assert!(text.contains("auto state Idle"));
        assert!(text.contains("function Bump()"));
        assert!(text.contains("Begin:"));
        assert!(text.contains("goto Begin;"));
        assert!(text.contains("goto 'Begin';"));
    }

    #[test]
    fn uncompiled_class_is_refused() {
        let mut set = CompilationUnitSet::new(CompilerConfig::default());
        let id = set.add_class("Object", OBJECT).unwrap();
        assert!(matches!(set.decompile(id), Err(DecompileError::NotCompiled(_))));
    }
}
