//! Pass 1: bodies.
//!
//! Callable layout:
//! ```text
//!   u8 param count
//!   (u16 size, u8 flags) * count
//!   u16 frame size           ; patched once all locals are known
//!   <statements>
//!   Return Nothing | Stop    ; implicit end of function | state code
//!   [LabelTable (u16 name, u16 offset)* u16 0xFFFF]
//!   EndCode
//! ```

use tracing::debug;
use uscript_core::{CompileError, NodeIndex, PropertyFlags, Span};

use crate::bytecode::{NO_TARGET, OpCode, param_flags};
use crate::compiler::{ClassCompiler, Result};
use crate::emit::FixupKind;
use crate::scope::{NestFrame, NestKind};
use crate::symbols::{CodeRange, NodeFlags, NodeKind};

impl ClassCompiler<'_> {
    /// Compile every function body and every block of state code.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub(crate) fn compile_bodies(&mut self) -> Result<()> {
        self.scopes.push(NestKind::Class, Some(NodeIndex::CLASS), Span::default())?;
        for i in 1..self.symbols.nodes.len() {
            let index = NodeIndex(i as u16);
            let Some(node) = self.symbols.node(index) else { continue };
            if node.body.is_none() {
                continue;
            }
            let kind = if node.kind == NodeKind::State { NestKind::State } else { NestKind::Function };
            self.compile_definition(index, kind)?;
        }
        self.scopes.pop();
        Ok(())
    }

    fn compile_definition(&mut self, index: NodeIndex, kind: NestKind) -> Result<()> {
        let node = self
            .symbols
            .node(index)
            .cloned()
            .ok_or_else(|| CompileError::internal("missing node"))?;
        let Some(body) = node.body else {
            return Ok(());
        };
        self.lexer.seek(body);

        let entry = self.code.begin_callable();
        let params = self.symbols.param_props(index);
        let count = u8::try_from(params.len())
            .map_err(|_| CompileError::semantic(format!("'{}' has too many parameters", node.name), node.span))?;
        self.code.emit_u8(count);
        for param in &params {
            let mut flags = 0;
            if param.flags.contains(PropertyFlags::OUT_PARM) {
                flags |= param_flags::OUT;
            }
            if param.flags.contains(PropertyFlags::OPTIONAL_PARM) {
                flags |= param_flags::OPTIONAL;
            }
            if param.flags.contains(PropertyFlags::COERCE_PARM) {
                flags |= param_flags::COERCE;
            }
            self.code.emit_u16(param.size());
            self.code.emit_u8(flags);
        }
        let frame_size_at = self.code.placeholder();

        self.scopes.push(kind, Some(index), node.span)?;
        if kind == NestKind::State {
            while !self.match_symbol("}")? {
                self.compile_statement()?;
            }
            self.code.emit_op(OpCode::Stop);
        } else {
            self.compile_block()?;
            self.code.emit_op(OpCode::Return);
            self.code.emit_op(OpCode::Nothing);
        }
        let frame = self
            .scopes
            .pop()
            .ok_or_else(|| CompileError::internal("scope stack underflow"))?;
        self.close_definition(frame)?;
        self.code.emit_op(OpCode::EndCode);

        let frame_size = self.symbols.node(index).map(|n| n.frame_size).unwrap_or(0);
        self.code.patch_u16(frame_size_at, frame_size);

        let len = self.code.len() - entry;
        if len > self.config.max_code_size {
            return Err(self.code_overflow(node.span));
        }
        let range = CodeRange {
            start: entry as u32,
            len: len as u32,
        };
        if let Some(node) = self.symbols.node_mut(index) {
            node.code = Some(range);
            node.flags |= NodeFlags::DEFINED;
        }
        debug!(class = %self.symbols.name, callable = %node.name, bytes = len, "compiled body");
        Ok(())
    }

    /// Resolve compile-time gotos and emit the label table.
    fn close_definition(&mut self, frame: NestFrame) -> Result<()> {
        for request in &frame.requests {
            let FixupKind::Goto(name) = &request.kind else {
                return Err(CompileError::internal("unresolved break at end of definition"));
            };
            let label = frame
                .labels
                .iter()
                .find(|l| l.name.eq_ignore_ascii_case(name))
                .ok_or_else(|| CompileError::UnresolvedLabel {
                    name: name.clone(),
                    span: request.span,
                })?;
            self.code.patch_u16(request.at, label.offset);
        }

        if frame.labels.is_empty() {
            return Ok(());
        }
        self.code.emit_op(OpCode::LabelTable);
        for label in &frame.labels {
            let name = self.intern(&label.name, label.span)?;
            self.code.emit_u16(name);
            self.code.emit_u16(label.offset);
        }
        self.code.emit_u16(NO_TARGET);
        Ok(())
    }
}
