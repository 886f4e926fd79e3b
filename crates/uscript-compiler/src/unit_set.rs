//! The set of classes compiled together.
//!
//! A [`CompilationUnitSet`] owns every class's source, symbols and code, and
//! a dependency graph whose edges run from a class to the classes it needs
//! (its parent, and any class its code referenced). Changing a class's
//! source invalidates it and, through the reversed graph, everything that
//! depends on it. [`compile_all`](CompilationUnitSet::compile_all) then
//! rebuilds the invalidated classes, ancestors first, with Pass 0 for all of
//! them before Pass 1 for any.

use petgraph::graph::{DiGraph, NodeIndex as GraphNode};
use petgraph::visit::{Bfs, EdgeRef, Reversed};
use petgraph::Direction;
use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};
use uscript_core::{ClassId, CompileError, NodeRef, SourceHash, Span};
use uscript_parser::Lexer;

use crate::bytecode::NamePool;
use crate::compiler::{ClassCompiler, CompiledParts};
use crate::config::CompilerConfig;
use crate::decompiler::Decompiler;
use crate::sink::{HostCommands, LogSink, NullHost};
use crate::symbols::{ClassFlags, ClassSymbols, ClassTable};

/// Bytecode of every callable of a class, back to back, plus the names
/// their operands refer to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassCode {
    pub bytes: Vec<u8>,
    pub names: NamePool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassStatus {
    /// Needs Pass 0.
    Unparsed,
    /// Pass 0 done; symbols are complete, code is not.
    Declared,
    Compiled,
    /// Last attempt failed and was rolled back.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    Parent,
    Reference,
}

#[derive(Debug, Clone)]
pub struct ClassUnit {
    name: String,
    source: String,
    hash: SourceHash,
    parent_name: Option<String>,
    pub(crate) symbols: ClassSymbols,
    pub(crate) code: ClassCode,
    status: ClassStatus,
    last_error: Option<CompileError>,
    /// State restored when a compile fails.
    snapshot: Option<(ClassSymbols, ClassCode)>,
}

impl ClassUnit {
    fn new(name: &str, source: String) -> Self {
        let parent_name = scan_header(&source).and_then(|(_, parent)| parent);
        Self {
            name: name.to_string(),
            hash: SourceHash::of(&source),
            source,
            parent_name,
            symbols: ClassSymbols::new(name, Span::default()),
            code: ClassCode::default(),
            status: ClassStatus::Unparsed,
            last_error: None,
            snapshot: None,
        }
    }

    fn reset(&mut self) {
        self.symbols = ClassSymbols::new(self.name.as_str(), Span::default());
        self.code = ClassCode::default();
        self.status = ClassStatus::Unparsed;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn source_hash(&self) -> SourceHash {
        self.hash
    }

    pub fn parent_name(&self) -> Option<&str> {
        self.parent_name.as_deref()
    }

    pub fn symbols(&self) -> &ClassSymbols {
        &self.symbols
    }

    pub fn code(&self) -> &ClassCode {
        &self.code
    }

    pub fn status(&self) -> ClassStatus {
        self.status
    }

    pub fn last_error(&self) -> Option<&CompileError> {
        self.last_error.as_ref()
    }
}

/// Outcome of a [`compile_all`](CompilationUnitSet::compile_all) run.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub compiled: Vec<String>,
    pub failed: Vec<(String, CompileError)>,
    /// Classes whose decompiled source did not recompile to identical code.
    pub round_trip_mismatches: Vec<String>,
}

impl BuildReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.round_trip_mismatches.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompilationUnitSet {
    units: Vec<ClassUnit>,
    by_name: FxHashMap<String, ClassId>,
    graph: DiGraph<ClassId, DependencyKind>,
    config: CompilerConfig,
}

impl CompilationUnitSet {
    pub fn new(config: CompilerConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Register a class. Its parent may be added before or after it.
    pub fn add_class(&mut self, name: &str, source: impl Into<String>) -> Result<ClassId, CompileError> {
        let key = name.to_ascii_lowercase();
        if self.by_name.contains_key(&key) {
            return Err(CompileError::Redefinition {
                name: name.to_string(),
                message: "is already part of the build".into(),
                span: Span::default(),
            });
        }
        let id = ClassId(self.units.len() as u32);
        self.units.push(ClassUnit::new(name, source.into()));
        self.by_name.insert(key, id);
        self.graph.add_node(id);
        self.link_parents();
        debug!(class = name, id = id.0, "added class");
        Ok(id)
    }

    /// Replace a class's source. Returns every class invalidated as a
    /// result, empty when the text is unchanged.
    pub fn set_source(&mut self, id: ClassId, source: impl Into<String>) -> Vec<ClassId> {
        let source = source.into();
        let hash = SourceHash::of(&source);
        let Some(unit) = self.units.get_mut(id.index()) else {
            return Vec::new();
        };
        if unit.hash == hash {
            return Vec::new();
        }
        unit.parent_name = scan_header(&source).and_then(|(_, parent)| parent);
        unit.source = source;
        unit.hash = hash;

        let invalidated = self.invalidate(id);
        let node = graph_node(id);
        self.graph.retain_edges(|g, e| g.edge_endpoints(e).is_none_or(|(from, _)| from != node));
        self.link_parents();
        invalidated
    }

    /// Mark `id` and everything depending on it, transitively, as needing
    /// both passes again.
    pub fn invalidate(&mut self, id: ClassId) -> Vec<ClassId> {
        if id.index() >= self.units.len() {
            return Vec::new();
        }
        let reversed = Reversed(&self.graph);
        let mut bfs = Bfs::new(reversed, graph_node(id));
        let mut invalidated = Vec::new();
        while let Some(node) = bfs.next(reversed) {
            invalidated.push(self.graph[node]);
        }
        for &class in &invalidated {
            self.units[class.index()].reset();
        }
        info!(
            class = %self.units[id.index()].name,
            count = invalidated.len(),
            "invalidated classes"
        );
        invalidated
    }

    pub fn unit(&self, id: ClassId) -> Option<&ClassUnit> {
        self.units.get(id.index())
    }

    pub fn units(&self) -> impl Iterator<Item = (ClassId, &ClassUnit)> {
        self.units.iter().enumerate().map(|(i, u)| (ClassId(i as u32), u))
    }

    pub fn status(&self, id: ClassId) -> Option<ClassStatus> {
        self.unit(id).map(ClassUnit::status)
    }

    /// Classes with a direct edge to `id`.
    pub fn dependents(&self, id: ClassId) -> Vec<ClassId> {
        self.neighbors(id, Direction::Incoming)
    }

    /// Classes `id` has a direct edge to.
    pub fn dependencies(&self, id: ClassId) -> Vec<ClassId> {
        self.neighbors(id, Direction::Outgoing)
    }

    fn neighbors(&self, id: ClassId, direction: Direction) -> Vec<ClassId> {
        if id.index() >= self.units.len() {
            return Vec::new();
        }
        let mut found: Vec<ClassId> = self
            .graph
            .neighbors_directed(graph_node(id), direction)
            .map(|n| self.graph[n])
            .collect();
        found.sort();
        found.dedup();
        found
    }

    /// Compiled bytes of one callable, header through `EndCode`.
    pub fn callable_code(&self, node: NodeRef) -> Option<&[u8]> {
        let unit = self.unit(node.class)?;
        let range = unit.symbols.node(node.node)?.code?;
        unit.code.bytes.get(range.as_range())
    }

    /// Function, operator or state declared directly by `class`.
    pub fn find_node(&self, class: ClassId, name: &str) -> Option<NodeRef> {
        let symbols = &self.unit(class)?.symbols;
        symbols
            .nodes
            .iter()
            .skip(1)
            .position(|n| n.is_named(name))
            .map(|i| NodeRef::new(class, uscript_core::NodeIndex((i + 1) as u16)))
    }

    /// Reconstruct the source of a compiled class.
    pub fn decompile(&self, id: ClassId) -> Result<String, crate::decompiler::DecompileError> {
        Decompiler::new(self, id).decompile_class()
    }

    // =========================================
    // Building
    // =========================================

    /// Compile every class that is not up to date.
    ///
    /// A failing class is rolled back and reported, and the build goes on,
    /// unless the set is in bootstrap mode, where the first error is
    /// returned. Code is committed only once the whole build has run: a
    /// class whose code reaches a class that failed is rolled back too.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn compile_all(
        &mut self,
        host: &mut dyn HostCommands,
        log: &mut dyn LogSink,
    ) -> Result<BuildReport, CompileError> {
        let mut report = BuildReport::default();
        let order = self.build_order();
        info!(classes = order.len(), "starting build");

        let mut declared = Vec::with_capacity(order.len());
        for id in order {
            match self.run_declaration(id, host) {
                Ok(()) => declared.push(id),
                Err(err) => self.fail(id, err, &mut report, log)?,
            }
        }

        let mut compiled = Vec::with_capacity(declared.len());
        for id in declared {
            if let Some(parent) = self.failed_ancestor(id) {
                let err = CompileError::ParentFailed {
                    class: self.units[id.index()].name.clone(),
                    parent,
                };
                self.fail(id, err, &mut report, log)?;
                continue;
            }
            match self.run_compilation(id) {
                Ok(()) => {
                    self.units[id.index()].status = ClassStatus::Compiled;
                    compiled.push(id);
                }
                Err(err) => self.fail(id, err, &mut report, log)?,
            }
        }

        self.fail_dependents(&compiled, &mut report, log)?;

        for id in compiled {
            let unit = &mut self.units[id.index()];
            if unit.status != ClassStatus::Compiled {
                continue;
            }
            unit.last_error = None;
            unit.snapshot = None;
            info!(class = %unit.name, bytes = unit.code.bytes.len(), "compiled class");
            report.compiled.push(unit.name.clone());
            self.after_compile(id, &mut report, log);
        }
        Ok(report)
    }

    /// Roll back every class of `compiled` that depends, directly or
    /// through other classes, on a class that failed.
    fn fail_dependents(
        &mut self,
        compiled: &[ClassId],
        report: &mut BuildReport,
        log: &mut dyn LogSink,
    ) -> Result<(), CompileError> {
        let failed: Vec<ClassId> = self
            .units()
            .filter(|(_, unit)| unit.status == ClassStatus::Failed)
            .map(|(id, _)| id)
            .collect();

        let mut victims: Vec<(ClassId, ClassId)> = Vec::new();
        let reversed = Reversed(&self.graph);
        for source in failed {
            let mut bfs = Bfs::new(reversed, graph_node(source));
            while let Some(node) = bfs.next(reversed) {
                let id = self.graph[node];
                if compiled.contains(&id) && !victims.iter().any(|(v, _)| *v == id) {
                    victims.push((id, source));
                }
            }
        }

        for (id, source) in victims {
            let err = CompileError::DependencyFailed {
                class: self.units[id.index()].name.clone(),
                dependency: self.units[source.index()].name.clone(),
            };
            self.fail(id, err, report, log)?;
        }
        Ok(())
    }

    /// Classes needing work, ancestors before descendants.
    fn build_order(&self) -> Vec<ClassId> {
        let mut order: Vec<(usize, ClassId)> = self
            .units()
            .filter(|(_, u)| u.status != ClassStatus::Compiled)
            .map(|(id, _)| (self.depth(id), id))
            .collect();
        order.sort();
        order.into_iter().map(|(_, id)| id).collect()
    }

    /// Number of ancestors, following declared parent names.
    fn depth(&self, id: ClassId) -> usize {
        let mut depth = 0;
        let mut current = id;
        while let Some(parent) = self.units[current.index()]
            .parent_name
            .as_deref()
            .and_then(|p| self.find_class(p))
        {
            depth += 1;
            if depth > self.units.len() {
                break;
            }
            current = parent;
        }
        depth
    }

    fn failed_ancestor(&self, id: ClassId) -> Option<String> {
        self.ancestry(id)
            .into_iter()
            .skip(1)
            .find(|&a| self.units[a.index()].status == ClassStatus::Failed)
            .map(|a| self.units[a.index()].name.clone())
    }

    fn run_declaration(&mut self, id: ClassId, host: &mut dyn HostCommands) -> Result<(), CompileError> {
        let unit = &mut self.units[id.index()];
        unit.snapshot = Some((unit.symbols.clone(), unit.code.clone()));
        unit.reset();
        let name = unit.name.clone();

        if let Some(parent_name) = unit.parent_name.clone() {
            let parent = self
                .find_class(&parent_name)
                .ok_or(CompileError::UnknownClass { name: parent_name })?;
            let parent_unit = &self.units[parent.index()];
            if matches!(parent_unit.status, ClassStatus::Unparsed | ClassStatus::Failed) && parent != id {
                return Err(CompileError::ParentFailed {
                    class: name,
                    parent: parent_unit.name.clone(),
                });
            }
        }

        let parts = self.with_compiler(id, |c| c.declare_class())?;
        for (command, span) in parts.exec_commands {
            debug!(class = %name, command = %command, "forwarding #exec");
            host.exec(&name, &command)
                .map_err(|message| CompileError::Directive { message, span })?;
        }
        let unit = &mut self.units[id.index()];
        unit.status = ClassStatus::Declared;
        debug!(class = %name, hash = unit.hash.0, "pass 0 complete");
        Ok(())
    }

    fn run_compilation(&mut self, id: ClassId) -> Result<(), CompileError> {
        let parts = self.with_compiler(id, |c| c.compile_bodies())?;
        let node = graph_node(id);
        for dep in parts.dependencies {
            let target = graph_node(dep);
            if self.graph.find_edge(node, target).is_none() {
                self.graph.add_edge(node, target, DependencyKind::Reference);
            }
        }
        Ok(())
    }

    /// Run `pass` on a compiler holding `id`'s symbols and code, then put
    /// them back whether or not it succeeded.
    fn with_compiler(
        &mut self,
        id: ClassId,
        pass: impl FnOnce(&mut ClassCompiler<'_>) -> Result<(), CompileError>,
    ) -> Result<CompiledParts, CompileError> {
        let i = id.index();
        let symbols = std::mem::take(&mut self.units[i].symbols);
        let code = std::mem::take(&mut self.units[i].code);

        let (result, mut parts) = {
            let set: &CompilationUnitSet = self;
            let mut compiler = ClassCompiler::new(set, id, &set.units[i].source, symbols, code, &set.config);
            let result = pass(&mut compiler);
            (result, compiler.finish())
        };

        let unit = &mut self.units[i];
        unit.symbols = std::mem::take(&mut parts.symbols);
        unit.code = std::mem::take(&mut parts.code);
        result.map(|()| parts)
    }

    /// Roll a class back and report its error.
    fn fail(
        &mut self,
        id: ClassId,
        err: CompileError,
        report: &mut BuildReport,
        log: &mut dyn LogSink,
    ) -> Result<(), CompileError> {
        let unit = &mut self.units[id.index()];
        match unit.snapshot.take() {
            Some((symbols, code)) => {
                unit.symbols = symbols;
                unit.code = code;
            }
            None => unit.reset(),
        }
        unit.status = ClassStatus::Failed;
        unit.last_error = Some(err.clone());
        warn!(class = %unit.name, line = err.line(), error = %err, "class failed, rolled back");
        log.log(&format!("{}({}): {}", unit.name, err.line(), err));
        report.failed.push((unit.name.clone(), err.clone()));
        if self.config.bootstrap {
            return Err(err);
        }
        Ok(())
    }

    fn after_compile(&self, id: ClassId, report: &mut BuildReport, log: &mut dyn LogSink) {
        let unit = &self.units[id.index()];
        if self.config.decompile_all || unit.symbols.flags.contains(ClassFlags::DECOMPILE) {
            match self.decompile(id) {
                Ok(text) => text.lines().for_each(|line| log.log(line)),
                Err(err) => log.log(&format!("{}: decompile failed: {err}", unit.name)),
            }
        }
        if self.config.verify_round_trip {
            let matches = match self.verify_round_trip(id) {
                Ok(matches) => matches,
                Err(err) => {
                    log.log(&format!("{}: round trip failed: {err}", unit.name));
                    false
                }
            };
            if !matches {
                warn!(class = %unit.name, "decompiled source does not recompile to identical code");
                log.log(&format!("{}: round trip mismatch", unit.name));
                report.round_trip_mismatches.push(unit.name.clone());
            }
        }
    }

    /// Decompile `id`, recompile the text in a scratch copy of the set and
    /// compare the resulting code and name pool.
    pub fn verify_round_trip(&self, id: ClassId) -> Result<bool, CompileError> {
        let text = self
            .decompile(id)
            .map_err(|e| CompileError::internal(format!("decompile failed: {e}")))?;
        let mut scratch = self.clone();
        scratch.config = CompilerConfig {
            bootstrap: false,
            decompile_all: false,
            verify_round_trip: false,
            ..self.config.clone()
        };
        scratch.set_source(id, text);
        let report = scratch.compile_all(&mut NullHost, &mut Vec::new())?;
        let name = &self.units[id.index()].name;
        if let Some((_, err)) = report.failed.into_iter().find(|(failed, _)| failed == name) {
            return Err(err);
        }
        Ok(scratch.units[id.index()].code == self.units[id.index()].code)
    }

    /// Parent edges for every class whose parent is in the set.
    fn link_parents(&mut self) {
        for i in 0..self.units.len() {
            let Some(parent) = self.units[i].parent_name.as_deref().and_then(|p| self.find_class(p)) else {
                continue;
            };
            let (child, parent) = (graph_node(ClassId(i as u32)), graph_node(parent));
            if child != parent && self.graph.find_edge(child, parent).is_none() {
                self.graph.add_edge(child, parent, DependencyKind::Parent);
            }
        }
    }

    /// Edges out of `id`, with their kinds.
    pub fn dependency_edges(&self, id: ClassId) -> Vec<(ClassId, DependencyKind)> {
        if id.index() >= self.units.len() {
            return Vec::new();
        }
        self.graph
            .edges(graph_node(id))
            .map(|e| (self.graph[e.target()], *e.weight()))
            .collect()
    }
}

impl ClassTable for CompilationUnitSet {
    fn symbols(&self, class: ClassId) -> &ClassSymbols {
        &self.units[class.index()].symbols
    }

    fn find_class(&self, name: &str) -> Option<ClassId> {
        self.by_name.get(&name.to_ascii_lowercase()).copied()
    }

    fn class_count(&self) -> usize {
        self.units.len()
    }
}

#[inline]
fn graph_node(id: ClassId) -> GraphNode {
    GraphNode::new(id.index())
}

/// `(name, parent)` from a class header, skipping directives and comments.
fn scan_header(source: &str) -> Option<(String, Option<String>)> {
    let mut lexer = Lexer::new(source);
    loop {
        let token = lexer.next_token(None, false).ok()?;
        if token.is_eof() {
            return None;
        }
        if token.is_symbol("#") {
            lexer.rest_of_line();
            continue;
        }
        if !token.is_ident("class") {
            continue;
        }
        let name = lexer.next_token(None, false).ok()?.ident()?.to_string();
        let keyword = lexer.next_token(None, false).ok()?;
        if !(keyword.is_ident("expands") || keyword.is_ident("extends")) {
            return Some((name, None));
        }
        let parent = lexer.next_token(None, false).ok()?.ident().map(str::to_string);
        return Some((name, parent));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_scan_finds_parent_past_directives() {
        let source = "#exec texture import class=Foo\n// class Nope\nclass Pawn expands Actor intrinsic;";
        assert_eq!(scan_header(source), Some(("Pawn".into(), Some("Actor".into()))));
        assert_eq!(scan_header("class Object;"), Some(("Object".into(), None)));
        assert_eq!(scan_header("var int X;"), None);
    }

    #[test]
    fn duplicate_class_is_rejected() {
        let mut set = CompilationUnitSet::default();
        set.add_class("Object", "class Object;").unwrap();
        assert!(set.add_class("object", "class Object;").is_err());
    }

    #[test]
    fn parent_edges_link_in_either_order() {
        let mut set = CompilationUnitSet::default();
        let pawn = set.add_class("Pawn", "class Pawn expands Actor;").unwrap();
        let actor = set.add_class("Actor", "class Actor;").unwrap();
        assert_eq!(set.dependencies(pawn), vec![actor]);
        assert_eq!(set.dependents(actor), vec![pawn]);
        assert_eq!(set.dependency_edges(pawn), vec![(actor, DependencyKind::Parent)]);
    }

    #[test]
    fn unchanged_source_invalidates_nothing() {
        let mut set = CompilationUnitSet::default();
        let a = set.add_class("A", "class A;").unwrap();
        assert!(set.set_source(a, "class A;").is_empty());
        assert_eq!(set.set_source(a, "class A abstract;"), vec![a]);
    }

    #[test]
    fn build_order_puts_ancestors_first() {
        let mut set = CompilationUnitSet::default();
        let c = set.add_class("C", "class C expands B;").unwrap();
        let b = set.add_class("B", "class B expands A;").unwrap();
        let a = set.add_class("A", "class A;").unwrap();
        assert_eq!(set.build_order(), vec![a, b, c]);
    }
}
