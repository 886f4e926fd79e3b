//! Statement recovery.
//!
//! A body is first decoded into a flat list of statements with their
//! offsets, then rebuilt into nested source by matching the jump shape each
//! construct compiles to:
//!
//! ```text
//! if       JumpIfNot next; then; [Jump end;] next: [else] end:
//!          (an empty else keeps its Jump, with end == next)
//! while    top: JumpIfNot end; body; Jump top; end:
//! do       top: body; JumpIfNot top
//! switch   Switch end; (Case next; body)*; end:
//! foreach  Iterator end; body; IteratorNext; end: IteratorPop
//! ```
//!
//! A `for` loop compiles to the same bytes as its `while` form and comes
//! back as one.

use uscript_core::{PropType, Property};

use super::expr::CodeReader;
use super::{DecompileError, Result};
use crate::bytecode::{NO_TARGET, OpCode, header_len};
use crate::conversion::conversion_cost;

#[derive(Debug, Clone, PartialEq)]
pub(super) enum Stmt {
    Jump(u16),
    JumpIfNot { target: u16, cond: String },
    Switch { end: u16, value: String },
    Case { value: Option<String> },
    Iterator { end: u16, head: String },
    IteratorNext,
    IteratorPop,
    Return(Option<String>),
    Stop,
    GotoLabel(String),
    Assign { lhs: String, rhs: String },
    Expr(String),
}

#[derive(Debug, Clone)]
pub(super) struct Item {
    pub at: u16,
    pub stmt: Stmt,
}

/// A decoded body: statements, the label table, and the offset where the
/// statements stop.
#[derive(Debug, Default)]
pub(super) struct Body {
    pub items: Vec<Item>,
    pub labels: Vec<(String, u16)>,
    pub end: u16,
}

impl CodeReader<'_> {
    /// Decode every statement of the callable. `ret` is its return type.
    pub(super) fn decode_body(&self, ret: Option<&Property>) -> Result<Body> {
        let mut at = header_len(self.code).ok_or(DecompileError::Truncated { at: 0 })?;
        let mut body = Body::default();
        // (end, scrutinee type) of the switches around the current offset
        let mut switches: Vec<(u16, PropType)> = Vec::new();
        let bool_ty = Property::value(PropType::Bool);

        loop {
            let offset = u16::try_from(at).map_err(|_| DecompileError::Truncated { at })?;
            switches.retain(|(end, _)| *end > offset);
            let op = self.op(&mut at)?;
            let stmt = match op {
                OpCode::EndCode => {
                    body.end = offset;
                    break;
                }
                OpCode::LabelTable => {
                    body.end = offset;
                    loop {
                        let name_at = at;
                        let index = self.word(&mut at)?;
                        if index == NO_TARGET {
                            break;
                        }
                        at = name_at;
                        let name = self.name(&mut at)?.to_string();
                        let target = self.word(&mut at)?;
                        body.labels.push((name, target));
                    }
                    self.expect(&mut at, OpCode::EndCode)?;
                    break;
                }
                OpCode::Jump => Stmt::Jump(self.word(&mut at)?),
                OpCode::JumpIfNot => {
                    let target = self.word(&mut at)?;
                    let cond = self.expr(&mut at, Some(&bool_ty), None)?.text;
                    Stmt::JumpIfNot { target, cond }
                }
                OpCode::Switch => {
                    let end = self.word(&mut at)?;
                    let value = self.expr(&mut at, None, None)?;
                    switches.push((end, value.ty.clone()));
                    Stmt::Switch { end, value: value.text }
                }
                OpCode::Case => {
                    let next = self.word(&mut at)?;
                    let value = if next == NO_TARGET {
                        None
                    } else {
                        let scrutinee = switches.last().map(|(_, ty)| Property::value(ty.clone()));
                        Some(self.expr(&mut at, scrutinee.as_ref(), None)?.text)
                    };
                    Stmt::Case { value }
                }
                OpCode::Iterator => {
                    let head = self.expr(&mut at, None, None)?.text;
                    let end = self.word(&mut at)?;
                    Stmt::Iterator { end, head }
                }
                OpCode::IteratorNext => Stmt::IteratorNext,
                OpCode::IteratorPop => Stmt::IteratorPop,
                OpCode::Stop => Stmt::Stop,
                OpCode::Return => {
                    if self.peek(at)? == OpCode::Nothing {
                        at += 1;
                        Stmt::Return(None)
                    } else {
                        let ret = ret.map(|r| Property::value(r.ty.clone()));
                        Stmt::Return(Some(self.expr(&mut at, ret.as_ref(), None)?.text))
                    }
                }
                OpCode::GotoLabel => {
                    let name = self.expr(&mut at, Some(&Property::value(PropType::Name)), None)?;
                    Stmt::GotoLabel(name.text)
                }
                OpCode::Let | OpCode::LetBool => self.assignment(&mut at)?,
                _ => {
                    at = offset as usize;
                    Stmt::Expr(self.expr(&mut at, None, None)?.text)
                }
            };
            body.items.push(Item { at: offset, stmt });
        }
        Ok(body)
    }

    /// `Let <target> <value>`; the opcode has been read.
    fn assignment(&self, at: &mut usize) -> Result<Stmt> {
        let mut lhs = self.expr(at, None, None)?;
        let value_at = *at;
        let whole = Property::value(lhs.ty.clone());
        let mut rhs = self.expr(at, Some(&whole), None)?;

        if let Some((name, ty)) = lhs.zero_component()
            && !conversion_cost(&whole, &Property::value(rhs.ty.clone()), self.set).is_compatible()
        {
            lhs.select(name, ty.clone());
            *at = value_at;
            rhs = self.expr(at, Some(&Property::value(ty)), None)?;
        }
        Ok(Stmt::Assign { lhs: lhs.text, rhs: rhs.text })
    }
}

// =========================================
// Structuring
// =========================================

/// Rebuild `body` as indented source lines. `state_code` bodies end in
/// `Stop`, function bodies in `Return Nothing`.
pub(super) fn render(body: &Body, indent: usize, state_code: bool) -> Result<Vec<String>> {
    let last = body.items.last().ok_or(DecompileError::MissingEnd)?;
    let ends_right = match &last.stmt {
        Stmt::Stop => state_code,
        Stmt::Return(None) => !state_code,
        _ => false,
    };
    if !ends_right {
        return Err(DecompileError::MissingEnd);
    }

    let mut printer = Printer {
        body,
        printed: vec![false; body.labels.len()],
        lines: Vec::new(),
    };
    printer.region(0, last.at, indent, None, true)?;
    if let Some((name, _)) = body.labels.iter().zip(&printer.printed).find(|(_, done)| !**done).map(|(l, _)| l) {
        return Err(DecompileError::MisplacedLabel { name: name.clone() });
    }
    Ok(printer.lines)
}

struct Printer<'b> {
    body: &'b Body,
    printed: Vec<bool>,
    lines: Vec<String>,
}

impl Printer<'_> {
    fn line(&mut self, indent: usize, text: impl AsRef<str>) {
        self.lines.push(format!("{}{}", "    ".repeat(indent), text.as_ref()));
    }

    fn item(&self, index: usize) -> Result<&Item> {
        self.body.items.get(index).ok_or(DecompileError::MissingEnd)
    }

    /// Index of the statement at `offset`; the end offset maps past the last.
    fn index_of(&self, offset: u16, from: u16) -> Result<usize> {
        if offset == self.body.end {
            return Ok(self.body.items.len());
        }
        self.body
            .items
            .binary_search_by_key(&offset, |item| item.at)
            .map_err(|_| DecompileError::UnstructuredJump { at: from, target: offset })
    }

    /// Offset of the statement after `index`.
    fn next_offset(&self, index: usize) -> u16 {
        self.body.items.get(index + 1).map_or(self.body.end, |item| item.at)
    }

    fn labels_at(&mut self, offset: u16, indent: usize) {
        for k in 0..self.body.labels.len() {
            let (name, at) = &self.body.labels[k];
            if *at == offset && !self.printed[k] {
                self.printed[k] = true;
                let line = format!("{name}:");
                self.line(indent.saturating_sub(1), line);
            }
        }
    }

    fn has_label_at(&self, offset: u16) -> bool {
        self.body.labels.iter().any(|(_, at)| *at == offset)
    }

    fn label_for(&self, offset: u16) -> Option<&str> {
        self.body.labels.iter().find(|(_, at)| *at == offset).map(|(name, _)| name.as_str())
    }

    /// Statements from index `from` up to offset `to`.
    ///
    /// `brk` is where a `break` lands; `trailing` prints labels sitting at
    /// `to`, which only a region that owns its end may do.
    fn region(&mut self, from: usize, to: u16, indent: usize, brk: Option<u16>, trailing: bool) -> Result<()> {
        let mut i = from;
        while i < self.body.items.len() && self.body.items[i].at < to {
            self.labels_at(self.body.items[i].at, indent);
            i = self.statement(i, to, indent, brk)?;
        }
        if trailing {
            self.labels_at(to, indent);
        }
        Ok(())
    }

    /// Outermost `do` loop starting at item `i` and closing before `to`.
    fn do_loop_at(&self, i: usize, to: u16) -> Option<usize> {
        let start = self.body.items.get(i)?.at;
        self.body
            .items
            .iter()
            .enumerate()
            .skip(i)
            .filter(|(_, item)| item.at < to)
            .filter(|(_, item)| matches!(item.stmt, Stmt::JumpIfNot { target, .. } if target == start))
            .map(|(j, _)| j)
            .last()
    }

    /// Render the statement at item `i`; returns the index after it.
    fn statement(&mut self, i: usize, to: u16, indent: usize, brk: Option<u16>) -> Result<usize> {
        if let Some(j) = self.do_loop_at(i, to) {
            let Stmt::JumpIfNot { cond, .. } = &self.item(j)?.stmt else {
                return Err(DecompileError::MissingEnd);
            };
            let cond = cond.clone();
            let until = self.item(j)?.at;
            self.line(indent, "do");
            self.line(indent, "{");
            self.region(i, until, indent + 1, Some(self.next_offset(j)), true)?;
            self.line(indent, format!("}} until ({cond});"));
            return Ok(j + 1);
        }

        let item = self.item(i)?.clone();
        match item.stmt {
            Stmt::Jump(target) => {
                if Some(target) == brk {
                    self.line(indent, "break;");
                } else if let Some(label) = self.label_for(target) {
                    let text = format!("goto {label};");
                    self.line(indent, text);
                } else {
                    return Err(DecompileError::UnstructuredJump { at: item.at, target });
                }
            }
            Stmt::JumpIfNot { target, .. } if target > item.at => return self.conditional(i, to, indent, brk, ""),
            Stmt::JumpIfNot { target, .. } => return Err(DecompileError::UnstructuredJump { at: item.at, target }),
            Stmt::Switch { end, value } => {
                if end > to {
                    return Err(DecompileError::UnstructuredJump { at: item.at, target: end });
                }
                let after = self.index_of(end, item.at)?;
                self.line(indent, format!("switch ({value})"));
                self.line(indent, "{");
                self.region(i + 1, end, indent + 2, Some(end), false)?;
                self.line(indent, "}");
                return Ok(after);
            }
            Stmt::Case { value } => {
                let case_indent = indent.saturating_sub(1);
                match value {
                    Some(value) => self.line(case_indent, format!("case {value}:")),
                    None => {
                        let empty = self.body.items.get(i + 1).is_none_or(|next| next.at >= to);
                        if !empty {
                            self.line(case_indent, "default:");
                        }
                    }
                }
            }
            Stmt::Iterator { end, head } => {
                let pop = self.index_of(end, item.at)?;
                let well_formed = pop >= i + 2
                    && matches!(self.body.items.get(pop).map(|x| &x.stmt), Some(Stmt::IteratorPop))
                    && matches!(self.body.items[pop - 1].stmt, Stmt::IteratorNext);
                if !well_formed {
                    return Err(DecompileError::UnstructuredJump { at: item.at, target: end });
                }
                let next_at = self.body.items[pop - 1].at;
                self.line(indent, format!("foreach {head}"));
                self.line(indent, "{");
                self.region(i + 1, next_at, indent + 1, Some(end), true)?;
                self.line(indent, "}");
                return Ok(pop + 1);
            }
            // Pops before a `return` belong to it; the loop's own pop is consumed above.
            Stmt::IteratorNext | Stmt::IteratorPop => {}
            Stmt::Return(None) => self.line(indent, "return;"),
            Stmt::Return(Some(value)) => self.line(indent, format!("return {value};")),
            Stmt::Stop => self.line(indent, "stop;"),
            Stmt::GotoLabel(name) => {
                // a bare identifier would read as a label
                let text = if name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
                    format!("goto ({name});")
                } else {
                    format!("goto {name};")
                };
                self.line(indent, text);
            }
            Stmt::Assign { lhs, rhs } => self.line(indent, format!("{lhs} = {rhs};")),
            Stmt::Expr(text) => self.line(indent, format!("{text};")),
        }
        Ok(i + 1)
    }

    /// Where the `if` or `while` at item `i` ends, and whether it has an
    /// else branch (`Some(else start index)`) or is a loop.
    fn shape(&self, i: usize, to: u16, brk: Option<u16>) -> Result<Shape> {
        let item = self.item(i)?;
        let Stmt::JumpIfNot { target: next, .. } = item.stmt else {
            return Err(DecompileError::MissingEnd);
        };
        if next > to {
            return Err(DecompileError::UnstructuredJump { at: item.at, target: next });
        }
        let k = self.index_of(next, item.at)?;
        let before = (k > i + 1).then(|| &self.body.items[k - 1]);
        match before.map(|b| &b.stmt) {
            Some(Stmt::Jump(back)) if *back == item.at => Ok(Shape::While { next, k }),
            // `end == next` is an empty else branch
            Some(Stmt::Jump(end)) if *end >= next && *end <= to && Some(*end) != brk => Ok(Shape::IfElse { k, end: *end }),
            _ => Ok(Shape::If { next, k }),
        }
    }

    fn conditional(&mut self, i: usize, to: u16, indent: usize, brk: Option<u16>, prefix: &str) -> Result<usize> {
        let item = self.item(i)?.clone();
        let Stmt::JumpIfNot { cond, .. } = &item.stmt else {
            return Err(DecompileError::MissingEnd);
        };
        match self.shape(i, to, brk)? {
            Shape::While { next, k } => {
                let back_at = self.body.items[k - 1].at;
                self.line(indent, format!("{prefix}while ({cond})"));
                self.line(indent, "{");
                self.region(i + 1, back_at, indent + 1, Some(next), true)?;
                self.line(indent, "}");
                Ok(k)
            }
            Shape::If { next, k } => {
                self.line(indent, format!("{prefix}if ({cond})"));
                self.line(indent, "{");
                self.region(i + 1, next, indent + 1, brk, false)?;
                self.line(indent, "}");
                Ok(k)
            }
            Shape::IfElse { k, end } => {
                let exit_at = self.body.items[k - 1].at;
                self.line(indent, format!("{prefix}if ({cond})"));
                self.line(indent, "{");
                self.region(i + 1, exit_at, indent + 1, brk, true)?;
                self.line(indent, "}");
                let after = self.index_of(end, item.at)?;
                if self.is_else_if(k, end, brk)? {
                    self.conditional(k, end, indent, brk, "else ")?;
                } else {
                    self.line(indent, "else");
                    self.line(indent, "{");
                    self.region(k, end, indent + 1, brk, false)?;
                    self.line(indent, "}");
                }
                Ok(after)
            }
        }
    }

    /// The else branch from item `k` to `end` is a single `if` statement.
    fn is_else_if(&self, k: usize, end: u16, brk: Option<u16>) -> Result<bool> {
        let Some(item) = self.body.items.get(k).filter(|item| item.at < end) else {
            return Ok(false);
        };
        let forward = matches!(item.stmt, Stmt::JumpIfNot { target, .. } if target > item.at);
        if !forward || self.has_label_at(item.at) || self.do_loop_at(k, end).is_some() {
            return Ok(false);
        }
        Ok(match self.shape(k, end, brk)? {
            Shape::While { .. } => false,
            Shape::If { next, .. } => next == end,
            Shape::IfElse { end: inner, .. } => inner == end,
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum Shape {
    While { next: u16, k: usize },
    If { next: u16, k: usize },
    IfElse { k: usize, end: u16 },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(at: u16, stmt: Stmt) -> Item {
        Item { at, stmt }
    }

    fn expr(text: &str) -> Stmt {
        Stmt::Expr(text.to_string())
    }

    fn cond(target: u16, text: &str) -> Stmt {
        Stmt::JumpIfNot {
            target,
            cond: text.to_string(),
        }
    }

    #[test]
    fn while_loop_with_break() {
        let body = Body {
            items: vec![
                item(10, cond(30, "A")),
                item(16, expr("F()")),
                item(20, Stmt::Jump(30)),
                item(23, Stmt::Jump(10)),
                item(30, Stmt::Return(None)),
            ],
            labels: Vec::new(),
            end: 32,
        };
        let lines = render(&body, 1, false).unwrap();
        assert_eq!(
            lines,
            ["    while (A)", "    {", "        F();", "        break;", "    }"]
        );
    }

    #[test]
    fn else_if_chain() {
        let body = Body {
            items: vec![
                item(10, cond(20, "A")),
                item(14, expr("F()")),
                item(17, Stmt::Jump(40)),
                item(20, cond(30, "B")),
                item(24, expr("G()")),
                item(27, Stmt::Jump(40)),
                item(30, expr("H()")),
                item(40, Stmt::Return(None)),
            ],
            labels: Vec::new(),
            end: 42,
        };
        let lines = render(&body, 0, false).unwrap();
        assert_eq!(
            lines,
            ["if (A)", "{", "    F();", "}", "else if (B)", "{", "    G();", "}", "else", "{", "    H();", "}"]
        );
    }

    #[test]
    fn do_until_and_labels() {
        let body = Body {
            items: vec![
                item(5, expr("F()")),
                item(9, cond(5, "Done")),
                item(14, Stmt::Jump(5)),
                item(17, Stmt::Stop),
            ],
            labels: vec![("Begin".to_string(), 5)],
            end: 18,
        };
        let lines = render(&body, 1, true).unwrap();
        assert_eq!(
            lines,
            ["Begin:", "    do", "    {", "        F();", "    } until (Done);", "    goto Begin;"]
        );
    }

    #[test]
    fn jumps_that_fit_no_construct_are_rejected() {
        let body = Body {
            items: vec![item(5, Stmt::Jump(9)), item(8, expr("F()")), item(9, Stmt::Return(None))],
            labels: Vec::new(),
            end: 11,
        };
        assert!(matches!(
            render(&body, 1, false),
            Err(DecompileError::UnstructuredJump { at: 5, target: 9 })
        ));
    }

    #[test]
    fn body_must_end_with_its_implicit_return() {
        let body = Body {
            items: vec![item(5, Stmt::Stop)],
            labels: Vec::new(),
            end: 6,
        };
        assert!(matches!(render(&body, 1, false), Err(DecompileError::MissingEnd)));
    }
}
