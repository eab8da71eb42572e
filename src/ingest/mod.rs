//! Entity extraction from source files
//!
//! One file in, one [`FileExtraction`] out. The walker in [`extractor`] is
//! language-agnostic; per-language knowledge lives behind
//! [`syntax::LanguageSyntax`].

pub mod detect;
pub mod extractor;
pub mod java;
pub mod javascript;
pub mod pool;
pub mod python;
pub mod rust;
pub mod syntax;
pub mod typescript;

pub use detect::{default_extensions, detect_language, detect_language_with, Language};
pub use extractor::{extract_file, CallSite, FileExtraction};
pub use syntax::{identifier_text, syntax_for, LanguageSyntax};

use crate::graph::NodeId;

/// One level of lexical nesting that matters to the graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Function(NodeId),
    Class(NodeId),
}

/// Stack for tracking scope nesting during tree-sitter traversal
///
/// Owned by a single traversal. The walker pushes a frame when it enters a
/// function or class-like definition and pops it after the definition's
/// subtree has been visited.
///
/// # Example
/// ```rust
/// use meridian::graph::{NodeId, NodeType};
/// use meridian::ingest::{Scope, ScopeStack};
///
/// let mut stack = ScopeStack::new();
/// stack.push(Scope::Class(NodeId::entity(NodeType::Class, "a.py", "A")));
/// stack.push(Scope::Function(NodeId::function("a.py", "run")));
/// assert_eq!(stack.current_function(), Some(&NodeId::function("a.py", "run")));
/// assert!(stack.enclosing_class().is_none());
/// stack.pop();
/// assert!(stack.enclosing_class().is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ScopeStack {
    frames: Vec<Scope>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, scope: Scope) {
        self.frames.push(scope);
    }

    /// Pop the most recent frame, or `None` if the stack is empty
    pub fn pop(&mut self) -> Option<Scope> {
        self.frames.pop()
    }

    /// Innermost enclosing function, however deep
    pub fn current_function(&self) -> Option<&NodeId> {
        self.frames.iter().rev().find_map(|frame| match frame {
            Scope::Function(id) => Some(id),
            Scope::Class(_) => None,
        })
    }

    /// Class whose body directly encloses the current position
    ///
    /// A function nested inside a method is not a member of the method's
    /// class, so only the innermost frame counts.
    pub fn enclosing_class(&self) -> Option<&NodeId> {
        match self.frames.last() {
            Some(Scope::Class(id)) => Some(id),
            _ => None,
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
