//! Parse context
//!
//! All mutable parsing state that must survive across nested grammar calls —
//! recursion depth and the set of byte offsets already visited — lives in one
//! explicit value threaded through every parse function. Nothing is hidden in
//! process-wide state.

use super::{ParseError, ParseResult};
use std::collections::HashSet;

/// Maximum grammar recursion depth
pub const MAX_RECURSION_DEPTH: usize = 1000;

/// Per-operation parsing context: recursion depth cap plus visited byte
/// offsets for loop detection while walking xref chains and object bodies.
#[derive(Debug)]
pub struct ParseContext {
    depth: usize,
    max_depth: usize,
    visited_offsets: HashSet<u64>,
}

impl Default for ParseContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ParseContext {
    pub fn new() -> Self {
        Self::with_max_depth(MAX_RECURSION_DEPTH)
    }

    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            depth: 0,
            max_depth,
            visited_offsets: HashSet::new(),
        }
    }

    /// Enter a nesting level, failing once the cap is hit
    pub fn enter(&mut self) -> ParseResult<()> {
        if self.depth + 1 > self.max_depth {
            return Err(ParseError::MaxDepthExceeded(self.max_depth));
        }
        self.depth += 1;
        Ok(())
    }

    /// Leave a nesting level
    pub fn exit(&mut self) {
        if self.depth > 0 {
            self.depth -= 1;
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Record a byte offset; returns false if it was already visited
    pub fn visit_offset(&mut self, offset: u64) -> bool {
        self.visited_offsets.insert(offset)
    }

    /// Forget a byte offset once its object finished parsing
    pub fn leave_offset(&mut self, offset: u64) {
        self.visited_offsets.remove(&offset);
    }
}

/// RAII guard pairing [`ParseContext::enter`] with `exit`
pub struct DepthGuard<'a> {
    context: &'a mut ParseContext,
}

impl<'a> DepthGuard<'a> {
    pub fn new(context: &'a mut ParseContext) -> ParseResult<Self> {
        context.enter()?;
        Ok(Self { context })
    }

    /// Access the guarded context for nested calls
    pub fn context(&mut self) -> &mut ParseContext {
        self.context
    }
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.context.exit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_limit() {
        let mut ctx = ParseContext::with_max_depth(3);
        assert!(ctx.enter().is_ok());
        assert!(ctx.enter().is_ok());
        assert!(ctx.enter().is_ok());
        assert!(matches!(ctx.enter(), Err(ParseError::MaxDepthExceeded(3))));
        ctx.exit();
        assert!(ctx.enter().is_ok());
    }

    #[test]
    fn test_visited_offsets() {
        let mut ctx = ParseContext::new();
        assert!(ctx.visit_offset(100));
        assert!(!ctx.visit_offset(100));
        ctx.leave_offset(100);
        assert!(ctx.visit_offset(100));
    }

    #[test]
    fn test_depth_guard_unwinds() {
        let mut ctx = ParseContext::new();
        {
            let _guard = DepthGuard::new(&mut ctx).unwrap();
        }
        assert_eq!(ctx.depth(), 0);
    }
}
