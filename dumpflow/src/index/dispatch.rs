use log::trace;

use super::attributes::Attributes;
use super::context::Context;
use super::node::Node;
use crate::error::{Error, ErrorKind, ErrorOrigin, Result};

struct OpenElement {
    node: Node,
    name: String,
}

/// Drives element events against a stack of nodes.
///
/// The stack is seeded with the root node, every start event pushes the node the
/// current top returns for the child and every end event pops and finishes one node.
/// Text is buffered and handed to the top node once, right before the next start or
/// end event.
pub(crate) struct ElementDispatcher {
    stack: Vec<OpenElement>,
    text: String,
}

impl ElementDispatcher {
    pub fn new() -> Self {
        Self {
            stack: vec![OpenElement {
                node: Node::Root,
                name: String::new(),
            }],
            text: String::new(),
        }
    }

    /// Number of open elements, not counting the root node.
    pub fn depth(&self) -> usize {
        self.stack.len() - 1
    }

    pub fn start_element(&mut self, ctx: &mut Context, attrs: &Attributes) -> Result<()> {
        self.flush_text(ctx)?;

        let top = self.top()?;
        trace!("<{}> in <{}>", attrs.element(), top.name);
        let node = top.node.accept_child(ctx, &top.name, attrs)?;

        self.stack.push(OpenElement {
            node,
            name: attrs.element().to_string(),
        });
        Ok(())
    }

    pub fn text(&mut self, text: &str) {
        self.text.push_str(text);
    }

    pub fn end_element(&mut self, ctx: &mut Context) -> Result<()> {
        self.flush_text(ctx)?;

        if self.stack.len() <= 1 {
            return Err(Error(ErrorOrigin::Dispatch, ErrorKind::MalformedDocument)
                .log_error("end of an element that was never started"));
        }

        match self.stack.pop() {
            Some(element) => {
                trace!("</{}>", element.name);
                element.node.finished(ctx)
            }
            None => Ok(()),
        }
    }

    /// Finishes the root node once the document is exhausted.
    pub fn finish(mut self, ctx: &mut Context) -> Result<()> {
        self.flush_text(ctx)?;

        if self.stack.len() != 1 {
            return Err(Error(ErrorOrigin::Dispatch, ErrorKind::MalformedDocument)
                .log_error(format!("{} elements left open", self.depth())));
        }

        match self.stack.pop() {
            Some(root) => root.node.finished(ctx),
            None => Ok(()),
        }
    }

    fn top(&self) -> Result<&OpenElement> {
        self.stack
            .last()
            .ok_or(Error(ErrorOrigin::Dispatch, ErrorKind::Unknown))
    }

    fn flush_text(&mut self, ctx: &mut Context) -> Result<()> {
        if self.text.is_empty() {
            return Ok(());
        }

        let text = std::mem::take(&mut self.text);
        if text.trim().is_empty() {
            return Ok(());
        }

        match self.stack.last_mut() {
            Some(top) => top.node.text(ctx, &text),
            None => Ok(()),
        }
    }
}
