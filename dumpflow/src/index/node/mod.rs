/*!
Per-element nodes.

Every element of the index maps to one [`Node`] variant. Opening an element builds
its entity from the attributes and registers it, the variant keeps whatever the
element's children need to find their parent again. Which children an element
accepts is decided in [`Node::accept_child`], anything not listed there becomes
[`Node::Unexpected`].
*/

mod class;
mod header;
mod heap;
mod process;
mod root;
mod runtime;
mod thread;

use log::{debug, warn};

use super::attributes::Attributes;
use super::context::Context;
use super::{resolve, ReportedError};
use crate::error::{Error, ErrorKind, ErrorOrigin, Result};
use crate::model::{FaultRecord, HeapShape};

/// Entity an `objects` or `constantpool` list appends to.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum ObjectList {
    Region { heap: usize, region: usize },
    ConstantPool { class: usize },
    Frame { thread: usize, frame: usize },
}

#[derive(Debug)]
pub(crate) enum Node {
    /// Document level, finishing it runs the resolution pass.
    Root,
    Header,
    Process,
    Library,
    Fault(FaultRecord),
    Runtime,
    VmInitArgs,
    VmOption,
    ClassLoader { loader: usize },
    CachedClass,
    Class { class: usize },
    Field,
    StaticField,
    Method,
    Heap { heap: usize, shape: HeapShape },
    Region { heap: usize, region: usize },
    Objects(ObjectList),
    Object,
    Monitor,
    Thread { thread: usize },
    Stack { thread: usize },
    Frame { thread: usize, frame: usize },
    GcRoot,
    /// An `error` element written by the extraction tool.
    Error { parent: String, message: String },
    /// An element not expected at this position, its subtree is skipped.
    Unexpected,
}

impl Node {
    /// Builds the node for a child element named by `attrs`.
    pub fn accept_child(&self, ctx: &mut Context, parent: &str, attrs: &Attributes) -> Result<Node> {
        match (self, attrs.element()) {
            (_, "error") => Ok(Node::Error {
                parent: parent.to_string(),
                message: String::new(),
            }),

            (Node::Root, "j9dump") => header::open(ctx, attrs),

            (Node::Header, "process") => process::open(ctx, attrs),
            (Node::Header, "gpf") => process::open_fault(ctx, attrs),
            (Node::Header, "javavm") => runtime::open(ctx, attrs),
            (Node::Process, "library") => process::open_library(ctx, attrs),

            (Node::Runtime, "vminitargs") => runtime::open_init_args(ctx, attrs),
            (Node::Runtime, "heap") => heap::open(ctx, attrs),
            (Node::Runtime, "classloader") => class::open_loader(ctx, attrs),
            (Node::Runtime, "class") => class::open(ctx, attrs, false),
            (Node::Runtime, "arrayclass") => class::open(ctx, attrs, true),
            (Node::Runtime, "monitor") => thread::open_monitor(ctx, attrs),
            (Node::Runtime, "thread") => thread::open(ctx, attrs),
            (Node::Runtime, "root") => root::open(ctx, attrs),
            (Node::VmInitArgs, "option") => runtime::open_option(ctx, attrs),

            (Node::ClassLoader { loader }, "cachedclass") => class::open_cached(ctx, *loader, attrs),
            (Node::Class { class }, "field") => class::open_field(ctx, *class, attrs),
            (Node::Class { class }, "static") => class::open_static(ctx, *class, attrs),
            (Node::Class { class }, "method") => class::open_method(ctx, *class, attrs),
            (Node::Class { class }, "constantpool") => {
                Ok(Node::Objects(ObjectList::ConstantPool { class: *class }))
            }

            (Node::Heap { heap, shape: HeapShape::Regions }, "region") => {
                heap::open_region(ctx, *heap, attrs)
            }
            (Node::Heap { heap, shape: HeapShape::Legacy }, "objects") => {
                Ok(Node::Objects(ObjectList::Region { heap: *heap, region: 0 }))
            }
            (Node::Heap { heap, shape }, "region") | (Node::Heap { heap, shape }, "objects") => {
                Err(Error(ErrorOrigin::Node, ErrorKind::HeapShapeConflict).log_warn(format!(
                    "{:?} heap {} does not accept `{}`",
                    shape,
                    heap,
                    attrs.element()
                )))
            }
            (Node::Region { heap, region }, "objects") => Ok(Node::Objects(ObjectList::Region {
                heap: *heap,
                region: *region,
            })),
            (Node::Objects(list), "object") => heap::open_object(ctx, *list, attrs),

            (Node::Thread { thread }, "stack") => Ok(Node::Stack { thread: *thread }),
            (Node::Stack { thread }, "frame") => thread::open_frame(ctx, *thread, attrs),
            (Node::Frame { thread, frame }, "objects") => Ok(Node::Objects(ObjectList::Frame {
                thread: *thread,
                frame: *frame,
            })),

            (_, name) => {
                debug!("unexpected element `{}` in `{}`", name, parent);
                *ctx.unexpected.entry(name.to_string()).or_insert(0) += 1;
                Ok(Node::Unexpected)
            }
        }
    }

    /// Receives the character data of the element.
    pub fn text(&mut self, _ctx: &mut Context, text: &str) -> Result<()> {
        match self {
            Node::Fault(record) => record.text.push_str(text),
            Node::Error { message, .. } => message.push_str(text),
            _ => {}
        }
        Ok(())
    }

    /// Called once all children of the element have been seen.
    pub fn finished(self, ctx: &mut Context) -> Result<()> {
        match self {
            Node::Root => resolve::resolve_process(ctx),
            Node::Fault(record) => process::close_fault(ctx, record),
            Node::Heap { heap, .. } => {
                ctx.runtime_mut()?.register_heap_regions(heap);
                Ok(())
            }
            Node::Error { parent, message } => {
                let message = message.trim().to_string();
                warn!("index reports an error in `{}`: {}", parent, message);
                ctx.reported_errors.push(ReportedError { parent, message });
                Ok(())
            }
            _ => Ok(()),
        }
    }
}
