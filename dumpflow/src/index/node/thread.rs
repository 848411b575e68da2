use super::Node;
use crate::error::{Error, ErrorKind, ErrorOrigin, Result};
use crate::index::attributes::Attributes;
use crate::index::context::Context;
use crate::model::{JavaMonitor, JavaThread, StackFrame};

/// `thread`: the `monitor` attribute only counts for blocked and waiting threads.
pub(super) fn open(ctx: &mut Context, attrs: &Attributes) -> Result<Node> {
    let mut thread = JavaThread::new(attrs.required_address("id")?);
    thread.object = attrs.address("obj")?;
    thread.native_id = attrs.address("nativeID")?;
    thread.state = attrs.string("state");
    thread.priority = attrs.long("priority", 0)?;
    thread.name = attrs.string("name");
    thread.classify_monitor(attrs.address("monitor")?);

    let thread = ctx.runtime_mut()?.add_thread(thread);
    Ok(Node::Thread { thread })
}

pub(super) fn open_frame(ctx: &mut Context, thread: usize, attrs: &Attributes) -> Result<Node> {
    let frame = StackFrame {
        method: attrs.address("method")?,
        pc: attrs.address("pc")?,
        line: attrs.long("line", -1)?,
        objects: Vec::new(),
    };

    let frames = &mut ctx
        .runtime_mut()?
        .thread_at_mut(thread)
        .ok_or(Error(ErrorOrigin::Dispatch, ErrorKind::NotFound))?
        .frames;
    frames.push(frame);
    Ok(Node::Frame {
        thread,
        frame: frames.len() - 1,
    })
}

pub(super) fn open_monitor(ctx: &mut Context, attrs: &Attributes) -> Result<Node> {
    let mut monitor = JavaMonitor::new(attrs.required_address("id")?);
    monitor.object = attrs.address("object")?;
    monitor.owner = attrs.address("owner")?;
    monitor.name = attrs.string("name");

    ctx.runtime_mut()?.add_monitor(monitor);
    Ok(Node::Monitor)
}
