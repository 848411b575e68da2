use log::{debug, info};

use super::Node;
use crate::error::Result;
use crate::image::ImageModule;
use crate::index::attributes::Attributes;
use crate::index::context::Context;
use crate::model::fault::{decode_signal, FaultRecord};

/// `process`: fills in what the image does not know about the selected process.
pub(super) fn open(ctx: &mut Context, attrs: &Attributes) -> Result<Node> {
    let pid = attrs.optional_long("pid")?;
    let command_line = attrs.string("commandLine");

    let process = ctx.process_mut()?;
    if let Some(pid) = pid {
        if process.pid == 0 {
            process.pid = pid as u64;
        } else if process.pid != pid as u64 {
            debug!("index pid {} differs from image pid {}", pid, process.pid);
        }
    }
    if command_line.is_some() {
        process.command_line = command_line;
    }
    Ok(Node::Process)
}

pub(super) fn open_library(ctx: &mut Context, attrs: &Attributes) -> Result<Node> {
    let module = ImageModule {
        name: attrs.required("name")?.to_string(),
        base: attrs.address("base")?,
        size: attrs.u64("size")?,
    };
    ctx.process_mut()?.modules.push(module);
    Ok(Node::Library)
}

/// `gpf`: the fault record is completed from its text once the element ends.
pub(super) fn open_fault(ctx: &mut Context, attrs: &Attributes) -> Result<Node> {
    ctx.process_mut()?;
    Ok(Node::Fault(FaultRecord {
        failing_thread: attrs.address("failingThread")?,
        native_failing_thread: attrs.address("nativeFailingThread")?,
        ..Default::default()
    }))
}

pub(super) fn close_fault(ctx: &mut Context, mut record: FaultRecord) -> Result<()> {
    record.signal = decode_signal(&record.text)?;
    info!(
        "thread {:x} failed with signal {}",
        record.failing_thread, record.signal
    );
    ctx.process_mut()?.fault = Some(record);
    Ok(())
}
