use log::info;

use super::Node;
use crate::error::Result;
use crate::index::attributes::Attributes;
use crate::index::context::Context;
use crate::model::{JavaRuntime, VmInitArgs, VmOption};

/// `javavm`: attaches a new runtime to the selected process and makes it current.
pub(super) fn open(ctx: &mut Context, attrs: &Attributes) -> Result<Node> {
    let mut runtime = JavaRuntime::new(attrs.required_address("id")?);
    runtime.version = attrs.string("version");

    let process = ctx.process_mut()?;
    info!("runtime {:x} in process {}", runtime.id, process.pid);
    process.runtimes.push(runtime);
    let idx = process.runtimes.len() - 1;
    ctx.runtime = Some(idx);
    Ok(Node::Runtime)
}

pub(super) fn open_init_args(ctx: &mut Context, attrs: &Attributes) -> Result<Node> {
    let args = VmInitArgs {
        version: attrs.long("version", 0)?,
        ignore_unrecognized: attrs.long("ignoreUnrecognized", 0)? != 0,
        options: Vec::new(),
    };
    ctx.runtime_mut()?.vm_init_args = Some(args);
    Ok(Node::VmInitArgs)
}

pub(super) fn open_option(ctx: &mut Context, attrs: &Attributes) -> Result<Node> {
    let option = VmOption {
        string: attrs.required("string")?.to_string(),
        extra_info: attrs.address("extraInfo")?,
    };
    if let Some(args) = ctx.runtime_mut()?.vm_init_args.as_mut() {
        args.options.push(option);
    }
    Ok(Node::VmOption)
}
