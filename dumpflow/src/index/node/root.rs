use super::Node;
use crate::error::Result;
use crate::index::attributes::Attributes;
use crate::index::context::Context;
use crate::model::{GcRoot, Reachability, RootKind};

pub(super) fn open(ctx: &mut Context, attrs: &Attributes) -> Result<Node> {
    let root = GcRoot {
        kind: RootKind::from_label(attrs.get("type")),
        reachability: Reachability::from_label(attrs.get("reachability")),
        address: attrs.required_address("address")?,
        source: attrs.address("source")?,
        description: attrs.string("description"),
    };
    ctx.runtime_mut()?.add_root(root);
    Ok(Node::GcRoot)
}
