use chrono::{TimeZone, Utc};
use log::{debug, info};

use super::Node;
use crate::error::Result;
use crate::image::Endianness;
use crate::index::attributes::Attributes;
use crate::index::context::Context;
use crate::model::DumpHeader;

/// `j9dump`: platform metadata, then picks the process the index describes.
pub(super) fn open(ctx: &mut Context, attrs: &Attributes) -> Result<Node> {
    let platform = ctx.image.platform();

    let endianness = match attrs.get("endian") {
        Some("big") => Endianness::Big,
        Some("little") => Endianness::Little,
        _ => platform.endianness,
    };

    let pointer_bits = match attrs.u32("size")? {
        0 => platform.pointer_size as u32 * 8,
        bits => bits,
    };

    let creation_time = match attrs.optional_long("creationTime")? {
        Some(millis) => {
            let time = Utc.timestamp_millis_opt(millis).single();
            if time.is_none() {
                debug!("creation time {} is out of range", millis);
            }
            time
        }
        None => platform.creation_time,
    };

    let header = DumpHeader {
        endianness,
        pointer_bits,
        version: attrs.string("version"),
        os_name: attrs.string("osName"),
        os_version: attrs.string("osVersion"),
        cpu_type: attrs.string("cpuType"),
        cpu_subtype: attrs.string("cpuSubType"),
        cpu_count: attrs.u32("cpuCount")?,
        memory_bytes: attrs.u64("memoryBytes")?,
        environment: attrs.address("environment")?,
        creation_time,
    };

    info!(
        "index for {} {} ({} bit), created {:?}",
        header.os_name.as_deref().unwrap_or("unknown os"),
        header.cpu_type.as_deref().unwrap_or("unknown cpu"),
        header.pointer_bits,
        header.creation_time
    );

    ctx.header = Some(header);
    ctx.select_process();
    Ok(Node::Header)
}
