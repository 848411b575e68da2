use super::{Node, ObjectList};
use crate::error::{Error, ErrorKind, ErrorOrigin, Result};
use crate::index::attributes::Attributes;
use crate::index::context::Context;
use crate::model::{HeapRegion, HeapShape, JavaHeap, JavaObject};

/// `heap`: alignment and minimum object size on the heap itself select the legacy
/// layout, whose single region is created right away.
pub(super) fn open(ctx: &mut Context, attrs: &Attributes) -> Result<Node> {
    let alignment = attrs.optional_long("objectAlignment")?;
    let minimum_size = attrs.optional_long("minimumObjectSize")?;
    let shape = match (alignment, minimum_size) {
        (Some(_), Some(_)) => HeapShape::Legacy,
        _ => HeapShape::Regions,
    };

    let mut heap = JavaHeap::new(attrs.required_address("id")?, shape);
    heap.name = attrs.string("name");
    heap.start = attrs.address("start")?;
    heap.end = attrs.address("end")?;

    if let (Some(alignment), Some(minimum_size)) = (alignment, minimum_size) {
        let mut region = HeapRegion::new(heap.start, heap.end);
        region.id = heap.id;
        region.name = heap.name.clone();
        region.object_alignment = alignment as u64;
        region.minimum_object_size = minimum_size as u64;
        heap.regions.push(region);
    }

    let heap = ctx.runtime_mut()?.add_heap(heap);
    Ok(Node::Heap { heap, shape })
}

pub(super) fn open_region(ctx: &mut Context, heap: usize, attrs: &Attributes) -> Result<Node> {
    let mut region = HeapRegion::new(attrs.required_address("start")?, attrs.required_address("end")?);
    region.id = attrs.address("id")?;
    region.name = attrs.string("name");
    region.object_alignment = attrs.u64("objectAlignment")?;
    region.minimum_object_size = attrs.u64("minimumObjectSize")?;
    region.page_size = attrs.u64("pageSize")?;

    let regions = &mut ctx
        .runtime_mut()?
        .heap_at_mut(heap)
        .ok_or(Error(ErrorOrigin::Dispatch, ErrorKind::NotFound))?
        .regions;
    regions.push(region);
    Ok(Node::Region {
        heap,
        region: regions.len() - 1,
    })
}

/// `object`: registers the object and appends it to the list it appears in.
pub(super) fn open_object(ctx: &mut Context, list: ObjectList, attrs: &Attributes) -> Result<Node> {
    let mut object = JavaObject::new(attrs.required_address("id")?);
    object.class = attrs.address("class")?;
    object.size = attrs.u64("size")?;
    object.hashcode = attrs.u64("hashcode")?;
    let id = object.id;

    let runtime = ctx.runtime_mut()?;
    runtime.add_object(object);

    let not_found = || Error(ErrorOrigin::Dispatch, ErrorKind::NotFound);
    let target = match list {
        ObjectList::Region { heap, region } => {
            &mut runtime
                .heap_at_mut(heap)
                .and_then(|heap| heap.regions.get_mut(region))
                .ok_or_else(not_found)?
                .objects
        }
        ObjectList::ConstantPool { class } => {
            &mut runtime.class_at_mut(class).ok_or_else(not_found)?.constant_pool
        }
        ObjectList::Frame { thread, frame } => {
            &mut runtime
                .thread_at_mut(thread)
                .and_then(|thread| thread.frames.get_mut(frame))
                .ok_or_else(not_found)?
                .objects
        }
    };
    target.push(id);
    Ok(Node::Object)
}
