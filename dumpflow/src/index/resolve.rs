/*!
Back references from heap objects to the runtime entities they back.

Runs once after the whole index has been read. Every link is attempted on its own,
an object that cannot be resolved leaves just that link out.
*/

use log::{debug, info};

use super::context::Context;
use crate::error::Result;
use crate::image::AddressSpace;
use crate::model::{JavaObject, JavaRuntime};
use crate::types::Address;

/// Links every runtime of the selected process.
pub(crate) fn resolve_process(ctx: &mut Context) -> Result<()> {
    let r = match ctx.process {
        Some(r) => r,
        None => return Ok(()),
    };

    let (memory, process) = ctx.image.process_with_memory(r)?;
    for runtime in process.runtimes.iter_mut() {
        let linked = resolve_runtime(runtime, memory);
        info!(
            "runtime {:x}: {} classes, {} heaps, {} threads, {} objects linked",
            runtime.id,
            runtime.classes().len(),
            runtime.heaps().len(),
            runtime.threads().len(),
            linked
        );
    }
    Ok(())
}

/// Establishes all back references of `runtime` and returns how many were made.
pub fn resolve_runtime(runtime: &mut JavaRuntime, memory: &dyn AddressSpace) -> usize {
    let mut linked = 0;

    collect_defined_classes(runtime);

    for idx in 0..runtime.class_loaders().len() {
        let loader = &runtime.class_loaders()[idx];
        let loader_id = loader.id;
        let loader_object = loader.object;
        let defined = loader
            .defined_classes
            .iter()
            .filter_map(|&id| runtime.class(id))
            .map(|class| (class.id, class.object))
            .collect::<Vec<_>>();

        if link(runtime, memory, loader_object, "class loader", loader_id, |o, id| {
            o.set_associated_loader(id)
        }) {
            linked += 1;
        }

        for (class_id, class_object) in defined {
            if link(runtime, memory, class_object, "class", class_id, |o, id| {
                o.set_associated_class(id)
            }) {
                linked += 1;
            }
        }
    }

    let monitors = runtime
        .monitors()
        .iter()
        .map(|m| (m.id, m.object))
        .collect::<Vec<_>>();
    for (monitor_id, monitor_object) in monitors {
        if link(runtime, memory, monitor_object, "monitor", monitor_id, |o, id| {
            o.set_associated_monitor(id)
        }) {
            linked += 1;
        }
    }

    let threads = runtime
        .threads()
        .iter()
        .map(|t| (t.id, t.object, t.blocked_on, t.waiting_on))
        .collect::<Vec<_>>();
    for &(thread_id, thread_object, _, _) in threads.iter() {
        if link(runtime, memory, thread_object, "thread", thread_id, |o, id| {
            o.set_associated_thread(id)
        }) {
            linked += 1;
        }
    }

    for (thread_id, _, blocked_on, waiting_on) in threads {
        if let Some(monitor) = blocked_on.non_null().and_then(|id| runtime.monitor_mut(id)) {
            monitor.enter_waiters.push(thread_id);
        }
        if let Some(monitor) = waiting_on.non_null().and_then(|id| runtime.monitor_mut(id)) {
            monitor.notify_waiters.push(thread_id);
        }
    }

    linked
}

/// Fills the defined class list of every loader from the classes naming it.
fn collect_defined_classes(runtime: &mut JavaRuntime) {
    let classes = runtime
        .classes()
        .iter()
        .filter(|class| !class.loader.is_null())
        .map(|class| (class.loader, class.id))
        .collect::<Vec<_>>();

    for idx in 0..runtime.class_loaders().len() {
        let loader_id = runtime.class_loaders()[idx].id;
        let defined = classes
            .iter()
            .filter(|(loader, _)| *loader == loader_id)
            .map(|&(_, class)| class)
            .collect::<Vec<_>>();
        if let Some(loader) = runtime.class_loader_at_mut(idx) {
            loader.defined_classes = defined;
        }
    }
}

fn link<F: FnOnce(&mut JavaObject, Address)>(
    runtime: &mut JavaRuntime,
    memory: &dyn AddressSpace,
    object: Address,
    what: &str,
    owner: Address,
    associate: F,
) -> bool {
    if object.is_null() {
        return false;
    }

    match runtime.object_at(memory, object) {
        Ok(idx) => match runtime.object_at_mut(idx) {
            Some(obj) => {
                associate(obj, owner);
                true
            }
            None => false,
        },
        Err(err) => {
            debug!(
                "{} {:x}: backing object {:x} not linked: {}",
                what, owner, object, err
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{Endianness, MappedMemory, SpaceMetadata};
    use crate::model::{
        ClassKind, HeapRegion, HeapShape, JavaClass, JavaClassLoader, JavaHeap, JavaMonitor,
        JavaThread,
    };

    fn memory() -> MappedMemory {
        let mut mem =
            MappedMemory::from_buffer(vec![0u8; 0x100], SpaceMetadata::new(8, Endianness::Little));
        mem.push_range(0x1000.into(), 0x100, 0).unwrap();
        mem
    }

    fn runtime() -> JavaRuntime {
        let mut rt = JavaRuntime::new(0x10.into());

        let mut heap = JavaHeap::new(0x1.into(), HeapShape::Regions);
        let mut region = HeapRegion::new(0x1000.into(), 0x2000.into());
        region.object_alignment = 8;
        heap.regions.push(region);
        let heap = rt.add_heap(heap);
        rt.register_heap_regions(heap);

        rt.add_class_loader(JavaClassLoader::new(0x200.into(), 0x1000.into()));

        let mut object = JavaClass::new(0x100.into(), ClassKind::Class);
        object.loader = 0x200.into();
        object.object = 0x1010.into();
        rt.add_class(object);

        // backing object outside of every region
        let mut string = JavaClass::new(0x110.into(), ClassKind::Class);
        string.loader = 0x200.into();
        string.object = 0x9000.into();
        rt.add_class(string);

        // unknown loader
        let mut orphan = JavaClass::new(0x120.into(), ClassKind::Class);
        orphan.loader = 0x999.into();
        orphan.object = 0x1020.into();
        rt.add_class(orphan);

        let mut monitor = JavaMonitor::new(0x50.into());
        monitor.object = 0x1030.into();
        rt.add_monitor(monitor);

        let mut blocked = JavaThread::new(0x60.into());
        blocked.object = 0x1040.into();
        blocked.state = Some("Blocked".to_string());
        blocked.classify_monitor(0x50.into());
        rt.add_thread(blocked);

        let mut waiting = JavaThread::new(0x70.into());
        // misaligned
        waiting.object = 0x1044.into();
        waiting.state = Some("Waiting".to_string());
        waiting.classify_monitor(0x50.into());
        rt.add_thread(waiting);

        rt
    }

    #[test]
    fn links_back_references() {
        let mut rt = runtime();
        let linked = resolve_runtime(&mut rt, &memory());
        assert_eq!(linked, 4);

        assert_eq!(
            rt.class_loader(0x200.into()).unwrap().defined_classes,
            vec![Address::from(0x100), Address::from(0x110)]
        );

        let loader_obj = rt.object(0x1000.into()).unwrap();
        assert!(loader_obj.is_class_loader());
        assert_eq!(loader_obj.associated_loader, Address::from(0x200));

        let class_obj = rt.object(0x1010.into()).unwrap();
        assert!(class_obj.is_class());
        assert_eq!(class_obj.associated_class, Address::from(0x100));

        assert!(rt.object(0x1030.into()).unwrap().is_monitor());
        assert_eq!(
            rt.object(0x1040.into()).unwrap().associated_thread,
            Address::from(0x60)
        );
    }

    #[test]
    fn unresolved_objects_are_skipped() {
        let mut rt = runtime();
        resolve_runtime(&mut rt, &memory());

        assert!(rt.object(0x9000.into()).is_none());
        assert!(rt.object(0x1044.into()).is_none());
        // classes of unknown loaders are not linked
        assert!(rt.object(0x1020.into()).is_none());
    }

    #[test]
    fn monitor_waiters() {
        let mut rt = runtime();
        resolve_runtime(&mut rt, &memory());

        let monitor = rt.monitor(0x50.into()).unwrap();
        assert_eq!(monitor.enter_waiters, vec![Address::from(0x60)]);
        assert_eq!(monitor.notify_waiters, vec![Address::from(0x70)]);
    }
}
