/*!
Reconstruction of runtime state from an index file.

The index is read through the [`TagRepairStream`](crate::repair::TagRepairStream),
tokenized as it streams in and fed element by element into a stack of [`node`]
handlers which build the runtime arenas of the selected process. After the last element the resolution
pass links heap objects back to the entities they back.

A failure anywhere in this pipeline does not lose the image: [`reconstruct`] always
returns a [`DumpModel`], with every process of a failed run carrying the error and
keeping whatever was built before it.
*/

pub mod attributes;
mod context;
mod dispatch;
mod node;
mod resolve;
mod tokenizer;

pub use resolve::resolve_runtime;

use std::io::{BufReader, Read};

use hashbrown::HashMap;
use log::{info, warn};

use crate::args::ReconstructOptions;
use crate::error::{Error, Result};
use crate::image::{CoreImage, ImageProcess, ProcessRef};
use crate::model::DumpHeader;
use crate::repair::{RepairStats, TagRepairStream};

use attributes::Attributes;
use context::Context;
use dispatch::ElementDispatcher;
use tokenizer::{XmlEvent, XmlEvents};

/// An `error` element found in the index.
#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
pub struct ReportedError {
    /// Name of the element the error was reported in.
    pub parent: String,
    pub message: String,
}

/// Result of a reconstruction run.
#[derive(Debug)]
pub struct DumpModel {
    /// Header from the index, or derived from the image if the index could not be used.
    pub header: DumpHeader,
    pub image: CoreImage,
    /// Process the index was matched to.
    pub process: Option<ProcessRef>,
    /// The error that ended the run early.
    pub failure: Option<Error>,
    pub repair_stats: RepairStats,
    pub reported_errors: Vec<ReportedError>,
    /// Unexpected element names and how often they were seen.
    pub unexpected_elements: HashMap<String, usize>,
}

impl DumpModel {
    pub fn is_degraded(&self) -> bool {
        self.failure.is_some()
    }

    /// The process the index describes.
    pub fn process(&self) -> Option<&ImageProcess> {
        self.process.and_then(|r| self.image.process(r))
    }
}

/// Reconstructs the runtime state described by `index` with default options.
pub fn reconstruct<R: Read>(index: R, image: CoreImage) -> DumpModel {
    reconstruct_with_options(index, image, &ReconstructOptions::default())
}

/// Reconstructs the runtime state described by `index` into the processes of `image`.
pub fn reconstruct_with_options<R: Read>(
    index: R,
    image: CoreImage,
    options: &ReconstructOptions,
) -> DumpModel {
    let start = coarsetime::Instant::now();

    let mut stream = TagRepairStream::with_limits(index, options.peek_limit, options.buffer_size);
    let mut ctx = Context::new(image, *options);
    let result = parse(&mut stream, &mut ctx);
    let repair_stats = stream.stats();

    let (header, failure) = match result {
        Ok(()) => {
            let header = ctx
                .header
                .take()
                .unwrap_or_else(|| DumpHeader::from_platform(ctx.image.platform()));
            (header, None)
        }
        Err(err) => {
            warn!(
                "unable to read the index ({}), falling back to image metadata",
                err
            );
            ctx.image.mark_failed(err);
            (DumpHeader::from_platform(ctx.image.platform()), Some(err))
        }
    };

    info!(
        "index processed in {} ms, {} repairs",
        start.elapsed().as_millis(),
        repair_stats.repairs()
    );

    DumpModel {
        header,
        image: ctx.image,
        process: ctx.process,
        failure,
        repair_stats,
        reported_errors: ctx.reported_errors,
        unexpected_elements: ctx.unexpected,
    }
}

fn parse<R: Read>(stream: &mut TagRepairStream<R>, ctx: &mut Context) -> Result<()> {
    let mut events = XmlEvents::new(BufReader::new(stream));
    let mut dispatcher = ElementDispatcher::new();

    while let Some(event) = events.next_event()? {
        match event {
            XmlEvent::Start { name, attributes } => {
                let attrs = Attributes::new(
                    &name,
                    attributes.iter().map(|(k, v)| (k.as_str(), v.as_str())),
                );
                dispatcher.start_element(ctx, &attrs)?
            }
            XmlEvent::Text(text) => dispatcher.text(&text),
            XmlEvent::End => dispatcher.end_element(ctx)?,
        }
    }

    dispatcher.finish(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, ErrorOrigin};
    use crate::image::{Endianness, ImageAddressSpace, MappedMemory, PlatformInfo, SpaceMetadata};
    use crate::model::{ClassKind, HeapShape};
    use crate::types::Address;

    fn image() -> CoreImage {
        let mut mem =
            MappedMemory::from_buffer(vec![0u8; 0x100], SpaceMetadata::new(8, Endianness::Little));
        mem.push_range(0x1000.into(), 0x100, 0).unwrap();
        CoreImage::new(PlatformInfo::new("Linux", "amd64", 8, Endianness::Little)).with_space(
            ImageAddressSpace::new("core", Box::new(mem))
                .with_process(ImageProcess::new(4242, 0x1000.into())),
        )
    }

    fn run(index: &str) -> DumpModel {
        reconstruct(index.as_bytes(), image())
    }

    fn wrap(body: &str) -> String {
        format!(
            r#"<?xml version="1.0"?>
<j9dump endian="little" size="64" osName="Linux" cpuType="amd64" creationTime="1600000000000">
  <javavm id="0x7f00">{}</javavm>
</j9dump>"#,
            body
        )
    }

    #[test]
    fn header_attributes() {
        let model = run(&wrap(""));
        assert!(!model.is_degraded());
        assert_eq!(model.header.pointer_bits, 64);
        assert_eq!(model.header.os_name.as_deref(), Some("Linux"));
        assert_eq!(
            model.header.creation_time.map(|t| t.timestamp_millis()),
            Some(1_600_000_000_000)
        );
        let process = model.process().unwrap();
        assert_eq!(process.runtimes.len(), 1);
        assert_eq!(process.runtimes[0].id, Address::from(0x7f00));
    }

    #[test]
    fn class_children() {
        let model = run(&wrap(
            r#"
    <class id="0x100" name="java/lang/String" super="0x80" instanceSize="24" modifiers="0x31">
      <field name="value" sig="[B" modifiers="0x12" offset="0x8"/>
      <static name="serialVersionUID" sig="J" value="-6849794470754667710"/>
      <method name="length" sig="()I" modifiers="0x1" id="0x4000"/>
      <constantpool><object id="0x1010" class="0x100"/></constantpool>
    </class>
    <arrayclass id="0x180" leafClass="0x100" arity="2" hashcodeSlot="0xc"/>"#,
        ));
        let rt = &model.process().unwrap().runtimes[0];

        let string = rt.class(0x100.into()).unwrap();
        assert_eq!(string.name(), "java/lang/String");
        assert_eq!(string.hashcode_slot, 0);
        assert_eq!(string.fields[0].offset, 8);
        assert_eq!(string.statics[0].value, -6849794470754667710);
        assert_eq!(string.methods[0].id, Address::from(0x4000));
        assert_eq!(string.constant_pool, vec![Address::from(0x1010)]);
        assert_eq!(rt.object(0x1010.into()).unwrap().class, Address::from(0x100));

        let array = rt.class(0x180.into()).unwrap();
        assert_eq!(array.hashcode_slot, 0xc);
        assert!(matches!(array.kind, ClassKind::Array { arity: 2, .. }));
    }

    #[test]
    fn heap_shapes() {
        let model = run(&wrap(
            r#"
    <heap id="0x1" name="Legacy" start="0x1000" end="0x1100" objectAlignment="8" minimumObjectSize="16">
      <objects><object id="0x1010"/><object id="0x1020"/></objects>
    </heap>
    <heap id="0x2" name="Regions">
      <region start="0x2000" end="0x3000" objectAlignment="8"><objects><object id="0x2008"/></objects></region>
      <region start="0x3000" end="0x4000"/>
    </heap>"#,
        ));
        let rt = &model.process().unwrap().runtimes[0];
        assert_eq!(rt.heaps().len(), 2);

        let legacy = &rt.heaps()[0];
        assert_eq!(legacy.shape, HeapShape::Legacy);
        assert_eq!(legacy.regions.len(), 1);
        assert_eq!(legacy.regions[0].minimum_object_size, 16);
        assert_eq!(legacy.object_count(), 2);

        let modern = &rt.heaps()[1];
        assert_eq!(modern.shape, HeapShape::Regions);
        assert_eq!(modern.regions.len(), 2);
        assert_eq!(modern.regions[0].objects, vec![Address::from(0x2008)]);

        assert!(rt.region_containing(0x10ff.into()).is_some());
        assert!(rt.region_containing(0x3fff.into()).is_some());
    }

    #[test]
    fn legacy_heap_rejects_region() {
        let model = run(&wrap(
            r#"<heap id="0x1" start="0x1000" end="0x2000" objectAlignment="8" minimumObjectSize="16">
                 <region start="0x1000" end="0x2000"/>
               </heap>"#,
        ));
        assert_eq!(
            model.failure,
            Some(Error(ErrorOrigin::Node, ErrorKind::HeapShapeConflict))
        );
    }

    #[test]
    fn region_heap_rejects_objects() {
        let model = run(&wrap(
            r#"<heap id="0x1" objectAlignment="8"><objects><object id="0x1010"/></objects></heap>"#,
        ));
        assert_eq!(
            model.failure.map(|err| err.kind()),
            Some(ErrorKind::HeapShapeConflict)
        );
    }

    #[test]
    fn unexpected_and_error_elements() {
        let model = run(&wrap(
            r#"
    <futureelement a="1"><nested/></futureelement>
    <class id="0x100"><annotation/></class>
    <error>unable to walk class segments</error>"#,
        ));
        assert!(!model.is_degraded());
        assert_eq!(model.unexpected_elements.get("futureelement"), Some(&1));
        assert_eq!(model.unexpected_elements.get("nested"), Some(&1));
        assert_eq!(model.unexpected_elements.get("annotation"), Some(&1));
        assert_eq!(
            model.reported_errors,
            vec![ReportedError {
                parent: "javavm".to_string(),
                message: "unable to walk class segments".to_string(),
            }]
        );
        assert!(model.process().unwrap().runtimes[0].class(0x100.into()).is_some());
    }

    #[test]
    fn fault_record() {
        let model = run(r#"<j9dump size="64">
  <gpf failingThread="0x7f3a2c001000">J9Generic_Signal_Number=00000004 Signal_Number=00000000
Handler1=00007F3A2C001000</gpf>
  <process pid="4242" commandLine="java -jar app.jar"><library name="libjvm.so" base="0x7f0000000000" size="0x100000"/></process>
</j9dump>"#);
        let process = model.process().unwrap();
        let fault = process.fault.as_ref().unwrap();
        assert_eq!(fault.failing_thread, Address::from(0x7f3a2c001000u64));
        assert_eq!(fault.signal, 11);
        assert_eq!(process.command_line.as_deref(), Some("java -jar app.jar"));
        assert_eq!(process.modules[0].name, "libjvm.so");
    }

    #[test]
    fn vm_init_args() {
        let model = run(&wrap(
            r#"<vminitargs version="0x10008" ignoreUnrecognized="1">
                 <option string="-Xmx1g"/><option string="-Dfoo=bar" extraInfo="0x10"/>
               </vminitargs>"#,
        ));
        let args = model.process().unwrap().runtimes[0]
            .vm_init_args
            .clone()
            .unwrap();
        assert!(args.ignore_unrecognized);
        assert_eq!(args.options.len(), 2);
        assert_eq!(args.options[1].extra_info, Address::from(0x10));
    }

    #[test]
    fn other_root_element_is_unexpected() {
        let model = run("<coredump><javavm id=\"0x1\"/></coredump>");
        assert!(!model.is_degraded());
        assert_eq!(model.header.os_name.as_deref(), Some("Linux"));
        assert_eq!(model.unexpected_elements.get("coredump"), Some(&1));
        assert!(model.process().is_none());
    }

    #[test]
    fn missing_required_id_fails() {
        let model = run(&wrap(r#"<class name="x"/>"#));
        assert_eq!(
            model.failure,
            Some(Error(ErrorOrigin::Node, ErrorKind::RequiredAttributeNotFound))
        );
        let process = &model.image.spaces()[0].processes()[0];
        assert_eq!(process.extraction_failure, model.failure);
        // the runtime built before the failure stays attached
        assert_eq!(process.runtimes.len(), 1);
    }

    #[test]
    fn truncated_index_is_completed() {
        let model = run(r#"<j9dump size="64"><javavm id="0x7f00"><class id="0x100"><class id="0x200" name="trunc"#);
        assert!(!model.is_degraded());
        assert!(model.repair_stats.repairs() > 0);
        let rt = &model.process().unwrap().runtimes[0];
        assert_eq!(rt.classes().len(), 2);
        assert_eq!(rt.class(0x200.into()).unwrap().name(), "trunc");
    }

    #[test]
    fn garbage_falls_back_to_platform() {
        let model = run("this is not an index");
        assert_eq!(
            model.failure.map(|err| err.origin()),
            Some(ErrorOrigin::Tokenizer)
        );
        assert_eq!(model.header.cpu_type.as_deref(), Some("amd64"));
        assert!(model.image.spaces()[0].processes()[0]
            .extraction_failure
            .is_some());
    }
}
