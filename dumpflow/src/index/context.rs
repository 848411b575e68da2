use hashbrown::HashMap;
use log::{debug, info, warn};

use super::ReportedError;
use crate::args::ReconstructOptions;
use crate::error::{Error, ErrorKind, ErrorOrigin, Result};
use crate::image::{CoreImage, ImageProcess, ProcessRef};
use crate::model::{DumpHeader, JavaRuntime};

/// State shared by every node of one parse.
pub(crate) struct Context {
    pub image: CoreImage,
    pub options: ReconstructOptions,
    pub header: Option<DumpHeader>,
    pub process: Option<ProcessRef>,
    /// Position of the current runtime in the current process.
    pub runtime: Option<usize>,
    pub reported_errors: Vec<ReportedError>,
    pub unexpected: HashMap<String, usize>,
}

impl Context {
    pub fn new(image: CoreImage, options: ReconstructOptions) -> Self {
        Self {
            image,
            options,
            header: None,
            process: None,
            runtime: None,
            reported_errors: Vec::new(),
            unexpected: HashMap::new(),
        }
    }

    pub fn process_mut(&mut self) -> Result<&mut ImageProcess> {
        let not_found = || {
            Error(ErrorOrigin::Dispatch, ErrorKind::ProcessNotFound)
                .log_warn("the index does not belong to any process of the image")
        };
        let r = self.process.ok_or_else(not_found)?;
        self.image.process_mut(r).ok_or_else(not_found)
    }

    pub fn runtime_mut(&mut self) -> Result<&mut JavaRuntime> {
        let idx = self
            .runtime
            .ok_or(Error(ErrorOrigin::Dispatch, ErrorKind::RuntimeNotFound))?;
        self.process_mut()?
            .runtimes
            .get_mut(idx)
            .ok_or(Error(ErrorOrigin::Dispatch, ErrorKind::RuntimeNotFound))
    }

    /// Picks the process the index describes.
    ///
    /// A single process is taken as is. With several candidates the first one whose
    /// memory references the header's environment block wins, the first candidate
    /// otherwise.
    pub fn select_process(&mut self) {
        let candidates = self.image.process_refs().collect::<Vec<_>>();

        self.process = match candidates.as_slice() {
            [] => {
                debug!("image has no processes");
                None
            }
            [only] => Some(*only),
            [first, ..] => {
                let environment = self
                    .header
                    .as_ref()
                    .map(|header| header.environment)
                    .unwrap_or_default();
                let slots = self.options.environment_slots;

                let matched = candidates.iter().copied().find(|&r| {
                    self.image
                        .pointer(r.space, environment.to_umem() as i64)
                        .map(|env| self.image.matches_environment(r, env, slots))
                        .unwrap_or(false)
                });

                match matched {
                    Some(r) => Some(r),
                    None => {
                        warn!(
                            "no process references environment {:x}, using the first of {} processes",
                            environment,
                            candidates.len()
                        );
                        Some(*first)
                    }
                }
            }
        };

        if let Some(process) = self.process.and_then(|r| self.image.process(r)) {
            info!("index describes process {} ({:x})", process.pid, process.id);
        }
    }
}
