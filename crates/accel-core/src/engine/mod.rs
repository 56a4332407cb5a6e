//! # Engine Facade
//!
//! [`Engine`] ties the stages together for one archive: discover the
//! descriptors, bind each one to its unique target method, prepare its
//! native libraries and hand the interception to a [`Weaver`].
//!
//! A fatal error aborts only the descriptor it belongs to. With
//! `strict_all_or_nothing` set the first such error instead rolls back the
//! whole run and is returned.
mod installation;

use std::collections::HashMap;
use std::iter;
use std::sync::Arc;

use crate::archive::ModuleArchive;
use crate::config::EngineOptions;
use crate::descriptor::DescriptorHandle;
use crate::discovery::{discover, DescriptorFailure, Discovery};
use crate::error::{AccelError, Result};
use crate::hooks::HookRegistry;
use crate::metadata::{ArchiveSource, TypePool, TypeSource};
use crate::native::{Binaries, DynamicLibraryLoader, LibraryLoader, NativeLifecycle, TeardownHandle};
use crate::strategy::{BoundAdvice, EntryStrategy};
use crate::weave::{CallSite, Interception, Weaver};

pub use installation::{InstalledDescriptor, Installation};

/// Call sites already claimed during one run, with their owner and strategy
type ClaimedSites = HashMap<CallSite, (String, EntryStrategy)>;

#[derive(Debug)]
pub struct Engine {
    options: EngineOptions,
    weaver: Arc<dyn Weaver>,
    sources: Vec<Arc<dyn TypeSource>>,
    hooks: HookRegistry,
    loader: Arc<dyn LibraryLoader>,
}

impl Engine {
    pub fn new(options: EngineOptions, weaver: Arc<dyn Weaver>) -> Self {
        Self {
            options,
            weaver,
            sources: Vec::new(),
            hooks: HookRegistry::new(),
            loader: Arc::new(DynamicLibraryLoader),
        }
    }

    /// Add a metadata source consulted after the archive itself
    pub fn with_source(mut self, source: Arc<dyn TypeSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_loader(mut self, loader: Arc<dyn LibraryLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn weaver(&self) -> &Arc<dyn Weaver> {
        &self.weaver
    }

    /// A pool over the archive followed by the user sources
    pub fn pool_for(&self, archive: &Arc<dyn ModuleArchive>) -> Arc<TypePool> {
        let archive_source: Arc<dyn TypeSource> = Arc::new(ArchiveSource::new(archive.clone()));
        Arc::new(TypePool::of_sources(
            iter::once(archive_source).chain(self.sources.iter().cloned()),
        ))
    }

    pub fn discover(&self, archive: &Arc<dyn ModuleArchive>) -> Result<Discovery> {
        discover(archive, &self.pool_for(archive))
    }

    /// Install every descriptor found in `archive`.
    pub fn install(&self, archive: &Arc<dyn ModuleArchive>) -> Result<Installation> {
        log::info!("Scanning {} for acceleration descriptors", archive.location());
        let pool = self.pool_for(archive);
        let discovery = discover(archive, &pool)?;
        let lifecycle = NativeLifecycle::new(self.options.convention(), self.loader.clone());

        let mut installation = Installation {
            diagnostics: discovery.diagnostics,
            ..Installation::default()
        };
        let mut claimed = ClaimedSites::new();

        for found in discovery.found {
            let outcome = found.and_then(|handle| {
                self.install_descriptor(&handle, &pool, &lifecycle, &mut claimed)
                    .map_err(|error| DescriptorFailure {
                        descriptor: handle.name().to_string(),
                        error,
                    })
            });

            match outcome {
                Ok((installed, destructions)) => {
                    log::info!("Installed {}", installed);
                    for artifact in &installed.artifacts {
                        if !installation.artifacts.iter().any(|known| Arc::ptr_eq(known, artifact)) {
                            installation.artifacts.push(artifact.clone());
                        }
                    }
                    installation.teardown.extend(destructions);
                    installation.descriptors.push(installed);
                }
                Err(failure) if self.options.strict_all_or_nothing => {
                    log::error!("Aborting installation: {}", failure);
                    self.roll_back(&installation);
                    return Err(failure.error);
                }
                Err(failure) => {
                    log::error!("Skipping descriptor {}", failure);
                    installation.failures.push(failure);
                }
            }
        }

        log::info!(
            "Installed {} descriptors from {} ({} failed, {} diagnostics)",
            installation.descriptors.len(),
            archive.location(),
            installation.failures.len(),
            installation.diagnostics.len()
        );
        Ok(installation)
    }

    fn roll_back(&self, installation: &Installation) {
        let report = installation.uninstall(self.weaver.as_ref());
        if !report.is_clean() {
            log::warn!("{} destroy hooks failed during rollback", report.failures.len());
        }
    }

    fn install_descriptor(
        &self,
        handle: &DescriptorHandle,
        pool: &TypePool,
        lifecycle: &NativeLifecycle,
        claimed: &mut ClaimedSites,
    ) -> Result<(InstalledDescriptor, TeardownHandle)> {
        let descriptor = handle.descriptor();
        let type_matcher = handle.type_matcher(self.options.suppress_provenance_filter);
        let method_matcher = handle.method_matcher();
        let strategy = handle.strategy();

        let no_match = || AccelError::NoMatchingMethod {
            type_name: descriptor.target_type.clone(),
            signature: descriptor.signature(),
        };
        // Same-named types may come from several sources; provenance picks among them
        let targets: Vec<_> = pool
            .candidates(&descriptor.target_type)?
            .into_iter()
            .filter(|target| {
                let accepted = type_matcher.matches(target);
                if !accepted {
                    log::debug!(
                        "Provenance {:?} of {} not in {:?}",
                        target.origin,
                        target.name,
                        descriptor.expected_provenance
                    );
                }
                accepted
            })
            .collect();
        let candidates: Vec<_> = targets
            .iter()
            .flat_map(|target| method_matcher.select(target).map(move |method| (target, method)))
            .collect();
        let (target, method) = match candidates.as_slice() {
            [] => return Err(no_match()),
            [found] => *found,
            several => {
                return Err(AccelError::AmbiguousMethod {
                    type_name: descriptor.target_type.clone(),
                    signature: descriptor.signature(),
                    count: several.len(),
                });
            }
        };
        let site = CallSite::new(&target.name, &method.signature());

        if let Some((existing, existing_strategy)) = claimed.get(&site) {
            if *existing_strategy != strategy {
                return Err(AccelError::StrategyConflict {
                    site: site.to_string(),
                    existing: existing.clone(),
                    descriptor: handle.name().to_string(),
                });
            }
        }

        let body = self.hooks.advice(handle.name()).ok_or_else(|| AccelError::UnboundAdvice {
            type_name: handle.name().to_string(),
        })?;
        let advice = BoundAdvice::new(handle.name(), strategy, body, self.options.dev_mode);
        let inlined = handle.inlined()?;

        // Every library is planned before the first one is extracted
        let Binaries {
            artifacts,
            destructions,
        } = lifecycle.binaries(handle, pool, &self.hooks)?;

        if self.options.eager_activation {
            if let Err(e) = artifacts.iter().try_for_each(|artifact| artifact.activate()) {
                destructions.teardown();
                return Err(e);
            }
        }

        let interception = Interception {
            descriptor: handle.name().to_string(),
            type_matcher,
            method_matcher,
            advice,
            dispatchers: artifacts.clone(),
        };
        let interception = match self.weaver.install(interception) {
            Ok(interception) => interception,
            Err(e) => {
                destructions.teardown();
                return Err(e);
            }
        };

        lifecycle.register(&artifacts);
        claimed
            .entry(site.clone())
            .or_insert_with(|| (handle.name().to_string(), strategy));

        Ok((
            InstalledDescriptor {
                descriptor: handle.name().to_string(),
                site,
                strategy,
                inlined,
                interception,
                artifacts,
            },
            destructions,
        ))
    }
}

#[cfg(test)]
mod tests;
