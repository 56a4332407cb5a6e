use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::archive::ModuleArchive;
use crate::descriptor::{DescriptorHandle, LibraryReference};
use crate::error::{AccelError, HookKind, Result};
use crate::hooks::HookRegistry;
use crate::metadata::{MethodMetadata, TypeMetadata, TypePool, DESTROY_HOOK, INIT_HOOK};
use crate::native::{
    extract_binary, BinaryConvention, BoundHook, Destruction, DispatcherArtifact, HookTarget, LibraryLoader,
    TeardownHandle,
};

/// A library reference whose dispatcher was resolved and whose hooks were
/// validated and bound. Nothing has touched the file system yet.
#[derive(Debug, Clone)]
pub struct LibraryPlan {
    pub reference: LibraryReference,
    pub dispatcher: Arc<TypeMetadata>,
    pub init_hooks: Vec<BoundHook>,
    pub destroy_hooks: Vec<BoundHook>,
}

/// Artifacts and destroy actions of one descriptor.
///
/// `artifacts` lists every dispatcher the descriptor needs, shared ones
/// included. `destructions` only holds the actions of dispatchers first
/// generated for this descriptor.
#[derive(Debug, Default)]
pub struct Binaries {
    pub artifacts: Vec<Arc<DispatcherArtifact>>,
    pub destructions: TeardownHandle,
}

/// Extraction, loading, initialization and destruction of the native
/// libraries referenced by descriptors.
///
/// One artifact exists per dispatcher type for the lifetime of the
/// lifecycle: descriptors naming a dispatcher that was already generated
/// share its artifact, so its binary is loaded and initialized once.
#[derive(Debug, Clone)]
pub struct NativeLifecycle {
    convention: BinaryConvention,
    loader: Arc<dyn LibraryLoader>,
    registry: Arc<Mutex<HashMap<String, Arc<DispatcherArtifact>>>>,
}

impl NativeLifecycle {
    pub fn new(convention: BinaryConvention, loader: Arc<dyn LibraryLoader>) -> Self {
        Self {
            convention,
            loader,
            registry: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn convention(&self) -> &BinaryConvention {
        &self.convention
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<String, Arc<DispatcherArtifact>>> {
        self.registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The registered artifact of `dispatcher`, if any
    pub fn artifact(&self, dispatcher: &str) -> Option<Arc<DispatcherArtifact>> {
        self.registry().get(dispatcher).cloned()
    }

    /// Resolve and validate every library of a descriptor before any of them
    /// is extracted.
    pub fn plan(&self, handle: &DescriptorHandle, pool: &TypePool, hooks: &HookRegistry) -> Result<Vec<LibraryPlan>> {
        handle
            .descriptor()
            .libraries
            .iter()
            .map(|reference| plan_library(reference, pool, hooks))
            .collect()
    }

    /// Extract the binary of a planned library and build its artifact and,
    /// when it declares destroy hooks, its destruction.
    pub fn materialize(
        &self,
        descriptor: &str,
        plan: LibraryPlan,
        archive: &dyn ModuleArchive,
    ) -> Result<(Arc<DispatcherArtifact>, Option<Destruction>)> {
        let binary = extract_binary(archive, &self.convention, &plan.reference.binary_name)?;
        let artifact = Arc::new(DispatcherArtifact::new(
            &plan.dispatcher.name,
            descriptor,
            binary,
            plan.init_hooks,
            self.loader.clone(),
        ));
        let destruction = if plan.destroy_hooks.is_empty() {
            None
        } else {
            Some(Destruction::new(artifact.clone(), plan.destroy_hooks))
        };
        Ok((artifact, destruction))
    }

    /// Plan every library of a descriptor, then materialize those whose
    /// dispatcher has no artifact yet, in declaration order.
    ///
    /// Nothing is registered here; call [`register`](Self::register) once the
    /// descriptor is installed.
    pub fn binaries(&self, handle: &DescriptorHandle, pool: &TypePool, hooks: &HookRegistry) -> Result<Binaries> {
        let plans = self.plan(handle, pool, hooks)?;
        let mut binaries = Binaries::default();
        for plan in plans {
            let name = plan.dispatcher.name.clone();
            let known = binaries
                .artifacts
                .iter()
                .find(|artifact| artifact.dispatcher() == name)
                .cloned()
                .or_else(|| self.artifact(&name));
            if let Some(artifact) = known {
                let resource = self.convention.resource_name(&plan.reference.binary_name);
                if artifact.binary().resource != resource {
                    log::warn!(
                        "Dispatcher {} already uses {}, ignoring {} from {}",
                        name,
                        artifact.binary().resource,
                        resource,
                        handle.name()
                    );
                }
                if !binaries.artifacts.iter().any(|a| Arc::ptr_eq(a, &artifact)) {
                    binaries.artifacts.push(artifact);
                }
                continue;
            }
            let (artifact, destruction) = self.materialize(handle.name(), plan, handle.archive().as_ref())?;
            binaries.artifacts.push(artifact);
            if let Some(destruction) = destruction {
                binaries.destructions.push(destruction);
            }
        }
        Ok(binaries)
    }

    /// Make the artifacts of an installed descriptor available to later ones.
    pub fn register(&self, artifacts: &[Arc<DispatcherArtifact>]) {
        let mut registry = self.registry();
        for artifact in artifacts {
            registry
                .entry(artifact.dispatcher().to_string())
                .or_insert_with(|| artifact.clone());
        }
    }
}

/// Resolve a dispatcher lazily and bind its hooks.
pub fn plan_library(reference: &LibraryReference, pool: &TypePool, hooks: &HookRegistry) -> Result<LibraryPlan> {
    let dispatcher = pool.describe(&reference.dispatcher_type)?.resolve()?;
    let init_hooks = bind_hooks(&dispatcher, HookKind::Init, hooks)?;
    let destroy_hooks = bind_hooks(&dispatcher, HookKind::Destroy, hooks)?;
    Ok(LibraryPlan {
        reference: reference.clone(),
        dispatcher,
        init_hooks,
        destroy_hooks,
    })
}

fn bind_hooks(dispatcher: &TypeMetadata, kind: HookKind, hooks: &HookRegistry) -> Result<Vec<BoundHook>> {
    let marker = match kind {
        HookKind::Init => INIT_HOOK,
        HookKind::Destroy => DESTROY_HOOK,
    };
    dispatcher
        .methods_annotated_with(marker)
        .map(|method| {
            if !method.is_stateless_procedure() {
                return Err(AccelError::StatefulHook {
                    kind,
                    method: qualified(dispatcher, method),
                });
            }
            let target = match hooks.hook(&dispatcher.name, &method.name) {
                Some(hook) => HookTarget::Host(hook),
                None => HookTarget::Native(method.name.clone()),
            };
            Ok(BoundHook {
                dispatcher: dispatcher.name.clone(),
                method: method.name.clone(),
                kind,
                target,
            })
        })
        .collect()
}

/// `static void com.acme.Dispatcher.setup(int)`
fn qualified(owner: &TypeMetadata, method: &MethodMetadata) -> String {
    format!(
        "{}{} {}.{}",
        if method.is_static { "static " } else { "" },
        method.return_type,
        owner.name,
        method.signature()
    )
}
