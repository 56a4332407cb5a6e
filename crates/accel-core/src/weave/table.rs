use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;

use crate::error::{AccelError, Result};
use crate::metadata::{MethodMetadata, TypeMetadata};
use crate::weave::{CallSite, Interception, InterceptionHandle, Weaver};

/// Original implementation of a method registered in a [`CallSiteTable`]
pub type MethodBody = Arc<dyn Fn(&[Value]) -> Value + Send + Sync>;

struct SiteEntry {
    site: CallSite,
    owner: Arc<TypeMetadata>,
    method: MethodMetadata,
    original: MethodBody,
    interceptions: Vec<(u64, Arc<Interception>)>,
}

#[derive(Default)]
struct TableState {
    sites: Vec<SiteEntry>,
    installed: Vec<(u64, Arc<Interception>)>,
}

impl TableState {
    fn matching_sites(&self, interception: &Interception) -> Vec<CallSite> {
        self.sites
            .iter()
            .filter(|entry| applies_to(interception, entry))
            .map(|entry| entry.site.clone())
            .collect()
    }
}

fn applies_to(interception: &Interception, entry: &SiteEntry) -> bool {
    interception.type_matcher.matches(&entry.owner) && interception.method_matcher.matches(&entry.method)
}

/// An in-process weaver: hosts register their methods here and route calls
/// through [`invoke`](CallSiteTable::invoke).
///
/// Interceptions also apply to sites defined after they were installed, the
/// way a load-time weaver also transforms types loaded later.
pub struct CallSiteTable {
    state: Mutex<TableState>,
    next_id: AtomicU64,
}

impl Default for CallSiteTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CallSiteTable {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TableState::default()),
            next_id: AtomicU64::new(1),
        }
    }

    fn state(&self) -> MutexGuard<'_, TableState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register the original implementation of `owner.method`.
    ///
    /// The method must be declared by `owner`. Redefining a site replaces its
    /// original body and keeps its interceptions.
    pub fn define<F>(&self, owner: Arc<TypeMetadata>, method: &MethodMetadata, body: F) -> Result<CallSite>
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        if !owner.methods.iter().any(|declared| declared == method) {
            return Err(AccelError::UnknownCallSite {
                site: format!("{}.{}", owner.name, method.signature()),
            });
        }

        let site = CallSite::new(&owner.name, &method.signature());
        let original: MethodBody = Arc::new(body);
        let mut state = self.state();

        if let Some(entry) = state.sites.iter_mut().find(|entry| entry.site == site) {
            entry.original = original;
            return Ok(site);
        }

        let mut entry = SiteEntry {
            site: site.clone(),
            owner,
            method: method.clone(),
            original,
            interceptions: Vec::new(),
        };
        for (id, interception) in &state.installed {
            if applies_to(interception, &entry) {
                entry.interceptions.push((*id, interception.clone()));
            }
        }
        state.sites.push(entry);
        Ok(site)
    }

    /// Call a registered method, running its interceptions first.
    ///
    /// Interceptions run in installation order; the first one returning a
    /// value replaces the call, otherwise the original body runs.
    pub fn invoke(&self, site: &CallSite, args: &[Value]) -> Result<Value> {
        let (original, interceptions) = {
            let state = self.state();
            let entry = state
                .sites
                .iter()
                .find(|entry| &entry.site == site)
                .ok_or_else(|| AccelError::UnknownCallSite { site: site.to_string() })?;
            let interceptions: Vec<Arc<Interception>> =
                entry.interceptions.iter().map(|(_, i)| i.clone()).collect();
            (entry.original.clone(), interceptions)
        };

        // The lock is released so advice bodies may call back into the table
        for interception in interceptions {
            if let Some(result) = interception.intercept(args)? {
                return Ok(result);
            }
        }
        Ok(original(args))
    }

    /// Descriptors intercepting `site`, in installation order
    pub fn interceptors_of(&self, site: &CallSite) -> Vec<String> {
        self.state()
            .sites
            .iter()
            .find(|entry| &entry.site == site)
            .map(|entry| entry.interceptions.iter().map(|(_, i)| i.descriptor.clone()).collect())
            .unwrap_or_default()
    }

    pub fn installed_count(&self) -> usize {
        self.state().installed.len()
    }
}

impl Weaver for CallSiteTable {
    fn install(&self, interception: Interception) -> Result<InterceptionHandle> {
        let mut state = self.state();

        if let Some((id, existing)) = state
            .installed
            .iter()
            .find(|(_, existing)| existing.descriptor == interception.descriptor)
        {
            log::debug!("Interception for '{}' already installed", interception.descriptor);
            return Ok(InterceptionHandle {
                id: *id,
                descriptor: existing.descriptor.clone(),
                sites: state.matching_sites(existing),
            });
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let interception = Arc::new(interception);
        let mut sites = Vec::new();
        for entry in state.sites.iter_mut() {
            if applies_to(&interception, entry) {
                entry.interceptions.push((id, interception.clone()));
                sites.push(entry.site.clone());
            }
        }
        state.installed.push((id, interception.clone()));

        log::debug!(
            "Installed {} interception for '{}' at {} call sites",
            interception.strategy(),
            interception.descriptor,
            sites.len()
        );
        Ok(InterceptionHandle {
            id,
            descriptor: interception.descriptor.clone(),
            sites,
        })
    }

    fn remove(&self, handle: &InterceptionHandle) -> bool {
        let mut state = self.state();
        let before = state.installed.len();
        state.installed.retain(|(id, _)| *id != handle.id);
        if state.installed.len() == before {
            return false;
        }
        for entry in state.sites.iter_mut() {
            entry.interceptions.retain(|(id, _)| *id != handle.id);
        }
        true
    }
}

impl fmt::Debug for CallSiteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        let sites: Vec<String> = state.sites.iter().map(|entry| entry.site.to_string()).collect();
        f.debug_struct("CallSiteTable")
            .field("sites", &sites)
            .field("installed", &state.installed.len())
            .finish()
    }
}
