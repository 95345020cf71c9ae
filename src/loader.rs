//! Module loader for the creative isolate: refuses everything.
//!
//! A creative runs exactly the source injected into it; there is no module
//! graph, no filesystem, no network. Static imports cannot occur (injected
//! source is evaluated as a classic script), so this loader exists to shut
//! the dynamic-import door as well.

use deno_core::{
    anyhow::{anyhow, Error},
    ModuleLoadResponse, ModuleLoader, ModuleSpecifier, RequestedModuleType, ResolutionKind,
};

/// A loader with no allowed modules at all.
pub struct InertLoader;

impl ModuleLoader for InertLoader {
    fn resolve(
        &self,
        specifier: &str,
        _referrer: &str,
        _kind: ResolutionKind,
    ) -> Result<ModuleSpecifier, Error> {
        Err(anyhow!(
            "imports are forbidden in the creative sandbox: {}",
            specifier
        ))
    }

    fn load(
        &self,
        module_specifier: &ModuleSpecifier,
        _maybe_referrer: Option<&ModuleSpecifier>,
        _is_dyn_import: bool,
        _requested_module_type: RequestedModuleType,
    ) -> ModuleLoadResponse {
        ModuleLoadResponse::Sync(Err(anyhow!(
            "imports are forbidden in the creative sandbox: {}",
            module_specifier
        )))
    }
}
