mod registry;
mod selectors;

pub use registry::{ModelRegistry, ModelSpec, CAPABILITY_RACCORD_CHECK, CAPABILITY_RETRY_JUDGE};
pub use selectors::{ModelSelection, ModelSelector};
