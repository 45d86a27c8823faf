//! Configuration: CLI arguments, wrapper settings and service records

mod args;
#[cfg(windows)]
mod registry;
mod settings;
mod store;

pub use args::{Args, Command};
#[cfg(windows)]
pub use registry::RegistryStore;
pub use settings::{Settings, StoreKind};
pub use store::{
    ConfigStore, FileStore, Parameters, ServiceConfig, FIELD_ARGS, FIELD_DISPLAY_NAME,
    FIELD_EXE_PATH, FIELD_WORKING_DIR,
};
