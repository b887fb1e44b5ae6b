mod settings;

pub use settings::{Config, TomlConfig, TomlRuntimeConfig, ENV_RUNTIME_LIB};
