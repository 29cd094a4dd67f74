mod arguments;
mod settings;

pub use arguments::LaunchArguments;
pub use settings::{
    ConfigStore, JsonConfigStore, NullConfigStore, ResolverConfig, CONFIG_FILE_NAME,
    CURRENT_CONFIG_VERSION,
};
