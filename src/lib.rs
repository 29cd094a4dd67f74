pub mod core;

pub use crate::core::config::{JsonConfigStore, LaunchArguments, ResolverConfig};
pub use crate::core::environment::Environment;
pub use crate::core::error::{LauncherError, LauncherResult};
pub use crate::core::resolver::{LogProgressSink, ProgressSink, ResolvedLaunch, Resolver};
pub use crate::core::sources::{Endpoints, ResolutionContext};
