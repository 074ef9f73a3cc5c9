pub mod builder;
pub mod builtins;
pub mod cli;
pub mod command;
pub mod config;
pub mod dependency_graph;
pub mod error;
pub mod executor;
pub mod logger;
pub mod output;
pub mod parser;
pub mod paths;
pub mod split;
pub mod target;
pub mod template;
pub mod vars;
pub mod version;
pub mod watch;

pub use builder::{Builder, Session};
pub use cli::Cli;
pub use command::CommandDispatcher;
pub use config::{BuildConfig, Settings};
pub use dependency_graph::{CommandRunner, TargetGraph};
pub use error::{BuildError, Result};
pub use output::Output;
pub use target::Target;
pub use vars::{Environment, Variables, TOOL_VERSION};
pub use watch::Watcher;
