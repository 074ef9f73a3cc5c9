use std::io::ErrorKind;
use std::path::PathBuf;

use crate::command::CommandDispatcher;
use crate::config::{BuildConfig, Settings};
use crate::dependency_graph::TargetGraph;
use crate::error::{BuildError, Result};
use crate::logger::Logger;
use crate::output::Output;
use crate::parser::ScriptParser;
use crate::paths::clean_path;
use crate::template;
use crate::vars::{Environment, Variables, TOOL_VERSION};
use crate::version;

/// What build commands get to see while they run.
pub struct Session {
    pub(crate) base_dir: PathBuf,
    pub(crate) env: Environment,
    pub(crate) output: Output,
    pub(crate) settings: Settings,
    pub(crate) logger: Logger,
    pub(crate) dry_run: bool,
    pub(crate) tool_version: String,
}

impl Session {
    pub fn new(config: &BuildConfig, settings: Settings) -> Self {
        let logger = Logger::new()
            .with_verbosity(config.verbose, config.very_verbose)
            .with_colors(settings.display.colors);
        Self {
            base_dir: config.base_dir.clone(),
            env: Environment::from_process(),
            output: Output::stdout(),
            settings,
            logger,
            dry_run: config.dry_run,
            tool_version: TOOL_VERSION.to_string(),
        }
    }
}

/// One loaded byggfil: its targets, variables and environment.
pub struct Builder {
    config: BuildConfig,
    session: Session,
    graph: TargetGraph,
    vars: Variables,
}

impl Builder {
    pub fn new(config: BuildConfig, settings: Settings) -> Self {
        let session = Session::new(&config, settings);
        let graph = TargetGraph::new(&config.base_dir).with_logger(session.logger.clone());
        Self {
            graph,
            vars: Variables::with_builtins(&session.tool_version),
            session,
            config,
        }
    }

    pub fn with_output(mut self, output: Output) -> Self {
        self.session.output = output;
        self
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.graph = TargetGraph::new(&self.config.base_dir).with_logger(logger.clone());
        self.session.logger = logger;
        self
    }

    /// Reports `version` to scripts and to the version gate instead of this
    /// build's own version.
    pub fn with_tool_version(mut self, version: &str) -> Self {
        self.session.tool_version = version.to_string();
        self
    }

    pub fn graph(&self) -> &TargetGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut TargetGraph {
        &mut self.graph
    }

    pub fn vars(&self) -> &Variables {
        &self.vars
    }

    pub fn env(&self) -> &Environment {
        &self.session.env
    }

    /// Reads the byggfil, checks its version requirement, expands it and parses
    /// the result. Messages printed by the script go to the output sink.
    pub fn load(&mut self) -> Result<()> {
        let path = self.config.build_file_path();
        let source = std::fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => BuildError::MissingBuildFile(path.clone()),
            _ => BuildError::io(&path, e),
        })?;

        version::check_script(&source, &self.session.tool_version)?;

        self.graph =
            TargetGraph::new(&self.session.base_dir).with_logger(self.session.logger.clone());
        self.vars = Variables::with_builtins(&self.session.tool_version);

        let script = template::preprocess(
            &source,
            &self.vars,
            &mut self.session.env,
            &self.session.base_dir,
        )?;

        if self.config.very_verbose {
            self.session
                .logger
                .verbose(&format!("expanded {}:\n{}", path.display(), script));
        }

        ScriptParser::new(
            &mut self.graph,
            &mut self.vars,
            &mut self.session.env,
            &self.session.output,
        )
        .parse(&script)?;

        self.session.logger.verbose(&format!(
            "loaded {} targets from {}",
            self.graph.len(),
            path.display()
        ));

        Ok(())
    }

    /// Brings `target` up to date. Targets already built during this pass are
    /// not looked at again until [`TargetGraph::unresolve_all`].
    pub fn build(&mut self, target: &str) -> Result<()> {
        let name = clean_path(target);
        let mut dispatcher = CommandDispatcher::new(&self.session);
        self.graph.resolve(&name, &mut dispatcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::Captured;
    use std::path::Path;

    fn builder(dir: &Path, script: &str) -> (Builder, Captured) {
        std::fs::write(dir.join("byggfil"), script).unwrap();
        let (output, captured) = Output::captured();
        let config = BuildConfig {
            base_dir: dir.to_path_buf(),
            ..BuildConfig::default()
        };
        let builder = Builder::new(config, Settings::default())
            .with_output(output)
            .with_tool_version("v1.9.0");
        (builder, captured)
    }

    #[test]
    fn test_missing_build_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = BuildConfig {
            base_dir: dir.path().to_path_buf(),
            ..BuildConfig::default()
        };
        let mut builder = Builder::new(config, Settings::default());
        assert!(matches!(builder.load(), Err(BuildError::MissingBuildFile(_))));
    }

    #[test]
    fn test_version_gate_runs_before_parsing() {
        let dir = tempfile::tempdir().unwrap();
        let (mut builder, captured) = builder(dir.path(), "## bygg: ^2.0.0\n<< parsed\nA:\n");

        assert!(matches!(
            builder.load(),
            Err(BuildError::VersionIncompatible(_))
        ));
        assert!(builder.graph().is_empty());
        assert_eq!(captured.contents(), "");
    }

    #[test]
    fn test_message_command_versus_immediate_message() {
        let dir = tempfile::tempdir().unwrap();
        let (mut builder, captured) = builder(dir.path(), "A:\nA <- << hello\n<< world\n");

        builder.load().unwrap();
        assert_eq!(captured.contents(), "world\n");

        builder.build("A").unwrap();
        assert_eq!(captured.contents(), "world\nhello\n");
    }

    #[test]
    fn test_template_variables_reach_the_parser() {
        let dir = tempfile::tempdir().unwrap();
        let (mut builder, captured) = builder(dir.path(), "<< {{ VERSION }}\nv = {{ OS }}\n");

        builder.load().unwrap();
        assert_eq!(captured.contents(), "v1.9.0\n");
        assert_eq!(builder.vars().get("v"), Some(std::env::consts::OS));
    }

    #[test]
    fn test_unknown_target() {
        let dir = tempfile::tempdir().unwrap();
        let (mut builder, _) = builder(dir.path(), "all:\n");

        builder.load().unwrap();
        assert!(matches!(
            builder.build("other"),
            Err(BuildError::UnknownTarget(_))
        ));
    }

    #[test]
    fn test_requested_name_is_cleaned() {
        let dir = tempfile::tempdir().unwrap();
        let (mut builder, captured) = builder(dir.path(), "out/app << built\n");

        builder.load().unwrap();
        builder.build("./out//app").unwrap();
        assert_eq!(captured.contents(), "built\n");
    }
}
