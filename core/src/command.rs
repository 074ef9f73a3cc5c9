use std::path::Path;

use crate::builder::{Builder, Session};
use crate::builtins::{self, Downloader, CLEAN, COPY, HTTP, MKDIR};
use crate::cli::Cli;
use crate::dependency_graph::CommandRunner;
use crate::error::{BuildError, Result};
use crate::executor;
use crate::logger::{LogLevel, Logger};
use crate::split::split_quoted;

/// Runs build commands for a session: in-process verbs first, then external
/// programs.
pub struct CommandDispatcher<'a> {
    session: &'a Session,
}

impl<'a> CommandDispatcher<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    fn base_dir(&self) -> &Path {
        &self.session.base_dir
    }

    fn nested_build(&self, args: &[String]) -> Result<()> {
        let cli = Cli::from_command_args(args)?;
        let mut config = cli.build_config();
        if config.base_dir.is_relative() {
            config.base_dir = self.base_dir().join(&config.base_dir);
        }

        let settings = self.session.settings.clone();
        let logger = Logger::new()
            .with_verbosity(config.verbose, config.very_verbose)
            .with_colors(settings.display.colors);
        let target = config.target.clone();

        let mut builder = Builder::new(config, settings)
            .with_output(self.session.output.clone())
            .with_logger(logger)
            .with_tool_version(&self.session.tool_version);
        builder.load()?;
        builder.build(&target)
    }

    fn download(&self, target: &str, url: &str, args: &[String]) -> Result<()> {
        let downloader = Downloader::new(&self.session.settings.http, self.session.logger.clone())?;
        let dir = crate::paths::resolve(self.base_dir(), target);
        downloader.download(&dir, url, args.first().map(String::as_str))?;
        Ok(())
    }

    fn copy(&self, target: &str, program: &str, args: &[String]) -> Result<()> {
        let mut source = program[COPY.len()..].trim();
        if source.is_empty() {
            source = args
                .first()
                .map(|arg| arg.trim())
                .ok_or_else(|| BuildError::command("nothing to copy"))?;
        }
        builtins::copy(self.base_dir(), source, target)
    }

    fn spawn(&self, program: &str, args: &[String]) -> Result<()> {
        let output = &self.session.output;
        let logger = &self.session.logger;
        let result = executor::execute_step(
            program,
            args,
            self.base_dir(),
            &self.session.env.to_pairs(),
            |chunk| {
                if let Err(e) = output.write(&chunk) {
                    logger.log(
                        LogLevel::Warning,
                        &format!("bygg: cannot write output of {:?}: {}", program, e),
                    );
                }
            },
        )?;
        result.into_result(program).map(|_| ())
    }
}

/// `clean:` and `mkdir:` act on the target itself when no path follows the verb.
fn path_or_target<'s>(path: &'s str, target: &'s str) -> &'s str {
    if path.is_empty() {
        target
    } else {
        path
    }
}

impl CommandRunner for CommandDispatcher<'_> {
    fn run(&mut self, target: &str, command: &str) -> Result<()> {
        if self.session.dry_run {
            return self
                .session
                .output
                .emit(&format!("Not running command {:?}", command));
        }

        let mut parts = split_quoted(command)?;
        if parts.is_empty() {
            return Ok(());
        }
        let program = parts.remove(0);
        let args = parts;

        self.session.logger.verbose(&format!(
            "Running command {:?} with args {:?}",
            program, args
        ));

        match program.as_str() {
            "<<" => self.session.output.emit(&args.join(" ")),
            "bygg" => self.nested_build(&args),
            p if p.starts_with(HTTP) => self.download(target, p, &args),
            p if p.starts_with(CLEAN) => {
                let recursive = args.first().map_or(false, |arg| arg == "-r");
                builtins::clean(
                    self.base_dir(),
                    path_or_target(&p[CLEAN.len()..], target),
                    recursive,
                )
            }
            p if p.starts_with(MKDIR) => {
                builtins::make_dir(self.base_dir(), path_or_target(&p[MKDIR.len()..], target))
            }
            p if p.starts_with(COPY) => self.copy(target, p, &args),
            p => self.spawn(p, &args),
        }
    }
}
