use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::{BuildError, Result};
use crate::logger::Logger;
use crate::paths;
use crate::target::Target;

/// Executes one build command on behalf of a target.
pub trait CommandRunner {
    fn run(&mut self, target: &str, command: &str) -> Result<()>;
}

/// Every target of a byggfil, keyed by cleaned name, plus the bookkeeping for
/// one resolution pass.
pub struct TargetGraph {
    targets: HashMap<String, Target>,
    visiting: HashSet<String>,
    base_dir: PathBuf,
    logger: Logger,
}

impl TargetGraph {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            targets: HashMap::new(),
            visiting: HashSet::new(),
            base_dir: base_dir.into(),
            logger: Logger::new(),
        }
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn get(&self, name: &str) -> Option<&Target> {
        self.targets.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.targets.contains_key(name)
    }

    /// The named target, created empty on first mention.
    pub fn target_mut(&mut self, name: &str) -> &mut Target {
        self.targets
            .entry(name.to_string())
            .or_insert_with(|| Target::new(name))
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Forgets which targets were built, so the next pass re-evaluates all of them.
    pub fn unresolve_all(&mut self) {
        for target in self.targets.values_mut() {
            target.resolved = false;
        }
    }

    /// Brings `name` up to date, building stale dependencies first.
    pub fn resolve(&mut self, name: &str, runner: &mut dyn CommandRunner) -> Result<()> {
        if self.targets.get(name).map_or(false, |t| t.resolved) {
            return Ok(());
        }

        if !self.visiting.insert(name.to_string()) {
            return Err(BuildError::CyclicDependency(name.to_string()));
        }
        let result = self.resolve_visiting(name, runner);
        self.visiting.remove(name);

        result
    }

    fn resolve_visiting(&mut self, name: &str, runner: &mut dyn CommandRunner) -> Result<()> {
        let dependencies = match self.targets.get(name) {
            Some(target) => target.dependencies.clone(),
            None => return Err(BuildError::UnknownTarget(name.to_string())),
        };

        let mut newest_dependency: Option<SystemTime> = None;

        for dependency in &dependencies {
            if !self.targets.contains_key(dependency) {
                if !paths::exists(&self.base_dir, dependency) {
                    return Err(BuildError::UnknownDependency {
                        target: name.to_string(),
                        dependency: dependency.clone(),
                    });
                }
                self.targets
                    .insert(dependency.clone(), Target::new(dependency.as_str()));
            }

            self.resolve(dependency, runner)?;

            let modified = self.targets.get(dependency).and_then(|t| t.modified_at);
            newest_dependency = newest_dependency.max(modified);
        }

        let (force, commands) = match self.targets.get(name) {
            Some(target) => (target.force, target.build_commands.clone()),
            None => return Err(BuildError::UnknownTarget(name.to_string())),
        };

        let stale = force
            || match (paths::modified_time(&self.base_dir, name), newest_dependency) {
                (None, _) => true,
                (Some(own), Some(newest)) => own < newest,
                (Some(_), None) => false,
            };

        if stale {
            self.logger.verbose(&format!("{} is stale", name));
            for command in &commands {
                self.logger.verbose(&format!("{}: {}", name, command));
                runner.run(name, command)?;
            }
        } else {
            self.logger.verbose(&format!("{} is up to date", name));
        }

        let modified_at =
            paths::modified_time(&self.base_dir, name).unwrap_or_else(SystemTime::now);
        if let Some(target) = self.targets.get_mut(name) {
            target.resolved = true;
            target.modified_at = Some(modified_at);
        }

        Ok(())
    }

    /// Newest modification time across `name` and everything it depends on.
    /// Undeclared dependencies contribute their file's time, missing files nothing.
    pub fn last_updated(&mut self, name: &str) -> Result<Option<SystemTime>> {
        if !self.visiting.insert(name.to_string()) {
            return Err(BuildError::CyclicDependency(name.to_string()));
        }
        let result = self.last_updated_visiting(name);
        self.visiting.remove(name);

        result
    }

    fn last_updated_visiting(&mut self, name: &str) -> Result<Option<SystemTime>> {
        let mut newest = paths::modified_time(&self.base_dir, name);

        let dependencies = self
            .targets
            .get(name)
            .map(|t| t.dependencies.clone())
            .unwrap_or_default();

        for dependency in &dependencies {
            let modified = if self.targets.contains_key(dependency) {
                self.last_updated(dependency)?
            } else {
                paths::modified_time(&self.base_dir, dependency)
            };
            newest = newest.max(modified);
        }

        Ok(newest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingRunner {
        runs: Vec<(String, String)>,
        fail_on: Option<String>,
    }

    impl CommandRunner for RecordingRunner {
        fn run(&mut self, target: &str, command: &str) -> Result<()> {
            if self.fail_on.as_deref() == Some(command) {
                return Err(BuildError::command(format!("{} failed", command)));
            }
            self.runs.push((target.to_string(), command.to_string()));
            Ok(())
        }
    }

    impl RecordingRunner {
        fn commands(&self) -> Vec<&str> {
            self.runs.iter().map(|(_, c)| c.as_str()).collect()
        }
    }

    fn declare(graph: &mut TargetGraph, name: &str, deps: &[&str], commands: &[&str]) {
        let target = graph.target_mut(name);
        target.dependencies = deps.iter().map(|d| d.to_string()).collect();
        target.build_commands = commands.iter().map(|c| c.to_string()).collect();
    }

    fn touch(dir: &Path, name: &str, age: Duration) {
        let path = dir.join(name);
        let file = File::create(&path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    #[test]
    fn test_missing_target_runs_commands_once_in_order() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "x.c", Duration::from_secs(10));

        let mut graph = TargetGraph::new(dir.path());
        declare(&mut graph, "a", &["x.c"], &["first", "second"]);

        let mut runner = RecordingRunner::default();
        graph.resolve("a", &mut runner).unwrap();
        graph.resolve("a", &mut runner).unwrap();

        assert_eq!(runner.commands(), vec!["first", "second"]);
        assert!(graph.get("a").unwrap().resolved);
        assert!(graph.get("x.c").unwrap().resolved);
    }

    #[test]
    fn test_up_to_date_target_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "x.c", Duration::from_secs(100));
        touch(dir.path(), "x.o", Duration::from_secs(10));

        let mut graph = TargetGraph::new(dir.path());
        declare(&mut graph, "x.o", &["x.c"], &["cc"]);

        let mut runner = RecordingRunner::default();
        graph.resolve("x.o", &mut runner).unwrap();
        assert!(runner.runs.is_empty());
    }

    #[test]
    fn test_older_target_is_rebuilt() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "x.c", Duration::from_secs(10));
        touch(dir.path(), "x.o", Duration::from_secs(100));

        let mut graph = TargetGraph::new(dir.path());
        declare(&mut graph, "x.o", &["x.c"], &["cc"]);

        let mut runner = RecordingRunner::default();
        graph.resolve("x.o", &mut runner).unwrap();
        assert_eq!(runner.commands(), vec!["cc"]);
    }

    #[test]
    fn test_forced_target_always_rebuilds() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "x.c", Duration::from_secs(100));
        touch(dir.path(), "x.o", Duration::from_secs(10));

        let mut graph = TargetGraph::new(dir.path());
        declare(&mut graph, "x.o", &["x.c"], &["cc"]);
        graph.target_mut("x.o").force = true;

        let mut runner = RecordingRunner::default();
        graph.resolve("x.o", &mut runner).unwrap();
        graph.unresolve_all();
        graph.resolve("x.o", &mut runner).unwrap();
        assert_eq!(runner.commands(), vec!["cc", "cc"]);
    }

    #[test]
    fn test_cycle_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let mut graph = TargetGraph::new(dir.path());
        declare(&mut graph, "a", &["b"], &[]);
        declare(&mut graph, "b", &["c"], &[]);
        declare(&mut graph, "c", &["a"], &[]);

        let result = graph.resolve("a", &mut RecordingRunner::default());
        assert!(matches!(result, Err(BuildError::CyclicDependency(name)) if name == "a"));
        assert!(graph.visiting.is_empty());
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let mut graph = TargetGraph::new(dir.path());
        declare(&mut graph, "a", &["a"], &[]);

        let result = graph.resolve("a", &mut RecordingRunner::default());
        assert!(matches!(result, Err(BuildError::CyclicDependency(_))));
    }

    #[test]
    fn test_shared_dependency_is_built_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut graph = TargetGraph::new(dir.path());
        declare(&mut graph, "all", &["left", "right"], &["all"]);
        declare(&mut graph, "left", &["base"], &["left"]);
        declare(&mut graph, "right", &["base"], &["right"]);
        declare(&mut graph, "base", &[], &["base"]);

        let mut runner = RecordingRunner::default();
        graph.resolve("all", &mut runner).unwrap();
        assert_eq!(runner.commands(), vec!["base", "left", "right", "all"]);
    }

    #[test]
    fn test_unknown_dependency() {
        let dir = tempfile::tempdir().unwrap();
        let mut graph = TargetGraph::new(dir.path());
        declare(&mut graph, "a", &["nowhere.c"], &[]);

        let result = graph.resolve("a", &mut RecordingRunner::default());
        match result {
            Err(BuildError::UnknownDependency { target, dependency }) => {
                assert_eq!(target, "a");
                assert_eq!(dependency, "nowhere.c");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_target() {
        let dir = tempfile::tempdir().unwrap();
        let mut graph = TargetGraph::new(dir.path());

        let result = graph.resolve("missing", &mut RecordingRunner::default());
        assert!(matches!(result, Err(BuildError::UnknownTarget(_))));
    }

    #[test]
    fn test_failed_command_leaves_target_unresolved() {
        let dir = tempfile::tempdir().unwrap();
        let mut graph = TargetGraph::new(dir.path());
        declare(&mut graph, "a", &[], &["ok", "boom", "never"]);

        let mut runner = RecordingRunner {
            fail_on: Some("boom".to_string()),
            ..Default::default()
        };
        assert!(graph.resolve("a", &mut runner).is_err());
        assert!(!graph.get("a").unwrap().resolved);
        assert_eq!(runner.commands(), vec!["ok"]);

        runner.fail_on = None;
        graph.resolve("a", &mut runner).unwrap();
        assert_eq!(runner.commands(), vec!["ok", "ok", "boom", "never"]);
    }

    #[test]
    fn test_phony_target_gets_current_time() {
        let dir = tempfile::tempdir().unwrap();
        let mut graph = TargetGraph::new(dir.path());
        declare(&mut graph, "phony", &[], &[]);

        let before = SystemTime::now();
        graph.resolve("phony", &mut RecordingRunner::default()).unwrap();
        let modified = graph.get("phony").unwrap().modified_at.unwrap();
        assert!(modified >= before);
    }

    #[test]
    fn test_last_updated_walks_the_closure() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "old.c", Duration::from_secs(100));
        touch(dir.path(), "new.h", Duration::from_secs(5));

        let mut graph = TargetGraph::new(dir.path());
        declare(&mut graph, "app", &["obj"], &[]);
        declare(&mut graph, "obj", &["old.c", "new.h", "gone.h"], &[]);

        let newest = graph.last_updated("app").unwrap();
        assert_eq!(newest, paths::modified_time(dir.path(), "new.h"));

        declare(&mut graph, "new.h", &["app"], &[]);
        assert!(matches!(
            graph.last_updated("app"),
            Err(BuildError::CyclicDependency(_))
        ));
        assert!(graph.visiting.is_empty());
    }
}
