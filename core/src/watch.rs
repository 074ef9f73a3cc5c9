use std::thread;
use std::time::{Duration, SystemTime};

use crate::builder::Builder;
use crate::dependency_graph::TargetGraph;
use crate::error::{BuildError, Result};
use crate::logger::Logger;

/// Rebuilds a target whenever something in its dependency closure changes.
pub struct Watcher {
    poll_interval: Duration,
    logger: Logger,
}

impl Watcher {
    pub fn new(poll_interval: Duration, logger: Logger) -> Self {
        Self {
            poll_interval,
            logger,
        }
    }

    /// Builds `target`, then waits for a change and builds again, forever.
    /// Build failures go to `report`; only a failure to inspect the dependency
    /// closure ends the loop.
    pub fn run<F>(&self, builder: &mut Builder, target: &str, mut report: F) -> Result<()>
    where
        F: FnMut(&BuildError),
    {
        loop {
            if let Err(err) = builder.build(target) {
                report(&err);
            }
            builder.graph_mut().unresolve_all();

            self.wait_for_change(builder.graph_mut(), target, SystemTime::now())?;
        }
    }

    /// Blocks until the newest modification time in `target`'s closure is
    /// later than `since`.
    pub fn wait_for_change(
        &self,
        graph: &mut TargetGraph,
        target: &str,
        since: SystemTime,
    ) -> Result<()> {
        self.logger
            .verbose(&format!("waiting for changes to {}", target));

        loop {
            if let Some(updated) = graph.last_updated(target)? {
                if updated > since {
                    self.logger.verbose(&format!("{} changed, rebuilding", target));
                    return Ok(());
                }
            }
            thread::sleep(self.poll_interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn test_wait_returns_after_dependency_changes() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("main.c");
        File::create(&source)
            .unwrap()
            .set_modified(SystemTime::now() - Duration::from_secs(60))
            .unwrap();

        let mut graph = TargetGraph::new(dir.path());
        graph.target_mut("app").dependencies = vec!["main.c".to_string()];

        let since = SystemTime::now() - Duration::from_secs(1);
        let toucher = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            File::options()
                .write(true)
                .open(&source)
                .unwrap()
                .set_modified(SystemTime::now())
                .unwrap();
        });

        let watcher = Watcher::new(Duration::from_millis(10), Logger::new());
        watcher.wait_for_change(&mut graph, "app", since).unwrap();
        toucher.join().unwrap();
    }

    #[test]
    fn test_wait_reports_cycles() {
        let dir = tempfile::tempdir().unwrap();
        let mut graph = TargetGraph::new(dir.path());
        graph.target_mut("a").dependencies = vec!["b".to_string()];
        graph.target_mut("b").dependencies = vec!["a".to_string()];

        let watcher = Watcher::new(Duration::from_millis(10), Logger::new());
        let result = watcher.wait_for_change(&mut graph, "a", SystemTime::now());
        assert!(matches!(result, Err(BuildError::CyclicDependency(_))));
    }
}
