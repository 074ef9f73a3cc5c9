use once_cell::sync::Lazy;
use regex::Regex;

use crate::dependency_graph::TargetGraph;
use crate::error::{BuildError, Result};
use crate::output::Output;
use crate::paths::clean_path;
use crate::split::split_quoted;
use crate::vars::{expand, Environment, Variables};

static STATEMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([\w._\-/${}]+)\s*(:|=|\+=|<-|<<)\s*(.*)$").unwrap());

const MESSAGE_PREFIX: &str = "<<";

/// Reads an expanded byggfil line by line into the target graph and the
/// variable and environment stores.
pub struct ScriptParser<'a> {
    graph: &'a mut TargetGraph,
    vars: &'a mut Variables,
    env: &'a mut Environment,
    output: &'a Output,
}

impl<'a> ScriptParser<'a> {
    pub fn new(
        graph: &'a mut TargetGraph,
        vars: &'a mut Variables,
        env: &'a mut Environment,
        output: &'a Output,
    ) -> Self {
        Self {
            graph,
            vars,
            env,
            output,
        }
    }

    pub fn parse(&mut self, script: &str) -> Result<()> {
        for (index, line) in script.lines().enumerate() {
            self.parse_line(line)
                .map_err(|e| match e {
                    BuildError::Parse(message) => {
                        BuildError::Parse(format!("line {}: {}", index + 1, message))
                    }
                    other => other,
                })?;
        }
        Ok(())
    }

    pub fn parse_line(&mut self, line: &str) -> Result<()> {
        let line = line.trim_start_matches([' ', '\t']);

        if line.is_empty() || line.starts_with('#') {
            return Ok(());
        }

        if let Some(message) = line.strip_prefix(MESSAGE_PREFIX) {
            let message = message.trim_matches([' ', '\t']);
            return self.output.emit(&self.expand(message));
        }

        let caps = STATEMENT
            .captures(line)
            .ok_or_else(|| BuildError::Parse(format!("invalid statement {:?}", line)))?;

        let lvalue = self.expand(&caps[1]);
        let operator = &caps[2];
        let rvalue = self.expand(&caps[3]);

        match operator {
            ":" => self.declare_dependencies(&lvalue, &rvalue),
            "=" => self.assign(&lvalue, &rvalue, false),
            "+=" => self.assign(&lvalue, &rvalue, true),
            "<-" => {
                self.add_command(&lvalue, rvalue);
                Ok(())
            }
            "<<" => {
                self.add_command(&lvalue, format!("{} {}", MESSAGE_PREFIX, rvalue));
                Ok(())
            }
            other => Err(BuildError::Parse(format!("unknown operator {:?}", other))),
        }
    }

    fn expand(&self, text: &str) -> String {
        expand(text, self.vars, self.env)
    }

    fn declare_dependencies(&mut self, name: &str, rvalue: &str) -> Result<()> {
        let mut deps = rvalue.trim_start();
        let mut force = false;
        if deps.starts_with('!') {
            force = true;
            deps = deps.trim_start_matches('!');
        }

        let dependencies = split_quoted(deps)?;

        let target = self.graph.target_mut(&clean_path(name));
        target.force |= force;
        target
            .dependencies
            .extend(dependencies.iter().map(|d| clean_path(d)));

        Ok(())
    }

    fn assign(&mut self, lvalue: &str, value: &str, append: bool) -> Result<()> {
        match lvalue.split_once('.') {
            Some(("env", name)) if append => self.env.append(name, value),
            Some(("env", name)) => self.env.set(name, value),
            Some((context, _)) => return Err(BuildError::UnknownContext(context.to_string())),
            None if append => self.vars.append(lvalue, value),
            None => self.vars.assign(lvalue, value),
        }
        Ok(())
    }

    fn add_command(&mut self, name: &str, command: String) {
        self.graph
            .target_mut(&clean_path(name))
            .build_commands
            .push(command);
    }
}
