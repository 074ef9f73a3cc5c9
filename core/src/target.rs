use std::fmt;
use std::time::SystemTime;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Target {
    pub name: String,
    pub dependencies: Vec<String>,
    pub build_commands: Vec<String>,
    pub force: bool,
    pub resolved: bool,
    pub modified_at: Option<SystemTime>,
}

impl Target {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn has_commands(&self) -> bool {
        !self.build_commands.is_empty()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if self.force {
            write!(f, " (forced)")?;
        }
        if !self.dependencies.is_empty() {
            write!(f, ": {}", self.dependencies.join(" "))?;
        }
        Ok(())
    }
}
