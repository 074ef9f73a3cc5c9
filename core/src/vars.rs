use std::collections::HashMap;

/// Version reported by this build of the tool, as seen by scripts.
pub const TOOL_VERSION: &str = concat!("v", env!("CARGO_PKG_VERSION"));

/// Read-only variables available to every script and template.
pub fn builtins(version: &str) -> Vec<(&'static str, String)> {
    vec![
        ("VERSION", version.to_string()),
        ("OS", std::env::consts::OS.to_string()),
        ("ARCH", std::env::consts::ARCH.to_string()),
    ]
}

#[derive(Debug, Clone, Default)]
pub struct Variables {
    values: HashMap<String, String>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins(version: &str) -> Self {
        let mut vars = Self::new();
        for (name, value) in builtins(version) {
            vars.assign(name, value);
        }
        vars
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn assign(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// Appends with a separating space. An unset variable counts as empty, so
    /// the first append leaves a leading space.
    pub fn append(&mut self, name: &str, value: &str) {
        let previous = self.get(name).unwrap_or_default();
        let joined = format!("{} {}", previous, value);
        self.values.insert(name.to_string(), joined);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.values.iter()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Environment {
    values: HashMap<String, String>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_process() -> Self {
        let values = std::env::vars_os()
            .map(|(k, v)| {
                (
                    k.to_string_lossy().into_owned(),
                    v.to_string_lossy().into_owned(),
                )
            })
            .collect();
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// Prepends the current value and a space, but only when `name` is set.
    pub fn append(&mut self, name: &str, value: &str) {
        let joined = match self.get(name) {
            Some(previous) => format!("{} {}", previous, value),
            None => value.to_string(),
        };
        self.values.insert(name.to_string(), joined);
    }

    pub fn as_map(&self) -> &HashMap<String, String> {
        &self.values
    }

    /// `NAME=VALUE` pairs for a child process, skipping unnamed entries.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .values
            .iter()
            .filter(|(k, _)| !k.is_empty())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        pairs.sort();
        pairs
    }
}

/// Expands `$name`, `${name}` and `${env.NAME}` references. Unknown names and
/// unknown contexts expand to the empty string.
pub fn expand(expr: &str, vars: &Variables, env: &Environment) -> String {
    expand_with(expr, |reference| {
        let reference = reference.trim_matches(|c| c == ' ' || c == '\t');
        match reference.split_once('.') {
            Some(("env", name)) => env.get(name).unwrap_or_default().to_string(),
            Some(_) => String::new(),
            None => vars.get(reference).unwrap_or_default().to_string(),
        }
    })
}

pub fn expand_with(expr: &str, lookup: impl Fn(&str) -> String) -> String {
    let bytes = expr.as_bytes();
    let mut out = String::with_capacity(expr.len());
    let mut literal_start = 0;
    let mut j = 0;

    while j < bytes.len() {
        if bytes[j] == b'$' && j + 1 < bytes.len() {
            out.push_str(&expr[literal_start..j]);
            let (name, width) = reference_name(&expr[j + 1..]);
            match name {
                Some(name) => out.push_str(&lookup(name)),
                // `${}` and unterminated `${` are swallowed
                None if width > 0 => {}
                None => out.push('$'),
            }
            j += width;
            literal_start = j + 1;
        }
        j += 1;
    }

    out.push_str(&expr[literal_start.min(expr.len())..]);
    out
}

fn reference_name(s: &str) -> (Option<&str>, usize) {
    let b = s.as_bytes();

    if b[0] == b'{' {
        if b.len() > 2 && is_special(b[1]) && b[2] == b'}' {
            return (Some(&s[1..2]), 3);
        }
        for (i, &c) in b.iter().enumerate().skip(1) {
            if c == b'}' {
                if i == 1 {
                    return (None, 2);
                }
                return (Some(&s[1..i]), i + 1);
            }
        }
        return (None, 1);
    }

    if is_special(b[0]) {
        return (Some(&s[0..1]), 1);
    }

    let len = b
        .iter()
        .take_while(|c| c.is_ascii_alphanumeric() || **c == b'_')
        .count();
    if len == 0 {
        (None, 0)
    } else {
        (Some(&s[..len]), len)
    }
}

fn is_special(c: u8) -> bool {
    matches!(c, b'*' | b'#' | b'$' | b'@' | b'!' | b'?' | b'-' | b'0'..=b'9')
}
