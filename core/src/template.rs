//! Template pass applied to a byggfil before it is parsed.
//!
//! The byggfil is rendered with Tera. The context holds `env` (the environment
//! store), every script variable including the builtins `VERSION`, `OS` and
//! `ARCH`, and the helpers below, called with named arguments:
//!
//! | helper | arguments | result |
//! |--------|-----------|--------|
//! | `exec` | `prog`, `args` (string or list) | stdout; failure recorded for `ok()` |
//! | `mustexec` | `prog`, `args` | stdout; failure aborts the build |
//! | `ok` | | whether the last `exec`/`mustexec` succeeded |
//! | `env` | `name`, `value` (both optional) | the mapping, one value, or sets one |
//! | `date` | `layout` (strftime) | current local time |
//! | `split` | `text`, `sep` | list of strings |
//! | `join` | `list`, `sep` | string |
//! | `glob` | `patterns` (string or list) | matching paths |
//! | `replace` | `pattern`, `replacement`, `value` | string or list |
//!
//! `env.NAME` inside a tag reads the environment as it is at that point of the
//! render, so values set with `env(name=.., value=..)` are visible to it. A
//! name that is not set reads as an empty string.
//!
//! ```text
//! {% set rev = exec(prog="git", args=["rev-parse", "HEAD"]) | trim %}
//! {% for src in glob(patterns="src/*.c") %}
//! {{ replace(pattern="\.c$", replacement=".o", value=src) }}: {{ src }}
//! {% endfor %}
//! ```

use chrono::format::{Item, StrftimeItems};
use chrono::Local;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tera::{Context, Tera};

use crate::error::{BuildError, Result};
use crate::executor;
use crate::vars::{Environment, Variables};

const DEFAULT_DATE_LAYOUT: &str = "%Y-%m-%d %H:%M:%S";

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{\{.*?\}\}|\{%.*?%\}").unwrap());

/// String literals are matched so that `env.` inside them is left alone.
static ENV_LOOKUP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'|`[^`]*`|(\.?)\benv\.([A-Za-z_][A-Za-z0-9_]*)"#)
        .unwrap()
});

/// State shared by all helpers during one render.
struct TemplateState {
    env: Environment,
    base_dir: PathBuf,
    last_error: Option<String>,
    fatal: Option<BuildError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Helper {
    Exec,
    MustExec,
    Ok,
    Env,
    Date,
    Split,
    Join,
    Glob,
    Replace,
}

impl Helper {
    pub const ALL: [Helper; 9] = [
        Helper::Exec,
        Helper::MustExec,
        Helper::Ok,
        Helper::Env,
        Helper::Date,
        Helper::Split,
        Helper::Join,
        Helper::Glob,
        Helper::Replace,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Helper::Exec => "exec",
            Helper::MustExec => "mustexec",
            Helper::Ok => "ok",
            Helper::Env => "env",
            Helper::Date => "date",
            Helper::Split => "split",
            Helper::Join => "join",
            Helper::Glob => "glob",
            Helper::Replace => "replace",
        }
    }
}

struct HelperFunction {
    helper: Helper,
    state: Arc<Mutex<TemplateState>>,
}

impl tera::Function for HelperFunction {
    fn call(&self, args: &HashMap<String, Value>) -> tera::Result<Value> {
        let mut state = lock(&self.state);
        match self.helper {
            Helper::Exec => exec(&mut state, args, false),
            Helper::MustExec => exec(&mut state, args, true),
            Helper::Ok => Ok(Value::Bool(state.last_error.is_none())),
            Helper::Env => env(&mut state, args),
            Helper::Date => date(args),
            Helper::Split => split(args),
            Helper::Join => join(args),
            Helper::Glob => glob(&state.base_dir, args),
            Helper::Replace => replace(args),
        }
    }

    fn is_safe(&self) -> bool {
        true
    }
}

fn lock(state: &Mutex<TemplateState>) -> MutexGuard<'_, TemplateState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// Renders `source` and joins backslash-continued lines. The environment is
/// lent to the helpers for the duration of the render and handed back with any
/// changes they made, whether or not rendering succeeded.
pub fn preprocess(
    source: &str,
    vars: &Variables,
    env: &mut Environment,
    base_dir: &Path,
) -> Result<String> {
    let mut context = Context::new();
    for (name, value) in vars.iter() {
        context.insert(name.as_str(), value);
    }
    context.insert("env", env.as_map());

    let state = Arc::new(Mutex::new(TemplateState {
        env: std::mem::take(env),
        base_dir: base_dir.to_path_buf(),
        last_error: None,
        fatal: None,
    }));

    let mut tera = Tera::default();
    tera.autoescape_on(vec![]);
    for helper in Helper::ALL {
        tera.register_function(
            helper.name(),
            HelperFunction {
                helper,
                state: Arc::clone(&state),
            },
        );
    }

    let rendered = tera.render_str(&route_env_lookups(source), &context);
    drop(tera);

    let mut state = lock(&state);
    *env = std::mem::take(&mut state.env);

    match rendered {
        Ok(text) => Ok(join_continuations(&text)),
        Err(err) => Err(state
            .fatal
            .take()
            .unwrap_or_else(|| BuildError::Template(format_tera_error(&err)))),
    }
}

/// Rewrites `env.NAME` inside template tags into `env(name="NAME")` calls. The
/// context only holds a snapshot taken before rendering; the helper reads the
/// live environment.
fn route_env_lookups(source: &str) -> Cow<'_, str> {
    TAG.replace_all(source, |tag: &Captures| {
        ENV_LOOKUP
            .replace_all(&tag[0], |found: &Captures| match (found.get(1), found.get(2)) {
                (Some(dot), Some(name)) if dot.as_str().is_empty() => {
                    format!("env(name=\"{}\")", name.as_str())
                }
                _ => found[0].to_string(),
            })
            .into_owned()
    })
}

pub fn join_continuations(text: &str) -> String {
    text.replace("\\\r\n", "").replace("\\\n", "")
}

fn format_tera_error(error: &tera::Error) -> String {
    let mut message = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        let _ = write!(message, ": {}", cause);
        source = cause.source();
    }
    message.replace("'__tera_one_off'", "template")
}

fn required_string(args: &HashMap<String, Value>, helper: &str, name: &str) -> tera::Result<String> {
    match args.get(name) {
        Some(value) => Ok(value_to_string(value)),
        None => Err(tera::Error::msg(format!(
            "{}: missing argument `{}`",
            helper, name
        ))),
    }
}

fn optional_string(args: &HashMap<String, Value>, name: &str) -> Option<String> {
    args.get(name).map(value_to_string)
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Strings and nested lists become one flat list of strings.
fn flatten(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().flat_map(flatten).collect(),
        Value::Null => Vec::new(),
        other => vec![value_to_string(other)],
    }
}

fn string_list(items: impl IntoIterator<Item = String>) -> Value {
    Value::Array(items.into_iter().map(Value::String).collect())
}

fn exec(
    state: &mut TemplateState,
    args: &HashMap<String, Value>,
    must: bool,
) -> tera::Result<Value> {
    let helper = if must { "mustexec" } else { "exec" };
    let program = required_string(args, helper, "prog")?;
    let argv: Vec<String> = args
        .get("args")
        .map(flatten)
        .unwrap_or_default()
        .into_iter()
        .map(|arg| arg.trim().to_string())
        .collect();

    let (stdout, failure) =
        match executor::capture_output(&program, &argv, &state.base_dir, &state.env.to_pairs()) {
            Ok(captured) => {
                let failure = captured.result.into_result(&program).err();
                (captured.stdout, failure)
            }
            Err(err) => (String::new(), Some(err)),
        };

    state.last_error = failure.as_ref().map(ToString::to_string);

    if let Some(err) = failure {
        if must {
            let message = err.to_string();
            state.fatal = Some(err);
            return Err(tera::Error::msg(message));
        }
    }

    Ok(Value::String(stdout))
}

fn env(state: &mut TemplateState, args: &HashMap<String, Value>) -> tera::Result<Value> {
    match (optional_string(args, "name"), args.get("value")) {
        (None, _) => serde_json::to_value(state.env.as_map())
            .map_err(|e| tera::Error::msg(format!("env: {}", e))),
        (Some(name), None) => Ok(Value::String(
            state.env.get(&name).unwrap_or_default().to_string(),
        )),
        (Some(name), Some(value)) => {
            let value = value_to_string(value);
            state.env.set(name, value.clone());
            Ok(Value::String(value))
        }
    }
}

fn date(args: &HashMap<String, Value>) -> tera::Result<Value> {
    let layout = optional_string(args, "layout").unwrap_or_else(|| DEFAULT_DATE_LAYOUT.to_string());
    let items: Vec<Item> = StrftimeItems::new(&layout).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(tera::Error::msg(format!("date: invalid layout {:?}", layout)));
    }

    let mut formatted = String::new();
    write!(formatted, "{}", Local::now().format_with_items(items.iter()))
        .map_err(|_| tera::Error::msg(format!("date: cannot format {:?}", layout)))?;
    Ok(Value::String(formatted))
}

fn split(args: &HashMap<String, Value>) -> tera::Result<Value> {
    let text = required_string(args, "split", "text")?;
    let parts: Vec<String> = match optional_string(args, "sep") {
        Some(sep) if sep.is_empty() => text.chars().map(String::from).collect(),
        Some(sep) => text.split(sep.as_str()).map(String::from).collect(),
        None => text.split_whitespace().map(String::from).collect(),
    };
    Ok(string_list(parts))
}

fn join(args: &HashMap<String, Value>) -> tera::Result<Value> {
    let list = args
        .get("list")
        .map(flatten)
        .ok_or_else(|| tera::Error::msg("join: missing argument `list`"))?;
    let sep = optional_string(args, "sep").unwrap_or_else(|| " ".to_string());
    Ok(Value::String(list.join(&sep)))
}

fn glob(base_dir: &Path, args: &HashMap<String, Value>) -> tera::Result<Value> {
    let patterns = args
        .get("patterns")
        .map(flatten)
        .ok_or_else(|| tera::Error::msg("glob: missing argument `patterns`"))?;

    let base = glob::Pattern::escape(&base_dir.to_string_lossy());
    let mut matches = Vec::new();

    for pattern in patterns {
        let relative = !Path::new(&pattern).is_absolute();
        let full = if relative {
            format!("{}/{}", base.trim_end_matches('/'), pattern)
        } else {
            pattern.clone()
        };

        let Ok(paths) = glob::glob(&full) else {
            continue;
        };

        for path in paths.flatten() {
            let path = if relative {
                path.strip_prefix(base_dir).map(Path::to_path_buf).unwrap_or(path)
            } else {
                path
            };
            matches.push(path.to_string_lossy().into_owned());
        }
    }

    Ok(string_list(matches))
}

fn replace(args: &HashMap<String, Value>) -> tera::Result<Value> {
    let pattern = required_string(args, "replace", "pattern")?;
    let replacement = required_string(args, "replace", "replacement")?;
    let Ok(re) = Regex::new(&pattern) else {
        return Ok(Value::Null);
    };

    let result = match args.get("value") {
        Some(Value::String(one)) => Value::String(re.replace_all(one, replacement.as_str()).into_owned()),
        Some(Value::Array(many)) => string_list(
            many.iter()
                .map(|item| re.replace_all(&value_to_string(item), replacement.as_str()).into_owned()),
        ),
        _ => Value::String(String::new()),
    };

    Ok(result)
}
