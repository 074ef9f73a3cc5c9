use chrono::Local;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    fn color(&self) -> &'static str {
        match self {
            LogLevel::Debug => "\x1b[90m",
            LogLevel::Info => "\x1b[37m",
            LogLevel::Warning => "\x1b[33m",
            LogLevel::Error => "\x1b[31m",
        }
    }
}

/// Diagnostics about the build itself. Output produced *by* the build goes to
/// [`crate::output::Output`] instead.
#[derive(Debug, Clone)]
pub struct Logger {
    use_colors: bool,
    verbose: bool,
    timestamps: bool,
}

impl Logger {
    pub fn new() -> Self {
        Self {
            use_colors: atty::is(atty::Stream::Stdout),
            verbose: false,
            timestamps: false,
        }
    }

    pub fn with_verbosity(mut self, verbose: bool, very_verbose: bool) -> Self {
        self.verbose = verbose || very_verbose;
        self.timestamps = very_verbose;
        self
    }

    pub fn with_colors(mut self, enabled: bool) -> Self {
        self.use_colors = self.use_colors && enabled;
        self
    }

    pub fn verbose(&self, message: &str) {
        if self.verbose {
            self.log(LogLevel::Debug, &format!("bygg: {}", message));
        }
    }

    pub fn log(&self, level: LogLevel, message: &str) {
        let line = self.format(level, message);
        if level >= LogLevel::Warning {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
    }

    fn format(&self, level: LogLevel, message: &str) -> String {
        let message = if self.timestamps {
            format!("[{}] {}", Local::now().format("%H:%M:%S%.3f"), message)
        } else {
            message.to_string()
        };

        if self.use_colors {
            format!("{}{}\x1b[0m", level.color(), message)
        } else {
            message
        }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}
