//! Log record types.
//!
//! A record is built once per log call and handed to every sink of the
//! registry entry. Sinks that ship structured data (socket, queue) send
//! the record itself; the rest only see the formatted line.

use std::panic::Location;
use std::path::Path;

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::level::Level;

/// Name used for threads that were spawned without one.
pub const UNNAMED_THREAD: &str = "<unnamed>";

/// Placeholder for a function name that could not be determined.
pub const UNKNOWN_FUNCTION: &str = "?";

/// Where a log call was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CallSite {
    /// Source file stem
    pub module: &'static str,
    /// Enclosing function, `?` when unknown
    pub function: &'static str,
    /// Source file
    pub file: &'static str,
    /// Line number
    pub line: u32,
}

impl CallSite {
    /// Build a call site; the module is the stem of `file`.
    pub fn new(file: &'static str, function: &'static str, line: u32) -> Self {
        let module = Path::new(file)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(file);
        Self {
            module,
            function,
            file,
            line,
        }
    }

    /// Build a call site from a `#[track_caller]` location.
    ///
    /// The function name is not available this way and is rendered as `?`.
    pub fn from_location(location: &'static Location<'static>) -> Self {
        Self::new(location.file(), UNKNOWN_FUNCTION, location.line())
    }

    /// Capture the caller of the current function.
    #[track_caller]
    pub fn caller() -> Self {
        Self::from_location(Location::caller())
    }
}

/// A single log event with everything the formatter may render.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    /// Creation time
    pub timestamp: DateTime<Local>,
    /// Severity
    pub level: Level,
    /// Registry name of the logger that produced the record
    pub logger: String,
    /// Application label, if configured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
    /// Process id
    pub pid: u32,
    /// Emitting thread's name
    pub thread: String,
    /// Instance label injected by the facade
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    /// Call-site metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_site: Option<CallSite>,
    /// Rendered message
    pub message: String,
}

impl LogRecord {
    /// Create a record stamped with the current time, process and thread.
    pub fn new(logger: impl Into<String>, level: Level, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            level,
            logger: logger.into(),
            app_name: None,
            pid: std::process::id(),
            thread: current_thread_name(),
            instance: None,
            call_site: None,
            message: message.into(),
        }
    }

    /// Attach an instance label.
    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    /// Attach call-site metadata.
    pub fn with_call_site(mut self, call_site: CallSite) -> Self {
        self.call_site = Some(call_site);
        self
    }

    /// Attach an application label.
    pub fn with_app_name(mut self, app_name: Option<String>) -> Self {
        self.app_name = app_name;
        self
    }

    /// Serialize to a single JSON line (no trailing newline).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

fn current_thread_name() -> String {
    std::thread::current()
        .name()
        .unwrap_or(UNNAMED_THREAD)
        .to_string()
}

/// Name of the enclosing function, resolved at compile time.
#[doc(hidden)]
#[macro_export]
macro_rules! __function_name {
    () => {{
        fn f() {}
        fn type_name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        let name = type_name_of(f);
        let name = name.strip_suffix("::f").unwrap_or(name);
        let name = name.trim_end_matches("::{{closure}}");
        match name.rfind("::") {
            Some(pos) => &name[pos + 2..],
            None => name,
        }
    }};
}

/// Call site of the macro invocation, including the enclosing function.
#[doc(hidden)]
#[macro_export]
macro_rules! __call_site {
    () => {
        $crate::CallSite::new(file!(), $crate::__function_name!(), line!())
    };
}
