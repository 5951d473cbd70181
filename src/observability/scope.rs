//! ObservationScope for begin/complete logging around a multi-step operation
//!
//! - `{name}_BEGIN` on creation (INFO)
//! - `{name}_COMPLETE` on `complete()` (INFO)
//! - `{name}_FAILED` on `fail()` (ERROR) or `fail_fatal()` (FATAL)
//! - `{name}_INCOMPLETE` on drop without either (WARN)

use std::time::Instant;

use super::logger::Logger;

/// Logs the start and end of an operation
pub struct ObservationScope<'a> {
    name: &'a str,
    fields: Vec<(&'a str, String)>,
    started: Instant,
    finished: bool,
}

impl<'a> ObservationScope<'a> {
    /// Opens a scope and logs `{name}_BEGIN`.
    pub fn new(name: &'a str) -> Self {
        Self::with_fields(name, &[])
    }

    /// Opens a scope whose fields are repeated on every line it logs.
    pub fn with_fields(name: &'a str, fields: &[(&'a str, &str)]) -> Self {
        Logger::info(&format!("{}_BEGIN", name), fields);
        Self {
            name,
            fields: fields.iter().map(|(k, v)| (*k, v.to_string())).collect(),
            started: Instant::now(),
            finished: false,
        }
    }

    fn fields_with<'b>(&'b self, extra: &[(&'b str, &'b str)]) -> Vec<(&'b str, &'b str)> {
        let mut all: Vec<(&str, &str)> = self.fields.iter().map(|(k, v)| (*k, v.as_str())).collect();
        all.extend(extra.iter().copied());
        all
    }

    /// Logs `{name}_COMPLETE` with the elapsed time and any extra fields.
    pub fn complete(mut self, extra: &[(&str, &str)]) {
        self.finished = true;
        let elapsed = self.started.elapsed().as_millis().to_string();
        let mut fields = self.fields_with(extra);
        fields.push(("elapsed_ms", &elapsed));
        Logger::info(&format!("{}_COMPLETE", self.name), &fields);
    }

    /// Logs `{name}_FAILED` at ERROR.
    pub fn fail(mut self, reason: &str) {
        self.finished = true;
        let fields = self.fields_with(&[("reason", reason)]);
        Logger::error(&format!("{}_FAILED", self.name), &fields);
    }

    /// Logs `{name}_FAILED` at FATAL.
    pub fn fail_fatal(mut self, reason: &str) {
        self.finished = true;
        let fields = self.fields_with(&[("reason", reason)]);
        Logger::fatal(&format!("{}_FAILED", self.name), &fields);
    }
}

impl Drop for ObservationScope<'_> {
    fn drop(&mut self) {
        if !self.finished {
            let fields = self.fields_with(&[("reason", "scope dropped without completion")]);
            Logger::warn(&format!("{}_INCOMPLETE", self.name), &fields);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_complete() {
        let scope = ObservationScope::with_fields("TEST", &[("dir", "/tmp/q")]);
        scope.complete(&[("pages", "2")]);
    }

    #[test]
    fn test_scope_fail_paths() {
        ObservationScope::new("TEST").fail("io error");
        ObservationScope::new("TEST").fail_fatal("inconsistent checkpoint");
    }

    #[test]
    fn test_scope_drop_without_finish() {
        let scope = ObservationScope::new("TEST");
        drop(scope);
    }
}
