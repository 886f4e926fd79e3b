//! Collaborators supplied by the host application.

/// Receives compile results: errors, warnings and decompiled text.
pub trait LogSink {
    fn log(&mut self, line: &str);
}

impl LogSink for Vec<String> {
    fn log(&mut self, line: &str) {
        self.push(line.to_string());
    }
}

/// Executes `#exec` directives. The text is everything after `exec`.
pub trait HostCommands {
    fn exec(&mut self, class: &str, command: &str) -> Result<(), String>;
}

/// Host that accepts and ignores every command.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHost;

impl HostCommands for NullHost {
    fn exec(&mut self, _class: &str, _command: &str) -> Result<(), String> {
        Ok(())
    }
}

/// Host that records commands, for tests and dry runs.
#[derive(Debug, Default, Clone)]
pub struct RecordingHost {
    pub commands: Vec<(String, String)>,
}

impl HostCommands for RecordingHost {
    fn exec(&mut self, class: &str, command: &str) -> Result<(), String> {
        self.commands.push((class.to_string(), command.to_string()));
        Ok(())
    }
}
