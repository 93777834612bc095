mod report;
mod styling;
mod tables;

pub use report::{failure_report, report_failure};
pub use styling::{blue, bright_green, bright_red, cyan, dim, magenta, magenta_bold, yellow};
pub use tables::{count_cell, create_table, cyan_header};

/// Prints the `local-run-ci` banner to stderr.
///
/// Displays the tool name, version, and description at the start of execution.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("🚀 local-run-ci"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("Run GitLab CI pipelines locally")
    );
}

/// User-facing run log.
///
/// Handed to hooks through the execution context so extensions print with
/// the same styling as the engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct Console;

impl Console {
    pub fn out(&self, msg: impl std::fmt::Display) {
        println!("{msg}");
    }

    pub fn err(&self, msg: impl std::fmt::Display) {
        eprintln!("{msg}");
    }

    pub fn banner(&self, title: &str) {
        let rule = "==============================";
        self.out(blue(rule));
        self.out(blue(title));
        self.out(blue(rule));
    }

    pub fn info(&self, msg: impl std::fmt::Display) {
        self.out(cyan(format!("ℹ {msg}")));
    }

    /// Echoes a command about to run (or be listed).
    pub fn command(&self, command: &str) {
        self.out(format!("{}{command}", dim("$ ")));
    }

    pub fn skipped_command(&self, command: &str) {
        self.out(format!("{}{}", yellow("⏭ SKIP "), dim(command)));
    }

    pub fn notice(&self, msg: impl std::fmt::Display) {
        self.out(dim(msg));
    }

    pub fn success(&self, msg: impl std::fmt::Display) {
        self.out(bright_green(msg));
    }

    pub fn failure(&self, msg: impl std::fmt::Display) {
        self.err(bright_red(msg));
    }
}
