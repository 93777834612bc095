use crate::error::LocalCiError;

use super::Console;

/// Lines describing a failed run, and the exit code it maps to.
///
/// A failed command names its `stage/job`, the literal command and its exit
/// code. Any other error is a single line and exits with `1`.
pub fn failure_report(err: &anyhow::Error) -> (Vec<String>, i32) {
    let Some(failure) = err.downcast_ref::<LocalCiError>() else {
        return (vec![format!("❌ {err:#}")], 1);
    };

    let lines = match failure {
        LocalCiError::CommandFailure {
            stage,
            job,
            command,
            code,
        } => vec![
            format!("❌ Command failed: {stage}/{job}"),
            format!("   Command: {command}"),
            format!("   Exit code: {code}"),
        ],
        _ => vec![format!("❌ {err:#}")],
    };

    (lines, failure.exit_code())
}

/// Prints a failed run to stderr and returns the process exit code.
pub fn report_failure(err: &anyhow::Error) -> i32 {
    let (lines, code) = failure_report(err);
    let console = Console;
    for line in lines {
        console.failure(line);
    }
    code
}
