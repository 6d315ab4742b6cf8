//! Connectivity checks.
//!
//! Opens a session and attaches both ends of a pipeline without reading or
//! writing any data.

use std::path::Path;

use ducktail_types::{RuntimeOptions, SourceSpec, TargetSpec};

use crate::adapter;
use crate::errors::PipelineError;
use crate::result::{CheckResult, CheckStatus};
use crate::session::{SessionFactory, SqlSession};

/// Check that `source` and `target` are reachable.
///
/// Per-side problems (bad spec, missing file, failed attach) are reported
/// in the returned [`CheckResult`].
///
/// # Errors
///
/// Returns [`PipelineError`] only when no session can be opened at all.
pub fn check_pipeline(
    source: &SourceSpec,
    target: &TargetSpec,
    sessions: &dyn SessionFactory,
    options: &RuntimeOptions,
) -> Result<CheckResult, PipelineError> {
    let session = sessions.open(options)?;
    let session = session.as_ref();

    let source_status = check_source(source, session);
    let target_status = check_target(target, session);
    tracing::debug!(
        source_ok = source_status.ok,
        target_ok = target_status.ok,
        "Connectivity check finished"
    );

    Ok(CheckResult {
        source: source_status,
        target: target_status,
    })
}

fn check_source(spec: &SourceSpec, session: &dyn SqlSession) -> CheckStatus {
    let adapter = match adapter::source_adapter(spec) {
        Ok(a) => a,
        Err(e) => return CheckStatus::failed(e.to_string(), None),
    };

    if let Some(path) = spec.path.as_deref().filter(|_| spec.kind.file_format().is_some()) {
        if is_unchecked_path(path) {
            return CheckStatus::ok(format!("{} path '{path}' not checked locally", spec.kind));
        }
        if !Path::new(path).exists() {
            return CheckStatus::failed(
                format!("source file '{path}' does not exist"),
                Some("check the source path and the working directory".into()),
            );
        }
        return CheckStatus::ok(format!("{} file '{path}' found", spec.kind));
    }

    match adapter.attach(session) {
        Ok(()) => CheckStatus::ok(format!(
            "attached {} as '{}'",
            spec.kind,
            spec.attachment_name().unwrap_or_default()
        )),
        Err(e) => failed_from(&e),
    }
}

fn check_target(spec: &TargetSpec, session: &dyn SqlSession) -> CheckStatus {
    let adapter = match adapter::target_adapter(spec) {
        Ok(a) => a,
        Err(e) => return CheckStatus::failed(e.to_string(), None),
    };

    if let Some(path) = spec.path.as_deref().filter(|_| spec.kind.file_format().is_some()) {
        if is_unchecked_path(path) {
            return CheckStatus::ok(format!("{} path '{path}' not checked locally", spec.kind));
        }
        let parent = Path::new(path)
            .parent()
            .filter(|p| !p.as_os_str().is_empty());
        if let Some(dir) = parent.filter(|d| !d.is_dir()) {
            return CheckStatus::failed(
                format!("target directory '{}' does not exist", dir.display()),
                Some("create the directory before running the pipeline".into()),
            );
        }
        return CheckStatus::ok(format!("{} target '{path}' is writable location", spec.kind));
    }

    match adapter.attach(session) {
        Ok(()) => CheckStatus::ok(format!(
            "attached {} as '{}'",
            spec.kind,
            spec.attachment_name().unwrap_or_default()
        )),
        Err(e) => failed_from(&e),
    }
}

fn failed_from(err: &PipelineError) -> CheckStatus {
    let hint = match err {
        PipelineError::Attach(a) => Some(a.kind.hint().to_string()),
        _ => None,
    };
    CheckStatus::failed(err.to_string(), hint)
}

/// Globs and remote URLs cannot be probed with a local `exists()`.
fn is_unchecked_path(path: &str) -> bool {
    path.contains("://") || path.contains(['*', '?', '['])
}
