//! Named fault injection points, compiled in with the `failpoints` feature.

use fail::fail_point;

use crate::bail;
use crate::error::{CdcResult, ErrorKind};

/// Fails a capture worker after the sink accepted a change and before its offset is committed.
pub const CAPTURE_AFTER_WRITE_BEFORE_COMMIT: &str = "capture.after_write_before_commit";

/// Returns an [`ErrorKind::InjectedFailure`] error when the failpoint `name` is configured with
/// the `return` action.
pub fn cdc_fail_point(name: &str) -> CdcResult<()> {
    fail_point!(name, |parameter: Option<String>| {
        let detail = match parameter {
            Some(parameter) => format!("The failpoint '{name}' returned an error: {parameter}"),
            None => format!("The failpoint '{name}' returned an error"),
        };

        bail!(
            ErrorKind::InjectedFailure,
            "An error occurred in a fail point",
            detail
        );
    });

    Ok(())
}
