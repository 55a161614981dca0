//! `retouch_binaries` and `undo_retouch_binaries`.

use crate::args::read_var_args;
use crate::errors::Abort;
use crate::expr::Expr;
use crate::retouch::{OverrideSlot, RetouchJob};
use crate::state::ExecutionState;
use crate::value::{Value, ValueKind};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Clock-derived value in `[0, 1024)`.
fn random_offset() -> i32 {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs());
    (secs % 1024) as i32
}

/// Scale `random` to a page-aligned negative offset. Zero is reserved for
/// files that were never retouched.
fn page_offset(random: i32) -> i32 {
    random.max(1) * -0x1000
}

/// Retouch `(input, output)` pairs in order. After the first failure the
/// remaining pairs are skipped; an unpaired trailing argument fails the batch.
fn retouch_pairs(
    state: &mut ExecutionState<'_>,
    entries: &[String],
    base: i32,
    mut slot: OverrideSlot,
    verb: &str,
) -> bool {
    let retoucher = state.env().retoucher.clone();
    let mut success = true;
    for pair in entries.chunks(2) {
        let [input, output] = pair else {
            log::error!("{} needs input/output pairs; dropping {:?}", verb, pair);
            success = false;
            break;
        };
        if !success {
            continue;
        }
        let job = RetouchJob {
            input: Path::new(input),
            output: Path::new(output),
            random_base: base,
            override_slot: slot,
        };
        match retoucher.retouch(&job) {
            Ok(next) => slot = next,
            Err(e) => {
                log::error!("{} of {} failed: {}", verb, input, e);
                state.record_error(format!("Failed to {} '{}'.", verb, input));
                success = false;
            }
        }
    }
    success
}

fn batch_result(success: bool) -> Value {
    if success {
        Value::bool(true)
    } else {
        Value::Absent(ValueKind::String)
    }
}

/// retouch_binaries(lib1, lib1_out, lib2, lib2_out, ...)
pub fn retouch_binaries_fn(
    _name: &str,
    state: &mut ExecutionState<'_>,
    argv: &[Expr],
) -> Result<Value, Abort> {
    let entries = read_var_args(state, argv)?;
    if entries.is_empty() {
        return Ok(Value::bool(true));
    }

    let random = random_offset();
    let cmd = state.cmd();
    cmd.ui_print(&format!("Random offset: 0x{:x}", random));
    cmd.ui_print("");

    let success = retouch_pairs(
        state,
        &entries,
        page_offset(random),
        OverrideSlot::Open,
        "retouch",
    );
    Ok(batch_result(success))
}

/// undo_retouch_binaries(lib1, lib1_out, ...): relocate back to offset 0.
pub fn undo_retouch_binaries_fn(
    _name: &str,
    state: &mut ExecutionState<'_>,
    argv: &[Expr],
) -> Result<Value, Abort> {
    let entries = read_var_args(state, argv)?;
    if entries.is_empty() {
        return Ok(Value::bool(true));
    }
    let success = retouch_pairs(state, &entries, 0, OverrideSlot::Disabled, "unretouch");
    Ok(batch_result(success))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_offset_is_never_zero() {
        assert_eq!(page_offset(0), -0x1000);
        assert_eq!(page_offset(1), -0x1000);
        assert_eq!(page_offset(1023), -1023 * 0x1000);
    }

    #[test]
    fn random_offset_is_in_range() {
        assert!((0..1024).contains(&random_offset()));
    }
}
