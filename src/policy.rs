//! Caller intent and its translation into scheduling flags.
//!
//! [`resolve`] is the single source of scheduling truth: every request's
//! initial stage flags and priority come from this table. It is pure (no I/O,
//! no clock) so the same inputs always produce the same resolution.

use serde::{Deserialize, Serialize};

use crate::request::{RequestFlags, DEFAULT_PRIORITY, HIGH_PRIORITY};

/// When the edit should be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditPolicy {
    /// Apply inline on the caller's thread regardless of budget.
    ForceImmediate,
    /// Apply inline when the tick budget allows, otherwise queue.
    Immediate,
    /// Always queue.
    Deferred,
}

/// When affected chunks should be sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendPolicy {
    /// Send right after recalculation, bypassing aggregation.
    Immediate,
    /// Aggregate and send once per observer tick.
    Deferred,
}

/// Engine-wide choice for when recalculation happens on synchronous edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelightPolicy {
    /// Recalculate inline with the edit.
    Forward,
    /// Recalculate on a later tick.
    #[default]
    Deferred,
}

impl EditPolicy {
    /// Returns a short stable identifier suitable for logging.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ForceImmediate => "force_immediate",
            Self::Immediate => "immediate",
            Self::Deferred => "deferred",
        }
    }
}

impl SendPolicy {
    /// Returns a short stable identifier suitable for logging.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::Deferred => "deferred",
        }
    }
}

impl RelightPolicy {
    /// Returns a short stable identifier suitable for logging.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Deferred => "deferred",
        }
    }
}

/// Initial flags and priority for a new request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// Stage flags, always including [`RequestFlags::EDIT`].
    pub flags: RequestFlags,
    /// Scheduling priority.
    pub priority: i32,
}

/// Resolves caller intent into request flags and priority.
///
/// - `ForceImmediate`: recalculate and send separately at high priority;
///   `can_run_sync_now` is ignored.
/// - `Immediate`: the send policy picks the send flag (`+1` for a separate
///   send); when synchronous execution is allowed the relight policy decides
///   between inline (`+1`) and deferred recalculation, otherwise it is deferred.
/// - `Deferred`: recalculation is always deferred; the send flag is picked as above.
#[must_use]
pub fn resolve(
    edit: EditPolicy,
    send: SendPolicy,
    relight: RelightPolicy,
    can_run_sync_now: bool,
) -> Resolution {
    let mut flags = RequestFlags::EDIT;
    let mut priority = DEFAULT_PRIORITY;

    match edit {
        EditPolicy::ForceImmediate => {
            flags |= RequestFlags::RECALCULATE | RequestFlags::SEPARATE_SEND;
            priority = HIGH_PRIORITY;
        }
        EditPolicy::Immediate => {
            priority += apply_send_policy(&mut flags, send);
            if can_run_sync_now {
                match relight {
                    RelightPolicy::Forward => {
                        flags |= RequestFlags::RECALCULATE;
                        priority += 1;
                    }
                    RelightPolicy::Deferred => flags |= RequestFlags::DEFERRED_RECALCULATE,
                }
            } else {
                flags |= RequestFlags::DEFERRED_RECALCULATE;
            }
        }
        EditPolicy::Deferred => {
            flags |= RequestFlags::DEFERRED_RECALCULATE;
            priority += apply_send_policy(&mut flags, send);
        }
    }

    Resolution { flags, priority }
}

/// Adds the send flag and returns the priority bump.
fn apply_send_policy(flags: &mut RequestFlags, send: SendPolicy) -> i32 {
    match send {
        SendPolicy::Immediate => {
            *flags |= RequestFlags::SEPARATE_SEND;
            1
        }
        SendPolicy::Deferred => {
            *flags |= RequestFlags::COMBINED_SEND;
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_EDIT: [EditPolicy; 3] = [EditPolicy::ForceImmediate, EditPolicy::Immediate, EditPolicy::Deferred];
    const ALL_SEND: [SendPolicy; 2] = [SendPolicy::Immediate, SendPolicy::Deferred];
    const ALL_RELIGHT: [RelightPolicy; 2] = [RelightPolicy::Forward, RelightPolicy::Deferred];

    #[test]
    fn deferred_deferred_without_sync() {
        let r = resolve(EditPolicy::Deferred, SendPolicy::Deferred, RelightPolicy::Deferred, false);
        assert_eq!(
            r.flags,
            RequestFlags::EDIT | RequestFlags::DEFERRED_RECALCULATE | RequestFlags::COMBINED_SEND
        );
        assert_eq!(r.priority, 5);
    }

    #[test]
    fn force_immediate_ignores_everything_else() {
        for send in ALL_SEND {
            for relight in ALL_RELIGHT {
                for sync in [true, false] {
                    let r = resolve(EditPolicy::ForceImmediate, send, relight, sync);
                    assert_eq!(
                        r.flags,
                        RequestFlags::EDIT | RequestFlags::RECALCULATE | RequestFlags::SEPARATE_SEND
                    );
                    assert_eq!(r.priority, HIGH_PRIORITY);
                }
            }
        }
    }

    #[test]
    fn immediate_forward_with_sync_recalculates_inline() {
        let r = resolve(EditPolicy::Immediate, SendPolicy::Immediate, RelightPolicy::Forward, true);
        assert_eq!(
            r.flags,
            RequestFlags::EDIT | RequestFlags::SEPARATE_SEND | RequestFlags::RECALCULATE
        );
        assert_eq!(r.priority, 7);

        let r = resolve(EditPolicy::Immediate, SendPolicy::Deferred, RelightPolicy::Forward, true);
        assert_eq!(
            r.flags,
            RequestFlags::EDIT | RequestFlags::COMBINED_SEND | RequestFlags::RECALCULATE
        );
        assert_eq!(r.priority, 6);
    }

    #[test]
    fn immediate_deferred_relight_with_sync() {
        let r = resolve(EditPolicy::Immediate, SendPolicy::Deferred, RelightPolicy::Deferred, true);
        assert_eq!(
            r.flags,
            RequestFlags::EDIT | RequestFlags::COMBINED_SEND | RequestFlags::DEFERRED_RECALCULATE
        );
        assert_eq!(r.priority, 5);
    }

    #[test]
    fn immediate_without_sync_always_defers_recalculation() {
        for relight in ALL_RELIGHT {
            let r = resolve(EditPolicy::Immediate, SendPolicy::Immediate, relight, false);
            assert!(r.flags.contains(RequestFlags::DEFERRED_RECALCULATE));
            assert!(!r.flags.contains(RequestFlags::RECALCULATE));
            assert_eq!(r.priority, 6);
        }
    }

    #[test]
    fn deferred_only_bumps_for_separate_send() {
        for relight in ALL_RELIGHT {
            for sync in [true, false] {
                let r = resolve(EditPolicy::Deferred, SendPolicy::Immediate, relight, sync);
                assert_eq!(
                    r.flags,
                    RequestFlags::EDIT | RequestFlags::DEFERRED_RECALCULATE | RequestFlags::SEPARATE_SEND
                );
                assert_eq!(r.priority, 6);
            }
        }
    }

    #[test]
    fn every_resolution_edits_and_picks_one_send_and_one_recalculation() {
        for edit in ALL_EDIT {
            for send in ALL_SEND {
                for relight in ALL_RELIGHT {
                    for sync in [true, false] {
                        let r = resolve(edit, send, relight, sync);
                        assert!(r.flags.contains(RequestFlags::EDIT));
                        assert!(!r.flags.contains(RequestFlags::FORCE_SEND));

                        let sends = r.flags & (RequestFlags::SEPARATE_SEND | RequestFlags::COMBINED_SEND);
                        assert_eq!(sends.bits().count_ones(), 1, "{edit:?} {send:?} {relight:?} {sync}");

                        let recalcs =
                            r.flags & (RequestFlags::RECALCULATE | RequestFlags::DEFERRED_RECALCULATE);
                        assert_eq!(recalcs.bits().count_ones(), 1, "{edit:?} {send:?} {relight:?} {sync}");
                    }
                }
            }
        }
    }

    #[test]
    fn policies_serialize_as_snake_case() {
        let json = serde_json::to_string(&EditPolicy::ForceImmediate).unwrap();
        assert_eq!(json, "\"force_immediate\"");
        let relight: RelightPolicy = serde_json::from_str("\"forward\"").unwrap();
        assert_eq!(relight, RelightPolicy::Forward);
    }
}
