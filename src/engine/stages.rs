//! The edit, recalculate and send stages.
//!
//! Each stage clears its own flag before acting. Stages only ever move a
//! request forward: edit hands it straight to recalculate, recalculate either
//! forwards it to a send or parks it on the recalculate queue, and send ends it.

use log::{debug, warn};

use crate::code::ResultCode;
use crate::request::{Request, RequestFlags};

use super::LightEngine;

fn log_stage_failure(stage: &str, request: &Request, code: ResultCode) {
    if code.is_precondition_failure() {
        debug!("{stage} stage: skipped {} in {}: {code}", request.position(), request.world());
    } else if code.is_unsupported() {
        warn!("{stage} stage: handler cannot serve {:?} in {}: {code}", request.kinds(), request.world());
    } else if !code.is_success() && !code.is_no_op() {
        warn!("{stage} stage: failed at {}: {code}", request.position());
    }
}

impl LightEngine {
    pub(super) fn handle_edit(&self, mut request: Request) {
        if request.take_flag(RequestFlags::EDIT) {
            let code = self.handler.set_raw_value(
                request.world(),
                request.position(),
                request.new_level(),
                request.kinds(),
            );
            request.report(RequestFlags::EDIT, code);
            if !code.is_success() {
                log_stage_failure("edit", &request, code);
                return;
            }
            // Removing light must reach clients even if nothing else changed.
            if request.new_level().is_dark() {
                request.add_flag(RequestFlags::FORCE_SEND);
            }
        }
        self.handle_recalculate(request);
    }

    pub(super) fn handle_recalculate(&self, mut request: Request) {
        if request.take_flag(RequestFlags::RECALCULATE) {
            let code = self
                .handler
                .recalculate(request.world(), request.position(), request.kinds());
            request.report(RequestFlags::RECALCULATE, code);
            log_stage_failure("recalculate", &request, code);
            if code.is_success() || request.has(RequestFlags::FORCE_SEND) {
                self.forward_to_send(request);
            }
        } else if request.take_flag(RequestFlags::DEFERRED_RECALCULATE) {
            request.add_flag(RequestFlags::RECALCULATE | RequestFlags::FORCE_SEND);
            // Report first: once queued, another thread may run the recalculation.
            request.report(RequestFlags::DEFERRED_RECALCULATE, ResultCode::Success);
            self.notify_recalculate(request);
        }
    }

    fn forward_to_send(&self, request: Request) {
        if request.has(RequestFlags::COMBINED_SEND) {
            self.notify_send(request);
        } else if request.has(RequestFlags::SEPARATE_SEND) {
            self.handle_send(request);
        }
    }

    pub(super) fn handle_send(&self, mut request: Request) {
        if request.take_flag(RequestFlags::COMBINED_SEND) {
            let code = self.observer.notify_affected_regions(
                request.world(),
                request.position(),
                request.affected_level(),
                request.kinds(),
            );
            request.report(RequestFlags::COMBINED_SEND, code);
            log_stage_failure("send", &request, code);
        } else if request.take_flag(RequestFlags::SEPARATE_SEND) {
            let batches = self.observer.collect_affected_regions(
                request.world(),
                request.position(),
                request.affected_level(),
                request.kinds(),
            );
            for batch in &batches {
                self.handler.send_chunk_batch(batch);
            }
            request.report(RequestFlags::SEPARATE_SEND, ResultCode::Success);
        }
    }
}
