//! The status lifecycle state machine.
//!
//! Each named helper submits a status change and then polls the server
//! until the status lands in an allowed end set. Helpers are idempotent
//! on re-entry: if the cached or freshly fetched status is already an
//! allowed end status, no request is sent. Guard violations and
//! timeouts are reported, never retried; after a timeout the record
//! keeps whatever status it actually reached.

use std::time::Duration;

use crate::error::ChangeError;

use super::ChangeRequest;

/// Poll budget for a status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollWait {
    /// Total time budget before the transition is declared timed out.
    pub timeout: Duration,
    /// Sleep between consecutive status checks.
    pub interval: Duration,
}

impl Default for PollWait {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(600),
            interval: Duration::from_secs(5),
        }
    }
}

struct Transition {
    /// The status label submitted to the server.
    target: &'static str,
    /// Statuses the transition may start from.
    start: &'static [&'static str],
    end: &'static [&'static str],
}

impl ChangeRequest {
    /// Reopen a cancelled change request as a draft.
    pub fn to_draft(&mut self, wait: PollWait) -> Result<(), ChangeError> {
        self.run_transition(
            &Transition {
                target: "Draft",
                start: &["Cancelled"],
                end: &["Draft"],
            },
            wait,
        )
    }

    /// Submit the change request for authorization and wait for planning
    /// to begin. Pre-approved records may land directly in Scheduled.
    pub fn to_planning_in_progress(&mut self, wait: PollWait) -> Result<(), ChangeError> {
        self.run_transition(
            &Transition {
                target: "Request For Authorization",
                start: &["Draft", "Request For Authorization"],
                end: &["Planning In Progress", "Scheduled"],
            },
            wait,
        )
    }

    /// Submit the planned change request for scheduling review.
    ///
    /// Fails fast with [`ChangeError::MissingSchedule`] unless both
    /// scheduled dates are already set.
    pub fn to_scheduled(&mut self, wait: PollWait) -> Result<(), ChangeError> {
        if self.date_of("scheduledStartDate")?.is_none()
            || self.date_of("scheduledEndDate")?.is_none()
        {
            return Err(ChangeError::MissingSchedule);
        }

        self.run_transition(
            &Transition {
                target: "Scheduled For Review",
                start: &["Planning In Progress"],
                end: &["Scheduled For Review", "Scheduled For Approval", "Scheduled"],
            },
            wait,
        )
    }

    /// Begin implementation, then record the actual start time.
    pub fn to_implementation_in_progress(&mut self, wait: PollWait) -> Result<(), ChangeError> {
        self.run_transition(
            &Transition {
                target: "Implementation In Progress",
                start: &["Scheduled"],
                end: &["Implementation In Progress"],
            },
            wait,
        )?;

        let now = self.clock().now();
        self.set("actualStartDate", now)?;
        self.save()
    }

    /// Complete the implemented change request.
    ///
    /// Fails fast with [`ChangeError::MissingActualStart`] unless the
    /// actual start date is set; an unset actual end date is stamped
    /// with "now" and saved before the transition is submitted.
    pub fn to_completed(&mut self, wait: PollWait) -> Result<(), ChangeError> {
        if self.date_of("actualStartDate")?.is_none() {
            return Err(ChangeError::MissingActualStart);
        }

        if self.date_of("actualEndDate")?.is_none() {
            let now = self.clock().now();
            self.set("actualEndDate", now)?;
            self.save()?;
        }

        self.run_transition(
            &Transition {
                target: "Completed",
                start: &["Implementation In Progress"],
                end: &["Completed", "Closed"],
            },
            wait,
        )
    }

    /// Cancel the change request from any status that allows it.
    pub fn to_cancelled(&mut self, wait: PollWait) -> Result<(), ChangeError> {
        self.run_transition(
            &Transition {
                target: "Cancelled",
                start: &[
                    "Draft",
                    "Implementation In Progress",
                    "Pending",
                    "Planning In Progress",
                    "Rejected",
                    "Request For Authorization",
                    "Scheduled",
                    "Scheduled For Approval",
                    "Scheduled For Review",
                ],
                end: &["Cancelled"],
            },
            wait,
        )
    }

    fn status_in(&self, statuses: &[&str]) -> bool {
        self.status_label()
            .is_some_and(|status| statuses.contains(&status.as_str()))
    }

    fn run_transition(&mut self, transition: &Transition, wait: PollWait) -> Result<(), ChangeError> {
        // Idempotent re-entry: cached status first, then a fresh probe
        // that keeps pending changes intact.
        if self.status_in(transition.end) {
            return Ok(());
        }
        self.refresh(false)?;
        if self.status_in(transition.end) {
            return Ok(());
        }

        let current = self.status_label().unwrap_or_default();
        if !transition.start.contains(&current.as_str()) {
            return Err(ChangeError::GuardViolation {
                current,
                target: transition.target.to_string(),
                allowed: transition.start.join(", "),
            });
        }

        self.stage_status(transition.target)?;
        self.save()?;

        let clock = self.clock();
        let mut remaining = wait.timeout;
        loop {
            self.refresh(true)?;
            if self.status_in(transition.end) {
                return Ok(());
            }

            // The budget goes negative before the sleep that would
            // overrun it, so timeout == interval allows exactly one poll.
            match remaining.checked_sub(wait.interval) {
                Some(rest) => remaining = rest,
                None => {
                    return Err(ChangeError::TransitionTimeout {
                        change_id: self.change_id().unwrap_or_default(),
                        target: transition.target.to_string(),
                    });
                }
            }

            tracing::debug!(
                target = transition.target,
                remaining_secs = remaining.as_secs(),
                "waiting for status transition"
            );
            clock.sleep(wait.interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::PollWait;
    use std::time::Duration;

    #[test]
    fn default_wait_matches_the_api_cadence() {
        let wait = PollWait::default();
        assert_eq!(wait.timeout, Duration::from_secs(600));
        assert_eq!(wait.interval, Duration::from_secs(5));
    }
}
