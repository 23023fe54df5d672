//! Fire-and-forget notification dispatch.
//!
//! The transport (push, e-mail, websocket fan-out) is an external
//! collaborator; the engine only emits events. A failing dispatcher must
//! never block or fail a state transition, so the trait is infallible and
//! implementations swallow their own errors.

use uuid::Uuid;

use tracing::info;

/// State-transition events worth telling the outside world about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationEvent {
    /// Both participants confirmed active and the match went live.
    MatchLive {
        /// Match that went live.
        match_id: Uuid,
    },
    /// A participant reported a score; the opponent should confirm or dispute.
    ScoreReported {
        /// Match with a pending report.
        match_id: Uuid,
        /// Participant who filed the report.
        reported_by: Uuid,
    },
    /// The match reached its terminal completed state.
    MatchCompleted {
        /// Completed match.
        match_id: Uuid,
        /// Authoritative winner.
        winner_id: Uuid,
    },
    /// A dispute was opened against a pending report.
    DisputeOpened {
        /// Disputed match.
        match_id: Uuid,
        /// New arbitration case.
        dispute_id: Uuid,
        /// Participant who raised it.
        raised_by: Uuid,
    },
    /// An administrator closed a dispute.
    DisputeResolved {
        /// Match the dispute belonged to.
        match_id: Uuid,
        /// Closed arbitration case.
        dispute_id: Uuid,
        /// Winner chosen by the admin.
        winner_id: Uuid,
    },
    /// The final round's match completed.
    TournamentCompleted {
        /// Finished tournament.
        tournament_id: Uuid,
        /// Tournament champion.
        winner_id: Uuid,
    },
}

/// Seam towards the notification collaborator.
pub trait Notifier: Send + Sync {
    /// Dispatch one event. Must not block on remote calls from the caller's
    /// point of view and must not fail.
    fn dispatch(&self, event: NotificationEvent);
}

/// Default notifier that records events in the structured log.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn dispatch(&self, event: NotificationEvent) {
        info!(?event, "notification dispatched");
    }
}
