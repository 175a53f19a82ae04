//! ==============================================================================
//! controls.rs - actuator toggle commands
//! ==============================================================================
//!
//! purpose:
//!     turns a toggle request for one of the three writable booleans into a
//!     fire-and-forget write of the negation of the locally cached value.
//!
//! known race:
//!     there is no read-modify-write atomicity. the command negates the last
//!     cached value, not a server-side atomic toggle, so two rapid toggles
//!     before the next push arrives produce identical writes and the second
//!     one is a lost update. this matches the source system's behavior and
//!     is covered by a test rather than fixed.
//!
//! ==============================================================================

use log::warn;

use crate::ingest::FeedClient;
use crate::session::SharedSession;
use crate::telemetry::Snapshot;

/// the writable boolean fields on the room entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlField {
    ManualLed,
    ManualBuzzer,
    UseSimulation,
}

impl ControlField {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "manual_led" => Some(Self::ManualLed),
            "manual_buzzer" => Some(Self::ManualBuzzer),
            "use_simulation" => Some(Self::UseSimulation),
            _ => None,
        }
    }

    pub fn field_name(self) -> &'static str {
        match self {
            Self::ManualLed => "manual_led",
            Self::ManualBuzzer => "manual_buzzer",
            Self::UseSimulation => "use_simulation",
        }
    }

    pub fn current(self, snapshot: &Snapshot) -> bool {
        match self {
            Self::ManualLed => snapshot.manual_led,
            Self::ManualBuzzer => snapshot.manual_buzzer,
            Self::UseSimulation => snapshot.use_simulation,
        }
    }
}

/// the value a toggle would write: the negation of the cached value.
pub fn toggle_command(snapshot: &Snapshot, field: ControlField) -> bool {
    !field.current(snapshot)
}

/// issues toggle writes against the feed, reading the cached session state.
pub struct ControlPanel {
    client: FeedClient,
    session: SharedSession,
}

impl ControlPanel {
    pub fn new(client: FeedClient, session: SharedSession) -> Self {
        Self { client, session }
    }

    /// toggle one field. the write is spawned and forgotten; failures are
    /// logged and never surfaced to the caller. returns the value written.
    pub async fn toggle(&self, field: ControlField) -> bool {
        let desired = {
            let session = self.session.read().await;
            toggle_command(session.snapshot(), field)
        };
        let client = self.client.clone();
        tokio::spawn(async move {
            if let Err(e) = client.write_bool(field.field_name(), desired).await {
                warn!("[CONTROL] write {} failed: {e:#}", field.field_name());
            }
        });
        desired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_only_writable_fields() {
        assert_eq!(ControlField::parse("manual_led"), Some(ControlField::ManualLed));
        assert_eq!(ControlField::parse("manual_buzzer"), Some(ControlField::ManualBuzzer));
        assert_eq!(ControlField::parse("use_simulation"), Some(ControlField::UseSimulation));
        // led_status is device-computed, not writable
        assert_eq!(ControlField::parse("led_status"), None);
        assert_eq!(ControlField::parse("dust"), None);
    }

    #[test]
    fn toggle_negates_the_cached_value() {
        let snapshot = Snapshot {
            manual_led: true,
            manual_buzzer: false,
            ..Snapshot::default()
        };
        assert!(!toggle_command(&snapshot, ControlField::ManualLed));
        assert!(toggle_command(&snapshot, ControlField::ManualBuzzer));
    }

    #[test]
    fn rapid_toggles_race_on_stale_cache() {
        // two toggles computed before the next push refreshes the cache both
        // negate the same value: the second write repeats the first and the
        // user's second press is lost. documented behavior, not a bug fix.
        let cached = Snapshot::default();
        let first = toggle_command(&cached, ControlField::UseSimulation);
        let second = toggle_command(&cached, ControlField::UseSimulation);
        assert_eq!(first, second);
    }
}
