//! Pulse evaluator — maps (latency, probe result) to a pulse.

use pulsemon_config::Thresholds;
use pulsemon_events::{ProbeResult, Pulse, PulseStatus};

/// Classify one probe outcome against the configured latency bounds.
///
/// Failures classify as critical here; the state machine decides
/// terminally whether they amount to flatline. This function never
/// returns `flatline`.
pub fn evaluate(latency_ms: u64, result: &ProbeResult, thresholds: &Thresholds) -> Pulse {
    let status = if result.success {
        if latency_ms <= thresholds.healthy_max() {
            PulseStatus::Healthy
        } else if latency_ms <= thresholds.warning_max() {
            PulseStatus::Warning
        } else {
            PulseStatus::Critical
        }
    } else {
        PulseStatus::Critical
    };

    Pulse { status, latency_ms }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success() -> ProbeResult {
        ProbeResult {
            success: true,
            has_response: true,
            http_status: 200,
            data: None,
            error: None,
        }
    }

    #[test]
    fn classification_boundaries() {
        let t = Thresholds::default(); // healthy ≤ 200, warning ≤ 500
        let cases = [
            (0, PulseStatus::Healthy),
            (200, PulseStatus::Healthy),
            (201, PulseStatus::Warning),
            (500, PulseStatus::Warning),
            (501, PulseStatus::Critical),
            (10_000, PulseStatus::Critical),
        ];
        for (latency, expected) in cases {
            let pulse = evaluate(latency, &success(), &t);
            assert_eq!(pulse.status, expected, "latency {latency}");
            assert_eq!(pulse.latency_ms, latency);
        }
    }

    #[test]
    fn any_failure_is_critical_regardless_of_latency() {
        let t = Thresholds::default();
        let failure = ProbeResult::transport_failure("refused");
        assert_eq!(evaluate(5, &failure, &t).status, PulseStatus::Critical);

        let http_failure = ProbeResult {
            success: false,
            has_response: true,
            http_status: 503,
            data: None,
            error: Some("HTTP 503".into()),
        };
        assert_eq!(evaluate(5, &http_failure, &t).status, PulseStatus::Critical);
    }

    #[test]
    fn updated_thresholds_apply() {
        let mut t = Thresholds::default();
        t.default.healthy.max = 50;
        t.default.warning.max = 100;
        assert_eq!(evaluate(60, &success(), &t).status, PulseStatus::Warning);
        assert_eq!(evaluate(101, &success(), &t).status, PulseStatus::Critical);
    }
}
