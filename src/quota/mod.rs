//! Quota gate: plan limits evaluated before any expensive work begins.

mod gate;
mod plan;

pub use gate::{
    check_audio_duration_limit, check_external_ingest_duration_limit,
    check_jingle_duration_limit, check_limits, check_limits_at, check_mix_spec,
    coerce_mix_spec, start_of_day_ms, QuotaExceeded, QuotaStatus, UsageKind, UsageRecord,
};
pub use plan::{Plan, PlanLimits, UserContext};
