//! Plan-based feature and limit checks.
//!
//! Everything here is a pure function over the user's plan and usage
//! history; nothing is written. Usage records are appended by the
//! finalizer once an asset has actually been produced.

use super::plan::{Plan, UserContext};
use crate::overlay::MixSpec;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A plan limit was hit. The message is meant for the end user.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{0}")]
pub struct QuotaExceeded(pub String);

/// Type of operation recorded in the usage log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageKind {
    Mix,
    Upload,
    ExternalIngest,
}

impl UsageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mix => "mix",
            Self::Upload => "upload",
            Self::ExternalIngest => "external_ingest",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "mix" => Some(Self::Mix),
            "upload" => Some(Self::Upload),
            "external_ingest" => Some(Self::ExternalIngest),
            _ => None,
        }
    }
}

/// One entry in a user's usage history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub user_id: String,
    pub kind: UsageKind,
    pub duration_seconds: Option<f64>,
    pub size_bytes: i64,
    /// Unix milliseconds.
    pub created_at: i64,
}

/// Outcome of the daily-count checks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuotaStatus {
    pub can_mix: bool,
    pub can_upload: bool,
    pub can_ingest_external: bool,
    pub reason: Option<String>,
}

/// Unix milliseconds of the start of the UTC day containing `now`.
pub fn start_of_day_ms(now: DateTime<Utc>) -> i64 {
    let date = now.date_naive();
    date.and_hms_opt(0, 0, 0)
        .map(|midnight| Utc.from_utc_datetime(&midnight).timestamp_millis())
        .unwrap_or_else(|| now.timestamp_millis())
}

fn count_today(history: &[UsageRecord], user_id: &str, kinds: &[UsageKind], since_ms: i64) -> u32 {
    history
        .iter()
        .filter(|r| r.user_id == user_id && r.created_at >= since_ms && kinds.contains(&r.kind))
        .count() as u32
}

/// Evaluate the daily caps for `user` against `history` as of now.
pub fn check_limits(user: &UserContext, history: &[UsageRecord]) -> QuotaStatus {
    check_limits_at(user, history, Utc::now())
}

/// Same as [`check_limits`] with an explicit clock.
///
/// Uploads and external ingests share the daily upload cap.
pub fn check_limits_at(
    user: &UserContext,
    history: &[UsageRecord],
    now: DateTime<Utc>,
) -> QuotaStatus {
    let limits = user.plan.limits();
    let since = start_of_day_ms(now);

    let mixes_today = count_today(history, &user.user_id, &[UsageKind::Mix], since);
    let uploads_today = count_today(
        history,
        &user.user_id,
        &[UsageKind::Upload, UsageKind::ExternalIngest],
        since,
    );

    let can_mix = limits.daily_mixes.map_or(true, |cap| mixes_today < cap);
    let can_upload = limits.daily_uploads.map_or(true, |cap| uploads_today < cap);

    let reason = if !can_mix && !can_upload {
        Some(format!(
            "Daily limits reached for the {} plan: {} mixes and {} uploads per day",
            user.plan.as_str(),
            limits.daily_mixes.unwrap_or_default(),
            limits.daily_uploads.unwrap_or_default()
        ))
    } else if !can_mix {
        Some(format!(
            "Daily mix limit reached ({} per day on the {} plan)",
            limits.daily_mixes.unwrap_or_default(),
            user.plan.as_str()
        ))
    } else if !can_upload {
        Some(format!(
            "Daily upload limit reached ({} per day on the {} plan)",
            limits.daily_uploads.unwrap_or_default(),
            user.plan.as_str()
        ))
    } else {
        None
    };

    QuotaStatus {
        can_mix,
        can_upload,
        can_ingest_external: can_upload,
        reason,
    }
}

fn check_duration(
    limit: Option<f64>,
    measured_secs: f64,
    what: &str,
    plan: Plan,
) -> Result<(), QuotaExceeded> {
    match limit {
        Some(max) if measured_secs > max => Err(QuotaExceeded(format!(
            "{} is {:.0}s long, the {} plan allows at most {:.0}s",
            what,
            measured_secs,
            plan.as_str(),
            max
        ))),
        _ => Ok(()),
    }
}

/// Bound on directly uploaded audio.
pub fn check_audio_duration_limit(plan: Plan, measured_secs: f64) -> Result<(), QuotaExceeded> {
    check_duration(
        plan.limits().max_audio_duration_secs,
        measured_secs,
        "Audio",
        plan,
    )
}

/// Bound on a saved jingle.
pub fn check_jingle_duration_limit(plan: Plan, measured_secs: f64) -> Result<(), QuotaExceeded> {
    check_duration(
        plan.limits().max_jingle_duration_secs,
        measured_secs,
        "Jingle",
        plan,
    )
}

/// Bound on audio fetched from an external source.
pub fn check_external_ingest_duration_limit(
    plan: Plan,
    measured_secs: f64,
) -> Result<(), QuotaExceeded> {
    check_duration(
        plan.limits().max_external_ingest_duration_secs,
        measured_secs,
        "External audio",
        plan,
    )
}

/// Reject a user-requested mix that the plan does not allow.
///
/// Volumes outside [0, 1] are not a plan matter and are validated by the
/// caller before this is reached.
pub fn check_mix_spec(plan: Plan, spec: &MixSpec) -> Result<(), QuotaExceeded> {
    let limits = plan.limits();

    let jingles = spec.distinct_jingles();
    if jingles > limits.max_concurrent_jingles {
        return Err(QuotaExceeded(format!(
            "The {} plan allows {} jingle(s) per mix, {} requested",
            plan.as_str(),
            limits.max_concurrent_jingles,
            jingles
        )));
    }

    for entry in &spec.entries {
        if !limits.allows_position(entry.position) {
            return Err(QuotaExceeded(format!(
                "Jingle position '{}' is not available on the {} plan",
                entry.position.as_str(),
                plan.as_str()
            )));
        }
        if !limits.volume_control && (entry.volume - 1.0).abs() > f32::EPSILON {
            return Err(QuotaExceeded(format!(
                "Volume control is not available on the {} plan",
                plan.as_str()
            )));
        }
    }

    Ok(())
}

/// Fit an automatically built spec into the plan instead of rejecting it.
pub fn coerce_mix_spec(plan: Plan, spec: MixSpec) -> MixSpec {
    let limits = plan.limits();
    let mut kept_ids: Vec<String> = Vec::new();
    let mut entries = Vec::new();

    for mut entry in spec.entries {
        if !kept_ids.contains(&entry.jingle_id) {
            if kept_ids.len() >= limits.max_concurrent_jingles {
                continue;
            }
            kept_ids.push(entry.jingle_id.clone());
        }
        if !limits.allows_position(entry.position) {
            entry.position = crate::overlay::JinglePosition::Start;
        }
        if !limits.volume_control {
            entry.volume = 1.0;
        }
        entries.push(entry);
    }

    MixSpec::new(entries)
}
