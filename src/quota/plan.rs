//! Subscription plans and the limits attached to them.

use crate::overlay::JinglePosition;
use serde::{Deserialize, Serialize};

/// Subscription tier of a user, as supplied by the authentication gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Pro,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Some(Self::Free),
            "pro" => Some(Self::Pro),
            _ => None,
        }
    }

    pub fn limits(&self) -> PlanLimits {
        match self {
            Self::Free => PlanLimits::FREE,
            Self::Pro => PlanLimits::PRO,
        }
    }
}

/// Per-tier limits. `None` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanLimits {
    pub max_concurrent_jingles: usize,
    pub max_jingle_duration_secs: Option<f64>,
    pub max_external_ingest_duration_secs: Option<f64>,
    pub max_audio_duration_secs: Option<f64>,
    pub allowed_positions: &'static [JinglePosition],
    pub volume_control: bool,
    pub daily_mixes: Option<u32>,
    pub daily_uploads: Option<u32>,
}

impl PlanLimits {
    pub const FREE: PlanLimits = PlanLimits {
        max_concurrent_jingles: 1,
        max_jingle_duration_secs: Some(120.0),
        max_external_ingest_duration_secs: Some(240.0),
        max_audio_duration_secs: Some(600.0),
        allowed_positions: &[JinglePosition::Start],
        volume_control: false,
        daily_mixes: Some(5),
        daily_uploads: Some(5),
    };

    pub const PRO: PlanLimits = PlanLimits {
        max_concurrent_jingles: 3,
        max_jingle_duration_secs: None,
        max_external_ingest_duration_secs: None,
        max_audio_duration_secs: None,
        allowed_positions: &JinglePosition::ALL,
        volume_control: true,
        daily_mixes: None,
        daily_uploads: None,
    };

    pub fn allows_position(&self, position: JinglePosition) -> bool {
        self.allowed_positions.contains(&position)
    }
}

/// The identity a pipeline invocation runs on behalf of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContext {
    pub user_id: String,
    pub plan: Plan,
}

impl UserContext {
    pub fn new(user_id: impl Into<String>, plan: Plan) -> Self {
        Self {
            user_id: user_id.into(),
            plan,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_parse() {
        assert_eq!(Plan::parse("free"), Some(Plan::Free));
        assert_eq!(Plan::parse(" PRO "), Some(Plan::Pro));
        assert_eq!(Plan::parse("enterprise"), None);
    }

    #[test]
    fn test_free_limits() {
        let limits = Plan::Free.limits();
        assert_eq!(limits.max_concurrent_jingles, 1);
        assert_eq!(limits.max_jingle_duration_secs, Some(120.0));
        assert_eq!(limits.max_external_ingest_duration_secs, Some(240.0));
        assert!(limits.allows_position(JinglePosition::Start));
        assert!(!limits.allows_position(JinglePosition::End));
        assert!(!limits.volume_control);
        assert_eq!(limits.daily_mixes, Some(5));
    }

    #[test]
    fn test_pro_limits() {
        let limits = Plan::Pro.limits();
        assert_eq!(limits.max_concurrent_jingles, 3);
        assert!(limits.max_jingle_duration_secs.is_none());
        for position in JinglePosition::ALL {
            assert!(limits.allows_position(position));
        }
        assert!(limits.volume_control);
        assert!(limits.daily_uploads.is_none());
    }
}
