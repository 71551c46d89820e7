//! Shared constants for the integration tests

use jinglepress_server::quota::{Plan, UserContext};

// ============================================================================
// Users
// ============================================================================

pub const FREE_USER_ID: &str = "free-user";

pub const PRO_USER_ID: &str = "pro-user";

pub const OTHER_USER_ID: &str = "other-user";

pub fn free_user() -> UserContext {
    UserContext::new(FREE_USER_ID, Plan::Free)
}

pub fn pro_user() -> UserContext {
    UserContext::new(PRO_USER_ID, Plan::Pro)
}

pub fn other_pro_user() -> UserContext {
    UserContext::new(OTHER_USER_ID, Plan::Pro)
}

// ============================================================================
// Pipeline
// ============================================================================

/// Public prefix of published files.
pub const PUBLIC_BASE_URL: &str = "http://files.test";

/// Cap on staged and downloaded payloads.
pub const MAX_PAYLOAD_MB: u64 = 1;

pub const PREVIEW_SECONDS: f64 = 30.0;

/// Host of audio platform track pages.
pub const AUDIO_PLATFORM_SITE: &str = "tracks.test";

/// A locator the video platform recognizes.
pub const VIDEO_URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

/// Smallest buffer carrying a PNG signature.
pub const PNG_COVER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];
