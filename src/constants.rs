/// Shared string constants to keep platform ids, the extractor sentinel,
/// and tag names consistent across the codebase

// Platform identifiers (stored in videos/processed_videos rows)
pub const PLATFORM_TIKTOK: &str = "tiktok";
pub const PLATFORM_INSTAGRAM: &str = "instagram";
pub const PLATFORM_YOUTUBE: &str = "youtube";

/// Exact sentinel the recommendation extractor must return when a video
/// names no venues. Matching is substring-based on responses.
pub const NO_PLACES_SENTINEL: &str = "No places of interest found";

/// Tag applied to venues discovered through trusted sources
pub const CURATED_TAG: &str = "curated";

/// City stored when the address heuristic cannot find one
pub const UNKNOWN_CITY: &str = "Unknown";

/// Get all supported platform identifiers
pub fn supported_platforms() -> Vec<&'static str> {
    vec![PLATFORM_TIKTOK, PLATFORM_INSTAGRAM, PLATFORM_YOUTUBE]
}
