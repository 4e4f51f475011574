/// Per-provider image size tables
///
/// Each provider accepts a fixed set of output resolutions. The lookup is
/// case-insensitive on the provider name; anything unrecognized gets a
/// conservative default table.

/// Sizes accepted by the OpenAI image endpoint
const OPENAI_SIZES: &[&str] = &[
    "256x256", "512x512", "1024x1024", "1024x1792", "1792x1024",
];

/// Dimensions supported by the Stability SDXL model
const STABILITY_SIZES: &[&str] = &[
    "1024x1024", "1152x896", "896x1152", "1216x832", "832x1216",
    "1344x768", "768x1344", "1536x640", "640x1536",
];

const GEMINI_SIZES: &[&str] = &["1024x1024", "1024x1792", "1792x1024"];

/// Fallback for unknown providers
const DEFAULT_SIZES: &[&str] = &["512x512", "768x768", "1024x1024"];

/// Providers selectable in the UI
pub const PROVIDERS: &[&str] = &["openai", "stability", "gemini"];

/// Return the size options for a provider (case-insensitive)
pub fn options_for(provider: &str) -> &'static [&'static str] {
    match provider.to_lowercase().as_str() {
        "openai" => OPENAI_SIZES,
        "stability" => STABILITY_SIZES,
        "gemini" => GEMINI_SIZES,
        _ => DEFAULT_SIZES,
    }
}

/// Parse a "WIDTHxHEIGHT" string into pixel dimensions
pub fn parse(size: &str) -> Option<(u32, u32)> {
    let (w, h) = size.split_once('x')?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}
