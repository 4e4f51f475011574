/// Shared data structures for the application state
///
/// These structs represent the data model that flows between
/// the database layer and the UI layer.

/// A persisted entry describing one generated image
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    /// Unique database ID
    pub id: i64,
    /// The text prompt the image was generated from
    pub prompt: String,
    /// Filename only (e.g., "a_red_fox_20250114_153012.png")
    pub filename: String,
    /// Full path to the saved image file. May be stale: the file can be
    /// moved or removed externally, which is a display state, not an error.
    pub filepath: String,
    /// Provider identifier used for the generation
    pub provider: String,
    /// Pixel width of the generated image (absent for legacy records)
    pub width: Option<u32>,
    /// Pixel height of the generated image (absent for legacy records)
    pub height: Option<u32>,
    /// Creation timestamp, set by the database at insert time
    pub created_at: String,
}

impl ImageRecord {
    /// Dimensions formatted for the metadata line: "1024x1024" or "N/A"
    pub fn dimensions_label(&self) -> String {
        match (self.width, self.height) {
            (Some(w), Some(h)) => format!("{}x{}", w, h),
            _ => "N/A".to_string(),
        }
    }
}
