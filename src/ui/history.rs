use iced::widget::image::Handle;
use iced::widget::{button, column, container, row, scrollable, text, text_input, Column};
use iced::{Alignment, Element, Length};
use std::path::Path;
use tracing::{debug, error, warn};

use crate::platform;
use crate::state::data::ImageRecord;
use crate::state::library::Library;
use crate::ui;

/// Thumbnail bound (square, aspect-preserving)
const THUMBNAIL_SIZE: u32 = 150;

/// Tab for viewing and managing image generation history
pub struct HistoryTab {
    library: Library,
    search_input: String,
    entries: Vec<HistoryEntry>,
}

/// One rendered history row: the record plus its thumbnail state
#[derive(Debug)]
struct HistoryEntry {
    record: ImageRecord,
    thumbnail: Thumbnail,
}

/// Display state of a row's thumbnail. A missing or unreadable file is a
/// placeholder, never an error that blocks the list.
#[derive(Debug, Clone)]
enum Thumbnail {
    Loaded(Handle),
    Missing,
    Error,
}

#[derive(Debug, Clone)]
pub enum Event {
    SearchInputChanged(String),
    Search,
    ClearSearch,
    Refresh,
    Open(usize),
    Delete(usize),
}

impl HistoryTab {
    pub fn new(library: Library) -> Self {
        let mut tab = Self {
            library,
            search_input: String::new(),
            entries: Vec::new(),
        };
        tab.refresh();
        tab
    }

    /// Handle an event. Returns a status-bar line for the application
    /// shell, if the event produced one.
    pub fn update(&mut self, event: Event) -> Option<String> {
        match event {
            Event::SearchInputChanged(input) => {
                self.search_input = input;
                None
            }
            Event::Search | Event::Refresh => {
                self.refresh();
                None
            }
            Event::ClearSearch => {
                self.search_input.clear();
                self.refresh();
                None
            }
            Event::Open(index) => {
                if let Some(entry) = self.entries.get(index) {
                    open_record(&entry.record);
                }
                None
            }
            Event::Delete(index) => self.delete(index),
        }
    }

    /// Rebuild the visible list from the database, honoring the current
    /// search term. Thumbnails are reloaded from disk each time.
    pub fn refresh(&mut self) {
        let term = self.search_input.trim().to_string();

        let result = if term.is_empty() {
            self.library.get_all_images()
        } else {
            self.library.search_images(&term)
        };

        let records = match result {
            Ok(records) => records,
            Err(e) => {
                error!("failed to query history: {}", e);
                Vec::new()
            }
        };

        self.entries = records
            .into_iter()
            .map(|record| {
                let thumbnail = load_thumbnail(&record.filepath);
                HistoryEntry { record, thumbnail }
            })
            .collect();
    }

    fn delete(&mut self, index: usize) -> Option<String> {
        let record = self.entries.get(index)?.record.clone();

        if !ui::confirm(
            "Confirm Delete",
            "Are you sure you want to delete this image from history?",
        ) {
            return None;
        }

        if remove_entry(&self.library, &record) {
            // Re-run with the current search term preserved
            self.refresh();
            Some("Deleted 1 history item".to_string())
        } else {
            None
        }
    }

    pub fn view(&self) -> Element<Event> {
        let controls = row![
            button(text("Refresh").size(13))
                .padding(8)
                .on_press(Event::Refresh),
            text_input("Search prompts...", &self.search_input)
                .on_input(Event::SearchInputChanged)
                .on_submit(Event::Search)
                .padding(8)
                .size(13)
                .width(Length::Fixed(240.0)),
            button(text("Search").size(13))
                .padding(8)
                .on_press(Event::Search),
            button(text("Clear").size(13))
                .padding(8)
                .on_press(Event::ClearSearch),
        ]
        .spacing(8)
        .align_y(Alignment::Center);

        let list: Element<Event> = if self.entries.is_empty() {
            container(text("No history items found.").size(16))
                .width(Length::Fill)
                .padding(20)
                .center_x(Length::Fill)
                .into()
        } else {
            let rows: Vec<Element<Event>> = self
                .entries
                .iter()
                .enumerate()
                .map(|(index, entry)| entry_row(index, entry))
                .collect();

            scrollable(Column::with_children(rows).spacing(8).width(Length::Fill))
                .height(Length::Fill)
                .into()
        };

        column![controls, list].spacing(10).padding(10).into()
    }
}

fn entry_row(index: usize, entry: &HistoryEntry) -> Element<Event> {
    let thumbnail: Element<Event> = match &entry.thumbnail {
        Thumbnail::Loaded(handle) => iced::widget::image(handle.clone())
            .width(Length::Fixed(THUMBNAIL_SIZE as f32))
            .height(Length::Fixed(THUMBNAIL_SIZE as f32))
            .into(),
        Thumbnail::Missing => thumbnail_placeholder("Image\nFile\nMissing"),
        Thumbnail::Error => thumbnail_placeholder("Error\nLoading\nImage"),
    };

    let record = &entry.record;

    let prompt = scrollable(text(&record.prompt).size(13)).height(Length::Fixed(60.0));

    let metadata = text(format!(
        "Created: {} | Provider: {} | Size: {}",
        record.created_at,
        record.provider,
        record.dimensions_label()
    ))
    .size(11);

    let actions = row![
        button(text("Open").size(13))
            .padding(8)
            .on_press(Event::Open(index)),
        button(text("Delete").size(13))
            .padding(8)
            .style(button::danger)
            .on_press(Event::Delete(index)),
    ]
    .spacing(8);

    let info = column![text("Prompt:").size(13), prompt, metadata, actions]
        .spacing(6)
        .width(Length::Fill);

    container(row![thumbnail, info].spacing(12))
        .padding(12)
        .width(Length::Fill)
        .style(container::rounded_box)
        .into()
}

fn thumbnail_placeholder(label: &'static str) -> Element<'static, Event> {
    container(text(label).size(12))
        .width(Length::Fixed(THUMBNAIL_SIZE as f32))
        .height(Length::Fixed(THUMBNAIL_SIZE as f32))
        .center_x(Length::Fill)
        .center_y(Length::Fill)
        .into()
}

/// Load a 150x150-bounded thumbnail from the record's file
fn load_thumbnail(filepath: &str) -> Thumbnail {
    let path = Path::new(filepath);
    if !path.exists() {
        return Thumbnail::Missing;
    }

    match image::open(path) {
        Ok(img) => {
            let thumb = img.thumbnail(THUMBNAIL_SIZE, THUMBNAIL_SIZE);
            let rgba = thumb.to_rgba8();
            Thumbnail::Loaded(Handle::from_rgba(
                rgba.width(),
                rgba.height(),
                rgba.into_raw(),
            ))
        }
        Err(e) => {
            warn!("error loading history image {}: {}", filepath, e);
            Thumbnail::Error
        }
    }
}

/// Hand the record's file to the OS default application, or report a
/// missing file to the user.
fn open_record(record: &ImageRecord) {
    let path = Path::new(&record.filepath);
    if path.exists() {
        debug!("opening file: {}", record.filepath);
        if let Err(e) = platform::open_with_default_app(path) {
            warn!("failed to open {}: {}", record.filepath, e);
        }
    } else {
        warn!("file not found: {}", record.filepath);
        ui::show_error(
            "Error",
            &format!("The file {} does not exist.", record.filepath),
        );
    }
}

/// Delete the database record, then best-effort remove the backing file.
/// A file-removal failure is logged and never surfaced; a database
/// failure means the file is left alone. Returns true when the record
/// was removed.
fn remove_entry(library: &Library, record: &ImageRecord) -> bool {
    match library.delete_image(record.id) {
        Ok(true) => {
            let path = Path::new(&record.filepath);
            if path.exists() {
                match std::fs::remove_file(path) {
                    Ok(()) => debug!("deleted file: {}", record.filepath),
                    Err(e) => error!("error deleting file {}: {}", record.filepath, e),
                }
            }
            true
        }
        Ok(false) => {
            error!("failed to delete item {}: no such record", record.id);
            false
        }
        Err(e) => {
            error!("failed to delete item {}: {}", record.id, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_library() -> (TempDir, Library) {
        let dir = TempDir::new().unwrap();
        let library = Library::open(&dir.path().join("test.db")).unwrap();
        (dir, library)
    }

    fn add_record(library: &Library, prompt: &str, filepath: &str) -> ImageRecord {
        let id = library
            .add_image(prompt, "img.png", filepath, "openai", Some(64), Some(64))
            .unwrap();
        library.get_image(id).unwrap().unwrap()
    }

    #[test]
    fn test_remove_entry_deletes_record_and_file() {
        let (dir, library) = test_library();
        let file = dir.path().join("img.png");
        std::fs::write(&file, b"fake").unwrap();

        let record = add_record(&library, "a fox", &file.to_string_lossy());

        assert!(remove_entry(&library, &record));
        assert_eq!(library.image_count().unwrap(), 0);
        assert!(!file.exists());
    }

    #[test]
    fn test_remove_entry_with_missing_file() {
        let (dir, library) = test_library();
        let gone = dir.path().join("already_gone.png");

        let record = add_record(&library, "a fox", &gone.to_string_lossy());

        assert!(remove_entry(&library, &record));
        assert_eq!(library.image_count().unwrap(), 0);
    }

    #[test]
    fn test_remove_entry_survives_file_removal_failure() {
        let (dir, library) = test_library();
        // A directory at the file's path makes remove_file fail
        let blocked = dir.path().join("blocked");
        std::fs::create_dir(&blocked).unwrap();

        let record = add_record(&library, "a fox", &blocked.to_string_lossy());

        // Record deletion still succeeds; the failure is log-only
        assert!(remove_entry(&library, &record));
        assert_eq!(library.image_count().unwrap(), 0);
        assert!(blocked.exists());
    }

    #[test]
    fn test_remove_entry_fails_for_unknown_record() {
        let (_dir, library) = test_library();
        let record = ImageRecord {
            id: 999,
            prompt: "ghost".to_string(),
            filename: "ghost.png".to_string(),
            filepath: "/tmp/ghost.png".to_string(),
            provider: "openai".to_string(),
            width: None,
            height: None,
            created_at: String::new(),
        };

        assert!(!remove_entry(&library, &record));
    }

    #[test]
    fn test_load_thumbnail_states() {
        let dir = TempDir::new().unwrap();

        // Missing file
        let missing = dir.path().join("none.png");
        assert!(matches!(
            load_thumbnail(&missing.to_string_lossy()),
            Thumbnail::Missing
        ));

        // Unreadable image data
        let corrupt = dir.path().join("corrupt.png");
        std::fs::write(&corrupt, b"this is not a png").unwrap();
        assert!(matches!(
            load_thumbnail(&corrupt.to_string_lossy()),
            Thumbnail::Error
        ));

        // Real image
        let valid = dir.path().join("valid.png");
        image::DynamicImage::new_rgba8(300, 600)
            .save(&valid)
            .unwrap();
        assert!(matches!(
            load_thumbnail(&valid.to_string_lossy()),
            Thumbnail::Loaded(_)
        ));
    }

    #[test]
    fn test_search_filters_and_clear_restores() {
        let (_dir, library) = test_library();
        add_record(&library, "a red fox", "/tmp/a.png");
        add_record(&library, "a blue whale", "/tmp/b.png");

        let mut tab = HistoryTab::new(library);
        assert_eq!(tab.entries.len(), 2);

        tab.update(Event::SearchInputChanged("fox".to_string()));
        tab.update(Event::Search);
        assert_eq!(tab.entries.len(), 1);
        assert_eq!(tab.entries[0].record.prompt, "a red fox");

        // Zero matches leave the list empty (placeholder is rendered)
        tab.update(Event::SearchInputChanged("dinosaur".to_string()));
        tab.update(Event::Search);
        assert!(tab.entries.is_empty());

        tab.update(Event::ClearSearch);
        assert_eq!(tab.entries.len(), 2);
        assert!(tab.search_input.is_empty());
    }
}
