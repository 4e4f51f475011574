use iced::widget::image::Handle;
use iced::widget::{
    button, column, container, horizontal_space, pick_list, responsive, row, text, text_input,
};
use iced::{Alignment, Element, Length, Size, Task};
use std::path::PathBuf;
use tracing::{debug, error};

use crate::api::{sizes, ApiClient};
use crate::settings::{self, AppConfig};
use crate::state::library::Library;
use crate::ui;

/// Preview areas smaller than this are treated as "not laid out yet"
const MIN_PREVIEW_AREA: f32 = 50.0;
/// Substitute area used when the real one is degenerate
const FALLBACK_PREVIEW_AREA: f32 = 500.0;
/// Fraction of the available area the preview may fill
const PREVIEW_FILL: f32 = 0.9;

/// Tab for generating images from text prompts
pub struct GenerateTab {
    client: ApiClient,
    db_path: PathBuf,
    prompt: String,
    negative_prompt: String,
    providers: Vec<String>,
    selected_provider: Option<String>,
    size_options: Vec<String>,
    selected_size: Option<String>,
    status: GenerationStatus,
    preview: Option<Preview>,
}

/// Explicit generation state owned by this view. All transitions run on
/// the update loop, so there is never more than one task in flight and a
/// finished task cannot clobber the state of a newer one.
#[derive(Debug, Clone, PartialEq)]
enum GenerationStatus {
    Idle,
    Running,
    Succeeded,
    Failed(String),
}

impl GenerationStatus {
    fn label(&self) -> &str {
        match self {
            GenerationStatus::Idle => "Enter a prompt and click Generate",
            GenerationStatus::Running => "Generating image...",
            GenerationStatus::Succeeded => "Image generated successfully",
            GenerationStatus::Failed(message) => message,
        }
    }
}

/// A generated image held for display
#[derive(Debug, Clone)]
struct Preview {
    handle: Handle,
    width: u32,
    height: u32,
}

#[derive(Debug, Clone)]
pub enum Event {
    PromptChanged(String),
    NegativePromptChanged(String),
    ProviderSelected(String),
    SizeSelected(String),
    Submit,
    Completed(GenerationOutcome),
}

/// Result of one background generation task
#[derive(Debug, Clone)]
pub enum GenerationOutcome {
    /// Image produced, saved and recorded
    Completed {
        handle: Handle,
        width: u32,
        height: u32,
    },
    /// Provider answered but produced no image
    NoImage,
    /// Transport, provider, save or database failure
    Failed(String),
}

impl GenerateTab {
    pub fn new(config: &AppConfig, db_path: PathBuf) -> Self {
        let client = ApiClient::new(config.api_key.clone(), Some(config.api_provider.clone()));

        let providers: Vec<String> = sizes::PROVIDERS.iter().map(|p| p.to_string()).collect();
        let size_options: Vec<String> = sizes::options_for(client.provider())
            .iter()
            .map(|s| s.to_string())
            .collect();
        let selected_size = size_options.first().cloned();

        Self {
            selected_provider: Some(client.provider().to_lowercase()),
            client,
            db_path,
            prompt: String::new(),
            negative_prompt: String::new(),
            providers,
            size_options,
            selected_size,
            status: GenerationStatus::Idle,
            preview: None,
        }
    }

    fn is_running(&self) -> bool {
        self.status == GenerationStatus::Running
    }

    /// Handle an event. Returns the task to run (if any) and a status-bar
    /// line for the application shell.
    pub fn update(&mut self, event: Event) -> (Task<Event>, Option<String>) {
        match event {
            Event::PromptChanged(prompt) => {
                self.prompt = prompt;
                (Task::none(), None)
            }
            Event::NegativePromptChanged(negative) => {
                self.negative_prompt = negative;
                (Task::none(), None)
            }
            Event::ProviderSelected(provider) => {
                self.client.set_provider(&provider);
                self.selected_provider = Some(provider.clone());
                self.reload_size_options();
                (Task::none(), None)
            }
            Event::SizeSelected(size) => {
                self.selected_size = Some(size);
                (Task::none(), None)
            }
            Event::Submit => self.submit(),
            Event::Completed(outcome) => {
                let (status, modal_error) = self.finish(outcome);
                if let Some(message) = modal_error {
                    ui::show_error("Error", &message);
                }
                (Task::none(), Some(status))
            }
        }
    }

    /// Repopulate the size selector for the current provider, resetting
    /// the selection to the table's first entry if it is no longer valid.
    fn reload_size_options(&mut self) {
        let provider = self.client.provider().to_string();
        self.size_options = sizes::options_for(&provider)
            .iter()
            .map(|s| s.to_string())
            .collect();

        let still_valid = self
            .selected_size
            .as_ref()
            .is_some_and(|s| self.size_options.contains(s));
        if !still_valid {
            self.selected_size = self.size_options.first().cloned();
        }
    }

    fn submit(&mut self) -> (Task<Event>, Option<String>) {
        if self.is_running() {
            // Requests are serialized; a new one must wait
            return (
                Task::none(),
                Some("A generation is already in progress".to_string()),
            );
        }

        let Some(prompt) = validated_prompt(&self.prompt) else {
            ui::show_error("Error", "Please enter a prompt");
            return (Task::none(), None);
        };

        let Some(size) = self.selected_size.as_deref().and_then(sizes::parse) else {
            ui::show_error("Error", "Please select an image size");
            return (Task::none(), None);
        };

        let negative_prompt = match self.negative_prompt.trim() {
            "" => None,
            trimmed => Some(trimmed.to_string()),
        };

        self.status = GenerationStatus::Running;

        let task = Task::perform(
            run_generation(
                self.client.clone(),
                prompt,
                size,
                negative_prompt,
                self.db_path.clone(),
            ),
            Event::Completed,
        );

        (task, Some("Generating image...".to_string()))
    }

    /// Apply a finished task's outcome. Returns the shell status line and
    /// the message for the error modal, if one should be shown.
    fn finish(&mut self, outcome: GenerationOutcome) -> (String, Option<String>) {
        match outcome {
            GenerationOutcome::Completed {
                handle,
                width,
                height,
            } => {
                self.preview = Some(Preview {
                    handle,
                    width,
                    height,
                });
                self.status = GenerationStatus::Succeeded;
                ("Image generated successfully".to_string(), None)
            }
            GenerationOutcome::NoImage => {
                let message = "Failed to generate image".to_string();
                self.status = GenerationStatus::Failed(message.clone());
                (message.clone(), Some(message))
            }
            GenerationOutcome::Failed(message) => {
                error!("image generation failed: {}", message);
                let status = error_status(&message);
                self.status = GenerationStatus::Failed(status.clone());
                (status, Some(message))
            }
        }
    }

    pub fn view(&self) -> Element<Event> {
        let busy = self.is_running();

        let mut prompt_input =
            text_input("Describe the image you want to generate...", &self.prompt)
                .padding(10)
                .size(13);
        let mut negative_input = text_input(
            "Elements to avoid in the image (optional)",
            &self.negative_prompt,
        )
        .padding(10)
        .size(13);
        if !busy {
            prompt_input = prompt_input
                .on_input(Event::PromptChanged)
                .on_submit(Event::Submit);
            negative_input = negative_input.on_input(Event::NegativePromptChanged);
        }

        let provider_picker: Element<Event> = if busy {
            text(self.selected_provider.clone().unwrap_or_default())
                .size(13)
                .into()
        } else {
            pick_list(
                self.providers.clone(),
                self.selected_provider.clone(),
                Event::ProviderSelected,
            )
            .text_size(13)
            .into()
        };

        let size_picker: Element<Event> = if busy {
            text(self.selected_size.clone().unwrap_or_default())
                .size(13)
                .into()
        } else {
            pick_list(
                self.size_options.clone(),
                self.selected_size.clone(),
                Event::SizeSelected,
            )
            .text_size(13)
            .into()
        };

        let generate_button = button(text("Generate").size(14))
            .padding(10)
            .on_press_maybe((!busy).then_some(Event::Submit));

        let label = |s: &'static str| text(s).size(14).width(Length::Fixed(130.0));

        let form = column![
            row![label("Prompt:"), prompt_input]
                .spacing(10)
                .align_y(Alignment::Center),
            row![label("Negative Prompt:"), negative_input]
                .spacing(10)
                .align_y(Alignment::Center),
            row![
                label("Provider:"),
                provider_picker,
                text("Size:").size(14),
                size_picker,
                horizontal_space(),
                generate_button,
            ]
            .spacing(10)
            .align_y(Alignment::Center),
        ]
        .spacing(10);

        let preview = container(responsive(|area| self.preview_content(area)))
            .width(Length::Fill)
            .height(Length::Fill)
            .padding(10);

        let status = text(self.status.label()).size(12);

        column![form, preview, status]
            .spacing(10)
            .padding(10)
            .into()
    }

    /// Render the preview scaled into the measured display area
    fn preview_content(&self, area: Size) -> Element<Event> {
        let content: Element<Event> = match &self.preview {
            Some(preview) => {
                let placement = fit_preview(preview.width, preview.height, area.width, area.height);
                iced::widget::image(preview.handle.clone())
                    .width(Length::Fixed(placement.width as f32))
                    .height(Length::Fixed(placement.height as f32))
                    .into()
            }
            None => text("The generated image will appear here").size(13).into(),
        };

        container(content)
            .width(Length::Fill)
            .height(Length::Fill)
            .center_x(Length::Fill)
            .center_y(Length::Fill)
            .into()
    }
}

/// How a generated image is placed within the preview area: scaled
/// dimensions plus the top-left margin that centers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewPlacement {
    pub width: u32,
    pub height: u32,
    pub x: u32,
    pub y: u32,
}

/// Compute the preview placement: uniform scale with a 10% margin,
/// aspect ratio preserved, centered. A degenerate (not yet laid out)
/// area is replaced by a fixed fallback.
pub fn fit_preview(
    img_width: u32,
    img_height: u32,
    area_width: f32,
    area_height: f32,
) -> PreviewPlacement {
    let (area_width, area_height) =
        if area_width < MIN_PREVIEW_AREA || area_height < MIN_PREVIEW_AREA {
            (FALLBACK_PREVIEW_AREA, FALLBACK_PREVIEW_AREA)
        } else {
            (area_width, area_height)
        };

    let scale = (area_width / img_width as f32).min(area_height / img_height as f32);

    let width = (img_width as f32 * scale * PREVIEW_FILL) as u32;
    let height = (img_height as f32 * scale * PREVIEW_FILL) as u32;

    let x = (area_width as u32).saturating_sub(width) / 2;
    let y = (area_height as u32).saturating_sub(height) / 2;

    PreviewPlacement {
        width,
        height,
        x,
        y,
    }
}

/// Trim the prompt; an empty result means the submission is rejected
/// before any work starts.
fn validated_prompt(prompt: &str) -> Option<String> {
    let trimmed = prompt.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Status-line form of an error message, truncated to 50 characters
fn error_status(message: &str) -> String {
    if message.chars().count() > 50 {
        let prefix: String = message.chars().take(50).collect();
        format!("Error: {}...", prefix)
    } else {
        format!("Error: {}", message)
    }
}

/// One generation request, from API call to saved file and history record.
/// Runs off the UI thread; the result is delivered back as an event.
/// Opens its own database connection since the main one stays with the UI.
async fn run_generation(
    client: ApiClient,
    prompt: String,
    size: (u32, u32),
    negative_prompt: Option<String>,
    db_path: PathBuf,
) -> GenerationOutcome {
    let image = match client
        .generate(&prompt, size, negative_prompt.as_deref())
        .await
    {
        Ok(Some(image)) => image,
        Ok(None) => return GenerationOutcome::NoImage,
        Err(e) => return GenerationOutcome::Failed(e.to_string()),
    };

    let saved_path = match settings::ensure_images_dir(client.provider())
        .map_err(|e| e.to_string())
        .and_then(|dir| {
            client
                .save_image(&image, &dir, &prompt)
                .map_err(|e| e.to_string())
        }) {
        Ok(path) => path,
        Err(e) => return GenerationOutcome::Failed(e),
    };

    let filename = saved_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let inserted = Library::open(&db_path).and_then(|library| {
        library.add_image(
            &prompt,
            &filename,
            &saved_path.to_string_lossy(),
            client.provider(),
            Some(image.width()),
            Some(image.height()),
        )
    });

    match inserted {
        Ok(id) => debug!("recorded generation {} at {}", id, saved_path.display()),
        Err(e) => return GenerationOutcome::Failed(format!("Failed to record generation: {}", e)),
    }

    let rgba = image.to_rgba8();
    let (width, height) = (rgba.width(), rgba.height());

    GenerationOutcome::Completed {
        handle: Handle::from_rgba(width, height, rgba.into_raw()),
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_tab() -> GenerateTab {
        let config = AppConfig {
            api_key: Some("test".to_string()),
            api_provider: "openai".to_string(),
        };
        GenerateTab::new(&config, PathBuf::from("/tmp/unused.db"))
    }

    #[test]
    fn test_whitespace_prompt_is_rejected() {
        assert_eq!(validated_prompt(""), None);
        assert_eq!(validated_prompt("   \t\n  "), None);
        assert_eq!(validated_prompt("  a fox  "), Some("a fox".to_string()));
    }

    #[test]
    fn test_provider_switch_repopulates_sizes() {
        let mut tab = test_tab();
        assert_eq!(tab.size_options, sizes::options_for("openai"));
        assert_eq!(tab.selected_size.as_deref(), Some("256x256"));

        tab.update(Event::ProviderSelected("stability".to_string()));

        assert_eq!(tab.size_options, sizes::options_for("stability"));
        // Prior selection is invalid for the new provider: reset to first
        assert_eq!(tab.selected_size.as_deref(), Some("1024x1024"));
    }

    #[test]
    fn test_provider_switch_keeps_valid_selection() {
        let mut tab = test_tab();
        tab.update(Event::SizeSelected("1024x1024".to_string()));

        tab.update(Event::ProviderSelected("stability".to_string()));

        assert_eq!(tab.selected_size.as_deref(), Some("1024x1024"));
    }

    #[test]
    fn test_fit_preview_scales_and_centers() {
        let placement = fit_preview(2000, 1000, 500.0, 500.0);
        assert_eq!(placement.width, 450);
        assert_eq!(placement.height, 225);
        assert_eq!(placement.x, 25);
        assert_eq!(placement.y, 137);
    }

    #[test]
    fn test_fit_preview_degenerate_area_uses_fallback() {
        // Area below the 50px threshold behaves like a 500x500 area
        let real = fit_preview(2000, 1000, 10.0, 600.0);
        let fallback = fit_preview(2000, 1000, 500.0, 500.0);
        assert_eq!(real, fallback);
    }

    #[test]
    fn test_fit_preview_preserves_aspect_ratio() {
        let placement = fit_preview(1024, 1024, 800.0, 400.0);
        assert_eq!(placement.width, placement.height);
        assert!(placement.height <= 400);
    }

    #[test]
    fn test_error_status_truncation() {
        let long = "x".repeat(80);
        let status = error_status(&long);
        assert_eq!(status, format!("Error: {}...", "x".repeat(50)));

        assert_eq!(error_status("short"), "Error: short");
    }

    #[test]
    fn test_completion_resets_running_state() {
        let mut tab = test_tab();
        tab.status = GenerationStatus::Running;

        let (status, modal) = tab.finish(GenerationOutcome::Failed("boom".to_string()));

        assert!(!tab.is_running());
        assert_eq!(status, "Error: boom");
        assert_eq!(modal.as_deref(), Some("boom"));
        assert!(matches!(tab.status, GenerationStatus::Failed(_)));
    }

    #[test]
    fn test_no_image_outcome_reports_failure() {
        let mut tab = test_tab();
        tab.status = GenerationStatus::Running;

        let (status, modal) = tab.finish(GenerationOutcome::NoImage);

        assert!(!tab.is_running());
        assert_eq!(status, "Failed to generate image");
        assert_eq!(modal.as_deref(), Some("Failed to generate image"));
    }
}
