use iced::widget::{button, column, container, row, text};
use iced::{Element, Length, Task, Theme};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod api;
mod platform;
mod settings;
mod state;
mod ui;

use state::library::Library;
use ui::generate::{self, GenerateTab};
use ui::history::{self, HistoryTab};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tab {
    Generate,
    History,
}

/// Main application state
struct Imagine {
    active_tab: Tab,
    generate: GenerateTab,
    history: HistoryTab,
    /// Status-bar line shared by both tabs
    status: String,
}

/// Application messages (events)
#[derive(Debug, Clone)]
enum Message {
    TabSelected(Tab),
    Generate(generate::Event),
    History(history::Event),
}

impl Imagine {
    /// Create a new instance of the application
    fn new() -> (Self, Task<Message>) {
        let config = settings::AppConfig::load();

        // If this fails, we panic because the app cannot function without
        // its database
        let library = Library::new()
            .expect("Failed to initialize database. Check permissions and disk space.");

        let image_count = library.image_count().unwrap_or(0);
        info!("initialized with {} images in history", image_count);

        let status = format!("Ready. {} images in history.", image_count);

        (
            Imagine {
                active_tab: Tab::Generate,
                generate: GenerateTab::new(&config, settings::db_path()),
                history: HistoryTab::new(library),
                status,
            },
            Task::none(),
        )
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::TabSelected(tab) => {
                // Showing the history reloads it, so fresh generations
                // appear without a manual refresh
                if tab == Tab::History && self.active_tab != Tab::History {
                    self.history.refresh();
                }
                self.active_tab = tab;
                Task::none()
            }
            Message::Generate(event) => {
                let (task, status) = self.generate.update(event);
                if let Some(status) = status {
                    self.status = status;
                }
                task.map(Message::Generate)
            }
            Message::History(event) => {
                if let Some(status) = self.history.update(event) {
                    self.status = status;
                }
                Task::none()
            }
        }
    }

    /// Build the user interface
    fn view(&self) -> Element<Message> {
        let tab_bar = row![
            self.tab_button("Generate", Tab::Generate),
            self.tab_button("History", Tab::History),
        ]
        .spacing(8);

        let content: Element<Message> = match self.active_tab {
            Tab::Generate => self.generate.view().map(Message::Generate),
            Tab::History => self.history.view().map(Message::History),
        };

        let status_bar = container(text(&self.status).size(12))
            .padding(6)
            .width(Length::Fill);

        column![
            container(tab_bar).padding(10),
            container(content).width(Length::Fill).height(Length::Fill),
            status_bar,
        ]
        .into()
    }

    fn tab_button(&self, label: &'static str, tab: Tab) -> Element<Message> {
        let style = if tab == self.active_tab {
            button::primary
        } else {
            button::secondary
        };

        button(text(label).size(14))
            .style(style)
            .padding(8)
            .on_press(Message::TabSelected(tab))
            .into()
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

fn main() -> iced::Result {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("imagine=info")),
        )
        .init();

    iced::application("Imagine", Imagine::update, Imagine::view)
        .theme(Imagine::theme)
        .centered()
        .run_with(Imagine::new)
}
