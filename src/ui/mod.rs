use iced::{
    widget::{button, column, row, scrollable, text, text_input, Space},
    Element, Length,
};

use crate::domain::LogEntry;

/// Main form state
pub struct FormView {
    pub links_path: String,
    pub output_dir: String,
    pub log: Vec<LogEntry>,
    pub is_running: bool,
}

impl Default for FormView {
    fn default() -> Self {
        Self {
            links_path: String::new(),
            output_dir: String::new(),
            log: Vec::new(),
            is_running: false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum FormMessage {
    LinksPathChanged(String),
    OutputDirChanged(String),
    BrowseLinksFile,
    BrowseOutputDir,
    StartPressed,
}

impl FormView {
    pub fn update(&mut self, message: FormMessage) {
        match message {
            FormMessage::LinksPathChanged(path) => {
                self.links_path = path;
            }
            FormMessage::OutputDirChanged(path) => {
                self.output_dir = path;
            }
            FormMessage::BrowseLinksFile
            | FormMessage::BrowseOutputDir
            | FormMessage::StartPressed => {
                // Will be handled by the app
            }
        }
    }

    pub fn view(&self) -> Element<'_, FormMessage> {
        let links_row = row![
            text("Links file:").size(14).width(Length::Fixed(120.0)),
            text_input("Select a links file...", &self.links_path)
                .on_input(FormMessage::LinksPathChanged)
                .padding(8),
            button("Browse")
                .on_press(FormMessage::BrowseLinksFile)
                .padding([8, 14]),
        ]
        .spacing(10);

        let output_row = row![
            text("Output directory:").size(14).width(Length::Fixed(120.0)),
            text_input("Select an output directory...", &self.output_dir)
                .on_input(FormMessage::OutputDirChanged)
                .padding(8),
            button("Browse")
                .on_press(FormMessage::BrowseOutputDir)
                .padding([8, 14]),
        ]
        .spacing(10);

        let entries = column(
            self.log
                .iter()
                .map(|entry| {
                    text(format!("{} - {}", entry.level, entry.message))
                        .size(13)
                        .into()
                })
                .collect::<Vec<Element<'_, FormMessage>>>(),
        )
        .spacing(2);

        // Anchored to the bottom so the newest entry stays visible.
        let log_panel = scrollable(entries)
            .width(Length::Fill)
            .height(Length::Fill)
            .anchor_bottom();

        let start_label = if self.is_running {
            "Downloading..."
        } else {
            "Start Download"
        };

        column![
            links_row,
            output_row,
            Space::new().height(Length::Fixed(10.0)),
            log_panel,
            Space::new().height(Length::Fixed(10.0)),
            button(start_label)
                .on_press_maybe(if self.is_running {
                    None
                } else {
                    Some(FormMessage::StartPressed)
                })
                .padding([10, 20]),
        ]
        .padding(20)
        .spacing(10)
        .into()
    }
}
