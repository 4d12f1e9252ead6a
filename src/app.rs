use crate::application::{BatchRunner, RunEvent};
use crate::domain::{LogEntry, LogLevel};
use crate::fetch::{FetchConfig, Fetcher};
use crate::ui::{FormMessage, FormView};
use futures::StreamExt;
use iced::Task;
use std::path::PathBuf;

pub struct BatchApp {
    view: FormView,
    runner: BatchRunner,
}

impl Default for BatchApp {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchApp {
    pub fn new() -> Self {
        let runner = BatchRunner::new(Fetcher::new(FetchConfig::default()));
        let view = FormView::default();

        Self { view, runner }
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    UiMessage(FormMessage),
    /// Absolute path picked in the links-file dialog, if any
    LinksFilePicked(Option<PathBuf>),
    /// Absolute path picked in the output-directory dialog, if any
    OutputDirPicked(Option<PathBuf>),
    /// The missing-selections dialog was dismissed
    InputErrorClosed,
    RunEvent(RunEvent),
}

pub fn update(app: &mut BatchApp, message: Message) -> Task<Message> {
    match message {
        Message::UiMessage(ui_msg) => {
            app.view.update(ui_msg.clone());

            match ui_msg {
                FormMessage::BrowseLinksFile => {
                    return Task::perform(
                        async {
                            rfd::AsyncFileDialog::new()
                                .set_title("Select Links File")
                                .add_filter("Text files", &["txt"])
                                .add_filter("All files", &["*"])
                                .pick_file()
                                .await
                                .map(|handle| handle.path().to_path_buf())
                        },
                        Message::LinksFilePicked,
                    );
                }
                FormMessage::BrowseOutputDir => {
                    return Task::perform(
                        async {
                            rfd::AsyncFileDialog::new()
                                .set_title("Select Output Directory")
                                .pick_folder()
                                .await
                                .map(|handle| handle.path().to_path_buf())
                        },
                        Message::OutputDirPicked,
                    );
                }
                FormMessage::StartPressed => {
                    if app.view.is_running {
                        return Task::none();
                    }

                    let links_path = app.view.links_path.trim().to_string();
                    let output_dir = app.view.output_dir.trim().to_string();

                    if links_path.is_empty() || output_dir.is_empty() {
                        return Task::perform(
                            async {
                                rfd::AsyncMessageDialog::new()
                                    .set_level(rfd::MessageLevel::Error)
                                    .set_title("Error")
                                    .set_description(
                                        "Please select both the links file and output directory!",
                                    )
                                    .show()
                                    .await;
                            },
                            |_| Message::InputErrorClosed,
                        );
                    }

                    // Clear previous logs before the new run
                    app.view.log.clear();
                    app.view.is_running = true;

                    let stream = app
                        .runner
                        .run_stream(PathBuf::from(links_path), PathBuf::from(output_dir));
                    return Task::stream(stream.map(Message::RunEvent));
                }
                _ => {}
            }
        }
        Message::LinksFilePicked(path) => {
            // Cancelling the dialog keeps the previous selection
            if let Some(path) = path {
                app.view.links_path = path.display().to_string();
            }
        }
        Message::OutputDirPicked(path) => {
            if let Some(path) = path {
                app.view.output_dir = path.display().to_string();
            }
        }
        Message::InputErrorClosed => {}
        Message::RunEvent(RunEvent::Log(entry)) => {
            mirror_to_logger(&entry);
            app.view.log.push(entry);
        }
        Message::RunEvent(RunEvent::Finished) => {
            app.view.is_running = false;
        }
    }
    Task::none()
}

fn mirror_to_logger(entry: &LogEntry) {
    match entry.level {
        LogLevel::Info => tracing::info!("{}", entry.message),
        LogLevel::Warning => tracing::warn!("{}", entry.message),
        LogLevel::Error => tracing::error!("{}", entry.message),
    }
}

pub fn view(app: &BatchApp) -> iced::Element<'_, Message> {
    app.view.view().map(Message::UiMessage)
}
