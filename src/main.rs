mod app;
mod application;
mod domain;
mod fetch;
mod ui;
mod utils;

use iced::window;
use tracing_subscriber::EnvFilter;

fn main() -> iced::Result {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let icon_data = include_bytes!("../assets/icon.png");

    let icon = match image::load_from_memory(icon_data) {
        Ok(img) => {
            let rgba = img.to_rgba8();
            let (width, height) = rgba.dimensions();
            window::icon::from_rgba(rgba.into_raw(), width, height).ok()
        }
        Err(_) => None,
    };

    iced::application(app::BatchApp::default, app::update, app::view)
        .title("Google Drive Bulk Downloader")
        .window(window::Settings {
            size: iced::Size::new(600.0, 400.0),
            icon,
            ..Default::default()
        })
        .run()
}
