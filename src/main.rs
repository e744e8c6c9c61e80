use eframe::egui;
use embassy_executor::{Executor, Spawner};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use env_logger::Builder;
use log::{LevelFilter, info};
use std::thread;

mod client;
mod config;
mod map;
mod overlay;
mod ui;

use config::ViewerConfig;
use ui::{AppState, UICommand, UIRefreshState};

const UI_REFRESH_CHANNEL_SIZE: usize = 100;
type UIRefreshChannel = embassy_sync::channel::Channel<CriticalSectionRawMutex, UIRefreshState, UI_REFRESH_CHANNEL_SIZE>;
type UIRefreshChannelReceiver = embassy_sync::channel::Receiver<'static, CriticalSectionRawMutex, UIRefreshState, UI_REFRESH_CHANNEL_SIZE>;
type UIRefreshChannelSender = embassy_sync::channel::Sender<'static, CriticalSectionRawMutex, UIRefreshState, UI_REFRESH_CHANNEL_SIZE>;

const UI_COMMAND_CHANNEL_SIZE: usize = 100;
type UICommandChannel = embassy_sync::channel::Channel<CriticalSectionRawMutex, UICommand, UI_COMMAND_CHANNEL_SIZE>;
type UICommandChannelReceiver = embassy_sync::channel::Receiver<'static, CriticalSectionRawMutex, UICommand, UI_COMMAND_CHANNEL_SIZE>;
type UICommandChannelSender = embassy_sync::channel::Sender<'static, CriticalSectionRawMutex, UICommand, UI_COMMAND_CHANNEL_SIZE>;

fn embassy_init(spawner: Spawner, config: ViewerConfig, ui_refresh_tx: UIRefreshChannelSender, ui_command_rx: UICommandChannelReceiver) {
    let _ = spawner.spawn(client::sim_task(config, ui_refresh_tx, ui_command_rx));
}

fn main() {
    let config_path = ViewerConfig::path_from_args(std::env::args());
    // Config is read before the logger exists; problems are logged right after init.
    let (config, config_error) = match ViewerConfig::load_or_default(&config_path) {
        Ok(config) => (config, None),
        Err(err) => (ViewerConfig::default(), Some(err)),
    };

    // Logging setup; RUST_LOG overrides the config file
    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter(Some("epigraph_viewer"), config.log_level.map(|l| l.to_filter()).unwrap_or(LevelFilter::Debug))
        .parse_default_env()
        .init();

    info!("Starting up");
    if config_path.exists() {
        info!("Config loaded from {}", config_path.display());
    } else {
        info!("No config file at {}, using defaults", config_path.display());
    }
    let alert = config_error.map(|err| {
        log::error!("{}; using defaults", err);
        format!("{}\n\nUsing default settings.", err)
    });
    info!("Simulation API: {}", config.api_base());

    let ui_refresh_channel: &'static UIRefreshChannel = Box::leak(Box::new(UIRefreshChannel::new()));
    let ui_command_channel: &'static UICommandChannel = Box::leak(Box::new(UICommandChannel::new()));

    let ui_refresh_tx = ui_refresh_channel.sender();
    let ui_refresh_rx = ui_refresh_channel.receiver();
    let ui_command_tx = ui_command_channel.sender();
    let ui_command_rx = ui_command_channel.receiver();

    // Spawn Embassy executor on a dedicated background thread
    let task_config = config.clone();
    let _embassy_handle = thread::Builder::new()
        .name("embassy-executor".to_string())
        .spawn(move || {
            // Leak the executor to satisfy the 'static lifetime required by run()
            let executor: &'static mut Executor = Box::leak(Box::new(Executor::new()));
            executor.run(|spawner| embassy_init(spawner, task_config, ui_refresh_tx, ui_command_rx));
        })
        .expect("failed to spawn embassy thread");

    // Start the GUI on the main thread (required on macOS)
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1280.0, 820.0]),
        ..Default::default()
    };
    let _ = eframe::run_native(
        "Epidemic Graph Viewer",
        native_options,
        Box::new(move |cc| {
            cc.egui_ctx.set_visuals(egui::Visuals::light());
            Ok(Box::new(AppState::new(ui_refresh_rx, ui_command_tx, config, alert, cc.storage)))
        }),
    );
}
