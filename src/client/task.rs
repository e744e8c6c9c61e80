//! Background task talking to the simulation API.
//!
//! Runs on the embassy executor thread. Each loop iteration waits for a UI
//! command or, while autoplay is on, for the next autoplay deadline, whichever
//! comes first. HTTP calls are blocking; this thread does nothing else.

use embassy_futures::select::{Either, select};
use embassy_time::{Duration, Instant, Timer};

use super::api::SimApiClient;
use super::session::SessionController;
use crate::config::ViewerConfig;
use crate::ui::{UICommand, UIRefreshState};
use crate::{UICommandChannelReceiver, UIRefreshChannelSender};

/// Next autoplay deadline after `previous`. Skips missed intervals instead of
/// firing a burst of catch-up steps.
pub fn next_deadline(previous: Instant, now: Instant, interval: Duration) -> Instant {
    let next = previous + interval;
    if next <= now { now + interval } else { next }
}

#[embassy_executor::task]
pub async fn sim_task(config: ViewerConfig, ui_refresh_tx: UIRefreshChannelSender, ui_command_rx: UICommandChannelReceiver) {
    let client = match SimApiClient::new(&config) {
        Ok(client) => client,
        Err(err) => {
            log::error!("Cannot create API client: {:#}", err);
            ui_refresh_tx
                .send(UIRefreshState::Error {
                    epoch: 0,
                    message: format!("Cannot create API client: {:#}", err),
                })
                .await;
            return;
        }
    };

    match client.health() {
        Ok(health) if health.ok => log::info!("Simulation API at {} is healthy", client.base()),
        Ok(_) => log::warn!("Simulation API at {} reports not ok", client.base()),
        Err(err) => log::warn!("Simulation API at {} unreachable: {:#}", client.base(), err),
    }

    let interval = Duration::from_millis(config.autoplay_interval_ms);
    let mut session = SessionController::new();
    let mut deadline: Option<Instant> = None;

    loop {
        let event = match deadline {
            Some(at) => select(ui_command_rx.receive(), Timer::at(at)).await,
            None => Either::First(ui_command_rx.receive().await),
        };

        let messages = match event {
            Either::First(command) => {
                if matches!(command, UICommand::Generate { .. }) {
                    ui_refresh_tx.send(UIRefreshState::Busy(true)).await;
                }
                session.handle(command, &client)
            }
            Either::Second(()) => {
                let out = session.autoplay_tick(&client);
                deadline = deadline.map(|at| next_deadline(at, Instant::now(), interval));
                out
            }
        };

        for message in messages {
            ui_refresh_tx.send(message).await;
        }

        deadline = match (session.autoplay_active(), deadline) {
            (true, Some(at)) => Some(at),
            (true, None) => Some(Instant::now() + interval),
            (false, _) => None,
        };
    }
}
