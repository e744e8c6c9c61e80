//! Raster tile backdrop for the slippy map.
//!
//! Downloads happen on a worker thread fed through a bounded channel; decoded
//! images come back on a second channel and are uploaded as textures on the UI
//! thread. A tile that failed once is not requested again until
//! `forget_failures` is called (the map instance was replaced).

use anyhow::{Context, Result, anyhow};
use eframe::egui;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use reqwest::blocking::Client;
use std::collections::{HashMap, HashSet};
use std::thread;
use std::time::Duration;

use crate::config::MapConfig;

const TILE_CHANNEL_SIZE: usize = 64;
/// Textures kept in memory before the least recently drawn ones are dropped.
const MAX_TEXTURES: usize = 384;

type TileRequestChannel = Channel<CriticalSectionRawMutex, TileId, TILE_CHANNEL_SIZE>;
type TileResultChannel = Channel<CriticalSectionRawMutex, TileResult, TILE_CHANNEL_SIZE>;

/// Slippy map tile address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileId {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileId {
    /// Fill a `{z}/{x}/{y}` URL template.
    pub fn url(&self, template: &str) -> String {
        template
            .replace("{z}", &self.z.to_string())
            .replace("{x}", &self.x.to_string())
            .replace("{y}", &self.y.to_string())
    }
}

#[derive(Debug)]
struct TileResult {
    id: TileId,
    image: Result<egui::ColorImage, String>,
}

fn decode_tile(bytes: &[u8]) -> Result<egui::ColorImage> {
    let img = image::load_from_memory(bytes).context("Failed to decode tile image")?;
    let rgba = img.to_rgba8();
    let size = [rgba.width() as usize, rgba.height() as usize];
    let pixels = rgba.as_flat_samples();
    Ok(egui::ColorImage::from_rgba_unmultiplied(size, pixels.as_slice()))
}

fn fetch_tile(client: &Client, template: &str, id: TileId) -> Result<egui::ColorImage> {
    let url = id.url(template);
    let response = client.get(&url).send().with_context(|| format!("GET {} failed", url))?;
    let status = response.status();
    if !status.is_success() {
        return Err(anyhow!("GET {} failed: {}", url, status));
    }
    let bytes = response.bytes().with_context(|| format!("GET {}: reading body failed", url))?;
    decode_tile(&bytes)
}

fn tile_worker(client: Client, template: String, requests: Receiver<'static, CriticalSectionRawMutex, TileId, TILE_CHANNEL_SIZE>, results: Sender<'static, CriticalSectionRawMutex, TileResult, TILE_CHANNEL_SIZE>) {
    loop {
        let id = embassy_futures::block_on(requests.receive());
        let image = fetch_tile(&client, &template, id).map_err(|e| format!("{:#}", e));
        embassy_futures::block_on(results.send(TileResult { id, image }));
    }
}

/// Texture cache for map tiles, owned by the UI thread.
pub struct TileCache {
    requests: Sender<'static, CriticalSectionRawMutex, TileId, TILE_CHANNEL_SIZE>,
    results: Receiver<'static, CriticalSectionRawMutex, TileResult, TILE_CHANNEL_SIZE>,
    textures: HashMap<TileId, (egui::TextureHandle, u64)>,
    pending: HashSet<TileId>,
    failed: HashSet<TileId>,
    frame: u64,
}

impl TileCache {
    /// Start the download worker. Returns `None` when no tile source is configured.
    pub fn spawn(config: &MapConfig, timeout_secs: u64) -> Result<Option<Self>> {
        let Some(template) = config.tile_url.clone().filter(|t| !t.trim().is_empty()) else {
            return Ok(None);
        };
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .context("Failed to create tile HTTP client")?;

        let request_channel: &'static TileRequestChannel = Box::leak(Box::new(TileRequestChannel::new()));
        let result_channel: &'static TileResultChannel = Box::leak(Box::new(TileResultChannel::new()));
        let (worker_requests, worker_results) = (request_channel.receiver(), result_channel.sender());

        log::info!("Map tiles from {}", template);
        thread::Builder::new()
            .name("tile-loader".to_string())
            .spawn(move || tile_worker(client, template, worker_requests, worker_results))
            .context("Failed to spawn tile loader thread")?;

        Ok(Some(Self {
            requests: request_channel.sender(),
            results: result_channel.receiver(),
            textures: HashMap::new(),
            pending: HashSet::new(),
            failed: HashSet::new(),
            frame: 0,
        }))
    }

    /// Upload whatever the worker finished since the last frame.
    pub fn poll(&mut self, ctx: &egui::Context) {
        self.frame += 1;
        while let Ok(result) = self.results.try_receive() {
            self.pending.remove(&result.id);
            match result.image {
                Ok(image) => {
                    let name = format!("tile-{}-{}-{}", result.id.z, result.id.x, result.id.y);
                    let texture = ctx.load_texture(name, image, egui::TextureOptions::LINEAR);
                    self.textures.insert(result.id, (texture, self.frame));
                }
                Err(err) => {
                    log::warn!("Tile {:?} failed: {}", result.id, err);
                    self.failed.insert(result.id);
                }
            }
        }
        self.evict();
    }

    /// Texture for `id` if loaded; otherwise queue it (once) and return `None`.
    pub fn texture(&mut self, id: TileId) -> Option<&egui::TextureHandle> {
        if let Some(entry) = self.textures.get_mut(&id) {
            entry.1 = self.frame;
            return Some(&entry.0);
        }
        if !self.pending.contains(&id) && !self.failed.contains(&id) && self.requests.try_send(id).is_ok() {
            self.pending.insert(id);
        }
        None
    }

    /// Allow previously failed tiles to be requested again.
    pub fn forget_failures(&mut self) {
        self.failed.clear();
    }

    fn evict(&mut self) {
        if self.textures.len() <= MAX_TEXTURES {
            return;
        }
        let mut by_age: Vec<(TileId, u64)> = self.textures.iter().map(|(id, (_, used))| (*id, *used)).collect();
        by_age.sort_by_key(|(_, used)| *used);
        let excess = self.textures.len() - MAX_TEXTURES;
        for (id, _) in by_age.into_iter().take(excess) {
            self.textures.remove(&id);
        }
    }
}
