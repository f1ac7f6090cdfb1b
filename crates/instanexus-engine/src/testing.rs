//! Scripted remote doubles and synthetic images shared by the engine tests.

use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use instanexus_contracts::tasks::{
    RemoteError, SubmitData, SubmitResponse, TaskData, TaskEnvelope, TaskOutput, TaskRequest,
};
use serde_json::{json, Value};
use tokio::time::Instant;

use crate::error::{ApiError, DownloadError};
use crate::remote::{AssetFetcher, TaskApi};

/// Task API that replays queued responses and records every call.
///
/// Submissions with nothing queued are rejected with a 500; status requests
/// with nothing queued for that task answer `processing`.
#[derive(Default)]
pub struct ScriptedTaskApi {
    submits: Mutex<VecDeque<Result<SubmitResponse, ApiError>>>,
    statuses: Mutex<HashMap<String, VecDeque<Result<TaskEnvelope, ApiError>>>>,
    submitted: Mutex<Vec<TaskRequest>>,
    status_log: Mutex<Vec<(String, Instant)>>,
}

impl ScriptedTaskApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_submit(&self, response: Result<SubmitResponse, ApiError>) {
        self.submits.lock().unwrap().push_back(response);
    }

    pub fn push_status(&self, task_id: &str, response: Result<TaskEnvelope, ApiError>) {
        self.statuses
            .lock()
            .unwrap()
            .entry(task_id.to_string())
            .or_default()
            .push_back(response);
    }

    pub fn submitted(&self) -> Vec<TaskRequest> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn status_calls(&self, task_id: &str) -> usize {
        self.status_times(task_id).len()
    }

    pub fn status_times(&self, task_id: &str) -> Vec<Instant> {
        self.status_log
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == task_id)
            .map(|(_, at)| *at)
            .collect()
    }
}

#[async_trait]
impl TaskApi for ScriptedTaskApi {
    async fn submit(&self, request: &TaskRequest) -> Result<SubmitResponse, ApiError> {
        self.submitted.lock().unwrap().push(request.clone());
        self.submits
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(ApiError::Status {
                    status: 500,
                    body: "no scripted submission".to_string(),
                })
            })
    }

    async fn status(&self, task_id: &str) -> Result<TaskEnvelope, ApiError> {
        self.status_log
            .lock()
            .unwrap()
            .push((task_id.to_string(), Instant::now()));
        self.statuses
            .lock()
            .unwrap()
            .get_mut(task_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(processing(0)))
    }
}

/// In-memory asset host; unknown URLs answer 404.
#[derive(Default)]
pub struct MemoryFetcher {
    assets: HashMap<String, Vec<u8>>,
    requested: Mutex<Vec<String>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_asset(mut self, url: &str, bytes: Vec<u8>) -> Self {
        self.assets.insert(url.to_string(), bytes);
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl AssetFetcher for MemoryFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
        self.requested.lock().unwrap().push(url.to_string());
        self.assets
            .get(url)
            .cloned()
            .ok_or_else(|| DownloadError::Status {
                url: url.to_string(),
                status: 404,
            })
    }
}

pub fn accepted(task_id: &str) -> SubmitResponse {
    SubmitResponse {
        data: Some(SubmitData {
            task_id: Some(task_id.to_string()),
        }),
    }
}

pub fn status_with(status: &str) -> TaskEnvelope {
    TaskEnvelope {
        data: TaskData {
            status: status.to_string(),
            ..TaskData::default()
        },
    }
}

pub fn processing(progress: u8) -> TaskEnvelope {
    TaskEnvelope {
        data: TaskData {
            status: "processing".to_string(),
            output: Some(TaskOutput {
                progress: Some(json!(progress)),
                ..TaskOutput::default()
            }),
            ..TaskData::default()
        },
    }
}

pub fn completed(url: &str, actions: &[&str]) -> TaskEnvelope {
    TaskEnvelope {
        data: TaskData {
            status: "completed".to_string(),
            output: Some(TaskOutput {
                image_url: Some(url.to_string()),
                progress: Some(json!(100)),
                actions: actions.iter().map(|action| action.to_string()).collect(),
            }),
            ..TaskData::default()
        },
    }
}

pub fn failed(message: Option<&str>) -> TaskEnvelope {
    TaskEnvelope {
        data: TaskData {
            status: "failed".to_string(),
            error: message.map(|message| RemoteError {
                code: None,
                message: Some(message.to_string()),
            }),
            ..TaskData::default()
        },
    }
}

pub fn flat(size: u32, value: u8) -> RgbImage {
    RgbImage::from_pixel(size, size, Rgb([value, value, value]))
}

pub fn checkerboard(size: u32, square: u32) -> RgbImage {
    RgbImage::from_fn(size, size, |x, y| {
        if ((x / square) + (y / square)) % 2 == 0 {
            Rgb([255, 255, 255])
        } else {
            Rgb([0, 0, 0])
        }
    })
}

/// Lays four equally sized cells out row-major into one 2x2 grid.
pub fn compose_grid(cells: [RgbImage; 4]) -> RgbImage {
    let (width, height) = cells[0].dimensions();
    let mut canvas = RgbImage::new(width * 2, height * 2);
    for (index, cell) in cells.iter().enumerate() {
        let x = (index as u32 % 2) * width;
        let y = (index as u32 / 2) * height;
        image::imageops::replace(&mut canvas, cell, i64::from(x), i64::from(y));
    }
    canvas
}

pub fn png_bytes(image: &RgbImage) -> Vec<u8> {
    let mut out = Vec::new();
    DynamicImage::ImageRgb8(image.clone())
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .expect("png encoding of an in-memory image");
    out
}

/// `type` of every JSON line in an event log, in file order.
pub fn logged_event_types(path: &Path) -> anyhow::Result<Vec<String>> {
    Ok(std::fs::read_to_string(path)?
        .lines()
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .filter_map(|row| row.get("type").and_then(Value::as_str).map(str::to_string))
        .collect())
}
