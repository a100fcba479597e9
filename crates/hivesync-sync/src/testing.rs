// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of HiveSync.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Scripted collaborators for unit tests

use crate::device::{Clock, Restarter, UpdateSink};
use crate::error::{Result, SyncError};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, StreamingResponse};
use async_trait::async_trait;
use futures_util::StreamExt;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub struct MockStream {
    pub status: u16,
    pub content_length: Option<u64>,
    pub chunks: Vec<Result<Vec<u8>>>,
    /// Wait before each chunk is delivered
    pub chunk_delay: Duration,
}

impl MockStream {
    pub fn ok(data: &[u8], chunk_size: usize) -> Self {
        Self {
            status: 200,
            content_length: Some(data.len() as u64),
            chunks: data.chunks(chunk_size).map(|c| Ok(c.to_vec())).collect(),
            chunk_delay: Duration::ZERO,
        }
    }
}

/// Replays queued responses in order and records every request
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<Result<HttpResponse>>>,
    streams: Mutex<VecDeque<MockStream>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&self, response: HttpResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    pub fn push_error(&self, error: SyncError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn push_stream(&self, stream: MockStream) {
        self.streams.lock().unwrap().push_back(stream);
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(SyncError::Transport("no scripted response".to_string())))
    }

    async fn open_stream(&self, request: HttpRequest) -> Result<StreamingResponse> {
        self.requests.lock().unwrap().push(request);
        let stream = self
            .streams
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| SyncError::Transport("no scripted stream".to_string()))?;

        let delay = stream.chunk_delay;
        let body = futures_util::stream::iter(stream.chunks).then(move |chunk| async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            chunk
        });

        Ok(StreamingResponse {
            status: stream.status,
            content_length: stream.content_length,
            body: Box::pin(body),
        })
    }
}

#[derive(Debug, Default)]
pub struct SinkLog {
    pub begun: Option<u64>,
    pub data: Vec<u8>,
    pub finalize_calls: usize,
    pub abort_calls: usize,
}

/// In-memory update sink with switchable failure modes
#[derive(Debug)]
pub struct RecordingSink {
    log: Arc<Mutex<SinkLog>>,
    pub fail_begin: bool,
    pub fail_finalize: bool,
    pub report_finished: bool,
    /// Total bytes accepted before writes come up short
    pub capacity: Option<usize>,
    finished: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(SinkLog::default())),
            fail_begin: false,
            fail_finalize: false,
            report_finished: true,
            capacity: None,
            finished: false,
        }
    }

    pub fn log(&self) -> Arc<Mutex<SinkLog>> {
        Arc::clone(&self.log)
    }
}

impl UpdateSink for RecordingSink {
    fn begin(&mut self, size: u64) -> Result<()> {
        if self.fail_begin {
            return Err(SyncError::UpdateBegin("not enough space".to_string()));
        }
        self.log.lock().unwrap().begun = Some(size);
        Ok(())
    }

    fn write(&mut self, chunk: &[u8]) -> Result<usize> {
        let mut log = self.log.lock().unwrap();
        let room = self
            .capacity
            .map_or(chunk.len(), |cap| cap.saturating_sub(log.data.len()));
        let take = chunk.len().min(room);
        log.data.extend_from_slice(&chunk[..take]);
        Ok(take)
    }

    fn finalize(&mut self) -> Result<()> {
        self.log.lock().unwrap().finalize_calls += 1;
        if self.fail_finalize {
            return Err(SyncError::FinalizeFailed("image validation failed".to_string()));
        }
        self.finished = self.report_finished;
        Ok(())
    }

    fn abort(&mut self) {
        self.log.lock().unwrap().abort_calls += 1;
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}

#[derive(Debug, Default, Clone)]
pub struct CountingRestarter {
    count: Arc<AtomicUsize>,
}

impl CountingRestarter {
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl Restarter for CountingRestarter {
    fn restart(&mut self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
pub struct FixedClock {
    pub uptime_ms: u64,
    pub wall_clock: Option<i64>,
    sync_calls: AtomicUsize,
}

impl FixedClock {
    pub fn new(uptime_ms: u64, wall_clock: Option<i64>) -> Self {
        Self {
            uptime_ms,
            wall_clock,
            sync_calls: AtomicUsize::new(0),
        }
    }

    pub fn sync_calls(&self) -> usize {
        self.sync_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Clock for FixedClock {
    fn uptime_ms(&self) -> u64 {
        self.uptime_ms
    }

    async fn wall_clock(&self, _timeout: Duration) -> Option<i64> {
        self.sync_calls.fetch_add(1, Ordering::SeqCst);
        self.wall_clock
    }
}
