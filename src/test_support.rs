use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use image::DynamicImage;
use tokio::sync::Semaphore;

use crate::error::FetchError;
use crate::fetch::{validate_url, Artifact, Fetcher};

pub fn test_artifact(url: &str) -> Artifact {
    Artifact::new(DynamicImage::new_rgba8(2, 2), url)
}

/// In-memory fetcher: URLs containing "fail" error, URLs containing "slow"
/// wait for a permit from `gate`, everything else succeeds at once.
pub struct FakeFetcher {
    calls: Mutex<Vec<String>>,
    in_flight: Arc<AtomicUsize>,
    pub gate: Arc<Semaphore>,
}

impl FakeFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            in_flight: Arc::new(AtomicUsize::new(0)),
            gate: Arc::new(Semaphore::new(0)),
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls().len()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn release(&self, permits: usize) {
        self.gate.add_permits(permits);
    }
}

impl Fetcher for FakeFetcher {
    fn fetch(&self, url: &str) -> BoxFuture<'static, Result<Artifact, FetchError>> {
        if let Err(e) = validate_url(url) {
            return futures_util::future::ready(Err(e)).boxed();
        }

        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_string());

        let url = url.to_string();
        let gate = self.gate.clone();
        let in_flight = self.in_flight.clone();
        async move {
            if url.contains("slow") {
                in_flight.fetch_add(1, Ordering::SeqCst);
                let permit = gate.acquire().await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                if let Ok(permit) = permit {
                    permit.forget();
                }
            }
            if url.contains("fail") {
                Err(FetchError::Transport("connection refused".to_string()))
            } else {
                Ok(test_artifact(&url))
            }
        }
        .boxed()
    }
}
