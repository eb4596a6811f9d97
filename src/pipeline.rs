// src/pipeline.rs
//! Extraction orchestrator: bounded concurrent fan-out, one vision call
//! per image. Correlation is by explicit index, never by completion
//! order, so upload order survives however the network interleaves.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use once_cell::sync::OnceCell;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::ExtractError;
use crate::label;
use crate::model::Card;
use crate::parse;
use crate::vision::VisionBackend;

/// Fallback message for an image whose task reported nothing.
const RECOGNITION_FAILED: &str = "recognition failed";

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("extract_batches_total", "Extraction batches processed.");
        describe_counter!("extract_images_total", "Images submitted for extraction.");
        describe_counter!(
            "extract_image_errors_total",
            "Images whose extraction failed."
        );
        describe_counter!("extract_cards_total", "Cards extracted from model output.");
        describe_histogram!("extract_batch_ms", "Whole-batch extraction time in ms.");
        describe_gauge!(
            "extract_last_batch_ts",
            "Unix ts when the last batch finished."
        );
    });
}

/// Outcome of one batch: labeled cards in upload order plus per-image
/// failure messages.
#[derive(Debug)]
pub struct BatchOutcome {
    pub cards: Vec<Card>,
    pub errors: Vec<String>,
    /// Number of images submitted; `images - errors.len()` succeeded.
    pub images: usize,
}

impl BatchOutcome {
    pub fn succeeded_images(&self) -> usize {
        self.images - self.errors.len()
    }
}

pub struct Orchestrator {
    backend: Arc<dyn VisionBackend>,
    max_concurrency: usize,
}

impl Orchestrator {
    pub fn new(backend: Arc<dyn VisionBackend>, max_concurrency: usize) -> Self {
        Self {
            backend,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Run one extraction batch: fan out up to `max_concurrency` vision
    /// calls, parse each reply, then rank and label the flattened cards.
    /// One image's failure never aborts its siblings; zero images fail
    /// fast before any call.
    pub async fn run_batch(&self, images: Vec<String>) -> Result<BatchOutcome, ExtractError> {
        if images.is_empty() {
            return Err(ExtractError::NoImages);
        }
        ensure_metrics_described();
        let started = Instant::now();
        let total = images.len();

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks: JoinSet<(usize, Result<Vec<Card>, ExtractError>)> = JoinSet::new();

        for (index, image) in images.into_iter().enumerate() {
            let backend = Arc::clone(&self.backend);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("semaphore closed");
                let result = match backend.extract_text(&image).await {
                    Ok(text) => parse::parse_cards(&text),
                    Err(e) => Err(e),
                };
                (index, result)
            });
        }

        let mut slots: Vec<Option<Result<Vec<Card>, ExtractError>>> = Vec::new();
        slots.resize_with(total, || None);
        while let Some(joined) = tasks.join_next().await {
            // A panicked task reports nothing; its slot falls back below.
            if let Ok((index, result)) = joined {
                slots[index] = Some(result);
            }
        }

        let mut cards = Vec::new();
        let mut errors = Vec::new();
        for (index, slot) in slots.into_iter().enumerate() {
            match slot {
                Some(Ok(mut extracted)) => cards.append(&mut extracted),
                Some(Err(e)) => {
                    tracing::warn!(
                        backend = self.backend.name(),
                        image = index + 1,
                        error = %e,
                        "image extraction failed"
                    );
                    errors.push(format!("image {}: {e}", index + 1));
                }
                None => errors.push(format!("image {}: {RECOGNITION_FAILED}", index + 1)),
            }
        }

        label::label_batch(&mut cards);

        counter!("extract_batches_total").increment(1);
        counter!("extract_images_total").increment(total as u64);
        counter!("extract_image_errors_total").increment(errors.len() as u64);
        counter!("extract_cards_total").increment(cards.len() as u64);
        histogram!("extract_batch_ms").record(started.elapsed().as_millis() as f64);
        gauge!("extract_last_batch_ts").set(chrono::Utc::now().timestamp() as f64);

        Ok(BatchOutcome {
            cards,
            errors,
            images: total,
        })
    }
}
