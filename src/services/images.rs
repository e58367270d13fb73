use crate::core::state::{GeneratedImage, GenerationTicket, ImageKind};
use crate::services::envelope::Envelope;
use crate::services::image_gen::ImageGenerator;
use crate::utils::image::InlineImage;
use futures_util::{Stream, StreamExt};
use log::{debug, info, warn};
use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Settled slots of one run, in slot order. Slot 0 is always first.
#[derive(Debug)]
pub struct SlotStream {
    slots: ReceiverStream<GeneratedImage>,
    reference: Arc<OnceLock<String>>,
}

impl SlotStream {
    /// Uploaded reference URL, once the upload has finished.
    pub fn reference_url(&self) -> Option<String> {
        self.reference.get().cloned()
    }
}

impl Stream for SlotStream {
    type Item = GeneratedImage;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.slots).poll_next(cx)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRun {
    pub images: Vec<GeneratedImage>,
    pub success_count: usize,
    pub total_count: usize,
    pub duration_ms: u64,
    pub is_mock: bool,
    pub reference_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ImageOrchestrator {
    generator: Option<Arc<dyn ImageGenerator>>,
    slot_delay: Duration,
}

impl ImageOrchestrator {
    pub fn new(generator: Option<Arc<dyn ImageGenerator>>, slot_delay: Duration) -> Self {
        Self {
            generator,
            slot_delay,
        }
    }

    /// Starts a run bound to `ticket`. The original is queued before the
    /// background task exists; the task stops as soon as the ticket goes
    /// stale or the stream is dropped.
    pub fn start(
        &self,
        original: &InlineImage,
        reference_url: Option<String>,
        prompts: &[String],
        labels: &[String],
        ticket: GenerationTicket,
    ) -> SlotStream {
        let (tx, rx) = mpsc::channel(1);
        let slot0 = GeneratedImage::original(original);
        let reference = Arc::new(OnceLock::new());
        if let Some(url) = reference_url {
            let _ = reference.set(url);
        }

        if tx.try_send(slot0.clone()).is_err() {
            // cannot happen on a fresh channel with room for one
            warn!("Failed to queue original slot");
        }

        let task = SlotTask {
            generator: self.generator.clone(),
            delay: self.slot_delay,
            original: original.clone(),
            slot0,
            prompts: prompts.to_vec(),
            labels: labels.to_vec(),
            ticket,
            reference: reference.clone(),
            tx,
        };
        tokio::spawn(task.run());

        SlotStream {
            slots: ReceiverStream::new(rx),
            reference,
        }
    }

    /// Drains one run, calling `on_image_ready` once per slot in order.
    pub async fn generate_style_images<F>(
        &self,
        original: &InlineImage,
        reference_url: Option<String>,
        prompts: &[String],
        labels: &[String],
        ticket: GenerationTicket,
        mut on_image_ready: F,
    ) -> GenerationRun
    where
        F: FnMut(&GeneratedImage),
    {
        let start = Instant::now();
        let mut stream = self.start(original, reference_url, prompts, labels, ticket.clone());
        let mut images = Vec::with_capacity(prompts.len() + 1);

        while let Some(slot) = stream.next().await {
            if !ticket.is_current() {
                debug!("Run {} superseded, dropping slot {}", ticket.generation(), slot.id);
                break;
            }
            on_image_ready(&slot);
            images.push(slot);
        }

        let success_count = images.iter().filter(|i| i.kind == ImageKind::Generated).count();
        let is_mock = images.iter().any(|i| i.kind == ImageKind::Mock);
        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Generated {}/{} style images in {} ms{}",
            success_count,
            prompts.len(),
            duration_ms,
            if is_mock { " (mock)" } else { "" }
        );

        GenerationRun {
            images,
            success_count,
            total_count: prompts.len(),
            duration_ms,
            is_mock,
            reference_url: stream.reference_url(),
        }
    }
}

struct SlotTask {
    generator: Option<Arc<dyn ImageGenerator>>,
    delay: Duration,
    original: InlineImage,
    slot0: GeneratedImage,
    prompts: Vec<String>,
    labels: Vec<String>,
    ticket: GenerationTicket,
    reference: Arc<OnceLock<String>>,
    tx: mpsc::Sender<GeneratedImage>,
}

impl SlotTask {
    fn label(&self, i: usize) -> Option<&str> {
        self.labels.get(i).map(String::as_str)
    }

    fn live(&self) -> bool {
        self.ticket.is_current() && !self.tx.is_closed()
    }

    async fn run(self) {
        let Some(generator) = self.generator.clone() else {
            info!("No image generator configured, emitting mock slots");
            return self.emit_mocks().await;
        };

        let reference_url = match self.reference.get() {
            Some(url) => url.clone(),
            None => match generator.upload_reference(&self.original).await {
                Ok(url) => {
                    let _ = self.reference.set(url.clone());
                    url
                }
                Err(e) => {
                    warn!("Reference upload failed, emitting mock slots: {:#}", e);
                    return self.emit_mocks().await;
                }
            },
        };

        for (i, prompt) in self.prompts.iter().enumerate() {
            if i > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if !self.live() {
                debug!("Generation {} stopped before slot {}", self.ticket.generation(), i + 1);
                return;
            }

            let slot = match generator.generate(prompt, Some(&reference_url)).await {
                Envelope::Success { data, duration_ms } => {
                    GeneratedImage::generated(i + 1, data, prompt, self.label(i), duration_ms)
                }
                Envelope::Failure { error, duration_ms } => {
                    warn!("Slot {} failed: {}", i + 1, error);
                    GeneratedImage::failed(i + 1, error, prompt, self.label(i), duration_ms)
                }
            };

            if !self.ticket.is_current() || self.tx.send(slot).await.is_err() {
                return;
            }
        }
    }

    async fn emit_mocks(&self) {
        for (i, prompt) in self.prompts.iter().enumerate() {
            if !self.live() {
                return;
            }
            let slot = GeneratedImage::mock(i + 1, &self.slot0, prompt, self.label(i));
            if self.tx.send(slot).await.is_err() {
                return;
            }
        }
    }
}
