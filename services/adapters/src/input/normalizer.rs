//! Raw frame to [`Candle`] normalization
//!
//! The feed can deliver the same kline event in two shapes: wrapped in a
//! combined-stream envelope (`{"stream":..,"data":{..}}`) or bare. Each shape has its
//! own [`CandleDecoder`]; the normalizer tries them in order and takes the first one
//! that succeeds. Frames no decoder accepts are logged and dropped by the stage loop.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use types::{Candle, KlineEvent, StreamEnvelope};

use crate::{AdapterError, Result};

/// One accepted wire shape for a kline frame
pub trait CandleDecoder: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    fn decode(&self, frame: &[u8]) -> Result<Candle>;
}

/// Combined-stream envelope: `{"stream":"btcusdt@kline_1m","data":{...}}`
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvelopeDecoder;

impl CandleDecoder for EnvelopeDecoder {
    fn name(&self) -> &'static str {
        "envelope"
    }

    fn decode(&self, frame: &[u8]) -> Result<Candle> {
        let envelope: StreamEnvelope<KlineEvent> = serde_json::from_slice(frame)?;
        Ok(Candle::from(envelope.data))
    }
}

/// Bare kline event as sent on raw `/ws/<stream>` connections
#[derive(Debug, Default, Clone, Copy)]
pub struct BareEventDecoder;

impl CandleDecoder for BareEventDecoder {
    fn name(&self) -> &'static str {
        "bare"
    }

    fn decode(&self, frame: &[u8]) -> Result<Candle> {
        let event: KlineEvent = serde_json::from_slice(frame)?;
        Ok(Candle::from(event))
    }
}

/// Turns raw frames into candles
pub struct MessageNormalizer {
    decoders: Vec<Box<dyn CandleDecoder>>,
}

impl Default for MessageNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageNormalizer {
    /// Normalizer accepting both envelope and bare frames, envelope first
    pub fn new() -> Self {
        Self::with_decoders(vec![Box::new(EnvelopeDecoder), Box::new(BareEventDecoder)])
    }

    pub fn with_decoders(decoders: Vec<Box<dyn CandleDecoder>>) -> Self {
        Self { decoders }
    }

    /// Decode one frame with the first decoder that accepts it
    pub fn normalize(&self, frame: &[u8]) -> Result<Candle> {
        let mut last_error = None;

        for decoder in &self.decoders {
            match decoder.decode(frame) {
                Ok(candle) => return Ok(candle),
                Err(e) => {
                    tracing::trace!("Decoder '{}' rejected frame: {}", decoder.name(), e);
                    last_error = Some(e);
                }
            }
        }

        Err(AdapterError::Normalization {
            attempts: self.decoders.len(),
            detail: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no decoders configured".to_string()),
        })
    }

    /// Stage loop: frames in, candles out, until either side closes or shutdown.
    ///
    /// Bad frames are dropped with a warning; the stage keeps going.
    pub async fn run(
        &self,
        mut frames: mpsc::Receiver<Vec<u8>>,
        candles: mpsc::Sender<Candle>,
        shutdown: CancellationToken,
    ) {
        let mut dropped: u64 = 0;

        loop {
            let frame = tokio::select! {
                _ = shutdown.cancelled() => break,
                frame = frames.recv() => match frame {
                    Some(frame) => frame,
                    None => break,
                },
            };

            let candle = match self.normalize(&frame) {
                Ok(candle) => candle,
                Err(e) => {
                    dropped += 1;
                    tracing::warn!(
                        "Dropping unparseable frame ({} bytes): {}",
                        frame.len(),
                        e
                    );
                    continue;
                }
            };

            tokio::select! {
                _ = shutdown.cancelled() => break,
                sent = candles.send(candle) => {
                    if sent.is_err() {
                        tracing::debug!("Candle consumer gone; normalizer stopping");
                        break;
                    }
                }
            }
        }

        tracing::info!("Normalizer stopped ({} frames dropped)", dropped);
    }
}
