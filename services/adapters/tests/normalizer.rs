//! Normalizer stage behaviour on a live queue

use feed_adapter::MessageNormalizer;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn kline_frame(symbol: &str, close: &str, closed: bool) -> Vec<u8> {
    format!(
        r#"{{"stream":"{lower}@kline_1m","data":{{"e":"kline","E":1700000000000,"s":"{symbol}","k":{{"t":1699999980000,"T":1700000039999,"s":"{symbol}","i":"1m","o":"1.0","c":"{close}","h":"1.0","l":"1.0","v":"10","n":3,"x":{closed}}}}}}}"#,
        lower = symbol.to_lowercase(),
    )
    .into_bytes()
}

#[tokio::test]
async fn drops_bad_frames_and_keeps_going() {
    let (frames_tx, frames_rx) = mpsc::channel(8);
    let (candles_tx, mut candles_rx) = mpsc::channel(8);
    let shutdown = CancellationToken::new();

    let stage = tokio::spawn(async move {
        MessageNormalizer::new()
            .run(frames_rx, candles_tx, shutdown)
            .await;
    });

    frames_tx.send(br#"{"bad":true}"#.to_vec()).await.unwrap();
    frames_tx.send(b"not json at all".to_vec()).await.unwrap();
    frames_tx
        .send(kline_frame("BTCUSDT", "37000.5", true))
        .await
        .unwrap();
    drop(frames_tx);

    let candle = candles_rx.recv().await.unwrap();
    assert_eq!(candle.symbol, "BTCUSDT");
    assert_eq!(candle.close, "37000.5");
    assert!(candle.is_closed);

    // Upstream closed: the stage exits and closes its output
    assert!(candles_rx.recv().await.is_none());
    stage.await.unwrap();
}

#[tokio::test]
async fn preserves_frame_order() {
    let (frames_tx, frames_rx) = mpsc::channel(8);
    let (candles_tx, mut candles_rx) = mpsc::channel(8);
    let shutdown = CancellationToken::new();

    tokio::spawn(async move {
        MessageNormalizer::new()
            .run(frames_rx, candles_tx, shutdown)
            .await;
    });

    for (symbol, close) in [("BTCUSDT", "1"), ("ETHUSDT", "2"), ("BTCUSDT", "3")] {
        frames_tx
            .send(kline_frame(symbol, close, false))
            .await
            .unwrap();
    }
    drop(frames_tx);

    let mut seen = Vec::new();
    while let Some(candle) = candles_rx.recv().await {
        seen.push((candle.symbol, candle.close));
    }
    assert_eq!(
        seen,
        vec![
            ("BTCUSDT".to_string(), "1".to_string()),
            ("ETHUSDT".to_string(), "2".to_string()),
            ("BTCUSDT".to_string(), "3".to_string()),
        ]
    );
}

#[tokio::test]
async fn stops_on_shutdown() {
    let (_frames_tx, frames_rx) = mpsc::channel::<Vec<u8>>(8);
    let (candles_tx, mut candles_rx) = mpsc::channel(8);
    let shutdown = CancellationToken::new();
    let token = shutdown.clone();

    let stage = tokio::spawn(async move {
        MessageNormalizer::new()
            .run(frames_rx, candles_tx, token)
            .await;
    });

    shutdown.cancel();
    stage.await.unwrap();
    assert!(candles_rx.recv().await.is_none());
}
