//! Wire-format tests against captured exchange payloads

use chrono::{TimeZone, Utc};
use serde_json::Value;
use types::{Candle, KlineEvent, Signal, SignalType, StreamEnvelope};

const BARE_EVENT: &str = r#"{
    "e": "kline",
    "E": 1700000012345,
    "s": "BTCUSDT",
    "k": {
        "t": 1699999980000,
        "T": 1700000039999,
        "s": "BTCUSDT",
        "i": "1m",
        "f": 3301200,
        "L": 3301299,
        "o": "37000.10000000",
        "c": "37010.55000000",
        "h": "37020.00000000",
        "l": "36990.00000000",
        "v": "12.50000000",
        "n": 100,
        "x": true,
        "q": "462631.87500000",
        "V": "6.25000000",
        "Q": "231315.93750000",
        "B": "0"
    }
}"#;

#[test]
fn test_bare_event_into_candle() {
    let event: KlineEvent = serde_json::from_str(BARE_EVENT).unwrap();
    let candle = Candle::from(event);

    assert_eq!(candle.symbol, "BTCUSDT");
    assert_eq!(candle.interval, "1m");
    assert_eq!(candle.event_time, 1_700_000_012_345);
    assert_eq!(candle.start_time, 1_699_999_980_000);
    assert_eq!(candle.close_time, 1_700_000_039_999);
    assert_eq!(candle.first_trade_id, 3_301_200);
    assert_eq!(candle.last_trade_id, 3_301_299);
    assert_eq!(candle.trade_count, 100);
    assert!(candle.is_closed);

    // Decimals stay exactly as sent
    assert_eq!(candle.open, "37000.10000000");
    assert_eq!(candle.volume, "12.50000000");
    assert_eq!(candle.taker_buy_quote_volume, "231315.93750000");

    assert_eq!(candle.close_price().unwrap(), 37010.55);
}

#[test]
fn test_envelope_wraps_event() {
    let raw = format!(r#"{{"stream":"btcusdt@kline_1m","data":{}}}"#, BARE_EVENT);
    let envelope: StreamEnvelope<KlineEvent> = serde_json::from_str(&raw).unwrap();

    assert_eq!(envelope.stream, "btcusdt@kline_1m");
    assert_eq!(envelope.data.kline.interval, "1m");
}

#[test]
fn test_optional_volume_fields_default() {
    let raw = r#"{"e":"kline","E":1,"s":"ETHUSDT","k":{
        "t":0,"T":59999,"s":"ETHUSDT","i":"1m",
        "o":"1","c":"2","h":"3","l":"0.5","v":"10","n":4,"x":false}}"#;
    let candle = Candle::from(serde_json::from_str::<KlineEvent>(raw).unwrap());

    assert_eq!(candle.first_trade_id, 0);
    assert!(candle.quote_volume.is_empty());
    assert!(!candle.is_closed);
}

#[test]
fn test_missing_candle_is_rejected() {
    assert!(serde_json::from_str::<KlineEvent>(r#"{"bad":true}"#).is_err());
    assert!(serde_json::from_str::<KlineEvent>(r#"{"e":"kline","E":1,"s":"X"}"#).is_err());
}

#[test]
fn test_signal_json_shape() {
    let signal = Signal {
        signal_type: SignalType::Bearish,
        symbol: "BTCUSDT".to_string(),
        interval: "1m".to_string(),
        price: 100.0,
        short_ema: 101.5,
        long_ema: 102.25,
        timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
    };

    let value: Value = serde_json::to_value(&signal).unwrap();
    assert_eq!(value["type"], "bearish");
    assert_eq!(value["symbol"], "BTCUSDT");
    assert_eq!(value["interval"], "1m");
    assert_eq!(value["price"], 100.0);
    assert_eq!(value["short_ema"], 101.5);
    assert_eq!(value["long_ema"], 102.25);
    assert_eq!(value["timestamp"], "2024-01-02T03:04:05Z");
    assert_eq!(value.as_object().unwrap().len(), 7);
}
