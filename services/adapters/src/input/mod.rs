//! Input side of the feed: socket ownership, reconnection, and frame decoding

pub mod connection;
pub mod normalizer;
pub mod reconnect;

pub use connection::{
    build_stream_url, ConnectionState, Dialer, FeedConnector, FeedLink, FrameSink, FrameStream,
    TungsteniteDialer, WsError,
};
pub use normalizer::{BareEventDecoder, CandleDecoder, EnvelopeDecoder, MessageNormalizer};
pub use reconnect::FixedIntervalRetry;
