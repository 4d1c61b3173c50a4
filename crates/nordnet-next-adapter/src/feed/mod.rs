/*
[INPUT]:  Session keys, feed endpoints and subscription requests
[OUTPUT]: Logged-in public/private feeds and their decoded events
[POS]:    Feed layer - streaming socket feeds
[UPDATE]: When adding feed commands or changing connection logic
*/

pub mod channel;
pub mod command;
pub mod events;
pub mod frame;
pub mod hub;
pub mod transport;

pub use channel::{FeedConnection, FeedWriter};
pub use command::{FeedCommand, FeedCommandKind};
pub use events::{DEFAULT_EVENT_CAPACITY, FeedEvent, FeedEventBody, FeedEventBus};
pub use frame::{DEFAULT_MAX_FRAME_BYTES, Frame, FrameBuffer};
pub use hub::FeedHub;
pub use transport::{BoxedFeedIo, FeedConnector, FeedIo, create_tls_config};
