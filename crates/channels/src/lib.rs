//! Channel adapter contract.
//!
//! A channel is the single exclusive connection through which outbound
//! messages reach the remote chat client. Concrete adapters (the WhatsApp Web
//! browser automation, the in-memory test channel) implement
//! [`ChannelAdapter`]; the dispatcher only ever talks to this trait.

pub mod adapter;
pub mod error;
pub mod memory;

pub use {
    adapter::{
        ChannelAdapter, ChannelConnector, ChannelSlot, SendReceipt, SendResult, SharedChannel,
        normalize_address,
    },
    error::{ChannelError, Result},
    memory::{MemoryCall, MemoryChannel, MemoryConnector, MemoryProbe},
};
