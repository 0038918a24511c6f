pub mod abi;
pub mod decoder;
pub mod provider;
pub mod source;

pub use abi::ERC1155;
pub use decoder::{DecodedWindow, TransferEvent, UriEvent, decode_window};
pub use provider::{ChainProvider, create_provider};
pub use source::{LogSource, RawLog, RpcLogSource};
