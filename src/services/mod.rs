pub mod gateway;
pub mod ledger;
pub mod price;
pub mod telegram;

pub use gateway::{BscGateway, ChainGateway};
pub use ledger::WalletLedger;
pub use price::PriceCache;
pub use telegram::TelegramBot;
