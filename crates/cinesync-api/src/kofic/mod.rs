//! KOFIC (Korean Film Council) box-office API client module.

mod api;
mod client;
mod types;

#[allow(clippy::module_name_repetitions)]
pub use api::{KoficApi, LocalKoficApi};
#[allow(clippy::module_name_repetitions)]
pub use client::{KoficClient, KoficClientBuilder};
#[allow(clippy::module_name_repetitions)]
pub use types::{KoficBoxOffice, KoficBoxOfficeResponse, KoficDailyEntry, KoficFault, parse_count};
