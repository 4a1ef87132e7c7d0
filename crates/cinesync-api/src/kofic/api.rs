//! `KoficApi` trait definition.
#![allow(clippy::future_not_send)]

use chrono::NaiveDate;

use super::types::KoficBoxOffice;
use crate::error::FetchError;

/// KOFIC box-office API trait.
///
/// Abstracts API operations for mock substitution in tests.
#[allow(clippy::module_name_repetitions)]
#[trait_variant::make(KoficApi: Send)]
pub trait LocalKoficApi {
    /// Fetches the daily box-office ranking for `target_date`.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] if the request, status or decoding fails, or
    /// if KOFIC answers with a fault document.
    async fn daily_box_office(&self, target_date: NaiveDate) -> Result<KoficBoxOffice, FetchError>;
}
