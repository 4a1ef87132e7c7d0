//! KOFIC job: daily box office and KOFIC to catalog mapping.

use std::future::Future;
use std::ops::Range;
use std::pin::pin;
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use cinesync_api::FetchError;
use cinesync_api::kofic::KoficApi;
use cinesync_api::tmdb::{SearchMovieParams, TmdbApi, TmdbMovieSummary, TmdbPage};
use cinesync_db::{
    MovieRecord, PersistOutcome, UnmappedKoficMovie, find_movie_id, find_movies_by_title,
    load_unmapped_kofic_movies, persist_box_office, persist_movies, update_kofic_mapping,
};
use futures::StreamExt;
use serde::Deserialize;
use tracing::instrument;

use crate::coordinator::{BatchCoordinator, BatchWork};
use crate::error::StageError;
use crate::matching::titles_match;
use crate::orchestrator::{IngestContext, RunReport, Stage, StageRunner, StageTally, run_stages};
use crate::retriever::retrieve;
use crate::retry::fetch_with_retry;
use crate::transform::{movie_record, normalize_box_office};

/// Stored movies considered per local title lookup.
const LOCAL_CANDIDATES: usize = 5;

/// Yesterday in local time, the most recent complete KOFIC ranking.
#[must_use]
pub fn default_target_date() -> NaiveDate {
    let today = Local::now().date_naive();
    today.pred_opt().unwrap_or(today)
}

/// What the KOFIC job fetches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KoficOptions {
    /// Ranking date.
    pub target_date: NaiveDate,
    /// Language of TMDB searches.
    pub language: String,
}

impl Default for KoficOptions {
    fn default() -> Self {
        Self {
            target_date: default_target_date(),
            language: String::from("ko-KR"),
        }
    }
}

/// Runs the KOFIC stages against one store.
#[derive(Debug)]
pub struct KoficJob<'a, K, T> {
    kofic: Arc<K>,
    tmdb: Arc<T>,
    ctx: IngestContext<'a>,
    options: KoficOptions,
}

impl<'a, K, T> KoficJob<'a, K, T>
where
    K: KoficApi + Send + Sync + 'static,
    T: TmdbApi + Send + Sync + 'static,
{
    /// Creates a job.
    #[must_use]
    pub const fn new(
        kofic: Arc<K>,
        tmdb: Arc<T>,
        ctx: IngestContext<'a>,
        options: KoficOptions,
    ) -> Self {
        Self {
            kofic,
            tmdb,
            ctx,
            options,
        }
    }

    /// Runs `stages` in order and reports each one.
    #[instrument(skip_all, fields(target_date = %self.options.target_date))]
    pub async fn run(&self, stages: &[Stage]) -> RunReport {
        run_stages(self, stages, self.ctx.cancel).await
    }

    async fn box_office(&self, tally: &mut StageTally) -> Result<(), StageError> {
        let target_date = self.options.target_date;
        let result = fetch_with_retry(self.ctx.batch.retry, self.ctx.cancel, || {
            self.kofic.daily_box_office(target_date)
        })
        .await?;

        let batch = normalize_box_office(target_date, &result);
        let persisted = persist_box_office(self.ctx.conn, &batch.movies, &batch.entries)?;
        tally.record_batch(&BatchWork {
            fetched: batch.entries.len(),
            skipped: 0,
            persisted,
        });
        Ok(())
    }

    async fn kofic_mapping(&self, tally: &mut StageTally) -> Result<(), StageError> {
        let unmapped = load_unmapped_kofic_movies(self.ctx.conn)?;

        let api = Arc::clone(&self.tmdb);
        let language = self.options.language.clone();
        let search = Arc::new(move |movie: UnmappedKoficMovie| {
            let api = Arc::clone(&api);
            let params = SearchMovieParams::new(movie.name).language(language.as_str());
            async move { api.search_movie(&params).await }
        });

        let coordinator =
            BatchCoordinator::new(Stage::KoficMapping, self.ctx.batch, self.ctx.cancel);
        let mut batches = pin!(coordinator.run(unmapped.len(), |range: Range<usize>| {
            let movies = unmapped.get(range).map(<[_]>::to_vec).unwrap_or_default();
            self.mapping_batch(movies, &search)
        }));

        while let Some(outcome) = batches.next().await {
            tally.record_batch(&outcome?.work);
        }
        Ok(())
    }

    /// Maps one batch: stored titles first, then a TMDB search for the rest.
    async fn mapping_batch<F, Fut>(
        &self,
        movies: Vec<UnmappedKoficMovie>,
        search: &Arc<F>,
    ) -> Result<BatchWork, StageError>
    where
        F: Fn(UnmappedKoficMovie) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<TmdbPage, FetchError>> + Send + 'static,
    {
        let conn = self.ctx.conn;
        let examined = movies.len();
        let mut linked = 0_usize;
        let mut pending = Vec::new();

        for movie in movies {
            let candidates = find_movies_by_title(conn, &movie.name, LOCAL_CANDIDATES)?;
            if let Some(found) = candidates.iter().find(|c| titles_match(&c.title, &movie.name)) {
                tracing::debug!(kofic = %movie.name, title = %found.title, "matched stored movie");
                update_kofic_mapping(conn, movie.id, found.id)?;
                linked = linked.saturating_add(1);
            } else {
                pending.push(movie);
            }
        }

        let retrieval = retrieve(
            self.ctx.pool,
            pending,
            self.ctx.batch.retry,
            self.ctx.cancel,
            search,
        )
        .await;
        if retrieval.cancelled {
            return Err(StageError::Cancelled);
        }
        let mut skipped = retrieval.failed.len();

        let mut found: Vec<(UnmappedKoficMovie, MovieRecord)> = Vec::new();
        for (movie, page) in retrieval.fetched {
            match first_result(&page) {
                Some(record) => found.push((movie, record)),
                None => {
                    tracing::warn!(kofic = %movie.name, movie_cd = %movie.movie_cd, "no TMDB match");
                    skipped = skipped.saturating_add(1);
                }
            }
        }

        let records: Vec<MovieRecord> = found.iter().map(|(_, record)| record.clone()).collect();
        let mut persisted = if records.is_empty() {
            PersistOutcome::default()
        } else {
            persist_movies(conn, &records)?
        };

        for (movie, record) in &found {
            let Some(movie_id) = find_movie_id(conn, record.tmdb_id)? else {
                skipped = skipped.saturating_add(1);
                continue;
            };
            tracing::debug!(kofic = %movie.name, tmdb_id = record.tmdb_id, "matched by search");
            update_kofic_mapping(conn, movie.id, movie_id)?;
            linked = linked.saturating_add(1);
        }

        persisted.linked = persisted.linked.saturating_add(linked);
        Ok(BatchWork {
            fetched: examined,
            skipped,
            persisted,
        })
    }
}

/// First search result that decodes as a movie.
fn first_result(page: &TmdbPage) -> Option<MovieRecord> {
    page.results
        .iter()
        .find_map(|item| TmdbMovieSummary::deserialize(item).ok())
        .map(movie_record)
}

impl<K, T> StageRunner for KoficJob<'_, K, T>
where
    K: KoficApi + Send + Sync + 'static,
    T: TmdbApi + Send + Sync + 'static,
{
    async fn run_stage(&self, stage: Stage, tally: &mut StageTally) -> Result<(), StageError> {
        match stage {
            Stage::BoxOffice => self.box_office(tally).await,
            Stage::KoficMapping => self.kofic_mapping(tally).await,
            _ => {
                tracing::warn!(%stage, "not a KOFIC stage, skipping");
                Ok(())
            }
        }
    }
}
