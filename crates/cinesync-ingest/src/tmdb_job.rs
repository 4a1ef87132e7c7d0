//! TMDB catalog job: genres, platforms, movies and per-movie resources.

use std::future::Future;
use std::ops::Range;
use std::pin::pin;
use std::sync::Arc;

use cinesync_api::tmdb::{
    TmdbApi, TmdbCredits, TmdbImages, TmdbMovieDetails, TmdbPage, TmdbVideos, TmdbWatchProviders,
};
use cinesync_api::{FetchError, MovieList, RawItem};
use cinesync_db::{
    PersistOutcome, count_movies, list_movie_tmdb_ids, persist_availability, persist_credits,
    persist_details, persist_genres, persist_images, persist_movies, persist_platforms,
    persist_videos,
};
use futures::StreamExt;
use rusqlite::Connection;
use tracing::instrument;

use crate::coordinator::{BatchCoordinator, BatchWork};
use crate::error::StageError;
use crate::orchestrator::{IngestContext, RunReport, Stage, StageRunner, StageTally, run_stages};
use crate::retriever::retrieve;
use crate::retry::fetch_with_retry;
use crate::transform::{
    normalize_availability, normalize_credits, normalize_details, normalize_genres,
    normalize_images, normalize_movies, normalize_platforms, normalize_videos,
};

/// Default page cap per movie list.
pub const DEFAULT_MAX_PAGES: u32 = 40;

/// What the TMDB job fetches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TmdbOptions {
    /// Movie lists walked by the movies stage, in order.
    pub movie_lists: Vec<MovieList>,
    /// Page cap per list.
    pub max_pages: u32,
    /// Availability region (ISO 3166-1).
    pub region: String,
}

impl Default for TmdbOptions {
    fn default() -> Self {
        Self {
            movie_lists: vec![MovieList::Discover],
            max_pages: DEFAULT_MAX_PAGES,
            region: String::from("KR"),
        }
    }
}

/// Runs the TMDB stages against one store.
#[derive(Debug)]
pub struct TmdbJob<'a, T> {
    api: Arc<T>,
    ctx: IngestContext<'a>,
    options: TmdbOptions,
}

impl<'a, T> TmdbJob<'a, T>
where
    T: TmdbApi + Send + Sync + 'static,
{
    /// Creates a job.
    #[must_use]
    pub const fn new(api: Arc<T>, ctx: IngestContext<'a>, options: TmdbOptions) -> Self {
        Self { api, ctx, options }
    }

    /// Runs `stages` in order and reports each one.
    #[instrument(skip_all, fields(stages = stages.len()))]
    pub async fn run(&self, stages: &[Stage]) -> RunReport {
        run_stages(self, stages, self.ctx.cancel).await
    }

    /// Fetches a single resource a stage cannot do without.
    async fn fetch_required<R, F, Fut>(&self, fetch: F) -> Result<R, StageError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<R, FetchError>>,
    {
        Ok(fetch_with_retry(self.ctx.batch.retry, self.ctx.cancel, fetch).await?)
    }

    async fn genres(&self, tally: &mut StageTally) -> Result<(), StageError> {
        let movie = self.fetch_required(|| self.api.movie_genres()).await?;
        let tv = self.fetch_required(|| self.api.tv_genres()).await?;

        let records = normalize_genres(&[movie, tv]);
        let summary = persist_genres(self.ctx.conn, &records)?;
        tally.record_batch(&BatchWork {
            fetched: records.len(),
            skipped: 0,
            persisted: PersistOutcome::from_summary(summary),
        });
        Ok(())
    }

    async fn platforms(&self, tally: &mut StageTally) -> Result<(), StageError> {
        let list = self.fetch_required(|| self.api.watch_provider_list()).await?;

        let records = normalize_platforms(&list);
        let summary = persist_platforms(self.ctx.conn, &records)?;
        tally.record_batch(&BatchWork {
            fetched: records.len(),
            skipped: 0,
            persisted: PersistOutcome::from_summary(summary),
        });
        Ok(())
    }

    async fn movies(&self, tally: &mut StageTally) -> Result<(), StageError> {
        for &list in &self.options.movie_lists {
            self.movie_list(list, tally).await?;
        }
        Ok(())
    }

    /// Walks one list: page 1 first to learn the page count, then the
    /// remaining pages in batches.
    async fn movie_list(&self, list: MovieList, tally: &mut StageTally) -> Result<(), StageError> {
        let first = self.fetch_required(|| self.api.movie_list(list, 1)).await?;
        let total_pages = first.total_pages.clamp(1, self.options.max_pages.max(1));
        tracing::info!(
            list = list.name(),
            reported_pages = first.total_pages,
            total_pages,
            "first page fetched"
        );

        let persisted = persist_movies(self.ctx.conn, &normalize_movies(&first.results))?;
        tally.record_batch(&BatchWork {
            fetched: 1,
            skipped: 0,
            persisted,
        });

        let pages: Vec<u32> = (2..=total_pages).collect();
        let api = Arc::clone(&self.api);
        let fetch = Arc::new(move |page: u32| {
            let api = Arc::clone(&api);
            async move { api.movie_list(list, page).await }
        });

        let coordinator = BatchCoordinator::new(Stage::Movies, self.ctx.batch, self.ctx.cancel);
        let mut batches = pin!(coordinator.run(pages.len(), |range: Range<usize>| {
            let units = pages.get(range).map(<[u32]>::to_vec).unwrap_or_default();
            self.page_batch(units, &fetch)
        }));

        while let Some(outcome) = batches.next().await {
            tally.record_batch(&outcome?.work);
        }
        Ok(())
    }

    /// Fetches a batch of listing pages and stores their movies in page order.
    async fn page_batch<F, Fut>(
        &self,
        pages: Vec<u32>,
        fetch: &Arc<F>,
    ) -> Result<BatchWork, StageError>
    where
        F: Fn(u32) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<TmdbPage, FetchError>> + Send + 'static,
    {
        let retrieval = retrieve(
            self.ctx.pool,
            pages,
            self.ctx.batch.retry,
            self.ctx.cancel,
            fetch,
        )
        .await;
        if retrieval.cancelled {
            return Err(StageError::Cancelled);
        }

        let fetched = retrieval.fetched.len();
        let skipped = retrieval.failed.len();
        let items: Vec<RawItem> = retrieval
            .into_results()
            .flat_map(|page| page.results)
            .collect();
        let persisted = persist_movies(self.ctx.conn, &normalize_movies(&items))?;
        Ok(BatchWork {
            fetched,
            skipped,
            persisted,
        })
    }

    /// Runs a per-movie stage over every stored movie, batch by batch.
    ///
    /// `fetch_one` retrieves one movie's resource; `persist` stores the
    /// resources fetched for one batch.
    async fn per_movie<R, F, Fut, P>(
        &self,
        stage: Stage,
        tally: &mut StageTally,
        fetch_one: F,
        persist: P,
    ) -> Result<(), StageError>
    where
        R: Send + 'static,
        F: Fn(Arc<T>, u64) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, FetchError>> + Send + 'static,
        P: Fn(&Connection, &[R]) -> anyhow::Result<PersistOutcome>,
    {
        let total = count_movies(self.ctx.conn)?;
        let api = Arc::clone(&self.api);
        let fetch = Arc::new(move |movie_id: u64| fetch_one(Arc::clone(&api), movie_id));

        let coordinator = BatchCoordinator::new(stage, self.ctx.batch, self.ctx.cancel);
        let mut batches = pin!(coordinator.run(total, |range: Range<usize>| {
            self.movie_batch(range, &fetch, &persist)
        }));

        while let Some(outcome) = batches.next().await {
            tally.record_batch(&outcome?.work);
        }
        Ok(())
    }

    /// Fetches one resource per stored movie in `range` and persists them.
    async fn movie_batch<R, F, Fut, P>(
        &self,
        range: Range<usize>,
        fetch: &Arc<F>,
        persist: &P,
    ) -> Result<BatchWork, StageError>
    where
        R: Send + 'static,
        F: Fn(u64) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, FetchError>> + Send + 'static,
        P: Fn(&Connection, &[R]) -> anyhow::Result<PersistOutcome>,
    {
        let ids = list_movie_tmdb_ids(self.ctx.conn, range.start, range.len())?;
        let retrieval = retrieve(
            self.ctx.pool,
            ids,
            self.ctx.batch.retry,
            self.ctx.cancel,
            fetch,
        )
        .await;
        if retrieval.cancelled {
            return Err(StageError::Cancelled);
        }

        let skipped = retrieval.failed.len();
        let resources: Vec<R> = retrieval.into_results().collect();
        let persisted = if resources.is_empty() {
            PersistOutcome::default()
        } else {
            persist(self.ctx.conn, &resources)?
        };
        Ok(BatchWork {
            fetched: resources.len(),
            skipped,
            persisted,
        })
    }

    async fn availability(&self, tally: &mut StageTally) -> Result<(), StageError> {
        let region = self.options.region.as_str();
        self.per_movie(
            Stage::Availability,
            tally,
            |api, id| async move { api.movie_watch_providers(id).await },
            |conn, responses: &[TmdbWatchProviders]| {
                persist_availability(conn, &normalize_availability(responses, region))
            },
        )
        .await
    }

    async fn images(&self, tally: &mut StageTally) -> Result<(), StageError> {
        self.per_movie(
            Stage::Images,
            tally,
            |api, id| async move { api.movie_images(id).await },
            |conn, responses: &[TmdbImages]| persist_images(conn, &normalize_images(responses)),
        )
        .await
    }

    async fn videos(&self, tally: &mut StageTally) -> Result<(), StageError> {
        self.per_movie(
            Stage::Videos,
            tally,
            |api, id| async move { api.movie_videos(id).await },
            |conn, responses: &[TmdbVideos]| persist_videos(conn, &normalize_videos(responses)),
        )
        .await
    }

    async fn credits(&self, tally: &mut StageTally) -> Result<(), StageError> {
        self.per_movie(
            Stage::Credits,
            tally,
            |api, id| async move { api.movie_credits(id).await },
            |conn, responses: &[TmdbCredits]| persist_credits(conn, &normalize_credits(responses)),
        )
        .await
    }

    async fn details(&self, tally: &mut StageTally) -> Result<(), StageError> {
        self.per_movie(
            Stage::Details,
            tally,
            |api, id| async move { api.movie_details(id).await },
            |conn, responses: &[TmdbMovieDetails]| {
                persist_details(conn, &normalize_details(responses))
            },
        )
        .await
    }
}

impl<T> StageRunner for TmdbJob<'_, T>
where
    T: TmdbApi + Send + Sync + 'static,
{
    async fn run_stage(&self, stage: Stage, tally: &mut StageTally) -> Result<(), StageError> {
        match stage {
            Stage::Genres => self.genres(tally).await,
            Stage::Platforms => self.platforms(tally).await,
            Stage::Movies => self.movies(tally).await,
            Stage::Availability => self.availability(tally).await,
            Stage::Images => self.images(tally).await,
            Stage::Videos => self.videos(tally).await,
            Stage::Credits => self.credits(tally).await,
            Stage::Details => self.details(tally).await,
            Stage::BoxOffice | Stage::KoficMapping => {
                tracing::warn!(%stage, "not a TMDB stage, skipping");
                Ok(())
            }
        }
    }
}
