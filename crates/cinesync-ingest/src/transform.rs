//! Raw provider payloads to store records.
//!
//! Every function here is pure apart from logging. A malformed entry is
//! dropped with a `warn` event and never fails the batch it came from.

use std::collections::HashSet;

use chrono::NaiveDate;
use cinesync_api::RawItem;
use cinesync_api::kofic::{KoficBoxOffice, KoficDailyEntry, parse_count};
use cinesync_api::tmdb::{
    TmdbCastMember, TmdbCompany, TmdbCredits, TmdbCrewMember, TmdbGenre, TmdbGenreList,
    TmdbImage, TmdbImages, TmdbMovieDetails, TmdbMovieSummary, TmdbProvider, TmdbProviderList,
    TmdbRegionProviders, TmdbVideo, TmdbVideos, TmdbWatchProviders,
};
use cinesync_db::{
    AvailabilityRecord, BoxOfficeRecord, CastRecord, CompanyRecord, CreditBatch, CrewRecord,
    DetailsRecord, Gender, GenreRecord, ImageKind, ImageRecord, KoficMovieRecord, MovieRecord,
    PersonRecord, PlatformRecord, VideoRecord,
};
use serde::de::DeserializeOwned;

/// Decodes one raw entry, logging and dropping it when malformed.
fn decode<T: DeserializeOwned>(kind: &'static str, item: &RawItem) -> Option<T> {
    match T::deserialize(item) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(kind, error = %e, "dropping malformed entry");
            None
        }
    }
}

/// Empty strings are absent values.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Builds a movie record from a listing or search entry.
#[must_use]
pub fn movie_record(summary: TmdbMovieSummary) -> MovieRecord {
    MovieRecord {
        tmdb_id: summary.id,
        title: summary.title,
        original_title: summary.original_title,
        original_language: summary.original_language,
        overview: non_empty(summary.overview),
        release_date: non_empty(summary.release_date),
        adult: summary.adult,
        video: summary.video,
        popularity: summary.popularity,
        vote_average: summary.vote_average,
        vote_count: summary.vote_count,
        poster_path: summary.poster_path,
        backdrop_path: summary.backdrop_path,
        genre_ids: summary.genre_ids,
    }
}

/// Decodes movie listing entries in page order.
#[must_use]
pub fn normalize_movies(items: &[RawItem]) -> Vec<MovieRecord> {
    items
        .iter()
        .filter_map(|item| decode::<TmdbMovieSummary>("movie", item))
        .map(movie_record)
        .collect()
}

/// Merges genre lists, keeping the first entry of each genre ID.
#[must_use]
pub fn normalize_genres(lists: &[TmdbGenreList]) -> Vec<GenreRecord> {
    let mut seen = HashSet::new();
    lists
        .iter()
        .flat_map(|list| &list.genres)
        .filter_map(|item| decode::<TmdbGenre>("genre", item))
        .filter(|genre| seen.insert(genre.id))
        .map(|genre| GenreRecord {
            tmdb_id: genre.id,
            name: genre.name,
        })
        .collect()
}

/// Decodes the platform list.
#[must_use]
pub fn normalize_platforms(list: &TmdbProviderList) -> Vec<PlatformRecord> {
    let mut seen = HashSet::new();
    list.results
        .iter()
        .filter_map(|item| decode::<TmdbProvider>("platform", item))
        .filter(|provider| seen.insert(provider.provider_id))
        .map(|provider| PlatformRecord {
            tmdb_id: provider.provider_id,
            name: provider.provider_name,
            logo_path: provider.logo_path,
            display_priority: provider.display_priority,
        })
        .collect()
}

/// Platforms offering each movie in `region`.
///
/// Subscription, purchase and rental offers are merged and deduplicated. A
/// movie with no offer in the region yields an empty platform list.
#[must_use]
pub fn normalize_availability(
    responses: &[TmdbWatchProviders],
    region: &str,
) -> Vec<AvailabilityRecord> {
    responses
        .iter()
        .map(|response| {
            let offers = response
                .results
                .get(region)
                .and_then(|item| decode::<TmdbRegionProviders>("availability", item))
                .unwrap_or_default();

            let mut seen = HashSet::new();
            let platform_ids = offers
                .flatrate
                .iter()
                .chain(&offers.buy)
                .chain(&offers.rent)
                .filter_map(|item| decode::<TmdbProvider>("platform", item))
                .map(|provider| provider.provider_id)
                .filter(|id| seen.insert(*id))
                .collect();

            AvailabilityRecord {
                movie_tmdb_id: response.id,
                platform_ids,
            }
        })
        .collect()
}

/// Flattens backdrops, logos and posters of every movie.
#[must_use]
pub fn normalize_images(responses: &[TmdbImages]) -> Vec<ImageRecord> {
    let mut records = Vec::new();
    for response in responses {
        let groups = [
            (ImageKind::Backdrop, &response.backdrops),
            (ImageKind::Logo, &response.logos),
            (ImageKind::Poster, &response.posters),
        ];
        for (kind, items) in groups {
            records.extend(
                items
                    .iter()
                    .filter_map(|item| decode::<TmdbImage>("image", item))
                    .map(|image| ImageRecord {
                        file_path: image.file_path,
                        movie_tmdb_id: response.id,
                        kind,
                        width: image.width,
                        height: image.height,
                        aspect_ratio: image.aspect_ratio,
                        iso_639_1: image.iso_639_1,
                    }),
            );
        }
    }
    records
}

/// Decodes the videos of every movie, deriving the playback URL.
#[must_use]
pub fn normalize_videos(responses: &[TmdbVideos]) -> Vec<VideoRecord> {
    responses
        .iter()
        .flat_map(|response| {
            response
                .results
                .iter()
                .filter_map(|item| decode::<TmdbVideo>("video", item))
                .map(move |video| VideoRecord {
                    url: VideoRecord::playback_url(video.site.as_deref(), &video.key),
                    tmdb_key: video.id,
                    movie_tmdb_id: response.id,
                    name: video.name,
                    site: video.site,
                    video_type: video.video_type,
                    video_key: video.key,
                    iso_639_1: video.iso_639_1,
                    official: video.official,
                })
        })
        .collect()
}

/// Collects distinct people while walking credit lists.
#[derive(Debug, Default)]
struct PeopleSet {
    seen: HashSet<u64>,
    people: Vec<PersonRecord>,
}

impl PeopleSet {
    #[allow(clippy::too_many_arguments)]
    fn add(
        &mut self,
        tmdb_id: u64,
        name: &str,
        original_name: Option<&String>,
        gender: Option<u8>,
        known_for_department: Option<&String>,
        profile_path: Option<&String>,
        adult: bool,
        popularity: f64,
    ) {
        if !self.seen.insert(tmdb_id) {
            return;
        }
        self.people.push(PersonRecord {
            tmdb_id,
            name: String::from(name),
            original_name: original_name.cloned(),
            gender: Gender::from_tmdb(gender),
            known_for_department: known_for_department.cloned(),
            profile_path: profile_path.cloned(),
            adult,
            popularity,
        });
    }

    fn add_cast(&mut self, member: &TmdbCastMember) {
        self.add(
            member.id,
            &member.name,
            member.original_name.as_ref(),
            member.gender,
            member.known_for_department.as_ref(),
            member.profile_path.as_ref(),
            member.adult,
            member.popularity,
        );
    }

    fn add_crew(&mut self, member: &TmdbCrewMember) {
        self.add(
            member.id,
            &member.name,
            member.original_name.as_ref(),
            member.gender,
            member.known_for_department.as_ref(),
            member.profile_path.as_ref(),
            member.adult,
            member.popularity,
        );
    }
}

/// Splits credit lists into people, cast and crew.
///
/// A person appearing in several credits of the batch (one movie or many)
/// yields one person record; every credit still references them.
#[must_use]
pub fn normalize_credits(responses: &[TmdbCredits]) -> CreditBatch {
    let mut people = PeopleSet::default();
    let mut cast = Vec::new();
    let mut crew = Vec::new();

    for response in responses {
        for member in response
            .cast
            .iter()
            .filter_map(|item| decode::<TmdbCastMember>("cast", item))
        {
            people.add_cast(&member);
            cast.push(CastRecord {
                credit_id: member.credit_id,
                movie_tmdb_id: response.id,
                person_tmdb_id: member.id,
                character: non_empty(member.character),
                order: member.order,
            });
        }
        for member in response
            .crew
            .iter()
            .filter_map(|item| decode::<TmdbCrewMember>("crew", item))
        {
            people.add_crew(&member);
            crew.push(CrewRecord {
                credit_id: member.credit_id,
                movie_tmdb_id: response.id,
                person_tmdb_id: member.id,
                department: member.department,
                job: member.job,
            });
        }
    }

    CreditBatch {
        people: people.people,
        cast,
        crew,
    }
}

/// Runtime, status and production companies of every movie.
#[must_use]
pub fn normalize_details(responses: &[TmdbMovieDetails]) -> Vec<DetailsRecord> {
    responses
        .iter()
        .map(|details| {
            let mut seen = HashSet::new();
            let companies = details
                .production_companies
                .iter()
                .filter_map(|item| decode::<TmdbCompany>("company", item))
                .filter(|company| seen.insert(company.id))
                .map(|company| CompanyRecord {
                    tmdb_id: company.id,
                    name: company.name,
                    origin_country: non_empty(company.origin_country),
                    logo_path: company.logo_path,
                })
                .collect();

            DetailsRecord {
                movie_tmdb_id: details.id,
                runtime: details.runtime.filter(|minutes| *minutes > 0),
                status: non_empty(details.status.clone()),
                companies,
            }
        })
        .collect()
}

/// KOFIC movies and ranking rows of one daily box office.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoxOfficeBatch {
    /// Distinct ranked movies.
    pub movies: Vec<KoficMovieRecord>,
    /// Ranking rows.
    pub entries: Vec<BoxOfficeRecord>,
}

/// Decodes a daily box office for `target_date`.
///
/// Entries with an unreadable rank are dropped; unreadable counts become 0.
#[must_use]
pub fn normalize_box_office(target_date: NaiveDate, result: &KoficBoxOffice) -> BoxOfficeBatch {
    let date = target_date.format("%Y-%m-%d").to_string();
    let mut seen = HashSet::new();
    let mut batch = BoxOfficeBatch::default();

    for entry in result
        .daily_box_office_list
        .iter()
        .filter_map(|item| decode::<KoficDailyEntry>("box office", item))
    {
        let Ok(rank) = entry.rank.trim().parse::<u32>() else {
            tracing::warn!(rank = %entry.rank, movie_cd = %entry.movie_cd, "dropping entry without a rank");
            continue;
        };

        if seen.insert(entry.movie_cd.clone()) {
            batch.movies.push(KoficMovieRecord {
                movie_cd: entry.movie_cd.clone(),
                name: entry.movie_nm.clone(),
                open_date: non_empty(Some(entry.open_dt.clone())),
            });
        }
        batch.entries.push(BoxOfficeRecord {
            target_date: date.clone(),
            rank,
            movie_cd: entry.movie_cd,
            audience_count: parse_count(&entry.audi_cnt),
            audience_acc: parse_count(&entry.audi_acc),
            audience_inten: parse_count(&entry.audi_inten),
            sales_amount: parse_count(&entry.sales_amt),
        });
    }

    batch
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::indexing_slicing)]

    use serde_json::json;
    use tracing::subscriber::with_default;
    use tracing_mock::{expect, subscriber};

    use super::*;

    fn fixture<T: DeserializeOwned>(json: &str) -> T {
        serde_json::from_str(json).unwrap()
    }

    fn credit(person: u64, credit_id: &str) -> RawItem {
        json!({
            "id": person,
            "name": format!("person {person}"),
            "gender": 1,
            "credit_id": credit_id,
            "character": "",
            "order": 0
        })
    }

    #[test]
    fn test_movies_keep_page_order_and_drop_malformed() {
        // Arrange
        let page: cinesync_api::tmdb::TmdbPage =
            fixture(include_str!("../../../fixtures/tmdb/discover_page1.json"));
        let mut items = page.results;
        items.insert(1, json!({ "id": "not-a-number" }));

        // Act
        let movies = normalize_movies(&items);

        // Assert
        let ids: Vec<u64> = movies.iter().map(|m| m.tmdb_id).collect();
        assert_eq!(ids, vec![496_243, 550]);
        assert_eq!(movies[0].genre_ids, vec![35, 53, 18]);
        assert_eq!(movies[1].release_date.as_deref(), Some("1999-10-15"));
    }

    #[test]
    fn test_empty_release_date_is_absent() {
        // Arrange
        let items = vec![json!({ "id": 1, "title": "Untitled", "release_date": "" })];

        // Act
        let movies = normalize_movies(&items);

        // Assert
        assert_eq!(movies[0].release_date, None);
    }

    #[test]
    fn test_malformed_entry_logs_warning() {
        // Arrange
        let items = vec![json!({ "title": "missing id" })];
        let (subscriber, handle) = subscriber::mock()
            .event(expect::event().at_level(tracing::Level::WARN))
            .only()
            .run_with_handle();

        // Act
        let movies = with_default(subscriber, || normalize_movies(&items));

        // Assert
        assert!(movies.is_empty());
        handle.assert_finished();
    }

    #[test]
    fn test_genres_merge_movie_and_tv_lists() {
        // Arrange
        let movie: TmdbGenreList =
            fixture(include_str!("../../../fixtures/tmdb/genre_movie_list.json"));
        let tv: TmdbGenreList = fixture(
            r#"{"genres":[{"id":18,"name":"드라마"},{"id":10759,"name":"액션 & 어드벤처"}]}"#,
        );

        // Act
        let genres = normalize_genres(&[movie, tv]);

        // Assert
        let ids: Vec<u32> = genres.iter().map(|g| g.tmdb_id).collect();
        assert_eq!(ids, vec![28, 35, 18, 53, 10759]);
    }

    #[test]
    fn test_platforms_from_provider_list() {
        // Arrange
        let list: TmdbProviderList =
            fixture(include_str!("../../../fixtures/tmdb/provider_list.json"));

        // Act
        let platforms = normalize_platforms(&list);

        // Assert
        assert_eq!(platforms.len(), 3);
        assert_eq!(platforms[1].name, "Disney Plus");
        assert_eq!(platforms[2].display_priority, Some(6));
    }

    #[test]
    fn test_availability_unions_offer_types() {
        // Arrange
        let response: TmdbWatchProviders =
            fixture(include_str!("../../../fixtures/tmdb/watch_providers_550.json"));

        // Act
        let korea = normalize_availability(std::slice::from_ref(&response), "KR");
        let japan = normalize_availability(&[response], "JP");

        // Assert
        assert_eq!(korea[0].movie_tmdb_id, 550);
        assert_eq!(korea[0].platform_ids, vec![8, 97]);
        assert!(japan[0].platform_ids.is_empty());
    }

    #[test]
    fn test_images_are_tagged_by_kind() {
        // Arrange
        let response: TmdbImages = fixture(include_str!("../../../fixtures/tmdb/images_550.json"));

        // Act
        let images = normalize_images(&[response]);

        // Assert
        let kinds: Vec<ImageKind> = images.iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![ImageKind::Backdrop, ImageKind::Logo, ImageKind::Poster]
        );
        assert_eq!(images[2].width, 2000);
        assert_eq!(images[2].iso_639_1.as_deref(), Some("ko"));
    }

    #[test]
    fn test_videos_get_playback_urls() {
        // Arrange
        let response: TmdbVideos = fixture(include_str!("../../../fixtures/tmdb/videos_550.json"));

        // Act
        let videos = normalize_videos(&[response]);

        // Assert
        assert_eq!(videos.len(), 2);
        assert_eq!(videos[0].url, "https://www.youtube.com/watch?v=BdJKm16Co6M");
        assert_eq!(
            videos[1].url,
            "https://www.themoviedb.org/video/play?key=76979871"
        );
        assert_eq!(videos[1].video_type.as_deref(), Some("Featurette"));
    }

    #[test]
    fn test_credits_split_and_dedup_people() {
        // Arrange
        let response: TmdbCredits =
            fixture(include_str!("../../../fixtures/tmdb/credits_550.json"));

        // Act
        let batch = normalize_credits(&[response]);

        // Assert
        assert_eq!(batch.cast.len(), 3);
        assert_eq!(batch.crew.len(), 2);
        assert_eq!(batch.people.len(), 4);
        let bonham_carter = batch.people.iter().find(|p| p.tmdb_id == 1283).unwrap();
        assert_eq!(bonham_carter.gender, Gender::Female);
        assert_eq!(bonham_carter.profile_path, None);
    }

    #[test]
    fn test_person_across_five_movies_is_one_record() {
        // Arrange
        let responses: Vec<TmdbCredits> = (1..=5)
            .map(|movie| TmdbCredits {
                id: movie,
                cast: vec![credit(42, &format!("credit-{movie}"))],
                crew: Vec::new(),
            })
            .collect();

        // Act
        let batch = normalize_credits(&responses);

        // Assert
        assert_eq!(batch.people.len(), 1);
        assert_eq!(batch.cast.len(), 5);
        assert!(batch.cast.iter().all(|c| c.person_tmdb_id == 42));
        assert!(batch.cast.iter().all(|c| c.character.is_none()));
    }

    #[test]
    fn test_details_with_companies() {
        // Arrange
        let response: TmdbMovieDetails =
            fixture(include_str!("../../../fixtures/tmdb/movie_details_550.json"));

        // Act
        let details = normalize_details(&[response]);

        // Assert
        assert_eq!(details[0].runtime, Some(139));
        assert_eq!(details[0].status.as_deref(), Some("Released"));
        let names: Vec<&str> = details[0].companies.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Regency Enterprises", "Fox 2000 Pictures"]);
    }

    #[test]
    fn test_zero_runtime_is_absent() {
        // Arrange
        let response: TmdbMovieDetails = fixture(r#"{"id":7,"runtime":0,"status":""}"#);

        // Act
        let details = normalize_details(&[response]);

        // Assert
        assert_eq!(details[0].runtime, None);
        assert_eq!(details[0].status, None);
    }

    #[test]
    fn test_box_office_numbers_and_dates() {
        // Arrange
        let response: cinesync_api::kofic::KoficBoxOfficeResponse =
            fixture(include_str!("../../../fixtures/kofic/daily_box_office.json"));
        let result = response.box_office_result.unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        // Act
        let batch = normalize_box_office(date, &result);

        // Assert
        assert_eq!(batch.movies.len(), 3);
        assert_eq!(batch.entries.len(), 3);
        assert_eq!(batch.entries[0].target_date, "2024-01-01");
        assert_eq!(batch.entries[0].audience_count, 412_345);
        assert_eq!(batch.entries[0].audience_inten, -98_765);
        assert_eq!(batch.entries[2].sales_amount, 0);
        assert_eq!(batch.entries[2].audience_count, 0);
        assert_eq!(batch.entries[2].audience_acc, 1234);
        assert_eq!(batch.movies[2].open_date, None);
        assert_eq!(batch.movies[1].name, "노량: 죽음의 바다");
    }

    #[test]
    fn test_box_office_entry_without_rank_is_dropped() {
        // Arrange
        let result: KoficBoxOffice = fixture(
            r#"{"dailyBoxOfficeList":[{"rank":"-","movieCd":"1","movieNm":"a"},{"rank":"2","movieCd":"2","movieNm":"b"}]}"#,
        );
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();

        // Act
        let batch = normalize_box_office(date, &result);

        // Assert
        assert_eq!(batch.entries.len(), 1);
        assert_eq!(batch.entries[0].rank, 2);
        assert_eq!(batch.movies[0].movie_cd, "2");
    }
}
