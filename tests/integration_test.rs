use movierec::algorithms::{FunkSvd, RatingPredictor, SvdParams};
use movierec::config::{Config, FileFormat};
use movierec::services::dataset::{DatasetService, StaticSource};
use movierec::services::import::{import_ratings, run_import, wait_for_store, ImportOptions, MemorySink};
use movierec::services::recommendation::RecommendationService;
use movierec::services::training::Predictor;
use movierec::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

fn scenario_ratings() -> Vec<Rating> {
    vec![
        Rating::new(1, 10, 5.0, 881250949),
        Rating::new(1, 20, 1.0, 881250950),
        Rating::new(2, 10, 3.0, 881250951),
    ]
}

fn test_config(item_min: i32, item_max: i32) -> Config {
    let mut config = Config::default();
    config.training.n_factors = 8;
    config.recommendation.item_min = item_min;
    config.recommendation.item_max = item_max;
    config
}

fn build_services(ratings: Vec<Rating>, config: &Config) -> (StaticSource, Arc<Predictor>, RecommendationService) {
    let source = StaticSource::new(ratings, vec![]);
    let dataset = Arc::new(DatasetService::new(Arc::new(source.clone())));
    let predictor = Arc::new(Predictor::new(dataset, config));
    let service = RecommendationService::new(predictor.clone(), config.recommendation.clone());
    (source, predictor, service)
}

fn temp_file(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("movierec-{}-{}", Uuid::new_v4(), name));
    std::fs::write(&path, contents).unwrap();
    path
}

#[tokio::test]
async fn test_recommend_before_train_is_not_ready() {
    let config = test_config(10, 20);
    let (_, predictor, service) = build_services(scenario_ratings(), &config);

    assert!(matches!(service.recommend(1, 5).await, Err(Error::ModelNotTrained)));
    assert!(matches!(predictor.predict(1, 10), Err(Error::ModelNotTrained)));
}

#[tokio::test]
async fn test_scenario_recommends_highest_rated_item() {
    let config = test_config(10, 20);
    let (_, predictor, service) = build_services(scenario_ratings(), &config);
    predictor.train().await.unwrap();

    let response = service.recommend(1, 1).await.unwrap();
    assert_eq!(response.user_id, 1);
    assert_eq!(response.recommendations.len(), 1);
    assert_eq!(response.recommendations[0].item_id, 10);

    let item_10 = predictor.predict(1, 10).unwrap();
    let item_20 = predictor.predict(1, 20).unwrap();
    assert!(item_10 > item_20);
}

#[tokio::test]
async fn test_recommendation_length_and_order() {
    let config = test_config(1, 30);
    let ratings = vec![
        Rating::new(1, 3, 4.0, 0),
        Rating::new(1, 7, 2.0, 0),
        Rating::new(2, 3, 5.0, 0),
        Rating::new(2, 9, 1.0, 0),
        Rating::new(3, 7, 3.0, 0),
    ];
    let (_, predictor, service) = build_services(ratings, &config);
    predictor.train().await.unwrap();

    for count in [1, 5, 30, 100] {
        let recs = service.recommend(1, count).await.unwrap().recommendations;
        assert_eq!(recs.len(), count.min(30));
        for pair in recs.windows(2) {
            assert!(pair[0].predicted_rating >= pair[1].predicted_rating);
            if pair[0].predicted_rating == pair[1].predicted_rating {
                assert!(pair[0].item_id < pair[1].item_id);
            }
        }
    }
}

#[tokio::test]
async fn test_cold_start_user_gets_global_mean() {
    let config = test_config(10, 20);
    let (_, predictor, service) = build_services(scenario_ratings(), &config);
    predictor.train().await.unwrap();

    let mean = 3.0;
    assert_eq!(predictor.predict(999, 10).unwrap(), mean);

    let recs = service.recommend(999, 3).await.unwrap().recommendations;
    let ids: Vec<ItemId> = recs.iter().map(|r| r.item_id).collect();
    assert_eq!(ids, vec![10, 11, 12]);
    assert!(recs.iter().all(|r| r.predicted_rating == mean));
}

#[tokio::test]
async fn test_predict_is_deterministic() {
    let config = test_config(10, 20);
    let (_, predictor, _) = build_services(scenario_ratings(), &config);
    predictor.train().await.unwrap();

    let first = predictor.predict(2, 20).unwrap();
    let second = predictor.predict(2, 20).unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_retrain_reflects_new_data() {
    let config = test_config(10, 20);
    let (source, predictor, _) = build_services(scenario_ratings(), &config);
    predictor.train().await.unwrap();
    assert_eq!(predictor.predict(3, 10).unwrap(), 3.0);

    let mut ratings = scenario_ratings();
    ratings.push(Rating::new(3, 10, 1.0, 0));
    ratings.push(Rating::new(3, 20, 1.0, 0));
    source.replace_ratings(ratings.clone());
    predictor.train().await.unwrap();

    let retrained = predictor.predict(3, 10).unwrap();
    let expected = FunkSvd::new(SvdParams::from(&config.training)).fit(&ratings).unwrap();
    assert_eq!(retrained, expected.predict(3, 10));
    assert_ne!(retrained, 3.0);
}

#[tokio::test]
async fn test_cache_is_invalidated_by_retrain() {
    let mut config = test_config(10, 20);
    config.recommendation.cache_enabled = true;
    let (source, predictor, service) = build_services(scenario_ratings(), &config);
    predictor.train().await.unwrap();

    let before = service.recommend(1, 2).await.unwrap().recommendations;
    let cached = service.recommend(1, 2).await.unwrap().recommendations;
    assert_eq!(before, cached);
    assert_eq!(service.cached_entries(), 1);

    source.replace_ratings(vec![
        Rating::new(1, 10, 1.0, 0),
        Rating::new(1, 20, 5.0, 0),
        Rating::new(2, 20, 3.0, 0),
    ]);
    predictor.train().await.unwrap();

    let after = service.recommend(1, 2).await.unwrap().recommendations;
    assert_eq!(after[0].item_id, 20);
    assert_ne!(before, after);
}

#[tokio::test]
async fn test_cache_serves_prefix_of_longer_ranking() {
    let mut config = test_config(10, 20);
    config.recommendation.cache_enabled = true;
    let (_, predictor, service) = build_services(scenario_ratings(), &config);
    predictor.train().await.unwrap();

    let long = service.recommend(1, 5).await.unwrap().recommendations;
    let short = service.recommend(1, 2).await.unwrap().recommendations;
    assert_eq!(short, long[..2].to_vec());

    let everything = service.recommend(1, 500).await.unwrap().recommendations;
    assert_eq!(everything.len(), 11);
    assert_eq!(everything[..5].to_vec(), long);
    assert_eq!(service.recommend(1, 1000).await.unwrap().recommendations, everything);
    assert_eq!(service.cached_entries(), 1);
}

#[tokio::test]
async fn test_cache_respects_capacity() {
    let mut config = test_config(10, 20);
    config.recommendation.cache_enabled = true;
    config.recommendation.cache_capacity = 2;
    let (_, predictor, service) = build_services(scenario_ratings(), &config);
    predictor.train().await.unwrap();

    for user_id in 1..=50 {
        service.recommend(user_id, 3).await.unwrap();
        service.recommend(user_id, 4).await.unwrap();
    }
    assert_eq!(service.cached_entries(), 2);

    let uncached = service.recommend(42, 3).await.unwrap().recommendations;
    let ids: Vec<ItemId> = uncached.iter().map(|r| r.item_id).collect();
    assert_eq!(ids, vec![10, 11, 12]);
}

#[tokio::test]
async fn test_concurrent_training_is_serialized() {
    let config = test_config(10, 20);
    let (_, predictor, _) = build_services(scenario_ratings(), &config);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let predictor = predictor.clone();
            tokio::spawn(async move { predictor.train().await.unwrap().generation })
        })
        .collect();

    let mut generations = Vec::new();
    for handle in handles {
        generations.push(handle.await.unwrap());
    }
    generations.sort_unstable();
    assert_eq!(generations, vec![1, 2, 3, 4]);
    assert_eq!(predictor.generation(), 4);
}

#[tokio::test]
async fn test_import_skips_duplicate_ratings() {
    let movies = temp_file("movies.csv", "movieId,title,genres\n10,Toy Story (1995),Animation\n20,Heat (1995),Action|Crime\n");
    let ratings = temp_file(
        "ratings.csv",
        "userId,movieId,rating,timestamp\n1,10,5.0,1\n1,20,1.0,2\n2,10,3.0,3\n1,10,4.0,4\n",
    );

    let sink = MemorySink::new();
    let options = ImportOptions {
        movies_path: movies.clone(),
        movies_format: FileFormat::Csv,
        ratings_path: ratings.clone(),
        ratings_format: FileFormat::Csv,
        movies_batch_size: 1,
        ratings_batch_size: 2,
        max_attempts: 1,
        retry_interval: Duration::from_millis(1),
    };

    let summary = run_import(&sink, &options).await.unwrap();

    assert_eq!(summary.movies.total_rows, 2);
    assert_eq!(summary.movies.batches, 2);
    assert_eq!(summary.ratings.total_rows, 4);
    assert_eq!(summary.ratings.inserted_rows, 3);
    assert_eq!(summary.ratings.skipped_rows(), 1);
    assert_eq!(sink.rating_count(), 3);
    assert_eq!(sink.rating(1, 10).map(|r| r.rating), Some(5.0));
    assert!(sink.schema_created());
    assert!(sink.indexes_created());

    std::fs::remove_file(movies).ok();
    std::fs::remove_file(ratings).ok();
}

#[tokio::test]
async fn test_import_waits_for_store() {
    let sink = MemorySink::unreachable_for(2);
    wait_for_store(&sink, 5, Duration::from_millis(1)).await.unwrap();
    assert_eq!(sink.ping_count(), 3);
}

#[tokio::test]
async fn test_import_gives_up_on_unreachable_store() {
    let sink = MemorySink::unreachable_for(10);
    let err = wait_for_store(&sink, 3, Duration::from_millis(1)).await.unwrap_err();
    assert!(matches!(err, Error::StoreUnavailable { attempts: 3 }));
    assert_eq!(sink.ping_count(), 3);
}

#[test]
fn test_orphan_rating_is_rejected() {
    let sink = MemorySink::new();
    let result = tokio_test::block_on(import_ratings(&sink, &[Rating::new(1, 10, 4.0, 0)], 10));
    assert!(result.is_err());
    assert_eq!(sink.rating_count(), 0);
}
