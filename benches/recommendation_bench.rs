use criterion::{black_box, criterion_group, criterion_main, Criterion};
use movierec::algorithms::{score_candidates, select_top_k, CandidateStore, GenreWeights};
use movierec::config::RecommendationConfig;
use movierec::services::recommendation::RecommendationEngine;
use movierec::services::store::{InMemoryStore, Stores};
use movierec::*;
use rand::Rng;
use std::sync::Arc;

const DIMENSION: usize = 128;
const GENRES: [GenreId; 8] = [12, 16, 18, 27, 28, 35, 80, 878];

fn random_vector(rng: &mut impl Rng) -> Vec<f32> {
    (0..DIMENSION).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

fn random_genres(rng: &mut impl Rng) -> Vec<GenreId> {
    (0..rng.gen_range(1..=3))
        .map(|_| GENRES[rng.gen_range(0..GENRES.len())])
        .collect()
}

fn candidate_pool(size: usize) -> CandidateStore {
    let mut rng = rand::thread_rng();
    let mut store = CandidateStore::new();

    for movie_id in 0..size as MovieId {
        store.record_similarity(movie_id, rng.gen_range(-1.0..1.0));
        if rng.gen_bool(0.3) {
            store.add_collaborative(movie_id, if rng.gen_bool(0.5) { 1.0 } else { 0.5 });
        }
        store.merge_metadata(&MovieMetadata {
            movie_id,
            score: Some(rng.gen_range(0.0..10.0)),
            popularity: Some(rng.gen_range(0.0..500.0)),
            genre_ids: random_genres(&mut rng),
        });
    }
    store
}

fn seeded_store(movies: usize, users: usize, per_user: usize) -> Arc<InMemoryStore> {
    let mut rng = rand::thread_rng();
    let store = Arc::new(InMemoryStore::new(DIMENSION));

    for movie_id in 0..movies as MovieId {
        let summary = MovieSummary::new(movie_id, format!("Movie {}", movie_id), 2000)
            .with_score(rng.gen_range(0.0..10.0))
            .with_popularity(rng.gen_range(0.0..500.0));
        store.add_movie(summary, random_genres(&mut rng));
        store.set_movie_vector(movie_id, &random_vector(&mut rng)).unwrap();
    }

    for user_id in 0..users as UserId {
        store.add_user(user_id, &format!("user{}@example.com", user_id));
        for _ in 0..per_user {
            let movie_id = rng.gen_range(0..movies as MovieId);
            let entry = if rng.gen_bool(0.5) {
                CollectionEntry::favorite(movie_id)
            } else {
                CollectionEntry::watchlist(movie_id)
            };
            store.add_to_collection(user_id, entry);
        }
    }
    store
}

fn benchmark_scoring(c: &mut Criterion) {
    let weights = GenreWeights::from_counts(vec![(28, 5), (18, 3), (35, 1)]);

    c.bench_function("score_and_select_450_candidates", |b| {
        b.iter_batched(
            || candidate_pool(450),
            |mut pool| {
                score_candidates(&mut pool, &weights);
                black_box(select_top_k(pool.into_candidates(), 20))
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

fn benchmark_pipeline(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = seeded_store(2_000, 200, 15);
    let engine = RecommendationEngine::new(
        Stores::from_shared(store),
        RecommendationConfig {
            embedding_dim: DIMENSION,
            ..RecommendationConfig::default()
        },
    );

    rt.block_on(async {
        for user_id in 0..200 {
            engine.recompute_recommendations(user_id).await.unwrap();
        }
    });

    c.bench_function("recompute_recommendations_in_memory", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(engine.recompute_recommendations(7).await.unwrap());
        });
    });

    c.bench_function("fetch_recommendations_in_memory", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(engine.fetch_recommendations(7, 20).await.unwrap());
        });
    });
}

criterion_group!(benches, benchmark_scoring, benchmark_pipeline);
criterion_main!(benches);
