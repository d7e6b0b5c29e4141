use movierec::config::{RecommendationConfig, WorkerConfig};
use movierec::services::queue::RecomputeQueue;
use movierec::services::recommendation::RecommendationEngine;
use movierec::services::store::{InMemoryStore, Stores};
use movierec::*;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    println!("movierec basic usage");

    let config = Config::default();
    let dimension = 4;
    let store = Arc::new(InMemoryStore::new(dimension));

    // 1. A small catalog with content vectors
    let catalog = [
        (1, "Heat", 1995, 8.3, 45.0, vec![28, 80], [0.9, 0.1, 0.0, 0.0]),
        (2, "Ronin", 1998, 7.2, 30.0, vec![28, 53], [0.8, 0.2, 0.1, 0.0]),
        (3, "Collateral", 2004, 7.5, 38.0, vec![28, 80], [0.7, 0.3, 0.0, 0.1]),
        (4, "Amelie", 2001, 8.3, 40.0, vec![35, 10749], [0.0, 0.1, 0.9, 0.2]),
        (5, "Before Sunrise", 1995, 8.1, 25.0, vec![18, 10749], [0.1, 0.0, 0.8, 0.4]),
        (6, "Zodiac", 2007, 7.7, 33.0, vec![80, 18], [0.5, 0.5, 0.1, 0.3]),
    ];
    for (id, title, year, score, popularity, genres, vector) in catalog {
        let summary = MovieSummary::new(id, title, year)
            .with_score(score)
            .with_popularity(popularity);
        store.add_movie(summary, genres);
        store.set_movie_vector(id, &vector)?;
    }
    println!("Loaded {} movies", catalog_len(&store).await?);

    // 2. Two users with overlapping taste
    store.add_user(1, "ana@example.com");
    store.add_user(2, "ben@example.com");
    store.add_to_collection(1, CollectionEntry::favorite(1));
    store.add_to_collection(1, CollectionEntry::watchlist(4));
    store.add_to_collection(2, CollectionEntry::favorite(1));
    store.add_to_collection(2, CollectionEntry::favorite(3));
    store.add_to_collection(2, CollectionEntry::watchlist(6));

    // 3. Engine plus background queue, as the server wires them
    let engine = Arc::new(RecommendationEngine::new(
        Stores::from_shared(store.clone()),
        RecommendationConfig {
            embedding_dim: dimension,
            ..config.recommendation.clone()
        },
    ));
    let worker = WorkerConfig {
        max_concurrent_jobs: 2,
        ..config.worker.clone()
    };
    let (queue, _handle) = RecomputeQueue::start(engine.clone(), &worker);

    for email in ["ben@example.com", "ana@example.com"] {
        let (job_id, ack) = queue.submit_with_ack(email)?;
        match ack.await? {
            Ok(summary) => println!(
                "Job {} for {}: {} recommendations from {} candidates",
                job_id, email, summary.persisted, summary.candidate_count
            ),
            Err(e) => println!("Job {} for {} failed: {}", job_id, email, e),
        }
    }

    // 4. Read path
    for movie in engine.fetch_for_email("ana@example.com", 5).await? {
        println!(
            "  {} ({}) score {:.1}",
            movie.title,
            movie.release_year,
            movie.score.unwrap_or(0.0)
        );
    }

    // 5. Collection change, then refresh
    store.add_to_collection(1, CollectionEntry::favorite(5));
    let (_, ack) = queue.submit_with_ack("ana@example.com")?;
    ack.await?.map_err(anyhow::Error::msg)?;

    let titles: Vec<String> = engine
        .fetch_for_email("ana@example.com", 5)
        .await?
        .into_iter()
        .map(|m| m.title)
        .collect();
    println!("After adding Before Sunrise: {:?}", titles);

    Ok(())
}

async fn catalog_len(store: &InMemoryStore) -> Result<usize> {
    use movierec::services::store::CatalogStore;
    let ids: Vec<MovieId> = (1..=6).collect();
    Ok(store.movie_summaries(&ids).await?.len())
}
