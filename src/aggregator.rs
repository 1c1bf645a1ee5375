use std::sync::Arc;

use futures::future::join_all;
use tracing::{error, info, warn};

use crate::config::Source;
use crate::error::{NewsError, Result};
use crate::fetcher::Fetcher;
use crate::models::Article;

/// Fans one aggregation pass out over every requested source.
pub struct Aggregator {
    fetcher: Arc<Fetcher>,
}

impl Aggregator {
    pub fn new(fetcher: Arc<Fetcher>) -> Self {
        Self { fetcher }
    }

    /// Fetch every source concurrently and merge the results, newest first.
    ///
    /// Failed sources are logged and left out. The call only fails when no
    /// source succeeds, or when `sources` is empty.
    pub async fn run(&self, sources: &[Source]) -> Result<Vec<Article>> {
        match sources {
            [] => Err(NewsError::NoSources),
            [source] => self.run_single(source).await,
            _ => self.run_many(sources).await,
        }
    }

    async fn run_single(&self, source: &Source) -> Result<Vec<Article>> {
        match self.fetcher.fetch(source).await {
            Ok(articles) => Ok(merge(vec![articles])),
            Err(e) => {
                error!("Failed to fetch feed {}: {}", source.name, e);
                Err(NewsError::AllSourcesFailed { attempted: 1 })
            }
        }
    }

    async fn run_many(&self, sources: &[Source]) -> Result<Vec<Article>> {
        info!("Aggregating {} sources", sources.len());

        let tasks = sources.iter().map(|source| {
            let fetcher = self.fetcher.clone();
            async move { (source, fetcher.fetch(source).await) }
        });
        let outcomes = join_all(tasks).await;

        let mut batches = Vec::with_capacity(outcomes.len());
        let mut failed = 0;
        for (source, outcome) in outcomes {
            match outcome {
                Ok(articles) => batches.push(articles),
                Err(e) => {
                    error!("Failed to fetch feed {}: {}", source.name, e);
                    failed += 1;
                }
            }
        }

        if batches.is_empty() {
            return Err(NewsError::AllSourcesFailed {
                attempted: sources.len(),
            });
        }
        if failed > 0 {
            warn!(
                "Partial aggregation: {}/{} sources succeeded",
                sources.len() - failed,
                sources.len()
            );
        }

        let merged = merge(batches);
        info!("Aggregated {} articles", merged.len());
        Ok(merged)
    }
}

/// Concatenate per-source batches in order, then sort newest first. The sort
/// is stable, so equal timestamps keep their concatenation order.
pub fn merge(batches: Vec<Vec<Article>>) -> Vec<Article> {
    let mut merged: Vec<Article> = batches.into_iter().flatten().collect();
    merged.sort_by(|a, b| b.published.cmp(&a.published));
    merged
}
