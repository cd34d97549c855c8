use std::cmp::Ordering;
use std::time::Duration;

pub mod validation;

/// Stable descending sort by score; equal scores keep their incoming order.
pub fn sort_by_score_desc<T, F>(items: &mut [T], score: F)
where
    F: Fn(&T) -> f64,
{
    items.sort_by(|a, b| score(b).partial_cmp(&score(a)).unwrap_or(Ordering::Equal));
}

/// Keeps the `k` best-scoring items, ties resolved by incoming order.
pub fn top_k_by_score<T, F>(mut items: Vec<T>, k: usize, score: F) -> Vec<T>
where
    F: Fn(&T) -> f64,
{
    sort_by_score_desc(&mut items, score);
    items.truncate(k);
    items
}

/// Decodes ISO-8859-1 bytes. Every byte maps to the code point of the same value.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Retries `operation` up to `max_attempts` times with a fixed sleep in between.
///
/// Returns the last error once attempts are exhausted.
pub async fn retry_fixed<F, Fut, T, E>(
    mut operation: F,
    max_attempts: usize,
    interval: Duration,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if attempt >= max_attempts => return Err(e),
            Err(e) => {
                tracing::warn!(
                    attempt,
                    max_attempts,
                    retry_in = ?interval,
                    error = %e,
                    "Operation failed, retrying"
                );
                tokio::time::sleep(interval).await;
                attempt += 1;
            }
        }
    }
}
