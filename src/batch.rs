//! Parsing and concurrent dispatch of `TAG COUNT [ZONE]` create batches.

use std::num::NonZeroUsize;

use futures::future::join_all;
use thiserror::Error;

use crate::lifecycle::{BatchRequest, BatchResult, FleetOrchestrator, LifecycleError};
use crate::provider::Provider;

/// Errors raised while parsing create arguments.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum BatchParseError {
    /// A tag was not followed by a count.
    #[error("workload tag `{tag}` is missing an instance count")]
    MissingCount {
        /// Tag without a count.
        tag: String,
    },
    /// The count is not a positive integer.
    #[error("instance count `{value}` for workload tag `{tag}` must be a positive integer")]
    InvalidCount {
        /// Tag the count belongs to.
        tag: String,
        /// Offending value.
        value: String,
    },
}

fn is_numeric(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|ch| ch.is_ascii_digit())
}

/// Parses a flat `TAG COUNT [ZONE] [TAG COUNT [ZONE] ...]` argument list.
///
/// After a count, the next token is read as a zone when it is not purely
/// numeric and does not itself start another `TAG COUNT` pair.
///
/// # Errors
///
/// Returns [`BatchParseError`] when a tag has no count or the count is not a
/// positive integer.
///
/// # Examples
///
/// ```
/// use betaboot::batch::parse_batch_requests;
///
/// let args = ["nano:v1", "2", "europe-central2-a", "nano:v2", "1"].map(String::from);
/// let requests = parse_batch_requests(&args).expect("valid arguments");
/// assert_eq!(requests.len(), 2);
/// assert_eq!(requests[0].zone.as_deref(), Some("europe-central2-a"));
/// assert_eq!(requests[1].zone, None);
/// ```
pub fn parse_batch_requests(args: &[String]) -> Result<Vec<BatchRequest>, BatchParseError> {
    let mut requests = Vec::new();
    let mut index = 0;

    while let Some(tag) = args.get(index) {
        let value = args
            .get(index + 1)
            .ok_or_else(|| BatchParseError::MissingCount { tag: tag.clone() })?;
        let count = parse_count(tag, value)?;
        index += 2;

        let zone = args
            .get(index)
            .filter(|candidate| is_zone(candidate, args.get(index + 1)))
            .cloned();
        if zone.is_some() {
            index += 1;
        }

        requests.push(BatchRequest {
            workload_tag: tag.clone(),
            count,
            zone,
        });
    }

    Ok(requests)
}

fn parse_count(tag: &str, value: &str) -> Result<NonZeroUsize, BatchParseError> {
    value
        .parse::<NonZeroUsize>()
        .ok()
        .filter(|_| is_numeric(value))
        .ok_or_else(|| BatchParseError::InvalidCount {
            tag: tag.to_owned(),
            value: value.to_owned(),
        })
}

/// A token after a count is a zone unless it is numeric or is the tag of the
/// next `TAG COUNT` pair.
fn is_zone(candidate: &str, following: Option<&String>) -> bool {
    !is_numeric(candidate) && !following.is_some_and(|next| is_numeric(next))
}

/// Runs every create batch concurrently and independently.
///
/// Results are returned in request order; one batch's failure never affects
/// another's.
pub async fn run_batches<P: Provider>(
    orchestrator: &FleetOrchestrator<P>,
    requests: &[BatchRequest],
) -> Vec<Result<BatchResult, LifecycleError>> {
    join_all(requests.iter().map(|request| orchestrator.create(request))).await
}
