//! Built-in components: error boundary and concurrency combinators.
//!
//! They are ordinary components; the evaluator treats them like any other
//! service. `Parallel` and `ArrayMap` spawn their children with
//! `tokio::task::spawn_local`, so they must be evaluated inside a
//! `tokio::task::LocalSet`.
//!
//! # Usage
//!
//! ```rust,ignore
//! use webmiddle::components::{parallel, pipe};
//! use webmiddle::value::Virtual;
//! use tokio::task::LocalSet;
//!
//! let tree = Virtual::of(parallel())
//!     .attr("name", "pages")
//!     .attr("limit", 2)
//!     .child(Virtual::of(fetch_page()).attr("url", "https://a.example"))
//!     .child(Virtual::of(fetch_page()).attr("url", "https://b.example"));
//! let pages = LocalSet::new().run_until(context.evaluate(tree)).await?;
//! ```

pub mod array_map;
pub mod error_boundary;
pub mod parallel;
pub mod pipe;

pub use array_map::array_map;
pub use error_boundary::error_boundary;
pub use parallel::parallel;
pub use pipe::pipe;

use crate::context::{options::EXPECT_RESOURCE, Context, Options};
use crate::error::{EvalError, EvalResult};
use crate::value::{Props, Value};
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::task::{self, JoinError};

/// `limit` prop: 0, negative or absent means unbounded.
fn concurrency_limit(props: &Props) -> usize {
    props.i64("limit").filter(|n| *n > 0).unwrap_or(0) as usize
}

/// Evaluate every expression, each in its own context requiring a resource,
/// with at most `limit` in flight (0 = unbounded).
///
/// Each evaluation runs as its own task on the current `LocalSet`. A new one
/// starts only once a slot frees up, whichever in-flight evaluation settles
/// first. Results come back in input order. The first failure is returned as
/// soon as it is observed; evaluations already started keep running to the
/// end and their results are discarded.
pub(crate) async fn evaluate_all(
    context: &Context,
    expressions: Vec<Value>,
    limit: usize,
) -> EvalResult<Vec<Value>> {
    let mut results: Vec<Option<Value>> = vec![None; expressions.len()];
    let mut in_flight = FuturesUnordered::new();

    for (index, expression) in expressions.into_iter().enumerate() {
        if limit > 0 && in_flight.len() >= limit {
            if let Some(joined) = in_flight.next().await {
                let (done, value) = settled(joined)?;
                results[done] = Some(value);
            }
        }
        let child = context.extend(Options::new().with(EXPECT_RESOURCE, true));
        in_flight.push(task::spawn_local(async move {
            (index, child.evaluate(expression).await)
        }));
    }

    while let Some(joined) = in_flight.next().await {
        let (done, value) = settled(joined)?;
        results[done] = Some(value);
    }
    Ok(results.into_iter().flatten().collect())
}

fn settled(joined: Result<(usize, EvalResult<Value>), JoinError>) -> EvalResult<(usize, Value)> {
    let (index, outcome) =
        joined.map_err(|e| EvalError::service(format!("evaluation task failed: {}", e)))?;
    Ok((index, outcome?))
}
