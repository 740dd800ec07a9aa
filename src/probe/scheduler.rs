use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{Id, JoinError, JoinSet};

/// What a bounded run produced: outputs in completion order, plus the items
/// whose task panicked or was cancelled.
#[derive(Debug)]
pub struct Completed<T, U> {
    pub outputs: Vec<T>,
    pub lost: Vec<(U, JoinError)>,
}

/// Spawns one task per item, admitting at most `limit` at a time (`0` counts
/// as `1`). The dispatcher waits for a free slot before spawning the next
/// task, and the call returns only after every spawned task finished.
pub async fn run_bounded<I, F, Fut>(items: I, limit: usize, job: F) -> Completed<Fut::Output, I::Item>
where
    I: IntoIterator,
    I::Item: Clone,
    F: Fn(I::Item) -> Fut,
    Fut: Future + Send + 'static,
    Fut::Output: Send + 'static,
{
    let gate = Arc::new(Semaphore::new(limit.max(1)));
    let mut tasks = JoinSet::new();
    let mut pending = HashMap::new();
    let mut done = Completed {
        outputs: Vec::new(),
        lost: Vec::new(),
    };

    for item in items {
        // The gate is never closed, so acquiring only waits.
        let Ok(permit) = Arc::clone(&gate).acquire_owned().await else {
            break;
        };
        let work = job(item.clone());
        let handle = tasks.spawn(async move {
            let output = work.await;
            drop(permit);
            output
        });
        pending.insert(handle.id(), item);
        while let Some(joined) = tasks.try_join_next_with_id() {
            collect(joined, &mut pending, &mut done);
        }
    }

    while let Some(joined) = tasks.join_next_with_id().await {
        collect(joined, &mut pending, &mut done);
    }
    done
}

fn collect<T, U>(
    joined: Result<(Id, T), JoinError>,
    pending: &mut HashMap<Id, U>,
    done: &mut Completed<T, U>,
) {
    match joined {
        Ok((id, output)) => {
            pending.remove(&id);
            done.outputs.push(output);
        }
        Err(err) => {
            if let Some(item) = pending.remove(&err.id()) {
                done.lost.push((item, err));
            }
        }
    }
}
