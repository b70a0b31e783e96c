//! Keyed serialization on top of a [TaskPool].

use super::task_pool::TaskPool;
use std::collections::{hash_map::Entry, HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use svcnet_api::RequestId;

type SerialJob = Box<dyn FnOnce() + 'static + Send>;
type Queues = Arc<Mutex<HashMap<RequestId, VecDeque<SerialJob>>>>;

/// Runs synchronous jobs such that two jobs with the same key never run
/// concurrently, and run in submission order. Jobs with different keys
/// run in parallel, up to the pool's worker count.
///
/// While a key has work, one pool job owns it and drains its queue on a
/// blocking thread, so a slow job never stalls a runtime worker. Once the
/// queue is empty the key is forgotten.
pub struct SerialExecutor {
    pool: Arc<TaskPool>,
    queues: Queues,
}

impl std::fmt::Debug for SerialExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialExecutor")
            .field("pool", &self.pool)
            .field("active_keys", &self.queues.lock().unwrap().len())
            .finish()
    }
}

impl SerialExecutor {
    /// Serialize on top of the given pool.
    pub fn new(pool: Arc<TaskPool>) -> Self {
        Self {
            pool,
            queues: Default::default(),
        }
    }

    /// Schedule a job under a key.
    pub fn schedule<F>(&self, key: RequestId, job: F)
    where
        F: FnOnce() + 'static + Send,
    {
        let job: SerialJob = Box::new(job);

        match self.queues.lock().unwrap().entry(key) {
            Entry::Occupied(mut e) => {
                // a drain job is already running for this key
                e.get_mut().push_back(job);
                return;
            }
            Entry::Vacant(e) => {
                e.insert(VecDeque::new());
            }
        }

        let queues = self.queues.clone();
        self.pool.submit(async move {
            let drain = tokio::task::spawn_blocking(move || {
                Self::drain(queues, key, job)
            });
            if let Err(err) = drain.await {
                tracing::error!(%key, ?err, "serialized drain failed");
            }
        });
    }

    fn drain(queues: Queues, key: RequestId, mut job: SerialJob) {
        loop {
            if std::panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                tracing::error!(%key, "serialized job panicked");
            }

            let next = {
                let mut lock = queues.lock().unwrap();
                let next = lock.get_mut(&key).and_then(|q| q.pop_front());
                if next.is_none() {
                    lock.remove(&key);
                }
                next
            };

            match next {
                Some(next) => job = next,
                None => return,
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use svcnet_test_utils::iter_check;

    #[derive(Debug, Default)]
    struct Overlap {
        running: AtomicUsize,
        max_running: AtomicUsize,
        done: AtomicUsize,
    }

    impl Overlap {
        fn run(&self) {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_running.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(5));
            self.running.fetch_sub(1, Ordering::SeqCst);
            self.done.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn same_key_never_overlaps() {
        let exec = SerialExecutor::new(Arc::new(TaskPool::new("test", 4)));
        let overlap = Arc::new(Overlap::default());

        for _ in 0..10 {
            let overlap = overlap.clone();
            exec.schedule(RequestId(1), move || overlap.run());
        }

        iter_check!(2000, {
            if overlap.done.load(Ordering::SeqCst) == 10 {
                break;
            }
        });

        assert_eq!(1, overlap.max_running.load(Ordering::SeqCst));
        assert!(exec.queues.lock().unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn same_key_runs_in_order() {
        let exec = SerialExecutor::new(Arc::new(TaskPool::new("test", 4)));
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..20 {
            let order = order.clone();
            exec.schedule(RequestId(7), move || {
                order.lock().unwrap().push(i);
            });
        }

        iter_check!(2000, {
            if order.lock().unwrap().len() == 20 {
                break;
            }
        });

        assert_eq!((0..20).collect::<Vec<_>>(), *order.lock().unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn distinct_keys_run_in_parallel() {
        let exec = SerialExecutor::new(Arc::new(TaskPool::new("test", 4)));
        let overlap = Arc::new(Overlap::default());

        for key in 1..=4 {
            let overlap = overlap.clone();
            exec.schedule(RequestId(key), move || overlap.run());
        }

        iter_check!(2000, {
            if overlap.done.load(Ordering::SeqCst) == 4 {
                break;
            }
        });

        assert!(overlap.max_running.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn blocking_job_does_not_stall_other_keys() {
        let exec = SerialExecutor::new(Arc::new(TaskPool::new("test", 2)));
        let arrived = Arc::new(AtomicUsize::new(0));
        let met = Arc::new(AtomicUsize::new(0));

        // each job blocks its thread until the other one has started
        for key in 1..=2 {
            let arrived = arrived.clone();
            let met = met.clone();
            exec.schedule(RequestId(key), move || {
                arrived.fetch_add(1, Ordering::SeqCst);
                let deadline =
                    std::time::Instant::now() + Duration::from_secs(1);
                while std::time::Instant::now() < deadline {
                    if arrived.load(Ordering::SeqCst) == 2 {
                        met.fetch_add(1, Ordering::SeqCst);
                        return;
                    }
                    std::thread::sleep(Duration::from_millis(1));
                }
            });
        }

        iter_check!(2000, {
            if met.load(Ordering::SeqCst) == 2 {
                break;
            }
        });
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn panicking_job_does_not_stop_drain() {
        let exec = SerialExecutor::new(Arc::new(TaskPool::new("test", 1)));
        let done = Arc::new(AtomicUsize::new(0));

        exec.schedule(RequestId(3), || panic!("boom"));
        exec.schedule(RequestId(3), {
            let done = done.clone();
            move || {
                done.fetch_add(1, Ordering::SeqCst);
            }
        });

        iter_check!(1000, {
            if done.load(Ordering::SeqCst) == 1 {
                break;
            }
        });
    }
}
