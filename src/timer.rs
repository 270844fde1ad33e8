//! # Alarm Thread
//!
//! A single background thread that delivers one-shot wall-clock alarms. The
//! screen manager keeps the authoritative timer table (id, owning screen,
//! callback); this module only knows deadlines and ids. Cancellation is
//! lazy: a cancelled id simply no longer exists in the manager's table when
//! its deadline comes due, and the firing becomes a no-op there.
//!
//! The heap is guarded by a mutex and the thread parks on a condvar until
//! the earliest deadline (or until a new, earlier deadline is scheduled).

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Uniquely identifies a timer for the life of the process. Ids strictly
/// increase and are never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub(crate) u64);

#[derive(PartialEq, Eq)]
struct Deadline {
    at: Instant,
    id: TimerId,
}

impl Ord for Deadline {
    fn cmp(&self, other: &Self) -> Ordering {
        self.at.cmp(&other.at).then(self.id.cmp(&other.id))
    }
}

impl PartialOrd for Deadline {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct Shared {
    state: Mutex<State>,
    wakeup: Condvar,
}

struct State {
    queue: BinaryHeap<Reverse<Deadline>>,
    shutdown: bool,
}

/// Handle to the alarm thread. Dropping it stops the thread; pending
/// deadlines are discarded (their table entries, if any, are left to the
/// owner to clean up).
pub struct AlarmThread {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl AlarmThread {
    /// Spawn the thread. `fire` is invoked on the alarm thread, with no
    /// internal locks held, each time a deadline expires.
    pub fn spawn<F>(fire: F) -> Self
    where
        F: Fn(TimerId) + Send + 'static,
    {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                queue: BinaryHeap::new(),
                shutdown: false,
            }),
            wakeup: Condvar::new(),
        });

        let thread_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("kiosk-alarm".into())
            .spawn(move || run(thread_shared, fire))
            .expect("spawn alarm thread");

        AlarmThread {
            shared,
            handle: Some(handle),
        }
    }

    /// Arm `id` to fire after `after`.
    pub fn schedule(&self, id: TimerId, after: Duration) {
        let mut state = self.shared.state.lock().unwrap();
        state.queue.push(Reverse(Deadline {
            at: Instant::now() + after,
            id,
        }));
        self.shared.wakeup.notify_one();
    }
}

impl Drop for AlarmThread {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock().unwrap();
            state.shutdown = true;
            self.shared.wakeup.notify_one();
        }
        if let Some(handle) = self.handle.take() {
            // The owner can be dropped from inside a fire callback, i.e. on
            // the alarm thread itself; joining would then never return.
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

fn run<F>(shared: Arc<Shared>, fire: F)
where
    F: Fn(TimerId),
{
    let mut state = shared.state.lock().unwrap();
    loop {
        if state.shutdown {
            return;
        }
        let now = Instant::now();
        let next_at = state.queue.peek().map(|entry| entry.0.at);
        match next_at {
            None => {
                state = shared.wakeup.wait(state).unwrap();
            }
            Some(at) if at > now => {
                let (guard, _) = shared.wakeup.wait_timeout(state, at - now).unwrap();
                state = guard;
            }
            Some(_) => {
                let Reverse(due) = state.queue.pop().unwrap();
                // Fire with the heap unlocked so the callback may schedule
                // new deadlines from within.
                drop(state);
                fire(due.id);
                state = shared.state.lock().unwrap();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn fires_in_deadline_order() {
        let fired = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&fired);
        let alarms = AlarmThread::spawn(move |id| sink.lock().unwrap().push(id));

        alarms.schedule(TimerId(2), Duration::from_millis(60));
        alarms.schedule(TimerId(1), Duration::from_millis(20));

        thread::sleep(Duration::from_millis(150));
        assert_eq!(*fired.lock().unwrap(), vec![TimerId(1), TimerId(2)]);
    }

    #[test]
    fn shutdown_discards_pending_deadlines() {
        let count = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&count);
        let alarms = AlarmThread::spawn(move |_| {
            sink.fetch_add(1, Ordering::SeqCst);
        });

        alarms.schedule(TimerId(1), Duration::from_secs(60));
        drop(alarms);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn schedule_from_fire_callback_is_allowed() {
        // Re-arming from inside the callback is the spinner pattern; it must
        // not deadlock against the heap lock.
        let count = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&count);
        let alarms = Arc::new(Mutex::new(None::<AlarmThread>));
        let alarms_ref = Arc::clone(&alarms);
        let thread = AlarmThread::spawn(move |id| {
            let n = sink.fetch_add(1, Ordering::SeqCst);
            if n < 3 {
                if let Some(a) = alarms_ref.lock().unwrap().as_ref() {
                    a.schedule(TimerId(id.0 + 1), Duration::from_millis(10));
                }
            }
        });
        *alarms.lock().unwrap() = Some(thread);
        alarms
            .lock()
            .unwrap()
            .as_ref()
            .unwrap()
            .schedule(TimerId(1), Duration::from_millis(10));

        thread::sleep(Duration::from_millis(200));
        assert!(count.load(Ordering::SeqCst) >= 4);
        // Release the outer lock before joining the alarm thread.
        let thread = alarms.lock().unwrap().take();
        drop(thread);
    }
}
