use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    sync::{
        LazyLock, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use serde_json::{Map, Value};

use crate::{session::SessionId, utils::utc_now_secs};

/// The last error reported through [`report_error`].
///
/// Every report gets a new sequence number, so two reports with the same
/// message still compare unequal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    seq: u64,
    message: String,
}

impl ErrorRecord {
    pub fn message(&self) -> &str {
        &self.message
    }
}

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

thread_local! {
    static LAST_ERROR: RefCell<Option<ErrorRecord>> = const { RefCell::new(None) };
    static SUPPRESSED: Cell<u32> = const { Cell::new(0) };
}

pub fn report_error(message: impl Into<String>) {
    let message = message.into();

    if SUPPRESSED.get() == 0 {
        tracing::warn!("session runtime: {message}");
    }

    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed) + 1;
    LAST_ERROR.set(Some(ErrorRecord { seq, message }));
}

pub fn last_error() -> Option<ErrorRecord> {
    LAST_ERROR.with_borrow(Clone::clone)
}

/// Run `f` without logging errors reported during the call. They are still
/// recorded and visible through [`last_error`].
pub fn with_errors_suppressed<T>(f: impl FnOnce() -> T) -> T {
    struct Restore;

    impl Drop for Restore {
        fn drop(&mut self) {
            SUPPRESSED.set(SUPPRESSED.get() - 1);
        }
    }

    SUPPRESSED.set(SUPPRESSED.get() + 1);
    let _restore = Restore;
    f()
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Replace ids sent by the client that do not match a stored session.
    pub strict_mode: bool,
    /// Stored sessions untouched for longer than this are discarded.
    pub max_lifetime: Duration,
    /// Minimum time between two sweeps for expired sessions.
    pub gc_interval: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            strict_mode: true,
            max_lifetime: Duration::from_secs(24 * 60),
            gc_interval: Duration::from_secs(60),
        }
    }
}

/// The primitive session mechanism a [`NativeSession`](super::NativeSession)
/// drives.
///
/// Like the mechanism it models, `start`, `write_close` and `destroy` only
/// signal hard failures through their return value. Anything else goes to
/// the error state read by `last_error`.
pub trait SessionRuntime: Send + 'static {
    fn last_error(&self) -> Option<ErrorRecord> {
        last_error()
    }

    fn suppressed<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T
    where
        Self: Sized,
    {
        with_errors_suppressed(|| f(self))
    }

    fn start(&mut self, name: &str, requested: Option<&str>, options: &SessionOptions) -> bool;

    fn id(&self) -> Option<&SessionId>;

    fn data(&self) -> Option<&Map<String, Value>>;

    /// Mutable access to the data of the active session. `None` once the
    /// session has been destroyed.
    fn data_mut(&mut self) -> Option<&mut Map<String, Value>>;

    fn write_close(&mut self) -> bool;

    /// Stop the active session without writing it.
    fn abort(&mut self);

    fn destroy(&mut self, requested: Option<&SessionId>) -> bool;
}

struct Stored {
    data: Map<String, Value>,
    touched: u64,
}

static SESSIONS: LazyLock<Mutex<HashMap<SessionId, Stored>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

static LAST_GC: AtomicU64 = AtomicU64::new(0);

/// Claim the next sweep if `interval` has passed since the last one. Only one
/// caller wins when several race for it.
fn claim_gc(last: &AtomicU64, now: u64, interval: Duration) -> bool {
    let previous = last.load(Ordering::Relaxed);

    if now.saturating_sub(previous) < interval.as_secs() {
        return false;
    }

    last.compare_exchange(previous, now, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
}

fn sessions() -> MutexGuard<'static, HashMap<SessionId, Stored>> {
    SESSIONS.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Active {
    id: SessionId,
    data: Map<String, Value>,
    destroyed: bool,
}

/// Session runtime backed by a store shared by the whole process.
#[derive(Default)]
pub struct ProcessRuntime {
    active: Option<Active>,
}

impl ProcessRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// The data last written for the given session.
    pub fn persisted(id: &SessionId) -> Option<Map<String, Value>> {
        sessions().get(id).map(|stored| stored.data.clone())
    }

    /// Discard stored sessions that have not been written to within
    /// `max_lifetime`.
    pub fn gc(max_lifetime: Duration) {
        let deadline = utc_now_secs().saturating_sub(max_lifetime.as_secs());
        sessions().retain(|_, stored| stored.touched >= deadline);
    }

    fn resolve(
        requested: Option<&str>,
        options: &SessionOptions,
    ) -> (SessionId, Map<String, Value>) {
        let Some(raw) = requested else {
            return (SessionId::new(), Map::new());
        };

        let Some(id) = SessionId::parse(raw) else {
            report_error(
                "the session id is too long or contains illegal characters, a new id was issued",
            );
            return (SessionId::new(), Map::new());
        };

        if let Some(stored) = sessions().get(&id) {
            return (id, stored.data.clone());
        }

        if options.strict_mode {
            (SessionId::new(), Map::new())
        } else {
            (id, Map::new())
        }
    }
}

impl SessionRuntime for ProcessRuntime {
    fn start(&mut self, name: &str, requested: Option<&str>, options: &SessionOptions) -> bool {
        if self.active.is_some() {
            report_error("a session had already been started, ignoring start");
            return true;
        }

        if name.is_empty() {
            report_error("the session name can not be empty");
            return false;
        }

        if claim_gc(&LAST_GC, utc_now_secs(), options.gc_interval) {
            Self::gc(options.max_lifetime);
        }

        let (id, data) = Self::resolve(requested, options);
        self.active = Some(Active {
            id,
            data,
            destroyed: false,
        });
        true
    }

    fn id(&self) -> Option<&SessionId> {
        self.active.as_ref().map(|active| &active.id)
    }

    fn data(&self) -> Option<&Map<String, Value>> {
        self.active.as_ref().map(|active| &active.data)
    }

    fn data_mut(&mut self) -> Option<&mut Map<String, Value>> {
        self.active
            .as_mut()
            .filter(|active| !active.destroyed)
            .map(|active| &mut active.data)
    }

    fn write_close(&mut self) -> bool {
        let Some(active) = self.active.take() else {
            return false;
        };

        if !active.destroyed {
            sessions().insert(
                active.id,
                Stored {
                    data: active.data,
                    touched: utc_now_secs(),
                },
            );
        }

        true
    }

    fn abort(&mut self) {
        self.active = None;
    }

    fn destroy(&mut self, requested: Option<&SessionId>) -> bool {
        if let Some(active) = self.active.as_mut() {
            sessions().remove(&active.id);
            active.data.clear();
            active.destroyed = true;
        } else if let Some(id) = requested {
            sessions().remove(id);
        }

        true
    }
}
