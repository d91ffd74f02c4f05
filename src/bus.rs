//! ==============================================================================
//! bus.rs - typed publish/subscribe message bus
//! ==============================================================================
//!
//! purpose:
//!     a registry of named, typed channels. each channel holds its latest value
//!     and a fixed, ordered list of observers. publish stores the value and
//!     calls every observer synchronously on the caller's own thread.
//!
//! lifecycle:
//!
//! ```text
//!     ┌────────────────────────────┐   start()   ┌──────────────────────────┐
//!     │ initialization             │ ──────────> │ steady state             │
//!     │  - declare_channel         │             │  - publish / latest      │
//!     │  - subscribe               │             │  - subscribe rejected    │
//!     └────────────────────────────┘             └──────────────────────────┘
//! ```
//!
//! concurrency:
//!     - one parking_lot mutex per channel guards the latest-value slot AND is
//!       held for the whole dispatch, so dispatches of one channel never overlap
//!     - publish waits at most `timeout` for that mutex; on timeout nothing is
//!       stored and no observer runs
//!     - different channels never share a lock, so an observer may publish to
//!       another channel from inside its callback (depth-first dispatch)
//!     - publishing to the channel currently being dispatched on the same
//!       thread cannot take the lock and comes back as Timeout
//!     - observer panics are not caught; parking_lot locks do not poison, so
//!       the channel stays usable
//!
//! relationships:
//!     - used by: station.rs (wiring), sensor_mgr.rs, console.rs, timer.rs
//!     - uses: error.rs (BusError)
//!
//! ==============================================================================

use crate::error::{BusError, BusResult};

use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

static NEXT_BUS_ID: AtomicU64 = AtomicU64::new(1);

// ==============================================================================
// observers
// ==============================================================================

/// a registered callback, invoked once per publish on its channel
pub trait Observer<T>: Send + Sync {
    /// stable name, used in logs and introspection
    fn name(&self) -> &str;

    /// called with the publisher's thread; must not block indefinitely
    fn on_publish(&self, ctx: &Dispatch<'_>, payload: &T);
}

/// what an observer sees about the dispatch it is part of
pub struct Dispatch<'a> {
    bus: &'a MessageBus,
    channel: &'a str,
}

impl<'a> Dispatch<'a> {
    /// the bus doing the dispatch, for re-entrant publishes
    pub fn bus(&self) -> &'a MessageBus {
        self.bus
    }

    /// name of the channel being dispatched
    pub fn channel(&self) -> &'a str {
        self.channel
    }
}

/// adapter so closures can be registered as observers
pub struct FnObserver<F> {
    name: String,
    callback: F,
}

impl<T, F> Observer<T> for FnObserver<F>
where
    F: Fn(&Dispatch<'_>, &T) + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn on_publish(&self, ctx: &Dispatch<'_>, payload: &T) {
        (self.callback)(ctx, payload)
    }
}

/// wrap a closure as a named observer
pub fn observer_fn<T, F>(name: impl Into<String>, callback: F) -> Arc<dyn Observer<T>>
where
    T: 'static,
    F: Fn(&Dispatch<'_>, &T) + Send + Sync + 'static,
{
    Arc::new(FnObserver {
        name: name.into(),
        callback,
    })
}

// ==============================================================================
// channel handles
// ==============================================================================

/// typed reference to a declared channel
///
/// the payload type is part of the handle, so a payload of the wrong type is a
/// compile error rather than a runtime one. handles are only valid on the bus
/// that minted them.
pub struct ChannelHandle<T> {
    bus: u64,
    index: usize,
    _payload: PhantomData<fn() -> T>,
}

impl<T> ChannelHandle<T> {
    /// position in declaration order
    pub fn index(&self) -> usize {
        self.index
    }
}

impl<T> Clone for ChannelHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ChannelHandle<T> {}

impl<T> PartialEq for ChannelHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.bus == other.bus && self.index == other.index
    }
}

impl<T> Eq for ChannelHandle<T> {}

impl<T> fmt::Debug for ChannelHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelHandle")
            .field("bus", &self.bus)
            .field("index", &self.index)
            .field("payload", &std::any::type_name::<T>())
            .finish()
    }
}

// ==============================================================================
// channel slot
// ==============================================================================

struct ChannelSlot<T> {
    name: Arc<str>,
    // held for the full dispatch: per-channel serialization
    latest: Mutex<Option<T>>,
    // written only before start()
    observers: RwLock<Vec<Arc<dyn Observer<T>>>>,
}

impl<T> ChannelSlot<T> {
    fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            latest: Mutex::new(None),
            observers: RwLock::new(Vec::new()),
        }
    }
}

#[derive(Default)]
struct Registry {
    slots: Vec<Arc<dyn Any + Send + Sync>>,
    by_name: HashMap<String, usize>,
}

// ==============================================================================
// message bus - main public interface
// ==============================================================================

/// ```
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
/// use weather_station::bus::{observer_fn, Dispatch, MessageBus};
///
/// let bus = MessageBus::new();
/// let numbers = bus.declare_channel::<u32>("numbers").unwrap();
///
/// let total = Arc::new(AtomicU32::new(0));
/// let sum = total.clone();
/// bus.subscribe(
///     numbers,
///     observer_fn("sum", move |_: &Dispatch<'_>, n: &u32| {
///         sum.fetch_add(*n, Ordering::Relaxed);
///     }),
/// )
/// .unwrap();
/// bus.start();
///
/// let wait = Duration::from_millis(100);
/// bus.publish(numbers, 3, wait).unwrap();
/// bus.publish(numbers, 4, wait).unwrap();
///
/// assert_eq!(total.load(Ordering::Relaxed), 7);
/// assert_eq!(bus.latest(numbers, wait).unwrap(), Some(4));
/// ```
pub struct MessageBus {
    id: u64,
    registry: RwLock<Registry>,
    started: AtomicBool,
}

impl MessageBus {
    /// create an empty bus in its initialization phase
    pub fn new() -> Self {
        Self {
            id: NEXT_BUS_ID.fetch_add(1, Ordering::Relaxed),
            registry: RwLock::new(Registry::default()),
            started: AtomicBool::new(false),
        }
    }

    /// register a new channel carrying payloads of type `T`
    pub fn declare_channel<T>(&self, name: &str) -> BusResult<ChannelHandle<T>>
    where
        T: Clone + Send + 'static,
    {
        let mut registry = self.registry.write();
        if self.is_started() {
            return Err(BusError::DeclarationAfterStart(name.to_string()));
        }
        if registry.by_name.contains_key(name) {
            return Err(BusError::DuplicateChannel(name.to_string()));
        }

        let index = registry.slots.len();
        registry.slots.push(Arc::new(ChannelSlot::<T>::new(name)));
        registry.by_name.insert(name.to_string(), index);
        tracing::debug!(channel = name, index, "channel declared");

        Ok(ChannelHandle {
            bus: self.id,
            index,
            _payload: PhantomData,
        })
    }

    /// append an observer to a channel's dispatch list
    pub fn subscribe<T>(
        &self,
        handle: ChannelHandle<T>,
        observer: Arc<dyn Observer<T>>,
    ) -> BusResult<()>
    where
        T: Clone + Send + 'static,
    {
        // the registry read lock excludes a concurrent start()
        let registry = self.registry.read();
        let slot = Self::lookup(&registry, self.id, handle)?;
        if self.is_started() {
            return Err(BusError::SubscriptionAfterStart {
                channel: slot.name.to_string(),
                observer: observer.name().to_string(),
            });
        }

        tracing::debug!(channel = %slot.name, observer = observer.name(), "observer registered");
        slot.observers.write().push(observer);
        Ok(())
    }

    /// end the initialization phase; observer lists are frozen from here on
    pub fn start(&self) {
        let registry = self.registry.write();
        if !self.started.swap(true, Ordering::AcqRel) {
            tracing::info!(channels = registry.slots.len(), "message bus started");
        }
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// store `payload` as the latest value and dispatch it to every observer
    ///
    /// observers run in registration order on the calling thread. returns once
    /// all of them have returned. if channel access is not acquired within
    /// `timeout`, returns `Timeout` without storing or dispatching anything.
    pub fn publish<T>(
        &self,
        handle: ChannelHandle<T>,
        payload: T,
        timeout: Duration,
    ) -> BusResult<()>
    where
        T: Clone + Send + 'static,
    {
        let slot = self.slot(handle)?;

        let Some(mut latest) = slot.latest.try_lock_for(timeout) else {
            tracing::warn!(channel = %slot.name, ?timeout, "publish timed out waiting for channel");
            return Err(BusError::Timeout {
                channel: slot.name.to_string(),
                timeout,
            });
        };

        *latest = Some(payload.clone());

        let observers = slot.observers.read().clone();
        let ctx = Dispatch {
            bus: self,
            channel: &slot.name,
        };
        for observer in &observers {
            tracing::trace!(channel = %slot.name, observer = observer.name(), "dispatching");
            observer.on_publish(&ctx, &payload);
        }

        drop(latest);
        Ok(())
    }

    /// copy of the latest value published on a channel, if any
    pub fn latest<T>(&self, handle: ChannelHandle<T>, timeout: Duration) -> BusResult<Option<T>>
    where
        T: Clone + Send + 'static,
    {
        let slot = self.slot(handle)?;
        let latest = slot.latest.try_lock_for(timeout).ok_or_else(|| BusError::Timeout {
            channel: slot.name.to_string(),
            timeout,
        })?;
        Ok(latest.clone())
    }

    pub fn channel_name<T>(&self, handle: ChannelHandle<T>) -> BusResult<String>
    where
        T: Clone + Send + 'static,
    {
        Ok(self.slot(handle)?.name.to_string())
    }

    /// observer names in dispatch order
    pub fn observer_names<T>(&self, handle: ChannelHandle<T>) -> BusResult<Vec<String>>
    where
        T: Clone + Send + 'static,
    {
        let slot = self.slot(handle)?;
        let observers = slot.observers.read();
        Ok(observers.iter().map(|o| o.name().to_string()).collect())
    }

    pub fn channel_count(&self) -> usize {
        self.registry.read().slots.len()
    }

    fn slot<T>(&self, handle: ChannelHandle<T>) -> BusResult<Arc<ChannelSlot<T>>>
    where
        T: Clone + Send + 'static,
    {
        let registry = self.registry.read();
        Self::lookup(&registry, self.id, handle)
    }

    fn lookup<T>(
        registry: &Registry,
        bus: u64,
        handle: ChannelHandle<T>,
    ) -> BusResult<Arc<ChannelSlot<T>>>
    where
        T: Clone + Send + 'static,
    {
        let unknown = || BusError::UnknownChannel { index: handle.index };
        if handle.bus != bus {
            return Err(unknown());
        }
        let slot = registry.slots.get(handle.index).cloned().ok_or_else(unknown)?;
        slot.downcast::<ChannelSlot<T>>().map_err(|_| unknown())
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.read();
        let mut names: Vec<_> = registry.by_name.iter().collect();
        names.sort_by_key(|(_, index)| **index);
        f.debug_struct("MessageBus")
            .field("id", &self.id)
            .field("channels", &names.into_iter().map(|(n, _)| n).collect::<Vec<_>>())
            .field("started", &self.is_started())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::mpsc;
    use std::thread;

    const WAIT: Duration = Duration::from_millis(200);

    fn recorder<T: Clone + Send + Sync + fmt::Debug + 'static>(
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    ) -> Arc<dyn Observer<T>> {
        observer_fn(name, move |ctx: &Dispatch<'_>, payload: &T| {
            log.lock().push(format!("{name}@{}:{payload:?}", ctx.channel()));
        })
    }

    #[test]
    fn dispatches_in_registration_order() {
        let bus = MessageBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let chan = bus.declare_channel::<u32>("numbers").unwrap();
        bus.subscribe(chan, recorder("a", log.clone())).unwrap();
        bus.subscribe(chan, recorder("b", log.clone())).unwrap();
        bus.subscribe(chan, recorder("c", log.clone())).unwrap();
        bus.start();

        bus.publish(chan, 7, WAIT).unwrap();

        assert_eq!(
            *log.lock(),
            vec!["a@numbers:7", "b@numbers:7", "c@numbers:7"]
        );
        assert_eq!(bus.observer_names(chan).unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn stores_latest_value() {
        let bus = MessageBus::new();
        let chan = bus.declare_channel::<u32>("numbers").unwrap();
        bus.start();
        assert_eq!(bus.latest(chan, WAIT).unwrap(), None);

        bus.publish(chan, 1, WAIT).unwrap();
        bus.publish(chan, 2, WAIT).unwrap();
        assert_eq!(bus.latest(chan, WAIT).unwrap(), Some(2));
    }

    #[test]
    fn duplicate_channel_is_rejected() {
        let bus = MessageBus::new();
        bus.declare_channel::<u32>("dup").unwrap();
        let err = bus.declare_channel::<String>("dup").unwrap_err();
        assert_eq!(err, BusError::DuplicateChannel("dup".into()));
        assert_eq!(bus.channel_count(), 1);
    }

    #[test]
    fn registration_is_closed_after_start() {
        let bus = MessageBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let chan = bus.declare_channel::<u32>("numbers").unwrap();
        bus.start();
        bus.start();

        let err = bus.subscribe(chan, recorder("late", log.clone())).unwrap_err();
        assert_eq!(
            err,
            BusError::SubscriptionAfterStart {
                channel: "numbers".into(),
                observer: "late".into(),
            }
        );
        let err = bus.declare_channel::<u32>("more").unwrap_err();
        assert_eq!(err, BusError::DeclarationAfterStart("more".into()));

        bus.publish(chan, 1, WAIT).unwrap();
        assert!(log.lock().is_empty());
    }

    #[test]
    fn handle_from_another_bus_is_unknown() {
        let ours = MessageBus::new();
        let theirs = MessageBus::new();
        ours.declare_channel::<u32>("numbers").unwrap();
        let foreign = theirs.declare_channel::<u32>("numbers").unwrap();
        ours.start();

        let err = ours.publish(foreign, 1, WAIT).unwrap_err();
        assert_eq!(err, BusError::UnknownChannel { index: 0 });
        let log = Arc::new(Mutex::new(Vec::new()));
        assert!(matches!(
            ours.subscribe(foreign, recorder("x", log)),
            Err(BusError::UnknownChannel { .. })
        ));
        assert!(ours.latest(foreign, WAIT).is_err());
    }

    #[test]
    fn nested_publish_is_depth_first() {
        let bus = MessageBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let outer = bus.declare_channel::<u32>("outer").unwrap();
        let inner = bus.declare_channel::<u32>("inner").unwrap();

        let relay_log = log.clone();
        bus.subscribe(
            outer,
            observer_fn("relay", move |ctx: &Dispatch<'_>, n: &u32| {
                relay_log.lock().push(format!("relay:{n}"));
                ctx.bus().publish(inner, n * 10, WAIT).unwrap();
            }),
        )
        .unwrap();
        bus.subscribe(outer, recorder("after", log.clone())).unwrap();
        bus.subscribe(inner, recorder("leaf", log.clone())).unwrap();
        bus.start();

        bus.publish(outer, 4, WAIT).unwrap();

        assert_eq!(
            *log.lock(),
            vec!["relay:4", "leaf@inner:40", "after@outer:4"]
        );
    }

    #[test]
    fn publish_to_own_channel_from_dispatch_times_out() {
        let bus = MessageBus::new();
        let chan = bus.declare_channel::<u32>("loop").unwrap();
        let result = Arc::new(Mutex::new(None));
        let seen = result.clone();
        bus.subscribe(
            chan,
            observer_fn("echo", move |ctx: &Dispatch<'_>, n: &u32| {
                if *n == 0 {
                    *seen.lock() = Some(ctx.bus().publish(chan, 1, Duration::from_millis(10)));
                }
            }),
        )
        .unwrap();
        bus.start();

        bus.publish(chan, 0, WAIT).unwrap();

        let nested = result.lock().take().unwrap();
        assert!(matches!(nested, Err(BusError::Timeout { .. })));
        assert_eq!(bus.latest(chan, WAIT).unwrap(), Some(0));
    }

    #[test]
    fn timed_out_publish_is_dropped() {
        let bus = Arc::new(MessageBus::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        let chan = bus.declare_channel::<u32>("slow").unwrap();

        let (entered_tx, entered_rx) = mpsc::channel::<()>();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let entered_tx = Mutex::new(entered_tx);
        let release_rx = Mutex::new(release_rx);
        let slow_log = log.clone();
        bus.subscribe(
            chan,
            observer_fn("slow", move |_: &Dispatch<'_>, n: &u32| {
                slow_log.lock().push(n.to_string());
                entered_tx.lock().send(()).unwrap();
                release_rx.lock().recv().unwrap();
            }),
        )
        .unwrap();
        bus.start();

        let holder = {
            let bus = bus.clone();
            thread::spawn(move || bus.publish(chan, 1, WAIT))
        };
        entered_rx.recv().unwrap();

        let err = bus.publish(chan, 2, Duration::from_millis(20)).unwrap_err();
        assert!(err.is_transient());

        release_tx.send(()).unwrap();
        holder.join().unwrap().unwrap();

        assert_eq!(*log.lock(), vec!["1"]);
        assert_eq!(bus.latest(chan, WAIT).unwrap(), Some(1));
    }

    #[test]
    fn channels_are_independent() {
        let bus = Arc::new(MessageBus::new());
        let busy = bus.declare_channel::<u32>("busy").unwrap();
        let free = bus.declare_channel::<u32>("free").unwrap();

        let (entered_tx, entered_rx) = mpsc::channel::<()>();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let entered_tx = Mutex::new(entered_tx);
        let release_rx = Mutex::new(release_rx);
        bus.subscribe(
            busy,
            observer_fn("block", move |_: &Dispatch<'_>, _: &u32| {
                entered_tx.lock().send(()).unwrap();
                release_rx.lock().recv().unwrap();
            }),
        )
        .unwrap();
        bus.start();

        let holder = {
            let bus = bus.clone();
            thread::spawn(move || bus.publish(busy, 1, WAIT))
        };
        entered_rx.recv().unwrap();

        bus.publish(free, 5, Duration::from_millis(20)).unwrap();
        assert_eq!(bus.latest(free, WAIT).unwrap(), Some(5));

        release_tx.send(()).unwrap();
        holder.join().unwrap().unwrap();
    }

    #[test]
    fn observer_panic_leaves_channel_usable() {
        let bus = MessageBus::new();
        let chan = bus.declare_channel::<u32>("numbers").unwrap();
        bus.subscribe(
            chan,
            observer_fn("fragile", |_: &Dispatch<'_>, n: &u32| {
                if *n == 0 {
                    panic!("zero reading");
                }
            }),
        )
        .unwrap();
        bus.start();

        let unwound =
            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| bus.publish(chan, 0, WAIT)));
        assert!(unwound.is_err());

        bus.publish(chan, 1, WAIT).unwrap();
        assert_eq!(bus.latest(chan, WAIT).unwrap(), Some(1));
    }
}
