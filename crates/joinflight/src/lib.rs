// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(docsrs, feature(doc_cfg))]

//! Joins concurrent calls for the same key into a single execution.
//!
//! This crate provides [`JoinGroup`], a duplicate-call suppression primitive. When several
//! callers ask for the same work (identified by a key) while it is in flight, only the first
//! caller (the "leader") runs the computation. Every caller that arrives before the result is
//! published (a "follower") waits and receives a clone of the leader's result.
//!
//! # Example
//!
//! ```
//! use joinflight::JoinGroup;
//!
//! # async fn example() {
//! let group: JoinGroup<&str, String> = JoinGroup::new();
//!
//! // Concurrent calls with the same key share a single execution.
//! let outcome = group.work("user:123", || async {
//!     "expensive_result".to_string()
//! }).await;
//!
//! assert_eq!(outcome.value, "expensive_result");
//! assert!(!outcome.shared);
//! # }
//! ```
//!
//! # Life cycle of a call
//!
//! - A call is registered synchronously when [`JoinGroup::work`] or
//!   [`JoinGroup::work_detached`] is invoked, so callers that arrive later join it even if the
//!   leader's future has not been polled yet.
//! - The registry lock is only held while a call is looked up, registered or removed. The
//!   computation itself always runs outside of it, so slow work never blocks unrelated keys.
//! - When the computation finishes, the call is removed from the registry *before* its result
//!   is published. A caller that starts work for the same key right after the result became
//!   visible therefore starts a fresh call instead of joining the finished one.
//!
//! # Cancellation and Panic Safety
//!
//! - If the leader of a [`JoinGroup::work`] call is dropped or panics before publishing, the
//!   registration is withdrawn and one of the followers becomes the new leader and runs its own
//!   computation.
//! - [`JoinGroup::work_detached`] runs the computation on the Tokio runtime. Dropping the returned
//!   [`Waiter`] only stops that caller from waiting; the computation keeps running for everyone
//!   else. If the spawned computation panics, waiters observe [`Abandoned`].
//!
//! # Thread Safety
//!
//! [`JoinGroup`] is `Send` and `Sync` whenever its key and value are, and can be shared across
//! threads behind an [`Arc`].

use std::{collections::HashMap, fmt, hash::Hash, sync::Arc};

use parking_lot::Mutex as SyncMutex;
use tokio::sync::watch;

type Slot<T> = Option<Outcome<T>>;
type SharedRegistry<K, T> = Arc<SyncMutex<Registry<K, T>>>;

/// The result of a call, as observed by one caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome<T> {
    /// The value produced by the computation.
    pub value: T,
    /// Whether the value was handed to more than one caller.
    pub shared: bool,
}

/// Returned by [`Waiter::wait`] when the computation never published a result.
///
/// This happens when a computation spawned by [`JoinGroup::work_detached`] panics, or when the
/// waiter joined a call led by [`JoinGroup::work`] and that leader's future was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("the call was abandoned before it produced a result")]
pub struct Abandoned;

/// Represents a class of work and creates a space in which units of work
/// can be executed with duplicate suppression.
pub struct JoinGroup<K, T> {
    registry: SharedRegistry<K, T>,
}

struct Registry<K, T> {
    calls: HashMap<K, PendingCall<T>>,
    next_generation: u64,
}

/// An in-flight call as seen by the registry.
struct PendingCall<T> {
    /// Distinguishes this registration from later ones for the same key.
    generation: u64,
    /// Callers that joined after the leader.
    joined: usize,
    result: watch::Receiver<Slot<T>>,
}

impl<K, T> Default for JoinGroup<K, T> {
    fn default() -> Self {
        Self {
            registry: Arc::new(SyncMutex::new(Registry {
                calls: HashMap::new(),
                next_generation: 0,
            })),
        }
    }
}

impl<K, T> fmt::Debug for JoinGroup<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinGroup")
            .field("in_flight", &self.registry.lock().calls.len())
            .finish()
    }
}

/// Role of a caller in the execution of a call.
enum Role<K: Hash + Eq, T> {
    /// Runs the computation and publishes its result.
    Leader(Publisher<K, T>),
    /// Waits for the leader's result.
    Follower {
        generation: u64,
        result: watch::Receiver<Slot<T>>,
    },
}

/// Write side of a call, owned by its leader.
///
/// Dropping a publisher without publishing withdraws the registration, which closes the channel
/// and lets followers know that nobody is going to produce a result for them.
struct Publisher<K: Hash + Eq, T> {
    registry: SharedRegistry<K, T>,
    key: Option<K>,
    generation: u64,
    sender: watch::Sender<Slot<T>>,
}

impl<K: Hash + Eq, T> Publisher<K, T> {
    fn subscribe(&self) -> watch::Receiver<Slot<T>> {
        self.sender.subscribe()
    }

    /// Removes the registration, returning the number of joined callers.
    ///
    /// Returns `None` if the registration was already withdrawn or forgotten.
    fn withdraw(&mut self) -> Option<usize> {
        let key = self.key.take()?;
        let mut registry = self.registry.lock();
        match registry.calls.get(&key) {
            Some(call) if call.generation == self.generation => registry.calls.remove(&key).map(|call| call.joined),
            _ => None,
        }
    }

    fn publish(mut self, value: T) -> Outcome<T>
    where
        T: Clone,
    {
        // Deregister first: once the result is visible the key must be free for new calls.
        let joined = self.withdraw().unwrap_or(0);
        let outcome = Outcome { value, shared: joined > 0 };
        self.sender.send_replace(Some(outcome.clone()));
        outcome
    }
}

impl<K: Hash + Eq, T> Drop for Publisher<K, T> {
    fn drop(&mut self) {
        if self.withdraw().is_some() {
            tracing::trace!("call abandoned before publishing a result");
        }
    }
}

/// Handle to the result of a call joined through [`JoinGroup::work_detached`].
///
/// A waiter stays tied to the registration it joined: once that call has finished or was
/// forgotten, later calls for the same key are unaffected by it.
pub struct Waiter<K, T> {
    registry: SharedRegistry<K, T>,
    key: K,
    generation: u64,
    result: watch::Receiver<Slot<T>>,
}

impl<K, T> fmt::Debug for Waiter<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Waiter")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl<K: Hash + Eq, T: Clone> Waiter<K, T> {
    /// Waits until the call publishes its result.
    ///
    /// Can be called again after the returned future was dropped, for example when it lost a
    /// race against a cancellation signal.
    ///
    /// # Errors
    ///
    /// Returns [`Abandoned`] if the computation was dropped or panicked before it produced a
    /// result.
    pub async fn wait(&self) -> Result<Outcome<T>, Abandoned> {
        receive(self.result.clone()).await.ok_or(Abandoned)
    }

    /// Forgets the call this waiter belongs to if no other caller has joined it.
    ///
    /// Unlike [`JoinGroup::forget_unshared`], this never touches a newer call registered for the
    /// same key after this one finished or was forgotten.
    ///
    /// Returns `true` if the call is no longer registered afterwards, and `false` if other
    /// callers are waiting for it.
    pub fn forget_unshared(&self) -> bool {
        let mut registry = self.registry.lock();
        match registry.calls.get(&self.key) {
            Some(call) if call.generation == self.generation => {
                if call.joined > 0 {
                    return false;
                }
                registry.calls.remove(&self.key);
                tracing::trace!(generation = self.generation, "call forgotten by its only waiter");
                true
            }
            _ => true,
        }
    }
}

async fn receive<T: Clone>(mut result: watch::Receiver<Slot<T>>) -> Option<Outcome<T>> {
    match result.wait_for(Option::is_some).await {
        Ok(slot) => Option::clone(&slot),
        Err(_) => None,
    }
}

impl<K, T> JoinGroup<K, T>
where
    K: Hash + Eq + Clone,
{
    /// Creates a new, empty `JoinGroup`.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of keys that currently have a call in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.registry.lock().calls.len()
    }

    fn register(&self, key: &K) -> Role<K, T> {
        let mut registry = self.registry.lock();
        if let Some(call) = registry.calls.get_mut(key) {
            call.joined += 1;
            tracing::trace!(joined = call.joined, "joining an in-flight call");
            return Role::Follower {
                generation: call.generation,
                result: call.result.clone(),
            };
        }

        let generation = registry.next_generation;
        registry.next_generation = generation.wrapping_add(1);
        let (sender, result) = watch::channel(None);
        tracing::trace!(generation, "leading a new call");
        registry.calls.insert(
            key.clone(),
            PendingCall {
                generation,
                joined: 0,
                result,
            },
        );

        Role::Leader(Publisher {
            registry: Arc::clone(&self.registry),
            key: Some(key.clone()),
            generation,
            sender,
        })
    }

    /// Executes `computation` for `key`, making sure that only one execution is in flight for
    /// that key at a time.
    ///
    /// The call is registered when this method is invoked. If another call for `key` is
    /// already in flight, the returned future waits for it and yields its result with
    /// [`Outcome::shared`] set. Otherwise the returned future runs `computation` itself,
    /// publishes the result to every caller that joined meanwhile, and reports whether anyone
    /// did.
    ///
    /// If the leader's future is dropped or panics before the computation completes, a waiting
    /// caller takes over and runs its own `computation`.
    ///
    /// # Example
    ///
    /// ```
    /// use joinflight::JoinGroup;
    ///
    /// # async fn example() {
    /// let group: JoinGroup<u64, Result<String, String>> = JoinGroup::new();
    ///
    /// let outcome = group.work(42, || async { Err("upstream unavailable".to_string()) }).await;
    /// assert_eq!(outcome.value, Err("upstream unavailable".to_string()));
    /// # }
    /// ```
    pub fn work<F, Fut>(&self, key: K, computation: F) -> impl Future<Output = Outcome<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
        T: Clone,
    {
        let role = self.register(&key);
        async move {
            let mut role = role;
            loop {
                match role {
                    Role::Leader(publisher) => {
                        let value = computation().await;
                        return publisher.publish(value);
                    }
                    Role::Follower { result, .. } => {
                        if let Some(outcome) = receive(result).await {
                            return Outcome {
                                value: outcome.value,
                                shared: true,
                            };
                        }
                        tracing::trace!("leader went away, taking over the call");
                        role = self.register(&key);
                    }
                }
            }
        }
    }

    /// Like [`work`](Self::work), but runs the computation on the Tokio runtime and returns a
    /// [`Waiter`] instead of waiting.
    ///
    /// The returned flag is `true` if this invocation started the computation, and `false` if
    /// it joined a call that was already in flight. Dropping the [`Waiter`] does not cancel the
    /// computation.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime when a new computation has to be started.
    ///
    /// # Example
    ///
    /// ```
    /// use joinflight::JoinGroup;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let group: JoinGroup<&'static str, u32> = JoinGroup::new();
    ///
    /// let (waiter, started) = group.work_detached("answer", || async { 42 });
    /// assert!(started);
    /// assert_eq!(waiter.wait().await.map(|outcome| outcome.value), Ok(42));
    /// # }
    /// ```
    pub fn work_detached<F, Fut>(&self, key: K, computation: F) -> (Waiter<K, T>, bool)
    where
        K: Send + Sync + 'static,
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        match self.register(&key) {
            Role::Follower { generation, result } => (self.waiter(key, generation, result), false),
            Role::Leader(publisher) => {
                let generation = publisher.generation;
                let result = publisher.subscribe();
                tokio::spawn(async move {
                    let value = computation().await;
                    publisher.publish(value);
                });
                (self.waiter(key, generation, result), true)
            }
        }
    }

    fn waiter(&self, key: K, generation: u64, result: watch::Receiver<Slot<T>>) -> Waiter<K, T> {
        Waiter {
            registry: Arc::clone(&self.registry),
            key,
            generation,
            result,
        }
    }

    /// Forgets the in-flight call for `key` if no other caller has joined it.
    ///
    /// This acts on whichever call is currently registered for `key`. A caller holding a
    /// [`Waiter`] should use [`Waiter::forget_unshared`] to make sure it only forgets its own call.
    ///
    /// Subsequent calls for `key` start a new computation instead of waiting for the forgotten
    /// one. The forgotten computation keeps running and still delivers its result to its own
    /// leader.
    ///
    /// Returns `true` if the call was forgotten or no call was in flight, and `false` if other
    /// callers are waiting for it.
    pub fn forget_unshared(&self, key: &K) -> bool {
        let mut registry = self.registry.lock();
        match registry.calls.get(key) {
            None => true,
            Some(call) if call.joined == 0 => {
                registry.calls.remove(key);
                true
            }
            Some(_) => false,
        }
    }
}
