//! Shared test doubles for the integration suites.

#![allow(dead_code)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::new_without_default)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use passvault_core::{
    BiometricFailure, BiometricService, CredentialManager, ItemCategory, PreferencesService,
    StateGraphObserver, VaultError, VaultResult, WalletItem, WalletItemStore,
};
use passvault_secure_store::MemorySecureStore;

/// Installs the fmt subscriber once per test binary so `tracing` output
/// from the flows is visible under `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .try_init();
}

/// Scriptable biometric service double.
///
/// `authenticate` pops queued results and falls back to the configured
/// resting result once the queue is drained, mirroring the stubbed
/// initial/breaking values the flows are tested against.
pub struct MockBiometricService {
    collectable: Mutex<(bool, Option<BiometricFailure>)>,
    script: Mutex<VecDeque<Result<(), BiometricFailure>>>,
    resting: Mutex<Result<(), BiometricFailure>>,
    pending: AtomicBool,
    pub can_collect_calls: AtomicUsize,
    pub authenticate_calls: AtomicUsize,
}

impl MockBiometricService {
    pub fn new() -> Self {
        Self {
            collectable: Mutex::new((true, None)),
            script: Mutex::new(VecDeque::new()),
            resting: Mutex::new(Ok(())),
            pending: AtomicBool::new(false),
            can_collect_calls: AtomicUsize::new(0),
            authenticate_calls: AtomicUsize::new(0),
        }
    }

    pub fn stub_can_collect(&self, collectable: bool, failure: Option<BiometricFailure>) {
        *self.collectable.lock().expect("lock") = (collectable, failure);
    }

    /// Queues results returned by successive `authenticate` calls.
    pub fn push_results(&self, results: impl IntoIterator<Item = Result<(), BiometricFailure>>) {
        self.script.lock().expect("lock").extend(results);
    }

    /// Sets the result returned once the queue is drained.
    pub fn stub_resting(&self, result: Result<(), BiometricFailure>) {
        *self.resting.lock().expect("lock") = result;
    }

    /// Makes `authenticate` park forever, as a sensor that never answers.
    pub fn stub_pending(&self) {
        self.pending.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl BiometricService for MockBiometricService {
    fn can_collect(&self) -> (bool, Option<BiometricFailure>) {
        self.can_collect_calls.fetch_add(1, Ordering::SeqCst);
        *self.collectable.lock().expect("lock")
    }

    async fn authenticate(&self) -> Result<(), BiometricFailure> {
        self.authenticate_calls.fetch_add(1, Ordering::SeqCst);
        if self.pending.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.script
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or_else(|| *self.resting.lock().expect("lock"))
    }
}

/// Preference flags double.
pub struct MockPreferences {
    biometrics: AtomicBool,
    second_factor: AtomicBool,
}

impl MockPreferences {
    pub fn new(biometrics: bool, second_factor: bool) -> Self {
        Self {
            biometrics: AtomicBool::new(biometrics),
            second_factor: AtomicBool::new(second_factor),
        }
    }
}

impl PreferencesService for MockPreferences {
    fn biometrics_enabled(&self) -> bool {
        self.biometrics.load(Ordering::SeqCst)
    }

    fn code_second_factor_enabled(&self) -> bool {
        self.second_factor.load(Ordering::SeqCst)
    }
}

/// In-memory item collection store with the stateful category selector the
/// re-encryptor depends on. A category can be primed to fail `save` to
/// exercise the no-cross-category-atomicity contract.
pub struct MemoryItemStore {
    category: Mutex<ItemCategory>,
    shelves: Mutex<HashMap<ItemCategory, Vec<WalletItem>>>,
    fail_save_for: Mutex<Option<ItemCategory>>,
    pub save_calls: AtomicUsize,
}

impl MemoryItemStore {
    pub fn new() -> Self {
        Self {
            category: Mutex::new(ItemCategory::GenericPasswords),
            shelves: Mutex::new(HashMap::new()),
            fail_save_for: Mutex::new(None),
            save_calls: AtomicUsize::new(0),
        }
    }

    pub fn fail_save_for(&self, category: ItemCategory) {
        *self.fail_save_for.lock().expect("lock") = Some(category);
    }

    pub fn clear_save_fault(&self) {
        *self.fail_save_for.lock().expect("lock") = None;
    }

    /// Raw stored contents of a category, bypassing the selector.
    pub fn stored(&self, category: ItemCategory) -> Option<Vec<WalletItem>> {
        self.shelves.lock().expect("lock").get(&category).cloned()
    }
}

impl WalletItemStore for MemoryItemStore {
    fn category(&self) -> ItemCategory {
        *self.category.lock().expect("lock")
    }

    fn set_category(&self, category: ItemCategory) {
        *self.category.lock().expect("lock") = category;
    }

    fn items(&self) -> VaultResult<Option<Vec<WalletItem>>> {
        let category = self.category();
        Ok(self.shelves.lock().expect("lock").get(&category).cloned())
    }

    fn save(&self, items: Vec<WalletItem>) -> VaultResult<()> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        let category = self.category();
        if *self.fail_save_for.lock().expect("lock") == Some(category) {
            return Err(VaultError::ItemStore(format!(
                "stubbed save failure for {category}"
            )));
        }
        self.shelves.lock().expect("lock").insert(category, items);
        Ok(())
    }

    fn clear(&self) -> VaultResult<()> {
        let category = self.category();
        self.shelves.lock().expect("lock").remove(&category);
        Ok(())
    }
}

/// Observer that records `entered` and `leaving` notifications.
pub struct StateRecorder<S> {
    entered: Arc<Mutex<Vec<S>>>,
    leaving: Arc<Mutex<Vec<S>>>,
}

impl<S: Send> StateRecorder<S> {
    pub fn new() -> (Self, Arc<Mutex<Vec<S>>>) {
        let (recorder, entered, _) = Self::with_leaving();
        (recorder, entered)
    }

    /// Like `new`, additionally exposing the `leaving` notifications.
    pub fn with_leaving() -> (Self, Arc<Mutex<Vec<S>>>, Arc<Mutex<Vec<S>>>) {
        let entered = Arc::new(Mutex::new(Vec::new()));
        let leaving = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                entered: Arc::clone(&entered),
                leaving: Arc::clone(&leaving),
            },
            entered,
            leaving,
        )
    }
}

impl<S: Copy + Send> StateGraphObserver<S> for StateRecorder<S> {
    fn leaving(&mut self, state: S) {
        self.leaving.lock().expect("lock").push(state);
    }

    fn entered(&mut self, state: S) {
        self.entered.lock().expect("lock").push(state);
    }
}

/// A credential manager over a fresh in-memory store, seeded with a
/// credential derived from `code`.
pub fn seeded_credentials(code: &str) -> CredentialManager {
    let credentials = CredentialManager::new(Arc::new(MemorySecureStore::new()));
    let salt = credentials.random_salt();
    let key = credentials.derive(code, &salt).expect("derive");
    credentials.update(&key, &salt).expect("update");
    credentials
}
