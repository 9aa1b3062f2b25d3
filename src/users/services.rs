use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use super::dto::UserRecord;
use super::form::{CreateForm, EditingUser, Field};
use crate::alert::Alert;
use crate::store::DocumentStore;

pub const FETCH_USERS: &str = "fetch users";
pub const ADD_USER: &str = "add user";
pub const UPDATE_USER: &str = "update user";
pub const DELETE_USER: &str = "delete user";

/// Flips the loading flag on and back off when dropped, whatever the outcome.
struct LoadingGuard(Arc<watch::Sender<bool>>);

impl LoadingGuard {
    fn begin(flag: &Arc<watch::Sender<bool>>) -> Self {
        flag.send_replace(true);
        Self(Arc::clone(flag))
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.0.send_replace(false);
    }
}

/// State and remote operations behind the user directory screen.
///
/// Operations take `&mut self`, so at most one is in flight per screen. Each
/// mutation is followed by a full reload of the list; the local list is
/// never patched in place.
pub struct UserDirectory {
    store: Arc<dyn DocumentStore>,
    collection: String,
    users: Vec<UserRecord>,
    form: CreateForm,
    editing: Option<EditingUser>,
    loading: Arc<watch::Sender<bool>>,
    alerts: VecDeque<Alert>,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<String>) -> Self {
        let (loading, _) = watch::channel(false);
        Self {
            store,
            collection: collection.into(),
            users: Vec::new(),
            form: CreateForm::default(),
            editing: None,
            loading: Arc::new(loading),
            alerts: VecDeque::new(),
        }
    }

    pub fn users(&self) -> &[UserRecord] {
        &self.users
    }

    pub fn form(&self) -> &CreateForm {
        &self.form
    }

    pub fn editing(&self) -> Option<&EditingUser> {
        self.editing.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        *self.loading.borrow()
    }

    /// Observes `Idle <-> Loading` transitions.
    pub fn loading_updates(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }

    pub fn take_alerts(&mut self) -> Vec<Alert> {
        self.alerts.drain(..).collect()
    }

    pub fn set_field(&mut self, field: Field, value: impl Into<String>) {
        self.form.set(field, value);
    }

    /// Copies the record with `id` into the edit slot, replacing any
    /// edit in progress. Returns `false` if no such record is listed.
    pub fn start_edit(&mut self, id: &str) -> bool {
        let Some(record) = self.users.iter().find(|u| u.id == id) else {
            return false;
        };
        if let Some(previous) = self.editing.replace(EditingUser::from_record(record)) {
            debug!(previous = %previous.id, id, "edit target replaced");
        }
        true
    }

    /// Returns `false` when not in edit mode.
    pub fn edit_field(&mut self, field: Field, value: impl Into<String>) -> bool {
        match self.editing.as_mut() {
            Some(editing) => {
                editing.set(field, value);
                true
            }
            None => false,
        }
    }

    pub fn cancel_edit(&mut self) {
        self.editing = None;
    }

    /// Initial list load when the screen appears.
    pub async fn mount(&mut self) {
        self.fetch_users().await;
    }

    #[instrument(skip_all, fields(collection = %self.collection))]
    pub async fn fetch_users(&mut self) {
        let _loading = LoadingGuard::begin(&self.loading);
        if let Err(e) = self.reload().await {
            self.alerts.push_back(Alert::failure(FETCH_USERS, &e));
        }
    }

    #[instrument(skip_all, fields(collection = %self.collection))]
    pub async fn add_user(&mut self) {
        let fields = match self.form.submit() {
            Ok(f) => f,
            Err(e) => {
                warn!(error = %e, "add rejected");
                self.alerts.push_back(Alert::error(e.to_string()));
                return;
            }
        };

        let _loading = LoadingGuard::begin(&self.loading);
        match self
            .store
            .create_document(&self.collection, fields.into_fields())
            .await
        {
            Ok(doc) => {
                info!(id = %doc.id, "user added");
                self.alerts.push_back(Alert::success("User added successfully"));
                self.form.clear();
                self.refresh_after_mutation().await;
            }
            Err(e) => self.alerts.push_back(Alert::failure(ADD_USER, &e)),
        }
    }

    /// Saves the edit slot. Silently does nothing outside edit mode.
    #[instrument(skip_all, fields(collection = %self.collection))]
    pub async fn update_user(&mut self) {
        let Some(editing) = self.editing.as_ref() else {
            return;
        };
        let id = editing.id.clone();
        let fields = match editing.to_fields() {
            Ok(f) => f,
            Err(e) => {
                warn!(error = %e, %id, "update rejected");
                self.alerts.push_back(Alert::error(e.to_string()));
                return;
            }
        };

        let _loading = LoadingGuard::begin(&self.loading);
        match self
            .store
            .update_document(&self.collection, &id, fields.into_fields())
            .await
        {
            Ok(_) => {
                info!(%id, "user updated");
                self.alerts.push_back(Alert::success("User updated successfully"));
                self.editing = None;
                self.refresh_after_mutation().await;
            }
            Err(e) => self.alerts.push_back(Alert::failure(UPDATE_USER, &e)),
        }
    }

    #[instrument(skip(self), fields(collection = %self.collection))]
    pub async fn delete_user(&mut self, id: &str) {
        let _loading = LoadingGuard::begin(&self.loading);
        match self.store.delete_document(&self.collection, id).await {
            Ok(()) => {
                info!(id, "user deleted");
                self.alerts.push_back(Alert::success("User deleted successfully"));
                self.refresh_after_mutation().await;
            }
            Err(e) => self.alerts.push_back(Alert::failure(DELETE_USER, &e)),
        }
    }

    async fn refresh_after_mutation(&mut self) {
        if let Err(e) = self.reload().await {
            self.alerts.push_back(Alert::failure(FETCH_USERS, &e));
        }
    }

    /// Replaces the whole local list with the store's current contents.
    async fn reload(&mut self) -> anyhow::Result<()> {
        let documents = self.store.list_documents(&self.collection).await?;
        let mut users = Vec::with_capacity(documents.len());
        for doc in documents {
            match UserRecord::from_document(doc) {
                Ok(user) => users.push(user),
                Err(e) => warn!(error = %format!("{e:#}"), "skipping malformed user document"),
            }
        }
        debug!(count = users.len(), "user list reloaded");
        self.users = users;
        Ok(())
    }
}

#[cfg(test)]
mod directory_tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::alert::AlertKind;
    use crate::store::memory::MemoryStore;
    use crate::store::{Document, Fields, StoreError};

    /// Counts calls and records the loading flag seen by the store.
    #[derive(Default)]
    struct ProbeStore {
        inner: MemoryStore,
        calls: AtomicUsize,
        loading: Mutex<Option<watch::Receiver<bool>>>,
        seen_loading: Mutex<Vec<bool>>,
    }

    impl ProbeStore {
        fn observe(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(rx) = self.loading.lock().unwrap().as_ref() {
                self.seen_loading.lock().unwrap().push(*rx.borrow());
            }
        }
    }

    #[async_trait]
    impl DocumentStore for ProbeStore {
        async fn list_documents(&self, c: &str) -> anyhow::Result<Vec<Document>> {
            self.observe();
            self.inner.list_documents(c).await
        }
        async fn create_document(&self, c: &str, f: Fields) -> anyhow::Result<Document> {
            self.observe();
            self.inner.create_document(c, f).await
        }
        async fn update_document(&self, c: &str, id: &str, f: Fields) -> anyhow::Result<Document> {
            self.observe();
            self.inner.update_document(c, id, f).await
        }
        async fn delete_document(&self, c: &str, id: &str) -> anyhow::Result<()> {
            self.observe();
            self.inner.delete_document(c, id).await
        }
    }

    /// Every call fails with a structured store error.
    struct DeniedStore;

    #[async_trait]
    impl DocumentStore for DeniedStore {
        async fn list_documents(&self, _c: &str) -> anyhow::Result<Vec<Document>> {
            Err(denied())
        }
        async fn create_document(&self, _c: &str, _f: Fields) -> anyhow::Result<Document> {
            Err(denied())
        }
        async fn update_document(&self, _c: &str, _id: &str, _f: Fields) -> anyhow::Result<Document> {
            Err(denied())
        }
        async fn delete_document(&self, _c: &str, _id: &str) -> anyhow::Result<()> {
            Err(denied())
        }
    }

    fn denied() -> anyhow::Error {
        StoreError::Remote {
            code: "permission-denied".into(),
            message: "Missing or insufficient permissions.".into(),
        }
        .into()
    }

    /// Writes go through; once `lists_left` runs out every list fails.
    struct FlakyListStore {
        inner: MemoryStore,
        lists_left: AtomicUsize,
    }

    #[async_trait]
    impl DocumentStore for FlakyListStore {
        async fn list_documents(&self, c: &str) -> anyhow::Result<Vec<Document>> {
            let left = self.lists_left.load(Ordering::SeqCst);
            if left == 0 {
                anyhow::bail!("connection reset");
            }
            self.lists_left.store(left - 1, Ordering::SeqCst);
            self.inner.list_documents(c).await
        }
        async fn create_document(&self, c: &str, f: Fields) -> anyhow::Result<Document> {
            self.inner.create_document(c, f).await
        }
        async fn update_document(&self, c: &str, id: &str, f: Fields) -> anyhow::Result<Document> {
            self.inner.update_document(c, id, f).await
        }
        async fn delete_document(&self, c: &str, id: &str) -> anyhow::Result<()> {
            self.inner.delete_document(c, id).await
        }
    }

    fn directory(store: Arc<dyn DocumentStore>) -> UserDirectory {
        UserDirectory::new(store, "users")
    }

    fn fill(dir: &mut UserDirectory, name: &str, email: &str, age: &str) {
        dir.set_field(Field::Name, name);
        dir.set_field(Field::Email, email);
        dir.set_field(Field::Age, age);
    }

    async fn seeded(store: &Arc<ProbeStore>, name: &str, age: i64) -> String {
        let fields = json!({"name": name, "email": format!("{name}@x.com"), "age": age})
            .as_object()
            .cloned()
            .unwrap();
        store.inner.create_document("users", fields).await.unwrap().id
    }

    #[tokio::test]
    async fn add_edit_save_delete_scenario() {
        let store = Arc::new(ProbeStore::default());
        let mut dir = directory(store.clone());
        dir.mount().await;
        assert!(dir.users().is_empty());

        fill(&mut dir, "Alice", "alice@x.com", "30");
        dir.add_user().await;
        assert_eq!(dir.take_alerts(), vec![Alert::success("User added successfully")]);
        assert_eq!(dir.form(), &CreateForm::default());
        assert_eq!(dir.users().len(), 1);
        let alice = dir.users()[0].clone();
        assert_eq!((alice.name.as_str(), alice.email.as_str(), alice.age), ("Alice", "alice@x.com", 30));
        assert_eq!(alice.id.len(), 20);

        assert!(dir.start_edit(&alice.id));
        assert!(dir.edit_field(Field::Age, "31"));
        dir.update_user().await;
        assert_eq!(dir.take_alerts(), vec![Alert::success("User updated successfully")]);
        assert!(dir.editing().is_none());
        assert_eq!(dir.users()[0].age, 31);
        assert_eq!(dir.users()[0].id, alice.id);

        dir.delete_user(&alice.id).await;
        assert_eq!(dir.take_alerts(), vec![Alert::success("User deleted successfully")]);
        assert!(dir.users().is_empty());
        assert!(store.inner.list_documents("users").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn add_with_missing_field_makes_no_remote_call() {
        let store = Arc::new(ProbeStore::default());
        let mut dir = directory(store.clone());
        dir.mount().await;
        let calls = store.calls.load(Ordering::SeqCst);

        for (n, e, a) in [("", "a@x.com", "1"), ("A", "", "1"), ("A", "a@x.com", "")] {
            fill(&mut dir, n, e, a);
            dir.add_user().await;
            assert_eq!(dir.take_alerts(), vec![Alert::error("Please fill all fields")]);
        }

        assert_eq!(store.calls.load(Ordering::SeqCst), calls);
        assert!(dir.users().is_empty());
        assert!(!dir.is_loading());
    }

    #[tokio::test]
    async fn non_numeric_age_is_rejected_before_the_store() {
        let store = Arc::new(ProbeStore::default());
        let mut dir = directory(store.clone());
        fill(&mut dir, "Alice", "alice@x.com", "abc");
        dir.add_user().await;

        assert_eq!(dir.take_alerts(), vec![Alert::error("Age must be a whole number")]);
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
        assert_eq!(dir.form().age, "abc");
    }

    #[tokio::test]
    async fn cancel_leaves_the_stored_record_untouched() {
        let store = Arc::new(ProbeStore::default());
        let id = seeded(&store, "ann", 20).await;
        let before = store.inner.get("users", &id).await.unwrap();

        let mut dir = directory(store.clone());
        dir.mount().await;
        let calls = store.calls.load(Ordering::SeqCst);
        assert!(dir.start_edit(&id));
        dir.edit_field(Field::Name, "Changed");
        dir.cancel_edit();

        assert!(dir.editing().is_none());
        assert_eq!(store.calls.load(Ordering::SeqCst), calls);
        assert_eq!(store.inner.get("users", &id).await.unwrap(), before);
    }

    #[tokio::test]
    async fn editing_another_record_discards_pending_edits() {
        let store = Arc::new(ProbeStore::default());
        let a = seeded(&store, "ann", 20).await;
        let b = seeded(&store, "ben", 40).await;

        let mut dir = directory(store.clone());
        dir.mount().await;
        dir.start_edit(&a);
        dir.edit_field(Field::Name, "Unsaved");
        dir.start_edit(&b);
        assert_eq!(dir.editing().unwrap().id, b);

        dir.update_user().await;
        let ann = store.inner.get("users", &a).await.unwrap();
        assert_eq!(ann.fields["name"], json!("ann"));
        assert!(dir.users().iter().all(|u| u.name != "Unsaved"));
    }

    #[tokio::test]
    async fn update_without_edit_slot_is_a_silent_no_op() {
        let store = Arc::new(ProbeStore::default());
        let mut dir = directory(store.clone());
        dir.update_user().await;
        assert!(dir.take_alerts().is_empty());
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
        assert!(!dir.start_edit("nope"));
        assert!(!dir.edit_field(Field::Age, "3"));
    }

    #[tokio::test]
    async fn loading_is_set_during_calls_and_reset_after() {
        let store = Arc::new(ProbeStore::default());
        let mut dir = directory(store.clone());
        *store.loading.lock().unwrap() = Some(dir.loading_updates());

        dir.mount().await;
        fill(&mut dir, "Alice", "alice@x.com", "30");
        dir.add_user().await;

        // mount list, create, trailing list
        assert_eq!(*store.seen_loading.lock().unwrap(), vec![true, true, true]);
        assert!(!dir.is_loading());
    }

    #[tokio::test]
    async fn store_failure_alerts_and_keeps_user_input() {
        let mut dir = directory(Arc::new(DeniedStore));
        dir.mount().await;
        assert_eq!(
            dir.take_alerts(),
            vec![Alert::error(
                "Failed to fetch users: Store error (permission-denied): Missing or insufficient permissions."
            )]
        );

        fill(&mut dir, "Alice", "alice@x.com", "30");
        dir.add_user().await;
        let alerts = dir.take_alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::Error);
        assert!(alerts[0].message.starts_with("Failed to add user: Store error (permission-denied)"));
        assert_eq!(dir.form().name, "Alice");
        assert!(!dir.is_loading());

        dir.delete_user("x").await;
        assert!(dir.take_alerts()[0].message.starts_with("Failed to delete user:"));
    }

    #[tokio::test]
    async fn failed_save_keeps_the_edit_slot() {
        let store = Arc::new(ProbeStore::default());
        let id = seeded(&store, "ann", 20).await;
        let mut dir = directory(store.clone());
        dir.mount().await;
        dir.start_edit(&id);
        store.inner.delete_document("users", &id).await.unwrap();

        dir.update_user().await;
        let alerts = dir.take_alerts();
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].message.starts_with("Failed to update user: Store error (not-found)"));
        assert_eq!(dir.editing().map(|e| e.id.as_str()), Some(id.as_str()));
    }

    #[tokio::test]
    async fn malformed_documents_are_skipped() {
        let store = Arc::new(ProbeStore::default());
        seeded(&store, "ann", 20).await;
        store
            .inner
            .create_document("users", json!({"name": "no age"}).as_object().cloned().unwrap())
            .await
            .unwrap();

        let mut dir = directory(store);
        dir.mount().await;
        assert_eq!(dir.users().len(), 1);
        assert_eq!(dir.users()[0].name, "ann");
        assert!(dir.take_alerts().is_empty());
    }

    #[tokio::test]
    async fn failed_refresh_after_add_keeps_success_and_previous_list() {
        let store = Arc::new(FlakyListStore {
            inner: MemoryStore::new(),
            lists_left: AtomicUsize::new(1),
        });
        let mut dir = directory(store.clone());

        fill(&mut dir, "Ann", "ann@x.com", "20");
        dir.add_user().await;
        assert_eq!(dir.users().len(), 1);
        dir.take_alerts();
        let before = dir.users().to_vec();

        fill(&mut dir, "Ben", "ben@x.com", "40");
        dir.add_user().await;
        assert_eq!(
            dir.take_alerts(),
            vec![
                Alert::success("User added successfully"),
                Alert::error("Failed to fetch users: connection reset"),
            ]
        );
        assert_eq!(dir.users(), before.as_slice());
        assert_eq!(store.inner.len("users").await, 2);
        assert_eq!(dir.form(), &CreateForm::default());
        assert!(!dir.is_loading());
    }
}
