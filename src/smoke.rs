use serde_json::Value;
use tracing::{debug, error, info};

use crate::connection::Connector;
use crate::errors::ProbeError;
use crate::models::{CollectionName, DocumentId, IntegrityReport, ProbeDocument};
use crate::store::DocumentStore;

pub const DEFAULT_COLLECTION: &str = "test_collection";

pub const TROUBLESHOOTING_TIPS: [&str; 4] = [
    "Ensure Firebase credentials are properly configured",
    "Check your internet connection",
    "Verify Firestore is enabled in your Firebase project",
    "For local testing, start the Firebase emulator",
];

/// Process exit status when the run aborts before any step executes.
pub const FAILURE_EXIT_CODE: i32 = 1;

/// Text printed when the run aborts: the error, a hint when one applies,
/// and the numbered troubleshooting tips.
pub fn failure_message(error: &anyhow::Error) -> String {
    let mut lines = vec![format!("💥 Test failed with error: {}", error)];
    if let Some(action) = error.downcast_ref::<ProbeError>().and_then(ProbeError::suggested_action) {
        lines.push(format!("   Hint: {}", action));
    }
    lines.push(String::new());
    lines.push("🔧 Troubleshooting tips:".to_string());
    for (i, tip) in TROUBLESHOOTING_TIPS.iter().enumerate() {
        lines.push(format!("   {}. {}", i + 1, tip));
    }
    lines.join("\n")
}

#[derive(Debug, Clone)]
pub struct SmokeTestOptions {
    pub collection_name: CollectionName,
    /// Delete the probe after a successful read-back
    pub perform_cleanup: bool,
}

impl Default for SmokeTestOptions {
    fn default() -> Self {
        Self {
            collection_name: CollectionName::new(DEFAULT_COLLECTION).expect("default collection name is valid"),
            perform_cleanup: false,
        }
    }
}

/// What happened during one run
#[derive(Debug, Clone, Default)]
pub struct SmokeTestReport {
    pub project_id: Option<String>,
    pub collections: Vec<String>,
    pub document_id: Option<DocumentId>,
    pub read_back: Option<Value>,
    pub integrity: Option<IntegrityReport>,
    pub cleaned_up: bool,
}

impl SmokeTestReport {
    pub fn document_created(&self) -> bool {
        self.document_id.is_some()
    }

    pub fn integrity_passed(&self) -> bool {
        self.integrity.as_ref().is_some_and(IntegrityReport::passed)
    }

    pub fn print_summary(&self) {
        println!("📊 Summary");
        if let Some(project_id) = &self.project_id {
            println!("   Project: {}", project_id);
        }
        println!("   Collections seen: {}", self.collections.len());
        match &self.document_id {
            Some(id) => println!("   Probe document: {}", id),
            None => println!("   Probe document: not created"),
        }
        println!("   Read back: {}", if self.read_back.is_some() { "yes" } else { "no" });
        println!(
            "   Integrity: {}",
            match &self.integrity {
                Some(report) if report.passed() => "passed",
                Some(_) => "mismatched",
                None => "not checked",
            }
        );
        println!("   Cleaned up: {}", if self.cleaned_up { "yes" } else { "no" });
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Runs the connect, list, create, read, cleanup sequence.
///
/// Only connection failures abort the run. The other steps log their
/// error and hand the next step an empty result.
pub struct ConnectivitySmokeTest {
    options: SmokeTestOptions,
}

impl ConnectivitySmokeTest {
    pub fn new(options: SmokeTestOptions) -> Self {
        Self { options }
    }

    /// Establishes the connection, then runs every step against it.
    pub async fn execute(&self, connector: &Connector) -> Result<SmokeTestReport, ProbeError> {
        let connection = connector.establish().await?;
        println!();

        let mut report = self.run(connection.as_ref()).await;
        report.project_id = Some(connection.project_id().to_string());
        Ok(report)
    }

    pub async fn run(&self, store: &dyn DocumentStore) -> SmokeTestReport {
        let collection = &self.options.collection_name;
        let mut report = SmokeTestReport::default();

        println!("📂 Checking existing collections...");
        report.collections = self.enumerate_collections(store).await;
        println!();

        println!("📝 Creating test document in collection '{}'...", collection);
        let Some((document_id, written)) = self.create_probe_document(store, collection).await else {
            return report;
        };
        report.document_id = Some(document_id.clone());
        println!();

        println!("📖 Reading back the created document...");
        let read_back = self.read_back_document(store, collection, &document_id).await;
        println!();

        // A created-but-unread probe is left in place
        let Some(read_back) = read_back else {
            return report;
        };

        let integrity = written.verify(&read_back);
        if integrity.passed() {
            println!("✅ Data integrity check passed!");
        } else {
            println!("⚠️  Data integrity check found differences:");
            for field in &integrity.missing {
                println!("   - {} is missing", field);
            }
            for mismatch in &integrity.mismatched {
                println!(
                    "   - {}: wrote {} but read {}",
                    mismatch.field, mismatch.expected, mismatch.actual
                );
            }
        }
        report.read_back = Some(read_back);
        report.integrity = Some(integrity);

        if self.options.perform_cleanup {
            println!("🧹 Cleaning up test document...");
            report.cleaned_up = self.optional_cleanup(store, collection, &document_id).await;
        } else {
            println!("ℹ️  Test document preserved: {}/{}", collection, document_id);
        }

        report
    }

    /// Lists collections for diagnostics; an error yields an empty list.
    pub async fn enumerate_collections(&self, store: &dyn DocumentStore) -> Vec<String> {
        match store.list_collections().await {
            Ok(collections) => {
                println!("📂 Available collections: {:?}", collections);
                collections
            }
            Err(e) => {
                error!("❌ Error listing collections [{}]: {}", e.error_code(), e);
                println!("❌ Error listing collections: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn create_probe_document(
        &self,
        store: &dyn DocumentStore,
        collection: &CollectionName,
    ) -> Option<(DocumentId, ProbeDocument)> {
        let probe = ProbeDocument::now();

        match store.add_document(collection, &probe.to_fields()).await {
            Ok(stored) => {
                info!("Created probe document {}/{}", collection, stored.id);
                println!("✅ Document created successfully!");
                println!("   Collection: {}", collection);
                println!("   Document ID: {}", stored.id);
                println!("   Data: {}", pretty(&probe.to_json()));
                Some((stored.id, probe))
            }
            Err(e) => {
                error!("❌ Error creating document [{}]: {}", e.error_code(), e);
                println!("❌ Error creating document: {}", e);
                None
            }
        }
    }

    /// Fetches the document's decoded content; `None` when absent or on error.
    pub async fn read_back_document(
        &self,
        store: &dyn DocumentStore,
        collection: &CollectionName,
        document_id: &DocumentId,
    ) -> Option<Value> {
        match store.get_document(collection, document_id).await {
            Ok(Some(document)) => {
                let content = document.to_json();
                println!("✅ Document read successfully!");
                println!("   Document data: {}", pretty(&content));
                Some(content)
            }
            Ok(None) => {
                println!("❌ Document does not exist");
                None
            }
            Err(e) => {
                error!("❌ Error reading document [{}]: {}", e.error_code(), e);
                println!("❌ Error reading document: {}", e);
                None
            }
        }
    }

    /// Deletes the probe. Returns whether the delete succeeded.
    pub async fn optional_cleanup(
        &self,
        store: &dyn DocumentStore,
        collection: &CollectionName,
        document_id: &DocumentId,
    ) -> bool {
        match store.delete_document(collection, document_id).await {
            Ok(()) => {
                debug!("Deleted {}/{}", collection, document_id);
                println!("✅ Test document deleted successfully!");
                true
            }
            Err(e) => {
                error!("❌ Error deleting document [{}]: {}", e.error_code(), e);
                println!("❌ Error deleting document: {}", e);
                false
            }
        }
    }
}
