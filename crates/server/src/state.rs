use std::sync::Arc;

use bioskop_core::{
    AuditHandle, AuditStore, Authenticator, Config, SanitizedConfig, SchemaStore,
    TransactionStore,
};
use chrono_tz::Tz;

/// Shared application state
pub struct AppState {
    config: Config,
    authenticator: Arc<dyn Authenticator>,
    audit: AuditHandle,
    audit_store: Arc<dyn AuditStore>,
    transactions: Arc<dyn TransactionStore>,
    schema: Arc<SchemaStore>,
}

impl AppState {
    pub fn new(
        config: Config,
        authenticator: Arc<dyn Authenticator>,
        audit: AuditHandle,
        audit_store: Arc<dyn AuditStore>,
        transactions: Arc<dyn TransactionStore>,
        schema: Arc<SchemaStore>,
    ) -> Self {
        Self {
            config,
            authenticator,
            audit,
            audit_store,
            transactions,
            schema,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn authenticator(&self) -> &dyn Authenticator {
        self.authenticator.as_ref()
    }

    pub fn audit(&self) -> &AuditHandle {
        &self.audit
    }

    pub fn audit_store(&self) -> &dyn AuditStore {
        self.audit_store.as_ref()
    }

    pub fn transactions(&self) -> &dyn TransactionStore {
        self.transactions.as_ref()
    }

    pub fn schema(&self) -> &SchemaStore {
        &self.schema
    }

    /// Zone for server "now" and for client times without an offset.
    pub fn timezone(&self) -> Tz {
        self.config.app.tz()
    }
}
