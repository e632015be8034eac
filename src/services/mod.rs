//! Service layer: table-backed data services and backend API clients.

pub mod ai_matching;
pub mod archives;
pub mod attachments;
pub mod backend_client;
pub mod details;
pub mod email_api;
pub mod email_templates;
pub mod engineers;
pub mod matching_history;
pub mod projects;
pub mod resume_parser;
pub mod runtime_config;

pub use ai_matching::AiMatchingClient;
pub use archives::ArchiveService;
pub use attachments::AttachmentService;
pub use backend_client::{BackendAuth, BackendClient};
pub use details::{DetailLookup, TenantDetails};
pub use email_api::{EmailApiClient, OutgoingEmail};
pub use email_templates::EmailTemplateService;
pub use engineers::EngineerService;
pub use matching_history::MatchingHistoryService;
pub use projects::ProjectService;
pub use resume_parser::ResumeParserClient;
pub use runtime_config::ConfigService;

/// Filter values the UI sends for "no filter".
pub fn is_filter_set(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && value != "all"
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use crate::business_client::BusinessClientManager;
    use crate::supabase::InMemoryTables;

    /// Manager bound to `tables` with a valid token.
    pub fn manager(tables: &InMemoryTables) -> Arc<BusinessClientManager> {
        let manager = BusinessClientManager::new(Arc::new(tables.clone()));
        manager.authorize("test-token", None);
        Arc::new(manager)
    }
}
