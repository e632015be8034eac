//! Batch matching: enrichment of bulk-match rows and the screen session.

pub mod aggregate;
pub mod session;

pub use aggregate::{
    candidate_detail, case_detail, convert_bulk_matches_to_results, paginate, total_pages,
    RESULTS_PER_PAGE,
};
pub use session::{
    BatchMatchingPage, BatchMatchingSession, BatchSessions, BulkMatcher, RemoteMatcher,
};
