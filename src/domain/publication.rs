// src/domain/publication.rs
use serde::Serialize;

/// One publication plus the aggregates the ranking and recommendation
/// engines consume. Produced in a single batched query; aggregates default
/// to zero when the ledgers hold nothing for the row.
///
/// Status is one of pending / active / successful / expired; transitions
/// are owned by the lifecycle sweep in `jobs`, and only active rows reach
/// the engines.
#[derive(Debug, Clone, Serialize)]
pub struct PublicationSnapshot {
    pub id: i64,
    pub category: String,
    pub created_at: i64,
    pub amount: f64,
    pub total_donated: f64,
    /// Distinct viewers.
    pub total_views: i64,
    /// Distinct comments.
    pub total_comments: i64,
    /// Distinct commenting users, not the comment count.
    pub commenter_count: i64,
}
