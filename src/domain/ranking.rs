// src/domain/ranking.rs
use std::collections::HashMap;

use serde::Serialize;

use crate::domain::publication::PublicationSnapshot;

pub const SECS_PER_DAY: i64 = 86_400;

/// Tunables for the top-publications score. The category baseline doubles
/// as the default average for categories with no donation history.
#[derive(Debug, Clone)]
pub struct RankingConfig {
    /// Only publications created within this trailing window are ranked.
    pub window_days: i64,
    /// Maximum number of results.
    pub limit: usize,
    pub donated_weight: f64,
    pub views_weight: f64,
    pub comments_weight: f64,
    pub category_baseline: f64,
    /// Per-day decay of the freshness factor.
    pub freshness_decay: f64,
    /// Freshness never drops below this.
    pub freshness_floor: f64,
    /// Distinct commenters per unit of engagement boost.
    pub engagement_divisor: f64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            window_days: 60,
            limit: 10,
            donated_weight: 0.5,
            views_weight: 0.3,
            comments_weight: 0.2,
            category_baseline: 50_000.0,
            freshness_decay: 0.01,
            freshness_floor: 0.5,
            engagement_divisor: 50.0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedPublication {
    pub id: i64,
    pub score: f64,
}

/// Age in whole days, never less than 1. The +1 keeps the donation-rate
/// divisor non-zero for publications created today, and the clamp keeps it
/// that way even if clock skew puts `created_at` in the future.
fn days_old(now: i64, created_at: i64) -> i64 {
    ((now - created_at) / SECS_PER_DAY).max(0) + 1
}

fn freshness_factor(days_old: i64, cfg: &RankingConfig) -> f64 {
    (1.0 - cfg.freshness_decay * days_old as f64).max(cfg.freshness_floor)
}

fn score(snap: &PublicationSnapshot, category_avg: f64, now: i64, cfg: &RankingConfig) -> f64 {
    let days = days_old(now, snap.created_at);
    let freshness = freshness_factor(days, cfg);
    let donation_rate = snap.total_donated / days as f64;
    let category_factor = 1.0 + (category_avg / cfg.category_baseline) * 0.2;
    let engagement_boost = 1.0 + snap.commenter_count as f64 / cfg.engagement_divisor;

    (snap.total_donated * cfg.donated_weight
        + snap.total_views as f64 * cfg.views_weight
        + snap.total_comments as f64 * cfg.comments_weight
        + donation_rate * cfg.donated_weight)
        * freshness
        * category_factor
        * engagement_boost
}

/// Score and order the given active-window snapshots, best first.
///
/// - publications with no donations, views, and comments are dropped;
/// - missing category averages fall back to the baseline;
/// - sort is stable, so equal scores keep their input order;
/// - at most `cfg.limit` results.
///
/// Pure read-path computation: no side effects, nothing to fail.
pub fn rank_top_publications(
    snapshots: &[PublicationSnapshot],
    category_averages: &HashMap<String, f64>,
    now: i64,
    cfg: &RankingConfig,
) -> Vec<RankedPublication> {
    let mut ranked: Vec<RankedPublication> = snapshots
        .iter()
        .filter(|s| s.total_donated > 0.0 || s.total_views > 0 || s.total_comments > 0)
        .map(|s| {
            let category_avg = category_averages
                .get(&s.category)
                .copied()
                .unwrap_or(cfg.category_baseline);
            RankedPublication {
                id: s.id,
                score: score(s, category_avg, now, cfg),
            }
        })
        .collect();

    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked.truncate(cfg.limit);
    ranked
}
