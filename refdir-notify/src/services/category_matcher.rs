//! Category Matcher
//!
//! Resolves the partners whose category links intersect a request's
//! categories. Status is not considered here.

use crate::db::categories;
use refdir_common::db::{Category, Request};
use refdir_common::Result;
use sqlx::SqlitePool;
use std::collections::BTreeSet;

/// Candidate partners for one request
#[derive(Debug, Clone, Default)]
pub struct CategoryMatch {
    /// Union of the request's category ids, primary first
    pub category_ids: Vec<String>,
    /// Category rows for the ids that exist, for rendering
    pub categories: Vec<Category>,
    /// Matched partner ids, each once
    pub partner_ids: BTreeSet<String>,
}

impl CategoryMatch {
    pub fn is_empty(&self) -> bool {
        self.partner_ids.is_empty()
    }
}

/// Union of the request's own category ids and the links stored for it
pub async fn request_category_ids(db: &SqlitePool, request: &Request) -> Result<Vec<String>> {
    let mut ids = request.category_ids();
    for id in categories::linked_category_ids(db, request.kind, &request.id).await? {
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

/// Find every partner linked to any of the request's categories
///
/// Any store error is returned as-is; the caller treats it as fatal to the
/// pass.
pub async fn match_partners(db: &SqlitePool, request: &Request) -> Result<CategoryMatch> {
    let category_ids = request_category_ids(db, request).await?;
    let partner_ids = categories::partner_ids_for_categories(db, &category_ids).await?;
    let categories = categories::load_categories(db, &category_ids).await?;

    tracing::debug!(
        request_id = %request.id,
        categories = category_ids.len(),
        candidates = partner_ids.len(),
        "Category match complete"
    );

    Ok(CategoryMatch {
        category_ids,
        categories,
        partner_ids,
    })
}
