use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub document_id: String,
    pub name: String,
    pub quality: String,
    pub category: String,
}

impl DocumentRecord {
    pub fn new(
        document_id: impl Into<String>,
        name: impl Into<String>,
        quality: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            name: name.into(),
            quality: quality.into(),
            category: category.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct CommitteeMember {
    pub document_id: String,
    pub full_name: String,
}

/// Admin listing filter: free-text search over name or category, narrowed to
/// an optional set of exact categories. Built from the listing's query string,
/// where `category` may repeat; an empty category selects uncategorized rows.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordFilter {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub category: Vec<String>,
}

impl RecordFilter {
    pub fn matches(&self, record: &DocumentRecord) -> bool {
        let text_ok = match self.q.as_deref().map(str::trim) {
            Some(q) if !q.is_empty() => {
                let q = q.to_lowercase();
                record.name.to_lowercase().contains(&q)
                    || record.category.to_lowercase().contains(&q)
            }
            _ => true,
        };
        let category_ok = self.category.is_empty() || self.category.contains(&record.category);
        text_ok && category_ok
    }

    pub fn apply(&self, records: Vec<DocumentRecord>) -> Vec<DocumentRecord> {
        records.into_iter().filter(|r| self.matches(r)).collect()
    }
}

/// Distinct categories in first-seen order.
pub fn categories(records: &[DocumentRecord]) -> Vec<String> {
    let mut seen = Vec::new();
    for r in records {
        if !seen.contains(&r.category) {
            seen.push(r.category.clone());
        }
    }
    seen
}
