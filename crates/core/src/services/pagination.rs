//! Cursor pagination input shared by the listing operations.

use serde::Deserialize;
use validator::Validate;
use vitrine_common::{AppResult, RelationsConfig};

/// A page request: optional size and an exclusive `until_id` cursor.
///
/// Results are ordered newest first; pass the last ID of a page as
/// `until_id` to fetch the next one.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PageInput {
    #[validate(range(min = 1))]
    pub limit: Option<u64>,
    /// Engine IDs are 26-character ULIDs.
    #[validate(length(equal = 26))]
    pub until_id: Option<String>,
}

impl PageInput {
    /// First page with the configured default size.
    #[must_use]
    pub const fn first() -> Self {
        Self {
            limit: None,
            until_id: None,
        }
    }

    /// Page of at most `limit` entries.
    #[must_use]
    pub const fn with_limit(limit: u64) -> Self {
        Self {
            limit: Some(limit),
            until_id: None,
        }
    }

    /// Continue after `until_id`.
    #[must_use]
    pub fn until(mut self, until_id: impl Into<String>) -> Self {
        self.until_id = Some(until_id.into());
        self
    }

    /// Validate and resolve against the configured bounds.
    pub(crate) fn resolve<'a>(
        &'a self,
        config: &RelationsConfig,
    ) -> AppResult<(u64, Option<&'a str>)> {
        self.validate()?;
        Ok((config.page_size(self.limit), self.until_id.as_deref()))
    }
}
