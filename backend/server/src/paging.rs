//! # Pagination
//!
//! `total` always counts every record matching the predicate, whatever page,
//! page size or ordering was asked for. Pages past the end come back empty with
//! the real total so the client can clamp itself.
use serde::Serialize;

use crate::{
    error::StoreError,
    fields::LIST_PROJECTION,
    query::Predicate,
    record::{Record, project},
    store::{DocumentStore, Ordering},
};

pub const DEFAULT_PAGE_SIZE: u32 = 24;
pub const MAX_PAGE_SIZE: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
    pub prefer_materials: bool,
}

impl PageRequest {
    /// Clamps `page` to at least 1 and `page_size` to `1..=200`.
    pub fn new(page: i64, page_size: i64, prefer_materials: bool) -> Self {
        Self {
            page: page.clamp(1, i64::from(u32::MAX)) as u32,
            page_size: page_size.clamp(1, i64::from(MAX_PAGE_SIZE)) as u32,
            prefer_materials,
        }
    }

    /// Reads raw query values, anything unparseable falls back to the default.
    pub fn from_params(
        page: Option<&str>,
        page_size: Option<&str>,
        prefer_materials: Option<&str>,
    ) -> Self {
        Self::new(
            parse_or(page, 1),
            parse_or(page_size, i64::from(DEFAULT_PAGE_SIZE)),
            prefer_materials == Some("1"),
        )
    }

    pub fn skip(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }
}

fn parse_or(raw: Option<&str>, default: i64) -> i64 {
    raw.and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub items: Vec<Record>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

pub async fn paginate(
    store: &dyn DocumentStore,
    filter: &Predicate,
    request: PageRequest,
) -> Result<Page, StoreError> {
    let ordering = if request.prefer_materials {
        Ordering::PreferMaterials
    } else {
        Ordering::Natural
    };

    let (records, total) = store
        .find_page(filter, ordering, request.skip(), u64::from(request.page_size))
        .await?;

    let items = records
        .into_iter()
        .map(|record| project(record, &LIST_PROJECTION))
        .collect();

    Ok(Page {
        items,
        total,
        page: request.page,
        page_size: request.page_size,
    })
}
