use scraper::{ElementRef, Selector};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::dom::{self, RenderedPage};
use crate::error::Result;
use crate::extract::normalize;
use crate::record::PartEntry;
use crate::session::{self, PageSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartColumn {
    PartNumber,
    Description,
    Quantity,
}

#[derive(Debug, Clone)]
pub struct ColumnSpec {
    pub column: PartColumn,
    /// Selector for the cell, relative to the row.
    pub cell: String,
}

/// How to find the parts rows and read each one.
#[derive(Debug, Clone)]
pub struct RowSchema {
    pub rows: String,
    pub columns: Vec<ColumnSpec>,
}

impl RowSchema {
    /// Part number, description, quantity in the first three cells.
    pub fn standard(rows: &str) -> Self {
        let col = |column, n: usize| ColumnSpec {
            column,
            cell: format!("td:nth-child({n})"),
        };
        Self {
            rows: rows.to_string(),
            columns: vec![
                col(PartColumn::PartNumber, 1),
                col(PartColumn::Description, 2),
                col(PartColumn::Quantity, 3),
            ],
        }
    }
}

/// Open the parts tab of `product_url` and read its rows. Never fails:
/// a tab that cannot be opened yields an empty list.
pub async fn extract_parts<S: PageSession + ?Sized>(
    session: &mut S,
    product_url: &Url,
    fragment: &str,
    schema: &RowSchema,
) -> Vec<PartEntry> {
    let tab = session::with_fragment(product_url, fragment);
    if let Err(e) = session.goto(&tab).await {
        error!("Failed to open parts tab {}: {}", tab, e);
        return Vec::new();
    }

    let parsed = session.snapshot().and_then(|page| decode_rows(&page, schema));
    match parsed {
        Ok(parts) => parts,
        Err(e) => {
            error!("Failed to read parts table on {}: {}", tab, e);
            Vec::new()
        }
    }
}

/// Decode every row the schema selects, dropping rows that do not decode.
pub fn decode_rows(page: &RenderedPage, schema: &RowSchema) -> Result<Vec<PartEntry>> {
    let cells = schema
        .columns
        .iter()
        .map(|c| dom::selector(&c.cell).map(|sel| (c.column, sel)))
        .collect::<Result<Vec<_>>>()?;

    let rows = page.locate_all(&schema.rows)?;
    debug!("{} rows found in parts table", rows.len());

    let mut parts = Vec::with_capacity(rows.len());
    for (i, row) in rows.into_iter().enumerate() {
        match decode_row(row, &cells) {
            Ok(part) => {
                info!(
                    "Part Number: {} | Description: {} | Quantity: {}",
                    part.part_number, part.description, part.quantity
                );
                parts.push(part);
            }
            Err(reason) => warn!("Skipping parts row {}: {}", i + 1, reason),
        }
    }
    Ok(parts)
}

fn decode_row(
    row: ElementRef<'_>,
    cells: &[(PartColumn, Selector)],
) -> std::result::Result<PartEntry, String> {
    let mut part_number = None;
    let mut description = None;
    let mut quantity = None;

    for (column, sel) in cells {
        let text = row
            .select(sel)
            .next()
            .map(|cell| dom::inner_text(cell).trim().to_string())
            .ok_or_else(|| format!("no {:?} cell", column))?;

        match column {
            PartColumn::PartNumber => part_number = Some(text),
            PartColumn::Description => description = Some(text),
            PartColumn::Quantity => {
                let n = normalize::quantity(&text)
                    .ok_or_else(|| format!("bad quantity {:?}", text))?;
                quantity = Some(n);
            }
        }
    }

    match (part_number, description, quantity) {
        (Some(part_number), Some(description), Some(quantity)) => Ok(PartEntry {
            part_number,
            description,
            quantity,
        }),
        _ => Err("schema does not cover every column".into()),
    }
}
