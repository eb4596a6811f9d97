// src/export.rs
//! XLSX export: one summary sheet over the whole day plus one sheet per
//! brand, in-memory, served as a download.

use std::collections::HashSet;
use std::io::Cursor;

use anyhow::{anyhow, Context, Result};

use crate::model::DailyRecord;

/// Filename prefix for exported workbooks.
pub const EXPORT_FILE_LABEL: &str = "article-data";
/// Excel caps sheet names at 31 characters.
const SHEET_NAME_MAX: usize = 31;

const SUMMARY_SHEET: &str = "Summary";
const SUMMARY_HEADERS: [&str; 7] = [
    "Brand", "Date", "Title", "Reads", "Likes", "Shares", "Position",
];
const BRAND_HEADERS: [&str; 7] = ["No.", "Date", "Title", "Reads", "Likes", "Shares", "Position"];

pub fn export_filename(date: &str) -> String {
    format!("{EXPORT_FILE_LABEL}_{date}.xlsx")
}

/// Strip characters Excel forbids in sheet names and cap the length.
pub fn sanitize_sheet_name(brand: &str) -> String {
    brand
        .chars()
        .filter(|c| !matches!(c, '\\' | '/' | '?' | '*' | '[' | ']'))
        .take(SHEET_NAME_MAX)
        .collect()
}

/// Build the workbook for one day's record and return the xlsx bytes.
pub fn export_workbook(record: &DailyRecord) -> Result<Vec<u8>> {
    let mut book = umya_spreadsheet::new_file();
    let mut used_names: HashSet<String> = HashSet::new();
    used_names.insert(SUMMARY_SHEET.to_string());

    {
        let summary = book
            .get_sheet_mut(&0)
            .ok_or_else(|| anyhow!("workbook has no default sheet"))?;
        summary.set_name(SUMMARY_SHEET);

        write_header_row(summary, &SUMMARY_HEADERS);
        let mut row: u32 = 2;
        for group in &record.brands {
            for card in &group.cards {
                for article in &card.articles {
                    summary.get_cell_mut((1, row)).set_value(group.brand.as_str());
                    summary.get_cell_mut((2, row)).set_value(card.date.as_str());
                    summary.get_cell_mut((3, row)).set_value(article.title.as_str());
                    summary
                        .get_cell_mut((4, row))
                        .set_value_number(article.reads as f64);
                    summary
                        .get_cell_mut((5, row))
                        .set_value_number(article.likes as f64);
                    summary
                        .get_cell_mut((6, row))
                        .set_value_number(article.shares.unwrap_or(0) as f64);
                    summary
                        .get_cell_mut((7, row))
                        .set_value(article.position_label.as_deref().unwrap_or(""));
                    row += 1;
                }
            }
        }
    }

    for group in &record.brands {
        let name = unique_sheet_name(&sanitize_sheet_name(&group.brand), &mut used_names);
        let sheet = book
            .new_sheet(&name)
            .map_err(|e| anyhow!("creating sheet {name:?}: {e}"))?;

        write_header_row(sheet, &BRAND_HEADERS);
        let mut row: u32 = 2;
        let mut no: u64 = 1;
        for card in &group.cards {
            for article in &card.articles {
                sheet.get_cell_mut((1, row)).set_value_number(no as f64);
                sheet.get_cell_mut((2, row)).set_value(card.date.as_str());
                sheet.get_cell_mut((3, row)).set_value(article.title.as_str());
                sheet
                    .get_cell_mut((4, row))
                    .set_value_number(article.reads as f64);
                sheet
                    .get_cell_mut((5, row))
                    .set_value_number(article.likes as f64);
                sheet
                    .get_cell_mut((6, row))
                    .set_value_number(article.shares.unwrap_or(0) as f64);
                sheet
                    .get_cell_mut((7, row))
                    .set_value(article.position_label.as_deref().unwrap_or(""));
                row += 1;
                no += 1;
            }
        }
    }

    let mut buf = Cursor::new(Vec::new());
    umya_spreadsheet::writer::xlsx::write_writer(&book, &mut buf)
        .context("serializing workbook")?;
    Ok(buf.into_inner())
}

fn write_header_row(sheet: &mut umya_spreadsheet::Worksheet, headers: &[&str]) {
    for (col, header) in headers.iter().enumerate() {
        let cell = sheet.get_cell_mut((col as u32 + 1, 1));
        cell.set_value(*header);
        cell.get_style_mut().get_font_mut().set_bold(true);
    }
}

/// Sanitized brands can collide (or sanitize to nothing); disambiguate
/// with a numeric suffix while staying inside the length cap.
fn unique_sheet_name(sanitized: &str, used: &mut HashSet<String>) -> String {
    let base = if sanitized.is_empty() {
        "Sheet".to_string()
    } else {
        sanitized.to_string()
    };
    if used.insert(base.clone()) {
        return base;
    }
    let mut n = 2u32;
    loop {
        let suffix = format!(" ({n})");
        let keep = SHEET_NAME_MAX.saturating_sub(suffix.chars().count());
        let mut candidate: String = base.chars().take(keep).collect();
        candidate.push_str(&suffix);
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}
