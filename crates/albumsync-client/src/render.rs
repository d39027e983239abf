//! Plain-text rendering for terminal output.

use std::borrow::Cow;
use std::fmt::Write;

use albumsync_core::{AlbumSummary, ImportedAlbum};
use albumsync_protocol::StatusInfo;

use crate::driver::BulkSummary;

const MAX_TITLE_WIDTH: usize = 40;

/// Truncates to `max_len` characters, ending with `…` when shortened.
pub fn ellipsis(s: &str, max_len: usize) -> Cow<'_, str> {
    if s.chars().count() <= max_len {
        return Cow::Borrowed(s);
    }
    let kept: String = s.chars().take(max_len.saturating_sub(1)).collect();
    Cow::Owned(format!("{kept}…"))
}

fn table(header: &[&str], rows: Vec<Vec<String>>) -> String {
    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let mut line = |cells: Vec<&str>| {
        let mut text = String::new();
        for (i, (cell, width)) in cells.iter().zip(&widths).enumerate() {
            if i > 0 {
                text.push_str("  ");
            }
            let pad = width.saturating_sub(cell.chars().count());
            text.push_str(cell);
            text.extend(std::iter::repeat_n(' ', pad));
        }
        let _ = writeln!(out, "{}", text.trim_end());
    };

    line(header.to_vec());
    for row in &rows {
        line(row.iter().map(String::as_str).collect());
    }
    out
}

/// Table of a browse listing, or a one-line note when empty.
pub fn album_table(albums: &[AlbumSummary]) -> String {
    if albums.is_empty() {
        return "No albums.\n".to_string();
    }
    let rows = albums
        .iter()
        .map(|album| {
            vec![
                album.external_id.clone(),
                ellipsis(album.display_title(), MAX_TITLE_WIDTH).into_owned(),
                album.media_count.map_or_else(|| "-".into(), |n| n.to_string()),
                album
                    .created_at
                    .map_or_else(|| "-".into(), |at| at.format("%Y-%m-%d").to_string()),
            ]
        })
        .collect();
    table(&["ID", "TITLE", "ITEMS", "CREATED"], rows)
}

pub fn imported_table(albums: &[ImportedAlbum]) -> String {
    if albums.is_empty() {
        return "Nothing imported yet.\n".to_string();
    }
    let rows = albums
        .iter()
        .map(|album| {
            vec![
                album.local_id.to_string(),
                ellipsis(&album.title, MAX_TITLE_WIDTH).into_owned(),
                album.photo_count.to_string(),
                album.source_date.format("%Y-%m-%d").to_string(),
                if album.has_cover() { "yes" } else { "no" }.to_string(),
            ]
        })
        .collect();
    table(&["#", "TITLE", "PHOTOS", "DATE", "COVER"], rows)
}

pub fn status(info: &StatusInfo) -> String {
    format!(
        "source:        {} ({})\n\
         authenticated: {}\n\
         imported:      {}\n\
         uptime:        {}s\n",
        info.source,
        info.mode,
        if info.authenticated { "yes" } else { "no" },
        info.imported_count,
        info.uptime_seconds
    )
}

/// Counts line followed by one line per failed id.
pub fn bulk_summary(summary: &BulkSummary) -> String {
    let mut out = format!(
        "{} attempted: {} imported, {} already present, {} failed\n",
        summary.attempted, summary.imported, summary.already_present, summary.failed
    );
    for failure in &summary.failures {
        let _ = writeln!(out, "  {}: {}", failure.external_id, failure.message);
    }
    if summary.cancelled {
        out.push_str("cancelled before all albums were tried\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    use crate::driver::BulkFailure;

    #[test]
    fn ellipsis_truncates_by_chars() {
        assert_eq!(ellipsis("short", 10), "short");
        assert_eq!(ellipsis("exactly10!", 10), "exactly10!");
        assert_eq!(ellipsis("Grandma's 90th birthday", 10), "Grandma's…");
        assert_eq!(ellipsis("été à Paris", 4), "été…");
    }

    #[test]
    fn album_table_aligns_columns() {
        let albums = vec![
            AlbumSummary::new("demo-album-01", "Summer at the Lake #1")
                .with_media_count(5)
                .with_created_at(Utc.with_ymd_and_hms(2019, 1, 1, 12, 0, 0).unwrap()),
            AlbumSummary::new("AF2", "Trip"),
        ];
        let expected = "\
ID             TITLE                  ITEMS  CREATED
demo-album-01  Summer at the Lake #1  5      2019-01-01
AF2            Trip                   -      -
";
        assert_eq!(album_table(&albums), expected);
        assert_eq!(album_table(&[]), "No albums.\n");
    }

    #[test]
    fn summary_lists_failures() {
        let summary = BulkSummary {
            attempted: 3,
            imported: 1,
            already_present: 1,
            failed: 1,
            failures: vec![BulkFailure {
                external_id: "AF3".into(),
                message: "timeout: reading response".into(),
            }],
            cancelled: false,
        };
        assert_eq!(
            bulk_summary(&summary),
            "3 attempted: 1 imported, 1 already present, 1 failed\n  AF3: timeout: reading response\n"
        );
        insta::assert_json_snapshot!(summary, @r###"
        {
          "attempted": 3,
          "imported": 1,
          "already_present": 1,
          "failed": 1,
          "failures": [
            {
              "external_id": "AF3",
              "message": "timeout: reading response"
            }
          ],
          "cancelled": false
        }
        "###);
    }
}
