use crate::fetch::ThumbnailCache;
use crate::model::NormalizedReport;
use anyhow::{anyhow, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

const COLUMNS: [&str; 9] = [
    "id",
    "title",
    "occurred_at",
    "lat",
    "lng",
    "participants",
    "categories",
    "thumbnail_media_id",
    "thumbnail_url",
];

/// A report as written out, with its resolved thumbnail when there is one.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Row<'a> {
    #[serde(flatten)]
    report: &'a NormalizedReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    thumbnail_url: Option<String>,
}

fn rows<'a>(reports: &'a [NormalizedReport], thumbnails: &ThumbnailCache) -> Vec<Row<'a>> {
    reports
        .iter()
        .map(|report| Row {
            report,
            thumbnail_url: report.thumbnail_media_id.and_then(|id| thumbnails.get(id)),
        })
        .collect()
}

pub enum Writer {
    Stdout(Box<dyn Write>),
    JsonStdout(Box<dyn Write>),
    JsonFile(BufWriter<File>),
    JsonlFile(BufWriter<File>),
    CsvFile(BufWriter<File>),
    TsvFile(BufWriter<File>),
}

impl Writer {
    /// Thumbnail URLs come from `thumbnails`; ids it has not resolved are written without one.
    pub fn write_reports(
        &mut self,
        reports: &[NormalizedReport],
        thumbnails: &ThumbnailCache,
    ) -> Result<()> {
        let rows = rows(reports, thumbnails);
        match self {
            Writer::Stdout(writer) => {
                for row in &rows {
                    writeln!(writer, "{:#?}", row)?;
                }
            }
            Writer::JsonStdout(writer) => {
                serde_json::to_writer_pretty(&mut *writer, &rows)?;
                writeln!(writer)?;
            }
            Writer::JsonFile(writer) => {
                serde_json::to_writer_pretty(&mut *writer, &rows)?;
                writeln!(writer)?;
            }
            Writer::JsonlFile(writer) => {
                for row in &rows {
                    let serialized = serde_json::to_string(row)?;
                    writeln!(writer, "{}", serialized)?;
                }
            }
            Writer::CsvFile(writer) => {
                writeln!(writer, "{}", COLUMNS.join(","))?;
                for row in &rows {
                    let fields: Vec<String> = columns(row).iter().map(|f| escape_csv_field(f)).collect();
                    writeln!(writer, "{}", fields.join(","))?;
                }
            }
            Writer::TsvFile(writer) => {
                writeln!(writer, "{}", COLUMNS.join("\t"))?;
                for row in &rows {
                    let fields: Vec<String> = columns(row).iter().map(|f| escape_tsv_field(f)).collect();
                    writeln!(writer, "{}", fields.join("\t"))?;
                }
            }
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        match self {
            Writer::JsonFile(ref mut writer)
            | Writer::JsonlFile(ref mut writer)
            | Writer::CsvFile(ref mut writer)
            | Writer::TsvFile(ref mut writer) => {
                writer.flush()?;
            }
            Writer::Stdout(ref mut writer) | Writer::JsonStdout(ref mut writer) => {
                writer.flush()?;
            }
        }
        Ok(())
    }
}

fn columns(row: &Row<'_>) -> [String; 9] {
    let report = row.report;
    let opt = |v: Option<String>| v.unwrap_or_default();
    [
        report.id.to_string(),
        report.title.clone(),
        opt(report.occurred_at.clone()),
        opt(report.location.map(|l| l.lat.to_string())),
        opt(report.location.map(|l| l.lng.to_string())),
        opt(report.participant_count.map(|n| n.to_string())),
        report.categories.join("|"),
        opt(report.thumbnail_media_id.map(|n| n.to_string())),
        opt(row.thumbnail_url.clone()),
    ]
}

pub fn create_writer(output_arg: &str) -> Result<Writer> {
    match output_arg {
        "stdout" => Ok(Writer::Stdout(Box::new(io::stdout()))),
        "json" => Ok(Writer::JsonStdout(Box::new(io::stdout()))),
        path if path.ends_with(".json") => Ok(Writer::JsonFile(open(path)?)),
        path if path.ends_with(".jsonl") || path.ends_with(".ndjson") => {
            Ok(Writer::JsonlFile(open(path)?))
        }
        path if path.ends_with(".csv") => Ok(Writer::CsvFile(open(path)?)),
        path if path.ends_with(".tsv") => Ok(Writer::TsvFile(open(path)?)),
        path => {
            // Default to JSON file if it looks like a path
            if path.contains('/') || path.contains('\\') || path.contains('.') {
                Ok(Writer::JsonFile(open(path)?))
            } else {
                Err(anyhow!(
                    "Unknown output format: {}. Use 'stdout', 'json', or a file path",
                    output_arg
                ))
            }
        }
    }
}

fn open(path: &str) -> Result<BufWriter<File>> {
    create_parent_dirs(path)?;
    Ok(BufWriter::new(File::create(path)?))
}

fn create_parent_dirs(file_path: &str) -> Result<()> {
    if let Some(parent) = Path::new(file_path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn escape_csv_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn escape_tsv_field(field: &str) -> String {
    field
        .replace('\t', " ")
        .replace('\n', " ")
        .replace('\r', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::fetch::{MediaResolver, SessionContext};
    use crate::model::Location;

    fn sample() -> NormalizedReport {
        NormalizedReport {
            id: 3,
            title: "防災, 訓練".to_string(),
            content_text: String::new(),
            excerpt_text: None,
            occurred_at: Some("2025-09-01T00:00:00Z".to_string()),
            location: Some(Location { lat: 34.5, lng: 135.25 }),
            participant_count: Some(12),
            categories: vec!["a".to_string(), "b".to_string()],
            organization: None,
            thumbnail_media_id: None,
        }
    }

    #[test]
    fn csv_escapes_and_joins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/reports.csv");
        let path = path.to_str().unwrap();

        let mut writer = create_writer(path).unwrap();
        writer.write_reports(&[sample()], &ThumbnailCache::new()).unwrap();
        writer.finish().unwrap();

        let text = std::fs::read_to_string(path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("id,title,occurred_at,lat,lng,participants,categories,thumbnail_media_id,thumbnail_url")
        );
        assert_eq!(
            lines.next(),
            Some("3,\"防災, 訓練\",2025-09-01T00:00:00Z,34.5,135.25,12,a|b,,")
        );
    }

    #[test]
    fn json_file_is_an_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports.json");
        let path = path.to_str().unwrap();

        let mut writer = create_writer(path).unwrap();
        writer.write_reports(&[sample(), sample()], &ThumbnailCache::new()).unwrap();
        writer.finish().unwrap();

        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(parsed.as_array().map(Vec::len), Some(2));
        assert_eq!(parsed[0]["participantCount"], 12);
        assert!(parsed[0].get("thumbnailUrl").is_none());
    }

    #[tokio::test]
    async fn resolved_thumbnails_are_written() {
        struct Resolver;

        #[async_trait::async_trait]
        impl MediaResolver for Resolver {
            async fn resolve(&self, id: i64, _session: &SessionContext) -> Result<String, FetchError> {
                match id {
                    7 => Ok("https://img.example/7.jpg".to_string()),
                    _ => Err(FetchError::MissingSource { id }),
                }
            }
        }

        let mut with_media = sample();
        with_media.thumbnail_media_id = Some(7);
        let mut unresolved = sample();
        unresolved.id = 4;
        unresolved.thumbnail_media_id = Some(8);

        let thumbnails = ThumbnailCache::new();
        thumbnails
            .resolve_missing(&Resolver, &SessionContext::anonymous(), [7, 8])
            .await;

        let dir = tempfile::tempdir().unwrap();
        let tsv = dir.path().join("reports.tsv");
        let jsonl = dir.path().join("reports.jsonl");
        for path in [&tsv, &jsonl] {
            let mut writer = create_writer(path.to_str().unwrap()).unwrap();
            writer
                .write_reports(&[with_media.clone(), unresolved.clone()], &thumbnails)
                .unwrap();
            writer.finish().unwrap();
        }

        let text = std::fs::read_to_string(&tsv).unwrap();
        let rows: Vec<&str> = text.lines().skip(1).collect();
        assert!(rows[0].ends_with("\t7\thttps://img.example/7.jpg"));
        assert!(rows[1].ends_with("\t8\t"));

        let text = std::fs::read_to_string(&jsonl).unwrap();
        let first: serde_json::Value = serde_json::from_str(text.lines().next().unwrap()).unwrap();
        assert_eq!(first["thumbnailUrl"], "https://img.example/7.jpg");
        assert_eq!(first["thumbnailMediaId"], 7);
    }

    #[test]
    fn unknown_format_rejected() {
        assert!(create_writer("xml").is_err());
    }
}
