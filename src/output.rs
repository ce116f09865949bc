use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tokio::{fs::File, io::AsyncWriteExt};

use crate::parse::{flatten_categories, Record};
use crate::{warn_time, Config, Error, OutputError, Result};

const CSV_HEADER: [&str; 9] = [
    "Title",
    "Publication Date",
    "URL",
    "Type",
    "Language",
    "Categories",
    "Cover Image",
    "Publishers",
    "Authors",
];
const MARKDOWN_HEADER: [&str; 3] = ["Title", "Publication Date", "Categories"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub csv: PathBuf,
    pub markdown: PathBuf,
}

impl OutputPaths {
    pub fn for_run(config: &Config, date: NaiveDate) -> Self {
        let stem = if config.date_stamp {
            format!("{}-{}", config.file_stem, date.format("%Y-%m-%d"))
        } else {
            config.file_stem.clone()
        };
        Self {
            csv: config.output_dir.join(format!("{stem}.csv")),
            markdown: config.output_dir.join(format!("{stem}.md")),
        }
    }
}

/// Writes the CSV and Markdown files. Both are attempted even if one fails;
/// every failure ends up in the returned [`Error::Output`].
pub async fn write_outputs(
    config: &Config,
    records: &[Record],
    date: NaiveDate,
) -> Result<OutputPaths> {
    let paths = OutputPaths::for_run(config, date);

    let (csv_res, md_res) = tokio::join!(
        write_file(&paths.csv, render_csv(records)),
        write_file(&paths.markdown, render_markdown(records)),
    );

    let failures: Vec<OutputError> = [csv_res, md_res]
        .into_iter()
        .filter_map(|res| res.err())
        .inspect(|err| warn_time!("Error writing {err}"))
        .collect();
    if !failures.is_empty() {
        return Err(Error::Output(failures));
    }
    Ok(paths)
}

async fn write_file(path: &Path, contents: String) -> core::result::Result<(), OutputError> {
    let to_output_err = |source| OutputError {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::create(path).await.map_err(to_output_err)?;
    file.write_all(contents.as_bytes())
        .await
        .map_err(to_output_err)?;
    file.flush().await.map_err(to_output_err)
}

/// Header plus one 9-column row per record.
pub fn render_csv(records: &[Record]) -> String {
    let mut out = String::new();
    push_csv_row(&mut out, CSV_HEADER);
    for rec in records {
        let categories = flatten_categories(&rec.categories);
        let publishers = render_list(&rec.attributes.publishers);
        let authors = render_list(&rec.authors);
        push_csv_row(
            &mut out,
            [
                rec.title.as_str(),
                rec.attributes.publication_date.as_str(),
                rec.url.as_str(),
                rec.kind.as_str(),
                rec.language.as_str(),
                categories.as_str(),
                rec.cover_image.as_str(),
                publishers.as_str(),
                authors.as_str(),
            ],
        );
    }
    out
}

/// `| [title](url) | date | categories |` table.
pub fn render_markdown(records: &[Record]) -> String {
    let mut out = format!("| {} |\n", MARKDOWN_HEADER.join(" | "));
    out.push_str(&format!("| {} |\n", ["---"; 3].join(" | ")));
    for rec in records {
        out.push_str(&format!(
            "| [{}]({}) | {} | {} |\n",
            escape_cell(&rec.title),
            rec.url,
            escape_cell(&rec.attributes.publication_date),
            escape_cell(&flatten_categories(&rec.categories)),
        ));
    }
    out
}

/// `["a", "b"]` renders as `[a b]`.
fn render_list(items: &[String]) -> String {
    format!("[{}]", items.join(" "))
}

fn push_csv_row<'a>(out: &mut String, fields: impl IntoIterator<Item = &'a str>) {
    for (i, field) in fields.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        if needs_quotes(field) {
            out.push('"');
            out.push_str(&field.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(field);
        }
    }
    out.push('\n');
}

#[inline]
fn needs_quotes(field: &str) -> bool {
    field.starts_with(char::is_whitespace) || field.contains([',', '"', '\r', '\n'])
}

#[inline]
fn escape_cell(cell: &str) -> String {
    cell.replace('|', "\\|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::CustomAttributes;

    fn record() -> Record {
        Record {
            id: "1".into(),
            title: "Learning Go".into(),
            url: "https://example.com/go".into(),
            language: "en".into(),
            kind: "book".into(),
            categories: vec![
                vec!["Programming".into(), "Go".into()],
                vec!["Web".into()],
            ],
            cover_image: "https://example.com/go.jpg".into(),
            attributes: CustomAttributes {
                publishers: vec!["O'Reilly".into(), "Media".into()],
                publication_date: "2021-03-02".into(),
            },
            authors: vec!["Jon Bodner".into()],
            ..Record::default()
        }
    }

    #[test]
    fn empty_collection_is_header_only() {
        assert_eq!(
            render_csv(&[]),
            "Title,Publication Date,URL,Type,Language,Categories,Cover Image,Publishers,Authors\n"
        );
        assert_eq!(
            render_markdown(&[]),
            "| Title | Publication Date | Categories |\n| --- | --- | --- |\n"
        );
    }

    #[test]
    fn csv_row_has_nine_columns_in_order() {
        let csv = render_csv(&[record()]);
        let row = csv.lines().nth(1).unwrap();
        assert_eq!(
            row,
            "Learning Go,2021-03-02,https://example.com/go,book,en,Programming > Web,\
             https://example.com/go.jpg,[O'Reilly Media],[Jon Bodner]"
        );
    }

    #[test]
    fn csv_quotes_awkward_fields() {
        let rec = Record {
            title: "Go, \"Fast\"".into(),
            ..Record::default()
        };
        let csv = render_csv(&[rec]);
        assert!(csv.lines().nth(1).unwrap().starts_with("\"Go, \"\"Fast\"\"\","));
    }

    #[test]
    fn csv_quotes_leading_whitespace() {
        let rec = Record {
            title: "\tLead".into(),
            cover_image: " padded".into(),
            ..Record::default()
        };
        let csv = render_csv(&[rec]);
        let row = csv.lines().nth(1).unwrap();
        assert!(row.starts_with("\"\tLead\","));
        assert!(row.contains(",\" padded\","));
    }

    #[test]
    fn markdown_row_links_title() {
        let md = render_markdown(&[record()]);
        assert_eq!(
            md.lines().nth(2).unwrap(),
            "| [Learning Go](https://example.com/go) | 2021-03-02 | Programming > Web |"
        );
    }

    #[test]
    fn markdown_escapes_pipes() {
        let rec = Record {
            title: "A | B".into(),
            ..Record::default()
        };
        assert!(render_markdown(&[rec]).contains("[A \\| B]"));
    }

    #[test]
    fn file_names_are_date_stamped() {
        let config = Config {
            output_dir: "/tmp/out".into(),
            ..Config::default()
        };
        let date = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        let paths = OutputPaths::for_run(&config, date);
        assert_eq!(paths.csv, PathBuf::from("/tmp/out/oreilly-book-list-2024-12-31.csv"));
        assert_eq!(
            paths.markdown,
            PathBuf::from("/tmp/out/oreilly-book-list-2024-12-31.md")
        );

        let plain = Config {
            date_stamp: false,
            ..config
        };
        assert_eq!(
            OutputPaths::for_run(&plain, date).csv,
            PathBuf::from("/tmp/out/oreilly-book-list.csv")
        );
    }

    #[tokio::test]
    async fn both_write_failures_are_reported() {
        let config = Config {
            output_dir: "/nonexistent/catalog-pager/out".into(),
            ..Config::default()
        };
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        match write_outputs(&config, &[record()], date).await {
            Err(Error::Output(failures)) => assert_eq!(failures.len(), 2),
            other => panic!("expected output error, got {other:?}"),
        }
    }
}
