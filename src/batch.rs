// Batch driver: one social image per session export row

use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::config::Config;
use crate::data::{SessionRecord, SessionTable};
use crate::preprocessor;
use crate::renderer::Renderer;
use crate::request::ImageRequest;

/// Built-in session card layout.
pub const DEFAULT_LAYOUT: &str = include_str!("../layouts/session.json");

/// Featured speaker name when a session lists nobody.
pub const NO_SPEAKER: &str = "TBC";

/// Fallback columns for layout variables that exports name differently.
const ALIASES: &[(&str, &[&str])] = &[
    ("session_title", &["name", "title"]),
    ("event_type", &["track"]),
    ("speakers", &["speaker"]),
    ("speaker_position", &["position"]),
    ("speaker_company", &["company"]),
];

/// Title sizes for the session card; titles of this many chars or more use the smaller one.
const TITLE_SIZE: u32 = 48;
const LONG_TITLE_SIZE: u32 = 44;
const LONG_TITLE_CHARS: usize = 40;

/// A request ready to render, with the variables it was expanded from.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub session_id: String,
    pub variables: HashMap<String, String>,
    pub request: ImageRequest,
}

#[derive(Debug)]
pub enum Planned {
    Render(SessionRequest),
    Skipped { reason: String },
    Invalid { session_id: String, error: anyhow::Error },
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub written: Vec<PathBuf>,
    pub skipped: usize,
    /// Session id and error message for each request that failed.
    pub failed: Vec<(String, String)>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct BatchJob {
    config: Config,
    layout: Value,
}

impl BatchJob {
    pub fn new(config: Config, layout: Value) -> Self {
        Self { config, layout }
    }

    pub fn from_layout_str(config: Config, layout: &str) -> Result<Self> {
        let layout: Value = serde_json::from_str(layout).context("Failed to parse layout JSON")?;
        Ok(Self::new(config, layout))
    }

    pub fn with_default_layout(config: Config) -> Result<Self> {
        Self::from_layout_str(config, DEFAULT_LAYOUT)
    }

    /// Plan one request per record, in table order.
    pub fn requests(&self, table: &SessionTable) -> Vec<Planned> {
        table.records().map(|record| self.plan(record)).collect()
    }

    fn plan(&self, record: SessionRecord) -> Planned {
        let mut variables: HashMap<String, String> = record.into_iter().collect();
        for (name, fallbacks) in ALIASES {
            if variables.contains_key(*name) {
                continue;
            }
            if let Some(value) = fallbacks.iter().find_map(|f| variables.get(*f)).cloned() {
                variables.insert(name.to_string(), value);
            }
        }

        let session_id = variables
            .get("session_id")
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        if session_id.is_empty() {
            let title = variables.get("session_title").map(String::as_str).unwrap_or("");
            tracing::warn!(title, "skipping session without a session_id");
            return Planned::Skipped {
                reason: "no session_id".to_string(),
            };
        }

        let track = variables.get("event_type").map(|t| t.trim()).unwrap_or("");
        if self.config.skip_tracks.iter().any(|skip| skip == track) {
            tracing::debug!(session_id = %session_id, track, "skipping track");
            return Planned::Skipped {
                reason: format!("track '{track}' is skipped"),
            };
        }

        let column = |name: &str| variables.get(name).map(String::as_str);
        let speaker = featured_speaker(column("speakers"));
        let speaker_image = self.speaker_image(variables.get("speaker_image"), &speaker);
        let credit = speaker_credit(
            column("speakers"),
            column("speaker_position"),
            column("speaker_company"),
        );
        let size = title_size(column("session_title").unwrap_or(""));
        variables.insert("speaker".to_string(), speaker);
        variables.insert("speaker_image".to_string(), speaker_image);
        variables.insert("speaker_credit".to_string(), credit);
        variables.insert("title_size".to_string(), size.to_string());

        match preprocessor::render_layout(&self.layout, &variables) {
            Ok(request) => Planned::Render(SessionRequest {
                session_id,
                variables,
                request,
            }),
            Err(error) => Planned::Invalid { session_id, error },
        }
    }

    /// Pick the photo for `speaker`: the record's own file, then a file
    /// named after the speaker, then the placeholder.
    fn speaker_image(&self, given: Option<&String>, speaker: &str) -> String {
        let given = given.map(|g| g.trim()).filter(|g| !g.is_empty());
        let by_name = Some(format!("{}.jpg", slugify(speaker)));
        given
            .map(str::to_string)
            .into_iter()
            .chain(by_name)
            .find(|name| self.config.image_path(name).is_file())
            .unwrap_or_else(|| self.config.placeholder_image.clone())
    }

    /// Render every planned request, continuing past failures.
    pub fn run(&self, renderer: &Renderer, table: &SessionTable) -> BatchReport {
        let mut report = BatchReport::default();
        for planned in self.requests(table) {
            match planned {
                Planned::Skipped { .. } => report.skipped += 1,
                Planned::Invalid { session_id, error } => {
                    tracing::error!(session_id = %session_id, error = %format!("{error:#}"), "invalid layout for session");
                    report.failed.push((session_id, format!("{error:#}")));
                }
                Planned::Render(item) => match self.render_with_fallback(renderer, &item) {
                    Ok(path) => report.written.push(path),
                    Err(error) => {
                        tracing::error!(session_id = %item.session_id, error = %format!("{error:#}"), "render failed");
                        report.failed.push((item.session_id, format!("{error:#}")));
                    }
                },
            }
        }
        tracing::info!(
            written = report.written.len(),
            skipped = report.skipped,
            failed = report.failed.len(),
            "batch finished"
        );
        report
    }

    /// Render once; if the speaker photo cannot be loaded, retry with the
    /// placeholder substituted.
    fn render_with_fallback(&self, renderer: &Renderer, item: &SessionRequest) -> Result<PathBuf> {
        let err = match renderer.create_image(&item.request) {
            Ok(path) => return Ok(path),
            Err(err) => err,
        };

        let placeholder = &self.config.placeholder_image;
        if !err.is_image_load() || item.variables.get("speaker_image") == Some(placeholder) {
            return Err(err.into());
        }

        tracing::warn!(session_id = %item.session_id, error = %err, "retrying with placeholder image");
        let mut variables = item.variables.clone();
        variables.insert("speaker_image".to_string(), placeholder.clone());
        let request = preprocessor::render_layout(&self.layout, &variables)?;
        renderer
            .create_image(&request)
            .with_context(|| format!("placeholder retry failed for '{}'", item.session_id))
    }
}

/// First of a comma-separated speaker list, or [`NO_SPEAKER`].
pub fn featured_speaker(speakers: Option<&str>) -> String {
    speakers
        .and_then(|s| s.split(',').map(str::trim).find(|s| !s.is_empty()))
        .unwrap_or(NO_SPEAKER)
        .to_string()
}

/// Credit line for every listed speaker, joined with ", ".
///
/// Speakers are comma-separated; positions and companies are `;`-separated
/// and matched to speakers by index. Each credit reads "Name, Position at
/// Company", "Name, Position" or "Name at Company". A company shorter than
/// three chars is only shown alongside a position.
pub fn speaker_credit(
    speakers: Option<&str>,
    positions: Option<&str>,
    companies: Option<&str>,
) -> String {
    let names: Vec<&str> = speakers
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if names.is_empty() {
        return NO_SPEAKER.to_string();
    }

    fn nth(list: Option<&str>, i: usize) -> &str {
        list.and_then(|l| l.split(';').nth(i)).map(str::trim).unwrap_or("")
    }

    names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let (position, company) = (nth(positions, i), nth(companies, i));
            let mut credit = name.to_string();
            if !position.is_empty() {
                credit.push_str(", ");
                credit.push_str(position);
                if !company.is_empty() {
                    credit.push_str(" at ");
                    credit.push_str(company);
                }
            } else if company.chars().count() > 2 {
                credit.push_str(" at ");
                credit.push_str(company);
            }
            credit
        })
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn title_size(title: &str) -> u32 {
    if title.trim().chars().count() < LONG_TITLE_CHARS {
        TITLE_SIZE
    } else {
        LONG_TITLE_SIZE
    }
}

/// Lowercase ASCII slug: alphanumerics kept, every other run becomes `-`.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut gap = false;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if gap && !slug.is_empty() {
                slug.push('-');
            }
            gap = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            gap = true;
        }
    }
    slug
}
