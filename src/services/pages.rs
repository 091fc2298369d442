// src/services/pages.rs

//! Page-model adapters for the known portal layouts.
//!
//! All markup coupling (class names, tag nesting) lives here, one adapter
//! per page. Selectors come from configuration so upstream markup drift is
//! isolated to one seam, and each adapter is tested against HTML fixtures.

use std::collections::BTreeMap;

use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{
    FormDescriptor, InputField, PageSelectors, ReportState, SelectOption, StatusRecord, Step,
};
use crate::utils::resolve;

/// Parse a CSS selector string into a `Selector`.
fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

/// Collected, whitespace-trimmed text of an element.
fn element_text(element: &ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Adapter for the student listing page carrying the report request form.
pub struct FormPageModel {
    action_fragment: String,
    form_sel: Selector,
    input_sel: Selector,
    select_sel: Selector,
    option_sel: Selector,
    meta_csrf_sel: Selector,
}

impl FormPageModel {
    /// Create an adapter locating the form whose action contains `fragment`.
    pub fn new(fragment: &str) -> Result<Self> {
        Ok(Self {
            action_fragment: fragment.to_string(),
            form_sel: parse_selector("form")?,
            input_sel: parse_selector("input")?,
            select_sel: parse_selector("select")?,
            option_sel: parse_selector("option")?,
            meta_csrf_sel: parse_selector(r#"meta[name="csrf-token"]"#)?,
        })
    }

    /// Extract the listing form's structure from a page.
    ///
    /// Fails with a structure error when no form action matches the
    /// configured fragment.
    pub fn extract(&self, document: &Html) -> Result<FormDescriptor> {
        let form = document
            .select(&self.form_sel)
            .find(|f| {
                f.value()
                    .attr("action")
                    .is_some_and(|action| action.contains(&self.action_fragment))
            })
            .ok_or_else(|| {
                AppError::structure(
                    "form_page",
                    format!("no form with action containing '{}'", self.action_fragment),
                )
            })?;

        let mut descriptor = FormDescriptor {
            action: form.value().attr("action").unwrap_or("").to_string(),
            method: form
                .value()
                .attr("method")
                .unwrap_or("post")
                .to_lowercase(),
            ..FormDescriptor::default()
        };

        for input in form.select(&self.input_sel) {
            let Some(name) = input.value().attr("name") else {
                continue;
            };
            descriptor.inputs.insert(
                name.to_string(),
                InputField {
                    kind: input.value().attr("type").unwrap_or("text").to_string(),
                    value: input.value().attr("value").unwrap_or("").to_string(),
                },
            );
        }

        for select in form.select(&self.select_sel) {
            let Some(name) = select.value().attr("name") else {
                continue;
            };
            let options = select
                .select(&self.option_sel)
                .map(|option| SelectOption {
                    value: option.value().attr("value").unwrap_or("").to_string(),
                    text: element_text(&option),
                    selected: option.value().attr("selected").is_some(),
                })
                .collect();
            descriptor.selects.insert(name.to_string(), options);
        }

        // Anti-forgery tokens: hidden form input and page-level meta tag.
        descriptor.authenticity_token = descriptor
            .inputs
            .get("authenticity_token")
            .map(|input| input.value.clone());
        descriptor.csrf_token = document
            .select(&self.meta_csrf_sel)
            .next()
            .and_then(|meta| meta.value().attr("content"))
            .map(str::to_string);

        log::info!(
            "Form extracted with {} inputs and {} selects",
            descriptor.inputs.len(),
            descriptor.selects.len()
        );
        Ok(descriptor)
    }
}

/// Adapter for the report status page.
pub struct StatusPageModel {
    h1_sel: Selector,
    steps_bar_sel: Selector,
    step_sel: Selector,
    label_done_sel: Selector,
    label_active_sel: Selector,
    details_card_sel: Selector,
    detail_pair_sel: Selector,
    filters_card_sel: Selector,
    filters_row_sel: Selector,
    anchor_sel: Selector,
}

impl StatusPageModel {
    /// Create an adapter from the configured selectors.
    pub fn new(selectors: &PageSelectors) -> Result<Self> {
        Ok(Self {
            h1_sel: parse_selector("h1")?,
            steps_bar_sel: parse_selector(&selectors.steps_bar)?,
            step_sel: parse_selector(&selectors.step)?,
            label_done_sel: parse_selector(&selectors.label_done)?,
            label_active_sel: parse_selector(&selectors.label_active)?,
            details_card_sel: parse_selector(&selectors.details_card)?,
            detail_pair_sel: parse_selector("dt, dd")?,
            filters_card_sel: parse_selector(&selectors.filters_card)?,
            filters_row_sel: parse_selector(&selectors.filters_row)?,
            anchor_sel: parse_selector("a")?,
        })
    }

    /// Parse a status page into a complete fresh record.
    ///
    /// `base_url` anchors relative download links.
    pub fn parse(&self, document: &Html, report_id: &str, base_url: &str) -> StatusRecord {
        let mut record = StatusRecord::empty(report_id);

        record.title = document
            .select(&self.h1_sel)
            .next()
            .map(|h1| element_text(&h1))
            .filter(|t| !t.is_empty());

        if let Some(bar) = document.select(&self.steps_bar_sel).next() {
            record.steps = self.parse_steps(&bar);
        }

        if let Some(card) = document.select(&self.details_card_sel).next() {
            record.details = self.parse_details(&card);
        }

        if let Some(card) = document.select(&self.filters_card_sel).next() {
            record.filters = self.parse_filters(&card);
        }

        record.download_url = self.find_download_link(document, base_url);

        record.state = if record.download_url.is_some() {
            ReportState::Ready
        } else if record
            .details
            .get("processado em")
            .is_some_and(|v| !v.is_empty() && v != "---")
        {
            ReportState::Processed
        } else if !record.steps.is_empty() {
            ReportState::InProgress
        } else {
            ReportState::Unknown
        };

        record
    }

    /// Parse the steps bar into ordered labeled steps.
    fn parse_steps(&self, bar: &ElementRef) -> Vec<Step> {
        let mut steps = Vec::new();

        for step in bar.select(&self.step_sel) {
            let is_done = step
                .value()
                .classes()
                .any(|class| class == "done");

            let label_done = step
                .select(&self.label_done_sel)
                .next()
                .map(|l| element_text(&l));
            let label_active = step
                .select(&self.label_active_sel)
                .next()
                .map(|l| element_text(&l));

            if let Some(label) = label_done.filter(|text| is_done || !text.is_empty()) {
                steps.push(Step {
                    label,
                    done: is_done,
                });
            } else if let Some(label) = label_active {
                steps.push(Step { label, done: false });
            }
        }

        steps
    }

    /// Parse the details panel's term-definition pairs.
    fn parse_details(&self, card: &ElementRef) -> BTreeMap<String, String> {
        let mut details = BTreeMap::new();
        let mut current_key: Option<String> = None;

        for element in card.select(&self.detail_pair_sel) {
            match element.value().name() {
                "dt" => {
                    let key = element_text(&element)
                        .trim_end_matches(':')
                        .to_lowercase();
                    current_key = Some(key);
                }
                "dd" => {
                    if let Some(key) = current_key.take() {
                        details.insert(key, element_text(&element));
                    }
                }
                _ => {}
            }
        }

        details
    }

    /// Parse the applied-filters panel's label/value row pairs.
    ///
    /// Empty values and the "-" placeholder are skipped.
    fn parse_filters(&self, card: &ElementRef) -> BTreeMap<String, String> {
        let mut filters = BTreeMap::new();

        for row in card.select(&self.filters_row_sel) {
            let cols: Vec<ElementRef> = row
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|child| child.value().name() == "div")
                .collect();

            if cols.len() >= 2 {
                let key = element_text(&cols[0])
                    .replace(':', "")
                    .replace('*', "")
                    .trim()
                    .to_string();
                let value = element_text(&cols[1]);

                if !key.is_empty() && !value.is_empty() && value != "-" {
                    filters.insert(key, value);
                }
            }
        }

        filters
    }

    /// Locate the report download link, trying several patterns in order.
    ///
    /// Candidates: anchors whose href contains "download", anchors whose
    /// text reads "Download"/"Baixar", then any primary-styled anchor. The
    /// first candidate whose href carries the spreadsheet extension or the
    /// word "download" wins, resolved to an absolute URL.
    fn find_download_link(&self, document: &Html, base_url: &str) -> Option<String> {
        let anchors: Vec<ElementRef> = document.select(&self.anchor_sel).collect();

        let by_href = anchors.iter().filter(|a| {
            a.value()
                .attr("href")
                .is_some_and(|href| href.to_lowercase().contains("download"))
        });
        let by_text = anchors.iter().filter(|a| {
            let text = element_text(a).to_lowercase();
            text.contains("download") || text.contains("baixar")
        });
        let by_class = anchors.iter().filter(|a| {
            a.value().attr("href").is_some()
                && a.value().classes().any(|class| class == "btn-primary")
        });

        for anchor in by_href.chain(by_text).chain(by_class) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let lower = href.to_lowercase();
            if !href.is_empty() && (lower.contains(".xlsx") || lower.contains("download")) {
                if href.starts_with("http") {
                    return Some(href.to_string());
                }
                return resolve(base_url, href).or_else(|| Some(href.to_string()));
            }
        }

        None
    }
}
