//! CSS-selector extractors for the shipped page view
//!
//! This module turns the `[extract]` and `[hydrate]` configuration into an
//! `ExtractorSet<PageView, ControlToken>`:
//! - Item links on a listing page
//! - Listing entries that carry their info inline (URL+info pairs)
//! - The next-page link or next-page control
//! - Info fields on a detail page

use crate::config::{EntryRules, ExtractConfig, FieldRule, HydrateConfig};
use crate::crawler::extractor::ExtractorSet;
use crate::crawler::fetcher::{ControlToken, NextPage, PageView};
use crate::url::resolve_link;
use crate::{ConfigError, ConfigResult};
use scraper::{ElementRef, Html, Selector};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use url::Url;

/// Attributes whose values are links and get resolved against the page URL
const LINK_ATTRS: &[&str] = &["href", "src"];

/// Compiled selector rules
#[derive(Debug)]
pub struct SelectorRules {
    item_links: Option<Selector>,
    entries: Option<EntrySelectors>,
    next_page: Option<NextPageRule>,
    info: Vec<FieldSelector>,
}

#[derive(Debug)]
struct EntrySelectors {
    container: Selector,
    link: Selector,
    fields: Vec<FieldSelector>,
}

#[derive(Debug)]
enum NextPageRule {
    Link(Selector),
    Click { selector: Selector, raw: String },
}

#[derive(Debug)]
struct FieldSelector {
    name: String,
    selector: Selector,
    attr: Option<String>,
    all: bool,
}

impl SelectorRules {
    /// Compiles the `[extract]` section
    pub fn from_config(config: &ExtractConfig) -> ConfigResult<Self> {
        let next_page = match (&config.next_page_link, &config.next_page_click) {
            (Some(link), None) => Some(NextPageRule::Link(compile(link)?)),
            (None, Some(click)) => Some(NextPageRule::Click {
                selector: compile(click)?,
                raw: click.clone(),
            }),
            (None, None) => None,
            (Some(_), Some(_)) => {
                return Err(ConfigError::Validation(
                    "next-page-link and next-page-click are mutually exclusive".to_string(),
                ))
            }
        };

        Ok(Self {
            item_links: config.item_links.as_deref().map(compile).transpose()?,
            entries: config.entries.as_ref().map(compile_entries).transpose()?,
            next_page,
            info: compile_fields(&config.info)?,
        })
    }

    /// Compiles the secondary field rules of the `[hydrate]` section
    pub fn for_hydration(config: &HydrateConfig) -> ConfigResult<Self> {
        Ok(Self {
            item_links: None,
            entries: None,
            next_page: None,
            info: compile_fields(&config.info)?,
        })
    }

    /// Wraps the rules into extractor functions
    ///
    /// Only the functions backed by at least one rule are set, so a missing
    /// section surfaces as a missing extractor when a pass starts.
    pub fn into_extractors(self) -> ExtractorSet<PageView, ControlToken> {
        let rules = Arc::new(self);
        let mut set = ExtractorSet::new();

        if rules.item_links.is_some() || rules.entries.is_some() {
            let r = Arc::clone(&rules);
            set = set.with_item_urls(move |view: &PageView| r.item_urls(view));
        }
        if rules.entries.is_some() {
            let r = Arc::clone(&rules);
            set = set.with_item_urls_and_infos(move |view: &PageView| r.url_info_pairs(view));
        }
        if rules.next_page.is_some() {
            let r = Arc::clone(&rules);
            set = set.with_next_page(move |view: &PageView| r.next_page(view));
        }
        if !rules.info.is_empty() {
            let r = Arc::clone(&rules);
            set = set.with_info(move |view: &PageView| r.info(view));
        }
        set
    }

    /// Item links on a listing page
    ///
    /// Also returns entry links whose fields matched nothing, so those
    /// entries are stored as bare URLs for the info-fill pass.
    pub fn item_urls(&self, view: &PageView) -> Vec<String> {
        let Some(base) = view.base_url() else {
            return Vec::new();
        };
        let document = view.document();
        let mut seen = HashSet::new();
        let mut urls = Vec::new();

        if let Some(selector) = &self.item_links {
            for element in document.select(selector) {
                if let Some(url) = element_link(element, &base) {
                    if seen.insert(url.clone()) {
                        urls.push(url);
                    }
                }
            }
        }

        if let Some(entries) = &self.entries {
            for (url, info) in entries.extract(&document, &base) {
                if info.is_none() && seen.insert(url.clone()) {
                    urls.push(url);
                }
            }
        }

        urls
    }

    /// URL+info pairs from listing entries
    pub fn url_info_pairs(&self, view: &PageView) -> Vec<(String, Value)> {
        let (Some(entries), Some(base)) = (&self.entries, view.base_url()) else {
            return Vec::new();
        };
        let document = view.document();
        let mut seen = HashSet::new();

        entries
            .extract(&document, &base)
            .into_iter()
            .filter_map(|(url, info)| Some((url, info?)))
            .filter(|(url, _)| seen.insert(url.clone()))
            .collect()
    }

    /// Next page reference
    ///
    /// A next-page link pointing back at the current page ends the chain.
    /// A disabled next-page control is treated as absent.
    pub fn next_page(&self, view: &PageView) -> NextPage<ControlToken> {
        let document = view.document();
        match &self.next_page {
            None => NextPage::Absent,
            Some(NextPageRule::Link(selector)) => {
                let Some(base) = view.base_url() else {
                    return NextPage::Absent;
                };
                let current = resolve_link(&view.url, &base);
                document
                    .select(selector)
                    .find_map(|element| element_link(element, &base))
                    .filter(|next| Some(next) != current.as_ref())
                    .into()
            }
            Some(NextPageRule::Click { selector, raw }) => {
                let enabled = document.select(selector).any(|element| {
                    let el = element.value();
                    el.attr("disabled").is_none() && el.attr("aria-disabled") != Some("true")
                });
                if enabled {
                    NextPage::Control(ControlToken::new(raw.clone()))
                } else {
                    NextPage::Absent
                }
            }
        }
    }

    /// Info fields of a detail page; absent when no field matched
    pub fn info(&self, view: &PageView) -> Option<Value> {
        let document = view.document();
        let base = view.base_url();
        extract_fields(document.root_element(), &self.info, base.as_ref())
    }
}

impl EntrySelectors {
    fn extract(&self, document: &Html, base: &Url) -> Vec<(String, Option<Value>)> {
        document
            .select(&self.container)
            .filter_map(|container| {
                let url = container
                    .select(&self.link)
                    .find_map(|element| element_link(element, base))?;
                Some((url, extract_fields(container, &self.fields, Some(base))))
            })
            .collect()
    }
}

fn compile(selector: &str) -> ConfigResult<Selector> {
    Selector::parse(selector).map_err(|e| ConfigError::InvalidSelector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

fn compile_entries(rules: &EntryRules) -> ConfigResult<EntrySelectors> {
    Ok(EntrySelectors {
        container: compile(&rules.container)?,
        link: compile(&rules.link)?,
        fields: compile_fields(&rules.fields)?,
    })
}

fn compile_fields(rules: &BTreeMap<String, FieldRule>) -> ConfigResult<Vec<FieldSelector>> {
    rules
        .iter()
        .map(|(name, rule)| {
            let (attr, all) = match rule {
                FieldRule::Selector(_) => (None, false),
                FieldRule::Detailed { attr, all, .. } => (attr.clone(), *all),
            };
            Ok(FieldSelector {
                name: name.clone(),
                selector: compile(rule.selector())?,
                attr,
                all,
            })
        })
        .collect()
}

/// The element's own href, or the href of the first link inside it
fn element_link(element: ElementRef<'_>, base: &Url) -> Option<String> {
    if let Some(href) = element.value().attr("href") {
        return resolve_link(href, base);
    }
    let anchor = Selector::parse("a[href]").ok()?;
    element
        .select(&anchor)
        .find_map(|a| a.value().attr("href").and_then(|href| resolve_link(href, base)))
}

fn extract_fields(
    scope: ElementRef<'_>,
    fields: &[FieldSelector],
    base: Option<&Url>,
) -> Option<Value> {
    let mut info = Map::new();

    for field in fields {
        let mut values = scope
            .select(&field.selector)
            .filter_map(|element| field_value(element, field.attr.as_deref(), base));

        if field.all {
            let values: Vec<Value> = values.map(Value::String).collect();
            if !values.is_empty() {
                info.insert(field.name.clone(), Value::Array(values));
            }
        } else if let Some(value) = values.next() {
            info.insert(field.name.clone(), Value::String(value));
        }
    }

    if info.is_empty() {
        None
    } else {
        Some(Value::Object(info))
    }
}

fn field_value(element: ElementRef<'_>, attr: Option<&str>, base: Option<&Url>) -> Option<String> {
    let value = match attr {
        Some(attr) => {
            let raw = element.value().attr(attr)?.trim();
            match base {
                Some(base) if LINK_ATTRS.contains(&attr) => {
                    resolve_link(raw, base).unwrap_or_else(|| raw.to_string())
                }
                _ => raw.to_string(),
            }
        }
        None => element.text().collect::<Vec<_>>().join(" "),
    };

    let value = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
