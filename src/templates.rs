//! Rendering of notification titles and bodies.
//!
//! Templates are Handlebars. The engine ships built-in partials
//! (`default_title`, `default_message`, `default_alert`) that every channel
//! uses unless the receiver supplies its own template. Rendering never fails
//! the call: a broken expression renders as empty text and the first error is
//! reported next to the output in `Rendered`.

use crate::core::{AlertBatch, Labels, NotifyContext};
use crate::notification::error::TemplateError;
use handlebars::{handlebars_helper, no_escape, Handlebars, Template};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;
use url::Url;

pub const DEFAULT_TITLE_EMBED: &str = "{{> default_title}}";
pub const DEFAULT_MESSAGE_EMBED: &str = "{{> default_message}}";

const DEFAULT_TITLE: &str = "[{{upper status}}{{#if firing}}:{{num_firing}}{{/if}}] \
{{group_label_values}}{{#if common_label_values}} ({{common_label_values}}){{/if}}";

const DEFAULT_ALERT: &str = "Labels:
{{#each labels}} - {{@key}} = {{this}}
{{/each}}Annotations:
{{#each annotations}} - {{@key}} = {{this}}
{{/each}}{{#if generator_url}}Source: {{generator_url}}
{{/if}}";

const DEFAULT_MESSAGE: &str = "{{#if firing}}**Firing**
{{#each firing}}
{{> default_alert}}{{/each}}{{/if}}{{#if resolved}}{{#if firing}}
{{/if}}**Resolved**
{{#each resolved}}
{{> default_alert}}{{/each}}{{/if}}";

handlebars_helper!(upper: |s: str| s.to_uppercase());
handlebars_helper!(lower: |s: str| s.to_lowercase());

/// An alert as seen from a template.
#[derive(Debug, Clone, Serialize)]
pub struct AlertData {
    pub status: &'static str,
    pub labels: Labels,
    pub annotations: Labels,
    pub starts_at: String,
    pub ends_at: Option<String>,
    pub generator_url: Option<String>,
    pub fingerprint: String,
}

/// Everything a template can reference.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateData {
    pub receiver: String,
    pub status: &'static str,
    pub alerts: Vec<AlertData>,
    pub firing: Vec<AlertData>,
    pub resolved: Vec<AlertData>,
    pub num_firing: usize,
    pub num_resolved: usize,
    pub group_labels: Labels,
    pub common_labels: Labels,
    pub common_annotations: Labels,
    /// Group label values, space separated.
    pub group_label_values: String,
    /// Values of common labels that are not group labels, space separated.
    pub common_label_values: String,
    pub external_url: String,
    pub group_key: String,
}

/// Best-effort output plus the first error hit while producing it.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered<T> {
    pub output: T,
    pub error: Option<TemplateError>,
}

impl<T> Rendered<T> {
    /// Logs a captured error against the receiver and returns the output.
    /// Template errors never abort delivery.
    pub fn or_warn(self, receiver: &str) -> T {
        if let Some(e) = &self.error {
            warn!(
                receiver,
                error = %e,
                "Failed to render notification template, sending best-effort content"
            );
        }
        self.output
    }
}

pub struct TemplateEngine {
    registry: Handlebars<'static>,
    external_url: Url,
}

impl TemplateEngine {
    /// Creates an engine with only the built-in templates.
    pub fn new(external_url: &str) -> Result<Self, TemplateError> {
        Self::with_templates(external_url, &BTreeMap::new())
    }

    /// Creates an engine and registers operator-defined named templates, which
    /// receivers can then embed with `{{> name}}`.
    pub fn with_templates(
        external_url: &str,
        templates: &BTreeMap<String, String>,
    ) -> Result<Self, TemplateError> {
        let external_url = Url::parse(external_url).map_err(|e| TemplateError::ExternalUrl {
            url: external_url.to_string(),
            reason: e.to_string(),
        })?;

        let mut registry = Handlebars::new();
        registry.register_escape_fn(no_escape);
        registry.register_helper("upper", Box::new(upper));
        registry.register_helper("lower", Box::new(lower));

        let builtins = [
            ("default_title", DEFAULT_TITLE),
            ("default_alert", DEFAULT_ALERT),
            ("default_message", DEFAULT_MESSAGE),
        ];
        for (name, source) in builtins.into_iter().chain(
            templates
                .iter()
                .map(|(name, source)| (name.as_str(), source.as_str())),
        ) {
            registry
                .register_template_string(name, source)
                .map_err(|e| TemplateError::Register {
                    name: name.to_string(),
                    reason: e.to_string(),
                })?;
        }

        Ok(Self {
            registry,
            external_url,
        })
    }

    pub fn external_url(&self) -> &Url {
        &self.external_url
    }

    /// Joins the external URL with a relative path.
    pub fn external_link(&self, path: &str) -> String {
        join_url_path(self.external_url.as_str(), path)
    }

    /// Compiles a receiver's template without rendering it. An empty source
    /// means the built-in default and always passes.
    pub fn check(field: &'static str, source: &str) -> Result<(), TemplateError> {
        if source.is_empty() {
            return Ok(());
        }
        Template::compile(source)
            .map(drop)
            .map_err(|e| TemplateError::Parse {
                field,
                reason: e.to_string(),
            })
    }

    /// Compiles every `(field, source)` pair, keeping the failures.
    pub fn check_all(fields: &[(&'static str, &str)]) -> Vec<TemplateError> {
        fields
            .iter()
            .filter_map(|&(field, source)| Self::check(field, source).err())
            .collect()
    }

    /// Builds the template data for one notify call.
    pub fn data(&self, ctx: &NotifyContext, alerts: &AlertBatch) -> TemplateData {
        let now = chrono::Utc::now();
        let all: Vec<AlertData> = alerts
            .iter()
            .map(|alert| AlertData {
                status: if alert.resolved_at(now) { "resolved" } else { "firing" },
                labels: alert.labels.clone(),
                annotations: alert.annotations.clone(),
                starts_at: alert.starts_at.to_rfc3339(),
                ends_at: alert.ends_at.map(|t| t.to_rfc3339()),
                generator_url: alert.generator_url.clone(),
                fingerprint: alert.fingerprint(),
            })
            .collect();
        let (resolved, firing): (Vec<_>, Vec<_>) =
            all.iter().cloned().partition(|alert| alert.status == "resolved");

        let common_labels = alerts.common_labels();
        let common_label_values = common_labels
            .iter()
            .filter(|(name, _)| !ctx.group_labels.contains_key(*name))
            .map(|(_, value)| value.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        TemplateData {
            receiver: ctx.receiver.clone(),
            status: if firing.is_empty() { "resolved" } else { "firing" },
            num_firing: firing.len(),
            num_resolved: resolved.len(),
            alerts: all,
            firing,
            resolved,
            group_label_values: ctx
                .group_labels
                .values()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(" "),
            group_labels: ctx.group_labels.clone(),
            common_labels,
            common_label_values,
            common_annotations: alerts.common_annotations(),
            external_url: self.external_url.as_str().trim_end_matches('/').to_string(),
            group_key: ctx.group_key.clone(),
        }
    }

    /// Starts a render session over one alert batch.
    pub fn expander(&self, ctx: &NotifyContext, alerts: &AlertBatch) -> Expander<'_> {
        Expander {
            engine: self,
            data: self.data(ctx, alerts),
            first_error: None,
        }
    }
}

/// Renders any number of templates against the same data, remembering the
/// first failure.
pub struct Expander<'a> {
    engine: &'a TemplateEngine,
    data: TemplateData,
    first_error: Option<TemplateError>,
}

impl Expander<'_> {
    pub fn data(&self) -> &TemplateData {
        &self.data
    }

    /// Renders `source`. On error, returns an empty string.
    pub fn expand(&mut self, source: &str) -> String {
        if source.is_empty() {
            return String::new();
        }
        match self.engine.registry.render_template(source, &self.data) {
            Ok(text) => text,
            Err(e) => {
                self.first_error
                    .get_or_insert(TemplateError::Render(e.to_string()));
                String::new()
            }
        }
    }

    /// Renders `custom` if set, otherwise `default`.
    pub fn expand_or(&mut self, custom: &str, default: &str) -> String {
        if custom.is_empty() {
            self.expand(default)
        } else {
            self.expand(custom)
        }
    }

    /// Ends the session, pairing the output with the first error.
    pub fn finish<T>(self, output: T) -> Rendered<T> {
        Rendered {
            output,
            error: self.first_error,
        }
    }
}

/// Joins `base` and `rel` with exactly one slash, keeping any query string.
pub fn join_url_path(base: &str, rel: &str) -> String {
    let rel = rel.trim_start_matches('/');
    match Url::parse(base) {
        Ok(mut url) => {
            let path = format!("{}/{}", url.path().trim_end_matches('/'), rel);
            url.set_path(&path);
            url.to_string()
        }
        Err(e) => {
            warn!(base, error = %e, "Failed to parse external URL, joining as text");
            format!("{}/{}", base.trim_end_matches('/'), rel)
        }
    }
}
