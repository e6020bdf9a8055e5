use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

pub mod document;
pub mod fonts;
pub mod geometry;
pub mod layout;
pub mod logging;
pub mod page;
pub mod pdf;
pub mod rewrite;
pub mod settings;
pub mod translate;

#[cfg(test)]
mod test_util;

pub use document::{DocumentError, TranslatedDocument, translate_document, translate_pdf};
pub use pdf::{PdfDocument, PdfError};
pub use rewrite::{Canceled, PageReport, PageRewriter, ReplacementPlan, RewriteOptions};
pub use translate::{TextTranslator, TranslationAdapter, TranslationCache};

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub target: Option<String>,
    pub source: Option<String>,
    pub backend: Option<String>,
    pub url: Option<String>,
    pub settings_path: Option<String>,
    pub list_targets: bool,
    pub dry_run: bool,
}

/// Callbacks the caller uses to observe and stop a run.
#[derive(Clone, Default)]
pub struct RunHooks {
    pub progress: Option<Arc<dyn Fn(usize, usize) + Send + Sync>>,
    pub cancel: Arc<AtomicBool>,
}

impl RunHooks {
    pub fn is_canceled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }
}

/// Runs one job and returns what should be printed on stdout.
pub fn run(config: Config, hooks: RunHooks) -> Result<String> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let mut settings = settings::load_settings(settings_path)?;
    apply_overrides(&mut settings, &config);

    if config.list_targets {
        return list_targets(&settings.translator);
    }

    let input = config
        .input
        .ok_or_else(|| anyhow!("input PDF is required"))?;
    let fonts = settings
        .font_context()
        .with_context(|| "failed to load font metrics")?;
    let backend = translate::build_backend(&settings.translator)?;
    let adapter = TranslationAdapter::new(
        backend,
        Arc::new(TranslationCache::new(settings.cache_capacity)),
    );
    let options = settings.rewrite_options();
    let cancel = || hooks.is_canceled();

    if config.dry_run {
        let source = PdfDocument::open(&input)
            .with_context(|| format!("failed to open {}", input.display()))?
            .with_fonts(fonts);
        let previews = document::preview_pdf(&source, &adapter, &options, &cancel)?;
        log_stats(&adapter);
        return serde_json::to_string_pretty(&previews)
            .with_context(|| "failed to serialize plans");
    }

    let output = config
        .output
        .ok_or_else(|| anyhow!("output path is required"))?;
    let progress = |current: usize, total: usize| {
        if let Some(progress) = &hooks.progress {
            progress(current, total);
        }
    };
    let mut translated =
        translate_document(&input, fonts, &adapter, &options, &progress, &cancel)
            .with_context(|| format!("failed to translate {}", input.display()))?;
    translated
        .document
        .save(&output)
        .with_context(|| format!("failed to save {}", output.display()))?;
    log_stats(&adapter);

    let mut summary = format!(
        "translated {} page(s) into {}",
        translated.total_pages,
        output.display()
    );
    if !translated.failed_pages.is_empty() {
        let pages: Vec<String> = translated
            .failed_pages
            .iter()
            .map(|index| (index + 1).to_string())
            .collect();
        summary.push_str(&format!(" (untranslated pages: {})", pages.join(", ")));
    }
    Ok(summary)
}

fn apply_overrides(settings: &mut settings::Settings, config: &Config) {
    let translator = &mut settings.translator;
    let overrides = [
        (&mut translator.target, &config.target),
        (&mut translator.source, &config.source),
        (&mut translator.backend, &config.backend),
        (&mut translator.url, &config.url),
    ];
    for (slot, value) in overrides {
        if let Some(value) = value
            && !value.trim().is_empty()
        {
            *slot = value.trim().to_string();
        }
    }
}

fn list_targets(settings: &settings::TranslatorSettings) -> Result<String> {
    let backend = translate::LibreTranslate::new(settings)?;
    let languages = backend
        .languages()
        .with_context(|| format!("failed to fetch languages from {}", settings.url))?;
    let targets = backend.targets_for_source()?;
    if targets.is_empty() {
        return Err(anyhow!(
            "no target languages available for source '{}'",
            backend.source()
        ));
    }
    let lines: Vec<String> = targets
        .iter()
        .map(|code| {
            let name = languages
                .iter()
                .find(|language| language.code.eq_ignore_ascii_case(code))
                .map(|language| language.name.as_str())
                .unwrap_or("");
            format!("{code} - {name}")
        })
        .collect();
    Ok(lines.join("\n"))
}

fn log_stats(adapter: &TranslationAdapter) {
    let stats = adapter.stats();
    info!(
        cache_hits = stats.cache_hits,
        backend_calls = stats.backend_calls,
        backend_failures = stats.backend_failures,
        passthroughs = stats.passthroughs,
        cached = adapter.cache().len(),
        "translation statistics"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::with_temp_home;

    #[test]
    fn overrides_replace_only_given_values() {
        let mut settings = settings::Settings::default();
        let config = Config {
            target: Some(" fr ".to_string()),
            url: Some("   ".to_string()),
            ..Config::default()
        };
        apply_overrides(&mut settings, &config);
        assert_eq!(settings.translator.target, "fr");
        assert_eq!(settings.translator.url, "http://127.0.0.1:5000");
        assert_eq!(settings.translator.source, "en");
    }

    #[test]
    fn translating_requires_an_input() {
        with_temp_home(|_| {
            let err = run(Config::default(), RunHooks::default()).unwrap_err();
            assert!(err.to_string().contains("input PDF is required"));
        });
    }

    #[test]
    fn identity_backend_round_trips_a_file() {
        with_temp_home(|home| {
            let input = home.join("in.pdf");
            let output = home.join("out.pdf");
            let mut empty = PdfDocument::new_empty();
            empty.add_blank_page(300.0, 400.0).unwrap();
            empty.save(&input).unwrap();

            let summary = run(
                Config {
                    input: Some(input),
                    output: Some(output.clone()),
                    backend: Some("identity".to_string()),
                    ..Config::default()
                },
                RunHooks::default(),
            )
            .unwrap();
            assert!(summary.starts_with("translated 1 page(s)"));
            assert_eq!(PdfDocument::open(&output).unwrap().page_count(), 1);
        });
    }

    #[test]
    fn canceled_runs_write_nothing() {
        with_temp_home(|home| {
            let input = home.join("in.pdf");
            let output = home.join("out.pdf");
            let mut empty = PdfDocument::new_empty();
            empty.add_blank_page(300.0, 400.0).unwrap();
            empty.save(&input).unwrap();

            let hooks = RunHooks::default();
            hooks.cancel.store(true, Ordering::Relaxed);
            let err = run(
                Config {
                    input: Some(input),
                    output: Some(output.clone()),
                    backend: Some("identity".to_string()),
                    ..Config::default()
                },
                hooks,
            )
            .unwrap_err();
            assert!(matches!(
                err.downcast_ref::<DocumentError>(),
                Some(DocumentError::Canceled)
            ));
            assert!(!output.exists());
        });
    }
}
