use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::fonts::{FontContext, FontMapper, FontMetrics, load_truetype_face};
use crate::layout::{FitConfig, GroupConfig};
use crate::rewrite::RewriteOptions;
use crate::translate::{BACKEND_LIBRETRANSLATE, DEFAULT_CACHE_CAPACITY};

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");
const API_KEY_ENV: &str = "LIBRETRANSLATE_API_KEY";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub translator: TranslatorSettings,
    pub layout: LayoutSettings,
    pub fonts: FontSettings,
    pub cache_capacity: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranslatorSettings {
    pub backend: String,
    pub url: String,
    pub source: String,
    pub target: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for TranslatorSettings {
    fn default() -> Self {
        Self {
            backend: BACKEND_LIBRETRANSLATE.to_string(),
            url: "http://127.0.0.1:5000".to_string(),
            source: "en".to_string(),
            target: "es".to_string(),
            api_key: None,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutSettings {
    pub fit: FitConfig,
    pub gap_ratio: f32,
    pub distribute: bool,
    pub redraw_unchanged: bool,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            fit: FitConfig::default(),
            gap_ratio: GroupConfig::default().gap_ratio,
            distribute: true,
            redraw_unchanged: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FontSettings {
    pub serif: bool,
    pub sans_metrics: Option<String>,
    pub serif_metrics: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            translator: TranslatorSettings::default(),
            layout: LayoutSettings::default(),
            fonts: FontSettings::default(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    translator: Option<TranslatorSection>,
    layout: Option<LayoutSection>,
    fonts: Option<FontSection>,
    cache: Option<CacheSection>,
}

#[derive(Debug, Default, Deserialize)]
struct TranslatorSection {
    backend: Option<String>,
    url: Option<String>,
    source: Option<String>,
    target: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LayoutSection {
    shrink_factor: Option<f32>,
    min_font_size: Option<f32>,
    min_size_ratio: Option<f32>,
    decay_factor: Option<f32>,
    max_attempts: Option<usize>,
    gap_ratio: Option<f32>,
    distribute: Option<bool>,
    preserve_font_size: Option<bool>,
    redraw_unchanged: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct FontSection {
    serif: Option<bool>,
    sans_metrics: Option<String>,
    serif_metrics: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CacheSection {
    capacity: Option<usize>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    ensure_home_settings_file()?;

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            settings
                .merge_toml(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
        }
    }

    if settings.translator.api_key.is_none()
        && let Ok(key) = std::env::var(API_KEY_ENV)
        && !key.trim().is_empty()
    {
        settings.translator.api_key = Some(key);
    }

    Ok(settings)
}

impl Settings {
    pub fn merge_toml(&mut self, content: &str) -> Result<()> {
        let parsed: SettingsFile = toml::from_str(content)?;
        self.merge(parsed);
        Ok(())
    }

    pub fn rewrite_options(&self) -> RewriteOptions {
        RewriteOptions {
            group: GroupConfig {
                gap_ratio: self.layout.gap_ratio,
            },
            fit: self.layout.fit,
            distribute: self.layout.distribute,
            redraw_unchanged: self.layout.redraw_unchanged,
        }
    }

    /// Font mapping and metrics, loading any configured TrueType files.
    pub fn font_context(&self) -> Result<FontContext> {
        let mut metrics = FontMetrics::default();
        if let Some(path) = &self.fonts.sans_metrics {
            metrics = metrics.with_sans_face(load_truetype_face(Path::new(path))?);
        }
        if let Some(path) = &self.fonts.serif_metrics {
            metrics = metrics.with_serif_face(load_truetype_face(Path::new(path))?);
        }
        Ok(FontContext::new(FontMapper::new(self.fonts.serif), metrics))
    }

    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(translator) = incoming.translator {
            let target = &mut self.translator;
            merge_text(&mut target.backend, translator.backend);
            merge_text(&mut target.url, translator.url);
            merge_text(&mut target.source, translator.source);
            merge_text(&mut target.target, translator.target);
            if let Some(key) = translator.api_key
                && !key.trim().is_empty()
            {
                target.api_key = Some(key);
            }
            if let Some(timeout) = translator.timeout_secs
                && timeout > 0
            {
                target.timeout_secs = timeout;
            }
        }
        if let Some(layout) = incoming.layout {
            let fit = &mut self.layout.fit;
            if let Some(value) = layout.shrink_factor
                && value > 0.0
                && value <= 1.0
            {
                fit.shrink_factor = value;
            }
            if let Some(value) = layout.min_font_size
                && value > 0.0
            {
                fit.min_font_size = value;
            }
            if let Some(value) = layout.min_size_ratio
                && value > 0.0
                && value <= 1.0
            {
                fit.min_size_ratio = value;
            }
            if let Some(value) = layout.decay_factor
                && value > 0.0
                && value < 1.0
            {
                fit.decay_factor = value;
            }
            if let Some(value) = layout.max_attempts {
                fit.max_attempts = value;
            }
            if let Some(value) = layout.preserve_font_size {
                fit.preserve_font_size = value;
            }
            if let Some(value) = layout.gap_ratio
                && value >= 0.0
            {
                self.layout.gap_ratio = value;
            }
            if let Some(value) = layout.distribute {
                self.layout.distribute = value;
            }
            if let Some(value) = layout.redraw_unchanged {
                self.layout.redraw_unchanged = value;
            }
        }
        if let Some(fonts) = incoming.fonts {
            if let Some(serif) = fonts.serif {
                self.fonts.serif = serif;
            }
            if let Some(path) = fonts.sans_metrics
                && !path.trim().is_empty()
            {
                self.fonts.sans_metrics = Some(path);
            }
            if let Some(path) = fonts.serif_metrics
                && !path.trim().is_empty()
            {
                self.fonts.serif_metrics = Some(path);
            }
        }
        if let Some(cache) = incoming.cache
            && let Some(capacity) = cache.capacity
        {
            self.cache_capacity = capacity;
        }
    }
}

fn merge_text(slot: &mut String, incoming: Option<String>) {
    if let Some(value) = incoming
        && !value.trim().is_empty()
    {
        *slot = value.trim().to_string();
    }
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

pub(crate) fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".pdf-reflow-translator"))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::with_temp_home;

    #[test]
    fn bundled_defaults_match_built_in_defaults() {
        let mut settings = Settings::default();
        settings
            .merge_toml(DEFAULT_SETTINGS_TOML)
            .expect("parse bundled settings");
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn invalid_values_are_ignored() {
        let mut settings = Settings::default();
        settings
            .merge_toml(
                r#"
[layout]
shrink_factor = 1.5
min_font_size = -2.0
decay_factor = 1.0
gap_ratio = 0.8

[translator]
target = "  "
source = " de "
"#,
            )
            .expect("parse");
        assert_eq!(settings.layout.fit, FitConfig::default());
        assert_eq!(settings.layout.gap_ratio, 0.8);
        assert_eq!(settings.translator.target, "es");
        assert_eq!(settings.translator.source, "de");
    }

    #[test]
    fn home_settings_file_is_created_and_layered() {
        with_temp_home(|home| {
            let settings = load_settings(None).expect("load settings");
            let written = home.join(".pdf-reflow-translator").join("settings.toml");
            assert!(written.exists());
            assert_eq!(settings.translator.backend, BACKEND_LIBRETRANSLATE);

            let extra = home.join("extra.toml");
            fs::write(&extra, "[translator]\ntarget = \"fr\"\n[cache]\ncapacity = 12\n")
                .expect("write extra");
            let settings = load_settings(Some(&extra)).expect("load extra");
            assert_eq!(settings.translator.target, "fr");
            assert_eq!(settings.cache_capacity, 12);
        });
    }

    #[test]
    fn missing_extra_settings_is_an_error() {
        with_temp_home(|home| {
            let missing = home.join("nope.toml");
            assert!(load_settings(Some(&missing)).is_err());
        });
    }

    #[test]
    fn rewrite_options_follow_layout_settings() {
        let mut settings = Settings::default();
        settings
            .merge_toml("[layout]\ndistribute = false\npreserve_font_size = true\n")
            .expect("parse");
        let options = settings.rewrite_options();
        assert!(!options.distribute);
        assert!(options.fit.preserve_font_size);
    }
}
