//! Effects on the URL-routing module and the WSGI entry point.

use std::path::Path;

use crate::editor::{self, TextDocument};
use crate::error::Result;

const SETTINGS_IMPORT: &str = "from django.conf import settings";
const STATIC_IMPORT: &str = "from django.conf.urls.static import static";

const DEBUG_GUARD: &str = "if settings.DEBUG:";
const STATIC_WIRING: &str =
    "urlpatterns += static(settings.STATIC_URL, document_root=settings.STATIC_ROOT)";
const MEDIA_WIRING: &str =
    "urlpatterns += static(settings.MEDIA_URL, document_root=settings.MEDIA_ROOT)";

pub(crate) const APP_ALIAS: &str = "app = application";

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// Ensure the settings and `static` imports exist and, unless already wired,
/// append a debug-only block serving static and media files.
/// Returns whether the module changed.
pub fn configure_url_patterns(path: &Path) -> Result<bool> {
    let mut doc = TextDocument::open(path)?;
    let before = doc.text().to_string();

    if !doc.contains(SETTINGS_IMPORT) {
        doc.prepend_line(SETTINGS_IMPORT);
    }
    if !doc.contains(STATIC_IMPORT) {
        doc.prepend_line(STATIC_IMPORT);
    }
    if !doc.contains(STATIC_WIRING) {
        doc.push_str(&format!(
            "\n\n{DEBUG_GUARD}\n    {STATIC_WIRING}\n    {MEDIA_WIRING}\n"
        ));
    }

    if doc.text() == before {
        return Ok(false);
    }
    doc.save()?;
    Ok(true)
}

/// Remove the static/media wiring, the debug guard it leaves empty, and the
/// two imports once nothing references them.
pub fn remove_url_patterns(path: &Path) -> Result<()> {
    let mut doc = TextDocument::open(path)?;

    doc.filter_lines(|line| {
        line.contains("urlpatterns += static(")
            || line.contains("settings.STATIC_URL")
            || line.contains("settings.MEDIA_URL")
    });

    let lines: Vec<&str> = doc.text().lines().collect();
    let empty_guards: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| line.trim() == DEBUG_GUARD)
        .filter(|(number, line)| {
            lines[number + 1..]
                .iter()
                .find(|next| !next.trim().is_empty())
                .map_or(true, |next| indent_of(next) <= indent_of(line))
        })
        .map(|(number, _)| number)
        .collect();
    doc.filter_numbered(|number, _| empty_guards.contains(&number));

    let references = |needle: &str, import: &str| {
        doc.text()
            .lines()
            .any(|line| line.trim() != import && line.contains(needle))
    };
    let drop_settings = !references("settings.", SETTINGS_IMPORT);
    let drop_static = !references("static(", STATIC_IMPORT);
    doc.filter_lines(|line| {
        (drop_settings && line.trim() == SETTINGS_IMPORT)
            || (drop_static && line.trim() == STATIC_IMPORT)
    });

    doc.save()
}

/// Expose the WSGI application under the name the platform looks for.
pub fn add_app_alias(path: &Path) -> Result<bool> {
    let doc = TextDocument::open(path)?;
    if doc.has_line(|line| line.trim() == APP_ALIAS) {
        return Ok(false);
    }
    editor::append(path, &format!("\n{APP_ALIAS}\n"))?;
    Ok(true)
}

pub fn remove_app_alias(path: &Path) -> Result<usize> {
    editor::filter_lines(path, |line| line.trim() == APP_ALIAS)
}
