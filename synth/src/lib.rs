//! Document synthesis: file store → one self-contained HTML document.
//!
//! The synthesizer is a pure function over the store, an entry path, and the
//! project config. All local assets are inlined (stylesheets bundled into
//! one style block, scripts concatenated into one script block with
//! per-file fault attribution) and a runtime bridge is injected so the
//! document can run inside an isolated frame with error telemetry flowing
//! back to the host.
//!
//! Two hard requirements shape everything here: identical inputs must
//! produce identical output (the store's sorted iteration does most of the
//! work), and no input may ever cause a panic. A missing entry file, a
//! headless document, or an empty project all resolve to safe structural
//! defaults.

mod bridge;

use std::sync::OnceLock;

use regex::{Captures, Regex};

use atelier_store::FileStore;
use atelier_types::ProjectConfig;

/// Entry document used when the caller does not name one.
pub const DEFAULT_ENTRY_PATH: &str = "app/index.html";

const ENTRY_PLACEHOLDER: &str = "<div id=\"app\" style=\"display:flex;align-items:center;\
justify-content:center;height:100vh;background:#09090b;color:#52525b;font-size:10px;\
font-weight:900;text-transform:uppercase;letter-spacing:0.3em\">Initializing</div>";

// ============================================================================
// Local reference stripping
// ============================================================================

fn link_tag_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)<link\b[^>]*\bhref\s*=\s*["']([^"']+)["'][^>]*>"#)
            .expect("link tag pattern is valid")
    })
}

fn script_tag_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)<script\b[^>]*\bsrc\s*=\s*["']([^"']+)["'][^>]*>\s*</script>"#)
            .expect("script tag pattern is valid")
    })
}

/// Whether a URL points outside the project (scheme-qualified or
/// protocol-relative). Everything else is a local path that will be inlined.
fn is_remote_url(url: &str) -> bool {
    if url.starts_with("//") {
        return true;
    }
    match url.split_once("://") {
        Some((scheme, _)) => {
            !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'))
        }
        None => false,
    }
}

/// Remove `<link>` and `<script src>` tags that reference local project
/// paths; those assets are inlined instead. Remote references are preserved.
fn strip_local_references(html: &str) -> String {
    fn keep_remote(caps: &Captures<'_>) -> String {
        if is_remote_url(&caps[1]) {
            caps[0].to_owned()
        } else {
            String::new()
        }
    }
    let html = link_tag_pattern().replace_all(html, keep_remote);
    script_tag_pattern()
        .replace_all(&html, keep_remote)
        .into_owned()
}

// ============================================================================
// Asset bundling
// ============================================================================

/// Concatenate every stylesheet in path order, each prefixed with a path
/// comment for traceability.
fn bundle_styles(files: &FileStore) -> String {
    files
        .iter()
        .filter(|(path, _)| path.ends_with(".css"))
        .map(|(path, content)| format!("/* {path} */\n{content}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Concatenate every script in path order. Each file runs inside its own
/// try/catch that names the originating path and rethrows, so a fault is
/// attributable without silently swallowing it. The rethrow still aborts the
/// shared block: entries after the failing file will not run. That is an
/// accepted trade-off, not per-file isolation.
fn bundle_scripts(files: &FileStore) -> String {
    files
        .iter()
        .filter(|(path, _)| path.ends_with(".js"))
        .map(|(path, content)| {
            let quoted = bridge::js_string(path);
            format!(
                "// --- file: {path} ---\ntry {{\n{content}\n}} catch (err) {{\n  \
                 console.error('Fault in ' + {quoted} + ':', err);\n  throw err;\n}}\n"
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// Head injection & document shell
// ============================================================================

/// Fixed runtime head: meta tags, Tailwind CDN, a dark-baseline reset, the
/// bundled styles, and the runtime bridge script.
fn head_injection(styles: &str, config: &ProjectConfig) -> String {
    let bridge = bridge::runtime_bridge(config);
    format!(
        r#"
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0, maximum-scale=1.0, user-scalable=no, viewport-fit=cover">
    <script src="https://cdn.tailwindcss.com"></script>
    <style>
      * {{ box-sizing: border-box; -webkit-tap-highlight-color: transparent; }}
      :root {{ --safe-top: env(safe-area-inset-top); --safe-bottom: env(safe-area-inset-bottom); }}
      html, body {{ height: 100dvh; width: 100vw; margin: 0; padding: 0; overflow-x: hidden; background-color: #09090b !important; color: #f4f4f5; }}
      body {{ font-family: sans-serif; display: flex; flex-direction: column; padding-top: var(--safe-top); padding-bottom: var(--safe-bottom); }}
      #app-root, #root, #app {{ flex: 1; display: flex; flex-direction: column; height: 100%; overflow-y: auto; overflow-x: hidden; position: relative; }}
      ::-webkit-scrollbar {{ display: none; }}
      {styles}
    </style>
    {bridge}
"#
    )
}

/// Case-insensitive substring search. ASCII lowering is byte-for-byte, so
/// the returned offset is valid for the original string.
fn find_ci(haystack: &str, needle: &str) -> Option<usize> {
    haystack.to_ascii_lowercase().find(needle)
}

/// Offset just past the opening `<html ...>` tag, if one exists.
fn opening_html_tag_end(html: &str) -> Option<usize> {
    let start = find_ci(html, "<html")?;
    html[start..].find('>').map(|close| start + close + 1)
}

fn assemble(entry: &str, head: &str, script_block: &str) -> String {
    // Fragments get a complete shell around them.
    if find_ci(entry, "<html").is_none() {
        return format!(
            "<!DOCTYPE html>\n<html lang=\"en\"><head>{head}</head><body>\
             <div id=\"app-root\">{entry}</div>{script_block}</body></html>"
        );
    }

    let mut html = entry.to_owned();

    if let Some(pos) = find_ci(&html, "</head>") {
        html.insert_str(pos, head);
    } else if let Some(pos) = find_ci(&html, "<body") {
        html.insert_str(pos, &format!("<head>{head}</head>"));
    } else if let Some(pos) = opening_html_tag_end(&html) {
        // No head and no body: synthesize a head right after the html tag.
        html.insert_str(pos, &format!("<head>{head}</head>"));
    } else {
        html.insert_str(0, &format!("<head>{head}</head>"));
    }

    if let Some(pos) = find_ci(&html, "</body>") {
        html.insert_str(pos, script_block);
    } else {
        html.push_str(script_block);
    }

    html
}

// ============================================================================
// Entry point
// ============================================================================

/// Assemble the store into one executable document.
///
/// Deterministic and idempotent for identical inputs; never panics. A
/// missing entry file yields a placeholder document, and absent stylesheets
/// or scripts simply produce empty bundles.
#[must_use]
pub fn build_document(files: &FileStore, entry_path: &str, config: &ProjectConfig) -> String {
    let entry = files.get(entry_path).unwrap_or(ENTRY_PLACEHOLDER);
    let processed = strip_local_references(entry);

    let styles = bundle_styles(files);
    let scripts = bundle_scripts(files);
    let head = head_injection(&styles, config);
    let script_block = format!("<script>\n{scripts}\n</script>");

    assemble(&processed, &head, &script_block)
}
