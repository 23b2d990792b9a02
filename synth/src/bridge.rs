//! Runtime bridge injected ahead of the application code.
//!
//! Three concerns, in one script block: forward uncaught errors to the
//! hosting context for automated repair tooling, mock the device-like
//! capability surface generated apps tend to reference, and describe
//! backend connectivity derived from the project config.

use atelier_types::ProjectConfig;

/// JSON-escape a value into a JavaScript string literal.
///
/// Credentials and paths are interpolated into generated script text;
/// escaping through the JSON encoder keeps quotes and control characters
/// from breaking out of the literal.
pub(crate) fn js_string(value: &str) -> String {
    let encoded = serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_owned());
    // A literal "</script>" inside the string would still terminate the
    // surrounding HTML script element; encode '<' so it cannot.
    encoded.replace('<', "\\u003c")
}

/// The backend connectivity descriptor.
///
/// Present or absent only; credentials are forwarded verbatim (escaped),
/// never validated here.
fn backend_descriptor(config: &ProjectConfig) -> String {
    match &config.backend {
        Some(credentials) => format!(
            "window.AtelierBackend = {{ url: {url}, key: {key} }};\n      \
             console.log('Atelier backend bridge: active');",
            url = js_string(&credentials.url),
            key = js_string(&credentials.key),
        ),
        None => "window.AtelierBackend = null;\n      \
                 console.log('Atelier backend bridge: offline');"
            .to_owned(),
    }
}

/// Build the full bridge script element.
pub(crate) fn runtime_bridge(config: &ProjectConfig) -> String {
    let backend = backend_descriptor(config);
    format!(
        r"<script>
      // Backend connectivity descriptor
      {backend}

      // Uncaught errors are forwarded to the hosting context as structured
      // messages; returning true suppresses the default error UI inside the
      // frame so the host owns the failure experience.
      window.onerror = function (message, source, lineno, colno, error) {{
        window.parent.postMessage({{
          type: 'RUNTIME_ERROR',
          error: {{
            message: message,
            line: lineno,
            column: colno,
            stack: (error && error.stack) || '',
            source: source ? source.split('/').pop() : 'app/index.html'
          }}
        }}, '*');
        return true;
      }};

      // Mock native capability surface so device-flavored app code runs
      // without a real device behind it.
      window.AtelierNative = {{
        getUsageStats: function () {{
          return Promise.resolve({{ screenTime: '4h 20m', topApp: 'Social' }});
        }},
        requestPermission: function (permission) {{
          console.log('Permission requested:', permission);
          return Promise.resolve(true);
        }},
        showToast: function (message) {{
          alert('App message: ' + message);
        }},
        vibrate: function (pattern) {{
          if (window.navigator.vibrate) {{
            window.navigator.vibrate(pattern || 200);
          }}
        }}
      }};
    </script>"
    )
}
