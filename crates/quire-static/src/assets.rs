//! Stylesheet handling for the built-in theme.

/// Asset pipeline utilities.
pub struct AssetPipeline;

impl AssetPipeline {
    /// The default theme stylesheet.
    pub fn generate_css() -> String {
        DEFAULT_CSS.to_string()
    }

    /// Minify CSS using lightningcss.
    pub fn minify_css(css: &str) -> Result<String, String> {
        use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};

        let stylesheet = StyleSheet::parse(css, ParserOptions::default())
            .map_err(|e| format!("CSS parse error: {}", e))?;

        let minified = stylesheet
            .to_css(PrinterOptions {
                minify: true,
                ..Default::default()
            })
            .map_err(|e| format!("CSS minify error: {}", e))?;

        Ok(minified.code)
    }

    /// Minify when asked, keeping the original text if minification fails.
    pub fn prepare_css(css: String, minify: bool) -> String {
        if !minify {
            return css;
        }

        match Self::minify_css(&css) {
            Ok(minified) => minified,
            Err(e) => {
                tracing::warn!("Publishing unminified stylesheet: {}", e);
                css
            }
        }
    }
}

const DEFAULT_CSS: &str = r#"/* quire default theme */

:root {
  --background: #fdfdfc;
  --foreground: #1f2328;
  --muted: #6e7781;
  --accent: #b3421f;
  --border: #e4e4e0;
  --content-width: 42rem;
}

@media (prefers-color-scheme: dark) {
  :root {
    --background: #16181c;
    --foreground: #e6e6e3;
    --muted: #9198a1;
    --accent: #f08b5f;
    --border: #2c3036;
  }
}

* {
  box-sizing: border-box;
}

body {
  margin: 0;
  font-family: var(--font-sans, system-ui, -apple-system, sans-serif);
  background: var(--background);
  color: var(--foreground);
  line-height: 1.65;
}

a {
  color: var(--accent);
}

.wrapper {
  max-width: var(--content-width);
  margin: 0 auto;
  padding: 0 1.25rem;
}

/* Header */
.site-header {
  border-bottom: 1px solid var(--border);
  padding: 1.25rem 0;
  margin-bottom: 2rem;
}

.site-header .wrapper {
  display: flex;
  flex-wrap: wrap;
  align-items: baseline;
  justify-content: space-between;
  gap: 1rem;
}

.site-name {
  font-weight: 700;
  font-size: 1.25rem;
  color: var(--foreground);
  text-decoration: none;
}

.site-header nav ul {
  display: flex;
  gap: 1rem;
  list-style: none;
  margin: 0;
  padding: 0;
}

.site-header nav a {
  color: var(--muted);
  text-decoration: none;
}

.site-header nav a:hover {
  color: var(--foreground);
}

/* Listings */
.item-list {
  list-style: none;
  padding: 0;
}

.item-list li {
  padding: 1rem 0;
  border-bottom: 1px solid var(--border);
}

.item-list h2 {
  margin: 0;
  font-size: 1.25rem;
}

.item-list h2 a {
  color: var(--foreground);
  text-decoration: none;
}

time {
  color: var(--muted);
  font-size: 0.875rem;
}

/* Items */
.item h1 {
  margin-bottom: 0.25rem;
}

.tags {
  display: flex;
  flex-wrap: wrap;
  gap: 0.5rem;
  list-style: none;
  padding: 0;
}

.tags a {
  font-size: 0.8rem;
  padding: 0.125rem 0.5rem;
  border: 1px solid var(--border);
  border-radius: 999px;
  text-decoration: none;
}

.content img {
  max-width: 100%;
}

.content pre {
  border: 1px solid var(--border);
  border-radius: 0.375rem;
  padding: 1rem;
  overflow-x: auto;
  font-size: 0.875rem;
}

.content code {
  font-family: var(--font-mono, ui-monospace, monospace);
  font-size: 0.9em;
}

.content blockquote {
  margin: 0;
  padding-left: 1rem;
  border-left: 3px solid var(--border);
  color: var(--muted);
}

/* Footer */
.site-footer {
  margin-top: 3rem;
  padding: 2rem 0;
  border-top: 1px solid var(--border);
  text-align: center;
  color: var(--muted);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_css() {
        let css = AssetPipeline::generate_css();
        assert!(css.contains(":root"));
        assert!(css.contains("--background"));
        assert!(css.contains(".item-list"));
    }

    #[test]
    fn minifies_css() {
        let css = r#"
.button {
    background-color: blue;
    padding: 10px;
}
        "#;

        let minified = AssetPipeline::minify_css(css).unwrap();

        assert!(!minified.contains('\n'));
        assert!(minified.contains(".button"));
    }

    #[test]
    fn keeps_css_when_not_minifying() {
        let css = ".a {\n  color: red;\n}\n".to_string();
        assert_eq!(AssetPipeline::prepare_css(css.clone(), false), css);
    }
}
