//! Static landing page used whenever provider output is unavailable or unusable.

const DEFAULT_NAME: &str = "Your Project";
const DEFAULT_DESCRIPTION: &str = "Something great is on the way.";
const DEFAULT_PURPOSE: &str = "Get started";

/// Renders a complete, self-contained HTML page. Blank or missing fields use defaults.
pub fn render_fallback_page(
    name: Option<&str>,
    description: Option<&str>,
    purpose: Option<&str>,
) -> String {
    let name = escape_html(non_blank_or(name, DEFAULT_NAME));
    let description = escape_html(non_blank_or(description, DEFAULT_DESCRIPTION));
    let purpose = escape_html(non_blank_or(purpose, DEFAULT_PURPOSE));

    format!(
        r##"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>{name}</title>
    <style>
      body {{ font-family: system-ui, -apple-system, sans-serif; margin: 0; background: #f7f7fb; color: #1d1d29; }}
      main {{ max-width: 640px; margin: 0 auto; padding: 96px 24px; text-align: center; }}
      h1 {{ font-size: 2.5rem; margin-bottom: 16px; }}
      p {{ font-size: 1.15rem; line-height: 1.6; color: #4a4a5e; }}
      a.cta {{ display: inline-block; margin-top: 32px; padding: 14px 28px; border-radius: 8px; background: #7c5cff; color: #fff; text-decoration: none; font-weight: 600; }}
    </style>
  </head>
  <body>
    <main>
      <h1>{name}</h1>
      <p>{description}</p>
      <a class="cta" href="#get-started">{purpose}</a>
    </main>
  </body>
</html>
"##
    )
}

fn non_blank_or<'a>(value: Option<&'a str>, default: &'a str) -> &'a str {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(default)
}

pub(crate) fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
