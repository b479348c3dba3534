//! Built-in HTML templates.
//!
//! Each template carries both placeholders. Styling is given inline so the
//! embedded engine honours it; the `<style>` block is for browser engines.

/// Stock report template: a bordered, full-width table titled through `<title>`.
pub fn default_template() -> &'static str {
    r##"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>[%title%]</title>
    <style>
        body { font-family: Helvetica, Arial, sans-serif; font-size: 11px; }
        table { border-collapse: collapse; width: 100%; }
        td { border: 1px solid #999; padding: 4px 6px; }
        tr:first-child td { background: #e2e8f0; font-weight: bold; }
    </style>
</head>
<body>
    <table border="1" cellpadding="4" width="100%" style="font-size: 10px">
        [%rows%]
    </table>
</body>
</html>
"##
}

/// Minimal template: heading and table, no styling.
pub fn plain_template() -> &'static str {
    r#"<html><body><h1>[%title%]</h1><table>[%rows%]</table></body></html>"#
}

/// Look up a built-in template by name.
pub fn builtin(name: &str) -> Option<&'static str> {
    match name {
        "default" => Some(default_template()),
        "plain" => Some(plain_template()),
        _ => None,
    }
}
