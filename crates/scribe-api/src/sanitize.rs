//! HTML sanitization for post bodies.
//!
//! Runs on the read path only. Stored content keeps the author's markup, so
//! the policy below can change without migrating data.

use ammonia::Builder;

/// The editor marks alignment, indentation and code blocks with `ql-*`
/// classes; keep `class` so that formatting survives.
fn policy() -> Builder<'static> {
    let mut builder = Builder::default();
    builder.add_generic_attributes(&["class"]);
    builder
}

/// Strip scripts, event handlers, `javascript:` URLs and other executable
/// constructs; keep ordinary formatting markup. Idempotent.
pub fn sanitize(raw_html: &str) -> String {
    policy().clean(raw_html).to_string()
}
