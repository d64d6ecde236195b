//! # Template keys
//!
//! A template key is a schema key name containing one or more `${param}`
//! placeholders, e.g. `ocr/provider/${id}`. It stands for a family of concrete
//! runtime keys (`ocr/provider/system`, `ocr/provider/a-1`, ...) sharing one
//! value type and one default.
//!
//! Matching builds an anchored regular expression per template: the literal
//! text is escaped and every placeholder becomes `([A-Za-z0-9_-]+)`, so a
//! placeholder never matches an empty segment or a `/`.

use once_cell::sync::Lazy;
use regex::Regex;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{[^}]*\}").expect("placeholder pattern is a valid regex")
});

/// Pattern a single placeholder expands to: one or more word or hyphen characters.
const SEGMENT_PATTERN: &str = "([A-Za-z0-9_-]+)";

/// Returns true if `name` contains at least one `${...}` placeholder.
///
/// # Examples
///
/// ```
/// use tiercache_core::template::is_template;
///
/// assert!(is_template("ocr/provider/${id}"));
/// assert!(!is_template("ui.theme"));
/// assert!(!is_template("price$"));
/// ```
pub fn is_template(name: &str) -> bool {
    PLACEHOLDER.is_match(name)
}

/// Number of placeholders in a template name.
pub fn placeholder_count(name: &str) -> usize {
    PLACEHOLDER.find_iter(name).count()
}

/// Builds the anchored matcher for a template name.
///
/// Every regex metacharacter in the literal portions is escaped; the
/// placeholders themselves are replaced, never escaped.
///
/// # Examples
///
/// ```
/// use tiercache_core::template::compile;
///
/// let re = compile("ocr/provider/${id}").unwrap();
/// assert!(re.is_match("ocr/provider/system"));
/// assert!(re.is_match("ocr/provider/a-1"));
/// assert!(!re.is_match("ocr/provider/"));
/// assert!(!re.is_match("ocr/providers/system"));
/// ```
pub fn compile(template: &str) -> Result<Regex, regex::Error> {
    let mut pattern = String::with_capacity(template.len() + 16);
    pattern.push('^');

    let mut last = 0;
    for placeholder in PLACEHOLDER.find_iter(template) {
        pattern.push_str(&regex::escape(&template[last..placeholder.start()]));
        pattern.push_str(SEGMENT_PATTERN);
        last = placeholder.end();
    }
    pattern.push_str(&regex::escape(&template[last..]));
    pattern.push('$');

    Regex::new(&pattern)
}

/// Builds a concrete key by substituting `params` into the placeholders in order.
///
/// Returns `None` when the number of params differs from the number of
/// placeholders, or when a param would not be accepted by the template's
/// matcher (empty, or containing characters outside `[A-Za-z0-9_-]`).
///
/// # Examples
///
/// ```
/// use tiercache_core::template::instantiate;
///
/// assert_eq!(
///     instantiate("ocr/provider/${id}", &["system"]).as_deref(),
///     Some("ocr/provider/system")
/// );
/// assert_eq!(instantiate("ocr/provider/${id}", &[]), None);
/// assert_eq!(instantiate("ocr/provider/${id}", &["a/b"]), None);
/// ```
pub fn instantiate(template: &str, params: &[&str]) -> Option<String> {
    if placeholder_count(template) != params.len() {
        return None;
    }
    if !params.iter().all(|param| is_valid_segment(param)) {
        return None;
    }

    let mut key = String::with_capacity(template.len());
    let mut last = 0;
    for (placeholder, param) in PLACEHOLDER.find_iter(template).zip(params) {
        key.push_str(&template[last..placeholder.start()]);
        key.push_str(param);
        last = placeholder.end();
    }
    key.push_str(&template[last..]);
    Some(key)
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// A compiled template, remembering its position in the schema.
#[derive(Debug, Clone)]
pub(crate) struct TemplateMatcher {
    pub(crate) index: usize,
    regex: Regex,
}

impl TemplateMatcher {
    pub(crate) fn new(index: usize, regex: Regex) -> Self {
        Self { index, regex }
    }

    pub(crate) fn matches(&self, key: &str) -> bool {
        self.regex.is_match(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_matches_word_and_hyphen() {
        let re = compile("ocr/provider/${id}").unwrap();
        assert!(re.is_match("ocr/provider/system"));
        assert!(re.is_match("ocr/provider/a-1"));
        assert!(re.is_match("ocr/provider/under_score"));
    }

    #[test]
    fn test_placeholder_rejects_empty_and_partial() {
        let re = compile("ocr/provider/${id}").unwrap();
        assert!(!re.is_match("ocr/provider/"));
        assert!(!re.is_match("ocr/providers/system"));
        assert!(!re.is_match("prefix/ocr/provider/system"));
        assert!(!re.is_match("ocr/provider/system/extra"));
        assert!(!re.is_match("ocr/provider/a.b"));
    }

    #[test]
    fn test_literal_metacharacters_are_escaped() {
        // `.` must not act as a wildcard
        let re = compile("app.window.${id}.bounds").unwrap();
        assert!(re.is_match("app.window.main.bounds"));
        assert!(!re.is_match("appXwindowXmainXbounds"));

        let re = compile("scores(+)[${n}]").unwrap();
        assert!(re.is_match("scores(+)[7]"));
        assert!(!re.is_match("scores+[7]"));
    }

    #[test]
    fn test_multiple_placeholders() {
        let re = compile("kb/${base}/doc/${doc}").unwrap();
        assert!(re.is_match("kb/main/doc/42"));
        assert!(!re.is_match("kb/main/doc/"));
        assert!(!re.is_match("kb//doc/42"));
        assert_eq!(placeholder_count("kb/${base}/doc/${doc}"), 2);
    }

    #[test]
    fn test_template_without_placeholders_matches_exactly() {
        let re = compile("a+b").unwrap();
        assert!(re.is_match("a+b"));
        assert!(!re.is_match("aab"));
    }

    #[test]
    fn test_instantiate_multiple() {
        assert_eq!(
            instantiate("kb/${base}/doc/${doc}", &["main", "42"]).as_deref(),
            Some("kb/main/doc/42")
        );
        assert_eq!(instantiate("kb/${base}/doc/${doc}", &["main"]), None);
        assert_eq!(instantiate("kb/${base}/doc/${doc}", &["main", ""]), None);
    }

    #[test]
    fn test_instantiated_key_matches_its_template() {
        let template = "assistant.${id}.draft";
        let key = instantiate(template, &["x-9"]).unwrap();
        assert!(compile(template).unwrap().is_match(&key));
    }
}
