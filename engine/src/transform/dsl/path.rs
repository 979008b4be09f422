//! Source path rewriting for array traversal.
//!
//! While an array node walks its elements it scopes the rewrite to the element
//! being built. Nested arrays push one scope per level, so a path such as
//! `$.a[*].b[*].c` resolves to `$.a[1].b[0].c` for the inner element 0 of the
//! outer element 1.

use std::borrow::Cow;

/// Path language of a source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathDialect {
    JsonPath,
    XPath,
}

#[derive(Debug, Clone)]
struct Scope {
    /// Fully qualified path of the current element in the source document
    element: String,
    index: usize,
}

/// Stack of array scopes active while a subtree is transformed.
#[derive(Debug, Clone, Default)]
pub struct PathRewrite {
    scopes: Vec<Scope>,
}

impl PathRewrite {
    /// No array scope: paths are used as written.
    pub fn root() -> Self {
        Self::default()
    }

    /// Rewrite for element `index`, located at `element` in the source.
    pub fn scoped(&self, element: String, index: usize) -> Self {
        let mut scopes = self.scopes.clone();
        scopes.push(Scope { element, index });
        Self { scopes }
    }

    /// Rewrite a declared source path for the current scope.
    pub fn apply<'p>(&self, path: &'p str, dialect: PathDialect) -> Cow<'p, str> {
        match dialect {
            PathDialect::JsonPath => self.apply_json(path),
            PathDialect::XPath => self.apply_xpath(path),
        }
    }

    fn apply_json<'p>(&self, path: &'p str) -> Cow<'p, str> {
        if let Some(rest) = path.strip_prefix('@') {
            return match self.scopes.last() {
                Some(scope) => Cow::Owned(format!("{}{}", scope.element, rest)),
                None => Cow::Owned(format!("${rest}")),
            };
        }
        if self.scopes.is_empty() || !path.contains("[*]") {
            return Cow::Borrowed(path);
        }

        // Each wildcard takes the index of the scope at the same depth, outer first.
        let mut out = String::with_capacity(path.len());
        let mut scopes = self.scopes.iter();
        let mut rest = path;
        while let Some(pos) = rest.find("[*]") {
            out.push_str(&rest[..pos]);
            match scopes.next() {
                Some(scope) => out.push_str(&format!("[{}]", scope.index)),
                None => out.push_str("[*]"),
            }
            rest = &rest[pos + 3..];
        }
        out.push_str(rest);
        Cow::Owned(out)
    }

    fn apply_xpath<'p>(&self, path: &'p str) -> Cow<'p, str> {
        let Some(scope) = self.scopes.last() else {
            return Cow::Borrowed(path);
        };
        if path.starts_with('/') || path.starts_with('(') {
            return Cow::Borrowed(path);
        }
        match path {
            "" | "." => Cow::Owned(scope.element.clone()),
            relative => Cow::Owned(format!("{}/{}", scope.element, relative)),
        }
    }
}

/// Translate a JSON-style path into the XPath subset, for implicit rules on
/// XML sources: `$.a.b` -> `/*/a/b`, `@.a` -> `a`, `@` -> `.`.
pub fn json_to_xpath(path: &str) -> String {
    let (prefix, rest) = if let Some(rest) = path.strip_prefix('$') {
        ("/*", rest)
    } else if let Some(rest) = path.strip_prefix('@') {
        ("", rest)
    } else {
        ("", path)
    };

    let steps: Vec<&str> = rest
        .split('.')
        .filter(|s| !s.is_empty())
        .map(|s| s.trim_end_matches("[*]"))
        .collect();

    match (prefix, steps.is_empty()) {
        ("", true) => ".".to_string(),
        ("", false) => steps.join("/"),
        (root, true) => root.to_string(),
        (root, false) => format!("{}/{}", root, steps.join("/")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_rewrite_is_identity() {
        let rw = PathRewrite::root();
        assert_eq!(rw.apply("$.a[*].b", PathDialect::JsonPath), "$.a[*].b");
        assert_eq!(rw.apply("@.id", PathDialect::JsonPath), "$.id");
        assert_eq!(rw.apply("name", PathDialect::XPath), "name");
    }

    #[test]
    fn test_wildcards_take_scope_indices_outer_first() {
        let rw = PathRewrite::root()
            .scoped("$.array1[1]".into(), 1)
            .scoped("$.array1[1].array2[0]".into(), 0);
        assert_eq!(
            rw.apply("$.array1[*].array2[*].name", PathDialect::JsonPath),
            "$.array1[1].array2[0].name"
        );
        assert_eq!(rw.apply("$.other[*]", PathDialect::JsonPath), "$.other[1]");
    }

    #[test]
    fn test_relative_json_path() {
        let rw = PathRewrite::root().scoped("$.data.contributors[1]".into(), 1);
        assert_eq!(rw.apply("@.fullname", PathDialect::JsonPath), "$.data.contributors[1].fullname");
        assert_eq!(rw.apply("@", PathDialect::JsonPath), "$.data.contributors[1]");
    }

    #[test]
    fn test_relative_xpath() {
        let rw = PathRewrite::root().scoped("(/league/team)[2]".into(), 1);
        assert_eq!(rw.apply("name", PathDialect::XPath), "(/league/team)[2]/name");
        assert_eq!(rw.apply("@id", PathDialect::XPath), "(/league/team)[2]/@id");
        assert_eq!(rw.apply(".", PathDialect::XPath), "(/league/team)[2]");
        assert_eq!(rw.apply("/league/@name", PathDialect::XPath), "/league/@name");
    }

    #[test]
    fn test_json_to_xpath() {
        assert_eq!(json_to_xpath("$.league.name"), "/*/league/name");
        assert_eq!(json_to_xpath("@.city"), "city");
        assert_eq!(json_to_xpath("@"), ".");
        assert_eq!(json_to_xpath("$"), "/*");
    }
}
