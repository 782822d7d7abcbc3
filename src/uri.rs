//! Provide methods and data structures for handling URIs.
//!
//! References are parsed following RFC 3986 and made absolute against a base
//! with the algorithm of section 5.2.
//! Components are kept in their escaped form, so [`XmlURI::save`] writes back
//! exactly what was parsed.

use std::{borrow::Cow, fmt::Display};

fn is_reserved(c: u8) -> bool {
    matches!(
        c,
        b';' | b'/' | b'?' | b':' | b'@' | b'&' | b'=' | b'+' | b'$' | b',' | b'[' | b']' | b'#'
    )
}

fn is_unreserved(c: u8) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, b'-' | b'.' | b'_' | b'~')
}

fn is_sub_delim(c: u8) -> bool {
    matches!(
        c,
        b'!' | b'$' | b'&' | b'\'' | b'(' | b')' | b'*' | b'+' | b',' | b';' | b'='
    )
}

fn to_hexdigit(c: u8) -> char {
    (if c < 10 { c + b'0' } else { c - 10 + b'A' }) as char
}

// `pct-encoded   = "%" HEXDIG HEXDIG`
fn starts_with_pct_encoded(p: &str) -> bool {
    let p = p.as_bytes();
    p.len() >= 3 && p[0] == b'%' && p[1].is_ascii_hexdigit() && p[2].is_ascii_hexdigit()
}

/// Returns the length of the leading `pchar` of `p`, or `None`.
///
/// `pchar         = unreserved / pct-encoded / sub-delims / ":" / "@"`
fn leading_pchar(p: &str) -> Option<usize> {
    let &c = p.as_bytes().first()?;
    if starts_with_pct_encoded(p) {
        Some(3)
    } else if is_unreserved(c) || is_sub_delim(c) || c == b':' || c == b'@' {
        Some(1)
    } else {
        None
    }
}

/// Skip `*pchar`, additionally accepting the bytes in `extra`.
/// A `:` is refused when `no_colon` is set.
fn skip_pchars<'a>(mut s: &'a str, extra: &[u8], no_colon: bool) -> &'a str {
    loop {
        let Some(&c) = s.as_bytes().first() else {
            return s;
        };
        if no_colon && c == b':' {
            return s;
        }
        if let Some(len) = leading_pchar(s) {
            s = &s[len..];
        } else if extra.contains(&c) {
            s = &s[1..];
        } else {
            return s;
        }
    }
}

/// A parsed URI reference.
///
/// An absent component is `None`; the path is always present, possibly empty.
/// An authority with an empty host (as in `file:///etc`) has `server == Some("")`.
#[doc(alias = "xmlURI")]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct XmlURI {
    pub scheme: Option<String>,
    pub user: Option<String>,
    pub server: Option<String>,
    pub port: Option<String>,
    pub path: String,
    pub query: Option<String>,
    pub fragment: Option<String>,
}

impl XmlURI {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `s` as an URI reference.
    ///
    /// Returns `None` if `s` is neither an absolute URI nor a relative reference.
    pub fn parse(s: &str) -> Option<Self> {
        let mut uri = Self::new();
        uri.parse_uri_reference(s).ok()?;
        Some(uri)
    }

    pub fn has_authority(&self) -> bool {
        self.server.is_some() || self.user.is_some() || self.port.is_some()
    }

    /// Write the URI back as a string.
    #[doc(alias = "xmlSaveUri")]
    pub fn save(&self) -> String {
        let mut ret = String::new();
        if let Some(scheme) = self.scheme.as_deref() {
            ret.push_str(scheme);
            ret.push(':');
        }
        if self.has_authority() {
            ret.push_str("//");
            if let Some(user) = self.user.as_deref() {
                ret.push_str(user);
                ret.push('@');
            }
            ret.push_str(self.server.as_deref().unwrap_or_default());
            if let Some(port) = self.port.as_deref() {
                ret.push(':');
                ret.push_str(port);
            }
        }
        ret.push_str(&self.path);
        if let Some(query) = self.query.as_deref() {
            ret.push('?');
            ret.push_str(query);
        }
        if let Some(fragment) = self.fragment.as_deref() {
            ret.push('#');
            ret.push_str(fragment);
        }
        ret
    }

    /// ```text
    /// URI-reference = URI / relative-ref
    /// ```
    pub fn parse_uri_reference(&mut self, s: &str) -> Result<(), i32> {
        if self.parse3986_uri(s).is_ok() {
            return Ok(());
        }
        *self = Self::new();
        self.parse3986_relative_ref(s)
    }

    /// ```text
    /// scheme = ALPHA *( ALPHA / DIGIT / "+" / "-" / "." )
    /// ```
    fn parse3986_scheme<'a>(&mut self, s: &'a str) -> Result<&'a str, i32> {
        if !s.starts_with(|c: char| c.is_ascii_alphabetic()) {
            return Err(2);
        }
        let rest = s.trim_start_matches(|c: char| {
            c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.'
        });
        self.scheme = Some(s[..s.len() - rest.len()].to_owned());
        Ok(rest)
    }

    /// ```text
    /// URI = scheme ":" hier-part [ "?" query ] [ "#" fragment ]
    /// ```
    fn parse3986_uri(&mut self, s: &str) -> Result<(), i32> {
        let s = self.parse3986_scheme(s)?;
        let s = s.strip_prefix(':').ok_or(1)?;
        let s = self.parse3986_hier_part(s)?;
        self.parse3986_tail(s)
    }

    /// ```text
    /// relative-ref  = relative-part [ "?" query ] [ "#" fragment ]
    /// relative-part = "//" authority path-abempty
    ///               / path-absolute
    ///               / path-noscheme
    ///               / path-empty
    /// ```
    fn parse3986_relative_ref(&mut self, s: &str) -> Result<(), i32> {
        let s = if let Some(rest) = s.strip_prefix("//") {
            let rest = self.parse3986_authority(rest)?;
            self.parse3986_path(rest, false)
        } else if s.starts_with('/') {
            self.parse3986_path(s, false)
        } else {
            // the first segment of a relative path cannot contain a colon,
            // it would be taken for a scheme
            self.parse3986_path(s, true)
        };
        self.parse3986_tail(s)
    }

    /// ```text
    /// hier-part     = "//" authority path-abempty
    ///               / path-absolute
    ///               / path-rootless
    ///               / path-empty
    /// ```
    fn parse3986_hier_part<'a>(&mut self, s: &'a str) -> Result<&'a str, i32> {
        if let Some(rest) = s.strip_prefix("//") {
            let rest = self.parse3986_authority(rest)?;
            Ok(self.parse3986_path(rest, false))
        } else {
            Ok(self.parse3986_path(s, false))
        }
    }

    /// `[ "?" query ] [ "#" fragment ]`, then the end of input.
    fn parse3986_tail(&mut self, mut s: &str) -> Result<(), i32> {
        if let Some(rest) = s.strip_prefix('?') {
            let end = skip_pchars(rest, b"/?", false);
            self.query = Some(rest[..rest.len() - end.len()].to_owned());
            s = end;
        }
        if let Some(rest) = s.strip_prefix('#') {
            let end = skip_pchars(rest, b"/?", false);
            self.fragment = Some(rest[..rest.len() - end.len()].to_owned());
            s = end;
        }
        if s.is_empty() { Ok(()) } else { Err(1) }
    }

    /// ```text
    /// authority     = [ userinfo "@" ] host [ ":" port ]
    /// ```
    fn parse3986_authority<'a>(&mut self, s: &'a str) -> Result<&'a str, i32> {
        let mut s = s;
        // userinfo  = *( unreserved / pct-encoded / sub-delims / ":" )
        let end = skip_pchars(s, b"", false);
        let candidate = &s[..s.len() - end.len()];
        if let Some(pos) = candidate.find('@') {
            self.user = Some(candidate[..pos].to_owned());
            s = &s[pos + 1..];
        }

        s = self.parse3986_host(s)?;

        if let Some(rest) = s.strip_prefix(':') {
            let end = rest.trim_start_matches(|c: char| c.is_ascii_digit());
            self.port = Some(rest[..rest.len() - end.len()].to_owned());
            s = end;
        }
        // authority is terminated by "/", "?", "#" or the end of the reference
        if s.is_empty() || s.starts_with(['/', '?', '#']) {
            Ok(s)
        } else {
            Err(1)
        }
    }

    /// ```text
    /// host          = IP-literal / IPv4address / reg-name
    /// IP-literal    = "[" ( IPv6address / IPvFuture  ) "]"
    /// reg-name      = *( unreserved / pct-encoded / sub-delims )
    /// ```
    fn parse3986_host<'a>(&mut self, s: &'a str) -> Result<&'a str, i32> {
        if let Some(literal) = s.strip_prefix('[') {
            let end = literal.find(']').ok_or(1)?;
            if !literal[..end]
                .bytes()
                .all(|c| c.is_ascii_hexdigit() || c == b':' || c == b'.' || c == b'v')
            {
                return Err(1);
            }
            self.server = Some(s[..end + 2].to_owned());
            return Ok(&literal[end + 1..]);
        }
        let end = skip_pchars(s, b"", true);
        let host = &s[..s.len() - end.len()];
        if host.contains('@') {
            return Err(1);
        }
        self.server = Some(host.to_owned());
        Ok(end)
    }

    /// Consume a path made of `segment *( "/" segment )`.
    ///
    /// The four RFC 3986 path productions differ only by where they may
    /// begin, which the callers have already decided.
    fn parse3986_path<'a>(&mut self, s: &'a str, no_scheme: bool) -> &'a str {
        let mut rest = skip_pchars(s, b"", no_scheme);
        while let Some(next) = rest.strip_prefix('/') {
            rest = skip_pchars(next, b"", false);
        }
        self.path = s[..s.len() - rest.len()].to_owned();
        rest
    }
}

impl Display for XmlURI {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.save())
    }
}

/// Computes the final URI of the reference `uri` by checking that it is
/// valid and building the final URI using `base`, following section 5.2
/// of RFC 3986.
///
/// An absolute `uri` is returned unchanged. If `base` cannot be parsed,
/// `uri` is returned as it is.
///
/// # Examples
/// ```
/// use xslinc::uri::build_uri;
///
/// assert_eq!(build_uri("sub.xsl", "file:/a/b/main.xsl").as_deref(), Some("file:/a/b/sub.xsl"));
/// assert_eq!(build_uri("http://x/y.xsl", "file:/a/b/main.xsl").as_deref(), Some("http://x/y.xsl"));
/// assert_eq!(build_uri("../c.xsl#frag", "http://h/a/b/").as_deref(), Some("http://h/a/c.xsl#frag"));
/// ```
///
/// Returns a new URI string or `None` if `uri` is not a valid reference.
#[doc(alias = "xmlBuildURI")]
pub fn build_uri(uri: &str, base: &str) -> Option<String> {
    let refe = XmlURI::parse(uri)?;
    if refe.scheme.is_some() {
        // The URI is absolute don't modify.
        return Some(uri.to_owned());
    }
    let Some(bas) = XmlURI::parse(base) else {
        return Some(refe.save());
    };

    let mut res = XmlURI::new();
    if refe.has_authority() {
        // network-path reference
        res.user = refe.user;
        res.server = refe.server;
        res.port = refe.port;
        res.path = normalize_uri_path(&refe.path).into_owned();
        res.query = refe.query;
    } else {
        if refe.path.is_empty() {
            res.path = bas.path.clone();
            res.query = refe.query.or(bas.query);
        } else {
            if refe.path.starts_with('/') {
                res.path = normalize_uri_path(&refe.path).into_owned();
            } else {
                let merged = merge_paths(&bas, &refe.path);
                res.path = normalize_uri_path(&merged).into_owned();
            }
            res.query = refe.query;
        }
        res.user = bas.user;
        res.server = bas.server;
        res.port = bas.port;
    }
    res.scheme = bas.scheme;
    res.fragment = refe.fragment;
    Some(res.save())
}

/// Section 5.2.3: all but the last segment of the base path, followed by the
/// relative path.
fn merge_paths(base: &XmlURI, path: &str) -> String {
    if base.has_authority() && base.path.is_empty() {
        return format!("/{path}");
    }
    match base.path.rfind('/') {
        Some(pos) => format!("{}{path}", &base.path[..=pos]),
        None => path.to_owned(),
    }
}

/// Remove the `.` and `..` segments of `path` (section 5.2.4 of RFC 3986).
///
/// If `path` has no dot segment, no new memory is allocated.
#[doc(alias = "xmlNormalizeURIPath")]
pub fn normalize_uri_path(path: &str) -> Cow<'_, str> {
    if !path.split('/').any(|seg| seg == "." || seg == "..") {
        return Cow::Borrowed(path);
    }

    fn pop_segment(out: &mut String) {
        match out.rfind('/') {
            Some(pos) => out.truncate(pos),
            None => out.clear(),
        }
    }

    let mut input = path;
    let mut out = String::with_capacity(path.len());
    while !input.is_empty() {
        if let Some(rest) = input.strip_prefix("../") {
            input = rest;
        } else if let Some(rest) = input.strip_prefix("./") {
            input = rest;
        } else if input.starts_with("/./") {
            input = &input[2..];
        } else if input == "/." {
            input = "/";
        } else if input.starts_with("/../") {
            input = &input[3..];
            pop_segment(&mut out);
        } else if input == "/.." {
            input = "/";
            pop_segment(&mut out);
        } else if input == "." || input == ".." {
            input = "";
        } else {
            let start = usize::from(input.starts_with('/'));
            let end = input[start..].find('/').map_or(input.len(), |pos| pos + start);
            out.push_str(&input[..end]);
            input = &input[end..];
        }
    }
    Cow::Owned(out)
}

/// Escape the characters that cannot appear in an URI reference, leaving
/// the reserved characters and valid percent-encoded triplets untouched.
///
/// This is heuristic: it makes references such as `my file.xsl` parseable,
/// but does not check the result.
#[doc(alias = "xmlURIEscape")]
pub fn escape_url(s: &str) -> Cow<'_, str> {
    let needs_escape = |i: usize, c: u8| {
        !(is_unreserved(c)
            || is_reserved(c)
            || is_sub_delim(c)
            || (c == b'%' && starts_with_pct_encoded(&s[i..])))
    };
    if !s.bytes().enumerate().any(|(i, c)| needs_escape(i, c)) {
        return Cow::Borrowed(s);
    }
    let mut ret = String::with_capacity(s.len() + 8);
    for (i, c) in s.bytes().enumerate() {
        if needs_escape(i, c) {
            ret.push('%');
            ret.push(to_hexdigit(c >> 4));
            ret.push(to_hexdigit(c & 0x0F));
        } else {
            ret.push(c as char);
        }
    }
    Cow::Owned(ret)
}
