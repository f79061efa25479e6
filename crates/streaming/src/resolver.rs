//! Part-reference resolution for the LDraw parts library CDN.
//!
//! The upstream library is case-sensitive but inconsistently cased, and
//! loaders probe several directory guesses (`models/`, `p/`, `parts/`) per
//! reference. [`PathResolver`] rewrites every request into the one location
//! the file actually lives at, then routes CDN traffic through the local
//! proxy. Resolution is purely syntactic and never touches the network.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

pub const PARTS_LIBRARY_HOST: &str = "cdn.jsdelivr.net";
pub const CDN_BASE: &str =
    "https://cdn.jsdelivr.net/gh/gkjohnson/ldraw-parts-library@master/complete/ldraw/";
pub const PART_EXTENSION: &str = ".dat";
pub const LDCONFIG_FILE_NAME: &str = "LDConfig.ldr";
pub const PROXY_ENDPOINT: &str = "/proxy/ldr";

const LIBRARY_ROOT_SEGMENT: &str = "/ldraw/";
const UNOFFICIAL_PREFIX: &str = "unofficial/";

// Applied in order, anchored on segment boundaries.
const DIRECTORY_COLLAPSES: [(&str, &str); 6] = [
    ("/models/p/", "/p/"),
    ("/models/parts/", "/parts/"),
    ("/p/parts/", "/parts/"),
    ("/parts/p/", "/p/"),
    ("/p/s/", "/parts/s/"),
    ("/models/s/", "/parts/s/"),
];

const PRIMITIVE_PREFIXES: &[&str] = &[
    "stu", "box", "rect", "edge", "ring", "disc", "ndis", "cyl", "con", "tri", "axl", "peghole",
    "bush", "logo", "npeg", "beam", "tooth", "filstud", "clh", "t0", "t1", "r0",
];

const HIRES_DIRS: [&str; 2] = ["48", "8"];

// Only these directory names are ever collapsed when doubled; any other
// repeated segment is part of a real path.
const LIBRARY_DIRS: [&str; 4] = ["models", "parts", "p", "s"];

static FRACTION_PRIMITIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+-\d+").expect("valid primitive pattern"));
static SUBPART: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+[a-z]?s\d+").expect("valid subpart pattern"));

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum UrlKind {
    AbsoluteHttp,
    Blob,
    Proxy,
    LocalRelative,
}

/// A fetchable URL together with its classification.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedUrl {
    kind: UrlKind,
    url: String,
}

impl ResolvedUrl {
    pub fn classify(url: impl Into<String>) -> Self {
        let url = url.into();
        let kind = if url.starts_with("blob:") {
            UrlKind::Blob
        } else if is_proxy_url(&url) {
            UrlKind::Proxy
        } else if url.starts_with("http://") || url.starts_with("https://") {
            UrlKind::AbsoluteHttp
        } else {
            UrlKind::LocalRelative
        };
        Self { kind, url }
    }

    pub fn kind(&self) -> UrlKind {
        self.kind
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }

    pub fn into_string(self) -> String {
        self.url
    }
}

impl std::fmt::Display for ResolvedUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.url)
    }
}

/// Partition of part-file names that decides their library directory.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PartClass {
    Primitive,
    Subpart,
    Part,
}

pub fn classify_part_file(file_name: &str) -> PartClass {
    let name = file_name.to_ascii_lowercase();
    if FRACTION_PRIMITIVE.is_match(&name) || PRIMITIVE_PREFIXES.iter().any(|p| name.starts_with(p))
    {
        PartClass::Primitive
    } else if SUBPART.is_match(&name) {
        PartClass::Subpart
    } else {
        PartClass::Part
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverOptions {
    /// Replacement for the main model file (for example a blob of an upload).
    pub override_main_url: Option<String>,
    /// Where the main model logically lives.
    pub main_model_url: Option<String>,
    pub use_proxy: bool,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            override_main_url: None,
            main_model_url: None,
            use_proxy: true,
        }
    }
}

/// Hook a model loader consults for every resource before fetching it.
pub trait UrlModifier: Send + Sync {
    fn modify_url(&self, url: &str) -> String;
}

#[derive(Debug, Clone, Default)]
pub struct PathResolver {
    options: ResolverOptions,
}

impl PathResolver {
    pub fn new(options: ResolverOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    pub fn resolve(&self, raw: &str) -> ResolvedUrl {
        if raw.starts_with("blob:") || is_proxy_url(raw) {
            return ResolvedUrl::classify(raw);
        }

        let mut url = normalize_path(raw);

        if let (Some(target), Some(main)) = (
            self.options.override_main_url.as_deref(),
            self.options.main_model_url.as_deref(),
        ) && let Some((absolute, main)) = absolutize(&url, &normalize_path(main))
        {
            if absolute == main {
                return ResolvedUrl::classify(target);
            }
            if !is_absolute(&url) {
                url = absolute.to_string();
            }
        }

        let url = correct_library_path(&url);

        if self.options.use_proxy && url.starts_with(CDN_BASE) {
            return ResolvedUrl::classify(proxied(&url));
        }
        ResolvedUrl::classify(url)
    }
}

impl UrlModifier for PathResolver {
    fn modify_url(&self, url: &str) -> String {
        self.resolve(url).into_string()
    }
}

/// `<PROXY_ENDPOINT>?url=<percent-encoded url>`
pub fn proxied(url: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(url.as_bytes()).collect();
    format!("{PROXY_ENDPOINT}?url={encoded}")
}

/// Direct CDN URL for a library-relative path such as `parts/3001.dat`.
pub fn library_url(relative_path: &str) -> String {
    format!("{CDN_BASE}{}", relative_path.trim_start_matches('/'))
}

pub fn is_proxy_url(url: &str) -> bool {
    url.strip_prefix(PROXY_ENDPOINT)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('?'))
}

fn is_absolute(url: &str) -> bool {
    Url::parse(url).is_ok()
}

/// Parses `main` and resolves `url` against it. `None` if either is malformed.
fn absolutize(url: &str, main: &str) -> Option<(Url, Url)> {
    let main = Url::parse(main).ok()?;
    let absolute = main.join(url).ok()?;
    Some((absolute, main))
}

/// Unifies separators and drops empty segments and immediately repeated
/// library directories (`parts/parts`, `p/p`, ...).
pub fn normalize_path(raw: &str) -> String {
    let unified = raw.replace('\\', "/");

    let split_at = unified.find(['?', '#']).unwrap_or(unified.len());
    let (location, suffix) = unified.split_at(split_at);

    let (origin, path) = match location.find("://") {
        Some(scheme_end) => {
            let after = scheme_end + 3;
            match location[after..].find('/') {
                Some(slash) => location.split_at(after + slash),
                None => (location, ""),
            }
        }
        None => ("", location),
    };

    let leading = path.starts_with('/');
    let trailing = path.len() > 1 && path.ends_with('/');

    let mut segments: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        if seg.is_empty() || (segments.last() == Some(&seg) && LIBRARY_DIRS.contains(&seg)) {
            continue;
        }
        segments.push(seg);
    }

    let mut out = String::with_capacity(unified.len());
    out.push_str(origin);
    if leading {
        out.push('/');
    }
    out.push_str(&segments.join("/"));
    if trailing && !segments.is_empty() {
        out.push('/');
    }
    out.push_str(suffix);
    out
}

fn is_library_part(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    parsed.host_str() == Some(PARTS_LIBRARY_HOST)
        && parsed.path().to_ascii_lowercase().ends_with(PART_EXTENSION)
}

/// Lower-cases the file name and moves it into the directory its class lives in.
pub fn correct_library_path(url: &str) -> String {
    if !is_library_part(url) {
        return url.to_string();
    }
    let Some(root_idx) = url.rfind(LIBRARY_ROOT_SEGMENT) else {
        return url.to_string();
    };

    let (root, relative) = url.split_at(root_idx + LIBRARY_ROOT_SEGMENT.len());
    let (prefix, relative) = match relative.strip_prefix(UNOFFICIAL_PREFIX) {
        Some(rest) => (UNOFFICIAL_PREFIX, rest),
        None => ("", relative),
    };
    let (dir, file) = match relative.rfind('/') {
        Some(i) => relative.split_at(i + 1),
        None => ("", relative),
    };
    let file = file.to_ascii_lowercase();

    let mut dir = format!("/{dir}");
    for (wrong, right) in DIRECTORY_COLLAPSES {
        if dir.contains(wrong) {
            dir = dir.replace(wrong, right);
        }
    }

    let dir = match classify_part_file(&file) {
        PartClass::Primitive if !dir.starts_with("/p/") => {
            let hires = dir
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .filter(|last| HIRES_DIRS.contains(last));
            match hires {
                Some(h) => format!("/p/{h}/"),
                None => "/p/".to_string(),
            }
        }
        PartClass::Subpart if dir != "/parts/s/" => "/parts/s/".to_string(),
        PartClass::Part if dir == "/" => "/parts/".to_string(),
        _ => dir,
    };

    format!("{root}{prefix}{}{file}", &dir[1..])
}
