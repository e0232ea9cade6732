//! Redirect URL construction for launch routing.

use url::form_urlencoded;

/// Which routing rule produced a launch redirect, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    PageTitle,
    PageId,
    CustomPageId,
    LinkMap,
    CollectionHome,
    PrimaryHome,
}

impl RouteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PageTitle => "page_title",
            Self::PageId => "page_id",
            Self::CustomPageId => "custom_page_id",
            Self::LinkMap => "link_map",
            Self::CollectionHome => "collection_home",
            Self::PrimaryHome => "primary_home",
        }
    }
}

/// Page ids are plain non-negative integers; decimal and exponent forms
/// such as `10.0` or `1e1` are not page ids.
pub(crate) fn is_numeric(raw: &str) -> bool {
    raw.trim().parse::<u64>().is_ok()
}

/// `<base>/<path>?content_only` with exactly one separating slash.
pub(crate) fn page_title_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}?content_only",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// `<base>?p=<id>&content_only&lti_context_id=<ctx>[&lti_nav]`.
pub(crate) fn page_id_url(base: &str, page_id: &str, context_id: &str, nav: bool) -> String {
    let context: String = form_urlencoded::byte_serialize(context_id.as_bytes()).collect();
    let mut url = format!(
        "{base}?p={}&content_only&lti_context_id={context}",
        page_id.trim()
    );
    if nav {
        url.push_str("&lti_nav");
    }
    url
}

pub(crate) fn collection_home_url(base: &str) -> String {
    format!("{}/?content_only", base.trim_end_matches('/'))
}
