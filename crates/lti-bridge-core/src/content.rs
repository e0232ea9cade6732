//! Inline "Add LTI link" / "Remove LTI link" affordances for a page.

use crate::accounts::can_manage_links;
use crate::error::BridgeResult;
use crate::links::LinkMapper;
use crate::model::{CollectionId, LinkLookup};
use crate::nonce::NonceAction;
use crate::session::SessionStore;
use crate::store::{AccountStore, LinkStore};
use url::form_urlencoded;

/// The page the affordances are rendered for.
#[derive(Debug, Clone, Default)]
pub struct PageView {
    /// Permalink of the page; mappings made here target it.
    pub target: String,
    pub collection: Option<CollectionId>,
    /// Page rendered with `content_only`.
    pub content_only: bool,
    /// Page reached through a `page_title` deep link.
    pub deep_link: bool,
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn query(pairs: &[(&str, &str)]) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

/// HTML fragment offering to map the session's last launched link onto
/// `page` and to remove maps already targeting it. Empty when the session
/// cannot manage links or the page is shown embedded.
pub fn render_link_affordances<S: AccountStore + LinkStore>(
    mapper: &LinkMapper<S>,
    session: &impl SessionStore,
    page: &PageView,
    endpoint: &str,
    primary: CollectionId,
) -> BridgeResult<String> {
    if page.content_only || page.deep_link || page.target.is_empty() {
        return Ok(String::new());
    }
    let scope = page.collection.unwrap_or(primary);
    if !can_manage_links(mapper.store(), session, scope)? {
        return Ok(String::new());
    }

    let blog = page.collection.map(|c| c.to_string()).unwrap_or_default();
    let mut add: Option<(String, String)> = None;

    let unmapped = match mapper.get_link("", true, session)? {
        LinkLookup::NotFound { resource_link_id } => resource_link_id,
        LinkLookup::Found(map) if map.target_action.is_empty() => map.resource_link_id,
        LinkLookup::Found(_) => String::new(),
    };
    if !unmapped.is_empty() {
        let nonce = mapper.nonce_for(NonceAction::MapLink, session);
        let href = format!(
            "{endpoint}?{}",
            query(&[
                ("lti_nonce", nonce.as_str()),
                ("resource_link_id", unmapped.as_str()),
                ("target_action", page.target.as_str()),
                ("blog", blog.as_str()),
            ])
        );
        add = Some((unmapped, href));
    }

    let mut removes = Vec::new();
    let existing = mapper.find_links_by_target(&page.target)?;
    if !existing.is_empty() {
        let nonce = mapper.nonce_for(NonceAction::UnmapLink, session);
        for map in &existing {
            let map_id = map.id.to_string();
            if add.as_ref().is_some_and(|(id, _)| *id == map.resource_link_id) {
                add = None;
            }
            let href = format!(
                "{endpoint}?{}",
                query(&[
                    ("lti_nonce", nonce.as_str()),
                    ("action", "delete"),
                    ("ID", map_id.as_str()),
                    ("blog", blog.as_str()),
                ])
            );
            removes.push(format!(
                r#"<a class="btn red" href="{}" title="{}">Remove LTI link</a>"#,
                escape(&href),
                escape(&format!("resource_link_id({})", map.resource_link_id))
            ));
        }
    }

    let mut items = Vec::new();
    if let Some((id, href)) = add {
        items.push(format!(
            r#"<div class="lti addmap"><a class="btn blue" href="{}" title="{}">Add LTI link</a></div>"#,
            escape(&href),
            escape(&format!("resource_link_id({id})"))
        ));
    }
    items.extend(removes);

    if items.is_empty() {
        return Ok(String::new());
    }
    Ok(format!(
        r#"<div class="lti-mapping"><ul class="lti-mapping"><li>{}</li></ul></div>"#,
        items.join("</li><li>")
    ))
}
