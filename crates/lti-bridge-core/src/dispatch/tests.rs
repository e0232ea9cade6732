use super::*;
use crate::capability::{Capability, SiteRole};
use crate::error::{BridgeError, BridgeResult};
use crate::model::{Account, AccountId, Collection, EnrollmentRecord, LinkMap, NewAccount};
use crate::nonce::NonceAction;
use crate::session::{RequestSession, SessionChange};
use crate::store::SqliteStore;

const COURSE: CollectionId = CollectionId(12);
const HOME: &str = "https://press.example.edu";

fn dispatcher() -> LaunchDispatcher<SqliteStore> {
    let store = SqliteStore::memory().unwrap();
    store
        .add_collection(COURSE, "https://press.example.edu/bio101", "Bio")
        .unwrap();
    let config = BridgeConfig {
        primary_home_url: HOME.to_string(),
        ..BridgeConfig::default()
    };
    LaunchDispatcher::new(store, &config, NonceIssuer::new(b"k".to_vec(), 86_400))
}

fn launch() -> LaunchContext {
    LaunchContext {
        login: "jdoe".into(),
        context_id: "ctx 1".into(),
        resource_link_id: "rl-1".into(),
        ..LaunchContext::default()
    }
}

fn route(d: &LaunchDispatcher<SqliteStore>, ctx: &LaunchContext) -> (RouteKind, String) {
    let (kind, redirect) = d.on_launch(ctx, &RequestSession::anonymous()).unwrap();
    (kind, redirect.location)
}

fn editor(d: &LaunchDispatcher<SqliteStore>) -> AccountId {
    let mut session = RequestSession::anonymous();
    let mut ctx = launch();
    ctx.login = "editor".into();
    let id = d
        .resolver()
        .resolve_account(&ctx, &mut session)
        .unwrap()
        .account()
        .unwrap();
    d.store()
        .set_member_role(id, d.primary_collection(), SiteRole::Editor)
        .unwrap();
    id
}

#[test]
fn test_page_title_wins_over_everything() {
    let d = dispatcher();
    d.store().upsert_link("rl-1", "https://x/mapped", None, None).unwrap();
    let mut ctx = launch();
    ctx.target_collection = Some(COURSE);
    ctx.page_title = Some("/chapter-1".into());
    ctx.page_id = Some("10".into());

    assert_eq!(
        route(&d, &ctx),
        (
            RouteKind::PageTitle,
            "https://press.example.edu/bio101/chapter-1?content_only".to_string()
        )
    );
}

#[test]
fn test_page_id_then_custom_page_id() {
    let d = dispatcher();
    let mut ctx = launch();
    ctx.target_collection = Some(COURSE);
    ctx.page_id = Some("10".into());
    ctx.custom_page_id = Some("20".into());
    ctx.post_message_navigation = true;

    assert_eq!(
        route(&d, &ctx),
        (
            RouteKind::PageId,
            "https://press.example.edu/bio101?p=10&content_only&lti_context_id=ctx+1&lti_nav"
                .to_string()
        )
    );

    ctx.page_id = Some("ten".into());
    assert_eq!(
        route(&d, &ctx),
        (
            RouteKind::CustomPageId,
            "https://press.example.edu/bio101?p=20&content_only&lti_context_id=ctx+1".to_string()
        )
    );
}

#[test]
fn test_page_params_need_target_collection() {
    let d = dispatcher();
    let mut ctx = launch();
    ctx.page_title = Some("chapter-1".into());
    ctx.page_id = Some("10".into());
    assert_eq!(route(&d, &ctx), (RouteKind::PrimaryHome, HOME.to_string()));
}

#[test]
fn test_link_map_then_collection_home() {
    let d = dispatcher();
    let mut ctx = launch();
    ctx.target_collection = Some(COURSE);

    assert_eq!(
        route(&d, &ctx),
        (
            RouteKind::CollectionHome,
            "https://press.example.edu/bio101/?content_only".to_string()
        )
    );

    d.store().upsert_link("rl-1", "https://x/mapped", None, None).unwrap();
    assert_eq!(
        route(&d, &ctx),
        (RouteKind::LinkMap, "https://x/mapped".to_string())
    );
}

#[test]
fn test_empty_map_target_is_ignored() {
    let d = dispatcher();
    d.store().upsert_link("rl-1", "", None, None).unwrap();
    assert_eq!(route(&d, &launch()), (RouteKind::PrimaryHome, HOME.to_string()));
}

#[test]
fn test_unknown_collection_uses_primary_home_as_base() {
    let d = dispatcher();
    let mut ctx = launch();
    ctx.target_collection = Some(CollectionId(404));
    assert_eq!(
        route(&d, &ctx),
        (
            RouteKind::CollectionHome,
            format!("{HOME}/?content_only")
        )
    );
}

#[test]
fn test_handle_launch_resolves_and_redirects() {
    let d = dispatcher();
    let mut session = RequestSession::anonymous();
    let report = d.handle_launch(&launch(), &mut session);

    assert_eq!(report.state, LaunchState::Redirected);
    assert_eq!(report.route, RouteKind::PrimaryHome);
    assert_eq!(report.redirect.location, HOME);
    let account = report.resolve.and_then(|r| r.account()).unwrap();
    assert_eq!(session.change(), SessionChange::Started(account));
}

#[test]
fn test_setup_stores_last_link_only_for_link_managers() {
    let d = dispatcher();
    let mut session = RequestSession::anonymous();
    let report = d.handle_launch(&launch(), &mut session);
    let learner = report.resolve.and_then(|r| r.account()).unwrap();
    assert_eq!(d.mapper().last_seen_link(learner).unwrap(), None);

    let ed = editor(&d);
    let mut ctx = launch();
    ctx.login = "editor".into();
    ctx.resource_link_id = "rl-ed".into();
    d.handle_launch(&ctx, &mut RequestSession::for_account(ed));
    assert_eq!(
        d.mapper().last_seen_link(ed).unwrap().as_deref(),
        Some("rl-ed")
    );
}

fn redirect_of(outcome: MappingOutcome) -> String {
    match outcome {
        MappingOutcome::Redirect(r) => r.location,
        MappingOutcome::Halt(e) => panic!("unexpected halt: {e}"),
    }
}

#[test]
fn test_mapping_request_maps_and_follows_target() {
    let d = dispatcher();
    let session = RequestSession::for_account(editor(&d));
    let req = MappingRequest {
        resource_link_id: "rl-9".into(),
        target_action: "https://x/page".into(),
        nonce: d.mapper().nonce_for(NonceAction::MapLink, &session),
        ..MappingRequest::default()
    };

    assert_eq!(
        redirect_of(d.handle_mapping_request(&req, &session)),
        "https://x/page"
    );
    assert_eq!(
        d.store().find_link("rl-9").unwrap().unwrap().target_action,
        "https://x/page"
    );
}

#[test]
fn test_mapping_request_without_capability_goes_back() {
    let d = dispatcher();
    let mut session = RequestSession::anonymous();
    d.resolver().resolve_account(&launch(), &mut session).unwrap();

    let req = MappingRequest {
        resource_link_id: "rl-9".into(),
        target_action: "https://x/page".into(),
        nonce: d.mapper().nonce_for(NonceAction::MapLink, &session),
        referrer: Some("https://lms/back".into()),
        ..MappingRequest::default()
    };
    assert_eq!(
        redirect_of(d.handle_mapping_request(&req, &session)),
        "https://lms/back"
    );
    assert!(d.store().find_link("rl-9").unwrap().is_none());

    let req = MappingRequest {
        referrer: None,
        ..req
    };
    assert_eq!(redirect_of(d.handle_mapping_request(&req, &session)), HOME);
}

#[test]
fn test_mapping_request_deletes_with_unmap_nonce() {
    let d = dispatcher();
    let session = RequestSession::for_account(editor(&d));
    let map = d.store().upsert_link("rl-9", "https://x/p", None, None).unwrap();

    let req = MappingRequest {
        action: "delete".into(),
        id: map.id.to_string(),
        nonce: d.mapper().nonce_for(NonceAction::MapLink, &session),
        ..MappingRequest::default()
    };
    redirect_of(d.handle_mapping_request(&req, &session));
    assert!(d.store().find_link("rl-9").unwrap().is_some());

    let req = MappingRequest {
        nonce: d.mapper().nonce_for(NonceAction::UnmapLink, &session),
        ..req
    };
    assert_eq!(redirect_of(d.handle_mapping_request(&req, &session)), HOME);
    assert!(d.store().find_link("rl-9").unwrap().is_none());
}

#[test]
fn test_mapping_request_non_numeric_id_is_ignored() {
    let d = dispatcher();
    let session = RequestSession::for_account(editor(&d));
    d.store().upsert_link("rl-9", "https://x/p", None, None).unwrap();
    let req = MappingRequest {
        action: "delete".into(),
        id: "1 OR 1=1".into(),
        nonce: d.mapper().nonce_for(NonceAction::UnmapLink, &session),
        ..MappingRequest::default()
    };
    redirect_of(d.handle_mapping_request(&req, &session));
    assert_eq!(d.store().list_links().unwrap().len(), 1);
}

#[test]
fn test_mapping_request_halts_on_invalid_link_id() {
    let d = dispatcher();
    let session = RequestSession::for_account(editor(&d));
    let req = MappingRequest {
        resource_link_id: "x".repeat(300),
        target_action: "https://x/p".into(),
        nonce: d.mapper().nonce_for(NonceAction::MapLink, &session),
        ..MappingRequest::default()
    };
    assert!(matches!(
        d.handle_mapping_request(&req, &session),
        MappingOutcome::Halt(BridgeError::InvalidInput { .. })
    ));
}

#[test]
fn test_mapping_request_from_params() {
    let params: std::collections::HashMap<String, String> = [
        ("resource_link_id", "rl"),
        ("target_action", "https://x/p"),
        ("blog", "12"),
        ("action", "delete"),
        ("ID", "4"),
        ("lti_nonce", "abc"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    let req = MappingRequest::from_params(&params, Some(String::new()));
    assert_eq!(req.collection, Some(COURSE));
    assert_eq!(req.id, "4");
    assert_eq!(req.nonce, "abc");
    assert_eq!(req.referrer, None);
}

/// SQLite store whose enrollment write always fails.
#[derive(Clone)]
struct EnrollFails(SqliteStore);

impl AccountStore for EnrollFails {
    fn find_account_by_login(&self, login: &str) -> BridgeResult<Option<Account>> {
        self.0.find_account_by_login(login)
    }

    fn get_account(&self, id: AccountId) -> BridgeResult<Option<Account>> {
        self.0.get_account(id)
    }

    fn create_account(
        &self,
        new: &NewAccount<'_>,
        baseline: (CollectionId, SiteRole),
    ) -> BridgeResult<(Account, bool)> {
        self.0.create_account(new, baseline)
    }

    fn update_names(&self, id: AccountId, first_name: &str, last_name: &str) -> BridgeResult<()> {
        self.0.update_names(id, first_name, last_name)
    }

    fn member_role(
        &self,
        account: AccountId,
        collection: CollectionId,
    ) -> BridgeResult<Option<SiteRole>> {
        self.0.member_role(account, collection)
    }

    fn enroll(
        &self,
        _account: AccountId,
        _collection: CollectionId,
        _role: SiteRole,
        _record: &EnrollmentRecord,
    ) -> BridgeResult<bool> {
        Err(BridgeError::account("database is locked"))
    }

    fn has_capability(
        &self,
        account: AccountId,
        collection: CollectionId,
        capability: Capability,
    ) -> BridgeResult<bool> {
        self.0.has_capability(account, collection, capability)
    }

    fn get_setting(&self, collection: CollectionId, key: &str) -> BridgeResult<Option<String>> {
        self.0.get_setting(collection, key)
    }

    fn get_account_option(
        &self,
        account: AccountId,
        scope: CollectionId,
        key: &str,
    ) -> BridgeResult<Option<String>> {
        self.0.get_account_option(account, scope, key)
    }

    fn set_account_option(
        &self,
        account: AccountId,
        scope: CollectionId,
        key: &str,
        value: &str,
    ) -> BridgeResult<()> {
        self.0.set_account_option(account, scope, key, value)
    }

    fn get_collection(&self, id: CollectionId) -> BridgeResult<Option<Collection>> {
        self.0.get_collection(id)
    }
}

impl LinkStore for EnrollFails {
    fn find_link(&self, resource_link_id: &str) -> BridgeResult<Option<LinkMap>> {
        self.0.find_link(resource_link_id)
    }

    fn upsert_link(
        &self,
        resource_link_id: &str,
        target_action: &str,
        account: Option<AccountId>,
        collection: Option<CollectionId>,
    ) -> BridgeResult<LinkMap> {
        self.0
            .upsert_link(resource_link_id, target_action, account, collection)
    }

    fn delete_link(&self, id: i64) -> BridgeResult<bool> {
        self.0.delete_link(id)
    }

    fn links_by_target(&self, target_action: &str) -> BridgeResult<Vec<LinkMap>> {
        self.0.links_by_target(target_action)
    }

    fn list_links(&self) -> BridgeResult<Vec<LinkMap>> {
        self.0.list_links()
    }
}

fn failing_dispatcher() -> LaunchDispatcher<EnrollFails> {
    let store = SqliteStore::memory().unwrap();
    store
        .add_collection(COURSE, "https://press.example.edu/bio101", "Bio")
        .unwrap();
    let config = BridgeConfig {
        primary_home_url: HOME.to_string(),
        ..BridgeConfig::default()
    };
    LaunchDispatcher::new(
        EnrollFails(store),
        &config,
        NonceIssuer::new(b"k".to_vec(), 86_400),
    )
}

#[test]
fn test_failed_enrollment_aborts_resolve_without_touching_session() {
    let d = failing_dispatcher();
    let mut ctx = launch();
    ctx.target_collection = Some(COURSE);

    let mut session = RequestSession::anonymous();
    let err = d.resolver().resolve_account(&ctx, &mut session).unwrap_err();
    assert!(matches!(err, BridgeError::AccountPersistence { .. }));
    assert_eq!(session.change(), SessionChange::Unchanged);
    assert_eq!(session.current_session(), None);

    let mut other = RequestSession::for_account(AccountId(999));
    assert!(d.resolver().resolve_account(&ctx, &mut other).is_err());
    assert_eq!(other.change(), SessionChange::Unchanged);
    assert_eq!(other.current_session(), Some(AccountId(999)));
}

#[test]
fn test_failed_resolve_falls_back_to_primary_home() {
    let d = failing_dispatcher();
    let mut ctx = launch();
    ctx.target_collection = Some(COURSE);
    ctx.page_title = Some("chapter-1".into());

    let mut session = RequestSession::anonymous();
    let report = d.handle_launch(&ctx, &mut session);
    assert_eq!(report.route, RouteKind::PrimaryHome);
    assert_eq!(report.redirect.location, HOME);
    assert_eq!(report.state, LaunchState::Redirected);
    assert_eq!(report.resolve, None);
    assert_eq!(session.change(), SessionChange::Unchanged);
}
