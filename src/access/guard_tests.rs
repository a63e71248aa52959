use super::*;
use crate::identity::{Permission, PermissionSet, Role};

fn route(roles: &[Role], perms: &[&str]) -> RouteDescriptor {
    RouteDescriptor::new("/x", Requirement::roles(roles.iter().copied()).with_permissions(perms.iter().copied()))
}

#[test]
fn no_identity_redirects_to_login_with_return_path() {
    let r = route(&[Role::Admin], &["audit_logs"]);
    assert_eq!(authorize(None, &r), Decision::RedirectToLogin { return_to: "/x".into() });
    let d = authorize_request(None, &r, "/patients/p-17?tab=meds");
    assert_eq!(d.redirect_location().unwrap(), "/login?return_to=%2Fpatients%2Fp-17%3Ftab%3Dmeds");
    assert_eq!(d.into_result(), Err(AccessError::Unauthenticated));
}

#[test]
fn guest_on_staff_route_is_unauthorized() {
    let guest = Identity::for_role("g", Role::Guest).with_permissions(PermissionSet::new());
    let r = RouteDescriptor::new("/patients", Requirement::roles([Role::Admin, Role::User]));
    let d = authorize(Some(&guest), &r);
    assert_eq!(d, Decision::RedirectToUnauthorized { denial: Denial::Role });
    assert_eq!(d.redirect_location().as_deref(), Some(UNAUTHORIZED_PATH));
}

#[test]
fn admin_with_required_permission_is_allowed() {
    let admin = Identity::for_role("a", Role::Admin)
        .with_permissions(["quality_metrics"].into_iter().collect());
    let r = route(&[Role::Admin], &["quality_metrics"]);
    assert_eq!(authorize(Some(&admin), &r), Decision::Allow);
    assert!(authorize(Some(&admin), &r).into_result().is_ok());
}

#[test]
fn missing_permission_is_unauthorized_and_reports_tokens() {
    let user = Identity::for_role("u", Role::User);
    let r = route(&[Role::User], &["claims_access", "audit_logs"]);
    match authorize(Some(&user), &r) {
        Decision::RedirectToUnauthorized { denial: Denial::MissingPermissions(m) } => {
            assert_eq!(m, vec![Permission::new("audit_logs")]);
        }
        other => panic!("unexpected decision {:?}", other),
    }
}

#[test]
fn open_route_admits_every_role() {
    let r = RouteDescriptor::open("/dashboard");
    for role in Role::ALL {
        let id = Identity::for_role("i", role).with_permissions(PermissionSet::new());
        assert!(authorize(Some(&id), &r).is_allowed(), "role {} should pass", role);
    }
}

#[test]
fn decision_serializes_with_tag() {
    let v = serde_json::to_value(Decision::RedirectToLogin { return_to: "/claims".into() }).unwrap();
    assert_eq!(v["decision"], "redirect_to_login");
    assert_eq!(v["return_to"], "/claims");
    let v = serde_json::to_value(Decision::RedirectToUnauthorized { denial: Denial::Role }).unwrap();
    assert_eq!(v["decision"], "redirect_to_unauthorized");
    assert_eq!(v["denial"]["kind"], "role");
}

#[test]
fn route_descriptor_defaults_when_fields_missing() {
    let r: RouteDescriptor = serde_json::from_str(r#"{"path":"/dashboard"}"#).unwrap();
    assert!(r.requires.required_roles.is_all());
    assert!(r.requires.required_permissions.is_empty());
    let r: RouteDescriptor = serde_json::from_str(
        r#"{"path":"/audit","required_roles":["admin"],"required_permissions":["audit_logs"]}"#,
    ).unwrap();
    assert!(r.requires.required_roles.contains(Role::Admin));
    assert!(!r.requires.required_roles.contains(Role::User));
    assert!(r.requires.required_permissions.contains("audit_logs"));
}
