//! End-to-end tests of the macaroon protocol through the public API.

use dialog_macaroon::{
    Caveat, Macaroon, Predicate, VerifyError, accept_all, decode_bundle, encode_bundle, verify,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use testresult::TestResult;

const SECRET: &[u8] = b"some_shared_secret_1";
const DISCHARGE_SECRET: &[u8] = b"some_other_shared_secret_1";
const CAVEAT_ID: &str = "is-authorized-or-whatever";
const THIRD_PARTY_URL: &str = "http://example.com";

fn root_macaroon() -> Result<Macaroon, Box<dyn std::error::Error>> {
    let mut root = Macaroon::new(SECRET, "some id", "a location")?;
    root.add_third_party_caveat(DISCHARGE_SECRET, CAVEAT_ID, THIRD_PARTY_URL)?;
    root.add_predicate(&Predicate::Permissions(vec![
        "permission-1".into(),
        "permission-2".into(),
    ]))?;
    Ok(root)
}

fn discharge_for(root: &Macaroon) -> Result<Macaroon, Box<dyn std::error::Error>> {
    let caveat = root
        .third_party_caveat_at(THIRD_PARTY_URL)
        .ok_or("root has no third-party caveat")?;
    let mut discharge = Macaroon::new(DISCHARGE_SECRET, caveat.id(), "remote location")?;
    discharge.add_predicate(&Predicate::Email("me@nope.com".into()))?;
    Ok(discharge.bind(root.signature()))
}

#[test_log::test]
fn it_verifies_the_full_flow_over_the_wire() -> TestResult {
    let root = root_macaroon()?;

    // The client only ever sees text.
    let root_text = root.to_base64()?;
    let received = Macaroon::from_base64(&root_text)?;
    let discharge = discharge_for(&received)?;

    let bundle = encode_bundle(&received, &[discharge])?;
    let (root, discharges) = decode_bundle(&bundle)?;

    let authorization = verify(&root, SECRET, &accept_all, &discharges)?;
    assert_eq!(authorization.email.as_deref(), Some("me@nope.com"));
    assert_eq!(
        authorization.permissions,
        vec!["permission-1", "permission-2"]
    );
    Ok(())
}

#[test_log::test]
fn it_accepts_attenuation_by_the_holder() -> TestResult {
    let mut root = root_macaroon()?;
    root.add_first_party_caveat("account=alice")?;
    let discharge = discharge_for(&root)?;

    let only_alice = |predicate: &Predicate| match predicate {
        Predicate::Field { key, value } if key == "account" && value != "alice" => {
            Err("wrong account")
        }
        Predicate::Raw(_) => Err("unknown condition"),
        _ => Ok(()),
    };

    let authorization = root.verify(SECRET, &only_alice, &[discharge])?;
    assert!(authorization.conditions.contains(&Predicate::Field {
        key: "account".into(),
        value: "alice".into()
    }));
    Ok(())
}

#[test_log::test]
fn it_rejects_a_discharge_bound_before_attenuation() -> TestResult {
    let mut root = root_macaroon()?;
    let stale = discharge_for(&root)?;
    root.add_first_party_caveat("account=alice")?;

    let error = root
        .verify(SECRET, &accept_all, &[stale])
        .err()
        .ok_or("expected verification to fail")?;
    assert!(error.is_tamper_evident());
    Ok(())
}

#[test_log::test]
fn it_rejects_a_rewritten_verification_id() -> TestResult {
    let root = root_macaroon()?;
    let discharge = discharge_for(&root)?;

    // Swapping in a verification id sealed for another root changes the
    // signature chain, which the root check catches first.
    let other = root_macaroon()?;
    let mut bytes = root.to_bytes()?;
    let original = root.caveats()[0].verification_id().ok_or("no vid")?;
    let replacement = other.caveats()[0].verification_id().ok_or("no vid")?;
    let at = bytes
        .windows(original.len())
        .position(|window| window == original)
        .ok_or("vid not found in encoding")?;
    bytes[at..at + original.len()].copy_from_slice(replacement);
    let forged = Macaroon::from_bytes(&bytes)?;

    assert_eq!(
        verify(&forged, SECRET, &accept_all, &[discharge]),
        Err(VerifyError::SignatureMismatch)
    );
    Ok(())
}

#[test_log::test]
fn it_requires_the_discharge_for_every_root() -> TestResult {
    let root = root_macaroon()?;
    assert!(matches!(
        verify(&root, SECRET, &accept_all, &[]),
        Err(VerifyError::DischargeNotFound { .. })
    ));
    Ok(())
}

fn condition() -> impl Strategy<Value = String> {
    "[a-z]{1,8}=[a-z0-9]{0,8}"
}

proptest! {
    #[test]
    fn any_attenuation_still_verifies(conditions in prop::collection::vec(condition(), 0..6)) {
        let mut root = root_macaroon().unwrap();
        for condition in &conditions {
            root.add_first_party_caveat(condition.as_str()).unwrap();
        }
        let discharge = discharge_for(&root).unwrap();

        let authorization = verify(&root, SECRET, &accept_all, &[discharge]).unwrap();
        // One permission caveat and one email predicate besides the added ones.
        prop_assert_eq!(authorization.conditions.len(), conditions.len() + 2);
    }

    #[test]
    fn reordering_caveats_breaks_the_signature(
        conditions in prop::collection::hash_set(condition(), 2..5),
    ) {
        let conditions: Vec<_> = conditions.into_iter().collect();
        let mut forward = Macaroon::new(SECRET, "some id", "a location").unwrap();
        let mut backward = Macaroon::new(SECRET, "some id", "a location").unwrap();
        for condition in &conditions {
            forward.add_first_party_caveat(condition.as_str()).unwrap();
        }
        for condition in conditions.iter().rev() {
            backward.add_first_party_caveat(condition.as_str()).unwrap();
        }
        prop_assert_ne!(forward.signature(), backward.signature());

        // Graft the reversed caveats onto the forward signature.
        let mut forged = serde_json::to_value(&backward).unwrap();
        forged["s"] = serde_json::to_value(&forward).unwrap()["s"].clone();
        let forged: Macaroon = serde_json::from_value(forged).unwrap();

        prop_assert!(forged.caveats().iter().all(Caveat::is_first_party));
        prop_assert_eq!(
            verify(&forged, SECRET, &accept_all, &[]),
            Err(VerifyError::SignatureMismatch)
        );
    }
}
