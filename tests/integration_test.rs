use std::sync::Arc;
use std::thread;

use hsmwallet::api::{
    ElementConfig, GroupLayout, KdfKind, KdfParams, KeyDomain, KeyType, Keyring, NodeAddress,
    OversightRoot, PeerKey, RestoreProgress, Slip39Layout, SlotRef, Verification, WalletParams,
    WalletSelector, WalletVariant,
};
use hsmwallet::logic::Share;
use hsmwallet::{ErrorCode, RecoveryMode, Session, SoftwareElement, SoftwareFinder};

const DIGEST: [u8; 32] = [0x3cu8; 32];

fn session() -> Session<SoftwareElement> {
    Session::open(&SoftwareFinder::default()).unwrap()
}

#[test]
fn test_sign_and_independently_verify() {
    let session = session();
    let slot = session.generate_key(KeyType::Ed25519).unwrap();
    let public = session.public_key(slot, Keyring::Local).unwrap();
    let signature = session.sign(slot, &DIGEST).unwrap();

    let verifying_key =
        ed25519_dalek::VerifyingKey::from_bytes(public.as_bytes().try_into().unwrap()).unwrap();
    let signature = ed25519_dalek::Signature::from_slice(&signature).unwrap();
    assert!(verifying_key.verify_strict(&DIGEST, &signature).is_ok());
}

#[test]
fn test_single_bit_mutations_rejected() {
    let session = session();
    for key_type in [KeyType::NistP256, KeyType::Secp256k1, KeyType::Ed25519] {
        let slot = session.generate_key(key_type).unwrap();
        let signature = session.sign(slot, &DIGEST).unwrap();
        assert_eq!(
            session
                .verify(slot, Keyring::Local, &DIGEST, &signature)
                .unwrap(),
            Verification::Verified
        );

        for bit in [0usize, 100, 511] {
            let mut mutated = signature.clone();
            mutated[bit / 8] ^= 1 << (bit % 8);
            assert_eq!(
                session
                    .verify(slot, Keyring::Local, &DIGEST, &mutated)
                    .unwrap(),
                Verification::Rejected,
                "{key_type} bit {bit}"
            );
        }
    }
}

#[test]
fn test_lock_domains_and_shared_key_portability() {
    let shared_key = [0x77u8; 32];
    let first = Session::open(&SoftwareFinder::new(
        ElementConfig::default().with_shared_key(&shared_key),
    ))
    .unwrap();
    let second = Session::open(&SoftwareFinder::new(
        ElementConfig::default().with_shared_key(&shared_key),
    ))
    .unwrap();

    let shared = first.lock(b"travel", KeyDomain::Shared).unwrap();
    assert_eq!(
        second.unlock(&shared, KeyDomain::Shared).unwrap().as_slice(),
        b"travel"
    );

    let one_way = first.lock(b"stay home", KeyDomain::OneWay).unwrap();
    assert_eq!(
        first.unlock(&one_way, KeyDomain::OneWay).unwrap().as_slice(),
        b"stay home"
    );
    let err = second.unlock(&one_way, KeyDomain::OneWay).unwrap_err();
    assert_eq!(err.kind(), ErrorCode::SignatureInvalid);

    let err = first.unlock(&one_way, KeyDomain::Shared).unwrap_err();
    assert!(matches!(
        err.kind(),
        ErrorCode::SignatureInvalid | ErrorCode::DecryptionFailed
    ));
}

#[test]
fn test_lock_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let plain = dir.path().join("plain.txt");
    let sealed = dir.path().join("plain.lko");
    let opened = dir.path().join("opened.txt");
    std::fs::write(&plain, b"file payload").unwrap();

    let session = session();
    session.lock_file(&plain, &sealed, KeyDomain::OneWay).unwrap();
    assert_ne!(std::fs::read(&sealed).unwrap(), b"file payload");

    session.unlock_file(&sealed, &opened, KeyDomain::OneWay).unwrap();
    assert_eq!(std::fs::read(&opened).unwrap(), b"file payload");
}

#[test]
fn test_ecdh_between_two_elements() {
    let alice = session();
    let bob = session();
    let a = alice.generate_key(KeyType::Secp256k1).unwrap();
    let b = bob.generate_key(KeyType::Secp256k1).unwrap();
    let a_public = alice.public_key(a, Keyring::Local).unwrap();
    let b_public = bob.public_key(b, Keyring::Local).unwrap();

    let params = KdfParams::hkdf(KdfKind::HkdfSha256, b"salt", b"channel", 48);
    let from_alice = alice
        .ecdh_kdf(
            SlotRef::Persistent(a),
            &PeerKey::Bytes(b_public.into_bytes()),
            &params,
        )
        .unwrap();
    let from_bob = bob
        .ecdh_kdf(
            SlotRef::Persistent(b),
            &PeerKey::Bytes(a_public.into_bytes()),
            &params,
        )
        .unwrap();
    assert_eq!(from_alice, from_bob);
    assert_eq!(from_alice.len(), 48);
}

#[test]
fn test_hd_derivation_is_deterministic() {
    let phrase = "test walk nut penalty hip pave soap entry language right filter choice";
    let path = NodeAddress::try_from("m/44'/0'/0'/0/7").unwrap();

    let leaves: Vec<_> = (0..2)
        .map(|_| {
            let session = session();
            let root = session
                .restore_bip39(&WalletParams::new(KeyType::Secp256k1, "btc"), "", phrase)
                .unwrap();
            let leaf = session.derive_path(root, &path).unwrap();
            session.public_key(leaf, Keyring::Local).unwrap()
        })
        .collect();
    assert_eq!(leaves[0], leaves[1]);
}

#[test]
fn test_cardano_wallet_signs() {
    let session = session();
    let params = WalletParams::new(KeyType::Ed25519, "ada").with_variant(WalletVariant::Cardano);
    let (root, mnemonic) = session.generate_master_seed(&params, "", true).unwrap();
    assert!(mnemonic.is_some());

    let leaf = session
        .derive_path(root, &NodeAddress::try_from("m/1852'/1815'/0'/0/0").unwrap())
        .unwrap();
    let signature = session.sign(leaf, &DIGEST).unwrap();
    assert!(session
        .verify(leaf, Keyring::Local, &DIGEST, &signature)
        .unwrap()
        .is_verified());
}

#[test]
fn test_watch_only_wallet() {
    let session = session();
    let (root, _) = session
        .generate_master_seed(&WalletParams::new(KeyType::Secp256k1, "hot"), "", false)
        .unwrap();
    let account = session.derive_child(root, 0, true, true).unwrap();
    let soft = session.derive_child(account.slot, 5, false, false).unwrap();

    let watch = session
        .generate_oversight_wallet(
            &WalletParams::new(KeyType::Secp256k1, "cold"),
            OversightRoot {
                public_key: session
                    .public_key(account.slot, Keyring::Local)
                    .unwrap()
                    .into_bytes(),
                chain_code: account.chain_code.unwrap(),
                node_addr: NodeAddress::try_from("m/0'").unwrap(),
            },
        )
        .unwrap();
    let watched = session.derive_child(watch, 5, false, false).unwrap();
    assert_eq!(
        session.public_key(watched.slot, Keyring::Local).unwrap(),
        session.public_key(soft.slot, Keyring::Local).unwrap()
    );
    assert_eq!(
        session.address_of(watched.slot).unwrap().node_addr.to_string(),
        "m/0'/5"
    );

    let err = session.derive_child(watch, 1, true, false).unwrap_err();
    assert_eq!(err.kind(), ErrorCode::HardenedDerivationRequiresPrivateKey);
    let err = session.sign(watched.slot, &DIGEST).unwrap_err();
    assert_eq!(err.kind(), ErrorCode::MissingPrivateKey);
}

#[test]
fn test_slip39_two_groups_round_trip() {
    let session = session();
    let params = WalletParams::new(KeyType::Secp256k1, "vault");
    session
        .open_slip39_generate_session(params, Slip39Layout::new(2, 2, 0).unwrap(), "master")
        .unwrap();

    let groups = [(2u8, 2u8), (3, 2)];
    let mut shards: Vec<Vec<(String, String)>> = Vec::new();
    let mut generated = None;
    for (index, (count, threshold)) in groups.iter().enumerate() {
        session
            .set_active_group(index as u8, GroupLayout::new(*count, *threshold).unwrap())
            .unwrap();
        let mut members = Vec::new();
        for member in 0..*count {
            let passphrase = format!("member-{index}-{member}");
            let shard = session.add_member_password(&passphrase).unwrap();
            generated = generated.or(shard.master_slot);
            members.push((passphrase, shard.mnemonic.as_str().to_string()));
        }
        shards.push(members);
    }
    let generated = generated.unwrap();
    assert_eq!(session.recovery_mode(), RecoveryMode::Idle);

    session
        .open_slip39_restore_session(WalletParams::new(KeyType::Secp256k1, "restored"), "master")
        .unwrap();

    // One complete group is below the group threshold
    for (passphrase, mnemonic) in &shards[0] {
        let progress = session.add_shard(passphrase, mnemonic).unwrap();
        assert!(matches!(progress, RestoreProgress::NeedMoreShards { .. }));
    }
    let (passphrase, mnemonic) = &shards[1][2];
    assert_eq!(
        session.add_shard(passphrase, mnemonic).unwrap(),
        RestoreProgress::NeedMoreShards {
            groups_complete: 1,
            group_threshold: 2
        }
    );
    // A repeated shard does not complete the group
    assert_eq!(
        session.add_shard(passphrase, mnemonic).unwrap(),
        RestoreProgress::NeedMoreShards {
            groups_complete: 1,
            group_threshold: 2
        }
    );
    assert!(session
        .slot_of(
            &NodeAddress::root(),
            &WalletSelector::Name("restored".to_string())
        )
        .is_err());

    let (passphrase, mnemonic) = &shards[1][0];
    let RestoreProgress::Complete(restored) = session.add_shard(passphrase, mnemonic).unwrap()
    else {
        panic!("restore did not complete");
    };
    assert_eq!(
        session.public_key(generated, Keyring::Local).unwrap(),
        session.public_key(restored, Keyring::Local).unwrap()
    );
}

fn generate_two_shards(session: &Session<SoftwareElement>, name: &str) -> [String; 2] {
    session
        .open_slip39_generate_session(
            WalletParams::new(KeyType::Ed25519, name),
            Slip39Layout::new(1, 1, 0).unwrap(),
            "",
        )
        .unwrap();
    session
        .set_active_group(0, GroupLayout::new(2, 2).unwrap())
        .unwrap();
    let first = session.add_member_password("").unwrap().mnemonic.as_str().to_string();
    let second = session.add_member_password("").unwrap().mnemonic.as_str().to_string();
    [first, second]
}

#[test]
fn test_slip39_inconsistent_shard_leaves_session_unchanged() {
    let session = session();
    let shards = generate_two_shards(&session, "a");

    let mut foreign = Share::from_mnemonic(&shards[1]).unwrap();
    foreign.identifier ^= 1;
    let foreign = foreign.to_mnemonic().unwrap();

    session
        .open_slip39_restore_session(WalletParams::new(KeyType::Ed25519, "c"), "")
        .unwrap();
    session.add_shard("", &shards[0]).unwrap();
    let err = session.add_shard("", &foreign).unwrap_err();
    assert_eq!(err.kind(), ErrorCode::ShardMismatch);
    assert!(matches!(
        session.add_shard("", &shards[1]).unwrap(),
        RestoreProgress::Complete(_)
    ));
}

#[test]
fn test_slip39_mistyped_member_passphrase_can_be_corrected() {
    let session = session();
    session
        .open_slip39_generate_session(
            WalletParams::new(KeyType::Ed25519, "typo"),
            Slip39Layout::new(1, 1, 0).unwrap(),
            "",
        )
        .unwrap();
    session
        .set_active_group(0, GroupLayout::new(2, 2).unwrap())
        .unwrap();
    let first = session.add_member_password("one").unwrap().mnemonic.as_str().to_string();
    let second = session.add_member_password("two").unwrap().mnemonic.as_str().to_string();

    session
        .open_slip39_restore_session(WalletParams::new(KeyType::Ed25519, "restored"), "")
        .unwrap();
    session.add_shard("oen", &first).unwrap();
    let err = session.add_shard("two", &second).unwrap_err();
    assert_eq!(err.kind(), ErrorCode::ShardMismatch);
    assert_eq!(session.recovery_mode(), RecoveryMode::RestoringSlip39);

    session.add_shard("one", &first).unwrap();
    assert!(matches!(
        session.add_shard("two", &second).unwrap(),
        RestoreProgress::Complete(_)
    ));
}

#[test]
fn test_disable_export_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("element.json");

    let slot = {
        let session = Session::open(&SoftwareFinder::with_state_file(&path)).unwrap();
        let slot = session.generate_key(KeyType::NistP256).unwrap();
        session.disable_export(slot, Keyring::Local).unwrap();
        slot
    };

    let session = Session::open(&SoftwareFinder::with_state_file(&path)).unwrap();
    let err = session.public_key(slot, Keyring::Local).unwrap_err();
    assert_eq!(err.kind(), ErrorCode::ExportDisabled);
    assert!(session.sign(slot, &DIGEST).is_ok());
}

#[test]
fn test_sessions_on_one_state_file_keep_every_key() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("element.json");

    let first = Session::open(&SoftwareFinder::with_state_file(&path)).unwrap();
    let second = Session::open(&SoftwareFinder::with_state_file(&path)).unwrap();
    let slot_a = first.generate_key(KeyType::Ed25519).unwrap();
    let slot_b = second.generate_key(KeyType::Ed25519).unwrap();
    assert_ne!(slot_a, slot_b);
    let public_a = first.public_key(slot_a, Keyring::Local).unwrap();
    drop((first, second));

    let reopened = Session::open(&SoftwareFinder::with_state_file(&path)).unwrap();
    assert_eq!(reopened.public_key(slot_a, Keyring::Local).unwrap(), public_a);
    assert!(reopened.public_key(slot_b, Keyring::Local).is_ok());
}

#[test]
fn test_concurrent_sessions_are_serialized() {
    let finder = SoftwareFinder::default();
    let sessions: Vec<_> = (0..4)
        .map(|_| Arc::new(Session::open(&finder).unwrap()))
        .collect();

    let handles: Vec<_> = sessions
        .iter()
        .map(|session| {
            let session = Arc::clone(session);
            thread::spawn(move || {
                (0..25)
                    .map(|_| session.generate_key(KeyType::X25519).unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut slots: Vec<_> = handles
        .into_iter()
        .flat_map(|handle| handle.join().unwrap())
        .collect();
    slots.sort();
    slots.dedup();
    assert_eq!(slots.len(), 100);
    assert_eq!(
        sessions[0].list_slots(Keyring::Local).unwrap().slots,
        slots
    );
}

#[test]
fn test_concurrent_recovery_sessions_do_not_mix() {
    let finder = SoftwareFinder::default();
    let handles: Vec<_> = (0..3)
        .map(|n| {
            let session = Session::open(&finder).unwrap();
            thread::spawn(move || {
                session
                    .open_slip39_generate_session(
                        WalletParams::new(KeyType::NistP256, format!("w{n}")),
                        Slip39Layout::new(1, 1, 0).unwrap(),
                        "",
                    )
                    .unwrap();
                session
                    .set_active_group(0, GroupLayout::new(1, 1).unwrap())
                    .unwrap();
                session.add_member_password("").unwrap().master_slot.unwrap()
            })
        })
        .collect();

    let mut roots: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    roots.sort();
    roots.dedup();
    assert_eq!(roots.len(), 3);
}

#[test]
fn test_closed_session() {
    let session = session();
    session.close();
    let err = session.lock(b"x", KeyDomain::OneWay).unwrap_err();
    assert_eq!(err.kind(), ErrorCode::ContextInvalid);
    assert_eq!(hsmwallet::status_code(&session.list_slots(Keyring::Local)), -16);
}
