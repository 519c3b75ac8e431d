// Sign and verify a digest with a software element, then lock a payload
//
// Run with: cargo run --example basic_signing

use hsmwallet::api::{self, ElementConfig, KeyDomain, KeyType, Keyring};
use sha2::{Digest, Sha256};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();

    let session = api::open_session(ElementConfig::default())?;
    println!(
        "Opened {} (firmware {}, serial {})\n",
        session.model_number()?,
        session.firmware_version()?,
        session.serial_number()?
    );

    let slot = session.generate_key(KeyType::Secp256k1)?;
    let public_key = session.public_key(slot, Keyring::Local)?;
    println!("Generated secp256k1 key in slot {}", slot);
    println!("  Public key: {}\n", public_key.to_hex());

    let message = b"Hello, secure element!";
    let digest = Sha256::digest(message);
    let signature = session.sign_recoverable(slot, &digest)?;
    println!("Signed {:?}", String::from_utf8_lossy(message));
    println!("  Signature: {}", hex::encode(&signature.signature));
    println!("  Recovery id: {}\n", signature.recovery_id);

    let verification = session.verify(slot, Keyring::Local, &digest, &signature.signature)?;
    println!("Verification: {:?}\n", verification);

    let locked = session.lock(message, KeyDomain::OneWay)?;
    let unlocked = session.unlock(&locked, KeyDomain::OneWay)?;
    println!(
        "Locked {} bytes into a {} byte object and unlocked {:?}",
        message.len(),
        locked.to_bytes().len(),
        String::from_utf8_lossy(&unlocked)
    );

    Ok(())
}
