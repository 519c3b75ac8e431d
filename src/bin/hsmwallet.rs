use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use tracing::info;

use hsmwallet::{
    api::{
        ElementConfig, GroupLayout, KdfKind, KdfParams, KeyDomain, KeyType, Keyring, LockedObject,
        NodeAddress, PeerKey, RestoreProgress, Slip39Layout, Slot, SlotRef, Verification, WalletParams,
        WalletVariant,
    },
    Session, SoftwareElement, SoftwareFinder,
};

#[derive(Parser, Debug)]
#[command(name = "hsmwallet")]
#[command(about = "Secure element key store and HD wallet", version)]
pub struct Cli {
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// JSON snapshot holding the element state
    #[arg(long, env = "HSMWALLET_STATE", default_value = "hsmwallet-state.json", global = true)]
    pub state_file: PathBuf,

    /// JSON element configuration (pool sizes, shared key, identity)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a key pair in the lowest free local slot
    GenKey {
        #[arg(long)]
        key_type: KeyTypeArg,
    },

    /// List allocated slots
    List {
        /// List the foreign keyring instead of the local one
        #[arg(long)]
        foreign: bool,
    },

    /// Print the public key of a slot as hex
    ExportPubkey {
        #[arg(long)]
        slot: u32,

        #[arg(long)]
        foreign: bool,
    },

    /// Permanently forbid public key export for a slot
    DisableExport {
        #[arg(long)]
        slot: u32,

        #[arg(long)]
        foreign: bool,
    },

    /// Remove a slot (wallet nodes take their subtree along)
    Remove {
        #[arg(long)]
        slot: u32,

        #[arg(long)]
        foreign: bool,
    },

    /// Store a public key in the foreign keyring
    StoreForeign {
        #[arg(long)]
        key_type: KeyTypeArg,

        /// Public key in hex (SEC1 compressed or uncompressed for ECDSA curves)
        #[arg(long)]
        public_key: String,
    },

    /// Sign a 32-byte digest given in hex
    Sign {
        #[arg(long)]
        slot: u32,

        #[arg(long)]
        digest: String,
    },

    /// Verify a signature; exits with 2 when it does not verify
    Verify {
        #[arg(long)]
        slot: u32,

        #[arg(long)]
        foreign: bool,

        #[arg(long)]
        digest: String,

        #[arg(long)]
        signature: String,
    },

    /// Lock a payload (stdin or --input) into a signed, encrypted object
    Lock {
        #[arg(long, default_value = "one-way")]
        domain: DomainArg,

        #[arg(long)]
        input: Option<PathBuf>,

        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Unlock an object produced by `lock`
    Unlock {
        #[arg(long, default_value = "one-way")]
        domain: DomainArg,

        #[arg(long)]
        input: Option<PathBuf>,

        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Key agreement between a local slot and a peer key
    Ecdh {
        #[arg(long)]
        slot: u32,

        /// Peer public key in hex
        #[arg(long, conflicts_with = "peer_slot")]
        peer_key: Option<String>,

        /// Peer key stored in a slot
        #[arg(long)]
        peer_slot: Option<u32>,

        /// The peer slot lives in the foreign keyring
        #[arg(long)]
        peer_foreign: bool,

        /// Run the shared secret through a KDF
        #[arg(long)]
        kdf: Option<KdfArg>,

        /// KDF salt in hex
        #[arg(long, default_value = "")]
        salt: String,

        /// HKDF info in hex
        #[arg(long, default_value = "")]
        kdf_info: String,

        #[arg(long, default_value_t = 1)]
        iterations: u32,

        #[arg(long, default_value_t = 32)]
        length: usize,
    },

    /// Create a wallet root
    GenWallet {
        #[command(flatten)]
        wallet: WalletArgs,

        #[arg(long, default_value = "bip39")]
        scheme: SchemeArg,

        /// Shard groups as <threshold>of<count>, e.g. 2of3 (repeatable, slip39 scheme)
        #[arg(long = "group")]
        groups: Vec<String>,

        /// Number of shard groups needed to restore (slip39 scheme)
        #[arg(long, default_value_t = 1)]
        group_threshold: u8,

        #[arg(long, default_value_t = 0)]
        iteration_exponent: u8,
    },

    /// Restore a wallet root from a mnemonic (bip39) or shards (slip39, one per line) on stdin
    RestoreWallet {
        #[command(flatten)]
        wallet: WalletArgs,

        #[arg(long, default_value = "bip39")]
        scheme: SchemeArg,
    },

    /// Derive a child of a wallet node
    Derive {
        #[arg(long)]
        parent: u32,

        #[arg(long)]
        index: u32,

        #[arg(long)]
        hardened: bool,

        /// Print the chain code of a hardened child
        #[arg(long)]
        chain_code: bool,
    },

    /// Derive every node along a path below a wallet root
    DerivePath {
        #[arg(long)]
        root: u32,

        #[arg(long)]
        path: String,
    },

    /// Print the node address of a wallet slot
    NodeAddr {
        #[arg(long)]
        slot: u32,
    },

    /// Print the element identity
    Info,
}

#[derive(clap::Args, Debug)]
pub struct WalletArgs {
    #[arg(long)]
    key_type: KeyTypeArg,

    #[arg(long, default_value = "standard")]
    variant: VariantArg,

    #[arg(long)]
    name: String,

    /// Extra secret (hex) mixed into the master seed
    #[arg(long)]
    generator_key: Option<String>,

    #[arg(long, default_value = "")]
    passphrase: String,
}

impl WalletArgs {
    fn params(&self) -> anyhow::Result<WalletParams> {
        let mut params =
            WalletParams::new(self.key_type.into(), self.name.clone()).with_variant(self.variant.into());
        if let Some(key_hex) = &self.generator_key {
            let key = hex::decode(key_hex).context("generator key is not hex")?;
            params = params.with_generator_key(&key);
        }
        Ok(params)
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum KeyTypeArg {
    #[value(alias = "secp256r1")]
    Nistp256,
    Secp256k1,
    Ed25519,
    X25519,
}

impl From<KeyTypeArg> for KeyType {
    fn from(arg: KeyTypeArg) -> Self {
        match arg {
            KeyTypeArg::Nistp256 => KeyType::NistP256,
            KeyTypeArg::Secp256k1 => KeyType::Secp256k1,
            KeyTypeArg::Ed25519 => KeyType::Ed25519,
            KeyTypeArg::X25519 => KeyType::X25519,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DomainArg {
    OneWay,
    Shared,
}

impl From<DomainArg> for KeyDomain {
    fn from(arg: DomainArg) -> Self {
        match arg {
            DomainArg::OneWay => KeyDomain::OneWay,
            DomainArg::Shared => KeyDomain::Shared,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum VariantArg {
    Standard,
    Cardano,
}

impl From<VariantArg> for WalletVariant {
    fn from(arg: VariantArg) -> Self {
        match arg {
            VariantArg::Standard => WalletVariant::Standard,
            VariantArg::Cardano => WalletVariant::Cardano,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum KdfArg {
    HkdfSha256,
    HkdfSha512,
    Pbkdf2Sha256,
    Pbkdf2Sha512,
}

impl From<KdfArg> for KdfKind {
    fn from(arg: KdfArg) -> Self {
        match arg {
            KdfArg::HkdfSha256 => KdfKind::HkdfSha256,
            KdfArg::HkdfSha512 => KdfKind::HkdfSha512,
            KdfArg::Pbkdf2Sha256 => KdfKind::Pbkdf2Sha256,
            KdfArg::Pbkdf2Sha512 => KdfKind::Pbkdf2Sha512,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SchemeArg {
    /// Random seed without a backup
    Random,
    Bip39,
    /// Threshold shards in SLIP39 layout, written with the BIP39 word list;
    /// not interchangeable with SLIP-0039 wallets
    Slip39,
}

fn keyring(foreign: bool) -> Keyring {
    Keyring::from_foreign_flag(foreign)
}

fn decode_hex(what: &str, value: &str) -> anyhow::Result<Vec<u8>> {
    hex::decode(value.trim()).with_context(|| format!("{} is not valid hex", what))
}

/// Parse `<threshold>of<count>`
fn parse_group(group: &str) -> anyhow::Result<GroupLayout> {
    let Some((threshold, count)) = group.split_once("of") else {
        bail!("group {:?} must look like 2of3", group);
    };
    let threshold: u8 = threshold.trim().parse().context("invalid group threshold")?;
    let count: u8 = count.trim().parse().context("invalid group member count")?;
    Ok(GroupLayout::new(count, threshold)?)
}

fn read_stdin() -> anyhow::Result<Vec<u8>> {
    let mut buf = Vec::new();
    io::stdin().read_to_end(&mut buf)?;
    Ok(buf)
}

fn open_session(cli: &Cli) -> anyhow::Result<Session<SoftwareElement>> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            serde_json::from_str::<ElementConfig>(&text).context("invalid element config")?
        }
        None => ElementConfig::default(),
    };
    config.state_path = Some(cli.state_file.clone());
    let finder = SoftwareFinder::new(config);
    Session::open(&finder).context("failed to open element")
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity.tracing_level_filter())
        .with_writer(io::stderr)
        .init();

    let session = open_session(&cli)?;
    let mut stdout = io::stdout();

    match &cli.command {
        Commands::GenKey { key_type } => {
            let slot = session.generate_key((*key_type).into())?;
            let public_key = session.public_key(slot, Keyring::Local)?;
            println!("{} {}", slot, public_key.to_hex());
        }

        Commands::List { foreign } => {
            let list = session.list_slots(keyring(*foreign))?;
            info!("{} of {} slots in use", list.slots.len(), list.pool_size);
            for slot in list.slots {
                println!("{}", slot);
            }
        }

        Commands::ExportPubkey { slot, foreign } => {
            let public_key = session
                .public_key(Slot(*slot), keyring(*foreign))
                .context("failed to export public key")?;
            println!("{}", public_key.to_hex());
        }

        Commands::DisableExport { slot, foreign } => {
            session.disable_export(Slot(*slot), keyring(*foreign))?;
        }

        Commands::Remove { slot, foreign } => {
            session.remove_key(Slot(*slot), keyring(*foreign))?;
        }

        Commands::StoreForeign {
            key_type,
            public_key,
        } => {
            let bytes = decode_hex("public key", public_key)?;
            let slot = session.store_foreign_key((*key_type).into(), &bytes)?;
            println!("{}", slot);
        }

        Commands::Sign { slot, digest } => {
            let digest = decode_hex("digest", digest)?;
            let signature = session
                .sign(Slot(*slot), &digest)
                .context("failed to sign digest")?;
            println!("{}", hex::encode(signature));
        }

        Commands::Verify {
            slot,
            foreign,
            digest,
            signature,
        } => {
            let digest = decode_hex("digest", digest)?;
            let signature = decode_hex("signature", signature)?;
            match session.verify(Slot(*slot), keyring(*foreign), &digest, &signature)? {
                Verification::Verified => println!("verified"),
                Verification::Rejected => {
                    println!("rejected");
                    std::process::exit(2);
                }
            }
        }

        Commands::Lock {
            domain,
            input,
            output,
        } => {
            let plaintext = match input {
                Some(path) => fs::read(path)?,
                None => read_stdin()?,
            };
            let object = session.lock(&plaintext, (*domain).into())?;
            match output {
                Some(path) => fs::write(path, object.to_bytes())?,
                None => stdout.write_all(&object.to_bytes())?,
            }
        }

        Commands::Unlock {
            domain,
            input,
            output,
        } => {
            let bytes = match input {
                Some(path) => fs::read(path)?,
                None => read_stdin()?,
            };
            let object = LockedObject::from_bytes(&bytes)
                .context("input is not a locked object")?;
            let plaintext = session
                .unlock(&object, (*domain).into())
                .context("failed to unlock object")?;
            match output {
                Some(path) => fs::write(path, plaintext.as_slice())?,
                None => stdout.write_all(&plaintext)?,
            }
        }

        Commands::Ecdh {
            slot,
            peer_key,
            peer_slot,
            peer_foreign,
            kdf,
            salt,
            kdf_info,
            iterations,
            length,
        } => {
            let peer = match (peer_key, peer_slot) {
                (Some(key_hex), None) => PeerKey::Bytes(decode_hex("peer key", key_hex)?),
                (None, Some(peer_slot)) => PeerKey::Slot {
                    slot: Slot(*peer_slot),
                    keyring: keyring(*peer_foreign),
                },
                _ => bail!("exactly one of --peer-key and --peer-slot is required"),
            };
            let local = SlotRef::Persistent(Slot(*slot));
            let secret = match kdf {
                None => session.ecdh(local, &peer)?,
                Some(kind) => {
                    let kind = KdfKind::from(*kind);
                    let salt = decode_hex("salt", salt)?;
                    let params = if kind.is_pbkdf2() {
                        KdfParams::pbkdf2(kind, &salt, *iterations, *length)
                    } else {
                        KdfParams::hkdf(kind, &salt, &decode_hex("kdf info", kdf_info)?, *length)
                    };
                    session.ecdh_kdf(local, &peer, &params)?
                }
            };
            println!("{}", hex::encode(secret.as_slice()));
        }

        Commands::GenWallet {
            wallet,
            scheme,
            groups,
            group_threshold,
            iteration_exponent,
        } => {
            let params = wallet.params()?;
            match scheme {
                SchemeArg::Random | SchemeArg::Bip39 => {
                    let (slot, mnemonic) = session.generate_master_seed(
                        &params,
                        &wallet.passphrase,
                        *scheme == SchemeArg::Bip39,
                    )?;
                    println!("{}", slot);
                    if let Some(mnemonic) = mnemonic {
                        println!("{}", mnemonic.as_str());
                    }
                }
                SchemeArg::Slip39 => {
                    if groups.is_empty() {
                        bail!("slip39 needs at least one --group");
                    }
                    let layouts = groups
                        .iter()
                        .map(|g| parse_group(g))
                        .collect::<anyhow::Result<Vec<_>>>()?;
                    let layout = Slip39Layout::new(
                        layouts.len() as u8,
                        *group_threshold,
                        *iteration_exponent,
                    )?;
                    session.open_slip39_generate_session(params, layout, &wallet.passphrase)?;

                    let mut shards = Vec::new();
                    let mut master_slot = None;
                    for (index, group) in layouts.iter().enumerate() {
                        session.set_active_group(index as u8, *group)?;
                        for _ in 0..group.member_count {
                            let shard = session.add_member_password("")?;
                            master_slot = master_slot.or(shard.master_slot);
                            shards.push(shard.mnemonic);
                        }
                    }
                    let slot = master_slot.context("shard generation did not complete")?;
                    println!("{}", slot);
                    for shard in shards {
                        println!("{}", shard.as_str());
                    }
                }
            }
        }

        Commands::RestoreWallet { wallet, scheme } => {
            let params = wallet.params()?;
            let input = String::from_utf8(read_stdin()?).context("mnemonic is not UTF-8")?;
            let slot = match scheme {
                SchemeArg::Bip39 => session.restore_bip39(&params, &wallet.passphrase, input.trim())?,
                SchemeArg::Slip39 => {
                    session.open_slip39_restore_session(params, &wallet.passphrase)?;
                    let mut restored = None;
                    for line in input.lines() {
                        if line.trim().is_empty() {
                            continue;
                        }
                        if let RestoreProgress::Complete(slot) = session.add_shard("", line.trim())? {
                            restored = Some(slot);
                            break;
                        }
                    }
                    restored.context("not enough shards to restore the wallet")?
                }
                SchemeArg::Random => bail!("a random wallet cannot be restored"),
            };
            println!("{}", slot);
        }

        Commands::Derive {
            parent,
            index,
            hardened,
            chain_code,
        } => {
            let child = session.derive_child(Slot(*parent), *index, *hardened, *chain_code)?;
            match child.chain_code {
                Some(code) => println!("{} {}", child.slot, hex::encode(code.as_bytes())),
                None => println!("{}", child.slot),
            }
        }

        Commands::DerivePath { root, path } => {
            let node_addr = NodeAddress::try_from(path.as_str())?;
            let slot = session.derive_path(Slot(*root), &node_addr)?;
            println!("{}", slot);
        }

        Commands::NodeAddr { slot } => {
            let node = session.address_of(Slot(*slot))?;
            println!("{} {} {}", node.node_addr, node.wallet_name, node.master_slot);
        }

        Commands::Info => {
            println!("model: {}", session.model_number()?);
            println!("firmware: {}", session.firmware_version()?);
            println!("serial: {}", session.serial_number()?);
        }
    }

    stdout.flush()?;
    Ok(())
}
