//! Command-line workflow around `cop-core`: generate identities, protect a
//! document, counter-sign it, decrypt it, delegate access via share
//! records, and audit a transaction's signatures.

mod keyfile;
mod registry;

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cop_core::{CheckReport, ProtectedTransaction, ShareRecord};

#[derive(Parser)]
#[command(name = "cop", version, about = "Protect, sign, share and check DvP transactions")]
struct Cli {
    /// Directory holding one JSON key file per company.
    #[arg(long, global = true, default_value = "keys")]
    keys_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a fresh signing/encryption identity for a company.
    GenerateKeys { company: String },

    /// List the companies with a key file under `--keys-dir`.
    ListKeys,

    /// Encrypt a document for `seller` and `buyer`.
    Protect {
        seller: String,
        buyer: String,
        /// Path to the plaintext JSON document.
        document: PathBuf,
        #[arg(long, default_value = "transaction.json")]
        out: PathBuf,
    },

    /// Counter-sign a protected transaction as the buyer.
    BuyerSign {
        buyer: String,
        seller: String,
        #[arg(long)]
        transaction: PathBuf,
        #[arg(long, default_value = "transaction.json")]
        out: PathBuf,
    },

    /// Decrypt a protected transaction as `company`.
    Unprotect {
        company: String,
        #[arg(long)]
        transaction: PathBuf,
        /// Optional share record granting delegated access instead of an
        /// entry in the transaction's own `ek_map`.
        #[arg(long)]
        share: Option<PathBuf>,
    },

    /// Delegate decrypt access for a whole transaction to a third party.
    Share {
        from: String,
        to: String,
        #[arg(long)]
        transaction: PathBuf,
        #[arg(long, default_value = "share.json")]
        out: PathBuf,
    },

    /// Encrypt a document with one or more named field-subset layers.
    ProtectLayers {
        seller: String,
        buyer: String,
        document: PathBuf,
        /// Repeatable `section:field,field,...` (e.g. `pricing:amount,currency`).
        #[arg(long = "layer", required = true)]
        layers: Vec<String>,
        #[arg(long, default_value = "transaction.json")]
        out: PathBuf,
    },

    /// Decrypt a single named layer as `company`.
    UnprotectLayer {
        company: String,
        section: String,
        #[arg(long)]
        transaction: PathBuf,
        #[arg(long)]
        share: Option<PathBuf>,
    },

    /// Delegate decrypt access for one or more layers to a third party.
    LayerShare {
        from: String,
        to: String,
        #[arg(long)]
        transaction: PathBuf,
        #[arg(long = "section", required = true)]
        sections: Vec<String>,
        #[arg(long, default_value = "layer-share.json")]
        out: PathBuf,
    },

    /// Verify a transaction's seller/buyer signatures and any share records.
    Check {
        #[arg(long)]
        transaction: PathBuf,
        seller: String,
        #[arg(long)]
        buyer: Option<String>,
        #[arg(long = "share")]
        shares: Vec<PathBuf>,
    },

    /// Publish a company's public identity and a protected transaction to
    /// the transaction registry.
    RegistryPush {
        #[arg(long)]
        registry_url: String,
        company: Option<String>,
        #[arg(long)]
        transaction: Option<PathBuf>,
    },

    /// Push a transaction's buyer signature to the transaction registry.
    RegistryBuyerSign {
        #[arg(long)]
        registry_url: String,
        #[arg(long)]
        transaction: PathBuf,
    },

    /// Fetch a transaction from the transaction registry.
    RegistryPull {
        #[arg(long)]
        registry_url: String,
        tx_id: String,
        #[arg(long, default_value = "transaction.json")]
        out: PathBuf,
    },

    /// Publish a share record to the transaction registry.
    RegistryShare {
        #[arg(long)]
        registry_url: String,
        #[arg(long)]
        share: PathBuf,
    },

    /// List share records the transaction registry holds for a transaction.
    RegistryShares {
        #[arg(long)]
        registry_url: String,
        tx_id: String,
    },

    /// Publish a share record to the disclosure tracker.
    DisclosurePush {
        #[arg(long)]
        disclosure_url: String,
        #[arg(long)]
        share: PathBuf,
    },

    /// List disclosures recorded for a transaction, optionally filtered by
    /// section.
    DisclosurePull {
        #[arg(long)]
        disclosure_url: String,
        tx_id: String,
        #[arg(long)]
        section: Option<String>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    run(cli)
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::GenerateKeys { company } => {
            keyfile::generate(&cli.keys_dir, &company)?;
            log::info!("generated identity for {company:?} under {}", cli.keys_dir.display());
        }

        Command::ListKeys => {
            for name in keyfile::list(&cli.keys_dir)? {
                println!("{name}");
            }
        }

        Command::Protect { seller, buyer, document, out } => {
            let seller_id = keyfile::load(&cli.keys_dir, &seller)?;
            let buyer_id = keyfile::load(&cli.keys_dir, &buyer)?;
            let doc = read_json(&document)?;

            let protected = cop_core::protect(&doc, &seller_id, &buyer_id);
            log::info!("protected tx {} (seller={seller:?}, buyer={buyer:?})", protected.tx_id);
            write_json(&out, &protected)?;
        }

        Command::BuyerSign { buyer, seller, transaction, out } => {
            let buyer_id = keyfile::load(&cli.keys_dir, &buyer)?;
            let seller_id = keyfile::load(&cli.keys_dir, &seller)?;
            let protected: ProtectedTransaction = read_json(&transaction)?;

            let signed = cop_core::buyer_sign(&protected, &buyer_id, &seller_id.signing_public)
                .context("buyer signature refused")?;
            log::info!("buyer {buyer:?} counter-signed tx {}", signed.tx_id);
            write_json(&out, &signed)?;
        }

        Command::Unprotect { company, transaction, share } => {
            let identity = keyfile::load(&cli.keys_dir, &company)?;
            let protected: ProtectedTransaction = read_json(&transaction)?;
            let share_record: Option<ShareRecord> = share.as_deref().map(read_json).transpose()?;

            let document = cop_core::unprotect(&protected, &identity, &company, share_record.as_ref())
                .context("failed to decrypt transaction")?;
            println!("{}", serde_json::to_string_pretty(&document)?);
        }

        Command::Share { from, to, transaction, out } => {
            let from_id = keyfile::load(&cli.keys_dir, &from)?;
            let to_id = keyfile::load(&cli.keys_dir, &to)?;
            let protected: ProtectedTransaction = read_json(&transaction)?;

            let record = cop_core::create_share_record(&protected, &from_id, &to, &to_id.encryption_public)
                .context("failed to create share record")?;
            log::info!("{from:?} shared tx {} with {to:?}", protected.tx_id);
            write_json(&out, &record)?;
        }

        Command::ProtectLayers { seller, buyer, document, layers, out } => {
            let seller_id = keyfile::load(&cli.keys_dir, &seller)?;
            let buyer_id = keyfile::load(&cli.keys_dir, &buyer)?;
            let doc = read_json(&document)?;
            let layers_spec = parse_layer_specs(&layers)?;

            let protected = cop_core::protect_with_layers(&doc, &seller_id, &buyer_id, &layers_spec)
                .context("failed to build layered envelope")?;
            log::info!("protected tx {} with {} layer(s)", protected.tx_id, layers_spec.len());
            write_json(&out, &protected)?;
        }

        Command::UnprotectLayer { company, section, transaction, share } => {
            let identity = keyfile::load(&cli.keys_dir, &company)?;
            let protected: ProtectedTransaction = read_json(&transaction)?;
            let share_record: Option<ShareRecord> = share.as_deref().map(read_json).transpose()?;

            let document = cop_core::unprotect_layer(&protected, &identity, &company, &section, share_record.as_ref())
                .context("failed to decrypt layer")?;
            println!("{}", serde_json::to_string_pretty(&document)?);
        }

        Command::LayerShare { from, to, transaction, sections, out } => {
            let from_id = keyfile::load(&cli.keys_dir, &from)?;
            let to_id = keyfile::load(&cli.keys_dir, &to)?;
            let protected: ProtectedTransaction = read_json(&transaction)?;

            let records = cop_core::create_layer_share_records(&protected, &sections, &from_id, &to, &to_id.encryption_public)
                .context("failed to create layer share records")?;
            log::info!("{from:?} shared {} layer(s) of tx {} with {to:?}", records.len(), protected.tx_id);
            write_json(&out, &records)?;
        }

        Command::Check { transaction, seller, buyer, shares } => {
            let protected: ProtectedTransaction = read_json(&transaction)?;
            let seller_public = keyfile::load(&cli.keys_dir, &seller)?.signing_public;
            let buyer_public = buyer.as_deref().map(|b| keyfile::load(&cli.keys_dir, b)).transpose()?.map(|id| id.signing_public);

            let share_records: Vec<ShareRecord> = shares.iter().map(|p| read_json(p)).collect::<Result<_>>()?;
            let mut share_public_keys = BTreeMap::new();
            for record in &share_records {
                if !share_public_keys.contains_key(&record.from_company) {
                    if let Ok(identity) = keyfile::load(&cli.keys_dir, &record.from_company) {
                        share_public_keys.insert(record.from_company.clone(), identity.signing_public);
                    }
                }
            }

            let report: CheckReport = cop_core::check(
                &protected,
                &seller_public,
                buyer_public.as_ref(),
                &share_records,
                &share_public_keys.into_iter().collect(),
            );
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Command::RegistryPush { registry_url, company, transaction } => {
            let client = registry::TransactionRegistry::new(registry_url);
            if let Some(company) = company {
                let identity = keyfile::load(&cli.keys_dir, &company)?;
                let public = identity.public().to_document();
                client.register_company(&public.name, &public.signing_public, &public.encryption_public)?;
                log::info!("registered {company:?} with the transaction registry");
            }
            if let Some(transaction) = transaction {
                let protected: ProtectedTransaction = read_json(&transaction)?;
                client.put_transaction(&protected)?;
                log::info!("published tx {} to the transaction registry", protected.tx_id);
            }
        }

        Command::RegistryBuyerSign { registry_url, transaction } => {
            let client = registry::TransactionRegistry::new(registry_url);
            let signed: ProtectedTransaction = read_json(&transaction)?;
            let sig_buyer = signed.sig_buyer.as_deref().context("transaction has no buyer signature to push")?;
            client.buyer_sign(&signed.tx_id, sig_buyer)?;
            log::info!("pushed buyer signature for tx {} to the transaction registry", signed.tx_id);
        }

        Command::RegistryPull { registry_url, tx_id, out } => {
            let client = registry::TransactionRegistry::new(registry_url);
            let protected = client.get_transaction(&tx_id)?;
            write_json(&out, &protected)?;
            log::info!("fetched tx {tx_id} from the transaction registry");
        }

        Command::RegistryShare { registry_url, share } => {
            let client = registry::TransactionRegistry::new(registry_url);
            let record: ShareRecord = read_json(&share)?;
            client.put_share(&record)?;
            log::info!("published share {} to the transaction registry", record.id);
        }

        Command::RegistryShares { registry_url, tx_id } => {
            let client = registry::TransactionRegistry::new(registry_url);
            let shares = client.list_shares(&tx_id)?;
            println!("{}", serde_json::to_string_pretty(&shares)?);
        }

        Command::DisclosurePush { disclosure_url, share } => {
            let client = registry::DisclosureTracker::new(disclosure_url);
            let record: ShareRecord = read_json(&share)?;
            client.put_disclosure(&record)?;
            log::info!("published disclosure {} to the disclosure tracker", record.id);
        }

        Command::DisclosurePull { disclosure_url, tx_id, section } => {
            let client = registry::DisclosureTracker::new(disclosure_url);
            let records = client.list_disclosures(&tx_id, section.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
    }
    Ok(())
}

fn parse_layer_specs(specs: &[String]) -> Result<BTreeMap<String, Vec<String>>> {
    let mut layers = BTreeMap::new();
    for spec in specs {
        let (section, fields) = spec
            .split_once(':')
            .with_context(|| format!("layer spec {spec:?} must be `section:field,field,...`"))?;
        let fields: Vec<String> = fields.split(',').map(str::to_string).collect();
        layers.insert(section.to_string(), fields);
    }
    Ok(layers)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &std::path::Path) -> Result<T> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {} as JSON", path.display()))
}

fn write_json<T: serde::Serialize>(path: &std::path::Path, value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    fs::write(path, text).with_context(|| format!("writing {}", path.display()))
}
